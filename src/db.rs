// Database connection and schema bootstrap

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Schema};

use crate::models::{notifications, users};

pub async fn establish_connection(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Create the `users` and `notifications` tables when they do not exist yet.
/// Users first: notifications reference them.
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut users_table = schema.create_table_from_entity(users::Entity);
    users_table.if_not_exists();
    db.execute(backend.build(&users_table)).await?;

    let mut notifications_table = schema.create_table_from_entity(notifications::Entity);
    notifications_table.if_not_exists();
    db.execute(backend.build(&notifications_table)).await?;

    Ok(())
}
