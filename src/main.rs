use std::io;
use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use estate_api::config::AppConfig;
use estate_api::services::auth_service::AuthService;
use estate_api::services::notification_store::{NotificationStore, SeaOrmNotificationStore};
use estate_api::services::notifier::LogNotifier;
use estate_api::services::user_service::UserService;
use estate_api::services::user_store::{SeaOrmUserStore, UserStore};
use estate_api::{db, routes};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    // 1. Configuration, validated before anything else starts
    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?;

    // 2. Database
    tracing::info!("Connecting to database...");
    let conn = db::establish_connection(&config.database_url).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to connect to database");
        io::Error::new(io::ErrorKind::ConnectionRefused, e)
    })?;
    db::ensure_schema(&conn).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to prepare schema");
        io::Error::other(e)
    })?;
    tracing::info!("Database connected");

    // 3. Services, shared by every worker
    let store: Arc<dyn UserStore> = Arc::new(SeaOrmUserStore::new(conn.clone()));
    let notifications: Arc<dyn NotificationStore> = Arc::new(SeaOrmNotificationStore::new(conn));
    let auth = web::Data::new(AuthService::new(config.auth.clone(), store.clone(), Arc::new(LogNotifier)));
    let users = web::Data::new(UserService::new(store, notifications));

    tracing::info!(host = %config.host, port = config.port, "Starting server");

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(auth.clone())
            .app_data(users.clone())
            .configure(routes::configure_routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
