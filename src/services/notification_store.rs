use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::*;
use uuid::Uuid;

use super::user_store::StoreError;
use crate::models::notifications::{self, Entity as Notifications, Model as Notification};

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct NotificationFilter {
    /// 1-based
    pub page: u64,
    pub limit: u64,
    pub unread_only: bool,
}

/// Per-user in-app notices.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create(&self, new: NewNotification) -> Result<Notification, StoreError>;

    /// One page of the user's notices, newest first, plus the total match count.
    async fn list_for_user(
        &self,
        user_id: Uuid,
        filter: &NotificationFilter,
    ) -> Result<(Vec<Notification>, u64), StoreError>;

    /// `false` when no notice `id` belongs to `user_id`.
    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;
}

/// Postgres-backed store.
#[derive(Clone)]
pub struct SeaOrmNotificationStore {
    db: DatabaseConnection,
}

impl SeaOrmNotificationStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NotificationStore for SeaOrmNotificationStore {
    async fn create(&self, new: NewNotification) -> Result<Notification, StoreError> {
        let notification = notifications::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(new.user_id),
            title: Set(new.title),
            message: Set(new.message),
            is_read: Set(false),
            created_at: Set(Utc::now()),
        };

        Ok(notification.insert(&self.db).await?)
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        filter: &NotificationFilter,
    ) -> Result<(Vec<Notification>, u64), StoreError> {
        let mut select = Notifications::find().filter(notifications::Column::UserId.eq(user_id));
        if filter.unread_only {
            select = select.filter(notifications::Column::IsRead.eq(false));
        }

        let paginator = select
            .order_by_desc(notifications::Column::CreatedAt)
            .paginate(&self.db, filter.limit);

        let total = paginator.num_items().await?;
        let page = paginator.fetch_page(filter.page.saturating_sub(1)).await?;

        Ok((page, total))
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        // owner check and update in one statement
        let result = Notifications::update_many()
            .col_expr(notifications::Column::IsRead, Expr::value(true))
            .filter(notifications::Column::Id.eq(id))
            .filter(notifications::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }
}
