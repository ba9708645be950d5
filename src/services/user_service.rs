use std::sync::Arc;

use uuid::Uuid;

use super::notification_store::{NewNotification, NotificationFilter, NotificationStore};
use super::user_store::{ProfileChanges, UserQuery, UserStore};
use crate::error::AuthError;
use crate::middleware::AuthUser;
use crate::models::dto::{
    ListUsersQuery, NotificationList, NotificationQuery, Pagination, SanitizedUser, UpdateProfileRequest, UserList,
};
use crate::models::users::Role;

const DEFAULT_PAGE_SIZE: u64 = 20;
const MAX_PAGE_SIZE: u64 = 100;

/// Validated `(page, limit)`. Page is 1-based; the resulting row offset must
/// stay representable (Postgres OFFSET is a signed 64-bit integer).
fn page_window(page: Option<u64>, limit: Option<u64>) -> Result<(u64, u64), AuthError> {
    let page = page.unwrap_or(1);
    if page == 0 {
        return Err(AuthError::validation("page", "Page must be a positive integer"));
    }
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(AuthError::validation("limit", "Limit must be between 1 and 100"));
    }
    if (page - 1)
        .checked_mul(limit)
        .is_none_or(|offset| offset > i64::MAX as u64)
    {
        return Err(AuthError::validation("page", "Page is out of range"));
    }
    Ok((page, limit))
}

/// Account management on top of the credential store: the caller's own
/// profile and notifications, and the admin operations (listing, role
/// changes, deactivation). Role checks happen at the route; this layer
/// enforces the business rules.
pub struct UserService {
    store: Arc<dyn UserStore>,
    notifications: Arc<dyn NotificationStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>, notifications: Arc<dyn NotificationStore>) -> Self {
        Self { store, notifications }
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<SanitizedUser, AuthError> {
        self.store
            .find_by_id(user_id)
            .await?
            .map(SanitizedUser::from)
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        req: UpdateProfileRequest,
    ) -> Result<SanitizedUser, AuthError> {
        let changes = ProfileChanges {
            first_name: req.first_name,
            last_name: req.last_name,
            phone: req.phone,
            avatar: req.avatar,
        };

        let user = self
            .store
            .update_profile(user_id, changes)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        tracing::info!(user_id = %user.id, username = %user.username, "User profile updated");
        Ok(SanitizedUser::from(user))
    }

    /// Outstanding tokens of the deleted account stop working at once: the
    /// authentication guard re-reads the store on every request.
    pub async fn delete_account(&self, user: &AuthUser) -> Result<(), AuthError> {
        if !self.store.delete(user.id).await? {
            return Err(AuthError::UserNotFound);
        }
        tracing::info!(user_id = %user.id, username = %user.username, email = %user.email, "User account deleted");
        Ok(())
    }

    pub async fn list_users(&self, query: ListUsersQuery) -> Result<UserList, AuthError> {
        let (page, limit) = page_window(query.page, query.limit)?;
        let role = match query.role.as_deref().filter(|r| !r.is_empty()) {
            Some(raw) => Some(raw.parse::<Role>().map_err(|_| AuthError::InvalidRole)?),
            None => None,
        };

        let (users, total) = self
            .store
            .list(&UserQuery {
                page,
                limit,
                role,
                search: query.search,
            })
            .await?;

        Ok(UserList {
            users: users.into_iter().map(SanitizedUser::from).collect(),
            pagination: Pagination::new(page, limit, total),
        })
    }

    pub async fn update_role(
        &self,
        admin: &AuthUser,
        user_id: Uuid,
        role: &str,
    ) -> Result<SanitizedUser, AuthError> {
        let role: Role = role.parse().map_err(|_| AuthError::InvalidRole)?;

        let user = self
            .store
            .set_role(user_id, role)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        tracing::info!(
            user_id = %user.id,
            role = role.as_str(),
            by = %admin.username,
            "User role updated"
        );
        self.notify(
            user.id,
            "Role updated",
            format!("Your account role is now {}.", role.as_str()),
        )
        .await;
        Ok(SanitizedUser::from(user))
    }

    pub async fn deactivate_user(
        &self,
        admin: &AuthUser,
        user_id: Uuid,
    ) -> Result<SanitizedUser, AuthError> {
        if self.store.find_by_id(user_id).await?.is_none() {
            return Err(AuthError::UserNotFound);
        }
        if user_id == admin.id {
            return Err(AuthError::CannotDeactivateSelf);
        }

        let user = self
            .store
            .set_active(user_id, false)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        tracing::info!(user_id = %user.id, by = %admin.username, "User deactivated");
        self.notify(
            user.id,
            "Account deactivated",
            "Your account has been deactivated by an administrator.".to_string(),
        )
        .await;
        Ok(SanitizedUser::from(user))
    }

    pub async fn notifications(
        &self,
        user: &AuthUser,
        query: NotificationQuery,
    ) -> Result<NotificationList, AuthError> {
        let (page, limit) = page_window(query.page, query.limit)?;

        let (notifications, total) = self
            .notifications
            .list_for_user(
                user.id,
                &NotificationFilter {
                    page,
                    limit,
                    unread_only: query.unread_only,
                },
            )
            .await?;

        Ok(NotificationList {
            notifications,
            pagination: Pagination::new(page, limit, total),
        })
    }

    /// Only the owner can mark a notice; anyone else gets `NotificationNotFound`.
    pub async fn mark_notification_read(&self, user: &AuthUser, id: Uuid) -> Result<(), AuthError> {
        if !self.notifications.mark_read(id, user.id).await? {
            return Err(AuthError::NotificationNotFound);
        }
        tracing::debug!(user_id = %user.id, notification_id = %id, "Notification marked as read");
        Ok(())
    }

    // Best effort: the change that triggered the notice has already been committed
    async fn notify(&self, user_id: Uuid, title: &str, message: String) {
        let created = self
            .notifications
            .create(NewNotification {
                user_id,
                title: title.to_string(),
                message,
            })
            .await;
        if let Err(e) = created {
            tracing::warn!(%user_id, error = %e, "Failed to record notification");
        }
    }
}
