//! In-process `UserStore` and `NotificationStore`.
//!
//! Every mutation runs under the write lock, which gives conditional updates
//! the same all-or-nothing behaviour the database provides. Used by the test
//! suites and handy for running the API without Postgres.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::notification_store::{NewNotification, NotificationFilter, NotificationStore};
use super::user_store::{NewUser, ProfileChanges, StoreError, UniqueField, UserQuery, UserStore};
use crate::models::notifications::Model as Notification;
use crate::models::users::{Model as User, Role};

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn modify(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut User) + Send,
    ) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        Ok(users.get_mut(&id).map(|user| {
            apply(user);
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn find_where(&self, predicate: impl Fn(&User) -> bool + Send) -> Option<User> {
        self.users
            .read()
            .await
            .values()
            .find(|user| predicate(user))
            .cloned()
    }
}

fn holds_ticket(user: &User, token: &str, now: DateTime<Utc>) -> bool {
    user.reset_password_token.as_deref() == Some(token)
        && user.reset_password_expires.is_some_and(|expires| expires > now)
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.find_where(|u| u.username == username).await)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.find_where(|u| u.email == email).await)
    }

    async fn find_by_username_or_email(&self, identifier: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .find_where(|u| u.username == identifier || u.email == identifier)
            .await)
    }

    async fn find_by_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        Ok(self.find_where(|u| holds_ticket(u, token, now)).await)
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().await;

        // same precedence as the unique indexes are reported: email first
        if users.values().any(|u| u.email == new_user.email) {
            return Err(StoreError::Duplicate(UniqueField::Email));
        }
        if users.values().any(|u| u.username == new_user.username) {
            return Err(StoreError::Duplicate(UniqueField::Username));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            avatar: None,
            phone: None,
            role: Role::User,
            is_active: true,
            is_verified: false,
            verification_token: new_user.verification_token,
            reset_password_token: None,
            reset_password_expires: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> Result<Option<User>, StoreError> {
        self.modify(id, |user| {
            if let Some(first_name) = changes.first_name {
                user.first_name = Some(first_name);
            }
            if let Some(last_name) = changes.last_name {
                user.last_name = Some(last_name);
            }
            if let Some(phone) = changes.phone {
                user.phone = Some(phone);
            }
            if let Some(avatar) = changes.avatar {
                user.avatar = Some(avatar);
            }
        })
        .await
    }

    async fn set_role(&self, id: Uuid, role: Role) -> Result<Option<User>, StoreError> {
        self.modify(id, |user| user.role = role).await
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<User>, StoreError> {
        self.modify(id, |user| user.is_active = active).await
    }

    async fn set_reset_ticket(
        &self,
        id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.modify(id, |user| {
            user.reset_password_token = Some(token.to_string());
            user.reset_password_expires = Some(expires_at);
        })
        .await?;
        Ok(())
    }

    async fn consume_reset_ticket(
        &self,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        let Some(user) = users.values_mut().find(|u| holds_ticket(u, token, now)) else {
            return Ok(None);
        };

        user.password_hash = password_hash.to_string();
        user.reset_password_token = None;
        user.reset_password_expires = None;
        user.updated_at = now;
        Ok(Some(user.clone()))
    }

    async fn touch(&self, id: Uuid) -> Result<(), StoreError> {
        self.modify(id, |_| {}).await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.users.write().await.remove(&id).is_some())
    }

    async fn list(&self, query: &UserQuery) -> Result<(Vec<User>, u64), StoreError> {
        let search = query
            .search
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        let contains = |value: Option<&str>, needle: &str| {
            value.is_some_and(|v| v.to_lowercase().contains(needle))
        };

        let users = self.users.read().await;
        let mut matching: Vec<User> = users
            .values()
            .filter(|u| query.role.is_none_or(|role| u.role == role))
            .filter(|u| match &search {
                Some(needle) => {
                    contains(Some(&u.username), needle)
                        || contains(Some(&u.email), needle)
                        || contains(u.first_name.as_deref(), needle)
                        || contains(u.last_name.as_deref(), needle)
                }
                None => true,
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let offset = query.page.saturating_sub(1).saturating_mul(query.limit);
        let skip = usize::try_from(offset).unwrap_or(usize::MAX);
        let page = matching
            .into_iter()
            .skip(skip)
            .take(query.limit as usize)
            .collect();
        Ok((page, total))
    }
}

#[derive(Default)]
pub struct MemoryNotificationStore {
    notifications: RwLock<Vec<Notification>>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn create(&self, new: NewNotification) -> Result<Notification, StoreError> {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            title: new.title,
            message: new.message,
            is_read: false,
            created_at: Utc::now(),
        };
        self.notifications.write().await.push(notification.clone());
        Ok(notification)
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        filter: &NotificationFilter,
    ) -> Result<(Vec<Notification>, u64), StoreError> {
        let notifications = self.notifications.read().await;
        let mut matching: Vec<Notification> = notifications
            .iter()
            .filter(|n| n.user_id == user_id && !(filter.unread_only && n.is_read))
            .cloned()
            .collect();
        // reversed first so equal timestamps still come out newest first
        matching.reverse();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let offset = filter.page.saturating_sub(1).saturating_mul(filter.limit);
        let page = matching
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(filter.limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let mut notifications = self.notifications.write().await;
        match notifications.iter_mut().find(|n| n.id == id && n.user_id == user_id) {
            Some(notification) => {
                notification.is_read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            first_name: None,
            last_name: None,
            verification_token: None,
        }
    }

    #[tokio::test]
    async fn test_create_defaults() {
        let store = MemoryUserStore::new();
        let user = store.create(new_user("alice", "a@x.com")).await.unwrap();
        assert_eq!(user.role, Role::User);
        assert!(user.is_active);
        assert!(!user.is_verified);
        assert_eq!(store.find_by_username_or_email("a@x.com").await.unwrap(), Some(user.clone()));
        assert_eq!(store.find_by_username_or_email("alice").await.unwrap(), Some(user));
    }

    #[tokio::test]
    async fn test_unique_fields() {
        let store = MemoryUserStore::new();
        store.create(new_user("alice", "a@x.com")).await.unwrap();
        assert_eq!(
            store.create(new_user("bob", "a@x.com")).await,
            Err(StoreError::Duplicate(UniqueField::Email))
        );
        assert_eq!(
            store.create(new_user("alice", "b@x.com")).await,
            Err(StoreError::Duplicate(UniqueField::Username))
        );
    }

    #[tokio::test]
    async fn test_expired_ticket_is_not_found() {
        let store = MemoryUserStore::new();
        let user = store.create(new_user("alice", "a@x.com")).await.unwrap();
        let now = Utc::now();
        store
            .set_reset_ticket(user.id, "tkt", now - Duration::seconds(1))
            .await
            .unwrap();

        assert_eq!(store.find_by_reset_token("tkt", now).await.unwrap(), None);
        assert_eq!(store.consume_reset_ticket("tkt", "new", now).await.unwrap(), None);
        let unchanged = store.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(unchanged.password_hash, "hash");
    }

    #[tokio::test]
    async fn test_concurrent_consumption_succeeds_once() {
        let store = Arc::new(MemoryUserStore::new());
        let user = store.create(new_user("alice", "a@x.com")).await.unwrap();
        let now = Utc::now();
        store
            .set_reset_ticket(user.id, "tkt", now + Duration::minutes(10))
            .await
            .unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .consume_reset_ticket("tkt", &format!("hash-{i}"), Utc::now())
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);

        let stored = store.find_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.password_hash.starts_with("hash-"));
        assert_eq!(stored.reset_password_token, None);
        assert_eq!(stored.reset_password_expires, None);
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let store = MemoryUserStore::new();
        for i in 0..5 {
            store
                .create(new_user(&format!("user{i}"), &format!("u{i}@x.com")))
                .await
                .unwrap();
        }
        let agent = store.create(new_user("Agent_Smith", "smith@x.com")).await.unwrap();
        store.set_role(agent.id, Role::Agent).await.unwrap();

        let (page, total) = store
            .list(&UserQuery { page: 2, limit: 4, role: None, search: None })
            .await
            .unwrap();
        assert_eq!(total, 6);
        assert_eq!(page.len(), 2);

        let (agents, total) = store
            .list(&UserQuery { page: 1, limit: 10, role: Some(Role::Agent), search: None })
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(agents[0].id, agent.id);

        let (found, _) = store
            .list(&UserQuery { page: 1, limit: 10, role: None, search: Some("SMITH".into()) })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_list_far_past_the_end() {
        let store = MemoryUserStore::new();
        store.create(new_user("alice", "a@x.com")).await.unwrap();

        let (page, total) = store
            .list(&UserQuery {
                page: u64::MAX,
                limit: 100,
                role: None,
                search: None,
            })
            .await
            .unwrap();
        assert!(page.is_empty());
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn test_search_wildcards_are_literal() {
        let store = MemoryUserStore::new();
        store.create(new_user("alice", "a@x.com")).await.unwrap();
        store.create(new_user("bob_smith", "b@x.com")).await.unwrap();

        let search = |text: &str| UserQuery {
            page: 1,
            limit: 10,
            role: None,
            search: Some(text.to_string()),
        };
        assert_eq!(store.list(&search("%")).await.unwrap().1, 0);
        let (found, _) = store.list(&search("_")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].username, "bob_smith");
    }

    #[tokio::test]
    async fn test_notifications_are_scoped_to_their_owner() {
        let store = MemoryNotificationStore::new();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let notice = |user_id, title: &str| NewNotification {
            user_id,
            title: title.to_string(),
            message: "body".to_string(),
        };

        let first = store.create(notice(alice, "first")).await.unwrap();
        store.create(notice(alice, "second")).await.unwrap();
        store.create(notice(bob, "other")).await.unwrap();

        let all = NotificationFilter { page: 1, limit: 10, unread_only: false };
        let (items, total) = store.list_for_user(alice, &all).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(items[0].title, "second");

        // bob cannot touch alice's notice
        assert!(!store.mark_read(first.id, bob).await.unwrap());
        assert!(store.mark_read(first.id, alice).await.unwrap());

        let unread = NotificationFilter { page: 1, limit: 10, unread_only: true };
        let (items, total) = store.list_for_user(alice, &unread).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].title, "second");
    }
}
