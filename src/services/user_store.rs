use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, Func, LikeExpr};
use sea_orm::*;
use thiserror::Error;
use uuid::Uuid;

use crate::models::users::{self, Entity as Users, Model as User, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Username,
    Email,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{0:?} already in use")]
    Duplicate(UniqueField),

    #[error("database error: {0}")]
    Database(String),
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
            let field = if detail.contains("email") {
                UniqueField::Email
            } else {
                UniqueField::Username
            };
            return StoreError::Duplicate(field);
        }
        StoreError::Database(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub verification_token: Option<String>,
}

/// `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UserQuery {
    /// 1-based
    pub page: u64,
    pub limit: u64,
    pub role: Option<Role>,
    pub search: Option<String>,
}

const LIKE_ESCAPE: char = '\\';

/// Search text as a literal LIKE fragment: `%` and `_` lose their wildcard meaning.
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// Persistence for user records. Absence is `Ok(None)`, never an error.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Matches `identifier` against the username and the email columns.
    async fn find_by_username_or_email(&self, identifier: &str) -> Result<Option<User>, StoreError>;

    /// User holding `token` as an unexpired reset ticket.
    async fn find_by_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError>;

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    async fn update_profile(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> Result<Option<User>, StoreError>;

    async fn set_role(&self, id: Uuid, role: Role) -> Result<Option<User>, StoreError>;

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<User>, StoreError>;

    async fn set_reset_ticket(
        &self,
        id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Installs `password_hash` and clears the reset ticket in a single
    /// conditional write, provided `token` is still stored and unexpired.
    /// Returns the updated user, or `None` when the condition did not hold.
    async fn consume_reset_ticket(
        &self,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError>;

    /// Bumps `updated_at`.
    async fn touch(&self, id: Uuid) -> Result<(), StoreError>;

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    /// One page of users, newest first, plus the total match count.
    async fn list(&self, query: &UserQuery) -> Result<(Vec<User>, u64), StoreError>;
}

/// Postgres-backed store.
#[derive(Clone)]
pub struct SeaOrmUserStore {
    db: DatabaseConnection,
}

impl SeaOrmUserStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn update_by_id(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut users::ActiveModel) + Send,
    ) -> Result<Option<User>, StoreError> {
        let Some(user) = Users::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };

        let mut active_model: users::ActiveModel = user.into();
        apply(&mut active_model);
        active_model.updated_at = Set(Utc::now());

        Ok(Some(active_model.update(&self.db).await?))
    }
}

#[async_trait]
impl UserStore for SeaOrmUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(Users::find_by_id(id).one(&self.db).await?)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(Users::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.db)
            .await?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(Users::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await?)
    }

    async fn find_by_username_or_email(&self, identifier: &str) -> Result<Option<User>, StoreError> {
        Ok(Users::find()
            .filter(
                Condition::any()
                    .add(users::Column::Username.eq(identifier))
                    .add(users::Column::Email.eq(identifier)),
            )
            .one(&self.db)
            .await?)
    }

    async fn find_by_reset_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        Ok(Users::find()
            .filter(users::Column::ResetPasswordToken.eq(token))
            .filter(users::Column::ResetPasswordExpires.gt(now))
            .one(&self.db)
            .await?)
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let now = Utc::now();
        let user = users::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(new_user.username),
            email: Set(new_user.email),
            password_hash: Set(new_user.password_hash),
            first_name: Set(new_user.first_name),
            last_name: Set(new_user.last_name),
            avatar: Set(None),
            phone: Set(None),
            role: Set(Role::User),
            is_active: Set(true),
            is_verified: Set(false),
            verification_token: Set(new_user.verification_token),
            reset_password_token: Set(None),
            reset_password_expires: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        Ok(user.insert(&self.db).await?)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> Result<Option<User>, StoreError> {
        self.update_by_id(id, |model| {
            if let Some(first_name) = changes.first_name {
                model.first_name = Set(Some(first_name));
            }
            if let Some(last_name) = changes.last_name {
                model.last_name = Set(Some(last_name));
            }
            if let Some(phone) = changes.phone {
                model.phone = Set(Some(phone));
            }
            if let Some(avatar) = changes.avatar {
                model.avatar = Set(Some(avatar));
            }
        })
        .await
    }

    async fn set_role(&self, id: Uuid, role: Role) -> Result<Option<User>, StoreError> {
        self.update_by_id(id, |model| model.role = Set(role)).await
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<Option<User>, StoreError> {
        self.update_by_id(id, |model| model.is_active = Set(active))
            .await
    }

    async fn set_reset_ticket(
        &self,
        id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        Users::update_many()
            .col_expr(users::Column::ResetPasswordToken, Expr::value(token))
            .col_expr(users::Column::ResetPasswordExpires, Expr::value(expires_at))
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn consume_reset_ticket(
        &self,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        let Some(candidate) = self.find_by_reset_token(token, now).await? else {
            return Ok(None);
        };

        // 1. Conditional write: the WHERE clause re-checks the ticket, so of two
        //    concurrent completions only one can affect a row
        let result = Users::update_many()
            .col_expr(users::Column::PasswordHash, Expr::value(password_hash))
            .col_expr(users::Column::ResetPasswordToken, Expr::value(Option::<String>::None))
            .col_expr(
                users::Column::ResetPasswordExpires,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(candidate.id))
            .filter(users::Column::ResetPasswordToken.eq(token))
            .filter(users::Column::ResetPasswordExpires.gt(now))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Ok(None);
        }

        // 2. Read back the committed row
        self.find_by_id(candidate.id).await
    }

    async fn touch(&self, id: Uuid) -> Result<(), StoreError> {
        Users::update_many()
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = Users::delete_by_id(id).exec(&self.db).await?;
        Ok(result.rows_affected > 0)
    }

    async fn list(&self, query: &UserQuery) -> Result<(Vec<User>, u64), StoreError> {
        let mut select = Users::find();

        if let Some(role) = query.role {
            select = select.filter(users::Column::Role.eq(role));
        }

        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", escape_like(&search.to_lowercase()));
            let lower_like = |column: users::Column| {
                Expr::expr(Func::lower(Expr::col(column)))
                    .like(LikeExpr::new(pattern.clone()).escape(LIKE_ESCAPE))
            };
            select = select.filter(
                Condition::any()
                    .add(lower_like(users::Column::Username))
                    .add(lower_like(users::Column::Email))
                    .add(lower_like(users::Column::FirstName))
                    .add(lower_like(users::Column::LastName)),
            );
        }

        let paginator = select
            .order_by_desc(users::Column::CreatedAt)
            .paginate(&self.db, query.limit);

        let total = paginator.num_items().await?;
        let users = paginator.fetch_page(query.page.saturating_sub(1)).await?;

        Ok((users, total))
    }
}
