use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::Rng;

use super::notifier::Notifier;
use super::user_store::{NewUser, UserStore};
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::middleware::AuthUser;
use crate::models::dto::{RegisterRequest, SanitizedUser};
use crate::utils::jwt::{TokenKind, TokenService};
use crate::utils::password::{PasswordError, PasswordHasher};

/// Access + refresh pair minted together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: SanitizedUser,
    pub tokens: SessionTokens,
}

/// Registration, login, session refresh, password reset and the per-request
/// identity check. Stateless apart from the credential store: tokens are
/// never recorded server-side.
pub struct AuthService {
    store: Arc<dyn UserStore>,
    notifier: Arc<dyn Notifier>,
    tokens: TokenService,
    hasher: PasswordHasher,
    config: AuthConfig,
    // verified against when the login identifier is unknown, so both failure
    // paths pay for one key derivation
    decoy_hash: String,
}

impl AuthService {
    pub fn new(config: AuthConfig, store: Arc<dyn UserStore>, notifier: Arc<dyn Notifier>) -> Self {
        let hasher = PasswordHasher::new(config.hash_iterations);
        let decoy_hash = hasher.hash(&random_token()).unwrap_or_default();

        Self {
            store,
            notifier,
            tokens: TokenService::new(&config),
            hasher,
            config,
            decoy_hash,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn UserStore> {
        self.store.clone()
    }

    /// Create an account and open a session for it. The request is assumed
    /// shape-valid; uniqueness is checked here, email first.
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthSession, AuthError> {
        // 1. Uniqueness, before any write
        if self.store.find_by_email(&req.email).await?.is_some() {
            return Err(AuthError::DuplicateEmail);
        }
        if self.store.find_by_username(&req.username).await?.is_some() {
            return Err(AuthError::DuplicateUsername);
        }

        // 2. Hash the password
        let password_hash = self.hash_password(req.password).await?;

        // 3. Create the user (a concurrent registration can still lose on the unique index)
        let user = self
            .store
            .create(NewUser {
                username: req.username,
                email: req.email,
                password_hash,
                first_name: req.first_name,
                last_name: req.last_name,
                verification_token: Some(random_token()),
            })
            .await?;

        // 4. Open the session
        let tokens = self.mint(user.id)?;

        tracing::info!(user_id = %user.id, username = %user.username, email = %user.email, "New user registered");
        Ok(AuthSession {
            user: SanitizedUser::from(&user),
            tokens,
        })
    }

    /// `identifier` is matched against both username and email. Unknown
    /// identifier and wrong password fail identically.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<AuthSession, AuthError> {
        // 1. Find the user
        let Some(user) = self.store.find_by_username_or_email(identifier).await? else {
            self.verify_password(password, &self.decoy_hash).await?;
            tracing::info!("Login rejected: unknown identifier");
            return Err(AuthError::InvalidCredentials);
        };

        // 2. Check the password
        if !self.verify_password(password, &user.password_hash).await? {
            tracing::info!(user_id = %user.id, "Login rejected: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        // 3. Credentials are fine, but a disabled account gets no session
        if !user.is_active {
            tracing::info!(user_id = %user.id, "Login rejected: account deactivated");
            return Err(AuthError::AccountDeactivated);
        }

        // 4. Mint tokens, record activity
        let tokens = self.mint(user.id)?;
        self.store.touch(user.id).await?;

        tracing::info!(user_id = %user.id, username = %user.username, "User logged in");
        Ok(AuthSession {
            user: SanitizedUser::from(&user),
            tokens,
        })
    }

    /// Nothing to revoke server-side; the transport drops the cookies.
    pub fn logout(&self, user: Option<&AuthUser>) {
        match user {
            Some(user) => tracing::info!(user_id = %user.id, "User logged out"),
            None => tracing::info!("Logout without an active session"),
        }
    }

    /// Rotate both tokens. The presented refresh token stays valid until it
    /// expires since nothing records it.
    pub async fn refresh_session(&self, refresh_token: Option<&str>) -> Result<SessionTokens, AuthError> {
        let refresh_token = refresh_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let verified = self
            .tokens
            .verify(refresh_token, TokenKind::Refresh)
            .map_err(|e| {
                tracing::debug!(reason = %e, "Refresh token rejected");
                AuthError::InvalidRefreshToken
            })?;

        let user = match self.store.find_by_id(verified.user_id).await? {
            Some(user) if user.is_active => user,
            _ => {
                tracing::info!(user_id = %verified.user_id, "Refresh rejected: user missing or deactivated");
                return Err(AuthError::InvalidRefreshToken);
            }
        };

        let tokens = self.mint(user.id)?;
        tracing::info!(user_id = %user.id, "Session refreshed");
        Ok(tokens)
    }

    /// Store a reset ticket on the account and hand it to the notifier.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let user = self
            .store
            .find_by_email(email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let token = random_token();
        let expires_at = Utc::now() + Duration::seconds(self.config.reset_ttl_secs);
        self.store.set_reset_ticket(user.id, &token, expires_at).await?;

        self.notifier.password_reset_requested(&user, &token, expires_at);
        tracing::info!(user_id = %user.id, "Password reset requested");
        Ok(())
    }

    pub async fn complete_password_reset(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        // 1. Cheap check first, so an unknown token costs no key derivation
        if self.store.find_by_reset_token(token, Utc::now()).await?.is_none() {
            return Err(AuthError::InvalidOrExpiredToken);
        }

        // 2. Hash, then swap hash and clear the ticket in one conditional write
        let password_hash = self.hash_password(new_password.to_string()).await?;
        let user = self
            .store
            .consume_reset_ticket(token, &password_hash, Utc::now())
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        tracing::info!(user_id = %user.id, username = %user.username, "Password reset completed");
        Ok(())
    }

    /// Resolve a presented access token to a live, active user. Every failure
    /// collapses to `Unauthenticated`; the reason only reaches the log.
    pub async fn authenticate(&self, token: Option<&str>) -> Result<AuthUser, AuthError> {
        let token = token.filter(|t| !t.is_empty()).ok_or(AuthError::Unauthenticated)?;

        let verified = self.tokens.verify(token, TokenKind::Access).map_err(|e| {
            tracing::debug!(reason = %e, "Access token rejected");
            AuthError::Unauthenticated
        })?;

        match self.store.find_by_id(verified.user_id).await? {
            Some(user) if user.is_active => Ok(AuthUser::from(&user)),
            Some(_) => {
                tracing::debug!(user_id = %verified.user_id, "Access token for deactivated user");
                Err(AuthError::Unauthenticated)
            }
            None => {
                tracing::debug!(user_id = %verified.user_id, "Access token for unknown user");
                Err(AuthError::Unauthenticated)
            }
        }
    }

    /// Same check as `authenticate`, but any failure yields no identity.
    pub async fn authenticate_optional(&self, token: Option<&str>) -> Option<AuthUser> {
        token?;
        self.authenticate(token).await.ok()
    }

    fn mint(&self, user_id: uuid::Uuid) -> Result<SessionTokens, AuthError> {
        Ok(SessionTokens {
            access: self.tokens.issue_access(user_id)?,
            refresh: self.tokens.issue_refresh(user_id)?,
        })
    }

    // Key derivation is deliberately slow; keep it off the async workers
    async fn hash_password(&self, password: String) -> Result<String, AuthError> {
        let hasher = self.hasher;
        let result = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Password hashing task failed");
                AuthError::InternalError
            })?;

        result.map_err(|e| match e {
            PasswordError::EmptyPassword => AuthError::validation("password", "Password is required"),
            PasswordError::Derivation => {
                tracing::error!("Password key derivation failed");
                AuthError::InternalError
            }
        })
    }

    async fn verify_password(&self, password: &str, digest: &str) -> Result<bool, AuthError> {
        let hasher = self.hasher;
        let (password, digest) = (password.to_string(), digest.to_string());
        tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Password verification task failed");
                AuthError::InternalError
            })
    }
}

/// 32 random bytes, hex encoded.
fn random_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().r#gen();
    hex::encode(bytes)
}
