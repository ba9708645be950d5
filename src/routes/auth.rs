use actix_web::{get, post, web, HttpRequest, HttpResponse};
use validator::Validate;

use crate::error::AuthError;
use crate::middleware::{AuthUser, MaybeAuthUser};
use crate::models::dto::{
    ApiResponse, ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest,
};
use crate::services::auth_service::AuthService;
use crate::utils::cookies::{clear_session, set_session, REFRESH_COOKIE};

/// POST /auth/register - create an account and open a session (public)
#[post("/register")]
pub async fn register(
    body: web::Json<RegisterRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AuthError> {
    // 1. Shape checks
    let body = body.into_inner();
    body.validate()?;

    // 2. Create the account
    let session = auth.register(body).await?;

    // 3. Cookies + sanitized user
    let mut response = HttpResponse::Created();
    set_session(&mut response, session.tokens, auth.config());
    Ok(response.json(ApiResponse::with_data("User created successfully", session.user)))
}

/// POST /auth/login - username or email + password (public)
#[post("/login")]
pub async fn login(
    body: web::Json<LoginRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AuthError> {
    body.validate()?;

    let session = auth.login(&body.username, &body.password).await?;

    let mut response = HttpResponse::Ok();
    set_session(&mut response, session.tokens, auth.config());
    Ok(response.json(ApiResponse::with_data("Login successful", session.user)))
}

/// POST /auth/logout - always succeeds
#[post("/logout")]
pub async fn logout(user: MaybeAuthUser, auth: web::Data<AuthService>) -> HttpResponse {
    auth.logout(user.0.as_ref());

    let mut response = HttpResponse::Ok();
    clear_session(&mut response, auth.config());
    response.json(ApiResponse::message("Logout successful"))
}

/// POST /auth/refresh-token - rotate the session from the `refreshToken` cookie
#[post("/refresh-token")]
pub async fn refresh_token(req: HttpRequest, auth: web::Data<AuthService>) -> Result<HttpResponse, AuthError> {
    let presented = req.cookie(REFRESH_COOKIE).map(|c| c.value().to_string());

    let tokens = auth.refresh_session(presented.as_deref()).await?;

    let mut response = HttpResponse::Ok();
    set_session(&mut response, tokens, auth.config());
    Ok(response.json(ApiResponse::message("Token refreshed successfully")))
}

/// POST /auth/forgot-password - issue a reset ticket (public)
#[post("/forgot-password")]
pub async fn forgot_password(
    body: web::Json<ForgotPasswordRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AuthError> {
    body.validate()?;

    auth.request_password_reset(&body.email).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::message("Password reset instructions sent to your email")))
}

/// POST /auth/reset-password - redeem a reset ticket (public)
#[post("/reset-password")]
pub async fn reset_password(
    body: web::Json<ResetPasswordRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AuthError> {
    body.validate()?;

    auth.complete_password_reset(&body.token, &body.password).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::message("Password reset successfully")))
}

/// GET /auth/me - current identity, `null` when anonymous
#[get("/me")]
pub async fn me(user: MaybeAuthUser) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::<Option<AuthUser>>::with_data("Current user", user.0))
}

pub fn auth_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(register)
            .service(login)
            .service(logout)
            .service(refresh_token)
            .service(forgot_password)
            .service(reset_password)
            .service(me),
    );
}
