use actix_web::{delete, get, put, web, HttpResponse};
use uuid::Uuid;
use validator::Validate;

use crate::error::AuthError;
use crate::middleware::AuthUser;
use crate::models::dto::{ApiResponse, ListUsersQuery, NotificationQuery, UpdateProfileRequest, UpdateRoleRequest};
use crate::models::users::Role;
use crate::services::auth_service::AuthService;
use crate::services::user_service::UserService;
use crate::utils::cookies::clear_session;

/// GET /users/profile - own profile (protected)
#[get("/profile")]
pub async fn get_profile(
    user: AuthUser,
    users: web::Data<UserService>,
) -> Result<HttpResponse, AuthError> {
    let profile = users.profile(user.id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::with_data("User profile", profile)))
}

/// PUT /users/profile - names, phone, avatar (protected)
#[put("/profile")]
pub async fn update_profile(
    user: AuthUser,
    body: web::Json<UpdateProfileRequest>,
    users: web::Data<UserService>,
) -> Result<HttpResponse, AuthError> {
    let body = body.into_inner();
    body.validate()?;

    let profile = users.update_profile(user.id, body).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::with_data("Profile updated successfully", profile)))
}

/// DELETE /users/account - delete own account, drop the session (protected)
#[delete("/account")]
pub async fn delete_account(
    user: AuthUser,
    users: web::Data<UserService>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AuthError> {
    users.delete_account(&user).await?;

    let mut response = HttpResponse::Ok();
    clear_session(&mut response, auth.config());
    Ok(response.json(ApiResponse::message("Account deleted successfully")))
}

/// GET /users/notifications - own notices, paginated, `unreadOnly` filter (protected)
#[get("/notifications")]
pub async fn list_notifications(
    user: AuthUser,
    query: web::Query<NotificationQuery>,
    users: web::Data<UserService>,
) -> Result<HttpResponse, AuthError> {
    let list = users.notifications(&user, query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::with_data("Notifications", list)))
}

/// PUT /users/notifications/{id}/read (protected)
#[put("/notifications/{id}/read")]
pub async fn mark_notification_read(
    user: AuthUser,
    path: web::Path<Uuid>,
    users: web::Data<UserService>,
) -> Result<HttpResponse, AuthError> {
    users.mark_notification_read(&user, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::message("Notification marked as read")))
}

/// GET /users - paginated listing (ADMIN)
#[get("")]
pub async fn list_users(
    user: AuthUser,
    query: web::Query<ListUsersQuery>,
    users: web::Data<UserService>,
) -> Result<HttpResponse, AuthError> {
    user.require(&[Role::Admin])?;

    let list = users.list_users(query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::with_data("Users", list)))
}

/// PUT /users/{id}/role (ADMIN)
#[put("/{id}/role")]
pub async fn update_role(
    user: AuthUser,
    path: web::Path<Uuid>,
    body: web::Json<UpdateRoleRequest>,
    users: web::Data<UserService>,
) -> Result<HttpResponse, AuthError> {
    user.require(&[Role::Admin])?;

    let updated = users.update_role(&user, path.into_inner(), &body.role).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::with_data("User role updated successfully", updated)))
}

/// PUT /users/{id}/deactivate (ADMIN)
#[put("/{id}/deactivate")]
pub async fn deactivate_user(
    user: AuthUser,
    path: web::Path<Uuid>,
    users: web::Data<UserService>,
) -> Result<HttpResponse, AuthError> {
    user.require(&[Role::Admin])?;

    let updated = users.deactivate_user(&user, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::with_data("User deactivated successfully", updated)))
}

pub fn user_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/users")
            .service(get_profile)
            .service(update_profile)
            .service(delete_account)
            .service(list_notifications)
            .service(mark_notification_read)
            .service(list_users)
            .service(update_role)
            .service(deactivate_user),
    );
}
