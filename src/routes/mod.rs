pub mod auth;
pub mod health;
pub mod users;

use actix_web::{error, web};

use crate::error::AuthError;

/// Malformed JSON bodies, query strings and path ids answer with the same
/// validation envelope as rule violations.
fn extractor_config() -> (web::JsonConfig, web::QueryConfig, web::PathConfig) {
    let json = web::JsonConfig::default().error_handler(|err, _req| {
        tracing::debug!(error = %err, "Rejected request body");
        error::Error::from(AuthError::validation("body", &err.to_string()))
    });
    let query = web::QueryConfig::default().error_handler(|err, _req| {
        tracing::debug!(error = %err, "Rejected query string");
        error::Error::from(AuthError::validation("query", &err.to_string()))
    });
    let path = web::PathConfig::default().error_handler(|err, _req| {
        tracing::debug!(error = %err, "Rejected path parameter");
        error::Error::from(AuthError::validation("id", "Invalid id"))
    });
    (json, query, path)
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    let (json, query, path) = extractor_config();

    cfg.service(
        web::scope("/api")
            .app_data(json)
            .app_data(query)
            .app_data(path)
            .service(health::health_check)
            .configure(auth::auth_routes)
            .configure(users::user_routes),
    );
}
