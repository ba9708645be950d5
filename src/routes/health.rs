use actix_web::{get, HttpResponse};
use chrono::Utc;

use crate::models::health::HealthResponse;

#[get("/health")]
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        time: Utc::now(),
    })
}
