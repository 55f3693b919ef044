use actix_web::{get, web, HttpResponse, Responder};
use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;

/// Health check endpoint
///
/// Reports whether the database answers, with the current timestamp. Responds
/// `503 Service Unavailable` when it does not.
#[get("/health")]
pub async fn health(pool: web::Data<PgPool>) -> impl Responder {
    match sqlx::query("SELECT 1").execute(&**pool).await {
        Ok(_) => HttpResponse::Ok().json(json!({
            "status": "ok",
            "database": "ok",
            "timestamp": Utc::now()
        })),
        Err(e) => {
            log::warn!("health check could not reach the database: {}", e);
            HttpResponse::ServiceUnavailable().json(json!({
                "status": "unavailable",
                "database": "unreachable",
                "timestamp": Utc::now()
            }))
        }
    }
}
