use actix_web::{web, HttpResponse, Result};
use crate::api_error::ApiError;
use crate::http::AppState;

pub async fn health_check(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let database = match &state.db_pool {
        Some(pool) => {
            crate::db::health_check(pool).await?;
            "ok"
        }
        None => "memory",
    };

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "database": database,
        "active_matches": state.ladder.matches.active_matches().await.len()
    })))
}
