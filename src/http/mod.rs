pub mod admin_handler;
pub mod economy_handler;
pub mod health;
pub mod ladder_handler;

use actix_web::web;
use serde::Deserialize;
use std::sync::Arc;

use crate::db::DbPool;
use crate::service::LadderService;

/// Shared state of the HTTP workers
pub struct AppState {
    pub ladder: Arc<LadderService>,
    pub db_pool: Option<DbPool>,
    pub admin_token: Option<String>,
}

/// `?limit=` query parameter of list endpoints
#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

impl LimitQuery {
    pub fn or(&self, default: usize) -> usize {
        self.limit.unwrap_or(default).clamp(1, 100)
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(health::health_check))
            .configure(ladder_handler::configure_routes)
            .configure(economy_handler::configure_routes)
            .configure(admin_handler::configure_routes),
    );
}
