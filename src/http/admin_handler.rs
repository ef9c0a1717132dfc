use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::api_error::ApiError;
use crate::http::{AppState, LimitQuery};
use crate::models::{Mode, PlayerId};

pub const ADMIN_TOKEN_HEADER: &str = "X-Admin-Token";

/// Admin endpoints are closed unless a token is configured and presented
fn require_admin(req: &HttpRequest, state: &AppState) -> Result<(), ApiError> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Err(ApiError::forbidden());
    };
    let presented = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());

    if !presented.is_some_and(|token| token_matches(token, expected)) {
        warn!(path = %req.path(), "Rejected admin request");
        return Err(ApiError::Unauthorized);
    }
    Ok(())
}

/// Compares in time independent of where the inputs first differ
fn token_matches(presented: &str, expected: &str) -> bool {
    let (a, b) = (presented.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// =============================================================================
// MATCH CORRECTIONS
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct ReverseRequest {
    #[validate(length(min = 1, max = 64))]
    pub replacement_winner: Option<String>,
}

/// POST /api/admin/matches/{id}/reverse
pub async fn reverse_match(
    http: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: web::Json<ReverseRequest>,
) -> Result<impl Responder, ApiError> {
    require_admin(&http, &state)?;
    req.validate()?;
    let match_id = path.into_inner();
    let replacement = req.replacement_winner.as_deref().map(PlayerId::from);

    info!(match_id = %match_id, replacement = ?replacement, "Received reversal request");

    let result = state.ladder.matches.reverse(match_id, replacement.as_ref()).await?;
    Ok(HttpResponse::Ok().json(result))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForceResultRequest {
    #[validate(length(min = 1, max = 64))]
    pub winner: String,
    #[validate(length(min = 1, max = 64))]
    pub loser: String,
    pub mode: String,
}

/// POST /api/admin/results
pub async fn force_result(
    http: HttpRequest,
    state: web::Data<AppState>,
    req: web::Json<ForceResultRequest>,
) -> Result<impl Responder, ApiError> {
    require_admin(&http, &state)?;
    req.validate()?;
    let mode: Mode = req.mode.parse()?;

    let result = state
        .ladder
        .matches
        .force_result(
            &PlayerId::from(req.winner.as_str()),
            &PlayerId::from(req.loser.as_str()),
            mode,
        )
        .await?;
    Ok(HttpResponse::Created().json(result))
}

/// GET /api/admin/matches/recent
pub async fn recent_matches(
    http: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<LimitQuery>,
) -> Result<impl Responder, ApiError> {
    require_admin(&http, &state)?;
    Ok(HttpResponse::Ok().json(state.ladder.matches.recent_history(query.or(10)).await))
}

// =============================================================================
// PLAYER CORRECTIONS
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct AdjustEloRequest {
    pub mode: String,
    #[validate(range(min = 0, max = 5000))]
    pub elo: i32,
}

/// PUT /api/admin/players/{player}/elo
pub async fn adjust_elo(
    http: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<AdjustEloRequest>,
) -> Result<impl Responder, ApiError> {
    require_admin(&http, &state)?;
    req.validate()?;
    let mode: Mode = req.mode.parse()?;

    let rating = state
        .ladder
        .matches
        .adjust_elo(&PlayerId::from(path.into_inner()), mode, req.elo)
        .await?;
    Ok(HttpResponse::Ok().json(rating))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetBalanceRequest {
    #[validate(range(min = 0))]
    pub amount: i64,
}

/// PUT /api/admin/players/{player}/balance
pub async fn set_balance(
    http: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<SetBalanceRequest>,
) -> Result<impl Responder, ApiError> {
    require_admin(&http, &state)?;
    req.validate()?;

    let player = state
        .ladder
        .ledger
        .set_balance(&PlayerId::from(path.into_inner()), req.amount)
        .await?;
    Ok(HttpResponse::Ok().json(player))
}

/// POST /api/admin/sweeps
pub async fn run_sweeps(http: HttpRequest, state: web::Data<AppState>) -> Result<impl Responder, ApiError> {
    require_admin(&http, &state)?;
    let report = state.ladder.run_sweeps(chrono::Utc::now()).await;
    Ok(HttpResponse::Ok().json(report))
}

/// Configure admin routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/matches/recent", web::get().to(recent_matches))
            .route("/matches/{id}/reverse", web::post().to(reverse_match))
            .route("/results", web::post().to(force_result))
            .route("/players/{player}/elo", web::put().to(adjust_elo))
            .route("/players/{player}/balance", web::put().to(set_balance))
            .route("/sweeps", web::post().to(run_sweeps)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::LadderConfig;
    use crate::models::RewardTiers;
    use crate::service::{Collaborators, LadderService, LogGateway};
    use crate::store::Store;
    use actix_web::{http::StatusCode, test, App};
    use std::sync::Arc;

    fn create_test_state(admin_token: Option<&str>) -> web::Data<AppState> {
        let ladder = LadderService::new(
            Store::in_memory(),
            Arc::new(SystemClock),
            Collaborators::from_gateway(Arc::new(LogGateway)),
            &LadderConfig::default(),
            RewardTiers::default_ladder(),
        );
        web::Data::new(AppState {
            ladder: Arc::new(ladder),
            db_pool: None,
            admin_token: admin_token.map(str::to_string),
        })
    }

    #[actix_web::test]
    async fn test_admin_requires_token() {
        let app = test::init_service(
            App::new()
                .app_data(create_test_state(Some("secret")))
                .service(web::scope("/api").configure(configure_routes)),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/admin/matches/recent").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/api/admin/matches/recent")
            .insert_header((ADMIN_TOKEN_HEADER, "secret"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[::core::prelude::v1::test]
    fn test_token_matches() {
        assert!(token_matches("secret", "secret"));
        assert!(!token_matches("secreT", "secret"));
        assert!(!token_matches("secret-longer", "secret"));
        assert!(!token_matches("", "secret"));
    }

    #[actix_web::test]
    async fn test_admin_rejects_wrong_token() {
        let app = test::init_service(
            App::new()
                .app_data(create_test_state(Some("secret")))
                .service(web::scope("/api").configure(configure_routes)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/admin/sweeps")
            .insert_header((ADMIN_TOKEN_HEADER, "secres"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_admin_disabled_without_token() {
        let app = test::init_service(
            App::new()
                .app_data(create_test_state(None))
                .service(web::scope("/api").configure(configure_routes)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/admin/sweeps")
            .insert_header((ADMIN_TOKEN_HEADER, "anything"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
