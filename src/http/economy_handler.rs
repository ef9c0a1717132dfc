use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::api_error::ApiError;
use crate::http::{AppState, LimitQuery};
use crate::models::PlayerId;

/// GET /api/players/{player}/balance
pub async fn balance(state: web::Data<AppState>, path: web::Path<String>) -> Result<impl Responder, ApiError> {
    let player = PlayerId::from(path.into_inner());
    let tokens = state.ladder.ledger.balance(&player).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "player": player,
        "tokens": tokens,
    })))
}

/// POST /api/players/{player}/register
pub async fn register(state: web::Data<AppState>, path: web::Path<String>) -> Result<impl Responder, ApiError> {
    let player = state.ladder.ledger.register(&PlayerId::from(path.into_inner())).await?;
    Ok(HttpResponse::Ok().json(player))
}

#[derive(Debug, Deserialize, Validate)]
pub struct TransferRequest {
    #[validate(length(min = 1, max = 64))]
    pub to: String,
    #[validate(range(min = 1))]
    pub amount: i64,
}

/// POST /api/players/{player}/transfer
pub async fn transfer(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<TransferRequest>,
) -> Result<impl Responder, ApiError> {
    req.validate()?;
    let from = PlayerId::from(path.into_inner());
    let to = PlayerId::from(req.to.as_str());

    info!(from = %from, to = %to, amount = req.amount, "Received transfer request");

    let receipt = state.ladder.ledger.transfer(&from, &to, req.amount).await?;
    Ok(HttpResponse::Ok().json(receipt))
}

/// GET /api/tokens/leaderboard
pub async fn token_leaderboard(
    state: web::Data<AppState>,
    query: web::Query<LimitQuery>,
) -> Result<impl Responder, ApiError> {
    Ok(HttpResponse::Ok().json(state.ladder.ledger.token_leaderboard(query.or(10)).await))
}

/// GET /api/players/{player}/bets
pub async fn bet_history(state: web::Data<AppState>, path: web::Path<String>) -> Result<impl Responder, ApiError> {
    let player = PlayerId::from(path.into_inner());
    Ok(HttpResponse::Ok().json(state.ladder.betting.bets_by(&player).await))
}

// =============================================================================
// SHOP
// =============================================================================

/// GET /api/players/{player}/perks
pub async fn perks(state: web::Data<AppState>, path: web::Path<String>) -> Result<impl Responder, ApiError> {
    let player = PlayerId::from(path.into_inner());
    Ok(HttpResponse::Ok().json(state.ladder.perks.active_perks(&player).await))
}

/// POST /api/players/{player}/perks/highlight
pub async fn buy_highlight(state: web::Data<AppState>, path: web::Path<String>) -> Result<impl Responder, ApiError> {
    let perk = state
        .ladder
        .perks
        .buy_highlight(&PlayerId::from(path.into_inner()))
        .await?;
    Ok(HttpResponse::Created().json(perk))
}

#[derive(Debug, Deserialize, Validate)]
pub struct TauntRequest {
    #[validate(length(min = 1, max = 100))]
    pub text: String,
}

/// POST /api/players/{player}/perks/taunt
pub async fn buy_taunt(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<TauntRequest>,
) -> Result<impl Responder, ApiError> {
    req.validate()?;
    let perk = state
        .ladder
        .perks
        .buy_taunt(&PlayerId::from(path.into_inner()), &req.text)
        .await?;
    Ok(HttpResponse::Created().json(perk))
}

/// Routes nested under `/players/{player}`
pub fn configure_player_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/balance", web::get().to(balance))
        .route("/register", web::post().to(register))
        .route("/transfer", web::post().to(transfer))
        .route("/bets", web::get().to(bet_history))
        .route("/perks", web::get().to(perks))
        .route("/perks/highlight", web::post().to(buy_highlight))
        .route("/perks/taunt", web::post().to(buy_taunt));
}

/// Configure token economy routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/tokens/leaderboard", web::get().to(token_leaderboard));
}
