use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::api_error::ApiError;
use crate::http::{AppState, LimitQuery};
use crate::models::{Mode, PlayerId};

fn parse_mode(raw: &str) -> Result<Mode, ApiError> {
    Ok(raw.parse::<Mode>()?)
}

// =============================================================================
// QUEUE
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct EnqueueRequest {
    #[validate(length(min = 1, max = 16))]
    pub mode: String,
}

/// POST /api/players/{player}/queue
pub async fn enqueue(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<EnqueueRequest>,
) -> Result<impl Responder, ApiError> {
    req.validate()?;
    let player = PlayerId::from(path.into_inner());
    let mode = parse_mode(&req.mode)?;

    info!(player = %player, mode = %mode, "Received enqueue request");

    let outcome = state.ladder.queue.enqueue(&player, mode).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// DELETE /api/players/{player}/queue/{mode}
pub async fn dequeue(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<impl Responder, ApiError> {
    let (player, mode) = path.into_inner();
    let mode = parse_mode(&mode)?;

    let outcome = state.ladder.queue.dequeue(&PlayerId::from(player), mode).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// POST /api/players/{player}/leave
pub async fn leave(state: web::Data<AppState>, path: web::Path<String>) -> Result<impl Responder, ApiError> {
    let player = PlayerId::from(path.into_inner());
    let outcome = state.ladder.leave(&player).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// GET /api/players/{player}/status
pub async fn status(state: web::Data<AppState>, path: web::Path<String>) -> Result<impl Responder, ApiError> {
    let player = PlayerId::from(path.into_inner());
    Ok(HttpResponse::Ok().json(state.ladder.queue.status(&player).await))
}

/// GET /api/queues/{mode}
pub async fn waiting(state: web::Data<AppState>, path: web::Path<String>) -> Result<impl Responder, ApiError> {
    let mode = parse_mode(&path.into_inner())?;
    Ok(HttpResponse::Ok().json(state.ladder.queue.waiting(mode).await))
}

/// POST /api/queues/{mode}/pair
pub async fn pair(state: web::Data<AppState>, path: web::Path<String>) -> Result<impl Responder, ApiError> {
    let mode = parse_mode(&path.into_inner())?;
    let paired = state.ladder.queue.pair_if_possible(mode).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "paired": paired.as_ref().map(|(m, _)| m),
        "warnings": paired.map(|(_, w)| w).unwrap_or_default(),
    })))
}

// =============================================================================
// MATCHES
// =============================================================================

/// GET /api/matches/active
pub async fn active_matches(state: web::Data<AppState>) -> Result<impl Responder, ApiError> {
    Ok(HttpResponse::Ok().json(state.ladder.matches.active_matches().await))
}

/// GET /api/matches/{id}
pub async fn get_match(state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<impl Responder, ApiError> {
    let record = state.ladder.matches.get_match(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(record))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReportResultRequest {
    #[validate(length(min = 1, max = 64))]
    pub winner: String,
}

/// POST /api/matches/{id}/result
pub async fn report_result(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: web::Json<ReportResultRequest>,
) -> Result<impl Responder, ApiError> {
    req.validate()?;
    let match_id = path.into_inner();

    info!(match_id = %match_id, winner = %req.winner, "Received match result");

    let result = state
        .ladder
        .matches
        .resolve(match_id, &PlayerId::from(req.winner.as_str()))
        .await?;
    Ok(HttpResponse::Ok().json(result))
}

/// POST /api/players/{player}/abandon
pub async fn abandon(state: web::Data<AppState>, path: web::Path<String>) -> Result<impl Responder, ApiError> {
    let player = PlayerId::from(path.into_inner());
    let result = state.ladder.matches.abandon(&player).await?;
    Ok(HttpResponse::Ok().json(result))
}

// =============================================================================
// BETS
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct PlaceBetRequest {
    #[validate(length(min = 1, max = 64))]
    pub bettor: String,
    #[validate(length(min = 1, max = 64))]
    pub side: String,
    pub amount: i64,
}

/// POST /api/matches/{id}/bets
pub async fn place_bet(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: web::Json<PlaceBetRequest>,
) -> Result<impl Responder, ApiError> {
    req.validate()?;
    let bet = state
        .ladder
        .betting
        .place_bet(
            &PlayerId::from(req.bettor.as_str()),
            path.into_inner(),
            &PlayerId::from(req.side.as_str()),
            req.amount,
        )
        .await?;
    Ok(HttpResponse::Created().json(bet))
}

/// GET /api/matches/{id}/bets
pub async fn match_bets(state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<impl Responder, ApiError> {
    Ok(HttpResponse::Ok().json(state.ladder.betting.bets_for_match(path.into_inner()).await))
}

// =============================================================================
// STANDINGS & HISTORY
// =============================================================================

/// GET /api/leaderboard/{mode}
pub async fn leaderboard(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<LimitQuery>,
) -> Result<impl Responder, ApiError> {
    let mode = parse_mode(&path.into_inner())?;
    Ok(HttpResponse::Ok().json(state.ladder.leaderboard.leaderboard(mode, query.or(10)).await))
}

/// GET /api/players/{player}/rank/{mode}
pub async fn rank(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<impl Responder, ApiError> {
    let (player, mode) = path.into_inner();
    let mode = parse_mode(&mode)?;
    let rank = state.ladder.leaderboard.rank(&PlayerId::from(player), mode).await?;
    Ok(HttpResponse::Ok().json(rank))
}

/// GET /api/players/{player}/ratings
pub async fn ratings(state: web::Data<AppState>, path: web::Path<String>) -> Result<impl Responder, ApiError> {
    let ratings = state
        .ladder
        .leaderboard
        .ratings_for(&PlayerId::from(path.into_inner()))
        .await?;
    let body: Vec<_> = ratings
        .iter()
        .map(|r| {
            serde_json::json!({
                "mode": r.mode,
                "elo": r.elo,
                "matches": r.matches,
                "wins": r.wins,
                "win_rate": r.win_rate(),
            })
        })
        .collect();
    Ok(HttpResponse::Ok().json(body))
}

/// GET /api/players/{player}/history
pub async fn history(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<LimitQuery>,
) -> Result<impl Responder, ApiError> {
    let player = PlayerId::from(path.into_inner());
    Ok(HttpResponse::Ok().json(state.ladder.matches.history_for(&player, query.or(10)).await))
}

/// GET /api/players/{player}/elo/{mode}
pub async fn elo_history(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<impl Responder, ApiError> {
    let (player, mode) = path.into_inner();
    let mode = parse_mode(&mode)?;
    Ok(HttpResponse::Ok().json(state.ladder.matches.elo_history(&PlayerId::from(player), mode).await))
}

// =============================================================================
// REWARD TIERS
// =============================================================================

/// GET /api/players/{player}/tiers
pub async fn rewards(state: web::Data<AppState>, path: web::Path<String>) -> Result<impl Responder, ApiError> {
    let player = PlayerId::from(path.into_inner());
    Ok(HttpResponse::Ok().json(state.ladder.tiers.rewards_for(&player).await))
}

/// POST /api/players/{player}/tiers
pub async fn resolve_tier(state: web::Data<AppState>, path: web::Path<String>) -> Result<impl Responder, ApiError> {
    let player = PlayerId::from(path.into_inner());
    let (change, warnings) = state.ladder.tiers.resolve(&player).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "change": change,
        "warnings": warnings,
    })))
}

/// Configure queue, match and standings routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/players/{player}")
            .route("/queue", web::post().to(enqueue))
            .route("/queue/{mode}", web::delete().to(dequeue))
            .route("/leave", web::post().to(leave))
            .route("/abandon", web::post().to(abandon))
            .route("/status", web::get().to(status))
            .route("/rank/{mode}", web::get().to(rank))
            .route("/ratings", web::get().to(ratings))
            .route("/history", web::get().to(history))
            .route("/elo/{mode}", web::get().to(elo_history))
            .route("/tiers", web::get().to(rewards))
            .route("/tiers", web::post().to(resolve_tier))
            .configure(crate::http::economy_handler::configure_player_routes),
    )
    .service(
        web::scope("/queues")
            .route("/{mode}", web::get().to(waiting))
            .route("/{mode}/pair", web::post().to(pair)),
    )
    .service(
        web::scope("/matches")
            .route("/active", web::get().to(active_matches))
            .route("/{id}", web::get().to(get_match))
            .route("/{id}/result", web::post().to(report_result))
            .route("/{id}/bets", web::post().to(place_bet))
            .route("/{id}/bets", web::get().to(match_bets)),
    )
    .route("/leaderboard/{mode}", web::get().to(leaderboard));
}
