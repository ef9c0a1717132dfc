use actix_cors::Cors;

/// CORS for the bot and dashboards. With an origin configured only that origin
/// may call the API; otherwise any origin is accepted.
pub fn cors_middleware(allowed_origin: Option<&str>) -> Cors {
    let cors = match allowed_origin {
        Some(origin) => Cors::default().allowed_origin(origin),
        None => Cors::default().allow_any_origin(),
    };
    cors.allow_any_method().allow_any_header().max_age(3600)
}
