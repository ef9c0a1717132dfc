use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn init_telemetry(default_filter: &str) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("ladder_backend={},actix_web=info", default_filter).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
