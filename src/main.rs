use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use homefeed::{build_router, build_state};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::from_filename(".env.local");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,homefeed=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("HOMEFEED_CONFIG").ok())
        .unwrap_or_else(|| "homefeed.toml".to_string());
    let config = homefeed::core::config::load_config(&PathBuf::from(&config_path))?;
    info!(path = %config_path, feeds = config.feeds.len(), "loaded config");

    let bind_address = config.server.bind_address.clone();
    let state = Arc::new(build_state(config)?);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!(address = %bind_address, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
