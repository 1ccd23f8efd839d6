//! MedTrack API server entry point.

use tracing_subscriber::{fmt, EnvFilter};

use medtrack_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,medtrack_api=debug,medtrack_db=info,tower_http=info"));
    fmt().with_env_filter(filter).init();

    let config = ApiConfig::load()?;
    medtrack_api::start_server(config).await
}
