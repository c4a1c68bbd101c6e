mod api;
mod router;
mod state;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use genoscore_core::Config;

#[derive(Parser, Debug)]
#[command(
    name = "genoscore-server",
    about = "Gene scoring rubric engine HTTP server"
)]
struct Cli {
    /// Bind address override, e.g. 127.0.0.1:8420
    #[arg(long, env = "GENOSCORE_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    genoscore_core::config::load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let bind = cli.bind.unwrap_or_else(|| config.server.bind_addr());

    let state = Arc::new(state::AppState::new(config));
    let app = router::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    info!("genoscore-server listening on {} (docs at /docs)", bind);
    axum::serve(listener, app).await?;

    Ok(())
}
