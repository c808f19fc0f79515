use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use betvis_service::{router, AppState};

#[derive(Parser)]
#[command(name = "betvis-service", about = "Experiment backend for betvis")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:9200")]
    listen: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let app = router(AppState::new());

    info!(addr = %args.listen, "betvis service listening");
    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .context("failed to bind listen address")?;
    axum::serve(listener, app).await?;
    Ok(())
}
