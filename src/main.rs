mod api;
mod config;
mod error;
mod graph;
mod normalize;
mod ops;
mod store;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::Config;
use crate::store::GraphStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = Config::from_env();
    let addr = config
        .listen_addr()
        .map_err(|_| "invalid NOTEGRAPH_HOST or NOTEGRAPH_PORT")?;

    let store = tokio::task::spawn_blocking({
        let data_path = config.data_path.clone();
        move || GraphStore::open(data_path)
    })
    .await?;
    let app = api::router(AppState::new(store));

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(
        addr = %addr,
        data_path = %config.data_path.display(),
        "graph notes listening on http://{}",
        addr
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("graph notes stopped");
    Ok(())
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("notegraph=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
