use exchange::config::Config;
use exchange::router::create_router;
use exchange::state::AppState;
use exchange::store::Store;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "exchange=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env();
    tracing::info!(addr = %config.bind_addr, "starting exchange service");

    let store = match &config.data_dir {
        Some(dir) => Arc::new(Store::open(dir)?),
        None => {
            tracing::warn!("EXCHANGE_DATA_DIR unset; running with an ephemeral store");
            Arc::new(Store::in_memory())
        }
    };

    let addr = config.bind_addr;
    let state = AppState::new(store, config);
    let app = create_router(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
