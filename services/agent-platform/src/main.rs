use agent_platform::config::Config;
use agent_platform::router::create_router;
use agent_platform::state::AppState;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agent_platform=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env();
    tracing::info!(addr = %config.bind_addr, "starting agent platform");

    let state = AppState::new();
    let app = create_router(state);

    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
