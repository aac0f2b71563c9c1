use tracing::info;
use tracing_subscriber::EnvFilter;

use waypoint_config::log::LogFormat;
use waypoint_server::server::router;
use waypoint_server::shared_state::SharedState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::var("WAYPOINT_CONFIG_FILE_PATH")
        .map_err(|_| "WAYPOINT_CONFIG_FILE_PATH must point to a JSON configuration file")?;
    let raw = std::fs::read_to_string(&config_path)?;
    let config = waypoint_config::parse_json_config(&raw)?;

    let filter =
        EnvFilter::try_new(&config.log.level).unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log.format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
    }

    let addr = config.address();
    let state = SharedState::new(config)?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Waypoint listening on {addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
