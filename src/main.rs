mod chat;
mod config;
mod lifecycle;
mod media;
mod moderation;
mod room;
mod routes;
mod state;
mod ws;

use std::time::Duration;
use tokio::net::TcpListener;

use config::{generate_config_template, Config};
use state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "huddle_server=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "huddle_server=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("Huddle server v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        room_grace_secs = config.room_grace_secs,
        "Empty-room grace window configured"
    );

    let app_state = AppState::new(Duration::from_secs(config.room_grace_secs));
    let app = routes::build_router(app_state);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
