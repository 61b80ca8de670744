//! crisiscast HTTP server
//!
//! Starts an Axum web server that drafts emergency notifications.

use clap::Parser;
use crisiscast::{
    cli::{Cli, Command, generate_config_template},
    config::{Config, EnvOverrides},
    delivery::DeliveryCredentials,
    handlers::{self, AppState},
    telemetry,
};
use std::net::SocketAddr;
use std::path::Path;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Command::Config { output }) = cli.command {
        let template = generate_config_template();
        match output {
            Some(path) => {
                std::fs::write(&path, template)?;
                eprintln!("Wrote configuration template to {}", path);
            }
            None => print!("{}", template),
        }
        return Ok(());
    }

    let config_missing = !Path::new(&cli.config).exists();
    let config = if config_missing {
        Config::default()
    } else {
        Config::from_file(&cli.config)?
    };

    telemetry::init(&config.observability.log_level);

    if config_missing {
        tracing::warn!(path = %cli.config, "Config file not found, using defaults");
    }

    let env = EnvOverrides::from_env();
    let credentials = DeliveryCredentials::from_env();
    tracing::debug!(?env, ?credentials, "Loaded environment settings");

    let state = AppState::new(config, env, credentials)?;

    let effective = state.config();
    tracing::info!(
        backend = ?state.pipeline().backend(),
        configured_model = effective.provider.model(),
        languages = ?effective.generation.translation_languages,
        "Effective configuration"
    );

    let addr = SocketAddr::from((
        effective
            .server
            .host
            .parse::<std::net::IpAddr>()
            .unwrap_or_else(|_| std::net::IpAddr::from([0, 0, 0, 0])),
        effective.server.port,
    ));
    let app = handlers::build_router(state.clone());

    tracing::info!("Starting crisiscast server on {}", addr);
    tracing::info!("Health check available at http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
