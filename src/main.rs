mod auth;
mod config;
mod db;
mod error;
mod extractors;
mod mail;
mod routes;
mod state;
mod threads;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use rand::Rng;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::auth::token::TokenSigner;
use crate::config::{Cli, Config};
use crate::mail::{LogMailer, Mailer, SmtpMailer};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database and seed the general administrator
    let pool = db::create_pool(config.db_path())?;
    db::run_migrations(&pool)?;
    let admin_password = config.auth.admin_password.clone().unwrap_or_else(|| {
        tracing::warn!("No admin password configured, using the default");
        "admin123".to_string()
    });
    db::seed_general_admin(&pool, &admin_password)?;

    // Token signing key
    let secret = match config.auth.token_secret {
        Some(ref secret) => secret.clone(),
        None => {
            tracing::warn!("No token secret configured, generating a random one (tokens will not survive a restart)");
            let mut bytes = [0u8; 64];
            rand::thread_rng().fill(&mut bytes);
            hex::encode(bytes)
        }
    };
    let tokens = TokenSigner::new(secret.as_bytes(), config.auth.token_minutes * 60);

    // Outbound mail
    let mailer: Arc<dyn Mailer> = if config.mail.host.is_some() {
        Arc::new(SmtpMailer::new(&config.mail)?)
    } else {
        tracing::warn!("No SMTP host configured, outbound mail will be logged only");
        Arc::new(LogMailer)
    };

    // Build app state
    let state = AppState {
        db: pool,
        config: config.clone(),
        tokens: Arc::new(tokens),
        mailer,
    };

    let app = routes::router()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
