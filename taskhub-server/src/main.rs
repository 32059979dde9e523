//! `TaskHub` collaboration server -- task workflow and real-time chat.
//!
//! An axum server exposing REST routes for the task workflow and a
//! WebSocket endpoint for presence-aware direct messaging.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:8001
//! cargo run --bin taskhub-server
//!
//! # Run on custom address
//! cargo run --bin taskhub-server -- --bind 127.0.0.1:8080
//!
//! # Or via environment variable
//! TASKHUB_ADDR=127.0.0.1:8080 cargo run --bin taskhub-server
//! ```

use std::sync::Arc;

use clap::Parser;
use taskhub_server::config::{CliArgs, ServerConfig};
use taskhub_server::http::{self, AppState};
use taskhub_server::notify::{NotificationDispatcher, TracingMailer};

#[tokio::main]
async fn main() {
    let cli = CliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match ServerConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing with the resolved log level.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(addr = %config.bind_addr, "starting taskhub server");

    let mailer = TracingMailer {
        from: config.notify_from.clone(),
    };
    let (notices, _dispatcher) = NotificationDispatcher::spawn(mailer);
    let state = Arc::new(AppState::new(notices));

    match http::start_server(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "taskhub server listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start server");
            std::process::exit(1);
        }
    }
}
