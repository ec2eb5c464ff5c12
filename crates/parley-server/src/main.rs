//! # parley-server
//!
//! HTTP front end for the Parley messaging backend.
//!
//! This binary provides:
//! - **Login** against accounts stored in the data file
//! - **Account provisioning** by admins (and admin creation by the bootstrap
//!   account)
//! - **Direct messages** with per-user inboxes
//! - **Groups** with invite/promote/demote/kick and a shared message log
//!
//! All state lives in a single JSON file rewritten after every change.

mod api;
mod config;
mod error;

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use parley_store::authz::BOOTSTRAP_USERNAME;
use parley_store::password::generate_password;
use parley_store::{Bootstrap, Store};

use crate::api::AppState;
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,parley_server=debug,parley_store=debug")),
        )
        .init();

    info!("Starting Parley server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open the store (creates the bootstrap admin on first run)
    // -----------------------------------------------------------------------
    let (password, generated) = match config.bootstrap_password.clone() {
        Some(password) => (password, false),
        None => (generate_password(), true),
    };
    let bootstrap = Bootstrap {
        password,
        email: config.bootstrap_email.clone(),
    };

    let data_file = config.data_file.clone();
    let open_with = bootstrap.clone();
    let (store, created) =
        tokio::task::spawn_blocking(move || Store::open(data_file, &open_with)).await??;

    if created && generated {
        warn!(
            username = BOOTSTRAP_USERNAME,
            password = %bootstrap.password,
            "Generated bootstrap admin password; set BOOTSTRAP_PASSWORD to choose one"
        );
    }

    let app_state = AppState {
        store: Arc::new(store),
    };

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, config.http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
