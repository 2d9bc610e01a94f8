// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `kindred serve` command implementation.
//!
//! Opens SQLite storage, builds the vendor-backed collaborators, spawns the
//! session hub and serves the gateway until a shutdown signal arrives.

use std::sync::Arc;

use kindred_config::model::KindredConfig;
use kindred_core::KindredError;
use kindred_gateway::{GatewayState, start_server};
use kindred_hub::{HubContext, Services};
use kindred_openai::OpenAiProvider;
use kindred_storage::SqliteStore;
use tracing::{error, info, warn};

use crate::characters::ConfiguredCharacters;
use crate::shutdown;

/// Runs the `kindred serve` command.
pub async fn run_serve(config: KindredConfig) -> Result<(), KindredError> {
    init_tracing(&config.server.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "starting kindred serve");

    let store = Arc::new(SqliteStore::open(&config.storage).await?);
    info!(path = %config.storage.database_path, "storage opened");

    let services = build_services(&config, store.clone())?;
    let cancel = shutdown::install_signal_handler();
    let (ctx, hub_task) = HubContext::start(services, config.hub.clone(), cancel.clone());

    let result = start_server(&config.server, GatewayState::new(ctx), cancel.clone()).await;
    if let Err(e) = &result {
        error!(error = %e, "gateway stopped with error");
    }

    // The hub closes every live session once it sees the cancellation.
    cancel.cancel();
    if let Err(e) = hub_task.await {
        warn!(error = %e, "session hub task ended abnormally");
    }

    match Arc::try_unwrap(store) {
        Ok(store) => store.close().await?,
        Err(_) => warn!("storage still in use at shutdown, skipping checkpoint"),
    }

    info!("kindred stopped");
    result
}

/// Wires configured characters, the OpenAI-compatible provider and SQLite
/// storage into the hub's collaborator set.
pub fn build_services(
    config: &KindredConfig,
    store: Arc<SqliteStore>,
) -> Result<Services, KindredError> {
    let characters = ConfiguredCharacters::new(&config.characters);
    if characters.is_empty() {
        warn!("no [[characters]] configured, connections will report an unavailable character");
    } else {
        info!(count = characters.len(), "characters loaded");
    }

    let openai = Arc::new(OpenAiProvider::new(&config.openai)?);

    Ok(Services {
        characters: Arc::new(characters),
        generator: openai.clone(),
        stt: openai.clone(),
        tts: openai,
        messages: store.clone(),
        audio: store,
    })
}

/// Initializes the tracing subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("kindred={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
