// Copyright 2025 Convolens (https://github.com/convolens)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Convolens server: the HTTP boundary, configuration, and background
//! producer scheduling on top of the record store.
//!
//! `run_server` wires the pieces together: it opens the store (durable or
//! memory-only per config), spawns one task per registered producer, and
//! serves the API until the process is told to stop.

pub mod api;
pub mod config;
pub mod producers;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::AppState;
use config::ServerConfig;
use convolens_storage::RecordStore;
use producers::{InsightProducer, ProducerRunner};

pub async fn run_server(
    config: ServerConfig,
    producers: Vec<Arc<dyn InsightProducer>>,
) -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "convolens_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Convolens Server");
    tracing::info!("Configuration: {:#?}", config);

    // Validate configuration
    config.validate()?;

    // Open the record store
    let store = match config.storage.data_path() {
        Some(data_dir) => {
            tracing::info!("Opening record store at {}", data_dir.display());
            Arc::new(RecordStore::open(
                &data_dir,
                config.storage.transcript_window,
            )?)
        }
        None => {
            tracing::warn!("No data directory configured, records will not survive a restart");
            Arc::new(RecordStore::in_memory(config.storage.transcript_window))
        }
    };

    // Spawn background producers
    let mut runner = ProducerRunner::new(
        Arc::clone(&store),
        Duration::from_secs(config.agents.tick_secs),
    );
    for producer in producers {
        runner.spawn(producer);
    }
    tracing::info!(producers = runner.task_count(), "producer runner started");

    let state = AppState {
        store,
        experts: Arc::new(config.agents.experts.clone()),
    };

    let app = api::router(state)
        .layer(if config.server.enable_cors {
            CorsLayer::new()
                .allow_methods(Any)
                .allow_headers(Any)
                .allow_origin(Any)
        } else {
            CorsLayer::new()
        })
        .layer(TraceLayer::new_for_http());

    // Get listen address
    let addr = config.socket_addr()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    tokio::select! {
        _ = server_handle => {
            tracing::info!("HTTP server stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    // Stop producer tasks before dropping the store.
    runner.shutdown().await;

    Ok(())
}
