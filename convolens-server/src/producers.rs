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

//! Background producers that turn conversation context into results.
//!
//! A producer is anything that, given a user's recent transcript, can emit
//! (channel, payload) pairs: a search backend, an entity definer, an expert
//! agent prompt. The runner schedules each registered producer on a fixed
//! tick and publishes whatever it returns through the same store interface
//! the HTTP layer reads from.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use convolens_storage::RecordStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{error, info, warn};

/// How a producer obtains transcript context for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMode {
    /// Read the window without consuming it. The producer sees overlapping
    /// context across ticks as the window slides.
    Peek,
    /// Consume the window. Each fragment reaches this producer once.
    Drain,
}

/// A source of results: given a user's recent conversation context, return
/// zero or more (channel, payload) pairs to publish.
///
/// How a producer turns context into payloads is its own business; the
/// runner only schedules it and routes its output.
#[async_trait]
pub trait InsightProducer: Send + Sync {
    /// Stable name used in logs.
    fn name(&self) -> &str;

    /// Whether this producer peeks at or drains the transcript window.
    fn context_mode(&self) -> ContextMode;

    /// Tick override for producers that need their own cadence. `None`
    /// runs on the runner's default tick.
    fn interval(&self) -> Option<Duration> {
        None
    }

    /// Produce results for one user from their current context.
    async fn produce(
        &self,
        user_id: &str,
        context: &str,
    ) -> anyhow::Result<Vec<(String, serde_json::Value)>>;
}

/// Runs registered producers on a fixed tick, one tokio task per producer.
///
/// Each tick a producer visits every user whose window holds fragments,
/// obtains context according to its mode, and publishes whatever it
/// returns. A producer failing for one user is logged and skipped; it never
/// stops the task or affects other users.
pub struct ProducerRunner {
    store: Arc<RecordStore>,
    tick: Duration,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl ProducerRunner {
    pub fn new(store: Arc<RecordStore>, tick: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            store,
            tick,
            shutdown_tx,
            shutdown_rx,
            tasks: Vec::new(),
        }
    }

    /// Spawns the scheduling task for one producer. The first pass runs
    /// immediately, then on every tick until shutdown.
    pub fn spawn(&mut self, producer: Arc<dyn InsightProducer>) {
        let store = Arc::clone(&self.store);
        let tick = producer.interval().unwrap_or(self.tick);
        let mut shutdown_rx = self.shutdown_rx.clone();

        let handle = tokio::spawn(async move {
            info!(producer = producer.name(), "producer task started");
            let mut ticker = interval(tick);
            loop {
                // The wait_for guard must be dropped before the pass runs, so
                // the select arms themselves never await.
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown_rx.wait_for(|stop| *stop) => break,
                }
                run_pass(&store, producer.as_ref()).await;
            }
            info!(producer = producer.name(), "producer task stopped");
        });
        self.tasks.push(handle);
    }

    /// Number of producer tasks currently spawned.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Signals every producer task to stop and waits for them to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        futures::future::join_all(self.tasks).await;
    }
}

/// One scheduling pass for one producer over every user with context.
async fn run_pass(store: &RecordStore, producer: &dyn InsightProducer) {
    for user_id in store.user_ids_with_transcripts() {
        let context = match producer.context_mode() {
            ContextMode::Peek => store.peek_transcript_as_text(&user_id),
            ContextMode::Drain => match store.drain_transcript(&user_id) {
                Ok(fragments) => fragments
                    .iter()
                    .map(|fragment| fragment.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" "),
                Err(err) => {
                    warn!(
                        producer = producer.name(),
                        user_id,
                        error = %err,
                        "failed to drain transcript"
                    );
                    continue;
                }
            },
        };
        // Another drain-mode producer may have emptied the window since we
        // enumerated users.
        if context.is_empty() {
            continue;
        }

        let results = match producer.produce(&user_id, &context).await {
            Ok(results) => results,
            Err(err) => {
                warn!(
                    producer = producer.name(),
                    user_id,
                    error = %err,
                    "producer failed, skipping user"
                );
                continue;
            }
        };

        for (channel, payload) in results {
            if let Err(err) = store.publish(&user_id, &channel, payload) {
                error!(
                    producer = producer.name(),
                    user_id,
                    channel,
                    error = %err,
                    "failed to publish result"
                );
            }
        }
    }
}
