//! Oracle network: one polling task per source

use crate::adapter::{SourceAdapter, SourceStats};
use crate::sources::SourceFormat;
use aegis_types::RawSignal;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

/// Status of one source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceStatus {
    pub name: String,
    pub format: SourceFormat,
    pub interval_secs: u64,
    pub running: bool,
    pub stats: SourceStats,
}

/// Snapshot of the whole network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleStatus {
    pub monitoring_active: bool,
    pub total_sources: usize,
    pub running_tasks: usize,
    pub sources: Vec<SourceStatus>,
}

/// Runs every adapter on its own interval and forwards signals to a sink.
pub struct OracleNetwork {
    adapters: Vec<Arc<SourceAdapter>>,
    handles: DashMap<String, JoinHandle<()>>,
}

impl OracleNetwork {
    pub fn new(adapters: Vec<SourceAdapter>) -> Self {
        Self {
            adapters: adapters.into_iter().map(Arc::new).collect(),
            handles: DashMap::new(),
        }
    }

    pub fn adapters(&self) -> &[Arc<SourceAdapter>] {
        &self.adapters
    }

    pub fn is_running(&self) -> bool {
        !self.handles.is_empty()
    }

    /// Spawn one polling task per adapter. Calling `start` twice is a no-op.
    pub fn start(&self, sink: mpsc::Sender<RawSignal>) {
        if self.is_running() {
            return;
        }

        for adapter in &self.adapters {
            let adapter = adapter.clone();
            let sink = sink.clone();
            let name = adapter.name().to_string();
            let interval_secs = adapter.interval().as_secs();

            let handle = tokio::spawn(async move {
                let mut ticker = interval(adapter.interval());
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

                loop {
                    ticker.tick().await;
                    if let Some(signal) = adapter.poll().await {
                        if sink.send(signal).await.is_err() {
                            warn!(source = %adapter.name(), "Signal sink closed, stopping source");
                            break;
                        }
                    }
                }
            });

            info!(
                source = %name,
                interval_secs,
                "Started monitoring source"
            );
            self.handles.insert(name, handle);
        }
    }

    /// Abort all polling tasks; in-flight fetches are dropped, not drained.
    pub fn stop(&self) {
        for item in self.handles.iter() {
            item.value().abort();
        }
        self.handles.clear();
        info!("Oracle monitoring stopped");
    }

    pub fn status(&self) -> OracleStatus {
        let sources: Vec<SourceStatus> = self
            .adapters
            .iter()
            .map(|adapter| SourceStatus {
                name: adapter.name().to_string(),
                format: adapter.format(),
                interval_secs: adapter.interval().as_secs(),
                running: self
                    .handles
                    .get(adapter.name())
                    .map_or(false, |handle| !handle.is_finished()),
                stats: adapter.stats(),
            })
            .collect();

        OracleStatus {
            monitoring_active: self.is_running(),
            total_sources: self.adapters.len(),
            running_tasks: sources.iter().filter(|s| s.running).count(),
            sources,
        }
    }
}

impl Drop for OracleNetwork {
    fn drop(&mut self) {
        for item in self.handles.iter() {
            item.value().abort();
        }
    }
}
