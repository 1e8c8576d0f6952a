//! Explicit record of messages the bridge gave up on

use crate::transport::BridgeMessage;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// A message whose retries were exhausted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeadLetter {
    pub message: BridgeMessage,
    pub attempts: u32,
    pub last_error: String,
    pub failed_at: chrono::DateTime<chrono::Utc>,
}

/// Append-only dead-letter log.
#[derive(Default)]
pub struct DeadLetterLog {
    entries: RwLock<Vec<DeadLetter>>,
}

impl DeadLetterLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, letter: DeadLetter) {
        // A poisoned lock only means a writer panicked mid-push; the Vec is intact.
        let mut guard = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.push(letter);
    }

    pub fn entries(&self) -> Vec<DeadLetter> {
        self.entries
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .map(|guard| guard.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
