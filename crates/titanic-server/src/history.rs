//! In-memory prediction history.
//!
//! Only the most recent `view_limit` entries are retained; the running total
//! counts every successful prediction since startup. Appends go through the
//! write lock so concurrent handlers never lose an update.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use titanic_core::PassengerRecord;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::api::PredictionResponse;

/// One served prediction.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub input: PassengerRecord,
    pub output: PredictionResponse,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct HistoryInner {
    entries: VecDeque<HistoryEntry>,
    total: u64,
}

#[derive(Debug)]
pub struct PredictionHistory {
    view_limit: usize,
    inner: RwLock<HistoryInner>,
}

impl PredictionHistory {
    pub fn new(view_limit: usize) -> Self {
        Self {
            view_limit,
            inner: RwLock::new(HistoryInner::default()),
        }
    }

    /// Append a prediction, evicting the oldest entry beyond the view limit.
    pub async fn record(&self, input: PassengerRecord, output: PredictionResponse) -> u64 {
        let entry = HistoryEntry {
            id: Uuid::new_v4(),
            timestamp: output.timestamp,
            input,
            output,
        };
        let mut inner = self.inner.write().await;
        inner.total += 1;
        if self.view_limit == 0 {
            return inner.total;
        }
        if inner.entries.len() == self.view_limit {
            inner.entries.pop_front();
        }
        inner.entries.push_back(entry);
        inner.total
    }

    pub async fn total(&self) -> u64 {
        self.inner.read().await.total
    }

    /// Total count and retained entries, oldest first.
    pub async fn snapshot(&self) -> (u64, Vec<HistoryEntry>) {
        let inner = self.inner.read().await;
        (inner.total, inner.entries.iter().cloned().collect())
    }
}
