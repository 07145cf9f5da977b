use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::instance::InstanceStatus;

/// One entry in the status ring: a single observed status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeRecord {
    pub instance_id: String,
    pub old_status: InstanceStatus,
    pub new_status: InstanceStatus,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Maximum number of records retained. The oldest entry is evicted first
/// once the ring is full.
pub const STATUS_RING_CAPACITY: usize = 1000;

/// A bounded, time-ordered ring of recent status transitions.
///
/// Owned exclusively by the API node. Appends happen under a single writer
/// lock; reads take a snapshot and may observe any suffix of the write
/// sequence, never a torn entry.
#[derive(Debug, Default)]
pub struct StatusRing {
    entries: Mutex<VecDeque<StatusChangeRecord>>,
}

impl StatusRing {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(STATUS_RING_CAPACITY)),
        }
    }

    pub fn push(&self, record: StatusChangeRecord) {
        let mut entries = self.entries.lock().expect("status ring lock poisoned");
        if entries.len() == STATUS_RING_CAPACITY {
            entries.pop_front();
        }
        entries.push_back(record);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("status ring lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Linear scan for records at or after `since`, optionally filtered by
    /// new-status.
    pub fn recent_changes(
        &self,
        since: DateTime<Utc>,
        status_filter: Option<InstanceStatus>,
    ) -> Vec<StatusChangeRecord> {
        let entries = self.entries.lock().expect("status ring lock poisoned");
        entries
            .iter()
            .filter(|r| r.timestamp >= since)
            .filter(|r| status_filter.is_none_or(|s| r.new_status == s))
            .cloned()
            .collect()
    }
}
