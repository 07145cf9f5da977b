use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum audit entries retained per instance.
pub const AUDIT_LOG_CAPACITY: usize = 100;

/// A single reconciliation attempt and its outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub instance_id: String,
    pub action: String,
    pub drift_detected: bool,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(instance_id: impl Into<String>, action: impl Into<String>, drift_detected: bool) -> Self {
        Self {
            instance_id: instance_id.into(),
            action: action.into(),
            drift_detected,
            timestamp: Utc::now(),
        }
    }
}

/// Per-instance, bounded, FIFO-evicting audit log. Reconciler-owned.
#[derive(Debug, Default)]
pub struct AuditLog {
    by_instance: Mutex<HashMap<String, VecDeque<AuditEntry>>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            by_instance: Mutex::new(HashMap::new()),
        }
    }

    pub fn append(&self, entry: AuditEntry) {
        let mut map = self.by_instance.lock().expect("audit log lock poisoned");
        let log = map.entry(entry.instance_id.clone()).or_default();
        if log.len() == AUDIT_LOG_CAPACITY {
            log.pop_front();
        }
        log.push_back(entry);
    }

    pub fn for_instance(&self, instance_id: &str) -> Vec<AuditEntry> {
        self.by_instance
            .lock()
            .expect("audit log lock poisoned")
            .get(instance_id)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_log_evicts_fifo_per_instance() {
        let log = AuditLog::new();
        for i in 0..AUDIT_LOG_CAPACITY + 5 {
            log.append(AuditEntry::new("a", format!("attempt-{i}"), true));
        }
        let entries = log.for_instance("a");
        assert_eq!(entries.len(), AUDIT_LOG_CAPACITY);
        assert_eq!(entries.first().unwrap().action, "attempt-5");
    }

    #[test]
    fn audit_log_is_isolated_per_instance() {
        let log = AuditLog::new();
        log.append(AuditEntry::new("a", "x", false));
        assert!(log.for_instance("b").is_empty());
    }
}
