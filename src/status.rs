//! status.rs: process-wide, diagnostic-only view of what every unit is doing.
//!
//! Each unit owns exactly one key and writes it through a [`StatusHandle`];
//! the supervisor and the HTTP surface only read. Nothing makes control
//! decisions from these strings.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct PipelineStatus {
    inner: Arc<RwLock<BTreeMap<String, String>>>,
}

impl PipelineStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `component` (state "Booting") and return its writer.
    pub fn handle(&self, component: impl Into<String>) -> StatusHandle {
        let key = component.into();
        self.inner.write().insert(key.clone(), "Booting".to_string());
        StatusHandle {
            key,
            map: self.clone(),
        }
    }

    pub fn get(&self, component: &str) -> Option<String> {
        self.inner.read().get(component).cloned()
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.inner.read().clone()
    }

    /// One-line table: `| Reader 0 | Worker |` style, column per component.
    pub fn render_row(&self) -> String {
        let snap = self.snapshot();
        let cells: Vec<String> = snap
            .iter()
            .map(|(k, v)| format!(" {k}: {v} "))
            .collect();
        format!("|{}|", cells.join("|"))
    }
}

/// Write access to a single component's entry.
#[derive(Debug, Clone)]
pub struct StatusHandle {
    key: String,
    map: PipelineStatus,
}

impl StatusHandle {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn set(&self, state: impl Into<String>) {
        self.map.inner.write().insert(self.key.clone(), state.into());
    }

    pub fn working(&self) {
        self.set("Working");
    }

    pub fn waiting(&self) {
        self.set("Waiting");
    }

    pub fn wait_secs(&self, left: u64) {
        self.set(format!("Wait {left:02}"));
    }

    pub fn work_depth(&self, depth: usize) {
        self.set(format!("Work {depth:02}"));
    }

    pub fn stopped(&self) {
        self.set("Stopped");
    }

    pub fn error(&self, reason: impl std::fmt::Display) {
        self.set(format!("Error -- {reason}"));
    }

    pub fn current(&self) -> Option<String> {
        self.map.get(&self.key)
    }
}
