use std::collections::{HashMap, HashSet};

use crate::types::WorkloadKey;

/// Record of which (workload, container) pairs already have a session.
///
/// Entries are never removed, so a workload that disappears and comes back
/// under the same identity is not streamed a second time.
#[derive(Debug, Default)]
pub struct DedupRegistry {
    started: HashMap<WorkloadKey, HashSet<String>>,
}

impl DedupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once any session has been started for the workload.
    pub fn is_seen(&self, key: &WorkloadKey) -> bool {
        self.started.get(key).is_some_and(|c| !c.is_empty())
    }

    pub fn is_started(&self, key: &WorkloadKey, container: &str) -> bool {
        self.started
            .get(key)
            .is_some_and(|c| c.contains(container))
    }

    /// Marks a pair as started. Returns false if it already was.
    pub fn mark(&mut self, key: &WorkloadKey, container: &str) -> bool {
        self.started
            .entry(key.clone())
            .or_default()
            .insert(container.to_string())
    }

    /// Containers of `containers` that do not have a session yet.
    pub fn pending<'a>(&self, key: &WorkloadKey, containers: &'a [String]) -> Vec<&'a str> {
        containers
            .iter()
            .map(String::as_str)
            .filter(|c| !self.is_started(key, c))
            .collect()
    }

    pub fn workload_count(&self) -> usize {
        self.started.len()
    }
}
