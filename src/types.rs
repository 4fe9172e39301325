use std::fmt;

/// Identity of a workload (pod) as seen by the discovery loop.
#[derive(Debug, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct WorkloadKey {
    pub namespace: String,
    pub name: String,
}

impl WorkloadKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for WorkloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Phase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl From<&str> for Phase {
    fn from(s: &str) -> Self {
        match s {
            "Pending" => Phase::Pending,
            "Running" => Phase::Running,
            "Succeeded" => Phase::Succeeded,
            "Failed" => Phase::Failed,
            _ => Phase::Unknown,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Workload {
    pub key: WorkloadKey,
    pub phase: Phase,
    /// Container names in declaration order.
    pub containers: Vec<String>,
}

impl Workload {
    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }
}

/// Parameters for opening one container's log stream.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LogRequest {
    pub namespace: String,
    pub pod_name: String,
    pub container_name: String,
    pub tail_lines: Option<i64>,
    pub follow: bool,
}

impl fmt::Display for LogRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}({})",
            self.namespace, self.pod_name, self.container_name
        )
    }
}

#[derive(Debug, Clone)]
pub struct LogMessage {
    pub pod_name: String,
    pub container_name: String,
    pub line: String,
    pub color: crossterm::style::Color,
    pub timestamp: chrono::DateTime<chrono::Local>,
}
