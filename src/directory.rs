use std::pin::Pin;

use async_trait::async_trait;
use futures::io::AsyncBufRead;

use crate::error::DirectoryError;
use crate::types::{LogRequest, Workload};

/// Byte stream of a single container's log output.
pub type LogStream = Pin<Box<dyn AsyncBufRead + Send>>;

/// The cluster capabilities the discovery loop and sessions depend on.
///
/// An empty `namespace` means all namespaces. The selector is passed through
/// to the implementation untouched.
#[async_trait]
pub trait ClusterDirectory: Send + Sync {
    async fn list_workloads(
        &self,
        namespace: &str,
        selector: Option<&str>,
    ) -> Result<Vec<Workload>, DirectoryError>;

    async fn list_namespaces(&self) -> Result<Vec<String>, DirectoryError>;

    async fn stream_logs(&self, request: &LogRequest) -> Result<LogStream, DirectoryError>;
}
