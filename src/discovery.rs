use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::colors::ColorTable;
use crate::directory::ClusterDirectory;
use crate::error::{DirectoryError, TailError};
use crate::registry::DedupRegistry;
use crate::selection::SelectionPolicy;
use crate::session::{SessionOutcome, StreamingSession};
use crate::types::{LogMessage, LogRequest, Workload, WorkloadKey};

const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub poll_interval: Duration,
    /// Historical lines replayed before following; `None` means none.
    pub tail_lines: Option<i64>,
    /// Only stream containers with this name.
    pub container: Option<String>,
    /// Extra attempts for a failed workload listing before giving up.
    pub query_retries: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            tail_lines: Some(20),
            container: None,
            query_retries: 3,
        }
    }
}

/// Delay before retry number `attempt` (1-based), doubling from `base`.
pub fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.min(16))
        .min(MAX_RETRY_DELAY)
}

type SessionResult = (LogRequest, SessionOutcome);

/// Polls the cluster directory and starts a session for every running
/// container it has not streamed yet.
///
/// The loop is the only owner of the dedup registry and the color table, and
/// marks a pair as started before its session is spawned, so a workload seen
/// on two consecutive polls cannot be subscribed twice.
pub struct DiscoveryLoop {
    directory: Arc<dyn ClusterDirectory>,
    policy: SelectionPolicy,
    config: DiscoveryConfig,
    registry: DedupRegistry,
    colors: ColorTable,
    sessions: JoinSet<SessionResult>,
    tx: mpsc::Sender<LogMessage>,
    cancel: CancellationToken,
}

impl DiscoveryLoop {
    pub fn new(
        directory: Arc<dyn ClusterDirectory>,
        policy: SelectionPolicy,
        config: DiscoveryConfig,
        tx: mpsc::Sender<LogMessage>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            directory,
            policy,
            config,
            registry: DedupRegistry::new(),
            colors: ColorTable::new(),
            sessions: JoinSet::new(),
            tx,
            cancel,
        }
    }

    #[allow(dead_code)]
    pub fn with_colors(mut self, colors: ColorTable) -> Self {
        self.colors = colors;
        self
    }

    #[allow(dead_code)]
    pub fn registry(&self) -> &DedupRegistry {
        &self.registry
    }

    #[allow(dead_code)]
    pub fn colors(&self) -> &ColorTable {
        &self.colors
    }

    #[allow(dead_code)]
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Polls until cancelled or a listing fails for good, then stops every
    /// session and waits for them to finish.
    pub async fn run(mut self) -> Result<(), TailError> {
        info!(
            "Watching {} every {:?}",
            self.policy.scope(),
            self.config.poll_interval
        );
        let result = self.poll_forever().await;
        if let Err(e) = &result {
            error!("Discovery stopped: {}", e);
        }
        self.shutdown().await;
        result
    }

    /// Ends with [`TailError::OutputClosed`] once the sink has dropped its
    /// receiver, since no session could deliver a line anymore.
    async fn poll_forever(&mut self) -> Result<(), TailError> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }
            if self.tx.is_closed() {
                return Err(TailError::OutputClosed);
            }
            self.poll_once().await?;
            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                _ = self.tx.closed() => return Err(TailError::OutputClosed),
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }

    /// One discovery iteration. Returns the number of sessions started.
    pub async fn poll_once(&mut self) -> Result<usize, TailError> {
        let workloads = list_with_retry(
            self.directory.as_ref(),
            &self.policy,
            &self.config,
            &self.cancel,
        )
        .await?;
        let spawned = self.process(workloads);
        self.reap();
        Ok(spawned)
    }

    fn process(&mut self, workloads: Vec<Workload>) -> usize {
        let mut spawned = 0;
        for workload in workloads {
            if !workload.is_running() {
                continue;
            }
            let containers: Vec<String> = match &self.config.container {
                Some(only) => workload
                    .containers
                    .iter()
                    .filter(|c| *c == only)
                    .cloned()
                    .collect(),
                None => workload.containers.clone(),
            };
            let pending: Vec<String> = self
                .registry
                .pending(&workload.key, &containers)
                .into_iter()
                .map(str::to_string)
                .collect();
            if pending.is_empty() {
                continue;
            }

            if self.registry.is_seen(&workload.key) {
                info!(
                    "NEW CONTAINER(S) in {}: {}",
                    workload.key,
                    pending.join(", ")
                );
            } else {
                info!(
                    "NEW POD: {} | Containers: {}",
                    workload.key,
                    pending.join(", ")
                );
            }

            let color = self.colors.assign(&workload.key);
            for container in pending {
                self.registry.mark(&workload.key, &container);
                self.spawn_session(&workload.key, container, color);
                spawned += 1;
            }
        }
        if spawned > 0 {
            debug!(
                "Started {} session(s); tracking {} pod(s), {} color(s), {} running session(s)",
                spawned,
                self.registry.workload_count(),
                self.colors.assigned_count(),
                self.sessions.len()
            );
        }
        spawned
    }

    fn spawn_session(
        &mut self,
        key: &WorkloadKey,
        container: String,
        color: crossterm::style::Color,
    ) {
        let request = LogRequest {
            namespace: key.namespace.clone(),
            pod_name: key.name.clone(),
            container_name: container,
            tail_lines: self.config.tail_lines,
            follow: true,
        };
        let session = StreamingSession::new(
            self.directory.clone(),
            request,
            color,
            self.tx.clone(),
            self.cancel.clone(),
        );
        self.sessions.spawn(async move {
            let request = session.request().clone();
            let outcome = session.run().await;
            (request, outcome)
        });
    }

    /// Collects sessions that already finished.
    fn reap(&mut self) {
        while let Some(result) = self.sessions.try_join_next() {
            log_outcome(result);
        }
    }

    /// Waits for every running session to finish. Returns how many were joined.
    pub async fn join_sessions(&mut self) -> usize {
        let mut joined = 0;
        while let Some(result) = self.sessions.join_next().await {
            log_outcome(result);
            joined += 1;
        }
        joined
    }

    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        let joined = self.join_sessions().await;
        debug!("Stopped {} session(s)", joined);
    }
}

/// Lists workloads, retrying failures with backoff. `NotFound` counts as an
/// empty listing; cancellation yields an empty listing too.
async fn list_with_retry(
    directory: &dyn ClusterDirectory,
    policy: &SelectionPolicy,
    config: &DiscoveryConfig,
    cancel: &CancellationToken,
) -> Result<Vec<Workload>, TailError> {
    let selector = policy.selector.as_deref();
    let mut attempt = 0;
    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => return Ok(Vec::new()),
            res = directory.list_workloads(&policy.namespace, selector) => res,
        };
        match result {
            Ok(workloads) => return Ok(workloads),
            Err(DirectoryError::NotFound(msg)) => {
                debug!("No workloads in {}: {}", policy.scope(), msg);
                return Ok(Vec::new());
            }
            Err(e) if attempt < config.query_retries => {
                attempt += 1;
                let delay = retry_delay(config.poll_interval, attempt);
                warn!(
                    "Failed to list workloads in {} (attempt {}/{}): {}, retrying in {:?}",
                    policy.scope(),
                    attempt,
                    config.query_retries + 1,
                    e,
                    delay
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(Vec::new()),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Err(source) => {
                return Err(TailError::DirectoryQuery {
                    scope: policy.scope(),
                    source,
                });
            }
        }
    }
}

fn log_outcome(result: Result<SessionResult, JoinError>) {
    match result {
        Ok((request, SessionOutcome::Ended { lines })) => {
            info!("Log stream ended for {} after {} lines", request, lines);
        }
        Ok((request, SessionOutcome::Cancelled { lines })) => {
            debug!("Stopped tailing {} after {} lines", request, lines);
        }
        Ok((request, SessionOutcome::SinkClosed { lines })) => {
            debug!("Output closed, stopped tailing {} after {} lines", request, lines);
        }
        Ok((_, SessionOutcome::Failed(e))) => {
            error!("{}", e);
        }
        Err(e) if e.is_panic() => {
            error!("Log session panicked: {}", e);
        }
        Err(e) => {
            debug!("Log session aborted: {}", e);
        }
    }
}
