use std::sync::Arc;

use crossterm::style::Color;
use futures::io::AsyncBufReadExt;
use futures::stream::TryStreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::directory::ClusterDirectory;
use crate::error::TailError;
use crate::types::{LogMessage, LogRequest};

/// How a streaming session finished.
#[derive(Debug)]
pub enum SessionOutcome {
    /// The log stream reached its end (container terminated).
    Ended { lines: u64 },
    /// Shutdown was requested.
    Cancelled { lines: u64 },
    /// The output sink is gone.
    SinkClosed { lines: u64 },
    Failed(TailError),
}

/// Follows one container's log stream, forwarding every line to the sink.
pub struct StreamingSession {
    directory: Arc<dyn ClusterDirectory>,
    request: LogRequest,
    color: Color,
    tx: mpsc::Sender<LogMessage>,
    cancel: CancellationToken,
}

impl StreamingSession {
    pub fn new(
        directory: Arc<dyn ClusterDirectory>,
        request: LogRequest,
        color: Color,
        tx: mpsc::Sender<LogMessage>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            directory,
            request,
            color,
            tx,
            cancel,
        }
    }

    pub fn request(&self) -> &LogRequest {
        &self.request
    }

    pub async fn run(self) -> SessionOutcome {
        let target = self.request.to_string();
        debug!(
            "Starting to tail logs for {} (tail: {:?})",
            target, self.request.tail_lines
        );

        let stream = tokio::select! {
            _ = self.cancel.cancelled() => return SessionOutcome::Cancelled { lines: 0 },
            res = self.directory.stream_logs(&self.request) => match res {
                Ok(stream) => stream,
                Err(source) => {
                    return SessionOutcome::Failed(TailError::StreamAcquisition { target, source });
                }
            },
        };

        let mut lines = stream.lines();
        let mut count: u64 = 0;
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return SessionOutcome::Cancelled { lines: count },
                result = lines.try_next() => match result {
                    Ok(Some(line)) => {
                        let msg = LogMessage {
                            pod_name: self.request.pod_name.clone(),
                            container_name: self.request.container_name.clone(),
                            line,
                            color: self.color,
                            timestamp: chrono::Local::now(),
                        };
                        // A full channel must not keep shutdown waiting
                        tokio::select! {
                            _ = self.cancel.cancelled() => {
                                return SessionOutcome::Cancelled { lines: count };
                            }
                            res = self.tx.send(msg) => {
                                if res.is_err() {
                                    return SessionOutcome::SinkClosed { lines: count };
                                }
                            }
                        }
                        count += 1;
                    }
                    Ok(None) => return SessionOutcome::Ended { lines: count },
                    Err(source) => {
                        return SessionOutcome::Failed(TailError::StreamRead { target, source });
                    }
                },
            }
        }
    }
}
