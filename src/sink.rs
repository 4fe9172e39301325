use std::io::Write;

use crossterm::style::Stylize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::types::LogMessage;

#[derive(Debug, Clone, Copy, Default)]
pub struct SinkOptions {
    pub timestamps: bool,
}

/// Plain text form of a line: `<pod>(<container>) - <line>`.
pub fn format_line(msg: &LogMessage, opts: SinkOptions) -> String {
    let body = format!("{}({}) - {}", msg.pod_name, msg.container_name, msg.line);
    if opts.timestamps {
        format!("{} {}", msg.timestamp.to_rfc3339(), body)
    } else {
        body
    }
}

/// Spawns the single writer that owns `out`.
///
/// Every message becomes exactly one colored `writeln!` on `out`, so lines from
/// concurrent sessions never interleave. The task ends once every sender is
/// dropped and the channel is drained.
pub fn spawn_sink<W>(
    mut rx: mpsc::Receiver<LogMessage>,
    mut out: W,
    opts: SinkOptions,
) -> JoinHandle<()>
where
    W: Write + Send + 'static,
{
    tokio::spawn(async move {
        let mut written: u64 = 0;
        while let Some(msg) = rx.recv().await {
            let line = format_line(&msg, opts).with(msg.color);
            if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
                error!("Failed to write to output: {}", e);
                break;
            }
            written += 1;
        }
        debug!("Output sink closed after {} lines", written);
    })
}
