use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::discovery::DiscoveryConfig;
use crate::kubernetes::default_kubeconfig_path;

#[derive(Parser, Debug)]
#[command(name = "kubectl-fanout")]
#[command(about = "Stream and merge logs from every running pod matching a namespace or selector")]
pub struct Cli {
    /// Watch pods in all namespaces
    #[arg(short = 'a', long = "all-namespaces")]
    pub all_namespaces: bool,

    /// Namespace (defaults to the namespace of the current context)
    #[arg(short = 'n', long, default_value = "")]
    pub namespace: String,

    /// Label selector, passed to the API server as-is
    #[arg(short = 'l', long, default_value = "")]
    pub selector: String,

    /// Number of historical lines to show per container before following (0 = none)
    #[arg(long = "tail-lines", visible_alias = "tl", default_value_t = 20)]
    pub tail_lines: i64,

    /// Only stream containers with this name
    #[arg(short = 'c', long)]
    pub container: Option<String>,

    /// Path to the kubeconfig file [default: $HOME/.kube/config]
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Pod discovery interval in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub poll_interval: u64,

    /// Retries for a failed pod listing before giving up
    #[arg(long, default_value_t = 3)]
    pub query_retries: u32,

    /// Capacity of the output line buffer
    #[arg(long, default_value_t = 1000)]
    pub buffer_size: usize,

    /// Prefix every line with the time it was received
    #[arg(long)]
    pub timestamps: bool,

    /// Enable debug logging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Cli {
    pub fn namespace(&self) -> Option<&str> {
        Some(self.namespace.as_str()).filter(|ns| !ns.is_empty())
    }

    pub fn selector(&self) -> Option<&str> {
        Some(self.selector.as_str()).filter(|s| !s.is_empty())
    }

    /// Explicit `--kubeconfig`, else the file under the home directory if it
    /// exists. `None` leaves discovery to the client library.
    pub fn kubeconfig_path(&self) -> Option<PathBuf> {
        self.kubeconfig
            .clone()
            .or_else(|| default_kubeconfig_path().filter(|p| p.exists()))
    }

    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            poll_interval: Duration::from_millis(self.poll_interval.max(1)),
            tail_lines: Some(self.tail_lines).filter(|n| *n > 0),
            container: self.container.clone(),
            query_retries: self.query_retries,
        }
    }
}

/// Rewrites the single-dash `-tl` spelling into `--tl`, which clap can parse.
pub fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let rewritten = match arg.to_str() {
                Some("-tl") => Some(OsString::from("--tl")),
                Some(s) if s.starts_with("-tl=") => Some(OsString::from(format!("-{}", s))),
                _ => None,
            };
            rewritten.unwrap_or(arg)
        })
        .collect()
}
