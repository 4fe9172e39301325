use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures::io::AsyncReadExt;
use futures::stream::TryStreamExt;
use k8s_openapi::api::core::v1::{Namespace, Pod};
use kube::api::{ListParams, LogParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config, ResourceExt};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::directory::{ClusterDirectory, LogStream};
use crate::error::{DirectoryError, TailError};
use crate::types::{LogRequest, Phase, Workload, WorkloadKey};

pub const DEFAULT_NAMESPACE: &str = "default";

const READ_CHUNK: usize = 8 * 1024;
const CHUNK_BUFFER: usize = 16;

/// Everything the rest of the program needs from the kubeconfig.
pub struct ClientConfig {
    pub client: Client,
    pub context: String,
    pub default_namespace: String,
}

/// Builds a client from the kubeconfig at `path`, or from the environment
/// (`KUBECONFIG`, in-cluster service account) when no path is given.
pub async fn load_client_config(path: Option<&Path>) -> Result<ClientConfig, TailError> {
    let Some(path) = path else {
        let config = Config::infer()
            .await
            .map_err(|e| config_load_error("<inferred>", e))?;
        let default_namespace = config.default_namespace.clone();
        let client = Client::try_from(config).map_err(|e| config_load_error("<inferred>", e))?;
        info!("Using inferred cluster config");
        return Ok(ClientConfig {
            client,
            context: "<inferred>".to_string(),
            default_namespace,
        });
    };

    let label = path.display().to_string();
    let kubeconfig = Kubeconfig::read_from(path).map_err(|e| config_load_error(&label, e))?;
    let context = kubeconfig
        .current_context
        .clone()
        .unwrap_or_else(|| "default".to_string());
    let default_namespace = resolve_default_namespace(&kubeconfig);

    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| config_load_error(&label, e))?;
    let client = Client::try_from(config).map_err(|e| config_load_error(&label, e))?;
    info!("Using context: {}", context);

    Ok(ClientConfig {
        client,
        context,
        default_namespace,
    })
}

fn config_load_error(
    path: &str,
    err: impl std::error::Error + Send + Sync + 'static,
) -> TailError {
    TailError::ConfigLoad {
        path: path.to_string(),
        source: Box::new(err),
    }
}

/// Namespace of the kubeconfig's current context.
///
/// Falls back to [`DEFAULT_NAMESPACE`]; a missing or dangling current context
/// is logged as a warning.
pub fn resolve_default_namespace(kubeconfig: &Kubeconfig) -> String {
    let Some(current) = kubeconfig.current_context.as_deref() else {
        warn!(
            "No current context in kubeconfig, using namespace '{}'",
            DEFAULT_NAMESPACE
        );
        return DEFAULT_NAMESPACE.to_string();
    };
    let Some(named) = kubeconfig.contexts.iter().find(|c| c.name == current) else {
        warn!(
            "Current context '{}' not found in kubeconfig, using namespace '{}'",
            current, DEFAULT_NAMESPACE
        );
        return DEFAULT_NAMESPACE.to_string();
    };
    match named.context.as_ref().and_then(|c| c.namespace.clone()) {
        Some(ns) if !ns.is_empty() => ns,
        _ => {
            debug!("Context '{}' sets no namespace", current);
            DEFAULT_NAMESPACE.to_string()
        }
    }
}

pub fn workload_from_pod(pod: &Pod) -> Workload {
    let phase = pod
        .status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .map(Phase::from)
        .unwrap_or(Phase::Unknown);
    let containers = pod
        .spec
        .as_ref()
        .map(|spec| spec.containers.iter().map(|c| c.name.clone()).collect())
        .unwrap_or_default();

    Workload {
        key: WorkloadKey::new(pod.namespace().unwrap_or_default(), pod.name_any()),
        phase,
        containers,
    }
}

/// [`ClusterDirectory`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeDirectory {
    client: Client,
}

impl KubeDirectory {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        if namespace.is_empty() {
            Api::all(self.client.clone())
        } else {
            Api::namespaced(self.client.clone(), namespace)
        }
    }
}

#[async_trait]
impl ClusterDirectory for KubeDirectory {
    async fn list_workloads(
        &self,
        namespace: &str,
        selector: Option<&str>,
    ) -> Result<Vec<Workload>, DirectoryError> {
        let mut lp = ListParams::default();
        if let Some(sel) = selector {
            lp = lp.labels(sel);
        }
        let pods = self.pods(namespace).list(&lp).await?;
        Ok(pods.items.iter().map(workload_from_pod).collect())
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, DirectoryError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let namespaces = api.list(&ListParams::default()).await?;
        Ok(namespaces.items.iter().map(|ns| ns.name_any()).collect())
    }

    /// Opens the log stream on a background task that owns the API handle and
    /// hands its bytes over a channel. The task stops as soon as the returned
    /// stream is dropped, which closes the connection to the API server.
    async fn stream_logs(&self, request: &LogRequest) -> Result<LogStream, DirectoryError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &request.namespace);
        let lp = LogParams {
            follow: request.follow,
            container: Some(request.container_name.clone()),
            tail_lines: request.tail_lines.filter(|n| *n > 0),
            ..Default::default()
        };
        let pod_name = request.pod_name.clone();
        let target = request.to_string();

        let (ready_tx, ready_rx) = oneshot::channel();
        let (chunk_tx, chunk_rx) = mpsc::channel::<std::io::Result<Vec<u8>>>(CHUNK_BUFFER);

        tokio::spawn(async move {
            let stream = match api.log_stream(&pod_name, &lp).await {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(DirectoryError::from(e)));
                    return;
                }
            };
            let mut stream = Box::pin(stream);
            let mut buf = vec![0u8; READ_CHUNK];
            loop {
                let chunk = tokio::select! {
                    _ = chunk_tx.closed() => break,
                    res = stream.read(&mut buf) => match res {
                        Ok(0) => break,
                        Ok(n) => Ok(buf[..n].to_vec()),
                        Err(e) => Err(e),
                    },
                };
                let failed = chunk.is_err();
                if chunk_tx.send(chunk).await.is_err() || failed {
                    break;
                }
            }
            debug!("Closed log connection for {}", target);
        });

        match ready_rx.await {
            Ok(Ok(())) => Ok(Box::pin(ReceiverStream::new(chunk_rx).into_async_read())),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(DirectoryError::Unavailable(
                "log stream task exited before connecting".to_string(),
            )),
        }
    }
}

/// `$HOME/.kube/config` (or `%USERPROFILE%` on Windows), if a home is known.
pub fn default_kubeconfig_path() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .or_else(|| std::env::var_os("USERPROFILE").filter(|h| !h.is_empty()))
        .map(|home| PathBuf::from(home).join(".kube").join("config"))
}
