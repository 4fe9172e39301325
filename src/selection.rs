use tracing::debug;

use crate::directory::ClusterDirectory;
use crate::error::TailError;

/// Effective namespace scope and label selector for discovery.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SelectionPolicy {
    /// Empty means all namespaces.
    pub namespace: String,
    pub selector: Option<String>,
}

impl SelectionPolicy {
    pub fn is_all_namespaces(&self) -> bool {
        self.namespace.is_empty()
    }

    /// Human readable scope used in diagnostics.
    pub fn scope(&self) -> String {
        let ns = if self.is_all_namespaces() {
            "all namespaces".to_string()
        } else {
            format!("namespace '{}'", self.namespace)
        };
        match &self.selector {
            Some(sel) => format!("{} (selector: {})", ns, sel),
            None => ns,
        }
    }
}

/// Resolves the policy from the flag inputs without touching the cluster.
///
/// Empty strings count as unset for both `namespace` and `selector`.
pub fn resolve(
    namespace: Option<&str>,
    all_namespaces: bool,
    default_namespace: &str,
    selector: Option<&str>,
) -> Result<SelectionPolicy, TailError> {
    let namespace = namespace.filter(|ns| !ns.is_empty());
    let selector = selector.filter(|s| !s.is_empty()).map(str::to_string);

    let namespace = match (namespace, all_namespaces) {
        (Some(ns), true) => {
            return Err(TailError::Configuration(format!(
                "--all-namespaces and --namespace '{}' are mutually exclusive",
                ns
            )));
        }
        (Some(ns), false) => ns.to_string(),
        (None, true) => String::new(),
        (None, false) => default_namespace.to_string(),
    };

    Ok(SelectionPolicy {
        namespace,
        selector,
    })
}

/// Like [`resolve`], but also checks that an explicitly requested namespace
/// exists before any workload listing happens.
pub async fn resolve_and_validate(
    directory: &dyn ClusterDirectory,
    namespace: Option<&str>,
    all_namespaces: bool,
    default_namespace: &str,
    selector: Option<&str>,
) -> Result<SelectionPolicy, TailError> {
    let policy = resolve(namespace, all_namespaces, default_namespace, selector)?;

    if let Some(requested) = namespace.filter(|ns| !ns.is_empty()) {
        let namespaces = directory
            .list_namespaces()
            .await
            .map_err(|source| TailError::DirectoryQuery {
                scope: "namespaces".to_string(),
                source,
            })?;
        if !namespaces.iter().any(|ns| ns == requested) {
            return Err(TailError::NamespaceNotFound(requested.to_string()));
        }
        debug!("Namespace {} exists", requested);
    }

    Ok(policy)
}
