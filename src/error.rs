use thiserror::Error;

/// Failures reported by a [`crate::directory::ClusterDirectory`].
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("cluster unavailable: {0}")]
    Unavailable(String),
}

impl From<kube::Error> for DirectoryError {
    fn from(err: kube::Error) -> Self {
        match &err {
            kube::Error::Api(resp) if resp.code == 404 => {
                DirectoryError::NotFound(resp.message.clone())
            }
            kube::Error::Api(resp) if resp.code == 401 || resp.code == 403 => {
                DirectoryError::Unauthorized(resp.message.clone())
            }
            _ => DirectoryError::Unavailable(err.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum TailError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("failed to load cluster config from '{path}': {source}")]
    ConfigLoad {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("namespace '{0}' not found")]
    NamespaceNotFound(String),

    #[error("failed to query {scope}: {source}")]
    DirectoryQuery {
        scope: String,
        #[source]
        source: DirectoryError,
    },

    #[error("failed to open log stream for {target}: {source}")]
    StreamAcquisition {
        target: String,
        #[source]
        source: DirectoryError,
    },

    #[error("output closed, stopping")]
    OutputClosed,

    #[error("error reading log stream for {target}: {source}")]
    StreamRead {
        target: String,
        #[source]
        source: std::io::Error,
    },
}
