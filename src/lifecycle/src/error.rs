use db::schema::{ParticipationId, UnknownParticipantKind};
use provision_api::{CiError, VcsError};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("participation {0} not found")]
    ParticipationNotFound(ParticipationId),
    /// Request is not valid for the current exercise or participation
    #[error("{0}")]
    Precondition(String),
    /// Build plan could not be configured. Participation was rolled back so
    /// that a retry copies the build plan again.
    #[error("build plan configuration failed")]
    BuildConfiguration(#[source] CiError),
    #[error("build host error")]
    BuildHost(#[source] CiError),
    #[error("repository host error")]
    RepositoryHost(#[source] VcsError),
    #[error("local repository cache error")]
    Cache(#[source] std::io::Error),
    #[error("stored repository locator {uri} is malformed")]
    MalformedLocator {
        uri: String,
        #[source]
        source: url::ParseError,
    },
    #[error("{operation} did not complete in {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },
    #[error(transparent)]
    UnknownParticipantKind(UnknownParticipantKind),
    #[error("store error")]
    Store(#[source] anyhow::Error),
}

impl LifecycleError {
    /// Returns true if participation state was kept consistent and the same
    /// request will continue from the last checkpoint.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LifecycleError::BuildConfiguration(_))
    }

    /// Returns true if failure is likely transient, so the caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LifecycleError::BuildConfiguration(_)
                | LifecycleError::BuildHost(_)
                | LifecycleError::RepositoryHost(_)
                | LifecycleError::Cache(_)
                | LifecycleError::Timeout { .. }
        )
    }
}

impl From<anyhow::Error> for LifecycleError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<UnknownParticipantKind>() {
            Ok(kind) => LifecycleError::UnknownParticipantKind(kind),
            Err(err) => LifecycleError::Store(err),
        }
    }
}

impl From<CiError> for LifecycleError {
    fn from(err: CiError) -> Self {
        match err {
            CiError::Configuration(_) => LifecycleError::BuildConfiguration(err),
            other => LifecycleError::BuildHost(other),
        }
    }
}

impl From<VcsError> for LifecycleError {
    fn from(err: VcsError) -> Self {
        LifecycleError::RepositoryHost(err)
    }
}

impl From<std::io::Error> for LifecycleError {
    fn from(err: std::io::Error) -> Self {
        LifecycleError::Cache(err)
    }
}

pub type Result<T, E = LifecycleError> = std::result::Result<T, E>;
