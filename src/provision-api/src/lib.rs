//! Interfaces of the external systems participations are provisioned on:
//! the repository host, the build host, the build job queue and the local
//! repository cache.
//!
//! Every operation here must be safe to retry: copying an artifact that
//! already exists returns the existing artifact.
mod exercise;
mod locator;

pub use exercise::{Exercise, ExerciseKind};
pub use locator::{BuildPlanId, RepositoryUri};

use async_trait::async_trait;
use db::schema::{Participation, ParticipationId};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    #[error("repository {0} not found")]
    NotFound(String),
    #[error("repository host rejected request: {0}")]
    Rejected(String),
    #[error("repository host unavailable")]
    Unavailable(#[source] BoxError),
}

#[derive(Debug, thiserror::Error)]
pub enum CiError {
    /// Triggers or repository hooks of a build plan could not be set up.
    /// The plan itself exists.
    #[error("build plan configuration failed: {0}")]
    Configuration(String),
    #[error("build plan {0} not found")]
    NotFound(String),
    #[error("build host rejected request: {0}")]
    Rejected(String),
    #[error("build host unavailable")]
    Unavailable(#[source] BoxError),
}

/// Repository host
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Copies `source` into project `target_project_key` under `target_name`.
    /// Returns locator of the copy; if it already exists, returns it as is.
    async fn copy_repository(
        &self,
        source: &RepositoryUri,
        target_project_key: &str,
        target_name: &str,
        attempt: i32,
    ) -> Result<RepositoryUri, VcsError>;

    /// Grants the participant write access (or revokes it if `allow_access`
    /// is false) and installs build hooks.
    async fn configure_repository(
        &self,
        exercise: &Exercise,
        participation: &Participation,
        allow_access: bool,
    ) -> Result<(), VcsError>;

    async fn delete_repository(&self, uri: &RepositoryUri) -> Result<(), VcsError>;

    /// Returns default branch of the repository, `None` if host does not
    /// report one.
    async fn get_or_retrieve_default_branch(
        &self,
        uri: &RepositoryUri,
    ) -> Result<Option<String>, VcsError>;
}

/// Build host
#[async_trait]
pub trait ContinuousIntegration: Send + Sync {
    /// Copies plan `source_plan_name` of `source_exercise` into the project
    /// of `target_exercise`. With `recovery_allowed`, an already existing
    /// target plan is returned instead of an error.
    async fn copy_build_plan(
        &self,
        source_exercise: &Exercise,
        source_plan_name: &str,
        target_exercise: &Exercise,
        target_project_name: &str,
        target_plan_name: &str,
        recovery_allowed: bool,
    ) -> Result<BuildPlanId, CiError>;

    /// Points the plan of `participation` at its repository and `branch`.
    /// Fails with [`CiError::Configuration`] if triggers can not be set up.
    async fn configure_build_plan(
        &self,
        participation: &Participation,
        branch: &str,
    ) -> Result<(), CiError>;

    async fn delete_build_plan(&self, project_key: &str, plan_id: &BuildPlanId)
        -> Result<(), CiError>;
}

/// Queue of pending build jobs
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn cancel_all_jobs_for_participation(
        &self,
        participation_id: ParticipationId,
    ) -> Result<(), CiError>;
}

/// Local working copies of remote repositories
#[async_trait]
pub trait LocalRepoCache: Send + Sync {
    /// Removes the working copy of `uri`. Missing copy is not an error.
    async fn delete_local_repository(&self, uri: &RepositoryUri) -> std::io::Result<()>;
}
