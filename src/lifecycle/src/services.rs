use db::DbConn;
use provision_api::{ContinuousIntegration, JobQueue, LocalRepoCache, VersionControl};
use std::sync::Arc;

/// External systems the lifecycle engine and the cleaner talk to.
#[derive(Clone)]
pub struct Services {
    pub db: DbConn,
    pub vcs: Arc<dyn VersionControl>,
    pub ci: Arc<dyn ContinuousIntegration>,
    pub jobs: Arc<dyn JobQueue>,
    pub cache: Arc<dyn LocalRepoCache>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("db", &self.db)
            .finish_non_exhaustive()
    }
}
