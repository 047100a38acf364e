use crate::config::LifecycleConfig;
use async_trait::async_trait;
use provision_api::{LocalRepoCache, RepositoryUri};
use std::path::{Path, PathBuf};

/// Working copies laid out as `<root>/<project key>/<slug>`.
#[derive(Debug, Clone)]
pub struct FsRepoCache {
    root: PathBuf,
}

impl FsRepoCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsRepoCache { root: root.into() }
    }

    /// Cache rooted at `repo-cache-dir`.
    pub fn from_config(config: &LifecycleConfig) -> Self {
        Self::new(&config.repo_cache_dir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns `None` if locator does not name a project and a repository.
    pub fn path_of(&self, uri: &RepositoryUri) -> Option<PathBuf> {
        let project = uri.project_key()?;
        let slug = uri.slug()?;
        if [project, slug].iter().any(|s| *s == "." || *s == "..") {
            return None;
        }
        Some(self.root.join(project).join(slug))
    }
}

#[async_trait]
impl LocalRepoCache for FsRepoCache {
    async fn delete_local_repository(&self, uri: &RepositoryUri) -> std::io::Result<()> {
        let path = match self.path_of(uri) {
            Some(p) => p,
            None => {
                tracing::debug!(%uri, "locator does not map to a working copy");
                return Ok(());
            }
        };
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed working copy");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}
