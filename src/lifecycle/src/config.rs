use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
#[serde(rename_all = "kebab-case")]
pub struct LifecycleConfig {
    /// Branch used when repository host does not report one
    #[serde(default = "LifecycleConfig::default_branch")]
    pub default_branch: String,
    /// Deadline for every call to repository host, build host, job queue
    /// and local cache
    #[serde(default = "LifecycleConfig::default_remote_timeout")]
    pub remote_timeout_secs: u64,
    /// Root of local working copies
    #[serde(default = "LifecycleConfig::default_repo_cache_dir")]
    pub repo_cache_dir: PathBuf,
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

impl LifecycleConfig {
    fn default_branch() -> String {
        "main".to_string()
    }

    fn default_remote_timeout() -> u64 {
        120
    }

    fn default_repo_cache_dir() -> PathBuf {
        PathBuf::from("repos")
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }

    /// Reads config from `LIFECYCLE_CONFIG`, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        util::cfg::load_cfg()
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        LifecycleConfig {
            default_branch: Self::default_branch(),
            remote_timeout_secs: Self::default_remote_timeout(),
            repo_cache_dir: Self::default_repo_cache_dir(),
            cleanup: CleanupConfig::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
#[serde(rename_all = "kebab-case")]
pub struct CleanupConfig {
    /// How many participations are torn down concurrently
    #[serde(default = "CleanupConfig::default_workers")]
    pub workers: usize,
    /// If enabled, exercise- and team-wide deletion also deletes build plans.
    /// Single participation deletion always does.
    #[serde(default)]
    pub bulk_delete_build_plans: bool,
}

impl CleanupConfig {
    fn default_workers() -> usize {
        5
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        CleanupConfig {
            workers: Self::default_workers(),
            bulk_delete_build_plans: false,
        }
    }
}
