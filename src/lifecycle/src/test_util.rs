//! In-memory hosts recording every call, with fault injection.
use crate::{config::LifecycleConfig, services::Services};
use async_trait::async_trait;
use db::{
    schema::{Participation, ParticipationId},
    DbConn,
};
use provision_api::{
    BuildPlanId, CiError, ContinuousIntegration, Exercise, JobQueue, LocalRepoCache,
    RepositoryUri, VcsError, VersionControl,
};
use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex, MutexGuard},
};

pub const HOST: &str = "https://vcs.test";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    CopyRepository,
    ConfigureRepository,
    DeleteRepository,
    CopyBuildPlan,
    ConfigureBuildPlan,
    DeleteBuildPlan,
    CancelJobs,
    DeleteLocalRepository,
}

/// Recorded call. `key` is `<project>/<slug>` for repository operations,
/// plan id for build plan operations and participation id otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: Op,
    pub key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FaultKind {
    Error,
    /// Never completes
    Hang,
}

#[derive(Debug)]
struct Fault {
    op: Op,
    key: Option<String>,
    /// `None` means forever
    remaining: Option<usize>,
    kind: FaultKind,
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<Call>,
    repos: BTreeSet<String>,
    plans: BTreeSet<String>,
    faults: Vec<Fault>,
    default_branch: Option<String>,
    /// Source locators of repository copies, in call order
    copy_sources: Vec<String>,
    in_flight: usize,
    max_in_flight: usize,
}

/// Fake repository host, build host, job queue and local cache sharing
/// one call log.
#[derive(Debug, Clone, Default)]
pub struct FakeHosts {
    state: Arc<Mutex<State>>,
}

impl FakeHosts {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn services(&self, db: DbConn) -> Services {
        let hosts = Arc::new(self.clone());
        Services {
            db,
            vcs: hosts.clone(),
            ci: hosts.clone(),
            jobs: hosts.clone(),
            cache: hosts,
        }
    }

    fn add_fault(&self, op: Op, key: Option<&str>, remaining: Option<usize>, kind: FaultKind) {
        self.state().faults.push(Fault {
            op,
            key: key.map(ToString::to_string),
            remaining,
            kind,
        });
    }

    /// Every call of `op` fails.
    pub fn fail(&self, op: Op) {
        self.add_fault(op, None, None, FaultKind::Error);
    }

    /// Next call of `op` fails.
    pub fn fail_once(&self, op: Op) {
        self.add_fault(op, None, Some(1), FaultKind::Error);
    }

    /// Every call of `op` for `key` fails.
    pub fn fail_for(&self, op: Op, key: &str) {
        self.add_fault(op, Some(key), None, FaultKind::Error);
    }

    /// Every call of `op` never completes.
    pub fn hang(&self, op: Op) {
        self.add_fault(op, None, None, FaultKind::Hang);
    }

    pub fn clear_faults(&self) {
        self.state().faults.clear();
    }

    /// Makes repository host report `branch` as default branch.
    pub fn set_default_branch(&self, branch: &str) {
        self.state().default_branch = Some(branch.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn count(&self, op: Op) -> usize {
        self.state().calls.iter().filter(|c| c.op == op).count()
    }

    pub fn keys(&self, op: Op) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter(|c| c.op == op)
            .map(|c| c.key.clone())
            .collect()
    }

    /// `<project>/<slug>` of every repository copy source, in call order.
    pub fn copy_sources(&self) -> Vec<String> {
        self.state().copy_sources.clone()
    }

    /// Highest number of repository deletions observed running at once.
    pub fn max_concurrent_deletions(&self) -> usize {
        self.state().max_in_flight
    }

    fn enter_deletion(&self) -> DeletionGuard<'_> {
        let mut st = self.state();
        st.in_flight += 1;
        st.max_in_flight = st.max_in_flight.max(st.in_flight);
        DeletionGuard { hosts: self }
    }

    /// Repositories that currently exist, as `<project>/<slug>`.
    pub fn repositories(&self) -> Vec<String> {
        self.state().repos.iter().cloned().collect()
    }

    pub fn build_plans(&self) -> Vec<String> {
        self.state().plans.iter().cloned().collect()
    }

    /// Records the call and returns injected fault, if any.
    fn record(&self, op: Op, key: &str) -> Option<FaultKind> {
        let mut st = self.state();
        st.calls.push(Call {
            op,
            key: key.to_string(),
        });
        let pos = st
            .faults
            .iter()
            .position(|f| f.op == op && f.key.as_deref().map_or(true, |k| k == key))?;
        let kind = st.faults[pos].kind;
        let exhausted = match &mut st.faults[pos].remaining {
            Some(remaining) => {
                *remaining -= 1;
                *remaining == 0
            }
            None => false,
        };
        if exhausted {
            st.faults.remove(pos);
        }
        Some(kind)
    }

    /// Returns true if the call must fail.
    async fn inject(&self, op: Op, key: &str) -> bool {
        match self.record(op, key) {
            None => false,
            Some(FaultKind::Error) => true,
            Some(FaultKind::Hang) => {
                std::future::pending::<()>().await;
                true
            }
        }
    }
}

struct DeletionGuard<'a> {
    hosts: &'a FakeHosts,
}

impl Drop for DeletionGuard<'_> {
    fn drop(&mut self) {
        self.hosts.state().in_flight -= 1;
    }
}

fn repo_key(uri: &RepositoryUri) -> String {
    format!(
        "{}/{}",
        uri.project_key().unwrap_or_default(),
        uri.slug().unwrap_or_default()
    )
}

fn vcs_fault() -> VcsError {
    VcsError::Unavailable("injected fault".into())
}

fn ci_fault() -> CiError {
    CiError::Unavailable("injected fault".into())
}

#[async_trait]
impl VersionControl for FakeHosts {
    async fn copy_repository(
        &self,
        source: &RepositoryUri,
        target_project_key: &str,
        target_name: &str,
        _attempt: i32,
    ) -> Result<RepositoryUri, VcsError> {
        self.state().copy_sources.push(repo_key(source));
        let key = format!("{}/{}", target_project_key, target_name);
        if self.inject(Op::CopyRepository, &key).await {
            return Err(vcs_fault());
        }
        let uri: RepositoryUri = format!("{}/{}", HOST, key)
            .parse()
            .map_err(|err: url::ParseError| VcsError::Rejected(err.to_string()))?;
        self.state().repos.insert(key);
        Ok(uri)
    }

    async fn configure_repository(
        &self,
        _exercise: &Exercise,
        participation: &Participation,
        _allow_access: bool,
    ) -> Result<(), VcsError> {
        let key = participation
            .repository_uri
            .as_deref()
            .and_then(|raw| raw.parse::<RepositoryUri>().ok())
            .map(|uri| repo_key(&uri))
            .unwrap_or_default();
        if self.inject(Op::ConfigureRepository, &key).await {
            return Err(vcs_fault());
        }
        if !self.state().repos.contains(&key) {
            return Err(VcsError::NotFound(key));
        }
        Ok(())
    }

    async fn delete_repository(&self, uri: &RepositoryUri) -> Result<(), VcsError> {
        let key = repo_key(uri);
        let _guard = self.enter_deletion();
        // let other deletions interleave
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        if self.inject(Op::DeleteRepository, &key).await {
            return Err(vcs_fault());
        }
        self.state().repos.remove(&key);
        Ok(())
    }

    async fn get_or_retrieve_default_branch(
        &self,
        _uri: &RepositoryUri,
    ) -> Result<Option<String>, VcsError> {
        Ok(self.state().default_branch.clone())
    }
}

#[async_trait]
impl ContinuousIntegration for FakeHosts {
    async fn copy_build_plan(
        &self,
        _source_exercise: &Exercise,
        _source_plan_name: &str,
        target_exercise: &Exercise,
        _target_project_name: &str,
        target_plan_name: &str,
        recovery_allowed: bool,
    ) -> Result<BuildPlanId, CiError> {
        let plan_id = format!("{}-{}", target_exercise.project_key, target_plan_name);
        if self.inject(Op::CopyBuildPlan, &plan_id).await {
            return Err(ci_fault());
        }
        let created = self.state().plans.insert(plan_id.clone());
        if !created && !recovery_allowed {
            return Err(CiError::Rejected(format!("{} already exists", plan_id)));
        }
        Ok(BuildPlanId::new(plan_id))
    }

    async fn configure_build_plan(
        &self,
        participation: &Participation,
        _branch: &str,
    ) -> Result<(), CiError> {
        let plan_id = participation.build_plan_id.clone().unwrap_or_default();
        if self.inject(Op::ConfigureBuildPlan, &plan_id).await {
            return Err(CiError::Configuration("injected fault".to_string()));
        }
        if !self.state().plans.contains(&plan_id) {
            return Err(CiError::NotFound(plan_id));
        }
        Ok(())
    }

    async fn delete_build_plan(
        &self,
        _project_key: &str,
        plan_id: &BuildPlanId,
    ) -> Result<(), CiError> {
        if self.inject(Op::DeleteBuildPlan, plan_id.as_str()).await {
            return Err(ci_fault());
        }
        self.state().plans.remove(plan_id.as_str());
        Ok(())
    }
}

#[async_trait]
impl JobQueue for FakeHosts {
    async fn cancel_all_jobs_for_participation(
        &self,
        participation_id: ParticipationId,
    ) -> Result<(), CiError> {
        if self
            .inject(Op::CancelJobs, &participation_id.to_string())
            .await
        {
            return Err(ci_fault());
        }
        Ok(())
    }
}

#[async_trait]
impl LocalRepoCache for FakeHosts {
    async fn delete_local_repository(&self, uri: &RepositoryUri) -> std::io::Result<()> {
        if self.inject(Op::DeleteLocalRepository, &repo_key(uri)).await {
            return Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "injected fault",
            ));
        }
        Ok(())
    }
}

/// Config with short deadlines for tests.
pub fn test_config() -> LifecycleConfig {
    LifecycleConfig {
        remote_timeout_secs: 5,
        ..LifecycleConfig::default()
    }
}
