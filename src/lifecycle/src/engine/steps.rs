//! Provisioning steps. Each step is skipped if participation already
//! reached its target state and holds its artifact, and persists the
//! participation after the transition.
use super::{naming, Engine};
use crate::{error::LifecycleError, remote::with_deadline, Result};
use chrono::Utc;
use db::schema::{InitializationState, Participant, Participation};
use provision_api::{BuildPlanId, Exercise, RepositoryUri};
use tracing::{debug, warn};

impl Engine {
    pub(super) async fn copy_repository(
        &self,
        exercise: &Exercise,
        mut part: Participation,
        source: &RepositoryUri,
    ) -> Result<Participation> {
        if part.state.has_completed(InitializationState::RepoCopied) && part.repository_uri.is_some()
        {
            return Ok(part);
        }
        let name = naming::repository_name(&part);
        debug!(participation = part.id, %source, name = name.as_str(), "copying repository");
        let uri = with_deadline(
            self.timeout(),
            "copy repository",
            self.svc
                .vcs
                .copy_repository(source, &exercise.project_key, &name, part.attempt),
        )
        .await?;
        let branch = with_deadline(
            self.timeout(),
            "retrieve default branch",
            self.svc.vcs.get_or_retrieve_default_branch(&uri),
        )
        .await?
        .unwrap_or_else(|| self.config.default_branch.clone());
        let uri = match &part.participant {
            Participant::User { login, .. } => uri.with_user(login),
            Participant::Team { .. } => uri,
        };
        part.repository_uri = Some(uri.to_string());
        part.branch = Some(branch);
        part.state = InitializationState::RepoCopied;
        self.svc.db.part_save(&part).await?;
        Ok(part)
    }

    pub(super) async fn configure_repository(
        &self,
        exercise: &Exercise,
        mut part: Participation,
    ) -> Result<Participation> {
        if part.state.has_completed(InitializationState::RepoConfigured) {
            return Ok(part);
        }
        let allow_access = naming::allow_repository_access(exercise, Utc::now());
        debug!(participation = part.id, allow_access, "configuring repository");
        with_deadline(
            self.timeout(),
            "configure repository",
            self.svc
                .vcs
                .configure_repository(exercise, &part, allow_access),
        )
        .await?;
        part.state = InitializationState::RepoConfigured;
        self.svc.db.part_save(&part).await?;
        Ok(part)
    }

    pub(super) async fn copy_build_plan(
        &self,
        exercise: &Exercise,
        mut part: Participation,
    ) -> Result<Participation> {
        if part.state.has_completed(InitializationState::BuildPlanCopied)
            && part.build_plan_id.is_some()
        {
            return Ok(part);
        }
        let plan_name = naming::build_plan_name(&part);
        debug!(participation = part.id, plan_name = plan_name.as_str(), "copying build plan");
        // existing plan is returned as is, so retries never duplicate it
        let plan_id = with_deadline(
            self.timeout(),
            "copy build plan",
            self.svc.ci.copy_build_plan(
                exercise,
                naming::BASE_PLAN_NAME,
                exercise,
                &exercise.build_project_name(),
                &plan_name,
                true,
            ),
        )
        .await?;
        part.build_plan_id = Some(plan_id.into());
        part.state = InitializationState::BuildPlanCopied;
        self.svc.db.part_save(&part).await?;
        Ok(part)
    }

    pub(super) async fn configure_build_plan(&self, mut part: Participation) -> Result<Participation> {
        if part.state.has_completed(InitializationState::BuildPlanConfigured) {
            return Ok(part);
        }
        let branch = part
            .branch
            .clone()
            .unwrap_or_else(|| self.config.default_branch.clone());
        debug!(participation = part.id, branch = branch.as_str(), "configuring build plan");
        let res = with_deadline(
            self.timeout(),
            "configure build plan",
            self.svc.ci.configure_build_plan(&part, &branch),
        )
        .await;
        if let Err(err) = res {
            if let LifecycleError::BuildConfiguration(_) = err {
                // next attempt copies the build plan again, repository is kept
                warn!(participation = part.id, error = %err, "rolling back to repository configured");
                part.state = InitializationState::RepoConfigured;
                self.svc.db.part_save(&part).await?;
            }
            return Err(err);
        }
        part.state = InitializationState::BuildPlanConfigured;
        self.svc.db.part_save(&part).await?;
        Ok(part)
    }

    /// Releases build plan of the participation, if any.
    pub(super) async fn delete_build_plan(&self, part: &Participation) -> Result<()> {
        if let Some(plan_id) = &part.build_plan_id {
            let plan_id = BuildPlanId::new(plan_id.as_str());
            with_deadline(
                self.timeout(),
                "delete build plan",
                self.svc.ci.delete_build_plan(&part.project_key, &plan_id),
            )
            .await?;
        }
        Ok(())
    }

    pub(super) fn mark_initialized(&self, part: &mut Participation) {
        part.state = InitializationState::Initialized;
        if part.initialization_date.is_none() {
            part.initialization_date = Some(Utc::now());
        }
    }
}

/// Parses locator stored in the participation.
pub(crate) fn stored_uri(raw: &str) -> Result<RepositoryUri> {
    raw.parse()
        .map_err(|source| LifecycleError::MalformedLocator {
            uri: raw.to_string(),
            source,
        })
}
