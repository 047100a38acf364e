//! Teardown of participations: remote artifacts first, then records.
use crate::{
    config::LifecycleConfig, engine::stored_uri, error::LifecycleError, remote::with_deadline,
    services::Services, Result,
};
use db::schema::{ExerciseId, Participation, ParticipationId, TeamId};
use provision_api::BuildPlanId;
use std::{collections::BTreeSet, sync::Arc};
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{debug, error, info, instrument, warn, Instrument};

/// Outcome of a bulk teardown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: Vec<ParticipationId>,
    /// Participations whose records could not be removed
    pub failed: Vec<ParticipationId>,
}

#[derive(Clone, Debug)]
pub struct Cleaner {
    svc: Services,
    config: Arc<LifecycleConfig>,
}

impl Cleaner {
    pub fn new(svc: Services, config: Arc<LifecycleConfig>) -> Self {
        Cleaner { svc, config }
    }

    /// Tears down single participation, including its build plan.
    #[instrument(skip(self))]
    pub async fn delete_participation(&self, id: ParticipationId) -> Result<()> {
        let part = self
            .svc
            .db
            .part_try_load(id)
            .await?
            .ok_or(LifecycleError::ParticipationNotFound(id))?;
        teardown(&self.svc, &self.config, part, true).await
    }

    /// Tears down every participation of the exercise.
    #[instrument(skip(self))]
    pub async fn delete_all_by_exercise(&self, exercise_id: ExerciseId) -> Result<CleanupReport> {
        let scores = self.svc.db.score_delete_by_exercise(exercise_id).await?;
        debug!(scores, "deleted participant scores");
        let parts = self.svc.db.part_select_by_exercise(exercise_id).await?;
        Ok(self.teardown_all(parts).await)
    }

    /// Tears down every participation of the team.
    #[instrument(skip(self))]
    pub async fn delete_all_by_team(&self, team_id: TeamId) -> Result<CleanupReport> {
        let scores = self.svc.db.score_delete_by_team(team_id).await?;
        debug!(scores, "deleted participant scores");
        let parts = self.svc.db.part_select_by_team(team_id).await?;
        Ok(self.teardown_all(parts).await)
    }

    async fn teardown_all(&self, parts: Vec<Participation>) -> CleanupReport {
        let semaphore = Arc::new(Semaphore::new(self.config.cleanup.workers.max(1)));
        let delete_build_plans = self.config.cleanup.bulk_delete_build_plans;
        let mut pending = BTreeSet::new();
        let mut tasks = JoinSet::new();
        info!(count = parts.len(), "tearing down participations");
        for part in parts {
            let id = part.id;
            pending.insert(id);
            let sem = Arc::clone(&semaphore);
            let svc = self.svc.clone();
            let config = Arc::clone(&self.config);
            let span = tracing::info_span!("teardown", participation = id);
            tasks.spawn(
                async move {
                    let res = match sem.acquire_owned().await {
                        Ok(_permit) => teardown(&svc, &config, part, delete_build_plans).await,
                        Err(_) => Err(LifecycleError::Precondition(
                            "cleanup pool was closed".to_string(),
                        )),
                    };
                    (id, res)
                }
                .instrument(span),
            );
        }

        let mut report = CleanupReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, Ok(()))) => {
                    pending.remove(&id);
                    report.deleted.push(id);
                }
                Ok((id, Err(err))) => {
                    error!(participation = id, error = %err, "teardown failed");
                    pending.remove(&id);
                    report.failed.push(id);
                }
                Err(err) => {
                    // id of a panicked unit is recovered from `pending` below
                    error!(error = %err, "teardown task panicked");
                }
            }
        }
        report.failed.extend(pending);
        report.deleted.sort_unstable();
        report.failed.sort_unstable();
        report
    }
}

/// Releases remote artifacts of `part` and deletes its records.
///
/// Host faults are logged and skipped; store faults are returned.
async fn teardown(
    svc: &Services,
    config: &LifecycleConfig,
    part: Participation,
    delete_build_plan: bool,
) -> Result<()> {
    let timeout = config.remote_timeout();
    let id = part.id;

    let cancelled = with_deadline(
        timeout,
        "cancel build jobs",
        svc.jobs.cancel_all_jobs_for_participation(id),
    )
    .await;
    if let Err(err) = cancelled {
        warn!(participation = id, error = %err, "failed to cancel build jobs");
    }

    if delete_build_plan {
        if let Some(plan_id) = &part.build_plan_id {
            let plan_id = BuildPlanId::new(plan_id.as_str());
            let deleted = with_deadline(
                timeout,
                "delete build plan",
                svc.ci.delete_build_plan(&part.project_key, &plan_id),
            )
            .await;
            if let Err(err) = deleted {
                warn!(participation = id, %plan_id, error = %err, "could not delete build plan");
            }
        }
    }

    if let Some(raw) = &part.repository_uri {
        match stored_uri(raw) {
            Ok(uri) => {
                let deleted = with_deadline(
                    timeout,
                    "delete repository",
                    svc.vcs.delete_repository(&uri),
                )
                .await;
                if let Err(err) = deleted {
                    warn!(participation = id, %uri, error = %err, "could not delete repository");
                }
                let purged = with_deadline(
                    timeout,
                    "delete local repository",
                    svc.cache.delete_local_repository(&uri),
                )
                .await;
                if let Err(err) = purged {
                    warn!(participation = id, %uri, error = %err, "could not delete local repository");
                }
            }
            Err(err) => warn!(participation = id, error = %err, "skipping repository deletion"),
        }
    }

    svc.db.token_delete_by_participation(id).await?;
    for sub in svc.db.sub_select(id).await? {
        // outcomes of the submission go with it
        svc.db.sub_delete(sub.id).await?;
    }
    for outcome in svc.db.outcome_select(id).await? {
        svc.db.outcome_delete(outcome.id).await?;
    }
    svc.db.part_delete(id).await?;
    debug!(participation = id, "participation deleted");
    Ok(())
}
