//! Provisioning state machine of a single participation.
mod naming;
mod steps;

pub(crate) use steps::stored_uri;

use crate::{
    config::LifecycleConfig, error::LifecycleError, remote::with_deadline, services::Services,
    Result,
};
use chrono::{DateTime, Utc};
use db::schema::{
    InitializationState, NewParticipation, NewSubmission, NewVcsAccessToken, Participant,
    Participation, ParticipationId, Submission, SubmissionKind, SubmissionPatch,
};
use provision_api::Exercise;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, instrument};

/// Drives participations through
/// `UNINITIALIZED -> REPO_COPIED -> REPO_CONFIGURED -> BUILD_PLAN_COPIED ->
/// BUILD_PLAN_CONFIGURED -> INITIALIZED`, persisting after every step.
///
/// Operations on the same participation must not run concurrently.
#[derive(Clone, Debug)]
pub struct Engine {
    svc: Services,
    config: Arc<LifecycleConfig>,
}

impl Engine {
    pub fn new(svc: Services, config: Arc<LifecycleConfig>) -> Self {
        Engine { svc, config }
    }

    fn timeout(&self) -> Duration {
        self.config.remote_timeout()
    }

    pub async fn find_by_id(&self, id: ParticipationId) -> Result<Participation> {
        self.svc
            .db
            .part_try_load(id)
            .await?
            .ok_or(LifecycleError::ParticipationNotFound(id))
    }

    /// Returns all participations of `participant` in any state and mode.
    pub async fn find_by_exercise_and_participant(
        &self,
        exercise: &Exercise,
        participant: &Participant,
    ) -> Result<Vec<Participation>> {
        let parts = self
            .svc
            .db
            .part_select_by_participant(exercise.id, participant)
            .await?;
        Ok(parts)
    }

    /// Starts (or continues starting) graded participation of `participant`.
    ///
    /// For test exams every call begins a new attempt and finishes previous ones.
    #[instrument(skip(self, exercise, participant), fields(exercise = exercise.id, participant = participant.identifier()))]
    pub async fn start_exercise(
        &self,
        exercise: &Exercise,
        participant: &Participant,
    ) -> Result<Participation> {
        let part = if exercise.is_test_exam() {
            self.create_test_exam_attempt(exercise, participant).await?
        } else {
            if exercise.is_course() {
                self.deactivate_practice(exercise, participant).await?;
            }
            self.get_or_create(exercise, participant, false).await?
        };
        let part = self
            .copy_repository(exercise, part, &exercise.template_repository)
            .await?;
        let mut part = self.provision(exercise, part).await?;
        self.mark_initialized(&mut part);
        self.svc.db.part_save(&part).await?;
        info!(participation = part.id, "participation initialized");
        Ok(part)
    }

    /// Starts practice participation. With `use_graded`, its repository is
    /// copied from the graded participation instead of the template.
    /// Graded participation, if any, is finished.
    #[instrument(skip(self, exercise, participant), fields(exercise = exercise.id, participant = participant.identifier()))]
    pub async fn start_practice_mode(
        &self,
        exercise: &Exercise,
        participant: &Participant,
        use_graded: bool,
    ) -> Result<Participation> {
        if !exercise.is_course() {
            return Err(LifecycleError::Precondition(
                "practice mode is only available for course exercises".to_string(),
            ));
        }
        let mut graded = self
            .svc
            .db
            .part_lookup(exercise.id, participant, false)
            .await?;
        if let Some(graded) = &mut graded {
            graded.state = InitializationState::Finished;
            self.svc.db.part_save(graded).await?;
        }
        let part = self.get_or_create(exercise, participant, true).await?;
        let graded_uri = graded.as_ref().and_then(|g| g.repository_uri.as_deref());
        let source = match graded_uri {
            Some(raw) if use_graded => stored_uri(raw)?,
            _ => exercise.template_repository.clone(),
        };
        let part = self.copy_repository(exercise, part, &source).await?;
        let mut part = self.provision(exercise, part).await?;
        self.mark_initialized(&mut part);
        self.svc.db.part_save(&part).await?;
        info!(participation = part.id, "practice participation initialized");
        Ok(part)
    }

    /// Recreates build plan of a participation whose repository still exists,
    /// e.g. after [`Engine::cleanup_build_plan`].
    #[instrument(skip(self, exercise, part), fields(participation = part.id))]
    pub async fn resume_exercise(
        &self,
        exercise: &Exercise,
        part: Participation,
    ) -> Result<Participation> {
        if part.repository_uri.is_none() {
            return Err(LifecycleError::Precondition(format!(
                "participation {} has no repository to resume",
                part.id
            )));
        }
        let part = self.copy_build_plan(exercise, part).await?;
        let mut part = self.configure_build_plan(part).await?;
        let past_due = naming::effective_due_date(&part, exercise)
            .map_or(false, |due| Utc::now() > due);
        if part.is_graded() && past_due {
            part.state = InitializationState::Finished;
        } else {
            part.state = InitializationState::Initialized;
        }
        if part.initialization_date.is_none() {
            part.initialization_date = Some(Utc::now());
        }
        self.svc.db.part_save(&part).await?;
        Ok(part)
    }

    /// Ensures a finished graded participation with a submitted submission
    /// exists. Repository is provisioned, build plan is not.
    #[instrument(skip(self, exercise, participant), fields(exercise = exercise.id, participant = participant.identifier()))]
    pub async fn create_with_immediate_submission(
        &self,
        exercise: &Exercise,
        participant: &Participant,
        kind: SubmissionKind,
    ) -> Result<(Participation, Submission)> {
        let existing = self
            .svc
            .db
            .part_lookup(exercise.id, participant, false)
            .await?;
        let part = match existing {
            Some(part) => part,
            None => {
                let mut data =
                    NewParticipation::new(exercise.id, &exercise.project_key, participant.clone());
                data.set_initialization_date(Some(Utc::now()));
                self.svc.db.part_get_or_create(data).await?.0
            }
        };
        let part = self
            .copy_repository(exercise, part, &exercise.template_repository)
            .await?;
        let mut part = self.configure_repository(exercise, part).await?;
        part.state = InitializationState::Finished;
        self.svc.db.part_save(&part).await?;

        let latest = self.svc.db.sub_select(part.id).await?.pop();
        let mut submission = match latest {
            Some(sub) => sub,
            None => {
                self.svc
                    .db
                    .sub_new(NewSubmission {
                        participation_id: part.id,
                        kind,
                        submitted: false,
                        submission_date: None,
                    })
                    .await?
            }
        };
        if !submission.submitted {
            let now = Utc::now();
            self.svc
                .db
                .sub_update(
                    submission.id,
                    SubmissionPatch {
                        submitted: Some(true),
                        submission_date: Some(now),
                    },
                )
                .await?;
            submission.submitted = true;
            submission.submission_date = Some(now);
        }
        Ok((part, submission))
    }

    /// Deletes build plan, keeping the repository. Participation becomes
    /// INACTIVE and can be resumed.
    #[instrument(skip(self, part), fields(participation = part.id))]
    pub async fn cleanup_build_plan(&self, mut part: Participation) -> Result<Participation> {
        self.delete_build_plan(&part).await?;
        part.build_plan_id = None;
        if part.state.has_completed(InitializationState::RepoConfigured) {
            part.state = InitializationState::Inactive;
        }
        self.svc.db.part_save(&part).await?;
        Ok(part)
    }

    /// Deletes repository and its working copy. Participation becomes FINISHED.
    #[instrument(skip(self, part), fields(participation = part.id))]
    pub async fn cleanup_repository(&self, mut part: Participation) -> Result<Participation> {
        if let Some(raw) = &part.repository_uri {
            let uri = stored_uri(raw)?;
            with_deadline(
                self.timeout(),
                "delete repository",
                self.svc.vcs.delete_repository(&uri),
            )
            .await?;
            with_deadline(
                self.timeout(),
                "delete local repository",
                self.svc.cache.delete_local_repository(&uri),
            )
            .await?;
        }
        part.repository_uri = None;
        part.state = InitializationState::Finished;
        self.svc.db.part_save(&part).await?;
        Ok(part)
    }

    /// Applies requested individual due dates. A due date is only kept if the
    /// exercise has one and the requested date is not before it.
    /// Returns participations whose due date actually changed.
    pub async fn update_individual_due_dates(
        &self,
        exercise: &Exercise,
        requested: &[(ParticipationId, Option<DateTime<Utc>>)],
    ) -> Result<Vec<Participation>> {
        let mut changed = Vec::new();
        for &(id, due_date) in requested {
            let mut part = match self.svc.db.part_try_load(id).await? {
                Some(p) => p,
                None => continue,
            };
            let due_date = match (exercise.due_date, due_date) {
                (None, _) => None,
                (Some(exercise_due), Some(d)) if d < exercise_due => None,
                (Some(_), d) => d,
            };
            if part.individual_due_date != due_date {
                part.individual_due_date = due_date;
                self.svc.db.part_save(&part).await?;
                changed.push(part);
            }
        }
        Ok(changed)
    }

    /// Runs every step after repository copy.
    async fn provision(&self, exercise: &Exercise, part: Participation) -> Result<Participation> {
        let part = self.configure_repository(exercise, part).await?;
        let part = self.copy_build_plan(exercise, part).await?;
        self.configure_build_plan(part).await
    }

    async fn get_or_create(
        &self,
        exercise: &Exercise,
        participant: &Participant,
        practice_mode: bool,
    ) -> Result<Participation> {
        let mut data = NewParticipation::new(exercise.id, &exercise.project_key, participant.clone());
        if practice_mode {
            data.set_practice_mode(true).set_attempt(1);
        }
        let (part, created) = self.svc.db.part_get_or_create(data).await?;
        if created {
            debug!(participation = part.id, practice_mode, "created participation");
            self.create_access_token(&part).await?;
        }
        Ok(part)
    }

    async fn create_test_exam_attempt(
        &self,
        exercise: &Exercise,
        participant: &Participant,
    ) -> Result<Participation> {
        let previous = self
            .svc
            .db
            .part_select_by_participant(exercise.id, participant)
            .await?;
        // Deleted attempts leave gaps, so continue after the highest one.
        let attempt = previous
            .iter()
            .filter(|p| p.is_graded())
            .map(|p| p.attempt + 1)
            .max()
            .unwrap_or(0);
        for mut prev in previous.into_iter().filter(|p| p.is_graded()) {
            if prev.state != InitializationState::Finished {
                prev.state = InitializationState::Finished;
                self.svc.db.part_save(&prev).await?;
            }
        }
        let mut data = NewParticipation::new(exercise.id, &exercise.project_key, participant.clone());
        data.set_attempt(attempt);
        let part = self.svc.db.part_new(data).await?;
        debug!(participation = part.id, attempt, "created test exam attempt");
        self.create_access_token(&part).await?;
        Ok(part)
    }

    /// Graded start of a course exercise parks the practice participation.
    async fn deactivate_practice(
        &self,
        exercise: &Exercise,
        participant: &Participant,
    ) -> Result<()> {
        let practice = self
            .svc
            .db
            .part_lookup(exercise.id, participant, true)
            .await?;
        if let Some(mut practice) = practice {
            let parkable = practice.state.has_completed(InitializationState::RepoConfigured)
                && practice.state != InitializationState::Inactive;
            if parkable {
                practice.state = InitializationState::Inactive;
                self.svc.db.part_save(&practice).await?;
            }
        }
        Ok(())
    }

    async fn create_access_token(&self, part: &Participation) -> Result<()> {
        if let Some(user_id) = part.participant.user_id() {
            let token = format!("vcpat-{}", uuid::Uuid::new_v4().simple());
            self.svc
                .db
                .token_new(NewVcsAccessToken {
                    participation_id: part.id,
                    user_id,
                    token,
                })
                .await?;
        }
        Ok(())
    }
}
