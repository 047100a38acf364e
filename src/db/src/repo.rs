mod memory;
#[cfg(feature = "postgres")]
mod pg;

pub use memory::MemoryRepo;
#[cfg(feature = "postgres")]
pub use pg::PgRepo;

use crate::schema::*;
use anyhow::{bail, Result};
use async_trait::async_trait;

#[async_trait]
pub trait ParticipationsRepo: std::fmt::Debug + Send + Sync {
    /// Inserts unconditionally. Fails if the uniqueness slot
    /// (exercise, participant, practice mode, attempt) is taken.
    async fn part_new(&self, part_data: NewParticipation) -> Result<Participation>;

    /// Atomically returns the participation occupying the uniqueness slot of
    /// `part_data`, creating it if there is none. Second element is `true` if
    /// the participation was created by this call.
    async fn part_get_or_create(
        &self,
        part_data: NewParticipation,
    ) -> Result<(Participation, bool)>;

    async fn part_try_load(&self, id: ParticipationId) -> Result<Option<Participation>>;

    async fn part_load(&self, id: ParticipationId) -> Result<Participation> {
        match self.part_try_load(id).await? {
            Some(part) => Ok(part),
            None => bail!("part_load: unknown participation id"),
        }
    }

    /// Returns the latest attempt of the participant with the given mode.
    async fn part_lookup(
        &self,
        exercise_id: ExerciseId,
        participant: &Participant,
        practice_mode: bool,
    ) -> Result<Option<Participation>>;

    /// Returns all participations of the participant in any state and mode,
    /// ordered by id.
    async fn part_select_by_participant(
        &self,
        exercise_id: ExerciseId,
        participant: &Participant,
    ) -> Result<Vec<Participation>>;

    async fn part_select_by_exercise(&self, exercise_id: ExerciseId) -> Result<Vec<Participation>>;

    async fn part_select_by_team(&self, team_id: TeamId) -> Result<Vec<Participation>>;

    /// Persists every mutable field of `part`.
    async fn part_save(&self, part: &Participation) -> Result<()>;

    async fn part_delete(&self, id: ParticipationId) -> Result<()>;
}

#[async_trait]
pub trait SubmissionsRepo: Send + Sync {
    async fn sub_new(&self, sub_data: NewSubmission) -> Result<Submission>;
    async fn sub_select(&self, participation_id: ParticipationId) -> Result<Vec<Submission>>;
    async fn sub_update(&self, sub_id: SubmissionId, patch: SubmissionPatch) -> Result<()>;
    async fn sub_delete(&self, sub_id: SubmissionId) -> Result<()>;
}

#[async_trait]
pub trait OutcomesRepo: Send + Sync {
    async fn outcome_new(&self, outcome_data: NewOutcome) -> Result<Outcome>;
    async fn outcome_select(&self, participation_id: ParticipationId) -> Result<Vec<Outcome>>;
    async fn outcome_delete(&self, outcome_id: OutcomeId) -> Result<()>;
}

#[async_trait]
pub trait ScoresRepo: Send + Sync {
    async fn score_new(&self, score_data: NewParticipantScore) -> Result<ParticipantScore>;
    async fn score_select_by_exercise(&self, exercise_id: ExerciseId)
        -> Result<Vec<ParticipantScore>>;
    /// Returns number of deleted records
    async fn score_delete_by_exercise(&self, exercise_id: ExerciseId) -> Result<u64>;
    /// Returns number of deleted records
    async fn score_delete_by_team(&self, team_id: TeamId) -> Result<u64>;
}

#[async_trait]
pub trait TokensRepo: Send + Sync {
    async fn token_new(&self, token_data: NewVcsAccessToken) -> Result<VcsAccessToken>;
    async fn token_find(&self, participation_id: ParticipationId)
        -> Result<Option<VcsAccessToken>>;
    async fn token_delete_by_participation(&self, participation_id: ParticipationId)
        -> Result<()>;
}

pub trait Repo:
    ParticipationsRepo + SubmissionsRepo + OutcomesRepo + ScoresRepo + TokensRepo
{
}
