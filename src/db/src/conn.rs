use crate::schema::*;
use anyhow::Result;

#[derive(Debug, Clone)]
pub struct DbConn {
    pub(crate) mem: crate::repo::MemoryRepo,
    #[cfg(feature = "postgres")]
    pub(crate) pg: Option<crate::repo::PgRepo>,
}

impl DbConn {
    /// Returns backing repository: postgres if configured, memory otherwise.
    pub fn repo(&self) -> &dyn crate::repo::Repo {
        #[cfg(feature = "postgres")]
        if let Some(pg) = &self.pg {
            return pg;
        }
        &self.mem
    }

    pub fn is_persistent(&self) -> bool {
        #[cfg(feature = "postgres")]
        if self.pg.is_some() {
            return true;
        }
        false
    }
}

impl DbConn {
    pub async fn part_new(&self, data: NewParticipation) -> Result<Participation> {
        self.repo().part_new(data).await
    }

    pub async fn part_get_or_create(
        &self,
        data: NewParticipation,
    ) -> Result<(Participation, bool)> {
        self.repo().part_get_or_create(data).await
    }

    pub async fn part_try_load(&self, id: ParticipationId) -> Result<Option<Participation>> {
        self.repo().part_try_load(id).await
    }

    pub async fn part_load(&self, id: ParticipationId) -> Result<Participation> {
        self.repo().part_load(id).await
    }

    pub async fn part_lookup(
        &self,
        exercise_id: ExerciseId,
        participant: &Participant,
        practice_mode: bool,
    ) -> Result<Option<Participation>> {
        self.repo()
            .part_lookup(exercise_id, participant, practice_mode)
            .await
    }

    pub async fn part_select_by_participant(
        &self,
        exercise_id: ExerciseId,
        participant: &Participant,
    ) -> Result<Vec<Participation>> {
        self.repo()
            .part_select_by_participant(exercise_id, participant)
            .await
    }

    pub async fn part_select_by_exercise(
        &self,
        exercise_id: ExerciseId,
    ) -> Result<Vec<Participation>> {
        self.repo().part_select_by_exercise(exercise_id).await
    }

    pub async fn part_select_by_team(&self, team_id: TeamId) -> Result<Vec<Participation>> {
        self.repo().part_select_by_team(team_id).await
    }

    pub async fn part_save(&self, part: &Participation) -> Result<()> {
        self.repo().part_save(part).await
    }

    pub async fn part_delete(&self, id: ParticipationId) -> Result<()> {
        self.repo().part_delete(id).await
    }

    pub async fn sub_new(&self, data: NewSubmission) -> Result<Submission> {
        self.repo().sub_new(data).await
    }

    pub async fn sub_select(&self, participation_id: ParticipationId) -> Result<Vec<Submission>> {
        self.repo().sub_select(participation_id).await
    }

    pub async fn sub_update(&self, sub_id: SubmissionId, patch: SubmissionPatch) -> Result<()> {
        self.repo().sub_update(sub_id, patch).await
    }

    pub async fn sub_delete(&self, sub_id: SubmissionId) -> Result<()> {
        self.repo().sub_delete(sub_id).await
    }

    pub async fn outcome_new(&self, data: NewOutcome) -> Result<Outcome> {
        self.repo().outcome_new(data).await
    }

    pub async fn outcome_select(&self, participation_id: ParticipationId) -> Result<Vec<Outcome>> {
        self.repo().outcome_select(participation_id).await
    }

    pub async fn outcome_delete(&self, outcome_id: OutcomeId) -> Result<()> {
        self.repo().outcome_delete(outcome_id).await
    }

    pub async fn score_new(&self, data: NewParticipantScore) -> Result<ParticipantScore> {
        self.repo().score_new(data).await
    }

    pub async fn score_select_by_exercise(
        &self,
        exercise_id: ExerciseId,
    ) -> Result<Vec<ParticipantScore>> {
        self.repo().score_select_by_exercise(exercise_id).await
    }

    pub async fn score_delete_by_exercise(&self, exercise_id: ExerciseId) -> Result<u64> {
        self.repo().score_delete_by_exercise(exercise_id).await
    }

    pub async fn score_delete_by_team(&self, team_id: TeamId) -> Result<u64> {
        self.repo().score_delete_by_team(team_id).await
    }

    pub async fn token_new(&self, data: NewVcsAccessToken) -> Result<VcsAccessToken> {
        self.repo().token_new(data).await
    }

    pub async fn token_find(
        &self,
        participation_id: ParticipationId,
    ) -> Result<Option<VcsAccessToken>> {
        self.repo().token_find(participation_id).await
    }

    pub async fn token_delete_by_participation(
        &self,
        participation_id: ParticipationId,
    ) -> Result<()> {
        self.repo()
            .token_delete_by_participation(participation_id)
            .await
    }
}
