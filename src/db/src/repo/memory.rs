use super::{OutcomesRepo, ParticipationsRepo, Repo, ScoresRepo, SubmissionsRepo, TokensRepo};
use crate::schema::*;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Data {
    // None if the row was deleted
    parts: Vec<Option<Participation>>,
    subs: Vec<Option<Submission>>,
    outcomes: Vec<Option<Outcome>>,
    scores: Vec<Option<ParticipantScore>>,
    tokens: Vec<Option<VcsAccessToken>>,
}

fn live<T>(rows: &[Option<T>]) -> impl Iterator<Item = &T> {
    rows.iter().filter_map(Option::as_ref)
}

#[derive(Clone, Debug, Default)]
pub struct MemoryRepo {
    conn: Arc<Mutex<Data>>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> Result<MutexGuard<'_, Data>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("memory repo is poisoned"))
    }
}

fn insert_participation(data: &mut Data, part_data: NewParticipation) -> Participation {
    let part_id = data.parts.len() as ParticipationId;
    let part = part_data.into_participation(part_id);
    data.parts.push(Some(part.clone()));
    part
}

#[async_trait]
impl ParticipationsRepo for MemoryRepo {
    async fn part_new(&self, part_data: NewParticipation) -> Result<Participation> {
        let mut data = self.data()?;
        if live(&data.parts).any(|p| part_data.collides_with(p)) {
            bail!("part_new@memory: participation already exists");
        }
        Ok(insert_participation(&mut data, part_data))
    }

    async fn part_get_or_create(
        &self,
        part_data: NewParticipation,
    ) -> Result<(Participation, bool)> {
        let mut data = self.data()?;
        if let Some(existing) = live(&data.parts).find(|p| part_data.collides_with(p)) {
            return Ok((existing.clone(), false));
        }
        Ok((insert_participation(&mut data, part_data), true))
    }

    async fn part_try_load(&self, id: ParticipationId) -> Result<Option<Participation>> {
        let data = self.data()?;
        Ok(data.parts.get(id as usize).cloned().unwrap_or(None))
    }

    async fn part_lookup(
        &self,
        exercise_id: ExerciseId,
        participant: &Participant,
        practice_mode: bool,
    ) -> Result<Option<Participation>> {
        let data = self.data()?;
        Ok(live(&data.parts)
            .filter(|p| {
                p.exercise_id == exercise_id
                    && p.participant.is_same(participant)
                    && p.practice_mode == practice_mode
            })
            .max_by_key(|p| (p.attempt, p.id))
            .cloned())
    }

    async fn part_select_by_participant(
        &self,
        exercise_id: ExerciseId,
        participant: &Participant,
    ) -> Result<Vec<Participation>> {
        let data = self.data()?;
        Ok(live(&data.parts)
            .filter(|p| p.exercise_id == exercise_id && p.participant.is_same(participant))
            .cloned()
            .collect())
    }

    async fn part_select_by_exercise(&self, exercise_id: ExerciseId) -> Result<Vec<Participation>> {
        let data = self.data()?;
        Ok(live(&data.parts)
            .filter(|p| p.exercise_id == exercise_id)
            .cloned()
            .collect())
    }

    async fn part_select_by_team(&self, team_id: TeamId) -> Result<Vec<Participation>> {
        let data = self.data()?;
        Ok(live(&data.parts)
            .filter(|p| p.participant.team_id() == Some(team_id))
            .cloned()
            .collect())
    }

    async fn part_save(&self, part: &Participation) -> Result<()> {
        let mut data = self.data()?;
        match data.parts.get_mut(part.id as usize) {
            Some(Some(cur)) => {
                *cur = part.clone();
                Ok(())
            }
            None | Some(None) => bail!("part_save@memory: unknown participation id"),
        }
    }

    async fn part_delete(&self, id: ParticipationId) -> Result<()> {
        let mut data = self.data()?;
        let cur = match data.parts.get_mut(id as usize) {
            Some(x) => x,
            None => bail!("part_delete@memory: unknown participation id"),
        };
        if cur.take().is_some() {
            Ok(())
        } else {
            bail!("part_delete@memory: participation already deleted")
        }
    }
}

#[async_trait]
impl SubmissionsRepo for MemoryRepo {
    async fn sub_new(&self, sub_data: NewSubmission) -> Result<Submission> {
        let mut data = self.data()?;
        let sub = Submission {
            id: data.subs.len() as SubmissionId,
            participation_id: sub_data.participation_id,
            kind: sub_data.kind,
            submitted: sub_data.submitted,
            submission_date: sub_data.submission_date,
        };
        data.subs.push(Some(sub.clone()));
        Ok(sub)
    }

    async fn sub_select(&self, participation_id: ParticipationId) -> Result<Vec<Submission>> {
        let data = self.data()?;
        Ok(live(&data.subs)
            .filter(|s| s.participation_id == participation_id)
            .cloned()
            .collect())
    }

    async fn sub_update(&self, sub_id: SubmissionId, patch: SubmissionPatch) -> Result<()> {
        let mut data = self.data()?;
        let cur = match data.subs.get_mut(sub_id as usize) {
            Some(Some(x)) => x,
            None | Some(None) => bail!("sub_update@memory: unknown submission id"),
        };
        if let Some(submitted) = patch.submitted {
            cur.submitted = submitted;
        }
        if let Some(date) = patch.submission_date {
            cur.submission_date = Some(date);
        }
        Ok(())
    }

    async fn sub_delete(&self, sub_id: SubmissionId) -> Result<()> {
        let mut data = self.data()?;
        match data.subs.get_mut(sub_id as usize) {
            Some(cur) if cur.is_some() => {
                cur.take();
            }
            _ => bail!("sub_delete@memory: unknown submission id"),
        }
        // outcomes of the submission go with it
        for row in data.outcomes.iter_mut() {
            if matches!(row, Some(o) if o.submission_id == Some(sub_id)) {
                row.take();
            }
        }
        Ok(())
    }
}

#[async_trait]
impl OutcomesRepo for MemoryRepo {
    async fn outcome_new(&self, outcome_data: NewOutcome) -> Result<Outcome> {
        let mut data = self.data()?;
        let outcome = Outcome {
            id: data.outcomes.len() as OutcomeId,
            participation_id: outcome_data.participation_id,
            submission_id: outcome_data.submission_id,
            score: outcome_data.score,
        };
        data.outcomes.push(Some(outcome.clone()));
        Ok(outcome)
    }

    async fn outcome_select(&self, participation_id: ParticipationId) -> Result<Vec<Outcome>> {
        let data = self.data()?;
        Ok(live(&data.outcomes)
            .filter(|o| o.participation_id == participation_id)
            .cloned()
            .collect())
    }

    async fn outcome_delete(&self, outcome_id: OutcomeId) -> Result<()> {
        let mut data = self.data()?;
        match data.outcomes.get_mut(outcome_id as usize) {
            Some(cur) if cur.is_some() => {
                cur.take();
                Ok(())
            }
            _ => bail!("outcome_delete@memory: unknown outcome id"),
        }
    }
}

#[async_trait]
impl ScoresRepo for MemoryRepo {
    async fn score_new(&self, score_data: NewParticipantScore) -> Result<ParticipantScore> {
        let mut data = self.data()?;
        let score = ParticipantScore {
            id: data.scores.len() as ScoreId,
            exercise_id: score_data.exercise_id,
            participant: score_data.participant,
            last_score: score_data.last_score,
        };
        data.scores.push(Some(score.clone()));
        Ok(score)
    }

    async fn score_select_by_exercise(
        &self,
        exercise_id: ExerciseId,
    ) -> Result<Vec<ParticipantScore>> {
        let data = self.data()?;
        Ok(live(&data.scores)
            .filter(|s| s.exercise_id == exercise_id)
            .cloned()
            .collect())
    }

    async fn score_delete_by_exercise(&self, exercise_id: ExerciseId) -> Result<u64> {
        let mut data = self.data()?;
        let mut cnt = 0;
        for row in data.scores.iter_mut() {
            if matches!(row, Some(s) if s.exercise_id == exercise_id) {
                row.take();
                cnt += 1;
            }
        }
        Ok(cnt)
    }

    async fn score_delete_by_team(&self, team_id: TeamId) -> Result<u64> {
        let mut data = self.data()?;
        let mut cnt = 0;
        for row in data.scores.iter_mut() {
            if matches!(row, Some(s) if s.participant.team_id() == Some(team_id)) {
                row.take();
                cnt += 1;
            }
        }
        Ok(cnt)
    }
}

#[async_trait]
impl TokensRepo for MemoryRepo {
    async fn token_new(&self, token_data: NewVcsAccessToken) -> Result<VcsAccessToken> {
        let mut data = self.data()?;
        let token = VcsAccessToken {
            id: data.tokens.len() as TokenId,
            participation_id: token_data.participation_id,
            user_id: token_data.user_id,
            token: token_data.token,
        };
        data.tokens.push(Some(token.clone()));
        Ok(token)
    }

    async fn token_find(
        &self,
        participation_id: ParticipationId,
    ) -> Result<Option<VcsAccessToken>> {
        let data = self.data()?;
        let token = live(&data.tokens)
            .find(|t| t.participation_id == participation_id)
            .cloned();
        Ok(token)
    }

    async fn token_delete_by_participation(&self, participation_id: ParticipationId) -> Result<()> {
        let mut data = self.data()?;
        for row in data.tokens.iter_mut() {
            if matches!(row, Some(t) if t.participation_id == participation_id) {
                row.take();
            }
        }
        Ok(())
    }
}

impl Repo for MemoryRepo {}
