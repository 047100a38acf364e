use super::{OutcomesRepo, ParticipationsRepo, Repo, ScoresRepo, SubmissionsRepo, TokensRepo};
use crate::schema::*;
use anyhow::{Context, Result};
use bb8::{Pool, PooledConnection};

type ConnectionManager = bb8_postgres::PostgresConnectionManager<tokio_postgres::tls::NoTls>;

const TEAM_KIND: i16 = ParticipantKind::Team.as_int();

#[derive(Debug, Clone)]
pub struct PgRepo {
    pool: Pool<ConnectionManager>,
}

impl PgRepo {
    async fn conn(&self) -> Result<PooledConnection<'_, ConnectionManager>> {
        self.pool
            .get()
            .await
            .context("cannot obtain postgres connection")
    }

    pub(crate) async fn new(conn_url: &str) -> Result<PgRepo> {
        let conn_manager =
            ConnectionManager::new_from_stringlike(conn_url, tokio_postgres::tls::NoTls)?;
        let mut pool_builder = Pool::builder();
        if let Some(timeout) = std::env::var("LIFECYCLE_DB_TIMEOUT")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
        {
            let dur = std::time::Duration::from_secs(timeout);
            pool_builder = pool_builder.connection_timeout(dur);
        }
        let pool = pool_builder.build(conn_manager).await?;
        Ok(PgRepo { pool })
    }
}

fn rows_to_parts(rows: Vec<tokio_postgres::Row>) -> Result<Vec<Participation>> {
    rows.into_iter().map(Participation::from_pg_row).collect()
}

#[async_trait::async_trait]
impl ParticipationsRepo for PgRepo {
    async fn part_new(&self, part_data: NewParticipation) -> Result<Participation> {
        let row = self
            .conn()
            .await?
            .query_one(
                "INSERT INTO participations (exercise_id, project_key, participant_kind, 
                participant_id, participant_name, state, initialization_date, attempt, practice_mode) 
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING id",
                &[
                    &part_data.exercise_id,
                    &part_data.project_key,
                    &part_data.participant.kind().as_int(),
                    &part_data.participant.raw_id(),
                    &part_data.participant.identifier(),
                    &part_data.state.as_int(),
                    &part_data.initialization_date,
                    &part_data.attempt,
                    &part_data.practice_mode,
                ],
            )
            .await
            .context("failed to insert participation")?;
        Ok(part_data.into_participation(row.get("id")))
    }

    async fn part_get_or_create(
        &self,
        part_data: NewParticipation,
    ) -> Result<(Participation, bool)> {
        let mut conn = self.conn().await?;
        let tran = conn.transaction().await?;
        let inserted = tran
            .query_opt(
                "INSERT INTO participations (exercise_id, project_key, participant_kind, 
                participant_id, participant_name, state, initialization_date, attempt, practice_mode) 
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (exercise_id, participant_kind, participant_id, practice_mode, attempt) 
                DO NOTHING
                RETURNING id",
                &[
                    &part_data.exercise_id,
                    &part_data.project_key,
                    &part_data.participant.kind().as_int(),
                    &part_data.participant.raw_id(),
                    &part_data.participant.identifier(),
                    &part_data.state.as_int(),
                    &part_data.initialization_date,
                    &part_data.attempt,
                    &part_data.practice_mode,
                ],
            )
            .await
            .context("failed to insert participation")?;
        let res = match inserted {
            Some(row) => (part_data.into_participation(row.get("id")), true),
            None => {
                let row = tran
                    .query_one(
                        "SELECT * FROM participations WHERE exercise_id = $1 
                        AND participant_kind = $2 AND participant_id = $3 
                        AND practice_mode = $4 AND attempt = $5",
                        &[
                            &part_data.exercise_id,
                            &part_data.participant.kind().as_int(),
                            &part_data.participant.raw_id(),
                            &part_data.practice_mode,
                            &part_data.attempt,
                        ],
                    )
                    .await
                    .context("failed to load conflicting participation")?;
                (Participation::from_pg_row(row)?, false)
            }
        };
        tran.commit().await.context("transaction commit error")?;
        Ok(res)
    }

    async fn part_try_load(&self, id: ParticipationId) -> Result<Option<Participation>> {
        let row = self
            .conn()
            .await?
            .query_opt("SELECT * FROM participations WHERE id = $1", &[&id])
            .await?;
        row.map(Participation::from_pg_row).transpose()
    }

    async fn part_lookup(
        &self,
        exercise_id: ExerciseId,
        participant: &Participant,
        practice_mode: bool,
    ) -> Result<Option<Participation>> {
        let row = self
            .conn()
            .await?
            .query_opt(
                "SELECT * FROM participations WHERE exercise_id = $1 
                AND participant_kind = $2 AND participant_id = $3 AND practice_mode = $4
                ORDER BY attempt DESC, id DESC
                LIMIT 1",
                &[
                    &exercise_id,
                    &participant.kind().as_int(),
                    &participant.raw_id(),
                    &practice_mode,
                ],
            )
            .await?;
        row.map(Participation::from_pg_row).transpose()
    }

    async fn part_select_by_participant(
        &self,
        exercise_id: ExerciseId,
        participant: &Participant,
    ) -> Result<Vec<Participation>> {
        let rows = self
            .conn()
            .await?
            .query(
                "SELECT * FROM participations WHERE exercise_id = $1 
                AND participant_kind = $2 AND participant_id = $3
                ORDER BY id",
                &[
                    &exercise_id,
                    &participant.kind().as_int(),
                    &participant.raw_id(),
                ],
            )
            .await?;
        rows_to_parts(rows)
    }

    async fn part_select_by_exercise(&self, exercise_id: ExerciseId) -> Result<Vec<Participation>> {
        let rows = self
            .conn()
            .await?
            .query(
                "SELECT * FROM participations WHERE exercise_id = $1 ORDER BY id",
                &[&exercise_id],
            )
            .await?;
        rows_to_parts(rows)
    }

    async fn part_select_by_team(&self, team_id: TeamId) -> Result<Vec<Participation>> {
        let rows = self
            .conn()
            .await?
            .query(
                "SELECT * FROM participations WHERE participant_kind = $1 AND participant_id = $2 
                ORDER BY id",
                &[&TEAM_KIND, &team_id.to_string()],
            )
            .await?;
        rows_to_parts(rows)
    }

    async fn part_save(&self, part: &Participation) -> Result<()> {
        let cnt = self
            .conn()
            .await?
            .execute(
                "UPDATE participations SET
                state = $1,
                initialization_date = $2,
                repository_uri = $3,
                build_plan_id = $4,
                branch = $5,
                individual_due_date = $6,
                participant_name = $7
            WHERE id = $8",
                &[
                    &part.state.as_int(),
                    &part.initialization_date,
                    &part.repository_uri,
                    &part.build_plan_id,
                    &part.branch,
                    &part.individual_due_date,
                    &part.participant.identifier(),
                    &part.id,
                ],
            )
            .await?;
        if cnt == 0 {
            anyhow::bail!("part_save@pg: unknown participation id");
        }
        Ok(())
    }

    async fn part_delete(&self, id: ParticipationId) -> Result<()> {
        self.conn()
            .await?
            .execute("DELETE FROM participations WHERE id = $1", &[&id])
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SubmissionsRepo for PgRepo {
    async fn sub_new(&self, sub_data: NewSubmission) -> Result<Submission> {
        let row = self.conn().await?.query_one(
            "INSERT INTO submissions (participation_id, kind, submitted, submission_date) VALUES ($1, $2, $3, $4) RETURNING id",
            &[
                &sub_data.participation_id,
                &sub_data.kind.as_int(),
                &sub_data.submitted,
                &sub_data.submission_date,
            ],
        ).await?;
        Ok(Submission {
            id: row.get("id"),
            participation_id: sub_data.participation_id,
            kind: sub_data.kind,
            submitted: sub_data.submitted,
            submission_date: sub_data.submission_date,
        })
    }

    async fn sub_select(&self, participation_id: ParticipationId) -> Result<Vec<Submission>> {
        let rows = self
            .conn()
            .await?
            .query(
                "SELECT * FROM submissions WHERE participation_id = $1 ORDER BY id",
                &[&participation_id],
            )
            .await?;
        rows.into_iter().map(Submission::from_pg_row).collect()
    }

    async fn sub_update(&self, sub_id: SubmissionId, patch: SubmissionPatch) -> Result<()> {
        self.conn()
            .await?
            .execute(
                "
        UPDATE submissions SET
            submitted = COALESCE($1, submitted),
            submission_date = COALESCE($2, submission_date)
        WHERE id = $3
        ",
                &[&patch.submitted, &patch.submission_date, &sub_id],
            )
            .await?;
        Ok(())
    }

    async fn sub_delete(&self, sub_id: SubmissionId) -> Result<()> {
        // outcomes are removed by ON DELETE CASCADE
        self.conn()
            .await?
            .execute("DELETE FROM submissions WHERE id = $1", &[&sub_id])
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl OutcomesRepo for PgRepo {
    async fn outcome_new(&self, outcome_data: NewOutcome) -> Result<Outcome> {
        let row = self.conn().await?.query_one(
            "INSERT INTO outcomes (participation_id, submission_id, score) VALUES ($1, $2, $3) RETURNING id",
            &[
                &outcome_data.participation_id,
                &outcome_data.submission_id,
                &outcome_data.score,
            ],
        ).await?;
        Ok(Outcome {
            id: row.get("id"),
            participation_id: outcome_data.participation_id,
            submission_id: outcome_data.submission_id,
            score: outcome_data.score,
        })
    }

    async fn outcome_select(&self, participation_id: ParticipationId) -> Result<Vec<Outcome>> {
        let rows = self
            .conn()
            .await?
            .query(
                "SELECT * FROM outcomes WHERE participation_id = $1 ORDER BY id",
                &[&participation_id],
            )
            .await?;
        Ok(rows.into_iter().map(Outcome::from_pg_row).collect())
    }

    async fn outcome_delete(&self, outcome_id: OutcomeId) -> Result<()> {
        self.conn()
            .await?
            .execute("DELETE FROM outcomes WHERE id = $1", &[&outcome_id])
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ScoresRepo for PgRepo {
    async fn score_new(&self, score_data: NewParticipantScore) -> Result<ParticipantScore> {
        let row = self
            .conn()
            .await?
            .query_one(
                "INSERT INTO participant_scores (exercise_id, participant_kind, participant_id, 
                participant_name, last_score) VALUES ($1, $2, $3, $4, $5) RETURNING id",
                &[
                    &score_data.exercise_id,
                    &score_data.participant.kind().as_int(),
                    &score_data.participant.raw_id(),
                    &score_data.participant.identifier(),
                    &score_data.last_score,
                ],
            )
            .await?;
        Ok(ParticipantScore {
            id: row.get("id"),
            exercise_id: score_data.exercise_id,
            participant: score_data.participant,
            last_score: score_data.last_score,
        })
    }

    async fn score_select_by_exercise(
        &self,
        exercise_id: ExerciseId,
    ) -> Result<Vec<ParticipantScore>> {
        let rows = self
            .conn()
            .await?
            .query(
                "SELECT * FROM participant_scores WHERE exercise_id = $1 ORDER BY id",
                &[&exercise_id],
            )
            .await?;
        rows.into_iter().map(ParticipantScore::from_pg_row).collect()
    }

    async fn score_delete_by_exercise(&self, exercise_id: ExerciseId) -> Result<u64> {
        let cnt = self
            .conn()
            .await?
            .execute(
                "DELETE FROM participant_scores WHERE exercise_id = $1",
                &[&exercise_id],
            )
            .await?;
        Ok(cnt)
    }

    async fn score_delete_by_team(&self, team_id: TeamId) -> Result<u64> {
        let cnt = self
            .conn()
            .await?
            .execute(
                "DELETE FROM participant_scores WHERE participant_kind = $1 AND participant_id = $2",
                &[&TEAM_KIND, &team_id.to_string()],
            )
            .await?;
        Ok(cnt)
    }
}

#[async_trait::async_trait]
impl TokensRepo for PgRepo {
    async fn token_new(&self, token_data: NewVcsAccessToken) -> Result<VcsAccessToken> {
        let row = self.conn().await?.query_one(
            "INSERT INTO vcs_access_tokens (participation_id, user_id, token) VALUES ($1, $2, $3) RETURNING id",
            &[&token_data.participation_id, &token_data.user_id, &token_data.token],
        ).await?;
        Ok(VcsAccessToken {
            id: row.get("id"),
            participation_id: token_data.participation_id,
            user_id: token_data.user_id,
            token: token_data.token,
        })
    }

    async fn token_find(
        &self,
        participation_id: ParticipationId,
    ) -> Result<Option<VcsAccessToken>> {
        let row = self
            .conn()
            .await?
            .query_opt(
                "SELECT * FROM vcs_access_tokens WHERE participation_id = $1 LIMIT 1",
                &[&participation_id],
            )
            .await?;
        Ok(row.map(VcsAccessToken::from_pg_row))
    }

    async fn token_delete_by_participation(&self, participation_id: ParticipationId) -> Result<()> {
        self.conn()
            .await?
            .execute(
                "DELETE FROM vcs_access_tokens WHERE participation_id = $1",
                &[&participation_id],
            )
            .await?;
        Ok(())
    }
}

impl Repo for PgRepo {}
