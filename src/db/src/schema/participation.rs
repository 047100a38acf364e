use super::{ExerciseId, NewParticipation, Participant, Participation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provisioning progress of a participation.
///
/// Variants are ordered: a participation in state `s` has completed every
/// state `t <= s`. `Inactive` is placed right after `RepoConfigured`, so an
/// inactive participation still owns its repository but has to redo the
/// build plan steps.
#[repr(i16)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InitializationState {
    Uninitialized = 0,
    RepoCopied = 1,
    RepoConfigured = 2,
    Inactive = 3,
    BuildPlanCopied = 4,
    BuildPlanConfigured = 5,
    Initialized = 6,
    Finished = 7,
}

impl InitializationState {
    pub const fn as_int(self) -> i16 {
        self as i16
    }

    pub fn has_completed(self, other: InitializationState) -> bool {
        self >= other
    }
}

impl From<InitializationState> for i16 {
    fn from(val: InitializationState) -> Self {
        val.as_int()
    }
}

impl TryFrom<i16> for InitializationState {
    type Error = anyhow::Error;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        let state = match value {
            0 => InitializationState::Uninitialized,
            1 => InitializationState::RepoCopied,
            2 => InitializationState::RepoConfigured,
            3 => InitializationState::Inactive,
            4 => InitializationState::BuildPlanCopied,
            5 => InitializationState::BuildPlanConfigured,
            6 => InitializationState::Initialized,
            7 => InitializationState::Finished,
            other => anyhow::bail!("invalid initialization state {}", other),
        };
        Ok(state)
    }
}

impl NewParticipation {
    pub fn new(exercise_id: ExerciseId, project_key: &str, participant: Participant) -> Self {
        NewParticipation {
            exercise_id,
            project_key: project_key.to_string(),
            participant,
            state: InitializationState::Uninitialized,
            initialization_date: None,
            attempt: 0,
            practice_mode: false,
        }
    }

    pub fn set_state(&mut self, state: InitializationState) -> &mut Self {
        self.state = state;
        self
    }

    pub fn set_initialization_date(&mut self, date: Option<DateTime<Utc>>) -> &mut Self {
        self.initialization_date = date;
        self
    }

    pub fn set_attempt(&mut self, attempt: i32) -> &mut Self {
        self.attempt = attempt;
        self
    }

    pub fn set_practice_mode(&mut self, practice_mode: bool) -> &mut Self {
        self.practice_mode = practice_mode;
        self
    }

    pub fn attempt(&self) -> i32 {
        self.attempt
    }

    pub fn practice_mode(&self) -> bool {
        self.practice_mode
    }

    /// Whether `part` occupies the uniqueness slot this record would take.
    pub(crate) fn collides_with(&self, part: &Participation) -> bool {
        part.exercise_id == self.exercise_id
            && part.participant.is_same(&self.participant)
            && part.practice_mode == self.practice_mode
            && part.attempt == self.attempt
    }

    pub(crate) fn into_participation(self, id: i32) -> Participation {
        Participation {
            id,
            exercise_id: self.exercise_id,
            project_key: self.project_key,
            participant: self.participant,
            state: self.state,
            initialization_date: self.initialization_date,
            attempt: self.attempt,
            practice_mode: self.practice_mode,
            repository_uri: None,
            build_plan_id: None,
            branch: None,
            individual_due_date: None,
        }
    }
}

impl Participation {
    /// Graded participations are the ones that count towards the score.
    pub fn is_graded(&self) -> bool {
        !self.practice_mode
    }

    pub fn mock_new(participant: Participant) -> Self {
        Self {
            id: 0,
            exercise_id: 0,
            project_key: String::new(),
            participant,
            state: InitializationState::Uninitialized,
            initialization_date: None,
            attempt: 0,
            practice_mode: false,
            repository_uri: None,
            build_plan_id: None,
            branch: None,
            individual_due_date: None,
        }
    }
}

#[cfg(feature = "postgres")]
impl Participation {
    pub(crate) fn from_pg_row(row: tokio_postgres::Row) -> anyhow::Result<Self> {
        let kind: i16 = row.try_get("participant_kind")?;
        let raw_id: String = row.try_get("participant_id")?;
        let name: String = row.try_get("participant_name")?;
        let state: i16 = row.try_get("state")?;
        Ok(Self {
            id: row.try_get("id")?,
            exercise_id: row.try_get("exercise_id")?,
            project_key: row.try_get("project_key")?,
            participant: Participant::from_parts(kind, &raw_id, name)?,
            state: state.try_into()?,
            initialization_date: row.try_get("initialization_date")?,
            attempt: row.try_get("attempt")?,
            practice_mode: row.try_get("practice_mode")?,
            repository_uri: row.try_get("repository_uri")?,
            build_plan_id: row.try_get("build_plan_id")?,
            branch: row.try_get("branch")?,
            individual_due_date: row.try_get("individual_due_date")?,
        })
    }
}
