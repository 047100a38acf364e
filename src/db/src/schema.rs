mod participant;
mod participation;
mod submission;

pub use participant::{ParticipantKind, UnknownParticipantKind};
pub use participation::InitializationState;
pub use submission::SubmissionKind;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ParticipationId = i32;
pub type ExerciseId = i32;
pub type UserId = uuid::Uuid;
pub type TeamId = i32;
pub type SubmissionId = i32;
pub type OutcomeId = i32;
pub type ScoreId = i32;
pub type TokenId = i32;

/// Whoever works on an exercise: a single user or a team.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Participant {
    User { id: UserId, login: String },
    Team { id: TeamId, short_name: String },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Participation {
    pub id: ParticipationId,
    pub exercise_id: ExerciseId,
    /// Project key of the exercise, kept here so that build plans can be
    /// released without loading the exercise.
    pub project_key: String,
    pub participant: Participant,
    pub state: InitializationState,
    pub initialization_date: Option<DateTime<Utc>>,
    pub attempt: i32,
    pub practice_mode: bool,
    pub repository_uri: Option<String>,
    pub build_plan_id: Option<String>,
    pub branch: Option<String>,
    pub individual_due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewParticipation {
    pub exercise_id: ExerciseId,
    pub project_key: String,
    pub participant: Participant,
    pub(crate) state: InitializationState,
    pub(crate) initialization_date: Option<DateTime<Utc>>,
    pub(crate) attempt: i32,
    pub(crate) practice_mode: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Submission {
    pub id: SubmissionId,
    pub participation_id: ParticipationId,
    pub kind: SubmissionKind,
    pub submitted: bool,
    pub submission_date: Option<DateTime<Utc>>,
}

pub struct NewSubmission {
    pub participation_id: ParticipationId,
    pub kind: SubmissionKind,
    pub submitted: bool,
    pub submission_date: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct SubmissionPatch {
    pub submitted: Option<bool>,
    pub submission_date: Option<DateTime<Utc>>,
}

/// Result of assessing a participation, optionally bound to a submission.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Outcome {
    pub id: OutcomeId,
    pub participation_id: ParticipationId,
    pub submission_id: Option<SubmissionId>,
    pub score: f64,
}

pub struct NewOutcome {
    pub participation_id: ParticipationId,
    pub submission_id: Option<SubmissionId>,
    pub score: f64,
}

/// Aggregate score of one participant in one exercise.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ParticipantScore {
    pub id: ScoreId,
    pub exercise_id: ExerciseId,
    pub participant: Participant,
    pub last_score: f64,
}

pub struct NewParticipantScore {
    pub exercise_id: ExerciseId,
    pub participant: Participant,
    pub last_score: f64,
}

/// Credential granting a user access to the repository of one participation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VcsAccessToken {
    pub id: TokenId,
    pub participation_id: ParticipationId,
    pub user_id: UserId,
    pub token: String,
}

pub struct NewVcsAccessToken {
    pub participation_id: ParticipationId,
    pub user_id: UserId,
    pub token: String,
}
