use serde::{Deserialize, Serialize};

#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionKind {
    Manual = 0,
    /// Submitted outside of the regular workflow, e.g. graded externally.
    External = 1,
    Instructor = 2,
    Illegal = 3,
}

impl SubmissionKind {
    pub const fn as_int(self) -> i16 {
        self as i16
    }
}

impl TryFrom<i16> for SubmissionKind {
    type Error = anyhow::Error;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        let kind = match value {
            0 => SubmissionKind::Manual,
            1 => SubmissionKind::External,
            2 => SubmissionKind::Instructor,
            3 => SubmissionKind::Illegal,
            other => anyhow::bail!("invalid submission kind {}", other),
        };
        Ok(kind)
    }
}

#[cfg(feature = "postgres")]
impl super::Submission {
    pub(crate) fn from_pg_row(row: tokio_postgres::Row) -> anyhow::Result<Self> {
        let kind: i16 = row.try_get("kind")?;
        Ok(Self {
            id: row.try_get("id")?,
            participation_id: row.try_get("participation_id")?,
            kind: kind.try_into()?,
            submitted: row.try_get("submitted")?,
            submission_date: row.try_get("submission_date")?,
        })
    }
}

#[cfg(feature = "postgres")]
impl super::Outcome {
    pub(crate) fn from_pg_row(row: tokio_postgres::Row) -> Self {
        Self {
            id: row.get("id"),
            participation_id: row.get("participation_id"),
            submission_id: row.get("submission_id"),
            score: row.get("score"),
        }
    }
}

#[cfg(feature = "postgres")]
impl super::VcsAccessToken {
    pub(crate) fn from_pg_row(row: tokio_postgres::Row) -> Self {
        Self {
            id: row.get("id"),
            participation_id: row.get("participation_id"),
            user_id: row.get("user_id"),
            token: row.get("token"),
        }
    }
}

#[cfg(feature = "postgres")]
impl super::ParticipantScore {
    pub(crate) fn from_pg_row(row: tokio_postgres::Row) -> anyhow::Result<Self> {
        let kind: i16 = row.try_get("participant_kind")?;
        let raw_id: String = row.try_get("participant_id")?;
        let name: String = row.try_get("participant_name")?;
        Ok(Self {
            id: row.try_get("id")?,
            exercise_id: row.try_get("exercise_id")?,
            participant: super::Participant::from_parts(kind, &raw_id, name)?,
            last_score: row.try_get("last_score")?,
        })
    }
}
