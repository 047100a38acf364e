use super::{Participant, TeamId, UserId};
use anyhow::Context as _;

#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParticipantKind {
    User = 0,
    Team = 1,
}

impl ParticipantKind {
    pub const fn as_int(self) -> i16 {
        self as i16
    }
}

/// Stored participant kind is neither a user nor a team.
///
/// This is an invariant violation rather than a user error; callers can
/// recover it with `anyhow::Error::downcast_ref`.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("unknown participant kind {0}")]
pub struct UnknownParticipantKind(pub i16);

impl TryFrom<i16> for ParticipantKind {
    type Error = UnknownParticipantKind;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ParticipantKind::User),
            1 => Ok(ParticipantKind::Team),
            other => Err(UnknownParticipantKind(other)),
        }
    }
}

impl Participant {
    pub fn kind(&self) -> ParticipantKind {
        match self {
            Participant::User { .. } => ParticipantKind::User,
            Participant::Team { .. } => ParticipantKind::Team,
        }
    }

    /// Login of the user or short name of the team.
    /// Used to name provisioned repositories and build plans.
    pub fn identifier(&self) -> &str {
        match self {
            Participant::User { login, .. } => login,
            Participant::Team { short_name, .. } => short_name,
        }
    }

    /// Stable id in textual form, as stored in the `participant_id` column.
    pub fn raw_id(&self) -> String {
        match self {
            Participant::User { id, .. } => id.to_string(),
            Participant::Team { id, .. } => id.to_string(),
        }
    }

    /// Compares identity only; display names may change over time.
    pub fn is_same(&self, other: &Participant) -> bool {
        match (self, other) {
            (Participant::User { id: a, .. }, Participant::User { id: b, .. }) => a == b,
            (Participant::Team { id: a, .. }, Participant::Team { id: b, .. }) => a == b,
            _ => false,
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Participant::User { id, .. } => Some(*id),
            Participant::Team { .. } => None,
        }
    }

    pub fn team_id(&self) -> Option<TeamId> {
        match self {
            Participant::Team { id, .. } => Some(*id),
            Participant::User { .. } => None,
        }
    }

    /// Reassembles a participant from its stored columns.
    pub fn from_parts(kind: i16, raw_id: &str, name: String) -> anyhow::Result<Participant> {
        let participant = match ParticipantKind::try_from(kind)? {
            ParticipantKind::User => Participant::User {
                id: raw_id
                    .parse()
                    .with_context(|| format!("invalid user id {}", raw_id))?,
                login: name,
            },
            ParticipantKind::Team => Participant::Team {
                id: raw_id
                    .parse()
                    .with_context(|| format!("invalid team id {}", raw_id))?,
                short_name: name,
            },
        };
        Ok(participant)
    }
}
