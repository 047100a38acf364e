//! Names of provisioned artifacts and date rules.
use chrono::{DateTime, Utc};
use db::schema::Participation;
use provision_api::Exercise;

pub(crate) const PRACTICE_PREFIX: &str = "practice-";

/// Build plan all participant plans are copied from
pub(crate) const BASE_PLAN_NAME: &str = "BASE";

pub(crate) fn add_practice_prefix(practice_mode: bool, name: &str) -> String {
    if practice_mode {
        format!("{}{}", PRACTICE_PREFIX, name)
    } else {
        name.to_string()
    }
}

pub(crate) fn repository_name(part: &Participation) -> String {
    add_practice_prefix(part.practice_mode, part.participant.identifier())
}

pub(crate) fn build_plan_name(part: &Participation) -> String {
    add_practice_prefix(
        part.practice_mode,
        &part.participant.identifier().to_uppercase(),
    )
}

/// Participants of an exam must not see their repository before it starts.
pub(crate) fn allow_repository_access(exercise: &Exercise, now: DateTime<Utc>) -> bool {
    if !exercise.is_exam() {
        return true;
    }
    match exercise.start_date {
        Some(start) => now > start,
        None => true,
    }
}

pub(crate) fn effective_due_date(
    part: &Participation,
    exercise: &Exercise,
) -> Option<DateTime<Utc>> {
    part.individual_due_date.or(exercise.due_date)
}
