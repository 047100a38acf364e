use super::RepositoryUri;
use chrono::{DateTime, Utc};
use db::schema::ExerciseId;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ExerciseKind {
    /// Regular course exercise
    Course,
    Exam,
    /// Exam that can be attempted several times
    TestExam,
}

/// Programming exercise, as seen by the lifecycle engine.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct Exercise {
    pub id: ExerciseId,
    pub title: String,
    pub course_short_name: String,
    /// Key of the project that holds repositories and build plans
    pub project_key: String,
    pub template_repository: RepositoryUri,
    pub kind: ExerciseKind,
    /// Release date for course exercises, start date for exams
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

impl Exercise {
    pub fn is_course(&self) -> bool {
        self.kind == ExerciseKind::Course
    }

    pub fn is_exam(&self) -> bool {
        matches!(self.kind, ExerciseKind::Exam | ExerciseKind::TestExam)
    }

    pub fn is_test_exam(&self) -> bool {
        self.kind == ExerciseKind::TestExam
    }

    /// Name of the build project participant plans are copied into.
    pub fn build_project_name(&self) -> String {
        format!("{} {}", self.course_short_name.to_uppercase(), self.title)
    }
}
