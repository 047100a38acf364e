mod common;

use chrono::{Duration, Utc};
use common::{env, exercise, team, user};
use db::schema::{InitializationState, SubmissionKind};
use lifecycle::{test_util::Op, LifecycleError};
use provision_api::ExerciseKind;

#[tokio::test]
async fn test_start_provisions_everything() {
    let env = env();
    let ex = exercise(ExerciseKind::Course);
    let alice = user("alice");

    let part = env.engine.start_exercise(&ex, &alice).await.unwrap();
    assert_eq!(part.state, InitializationState::Initialized);
    assert_eq!(
        part.repository_uri.as_deref(),
        Some("https://alice@vcs.test/E/alice")
    );
    assert_eq!(part.build_plan_id.as_deref(), Some("E-ALICE"));
    assert_eq!(part.branch.as_deref(), Some("main"));
    assert!(part.initialization_date.is_some());
    assert!(!part.practice_mode);
    assert_eq!(part.attempt, 0);

    let stored = env.db.part_load(part.id).await.unwrap();
    assert_eq!(stored, part);
    assert!(env.db.token_find(part.id).await.unwrap().is_some());
    assert_eq!(env.hosts.copy_sources(), vec!["tmpl/E".to_string()]);
    assert_eq!(env.hosts.repositories(), vec!["E/alice".to_string()]);
    assert_eq!(env.hosts.build_plans(), vec!["E-ALICE".to_string()]);
}

#[tokio::test]
async fn test_start_is_idempotent() {
    let env = env();
    let ex = exercise(ExerciseKind::Course);
    let alice = user("alice");

    let first = env.engine.start_exercise(&ex, &alice).await.unwrap();
    let second = env.engine.start_exercise(&ex, &alice).await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(first.repository_uri, second.repository_uri);
    assert_eq!(first.build_plan_id, second.build_plan_id);
    assert_eq!(second.state, InitializationState::Initialized);
    assert_eq!(first.initialization_date, second.initialization_date);

    assert_eq!(env.hosts.count(Op::CopyRepository), 1);
    assert_eq!(env.hosts.count(Op::ConfigureRepository), 1);
    assert_eq!(env.hosts.count(Op::CopyBuildPlan), 1);
    assert_eq!(env.hosts.count(Op::ConfigureBuildPlan), 1);
    assert_eq!(
        env.db
            .part_select_by_participant(ex.id, &alice)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_resumes_after_build_plan_copy_failure() {
    let env = env();
    let ex = exercise(ExerciseKind::Course);
    let alice = user("alice");

    env.hosts.fail_once(Op::CopyBuildPlan);
    let err = env.engine.start_exercise(&ex, &alice).await.unwrap_err();
    assert!(matches!(err, LifecycleError::BuildHost(_)), "{:?}", err);
    assert!(err.is_retryable());
    assert!(!err.is_recoverable());

    let stored = env
        .db
        .part_lookup(ex.id, &alice, false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.state, InitializationState::RepoConfigured);
    assert!(stored.repository_uri.is_some());
    assert!(stored.build_plan_id.is_none());

    let part = env.engine.start_exercise(&ex, &alice).await.unwrap();
    assert_eq!(part.id, stored.id);
    assert_eq!(part.state, InitializationState::Initialized);
    assert_eq!(env.hosts.count(Op::CopyRepository), 1);
    assert_eq!(env.hosts.count(Op::ConfigureRepository), 1);
    assert_eq!(env.hosts.count(Op::CopyBuildPlan), 2);
}

#[tokio::test]
async fn test_configuration_fault_rolls_back() {
    let env = env();
    let ex = exercise(ExerciseKind::Course);
    let alice = user("alice");

    env.hosts.fail_once(Op::ConfigureBuildPlan);
    let err = env.engine.start_exercise(&ex, &alice).await.unwrap_err();
    assert!(err.is_recoverable(), "{:?}", err);

    let stored = env
        .db
        .part_lookup(ex.id, &alice, false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.state, InitializationState::RepoConfigured);
    assert_eq!(stored.build_plan_id.as_deref(), Some("E-ALICE"));

    let part = env.engine.start_exercise(&ex, &alice).await.unwrap();
    assert_eq!(part.state, InitializationState::Initialized);
    // plan is copied again with recovery, repository is kept
    assert_eq!(env.hosts.count(Op::CopyRepository), 1);
    assert_eq!(env.hosts.count(Op::CopyBuildPlan), 2);
    assert_eq!(env.hosts.build_plans(), vec!["E-ALICE".to_string()]);
}

#[tokio::test]
async fn test_repository_fault_keeps_checkpoint() {
    let env = env();
    let ex = exercise(ExerciseKind::Course);
    let alice = user("alice");

    env.hosts.fail_once(Op::CopyRepository);
    let err = env.engine.start_exercise(&ex, &alice).await.unwrap_err();
    assert!(matches!(err, LifecycleError::RepositoryHost(_)));

    let stored = env
        .db
        .part_lookup(ex.id, &alice, false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.state, InitializationState::Uninitialized);
    assert!(stored.repository_uri.is_none());

    let part = env.engine.start_exercise(&ex, &alice).await.unwrap();
    assert_eq!(part.id, stored.id);
    assert_eq!(part.state, InitializationState::Initialized);
}

#[tokio::test(start_paused = true)]
async fn test_hanging_host_times_out() {
    let env = env();
    let ex = exercise(ExerciseKind::Course);
    let alice = user("alice");

    env.hosts.hang(Op::ConfigureRepository);
    let err = env.engine.start_exercise(&ex, &alice).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Timeout { .. }), "{:?}", err);
    assert!(err.is_retryable());

    let stored = env
        .db
        .part_lookup(ex.id, &alice, false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.state, InitializationState::RepoCopied);

    env.hosts.clear_faults();
    let part = env.engine.start_exercise(&ex, &alice).await.unwrap();
    assert_eq!(part.state, InitializationState::Initialized);
    assert_eq!(env.hosts.count(Op::CopyRepository), 1);
}

#[tokio::test]
async fn test_default_branch_from_host() {
    let env = env();
    env.hosts.set_default_branch("develop");
    let part = env
        .engine
        .start_exercise(&exercise(ExerciseKind::Course), &user("alice"))
        .await
        .unwrap();
    assert_eq!(part.branch.as_deref(), Some("develop"));
}

#[tokio::test]
async fn test_team_participation() {
    let env = env();
    let ex = exercise(ExerciseKind::Course);
    let blue = team(7, "blue");

    let part = env.engine.start_exercise(&ex, &blue).await.unwrap();
    assert_eq!(part.repository_uri.as_deref(), Some("https://vcs.test/E/blue"));
    assert_eq!(part.build_plan_id.as_deref(), Some("E-BLUE"));
    assert!(env.db.token_find(part.id).await.unwrap().is_none());
    assert_eq!(
        env.db.part_select_by_team(7).await.unwrap(),
        vec![part.clone()]
    );
}

#[tokio::test]
async fn test_practice_from_graded_repository() {
    let env = env();
    let ex = exercise(ExerciseKind::Course);
    let alice = user("alice");

    let graded = env.engine.start_exercise(&ex, &alice).await.unwrap();
    let practice = env
        .engine
        .start_practice_mode(&ex, &alice, true)
        .await
        .unwrap();

    assert_ne!(graded.id, practice.id);
    assert!(practice.practice_mode);
    assert_eq!(practice.attempt, 1);
    assert_eq!(practice.state, InitializationState::Initialized);
    assert_eq!(
        practice.repository_uri.as_deref(),
        Some("https://alice@vcs.test/E/practice-alice")
    );
    assert_eq!(practice.build_plan_id.as_deref(), Some("E-practice-ALICE"));
    assert_eq!(
        env.hosts.copy_sources(),
        vec!["tmpl/E".to_string(), "E/alice".to_string()]
    );
    let graded = env.db.part_load(graded.id).await.unwrap();
    assert_eq!(graded.state, InitializationState::Finished);
    assert!(env.db.token_find(practice.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_practice_from_template() {
    let env = env();
    let ex = exercise(ExerciseKind::Course);
    let alice = user("alice");

    env.engine.start_exercise(&ex, &alice).await.unwrap();
    env.engine
        .start_practice_mode(&ex, &alice, false)
        .await
        .unwrap();
    assert_eq!(
        env.hosts.copy_sources(),
        vec!["tmpl/E".to_string(), "tmpl/E".to_string()]
    );

    // without graded participation the template is used as well
    let bob = user("bob");
    env.engine.start_practice_mode(&ex, &bob, true).await.unwrap();
    assert_eq!(env.hosts.copy_sources().last().unwrap(), "tmpl/E");
}

#[tokio::test]
async fn test_practice_requires_course_exercise() {
    let env = env();
    let err = env
        .engine
        .start_practice_mode(&exercise(ExerciseKind::Exam), &user("alice"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Precondition(_)));
    assert!(env.hosts.calls().is_empty());
}

#[tokio::test]
async fn test_graded_start_parks_practice() {
    let env = env();
    let ex = exercise(ExerciseKind::Course);
    let alice = user("alice");

    env.engine.start_exercise(&ex, &alice).await.unwrap();
    let practice = env
        .engine
        .start_practice_mode(&ex, &alice, true)
        .await
        .unwrap();
    let graded = env.engine.start_exercise(&ex, &alice).await.unwrap();
    assert_eq!(graded.state, InitializationState::Initialized);
    let practice = env.db.part_load(practice.id).await.unwrap();
    assert_eq!(practice.state, InitializationState::Inactive);
}

#[tokio::test]
async fn test_at_most_one_graded_and_one_practice() {
    let env = env();
    let ex = exercise(ExerciseKind::Course);
    let alice = user("alice");

    env.engine.start_exercise(&ex, &alice).await.unwrap();
    env.engine.start_practice_mode(&ex, &alice, true).await.unwrap();
    env.engine.start_exercise(&ex, &alice).await.unwrap();
    env.engine.start_practice_mode(&ex, &alice, false).await.unwrap();
    env.engine.start_practice_mode(&ex, &alice, true).await.unwrap();
    env.engine.start_exercise(&ex, &alice).await.unwrap();

    let parts = env
        .engine
        .find_by_exercise_and_participant(&ex, &alice)
        .await
        .unwrap();
    assert_eq!(parts.iter().filter(|p| p.is_graded()).count(), 1);
    assert_eq!(parts.iter().filter(|p| p.practice_mode).count(), 1);
}

#[tokio::test]
async fn test_concurrent_starts_share_participation() {
    let env = env();
    let ex = exercise(ExerciseKind::Course);
    let alice = user("alice");

    let (a, b) = tokio::join!(
        env.engine.start_exercise(&ex, &alice),
        env.engine.start_exercise(&ex, &alice)
    );
    assert_eq!(a.unwrap().id, b.unwrap().id);
    assert_eq!(
        env.db
            .part_select_by_participant(ex.id, &alice)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_test_exam_attempts() {
    let env = env();
    let ex = exercise(ExerciseKind::TestExam);
    let alice = user("alice");

    let first = env.engine.start_exercise(&ex, &alice).await.unwrap();
    let second = env.engine.start_exercise(&ex, &alice).await.unwrap();
    let third = env.engine.start_exercise(&ex, &alice).await.unwrap();
    assert_eq!(
        [first.attempt, second.attempt, third.attempt],
        [0, 1, 2]
    );

    let parts = env
        .engine
        .find_by_exercise_and_participant(&ex, &alice)
        .await
        .unwrap();
    assert_eq!(parts.len(), 3);
    for part in &parts {
        let expected = if part.id == third.id {
            InitializationState::Initialized
        } else {
            InitializationState::Finished
        };
        assert_eq!(part.state, expected);
    }
    let latest = env
        .db
        .part_lookup(ex.id, &alice, false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.id, third.id);
}

#[tokio::test]
async fn test_test_exam_attempt_after_deleted_attempt() {
    let env = env();
    let ex = exercise(ExerciseKind::TestExam);
    let alice = user("alice");

    let _first = env.engine.start_exercise(&ex, &alice).await.unwrap();
    let second = env.engine.start_exercise(&ex, &alice).await.unwrap();
    let third = env.engine.start_exercise(&ex, &alice).await.unwrap();
    env.cleaner.delete_participation(second.id).await.unwrap();

    let fourth = env.engine.start_exercise(&ex, &alice).await.unwrap();
    assert_eq!(fourth.attempt, third.attempt + 1);
    assert_eq!(fourth.state, InitializationState::Initialized);

    let mut attempts: Vec<_> = env
        .engine
        .find_by_exercise_and_participant(&ex, &alice)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.attempt)
        .collect();
    attempts.sort_unstable();
    assert_eq!(attempts, [0, 2, 3]);
}

#[tokio::test]
async fn test_cleanup_build_plan_and_resume() {
    let env = env();
    let ex = exercise(ExerciseKind::Course);
    let alice = user("alice");

    let part = env.engine.start_exercise(&ex, &alice).await.unwrap();
    let part = env.engine.cleanup_build_plan(part).await.unwrap();
    assert_eq!(part.state, InitializationState::Inactive);
    assert!(part.build_plan_id.is_none());
    assert!(env.hosts.build_plans().is_empty());
    assert_eq!(env.hosts.repositories(), vec!["E/alice".to_string()]);

    let part = env.engine.resume_exercise(&ex, part).await.unwrap();
    assert_eq!(part.state, InitializationState::Initialized);
    assert_eq!(part.build_plan_id.as_deref(), Some("E-ALICE"));
    assert_eq!(env.hosts.count(Op::CopyRepository), 1);
    assert_eq!(env.hosts.count(Op::CopyBuildPlan), 2);
    assert_eq!(env.db.part_load(part.id).await.unwrap(), part);
}

#[tokio::test]
async fn test_resume_after_due_date_finishes() {
    let env = env();
    let mut ex = exercise(ExerciseKind::Course);
    let alice = user("alice");

    let part = env.engine.start_exercise(&ex, &alice).await.unwrap();
    let part = env.engine.cleanup_build_plan(part).await.unwrap();
    ex.due_date = Some(Utc::now() - Duration::hours(1));
    let part = env.engine.resume_exercise(&ex, part).await.unwrap();
    assert_eq!(part.state, InitializationState::Finished);
    assert!(part.build_plan_id.is_some());

    // individual extension wins over exercise due date
    let mut part = env.engine.cleanup_build_plan(part).await.unwrap();
    part.individual_due_date = Some(Utc::now() + Duration::days(1));
    let part = env.engine.resume_exercise(&ex, part).await.unwrap();
    assert_eq!(part.state, InitializationState::Initialized);
}

#[tokio::test]
async fn test_resume_requires_repository() {
    let env = env();
    let ex = exercise(ExerciseKind::Course);
    let part = env
        .engine
        .start_exercise(&ex, &user("alice"))
        .await
        .unwrap();
    let part = env.engine.cleanup_repository(part).await.unwrap();
    let err = env.engine.resume_exercise(&ex, part).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Precondition(_)));
}

#[tokio::test]
async fn test_cleanup_repository() {
    let env = env();
    let ex = exercise(ExerciseKind::Course);
    let alice = user("alice");

    let part = env.engine.start_exercise(&ex, &alice).await.unwrap();
    let part = env.engine.cleanup_repository(part).await.unwrap();
    assert_eq!(part.state, InitializationState::Finished);
    assert!(part.repository_uri.is_none());
    assert!(env.hosts.repositories().is_empty());
    assert_eq!(
        env.hosts.keys(Op::DeleteLocalRepository),
        vec!["E/alice".to_string()]
    );

    // starting again provisions a fresh repository
    let part = env.engine.start_exercise(&ex, &alice).await.unwrap();
    assert_eq!(part.state, InitializationState::Initialized);
    assert!(part.repository_uri.is_some());
    assert_eq!(env.hosts.count(Op::CopyRepository), 2);
}

#[tokio::test]
async fn test_immediate_submission() {
    let env = env();
    let ex = exercise(ExerciseKind::Course);
    let alice = user("alice");

    let (part, sub) = env
        .engine
        .create_with_immediate_submission(&ex, &alice, SubmissionKind::External)
        .await
        .unwrap();
    assert_eq!(part.state, InitializationState::Finished);
    assert!(part.repository_uri.is_some());
    assert!(part.build_plan_id.is_none());
    assert!(part.initialization_date.is_some());
    assert_eq!(env.hosts.count(Op::CopyBuildPlan), 0);
    assert_eq!(sub.kind, SubmissionKind::External);
    assert!(sub.submitted);
    assert!(sub.submission_date.is_some());

    let stored = env.db.sub_select(part.id).await.unwrap();
    assert_eq!(stored, vec![sub.clone()]);

    let (again, sub_again) = env
        .engine
        .create_with_immediate_submission(&ex, &alice, SubmissionKind::Instructor)
        .await
        .unwrap();
    assert_eq!(again.id, part.id);
    assert_eq!(sub_again, sub);
    assert_eq!(env.hosts.count(Op::CopyRepository), 1);
}

#[tokio::test]
async fn test_immediate_submission_submits_pending() {
    let env = env();
    let ex = exercise(ExerciseKind::Course);
    let alice = user("alice");

    let part = env.engine.start_exercise(&ex, &alice).await.unwrap();
    let pending = env
        .db
        .sub_new(db::schema::NewSubmission {
            participation_id: part.id,
            kind: SubmissionKind::Manual,
            submitted: false,
            submission_date: None,
        })
        .await
        .unwrap();

    let (part, sub) = env
        .engine
        .create_with_immediate_submission(&ex, &alice, SubmissionKind::External)
        .await
        .unwrap();
    assert_eq!(part.state, InitializationState::Finished);
    assert_eq!(sub.id, pending.id);
    assert_eq!(sub.kind, SubmissionKind::Manual);
    assert!(sub.submitted);
    assert_eq!(env.db.sub_select(part.id).await.unwrap(), vec![sub]);
}

#[tokio::test]
async fn test_update_individual_due_dates() {
    let env = env();
    let mut ex = exercise(ExerciseKind::Course);
    let due = Utc::now();
    ex.due_date = Some(due);

    let alice = env.engine.start_exercise(&ex, &user("alice")).await.unwrap();
    let bob = env.engine.start_exercise(&ex, &user("bob")).await.unwrap();

    let extended = due + Duration::days(3);
    let changed = env
        .engine
        .update_individual_due_dates(
            &ex,
            &[
                (alice.id, Some(extended)),
                (bob.id, Some(due - Duration::days(1))),
                (1000, Some(extended)),
            ],
        )
        .await
        .unwrap();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].id, alice.id);
    assert_eq!(changed[0].individual_due_date, Some(extended));
    assert_eq!(
        env.db.part_load(alice.id).await.unwrap().individual_due_date,
        Some(extended)
    );
    assert_eq!(
        env.db.part_load(bob.id).await.unwrap().individual_due_date,
        None
    );

    // unchanged request reports nothing
    let changed = env
        .engine
        .update_individual_due_dates(&ex, &[(alice.id, Some(extended))])
        .await
        .unwrap();
    assert!(changed.is_empty());

    // without exercise due date overrides are dropped
    ex.due_date = None;
    let changed = env
        .engine
        .update_individual_due_dates(&ex, &[(alice.id, Some(extended))])
        .await
        .unwrap();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].individual_due_date, None);
}

#[tokio::test]
async fn test_find_by_id() {
    let env = env();
    let part = env
        .engine
        .start_exercise(&exercise(ExerciseKind::Course), &user("alice"))
        .await
        .unwrap();
    assert_eq!(env.engine.find_by_id(part.id).await.unwrap(), part);
    let err = env.engine.find_by_id(part.id + 100).await.unwrap_err();
    assert!(matches!(err, LifecycleError::ParticipationNotFound(_)));
    assert!(!err.is_retryable());
}
