//! Tests for task sessions: hydration, optimistic saves and completion.
mod common;
use common::*;
use serde_json::json;
use std::result::Result;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use taskflow::prelude::*;

const TASK: &str = "task-ip";
const USER: &str = "user-42";

fn start(task: TaskDefinition, gateway: Arc<FlakyGateway>) -> Result<TaskSession, SessionError> {
    tokio_test::block_on(
        TaskSession::builder(task, gateway)
            .with_config(fast_config())
            .start(TASK, USER),
    )
}

#[test]
fn test_navigation_guard_scenario() {
    let gateway = Arc::new(FlakyGateway::new());
    let mut session = start(create_branch_scenario(), gateway.clone()).unwrap();

    assert_eq!(session.current_step().map(|s| s.id.as_str()), Some("A"));
    assert!(!session.can_advance());
    let transition = tokio_test::block_on(session.next()).unwrap();
    assert_eq!(transition, Transition::Blocked);
    assert_eq!(session.position(), Position::AtStep(0));

    tokio_test::block_on(session.answer("A", json!("yes"))).unwrap();
    assert!(session.can_advance());
    let transition = tokio_test::block_on(session.next()).unwrap();
    assert_eq!(transition, Transition::Moved(1));
    assert_eq!(session.current_step().map(|s| s.id.as_str()), Some("B"));
}

#[test]
fn test_answer_is_saved_as_whole_snapshot() {
    let gateway = Arc::new(FlakyGateway::new());
    let mut session = start(create_full_tree(), gateway.clone()).unwrap();

    tokio_test::block_on(session.answer("q1", json!("yes"))).unwrap();
    tokio_test::block_on(session.answer("yes-followup", json!("patents"))).unwrap();

    let saves = gateway.saved();
    assert_eq!(saves.len(), 2);
    assert_eq!(
        saves[1].task_answers,
        json!({"q1": "yes", "yes-followup": "patents"})
    );
    assert_eq!(saves[1].completed, None);

    let stored = gateway.inner.progress(TASK, USER).unwrap();
    assert_eq!(stored.task_answers, Some(json!({"q1": "yes", "yes-followup": "patents"})));
    assert!(!stored.completed);
}

#[test]
fn test_failed_save_rolls_back() {
    let gateway = Arc::new(FlakyGateway::new());
    let mut session = start(create_full_tree(), gateway.clone()).unwrap();
    tokio_test::block_on(session.answer("q1", json!("no"))).unwrap();

    gateway.fail_next_saves(1);
    let result = tokio_test::block_on(session.answer("q1", json!("yes")));
    match result {
        Err(SessionError::SaveFailed { step_id, .. }) => assert_eq!(step_id, "q1"),
        other => panic!("expected SaveFailed, got {:?}", other.map(|_| ())),
    }

    assert_eq!(session.answers().get("q1"), Some(&json!("no")));
    let visible = ids(&session.visible_steps());
    assert!(visible.contains(&"no-followup".to_string()));
    assert!(!visible.contains(&"yes-followup".to_string()));
    assert_eq!(gateway.saved().len(), 1);
}

#[test]
fn test_failed_first_answer_is_removed() {
    let gateway = Arc::new(FlakyGateway::new());
    let mut session = start(create_branch_scenario(), gateway.clone()).unwrap();

    gateway.fail_next_saves(1);
    assert!(tokio_test::block_on(session.answer("A", json!("yes"))).is_err());
    assert_eq!(session.answers().get("A"), None);
    assert_eq!(ids(&session.visible_steps()), ["A"]);
}

#[test]
fn test_unknown_step_is_rejected() {
    let gateway = Arc::new(FlakyGateway::new());
    let mut session = start(create_branch_scenario(), gateway.clone()).unwrap();

    let result = tokio_test::block_on(session.answer("nope", json!(1)));
    assert!(matches!(result, Err(SessionError::UnknownStep(id)) if id == "nope"));
    assert!(gateway.saved().is_empty());
}

#[test]
fn test_position_follows_step_after_branch_change() {
    let gateway = Arc::new(FlakyGateway::new());
    let mut session = start(create_full_tree(), gateway.clone()).unwrap();
    tokio_test::block_on(session.answer("q1", json!("yes"))).unwrap();

    // intro, q1, yes-followup, q1-note, upload, outro
    assert_eq!(session.go_to(4), Transition::Moved(4));
    assert_eq!(session.current_step().map(|s| s.id.as_str()), Some("upload"));

    // An answer with no branch removes yes-followup; upload moves up to index 3.
    tokio_test::block_on(session.answer("q1", json!("maybe"))).unwrap();
    assert_eq!(session.position(), Position::AtStep(3));
    assert_eq!(session.current_step().map(|s| s.id.as_str()), Some("upload"));
}

#[test]
fn test_index_tracking_keeps_the_number() {
    let gateway = Arc::new(FlakyGateway::new());
    let mut session = tokio_test::block_on(
        TaskSession::builder(create_full_tree(), gateway)
            .with_config(fast_config().with_tracking(PositionTracking::ByIndex))
            .start(TASK, USER),
    )
    .unwrap();
    tokio_test::block_on(session.answer("q1", json!("yes"))).unwrap();
    session.go_to(4);

    tokio_test::block_on(session.answer("q1", json!("maybe"))).unwrap();
    assert_eq!(session.position(), Position::AtStep(4));
    assert_eq!(session.current_step().map(|s| s.id.as_str()), Some("outro"));
}

#[test]
fn test_completion_persists_flag_and_file_id() {
    let gateway = Arc::new(FlakyGateway::new());
    let mut session = start(create_full_tree(), gateway.clone()).unwrap();

    // intro, q1, q1-note, upload, outro
    let steps = session.visible_steps().len();
    assert_eq!(steps, 5);
    assert_eq!(session.go_to(3), Transition::Moved(3));
    assert_eq!(tokio_test::block_on(session.next()).unwrap(), Transition::Blocked);

    tokio_test::block_on(session.answer(
        "upload",
        json!({"fileId": "file-7", "fileName": "assignment.pdf"}),
    ))
    .unwrap();
    assert_eq!(tokio_test::block_on(session.next()).unwrap(), Transition::Moved(4));
    assert_eq!(
        tokio_test::block_on(session.next()).unwrap(),
        Transition::CompletionRequested
    );
    assert!(session.is_completed());
    assert_eq!(session.position(), Position::Completed);
    assert_eq!(session.current_step(), None);

    let last = gateway.saved().pop().unwrap();
    assert_eq!(last.completed, Some(true));
    assert_eq!(last.file_id.as_deref(), Some("file-7"));

    let stored = gateway.inner.progress(TASK, USER).unwrap();
    assert!(stored.completed);
    assert_eq!(stored.file_id.as_deref(), Some("file-7"));
}

#[test]
fn test_failed_completion_stays_on_last_step() {
    let gateway = Arc::new(FlakyGateway::new());
    let task = TaskDefinition::new(vec![StepNode::new("only", StepKind::Content)]);
    let mut session = start(task, gateway.clone()).unwrap();

    gateway.fail_next_saves(1);
    let result = tokio_test::block_on(session.next());
    assert!(matches!(result, Err(SessionError::CompletionFailed { .. })));
    assert!(!session.is_completed());
    assert_eq!(session.position(), Position::AtStep(0));

    let transition = tokio_test::block_on(session.next()).unwrap();
    assert_eq!(transition, Transition::CompletionRequested);
    assert!(session.is_completed());
}

#[test]
fn test_task_with_nothing_visible_completes_on_next() {
    let gateway = Arc::new(FlakyGateway::new());
    let task = TaskDefinition::from_json(r#"[{"id": "hidden", "type": "calendar-widget"}]"#).unwrap();
    let mut session = start(task, gateway.clone()).unwrap();

    assert!(session.visible_steps().is_empty());
    assert_eq!(session.current_step(), None);
    assert_eq!(
        tokio_test::block_on(session.next()).unwrap(),
        Transition::CompletionRequested
    );
    assert!(session.is_completed());
    assert_eq!(gateway.saved().pop().unwrap().completed, Some(true));
}

#[test]
fn test_hydration_from_stored_progress() {
    let gateway = Arc::new(FlakyGateway::new());
    gateway
        .inner
        .insert_progress(
            TASK,
            USER,
            ProgressRecord {
                answers: Some(json!({"A": "no"})),
                task_answers: Some(json!({"A": "yes"})),
                completed: true,
                file_id: None,
            },
        )
        .unwrap();

    let session = start(create_branch_scenario(), gateway.clone()).unwrap();
    assert!(session.previously_completed());
    assert!(!session.is_completed());
    assert_eq!(session.answers().get("A"), Some(&json!("yes")));
    assert_eq!(ids(&session.visible_steps()), ["A", "B"]);
}

#[test]
fn test_transient_load_failures_are_retried() {
    let gateway = Arc::new(FlakyGateway::new());
    gateway.fail_next_loads(2);

    let session = start(create_branch_scenario(), gateway.clone());
    assert!(session.is_ok());
    assert_eq!(gateway.load_calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_load_gives_up_after_attempt_cap() {
    let gateway = Arc::new(FlakyGateway::new());
    gateway.fail_next_loads(5);

    let result = start(create_branch_scenario(), gateway.clone());
    assert!(matches!(
        result,
        Err(SessionError::Gateway(GatewayError::Unavailable(_)))
    ));
    assert_eq!(gateway.load_calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_profile_source_drives_visibility() {
    let gateway = Arc::new(FlakyGateway::new());
    let profiles = Arc::new(InMemoryGateway::new());
    profiles
        .insert_profile(USER, map_of(&[("university_ip", json!(true))]))
        .unwrap();

    let session = tokio_test::block_on(
        TaskSession::builder(create_full_tree(), gateway)
            .with_profiles(profiles)
            .with_config(fast_config())
            .start(TASK, USER),
    )
    .unwrap();

    let visible = ids(&session.visible_steps());
    assert!(visible.contains(&"gated".to_string()));
    assert!(visible.contains(&"gated-child".to_string()));
    assert_eq!(session.profile().get("university_ip"), Some(&json!(true)));
}
