//! Common test utilities for building step trees, profiles and gateways.
use async_trait::async_trait;
use serde_json::{Value, json};
use std::result::Result;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use taskflow::prelude::*;

/// Builds a profile or answer map from `(key, value)` pairs.
#[allow(dead_code)]
pub fn map_of(pairs: &[(&str, Value)]) -> ahash::AHashMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[allow(dead_code)]
pub fn yes_no() -> Vec<StepOption> {
    vec![StepOption::new("Yes", "yes"), StepOption::new("No", "no")]
}

/// A radio question `A` whose "yes" answer reveals `B`.
///
/// Structure: `[A {onAnswer: {yes: [B]}}]`
#[allow(dead_code)]
pub fn create_branch_scenario() -> TaskDefinition {
    TaskDefinition::new(vec![
        StepNode::new("A", StepKind::Question)
            .with_input(InputType::Radio, yes_no())
            .with_branch("yes", vec![StepNode::new("B", StepKind::Content)]),
    ])
}

/// A tree exercising every walker feature.
///
/// ```text
/// intro                      content
/// q1                         question yes/no
///   yes -> [yes-followup]    question text
///   no  -> [no-followup]     content
///   children: [q1-note]      content
/// gated                      content, visible when profile.university_ip == true
///   children: [gated-child]  content, no conditions of its own
/// upload                     upload
/// outro                      content
/// ```
#[allow(dead_code)]
pub fn create_full_tree() -> TaskDefinition {
    TaskDefinition::new(vec![
        StepNode::new("intro", StepKind::Content).with_text("Welcome"),
        StepNode::new("q1", StepKind::Question)
            .with_input(InputType::Radio, yes_no())
            .with_branch(
                "yes",
                vec![StepNode::new("yes-followup", StepKind::Question).with_input(InputType::Text, vec![])],
            )
            .with_branch("no", vec![StepNode::new("no-followup", StepKind::Content)])
            .with_children(vec![StepNode::new("q1-note", StepKind::Content)]),
        StepNode::new("gated", StepKind::Content)
            .with_condition(Condition::profile("university_ip", Operator::Equals, json!(true)))
            .with_children(vec![StepNode::new("gated-child", StepKind::Content)]),
        StepNode::new("upload", StepKind::Upload),
        StepNode::new("outro", StepKind::Content),
    ])
}

#[allow(dead_code)]
pub fn ids(steps: &[&StepNode]) -> Vec<String> {
    steps.iter().map(|s| s.id.clone()).collect()
}

/// Wraps an [`InMemoryGateway`] and fails on demand.
#[allow(dead_code)]
#[derive(Default)]
pub struct FlakyGateway {
    pub inner: InMemoryGateway,
    /// Number of upcoming loads that fail with a transient error.
    pub failing_loads: AtomicUsize,
    /// Number of upcoming saves that fail.
    pub failing_saves: AtomicUsize,
    pub load_calls: AtomicUsize,
    pub saves: Mutex<Vec<ProgressUpdate>>,
}

#[allow(dead_code)]
impl FlakyGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_loads(&self, count: usize) {
        self.failing_loads.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_saves(&self, count: usize) {
        self.failing_saves.store(count, Ordering::SeqCst);
    }

    pub fn saved(&self) -> Vec<ProgressUpdate> {
        self.saves.lock().unwrap().clone()
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl PersistenceGateway for FlakyGateway {
    async fn load_progress(
        &self,
        task_id: &str,
        user_id: &str,
    ) -> Result<Option<ProgressRecord>, GatewayError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.failing_loads) {
            return Err(GatewayError::Unavailable("connection reset".to_string()));
        }
        self.inner.load_progress(task_id, user_id).await
    }

    async fn save_progress(
        &self,
        task_id: &str,
        user_id: &str,
        update: ProgressUpdate,
    ) -> Result<(), GatewayError> {
        if Self::take_failure(&self.failing_saves) {
            return Err(GatewayError::Unavailable("write timed out".to_string()));
        }
        self.saves.lock().unwrap().push(update.clone());
        self.inner.save_progress(task_id, user_id, update).await
    }
}

/// Retry settings that keep tests fast.
#[allow(dead_code)]
pub fn fast_config() -> SessionConfig {
    SessionConfig::default().with_retry(RetryPolicy {
        max_attempts: 3,
        base_backoff_ms: 1,
        max_backoff_ms: 2,
    })
}
