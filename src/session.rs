use crate::answers::AnswerStore;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::gateway::{PersistenceGateway, Profile, ProfileSource, ProgressUpdate, StoredAnswers};
use crate::progression::{Position, Progression, Transition};
use crate::retry::retry_read;
use crate::task::{StepKind, StepNode, TaskDefinition};
use crate::walker::build_visible_steps;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Configures and starts a [`TaskSession`].
pub struct TaskSessionBuilder {
    task: TaskDefinition,
    gateway: Arc<dyn PersistenceGateway>,
    profiles: Option<Arc<dyn ProfileSource>>,
    config: SessionConfig,
}

impl TaskSessionBuilder {
    pub fn new(task: TaskDefinition, gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self {
            task,
            gateway,
            profiles: None,
            config: SessionConfig::default(),
        }
    }

    /// Without a profile source every `profileKey` condition sees an empty profile.
    pub fn with_profiles(mut self, profiles: Arc<dyn ProfileSource>) -> Self {
        self.profiles = Some(profiles);
        self
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Loads the profile and stored progress, hydrates the answers and places the
    /// user on the first visible step.
    pub async fn start(
        self,
        task_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Result<TaskSession, SessionError> {
        let task_id = task_id.into();
        let user_id = user_id.into();
        let policy = &self.config.retry;

        let profile = match &self.profiles {
            Some(source) => retry_read(policy, "get_profile", || source.get_profile(&user_id)).await?,
            None => Profile::new(),
        };
        let record = retry_read(policy, "load_progress", || {
            self.gateway.load_progress(&task_id, &user_id)
        })
        .await?
        .unwrap_or_default();

        let stored = record.stored_answers();
        let shape = match &stored {
            StoredAnswers::Detailed(_) => "detailed",
            StoredAnswers::Legacy(_) => "legacy",
            StoredAnswers::Empty => "empty",
        };
        let answers = AnswerStore::hydrate(stored);
        info!(
            task_id = %task_id,
            user_id = %user_id,
            answers = answers.len(),
            shape,
            completed = record.completed,
            "task session started"
        );

        let mut session = TaskSession {
            task_id,
            user_id,
            task: self.task,
            profile,
            answers,
            progression: Progression::new(self.config.tracking),
            gateway: self.gateway,
            previously_completed: record.completed,
        };
        session.refresh();
        Ok(session)
    }
}

/// One user working through one task.
///
/// The visible steps are recomputed from (tree, profile, answers) whenever they
/// are needed; the answer store is a cache of the remote record.
pub struct TaskSession {
    task_id: String,
    user_id: String,
    task: TaskDefinition,
    profile: Profile,
    answers: AnswerStore,
    progression: Progression,
    gateway: Arc<dyn PersistenceGateway>,
    previously_completed: bool,
}

impl TaskSession {
    pub fn builder(task: TaskDefinition, gateway: Arc<dyn PersistenceGateway>) -> TaskSessionBuilder {
        TaskSessionBuilder::new(task, gateway)
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn task(&self) -> &TaskDefinition {
        &self.task
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn answers(&self) -> &AnswerStore {
        &self.answers
    }

    pub fn visible_steps(&self) -> Vec<&StepNode> {
        build_visible_steps(self.task.steps(), &self.profile, self.answers.as_map())
    }

    pub fn position(&self) -> Position {
        self.progression.position()
    }

    pub fn current_step(&self) -> Option<&StepNode> {
        let visible = self.visible_steps();
        self.progression.current(&visible)
    }

    /// Whether the stored record was already flagged completed when the session started.
    pub fn previously_completed(&self) -> bool {
        self.previously_completed
    }

    pub fn is_completed(&self) -> bool {
        self.progression.is_completed()
    }

    /// Whether `next` would currently move on.
    pub fn can_advance(&self) -> bool {
        self.current_step()
            .is_some_and(|step| Progression::can_advance(step, &self.answers))
    }

    /// Records an answer, optimistically.
    ///
    /// The store is updated and the visible steps recomputed before the snapshot is
    /// saved. If the save fails the answer is rolled back and
    /// [`SessionError::SaveFailed`] is returned. Saves are not retried.
    pub async fn answer(&mut self, step_id: &str, value: Value) -> Result<(), SessionError> {
        if self.task.find_step(step_id).is_none() {
            return Err(SessionError::UnknownStep(step_id.to_string()));
        }

        let transaction = self.answers.begin(step_id, value);
        self.refresh();

        let update = ProgressUpdate {
            task_answers: self.answers.snapshot(),
            completed: None,
            file_id: None,
        };
        match self
            .gateway
            .save_progress(&self.task_id, &self.user_id, update)
            .await
        {
            Ok(()) => {
                debug!(step_id, "answer saved");
                transaction.commit();
                Ok(())
            }
            Err(source) => {
                let reverted = transaction.rollback(&mut self.answers);
                self.refresh();
                warn!(step_id, reverted, error = %source, "answer save failed");
                Err(SessionError::SaveFailed {
                    step_id: step_id.to_string(),
                    source,
                })
            }
        }
    }

    /// Moves to the next visible step, or submits the task from the last one.
    ///
    /// Submission persists every answer with the completed flag first; the session
    /// only becomes completed once that write succeeds.
    pub async fn next(&mut self) -> Result<Transition, SessionError> {
        let visible = build_visible_steps(self.task.steps(), &self.profile, self.answers.as_map());
        let transition = self.progression.next(&visible, &self.answers);
        if transition != Transition::CompletionRequested {
            return Ok(transition);
        }

        let update = ProgressUpdate {
            task_answers: self.answers.snapshot(),
            completed: Some(true),
            file_id: self.last_uploaded_file_id(),
        };
        self.gateway
            .save_progress(&self.task_id, &self.user_id, update)
            .await
            .map_err(|source| {
                warn!(task_id = %self.task_id, error = %source, "completion save failed");
                SessionError::CompletionFailed { source }
            })?;

        self.progression.complete();
        info!(task_id = %self.task_id, user_id = %self.user_id, "task completed");
        Ok(transition)
    }

    pub fn previous(&mut self) -> Transition {
        let visible = build_visible_steps(self.task.steps(), &self.profile, self.answers.as_map());
        self.progression.previous(&visible)
    }

    pub fn go_to(&mut self, index: usize) -> Transition {
        let visible = build_visible_steps(self.task.steps(), &self.profile, self.answers.as_map());
        self.progression.go_to(index, &visible)
    }

    fn refresh(&mut self) {
        let visible = build_visible_steps(self.task.steps(), &self.profile, self.answers.as_map());
        debug!(visible = visible.len(), "visible steps recomputed");
        self.progression.reconcile(&visible);
    }

    fn last_uploaded_file_id(&self) -> Option<String> {
        self.visible_steps()
            .iter()
            .rev()
            .filter(|step| step.kind == StepKind::Upload)
            .find_map(|step| {
                self.answers
                    .get(&step.id)?
                    .get("fileId")?
                    .as_str()
                    .map(str::to_string)
            })
    }
}
