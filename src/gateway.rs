use crate::answers::Answers;
use crate::error::GatewayError;
use ahash::AHashMap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;

/// Profile values addressable by `profileKey` conditions.
pub type Profile = AHashMap<String, Value>;

/// A user's stored progress on one task, as the remote store returns it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// Legacy answer field written by older task pages.
    #[serde(default)]
    pub answers: Option<Value>,
    #[serde(default)]
    pub task_answers: Option<Value>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub file_id: Option<String>,
}

/// The answers found in a [`ProgressRecord`], tagged with the storage shape they came from.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredAnswers {
    Detailed(Answers),
    Legacy(Answers),
    Empty,
}

impl ProgressRecord {
    /// Reads the answer set, preferring `task_answers` when it is a non-empty
    /// object and falling back to the legacy `answers` field.
    pub fn stored_answers(&self) -> StoredAnswers {
        if let Some(map) = non_empty_object(self.task_answers.as_ref()) {
            return StoredAnswers::Detailed(map);
        }
        if let Some(map) = non_empty_object(self.answers.as_ref()) {
            return StoredAnswers::Legacy(map);
        }
        StoredAnswers::Empty
    }
}

fn non_empty_object(value: Option<&Value>) -> Option<Answers> {
    let object = value?.as_object()?;
    if object.is_empty() {
        return None;
    }
    Some(object.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

/// A write of the whole answer snapshot, optionally flagging the task as done.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub task_answers: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
}

/// The remote record store holding task progress, keyed by (task, user).
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn load_progress(
        &self,
        task_id: &str,
        user_id: &str,
    ) -> Result<Option<ProgressRecord>, GatewayError>;

    async fn save_progress(
        &self,
        task_id: &str,
        user_id: &str,
        update: ProgressUpdate,
    ) -> Result<(), GatewayError>;
}

/// Read-only access to user profiles.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> Result<Profile, GatewayError>;
}

/// A process-local store implementing both gateway traits.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    progress: Mutex<AHashMap<(String, String), ProgressRecord>>,
    profiles: Mutex<AHashMap<String, Profile>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_profile(&self, user_id: &str, profile: Profile) -> Result<(), GatewayError> {
        self.profiles
            .lock()
            .map_err(|_| poisoned())?
            .insert(user_id.to_string(), profile);
        Ok(())
    }

    pub fn insert_progress(
        &self,
        task_id: &str,
        user_id: &str,
        record: ProgressRecord,
    ) -> Result<(), GatewayError> {
        self.progress
            .lock()
            .map_err(|_| poisoned())?
            .insert((task_id.to_string(), user_id.to_string()), record);
        Ok(())
    }

    /// The record as currently stored, if any.
    pub fn progress(&self, task_id: &str, user_id: &str) -> Option<ProgressRecord> {
        self.progress
            .lock()
            .ok()?
            .get(&(task_id.to_string(), user_id.to_string()))
            .cloned()
    }
}

fn poisoned() -> GatewayError {
    GatewayError::Unavailable("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl PersistenceGateway for InMemoryGateway {
    async fn load_progress(
        &self,
        task_id: &str,
        user_id: &str,
    ) -> Result<Option<ProgressRecord>, GatewayError> {
        let progress = self.progress.lock().map_err(|_| poisoned())?;
        Ok(progress
            .get(&(task_id.to_string(), user_id.to_string()))
            .cloned())
    }

    async fn save_progress(
        &self,
        task_id: &str,
        user_id: &str,
        update: ProgressUpdate,
    ) -> Result<(), GatewayError> {
        let mut progress = self.progress.lock().map_err(|_| poisoned())?;
        let record = progress
            .entry((task_id.to_string(), user_id.to_string()))
            .or_default();
        record.task_answers = Some(update.task_answers);
        if let Some(completed) = update.completed {
            record.completed = completed;
        }
        if update.file_id.is_some() {
            record.file_id = update.file_id;
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileSource for InMemoryGateway {
    async fn get_profile(&self, user_id: &str) -> Result<Profile, GatewayError> {
        let profiles = self.profiles.lock().map_err(|_| poisoned())?;
        Ok(profiles.get(user_id).cloned().unwrap_or_default())
    }
}
