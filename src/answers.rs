//! In-memory answers of one task session, keyed by step id.

use crate::gateway::StoredAnswers;
use ahash::AHashMap;
use serde_json::Value;
use tracing::debug;

/// Step id to stored answer.
pub type Answers = AHashMap<String, Value>;

/// Holds the current user's answers for a task.
///
/// Writes are last-write-wins per key; the session is the only writer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnswerStore {
    answers: Answers,
}

impl AnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store from persisted progress.
    pub fn hydrate(stored: StoredAnswers) -> Self {
        let answers = match stored {
            StoredAnswers::Detailed(map) => {
                debug!(count = map.len(), "hydrating from detailed answers");
                map
            }
            StoredAnswers::Legacy(map) => {
                debug!(count = map.len(), "hydrating from legacy answers");
                map
            }
            StoredAnswers::Empty => Answers::new(),
        };
        Self { answers }
    }

    pub fn get(&self, step_id: &str) -> Option<&Value> {
        self.answers.get(step_id)
    }

    /// Replaces the answer of one step, leaving every other key untouched.
    /// Returns the previous answer.
    pub fn set(&mut self, step_id: impl Into<String>, value: Value) -> Option<Value> {
        self.answers.insert(step_id.into(), value)
    }

    pub fn remove(&mut self, step_id: &str) -> Option<Value> {
        self.answers.remove(step_id)
    }

    /// Whether a step has an answer worth advancing on: present and not null,
    /// an empty string, or an empty list.
    pub fn is_answered(&self, step_id: &str) -> bool {
        match self.answers.get(step_id) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(Value::Array(items)) => !items.is_empty(),
            Some(_) => true,
        }
    }

    pub fn as_map(&self) -> &Answers {
        &self.answers
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// The whole answer set as a JSON object, ready to persist.
    pub fn snapshot(&self) -> Value {
        Value::Object(
            self.answers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Applies `value` immediately and returns a handle that can undo it.
    pub fn begin(&mut self, step_id: impl Into<String>, value: Value) -> AnswerTransaction {
        let step_id = step_id.into();
        let previous = self.set(step_id.clone(), value.clone());
        AnswerTransaction {
            step_id,
            previous,
            written: value,
        }
    }
}

/// An optimistic write that has been applied but not yet confirmed remotely.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "an optimistic write must be committed or rolled back"]
pub struct AnswerTransaction {
    step_id: String,
    previous: Option<Value>,
    written: Value,
}

impl AnswerTransaction {
    pub fn step_id(&self) -> &str {
        &self.step_id
    }

    /// The remote write succeeded; the captured pre-update value is dropped.
    pub fn commit(self) {}

    /// Restores the key's pre-update value.
    ///
    /// Returns `false` without touching the store when the key no longer holds the
    /// value this transaction wrote, since a newer write owns it now.
    pub fn rollback(self, store: &mut AnswerStore) -> bool {
        if store.get(&self.step_id) != Some(&self.written) {
            return false;
        }
        match self.previous {
            Some(previous) => {
                store.set(self.step_id, previous);
            }
            None => {
                store.remove(&self.step_id);
            }
        }
        true
    }
}
