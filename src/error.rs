use thiserror::Error;

/// Errors that can occur while loading or validating a task definition.
#[derive(Error, Debug, Clone)]
pub enum TaskDefinitionError {
    #[error("Failed to parse task JSON: {0}")]
    JsonParseError(String),

    #[error("Step id '{step_id}' appears more than once in the task tree")]
    DuplicateStepId { step_id: String },

    #[error("Step '{step_id}' lists option value '{value}' more than once")]
    DuplicateOptionValue { step_id: String, value: String },
}

/// Errors reported by a persistence gateway or profile source.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),

    #[error("Remote store rejected the request: {0}")]
    Rejected(String),

    #[error("Could not encode or decode stored progress: {0}")]
    Serialization(String),
}

impl GatewayError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_))
    }
}

/// Errors surfaced by a running task session.
#[derive(Error, Debug, Clone)]
pub enum SessionError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Answer for step '{step_id}' could not be saved and was rolled back: {source}")]
    SaveFailed {
        step_id: String,
        #[source]
        source: GatewayError,
    },

    #[error("Task could not be marked as completed: {source}")]
    CompletionFailed {
        #[source]
        source: GatewayError,
    },

    #[error("Step '{0}' does not exist in this task")]
    UnknownStep(String),
}
