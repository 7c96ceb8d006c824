//! Prelude module for convenient imports
//!
//! Re-exports the types needed to load a task, walk it and run a session.
//!
//! # Example
//!
//! ```rust,no_run
//! use taskflow::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let task = TaskDefinition::from_json(&std::fs::read_to_string("data/sample_task.json")?)?;
//! let profile = Profile::new();
//! let answers = Answers::new();
//!
//! for step in build_visible_steps(task.steps(), &profile, &answers) {
//!     println!("{}", step.id);
//! }
//! # Ok(())
//! # }
//! ```

// Task model
pub use crate::task::{
    AuthoredTask, InputType, IntoTask, StepKind, StepNode, StepOption, Subflow, TaskDefinition,
};

// Conditions and traces
pub use crate::condition::{Condition, ConditionSource, Operator, evaluate, evaluate_all};
pub use crate::trace::{ConditionTrace, TraceFormatter};

// Walking and navigation
pub use crate::answers::{AnswerStore, AnswerTransaction, Answers};
pub use crate::progression::{Position, Progression, Transition};
pub use crate::walker::{StepVisibility, build_visible_steps, explain_visibility};

// Sessions and persistence
pub use crate::config::{PositionTracking, SessionConfig};
pub use crate::gateway::{
    InMemoryGateway, PersistenceGateway, Profile, ProfileSource, ProgressRecord, ProgressUpdate,
    StoredAnswers,
};
pub use crate::retry::RetryPolicy;
pub use crate::session::{TaskSession, TaskSessionBuilder};

// Error types
pub use crate::error::{GatewayError, SessionError, TaskDefinitionError};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
