//! # taskflow - Conditional Step Visibility and Progression Engine
//!
//! **taskflow** drives the dynamic task forms of the BSF accelerator platform. A task
//! is an authored tree of steps (content blocks, questions, uploads, exercises).
//! Which steps a user sees depends on their profile and on the answers they have
//! already given; as answers change, the visible sequence is recomputed and the
//! user's position within it is kept.
//!
//! ## Core Workflow
//!
//! 1.  **Load the task**: Parse the task builder's JSON with [`task::TaskDefinition::from_json`],
//!     or implement [`task::IntoTask`] for your own format.
//! 2.  **Walk**: [`walker::build_visible_steps`] flattens the tree for a given profile and
//!     answer set. It is a pure function and can be called on its own.
//! 3.  **Run a session**: [`session::TaskSession`] hydrates answers from a
//!     [`gateway::PersistenceGateway`], saves every answer optimistically (rolling back on
//!     failure) and tracks navigation through [`progression::Progression`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use taskflow::prelude::*;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<()> {
//! let task = TaskDefinition::from_json(r#"[
//!     {"id": "ip", "type": "question", "inputType": "radio",
//!      "options": [{"label": "Yes", "value": "yes"}, {"label": "No", "value": "no"}],
//!      "onAnswer": {"yes": [{"id": "ip-details", "type": "question", "inputType": "textarea"}]}}
//! ]"#)?;
//!
//! let gateway = Arc::new(InMemoryGateway::new());
//! let mut session = TaskSession::builder(task, gateway.clone())
//!     .with_profiles(gateway)
//!     .start("task-1", "user-1")
//!     .await?;
//!
//! session.answer("ip", json!("yes")).await?;
//! assert_eq!(session.visible_steps().len(), 2);
//! session.next().await?;
//! # Ok(())
//! # }
//! ```

pub mod answers;
pub mod condition;
pub mod config;
pub mod error;
pub mod gateway;
pub mod prelude;
pub mod progression;
pub mod retry;
pub mod session;
pub mod task;
pub mod trace;
pub mod walker;
