use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};

/// How the progression controller finds its place after the visible steps change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionTracking {
    /// Follow the step that was on screen, wherever it moved to.
    #[default]
    ByStepId,
    /// Keep the numeric index, even if it now points at a different step.
    ByIndex,
}

/// Settings for a [`crate::session::TaskSession`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub tracking: PositionTracking,
    /// Applies to profile and progress reads. Answer saves are never retried.
    pub retry: RetryPolicy,
}

impl SessionConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_tracking(mut self, tracking: PositionTracking) -> Self {
        self.tracking = tracking;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
