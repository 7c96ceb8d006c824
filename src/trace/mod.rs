use serde_json::Value;

mod formatter;

pub use formatter::TraceFormatter;

/// A record of how a single visibility condition was evaluated.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionTrace {
    Compared {
        source: String,
        op_symbol: &'static str,
        /// `None` when the profile key or answer was absent.
        found: Option<Value>,
        expected: Value,
        outcome: bool,
    },
    Malformed {
        reason: String,
    },
}

impl ConditionTrace {
    pub fn get_outcome(&self) -> bool {
        match self {
            ConditionTrace::Compared { outcome, .. } => *outcome,
            ConditionTrace::Malformed { .. } => false,
        }
    }
}
