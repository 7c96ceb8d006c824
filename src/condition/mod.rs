use serde::Deserialize;
use serde_json::Value;
use std::fmt;

mod engine;

pub use engine::{evaluate, evaluate_all, resolve_source, trace_condition};

/// Where a condition reads its left-hand value from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConditionSource {
    /// A key of the user's profile record.
    Profile { key: String },
    /// The stored answer of another step, optionally a single field of it.
    Answer {
        step_id: String,
        field_id: Option<String>,
    },
}

impl fmt::Display for ConditionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionSource::Profile { key } => write!(f, "$profile.{}", key),
            ConditionSource::Answer {
                step_id,
                field_id: None,
            } => write!(f, "$answers.{}", step_id),
            ConditionSource::Answer {
                step_id,
                field_id: Some(field),
            } => write!(f, "$answers.{}.{}", step_id, field),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equals,
    NotEquals,
    In,
    NotIn,
}

impl Operator {
    /// Parses the authoring spelling of an operator.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "equals" => Some(Operator::Equals),
            "not_equals" => Some(Operator::NotEquals),
            "in" => Some(Operator::In),
            "not_in" => Some(Operator::NotIn),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Equals => "==",
            Operator::NotEquals => "!=",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A visibility predicate attached to a step.
///
/// Authoring mistakes (no source, two sources, an unknown operator) do not fail
/// the load. They produce [`Condition::Malformed`], which never holds, so the
/// guarded step stays hidden.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawCondition")]
pub enum Condition {
    Predicate {
        source: ConditionSource,
        operator: Operator,
        value: Value,
    },
    Malformed {
        reason: String,
    },
}

impl Condition {
    pub fn profile(key: impl Into<String>, operator: Operator, value: Value) -> Self {
        Condition::Predicate {
            source: ConditionSource::Profile { key: key.into() },
            operator,
            value,
        }
    }

    pub fn answer(step_id: impl Into<String>, operator: Operator, value: Value) -> Self {
        Condition::Predicate {
            source: ConditionSource::Answer {
                step_id: step_id.into(),
                field_id: None,
            },
            operator,
            value,
        }
    }

    pub fn answer_field(
        step_id: impl Into<String>,
        field_id: impl Into<String>,
        operator: Operator,
        value: Value,
    ) -> Self {
        Condition::Predicate {
            source: ConditionSource::Answer {
                step_id: step_id.into(),
                field_id: Some(field_id.into()),
            },
            operator,
            value,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Condition::Malformed { .. })
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Predicate {
                source,
                operator,
                value,
            } => write!(f, "{} {} {}", source, operator, value),
            Condition::Malformed { reason } => write!(f, "<malformed: {}>", reason),
        }
    }
}

// Authoring shape: {"source": {"profileKey": ..} | {"stepId": .., "fieldId": ..}, "operator": .., "value": ..}
// Fields are kept loose so that a bad condition degrades to `Malformed` instead of failing the task load.
#[derive(Deserialize)]
struct RawCondition {
    #[serde(default)]
    source: Value,
    #[serde(default)]
    operator: Value,
    #[serde(default)]
    value: Value,
}

impl From<RawCondition> for Condition {
    fn from(raw: RawCondition) -> Self {
        let source = match parse_source(&raw.source) {
            Ok(source) => source,
            Err(reason) => return Condition::Malformed { reason },
        };
        let operator = match raw.operator.as_str().and_then(Operator::parse) {
            Some(op) => op,
            None => {
                return Condition::Malformed {
                    reason: format!("unknown operator {}", raw.operator),
                };
            }
        };
        Condition::Predicate {
            source,
            operator,
            value: raw.value,
        }
    }
}

fn parse_source(raw: &Value) -> Result<ConditionSource, String> {
    let object = raw
        .as_object()
        .ok_or_else(|| "condition has no source".to_string())?;
    let profile_key = object.get("profileKey").and_then(Value::as_str);
    let step_id = object.get("stepId").and_then(Value::as_str);
    let field_id = object.get("fieldId").and_then(Value::as_str);

    match (profile_key, step_id) {
        (Some(key), None) => Ok(ConditionSource::Profile {
            key: key.to_string(),
        }),
        (None, Some(step)) => Ok(ConditionSource::Answer {
            step_id: step.to_string(),
            field_id: field_id.map(str::to_string),
        }),
        (Some(_), Some(_)) => Err("source sets both profileKey and stepId".to_string()),
        (None, None) => Err("source sets neither profileKey nor stepId".to_string()),
    }
}
