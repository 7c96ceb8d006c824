use super::ConditionTrace;
use itertools::Itertools;
use serde_json::Value;

/// Formats condition traces into human-readable explanations
pub struct TraceFormatter;

impl TraceFormatter {
    /// Format one condition, e.g. `$profile.university_ip (was true) == true`.
    pub fn format_trace(trace: &ConditionTrace) -> String {
        match trace {
            ConditionTrace::Compared {
                source,
                op_symbol,
                found,
                expected,
                ..
            } => {
                let was = match found {
                    Some(value) => Self::format_value(value),
                    None => "missing".to_string(),
                };
                format!(
                    "{} (was {}) {} {}",
                    source,
                    was,
                    op_symbol,
                    Self::format_value(expected)
                )
            }
            ConditionTrace::Malformed { reason } => format!("malformed condition ({})", reason),
        }
    }

    /// Explains the outcome of a step's whole condition list.
    ///
    /// Like a short-circuiting AND, only the first failing condition is shown when
    /// the step is hidden; every condition is shown when it is visible.
    pub fn format_conditions(traces: &[ConditionTrace]) -> String {
        if traces.is_empty() {
            return "no conditions".to_string();
        }
        match traces.iter().find(|t| !t.get_outcome()) {
            Some(decisive) => format!("NOT {}", Self::format_trace(decisive)),
            None => traces.iter().map(Self::format_trace).join(" AND "),
        }
    }

    /// Format a value for display.
    fn format_value(value: &Value) -> String {
        match value {
            Value::Number(n) => match n.as_f64() {
                Some(f) if n.is_f64() && f.fract() == 0.0 => format!("{}", f as i64),
                _ => n.to_string(),
            },
            other => other.to_string(),
        }
    }
}
