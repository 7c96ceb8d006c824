use super::{Condition, ConditionSource, Operator};
use crate::answers::Answers;
use crate::gateway::Profile;
use crate::trace::ConditionTrace;
use serde_json::Value;

/// Evaluates a single condition against the profile and the current answers.
///
/// Never fails: a malformed condition, or an `in`/`not_in` whose right-hand side
/// is not an array, simply does not hold.
pub fn evaluate(condition: &Condition, profile: &Profile, answers: &Answers) -> bool {
    match condition {
        Condition::Predicate {
            source,
            operator,
            value,
        } => apply(*operator, resolve_source(source, profile, answers), value),
        Condition::Malformed { .. } => false,
    }
}

/// Logical AND over a step's conditions. An empty list always holds.
pub fn evaluate_all(conditions: &[Condition], profile: &Profile, answers: &Answers) -> bool {
    conditions
        .iter()
        .all(|condition| evaluate(condition, profile, answers))
}

/// Looks up the left-hand value of a condition.
///
/// Answer sources drill into `field_id` when one is given. Without a field, a
/// stored answer of the legacy shape `{"value": ..}` is unwrapped first.
pub fn resolve_source<'a>(
    source: &ConditionSource,
    profile: &'a Profile,
    answers: &'a Answers,
) -> Option<&'a Value> {
    match source {
        ConditionSource::Profile { key } => profile.get(key),
        ConditionSource::Answer { step_id, field_id } => {
            let answer = answers.get(step_id)?;
            match field_id {
                Some(field) => answer.as_object()?.get(field),
                None => match answer.as_object().and_then(|obj| obj.get("value")) {
                    Some(inner) => Some(inner),
                    None => Some(answer),
                },
            }
        }
    }
}

/// Evaluates a condition and records what was compared.
pub fn trace_condition(condition: &Condition, profile: &Profile, answers: &Answers) -> ConditionTrace {
    match condition {
        Condition::Predicate {
            source,
            operator,
            value,
        } => {
            let found = resolve_source(source, profile, answers);
            ConditionTrace::Compared {
                source: source.to_string(),
                op_symbol: operator.symbol(),
                found: found.cloned(),
                expected: value.clone(),
                outcome: apply(*operator, found, value),
            }
        }
        Condition::Malformed { reason } => ConditionTrace::Malformed {
            reason: reason.clone(),
        },
    }
}

fn apply(operator: Operator, found: Option<&Value>, expected: &Value) -> bool {
    let matches = |v: &Value| same_value(v, expected);
    let is_member = |members: &Vec<Value>| found.is_some_and(|v| members.iter().any(|m| same_value(v, m)));
    match operator {
        Operator::Equals => found.is_some_and(matches),
        Operator::NotEquals => !found.is_some_and(matches),
        Operator::In => expected.as_array().is_some_and(is_member),
        Operator::NotIn => expected.as_array().is_some_and(|members| !is_member(members)),
    }
}

/// Strict equality, except that numbers compare by value so `1.0` equals `1`.
fn same_value(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a == b || a.as_f64() == b.as_f64(),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same_value(x, y))
        }
        _ => left == right,
    }
}
