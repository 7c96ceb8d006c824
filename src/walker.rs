use crate::answers::Answers;
use crate::condition::{evaluate_all, trace_condition};
use crate::gateway::Profile;
use crate::task::{StepKind, StepNode, Subflow};
use crate::trace::{ConditionTrace, TraceFormatter};
use ahash::AHashMap;
use serde_json::Value;
use std::borrow::Cow;
use tracing::debug;

/// Flattens the step tree into the ordered list of steps currently shown.
///
/// Depth-first, pre-order. A visible step is followed by the branch selected by
/// its own answer, then by its unconditional children. A hidden step hides its
/// whole subtree. The result depends only on the three inputs.
pub fn build_visible_steps<'a>(
    steps: &'a [StepNode],
    profile: &Profile,
    answers: &Answers,
) -> Vec<&'a StepNode> {
    let mut visible = Vec::new();
    walk(steps, profile, answers, &mut visible);
    visible
}

fn walk<'a>(steps: &'a [StepNode], profile: &Profile, answers: &Answers, out: &mut Vec<&'a StepNode>) {
    for node in steps {
        if !is_visible(node, profile, answers) {
            continue;
        }
        out.push(node);
        for subflow in &node.subflows {
            match subflow {
                Subflow::Branch { by_answer } => {
                    if let Some(branch) = selected_branch(node, by_answer, answers) {
                        walk(branch, profile, answers, out);
                    }
                }
                Subflow::Always { children } => walk(children, profile, answers, out),
            }
        }
    }
}

fn is_visible(node: &StepNode, profile: &Profile, answers: &Answers) -> bool {
    if node.kind == StepKind::Unsupported {
        return false;
    }
    if node.conditions.iter().any(|c| c.is_malformed()) {
        debug!(step_id = %node.id, "hidden by a malformed condition");
        return false;
    }
    evaluate_all(&node.conditions, profile, answers)
}

fn selected_branch<'a>(
    node: &StepNode,
    by_answer: &'a AHashMap<String, Vec<StepNode>>,
    answers: &Answers,
) -> Option<&'a [StepNode]> {
    let key = answer_key(answers.get(&node.id)?)?;
    by_answer.get(&*key).map(Vec::as_slice)
}

/// The branch key an answer selects: strings as-is, booleans and numbers by
/// their JSON spelling, with integral floats spelled as integers (`1.0` is
/// `"1"`). Lists, objects and null select nothing.
pub fn answer_key(answer: &Value) -> Option<Cow<'_, str>> {
    match answer {
        Value::String(s) => Some(Cow::Borrowed(s.as_str())),
        Value::Bool(b) => Some(Cow::Owned(b.to_string())),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 => Some(Cow::Owned(format!("{f:.0}"))),
            _ => Some(Cow::Owned(n.to_string())),
        },
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Why a step is or is not shown.
#[derive(Debug, Clone)]
pub struct StepVisibility<'a> {
    pub step: &'a StepNode,
    /// Nesting level in the authored tree, 0 for top-level steps.
    pub depth: usize,
    pub visible: bool,
    pub conditions: Vec<ConditionTrace>,
}

impl StepVisibility<'_> {
    pub fn reason(&self) -> String {
        if self.step.kind == StepKind::Unsupported {
            return "unsupported step type".to_string();
        }
        TraceFormatter::format_conditions(&self.conditions)
    }
}

/// Same walk as [`build_visible_steps`], but also reports the hidden steps that
/// cut off a subtree, each with the traces of its conditions.
///
/// Steps inside a hidden subtree, or in a branch the answer did not select, are
/// not evaluated and not reported.
pub fn explain_visibility<'a>(
    steps: &'a [StepNode],
    profile: &Profile,
    answers: &Answers,
) -> Vec<StepVisibility<'a>> {
    let mut report = Vec::new();
    explain(steps, profile, answers, 0, &mut report);
    report
}

fn explain<'a>(
    steps: &'a [StepNode],
    profile: &Profile,
    answers: &Answers,
    depth: usize,
    out: &mut Vec<StepVisibility<'a>>,
) {
    for node in steps {
        let conditions: Vec<ConditionTrace> = node
            .conditions
            .iter()
            .map(|c| trace_condition(c, profile, answers))
            .collect();
        let visible =
            node.kind != StepKind::Unsupported && conditions.iter().all(ConditionTrace::get_outcome);
        out.push(StepVisibility {
            step: node,
            depth,
            visible,
            conditions,
        });
        if !visible {
            continue;
        }
        for subflow in &node.subflows {
            match subflow {
                Subflow::Branch { by_answer } => {
                    if let Some(branch) = selected_branch(node, by_answer, answers) {
                        explain(branch, profile, answers, depth + 1, out);
                    }
                }
                Subflow::Always { children } => explain(children, profile, answers, depth + 1, out),
            }
        }
    }
}
