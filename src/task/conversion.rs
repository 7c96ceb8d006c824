use super::definition::{InputType, StepKind, StepNode, StepOption, Subflow, TaskDefinition};
use crate::condition::Condition;
use crate::error::TaskDefinitionError;
use ahash::AHashMap;
use serde::Deserialize;
use serde_json::Value;

/// A trait for custom task formats that can be converted into a `TaskDefinition`.
///
/// The built-in [`AuthoredTask`] covers the JSON the task builder stores. Other
/// sources (a CMS export, a test fixture DSL) implement this trait to reuse the
/// same loading rules.
pub trait IntoTask {
    /// Consumes the object and converts it into a step tree.
    fn into_task(self) -> Result<TaskDefinition, TaskDefinitionError>;
}

/// The task builder's stored JSON: either a bare array of steps or `{"steps": [..]}`.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum AuthoredTask {
    Steps(Vec<AuthoredStep>),
    Wrapped { steps: Vec<AuthoredStep> },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AuthoredStep {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: StepKind,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub input_type: Option<InputType>,
    #[serde(default)]
    pub options: Vec<StepOption>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub children: Vec<AuthoredStep>,
    #[serde(default)]
    pub on_answer: AHashMap<String, Vec<AuthoredStep>>,
}

impl AuthoredStep {
    fn into_node(self) -> StepNode {
        let mut subflows = Vec::new();
        if !self.on_answer.is_empty() {
            let by_answer = self
                .on_answer
                .into_iter()
                .map(|(answer, steps)| (answer, convert_all(steps)))
                .collect();
            subflows.push(Subflow::Branch { by_answer });
        }
        if !self.children.is_empty() {
            subflows.push(Subflow::Always {
                children: convert_all(self.children),
            });
        }

        StepNode {
            id: self.id,
            kind: self.kind,
            text: self.question.or(self.text),
            input_type: self.input_type,
            options: self.options,
            conditions: self.conditions,
            subflows,
        }
    }
}

fn convert_all(steps: Vec<AuthoredStep>) -> Vec<StepNode> {
    steps.into_iter().map(AuthoredStep::into_node).collect()
}

impl IntoTask for AuthoredTask {
    fn into_task(self) -> Result<TaskDefinition, TaskDefinitionError> {
        let steps = match self {
            AuthoredTask::Steps(steps) | AuthoredTask::Wrapped { steps } => steps,
        };
        Ok(TaskDefinition::new(convert_all(steps)))
    }
}

impl IntoTask for Vec<StepNode> {
    fn into_task(self) -> Result<TaskDefinition, TaskDefinitionError> {
        Ok(TaskDefinition::new(self))
    }
}

impl TaskDefinition {
    /// Parses a task stored in the task builder's JSON format.
    ///
    /// Only JSON that is not a step list at all is an error. Problems inside the
    /// tree are logged and resolved to hidden steps.
    pub fn from_json(json: &str) -> Result<Self, TaskDefinitionError> {
        let parse_error = |e: serde_json::Error| TaskDefinitionError::JsonParseError(e.to_string());
        // Decoded by shape so the error names the failing field.
        let steps: Vec<AuthoredStep> = match serde_json::from_str::<Value>(json).map_err(parse_error)? {
            Value::Object(mut wrapper) => {
                serde_json::from_value(wrapper.remove("steps").unwrap_or(Value::Null))
            }
            other => serde_json::from_value(other),
        }
        .map_err(parse_error)?;
        AuthoredTask::Steps(steps).into_task()
    }
}
