use crate::condition::Condition;
use crate::error::TaskDefinitionError;
use ahash::{AHashMap, AHashSet};
use serde::Deserialize;
use tracing::warn;

/// What a step renders as, and which navigation guard applies to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    Content,
    Question,
    #[serde(alias = "file")]
    Upload,
    Exercise,
    TeamMembers,
    /// A step type this engine does not know, or none at all. Such steps are never shown.
    #[serde(other)]
    #[default]
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Radio,
    Select,
    Multiselect,
    Text,
    Textarea,
    Boolean,
}

/// One selectable choice of a question.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StepOption {
    pub label: String,
    pub value: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Nested steps hanging off a parent step.
#[derive(Debug, Clone, PartialEq)]
pub enum Subflow {
    /// Walked only for the key equal to the parent's current answer.
    Branch {
        by_answer: AHashMap<String, Vec<StepNode>>,
    },
    /// Walked whenever the parent is visible.
    Always { children: Vec<StepNode> },
}

impl Subflow {
    /// Every step of this subflow, regardless of which branch is selected.
    pub fn all_steps(&self) -> Box<dyn Iterator<Item = &StepNode> + '_> {
        match self {
            Subflow::Branch { by_answer } => Box::new(by_answer.values().flatten()),
            Subflow::Always { children } => Box::new(children.iter()),
        }
    }
}

/// A node of the authored step tree.
#[derive(Debug, Clone, PartialEq)]
pub struct StepNode {
    pub id: String,
    pub kind: StepKind,
    pub text: Option<String>,
    pub input_type: Option<InputType>,
    pub options: Vec<StepOption>,
    pub conditions: Vec<Condition>,
    pub subflows: Vec<Subflow>,
}

impl StepNode {
    pub fn new(id: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: id.into(),
            kind,
            text: None,
            input_type: None,
            options: Vec::new(),
            conditions: Vec::new(),
            subflows: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_input(mut self, input_type: InputType, options: Vec<StepOption>) -> Self {
        self.input_type = Some(input_type);
        self.options = options;
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_children(mut self, children: Vec<StepNode>) -> Self {
        self.subflows.push(Subflow::Always { children });
        self
    }

    pub fn with_branch(mut self, answer: impl Into<String>, steps: Vec<StepNode>) -> Self {
        let answer = answer.into();
        if let Some(Subflow::Branch { by_answer }) = self
            .subflows
            .iter_mut()
            .find(|s| matches!(s, Subflow::Branch { .. }))
        {
            by_answer.insert(answer, steps);
        } else {
            let mut by_answer = AHashMap::new();
            by_answer.insert(answer, steps);
            // Answer branches are walked before unconditional children.
            self.subflows.insert(0, Subflow::Branch { by_answer });
        }
        self
    }

    pub fn option(&self, value: &str) -> Option<&StepOption> {
        self.options.iter().find(|o| o.value == value)
    }
}

impl StepOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
            description: None,
        }
    }
}

/// An authored step tree, loaded once per task and immutable afterwards.
///
/// Loading never rejects a tree. Authoring mistakes are logged once here and
/// resolved at walk time: malformed conditions and unknown step types hide
/// their step, a duplicated id is shown wherever it is reached.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDefinition {
    steps: Vec<StepNode>,
}

impl TaskDefinition {
    pub fn new(steps: Vec<StepNode>) -> Self {
        let definition = Self { steps };
        definition.report_authoring_issues();
        definition
    }

    pub fn steps(&self) -> &[StepNode] {
        &self.steps
    }

    /// Depth-first iterator over every authored step, hidden or not.
    pub fn iter_all(&self) -> impl Iterator<Item = &StepNode> {
        let mut stack: Vec<&StepNode> = self.steps.iter().rev().collect();
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            let nested: Vec<&StepNode> = node.subflows.iter().flat_map(Subflow::all_steps).collect();
            stack.extend(nested.into_iter().rev());
            Some(node)
        })
    }

    /// First step with this id, in depth-first order.
    pub fn find_step(&self, id: &str) -> Option<&StepNode> {
        self.iter_all().find(|node| node.id == id)
    }

    pub fn step_count(&self) -> usize {
        self.iter_all().count()
    }

    /// Checks that step ids are unique across the whole tree and option
    /// values are unique within each step.
    ///
    /// Opt-in, for authoring tools. Sessions run on trees that fail it.
    pub fn validate_strict(&self) -> Result<(), TaskDefinitionError> {
        let mut seen = AHashSet::new();
        for node in self.iter_all() {
            if !seen.insert(node.id.as_str()) {
                return Err(TaskDefinitionError::DuplicateStepId {
                    step_id: node.id.clone(),
                });
            }
            if let Some(value) = duplicate_option(node) {
                return Err(TaskDefinitionError::DuplicateOptionValue {
                    step_id: node.id.clone(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }

    fn report_authoring_issues(&self) {
        let mut seen = AHashSet::new();
        for node in self.iter_all() {
            if !seen.insert(node.id.as_str()) {
                warn!(step_id = %node.id, "step id appears more than once in the task tree");
            }
            if let Some(value) = duplicate_option(node) {
                warn!(step_id = %node.id, value, "option value listed more than once");
            }
            if node.kind == StepKind::Unsupported {
                warn!(step_id = %node.id, "unsupported step type, step and its subtree stay hidden");
            }
            for condition in &node.conditions {
                if let Condition::Malformed { reason } = condition {
                    warn!(step_id = %node.id, reason = %reason, "malformed condition, step stays hidden");
                }
            }
        }
    }
}

fn duplicate_option(node: &StepNode) -> Option<&str> {
    let mut values = AHashSet::new();
    node.options
        .iter()
        .map(|option| option.value.as_str())
        .find(|value| !values.insert(*value))
}
