use crate::answers::AnswerStore;
use crate::config::PositionTracking;
use crate::task::{StepKind, StepNode};
use tracing::debug;

/// Where the user is within the visible steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    AtStep(usize),
    /// Terminal: the task was submitted.
    Completed,
}

/// Outcome of a navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Moved(usize),
    /// Nothing to do: first step, out-of-range jump, or already completed.
    Unchanged,
    /// The current step still needs an answer.
    Blocked,
    /// `next` was called on the last step; the caller persists and then calls
    /// [`Progression::complete`].
    CompletionRequested,
}

/// Tracks the current step and handles next/previous/jump navigation.
#[derive(Debug, Clone)]
pub struct Progression {
    position: Position,
    anchor: Option<String>,
    tracking: PositionTracking,
}

impl Progression {
    pub fn new(tracking: PositionTracking) -> Self {
        Self {
            position: Position::AtStep(0),
            anchor: None,
            tracking,
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn index(&self) -> Option<usize> {
        match self.position {
            Position::AtStep(i) => Some(i),
            Position::Completed => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.position == Position::Completed
    }

    pub fn current<'a>(&self, visible: &[&'a StepNode]) -> Option<&'a StepNode> {
        self.index().and_then(|i| visible.get(i).copied())
    }

    /// Questions and uploads need a stored answer before the user may move on.
    pub fn can_advance(step: &StepNode, answers: &AnswerStore) -> bool {
        match step.kind {
            StepKind::Question | StepKind::Upload => answers.is_answered(&step.id),
            StepKind::Content
            | StepKind::Exercise
            | StepKind::TeamMembers
            | StepKind::Unsupported => true,
        }
    }

    pub fn next(&mut self, visible: &[&StepNode], answers: &AnswerStore) -> Transition {
        let Position::AtStep(index) = self.position else {
            return Transition::Unchanged;
        };
        if visible.is_empty() {
            return Transition::CompletionRequested;
        }
        let index = index.min(visible.len() - 1);
        if !Self::can_advance(visible[index], answers) {
            debug!(step_id = %visible[index].id, "next blocked, step unanswered");
            return Transition::Blocked;
        }
        if index + 1 < visible.len() {
            self.move_to(index + 1, visible);
            Transition::Moved(index + 1)
        } else {
            Transition::CompletionRequested
        }
    }

    pub fn previous(&mut self, visible: &[&StepNode]) -> Transition {
        match self.position {
            Position::AtStep(index) if index > 0 && !visible.is_empty() => {
                let target = (index - 1).min(visible.len() - 1);
                self.move_to(target, visible);
                Transition::Moved(target)
            }
            _ => Transition::Unchanged,
        }
    }

    /// Jumps to `index`. Out-of-range requests are ignored.
    pub fn go_to(&mut self, index: usize, visible: &[&StepNode]) -> Transition {
        if self.is_completed() || index >= visible.len() {
            return Transition::Unchanged;
        }
        self.move_to(index, visible);
        Transition::Moved(index)
    }

    pub fn complete(&mut self) {
        self.position = Position::Completed;
    }

    /// Re-anchors the position after the visible steps were recomputed.
    pub fn reconcile(&mut self, visible: &[&StepNode]) {
        let Position::AtStep(index) = self.position else {
            return;
        };
        if visible.is_empty() {
            self.position = Position::AtStep(0);
            self.anchor = None;
            return;
        }
        let clamped = index.min(visible.len() - 1);
        let target = match self.tracking {
            PositionTracking::ByStepId => self
                .anchor
                .as_deref()
                .and_then(|id| visible.iter().position(|step| step.id == id))
                .unwrap_or(clamped),
            PositionTracking::ByIndex => clamped,
        };
        if target != index {
            debug!(from = index, to = target, "position moved after recompute");
        }
        self.move_to(target, visible);
    }

    fn move_to(&mut self, index: usize, visible: &[&StepNode]) {
        self.position = Position::AtStep(index);
        self.anchor = visible.get(index).map(|step| step.id.clone());
    }
}
