//! Pipeline state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The state of one stage as the executor walks it.
///
/// `Failed` is absorbing and reachable from the three middle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Waiting for the next stage to be popped.
    #[default]
    Pending,
    /// Computing and validating input variables.
    ResolvingInputs,
    /// Waiting on the apply engine.
    Applying,
    /// Running the stage's post-apply check.
    Checking,
    /// All stages finished.
    Done,
    /// The run halted.
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::ResolvingInputs => write!(f, "resolving_inputs"),
            Self::Applying => write!(f, "applying"),
            Self::Checking => write!(f, "checking"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl PipelineState {
    /// Returns true if the state ends a run.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Returns true if a failure may be raised from this state.
    #[must_use]
    pub const fn can_fail(&self) -> bool {
        matches!(self, Self::ResolvingInputs | Self::Applying | Self::Checking)
    }
}

/// A single move of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransition {
    /// State before the move.
    pub from: PipelineState,
    /// State after the move.
    pub to: PipelineState,
}

impl StageTransition {
    /// Creates a transition.
    #[must_use]
    pub const fn new(from: PipelineState, to: PipelineState) -> Self {
        Self { from, to }
    }

    /// Returns true if the move is permitted.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        use PipelineState::{Applying, Checking, Done, Failed, Pending, ResolvingInputs};
        match (self.from, self.to) {
            (Pending, ResolvingInputs | Done)
            | (ResolvingInputs, Applying)
            | (Applying, Checking)
            | (Checking, ResolvingInputs | Done) => true,
            (from, Failed) => from.can_fail(),
            _ => false,
        }
    }
}

impl fmt::Display for StageTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PipelineState::*;

    #[test]
    fn test_state_display() {
        assert_eq!(ResolvingInputs.to_string(), "resolving_inputs");
        assert_eq!(Checking.to_string(), "checking");
        assert_eq!(Failed.to_string(), "failed");
    }

    #[test]
    fn test_terminal_states() {
        assert!(Done.is_terminal());
        assert!(Failed.is_terminal());
        assert!(!Applying.is_terminal());
        assert!(!Pending.is_terminal());
    }

    #[test]
    fn test_happy_path_transitions_are_valid() {
        let path = [Pending, ResolvingInputs, Applying, Checking, ResolvingInputs, Applying, Checking, Done];
        for pair in path.windows(2) {
            assert!(StageTransition::new(pair[0], pair[1]).is_valid(), "{:?}", pair);
        }
    }

    #[test]
    fn test_failed_only_from_middle_states() {
        assert!(StageTransition::new(ResolvingInputs, Failed).is_valid());
        assert!(StageTransition::new(Applying, Failed).is_valid());
        assert!(StageTransition::new(Checking, Failed).is_valid());
        assert!(!StageTransition::new(Pending, Failed).is_valid());
        assert!(!StageTransition::new(Done, Failed).is_valid());
    }

    #[test]
    fn test_skipping_states_is_invalid() {
        assert!(!StageTransition::new(ResolvingInputs, Checking).is_valid());
        assert!(!StageTransition::new(Failed, ResolvingInputs).is_valid());
    }

    #[test]
    fn test_state_serialize() {
        let json = serde_json::to_string(&ResolvingInputs).unwrap();
        assert_eq!(json, r#""resolving_inputs""#);
    }
}
