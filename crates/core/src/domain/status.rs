use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    #[default]
    Idle,
    Generating,
    Paused,
    Completed,
    Failed,
}

impl GenerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Generating => "generating",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// A session in one of these states has no loop driving it.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Generating)
    }
}

impl std::fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transition table for a single generation session.
///
/// Starting a new session is not an in-session transition: it replaces the
/// session wholesale and is only refused while the current one is generating.
/// There is deliberately no `Paused -> Generating` edge; resuming creates a
/// new session seeded from the paused one.
pub struct GenerationStateMachine;

impl GenerationStateMachine {
    pub fn validate_transition(from: &GenerationStatus, to: &GenerationStatus) -> Result<()> {
        if Self::allowed_transitions(from).contains(to) {
            Ok(())
        } else {
            Err(CoreError::InvalidStatusTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }

    fn allowed_transitions(from: &GenerationStatus) -> Vec<GenerationStatus> {
        match from {
            GenerationStatus::Idle => vec![GenerationStatus::Generating, GenerationStatus::Idle],
            GenerationStatus::Generating => vec![
                GenerationStatus::Paused,
                GenerationStatus::Completed,
                GenerationStatus::Failed,
                GenerationStatus::Idle,
            ],
            GenerationStatus::Paused | GenerationStatus::Completed | GenerationStatus::Failed => {
                vec![GenerationStatus::Idle]
            }
        }
    }

    pub fn can_transition(from: &GenerationStatus, to: &GenerationStatus) -> bool {
        Self::validate_transition(from, to).is_ok()
    }

    pub fn can_start(current: &GenerationStatus) -> bool {
        current.is_settled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        assert!(GenerationStateMachine::can_transition(
            &GenerationStatus::Idle,
            &GenerationStatus::Generating
        ));
        assert!(GenerationStateMachine::can_transition(
            &GenerationStatus::Generating,
            &GenerationStatus::Paused
        ));
        assert!(GenerationStateMachine::can_transition(
            &GenerationStatus::Generating,
            &GenerationStatus::Completed
        ));
        assert!(GenerationStateMachine::can_transition(
            &GenerationStatus::Generating,
            &GenerationStatus::Failed
        ));
    }

    #[test]
    fn test_no_resume_edge() {
        assert!(!GenerationStateMachine::can_transition(
            &GenerationStatus::Paused,
            &GenerationStatus::Generating
        ));
        assert!(!GenerationStateMachine::can_transition(
            &GenerationStatus::Completed,
            &GenerationStatus::Generating
        ));
    }

    #[test]
    fn test_reset_allowed_from_everywhere() {
        for from in [
            GenerationStatus::Idle,
            GenerationStatus::Generating,
            GenerationStatus::Paused,
            GenerationStatus::Completed,
            GenerationStatus::Failed,
        ] {
            assert!(GenerationStateMachine::can_transition(
                &from,
                &GenerationStatus::Idle
            ));
        }
    }

    #[test]
    fn test_can_start() {
        assert!(GenerationStateMachine::can_start(&GenerationStatus::Idle));
        assert!(GenerationStateMachine::can_start(&GenerationStatus::Paused));
        assert!(!GenerationStateMachine::can_start(
            &GenerationStatus::Generating
        ));
    }

    #[test]
    fn test_status_names() {
        assert_eq!(GenerationStatus::Paused.as_str(), "paused");
        assert_eq!(GenerationStatus::Completed.to_string(), "completed");
    }
}
