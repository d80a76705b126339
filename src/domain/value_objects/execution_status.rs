//! Value objects describing the Scene Executor's state machine, per
//! SPEC_FULL.md §4.C11.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SceneExecutionStatus {
    Starting,
    PlayingConfirmed,
    Failed,
    RolledBack,
}

impl SceneExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SceneExecutionStatus::Starting)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// The eight steps of the Scene Executor, in the fixed order the invariant
/// in SPEC_FULL.md §8 requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    DetermineCoordinator,
    AcquireLock,
    EnsureGroup,
    ApplyVolume,
    PreFlightCheck,
    StartPlayback,
    VerifyPlayback,
    ReleaseLock,
}

impl StepName {
    /// The fixed, ordered step list every `SceneExecution.steps` must contain.
    pub const ALL: [StepName; 8] = [
        StepName::DetermineCoordinator,
        StepName::AcquireLock,
        StepName::EnsureGroup,
        StepName::ApplyVolume,
        StepName::PreFlightCheck,
        StepName::StartPlayback,
        StepName::VerifyPlayback,
        StepName::ReleaseLock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::DetermineCoordinator => "determine_coordinator",
            StepName::AcquireLock => "acquire_lock",
            StepName::EnsureGroup => "ensure_group",
            StepName::ApplyVolume => "apply_volume",
            StepName::PreFlightCheck => "pre_flight_check",
            StepName::StartPlayback => "start_playback",
            StepName::VerifyPlayback => "verify_playback",
            StepName::ReleaseLock => "release_lock",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_steps_in_fixed_order_match_names() {
        let names: Vec<&str> = StepName::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "determine_coordinator",
                "acquire_lock",
                "ensure_group",
                "apply_volume",
                "pre_flight_check",
                "start_playback",
                "verify_playback",
                "release_lock",
            ]
        );
    }

    #[test]
    fn only_starting_is_non_terminal() {
        assert!(!SceneExecutionStatus::Starting.is_terminal());
        assert!(SceneExecutionStatus::PlayingConfirmed.is_terminal());
        assert!(SceneExecutionStatus::Failed.is_terminal());
        assert!(SceneExecutionStatus::RolledBack.is_terminal());
    }
}
