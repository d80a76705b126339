//! SceneExecution entity module
//!
//! A SceneExecution is one attempted application of a scene, carrying the
//! per-step audit trail the Scene Executor (SPEC_FULL.md §4.C11) produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{SceneExecutionStatus, SceneId, StepName, StepStatus};

/// One entry in a scene execution's ordered step audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    pub name: StepName,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub details: Option<serde_json::Value>,
}

impl Step {
    fn pending(name: StepName) -> Self {
        Self {
            name,
            status: StepStatus::Pending,
            started_at: None,
            ended_at: None,
            error: None,
            details: None,
        }
    }
}

/// The result of polling the coordinator after issuing play (step 7).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct VerificationResult {
    pub playback_confirmed: bool,
    pub transport_state: Option<String>,
    pub track_uri: Option<String>,
    pub checked_at: Option<DateTime<Utc>>,
    pub verification_unavailable: bool,
}

/// A persisted attempt to apply a scene. See SPEC_FULL.md §3 for invariants:
/// `steps` always holds exactly the eight [`StepName`] variants in fixed
/// order, and a terminal `status` always has `ended_at` set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SceneExecution {
    pub scene_execution_id: crate::domain::value_objects::SceneExecutionId,
    pub scene_id: SceneId,
    pub idempotency_key: Option<String>,
    pub coordinator_used: Option<String>,
    pub status: SceneExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub steps: Vec<Step>,
    pub verification: Option<VerificationResult>,
    pub error: Option<String>,
}

impl SceneExecution {
    /// Creates a fresh execution record with all eight steps pending, in
    /// the fixed order the invariant requires.
    pub fn new(scene_id: SceneId, idempotency_key: Option<String>) -> Self {
        Self {
            scene_execution_id: crate::domain::value_objects::SceneExecutionId::new(),
            scene_id,
            idempotency_key,
            coordinator_used: None,
            status: SceneExecutionStatus::Starting,
            started_at: Utc::now(),
            ended_at: None,
            steps: StepName::ALL.iter().map(|n| Step::pending(*n)).collect(),
            verification: None,
            error: None,
        }
    }

    fn step_mut(&mut self, name: StepName) -> &mut Step {
        self.steps
            .iter_mut()
            .find(|s| s.name == name)
            .expect("StepName::ALL always seeds every step")
    }

    pub fn start_step(&mut self, name: StepName) {
        let step = self.step_mut(name);
        step.status = StepStatus::Running;
        step.started_at = Some(Utc::now());
    }

    pub fn complete_step(&mut self, name: StepName, details: Option<serde_json::Value>) {
        let step = self.step_mut(name);
        step.status = StepStatus::Completed;
        step.ended_at = Some(Utc::now());
        step.details = details;
    }

    pub fn fail_step(&mut self, name: StepName, error: String, details: Option<serde_json::Value>) {
        let step = self.step_mut(name);
        step.status = StepStatus::Failed;
        step.ended_at = Some(Utc::now());
        step.error = Some(error);
        step.details = details;
    }

    pub fn skip_step(&mut self, name: StepName) {
        let step = self.step_mut(name);
        step.status = StepStatus::Skipped;
        step.ended_at = Some(Utc::now());
    }

    /// Finalizes the execution as `PLAYING_CONFIRMED` or `FAILED`, per the
    /// rule in SPEC_FULL.md §4.C11: confirmed *or* verification-unavailable
    /// both count as confirmed for status purposes.
    pub fn finalize_from_verification(&mut self, verification: VerificationResult) {
        self.status = if verification.playback_confirmed || verification.verification_unavailable {
            SceneExecutionStatus::PlayingConfirmed
        } else {
            SceneExecutionStatus::Failed
        };
        self.verification = Some(verification);
        self.ended_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: String) {
        self.status = SceneExecutionStatus::Failed;
        self.error = Some(error);
        self.ended_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_execution_seeds_all_eight_steps_pending_in_order() {
        let exec = SceneExecution::new(SceneId::new(), None);
        assert_eq!(exec.steps.len(), 8);
        assert_eq!(exec.steps[0].name, StepName::DetermineCoordinator);
        assert_eq!(exec.steps[7].name, StepName::ReleaseLock);
        assert!(exec.steps.iter().all(|s| s.status == StepStatus::Pending));
    }

    #[test]
    fn confirmed_or_unavailable_both_finalize_as_confirmed() {
        let mut exec = SceneExecution::new(SceneId::new(), None);
        exec.finalize_from_verification(VerificationResult {
            playback_confirmed: false,
            verification_unavailable: true,
            ..Default::default()
        });
        assert_eq!(exec.status, SceneExecutionStatus::PlayingConfirmed);
        assert!(exec.ended_at.is_some());
    }

    #[test]
    fn truly_unconfirmed_finalizes_as_failed() {
        let mut exec = SceneExecution::new(SceneId::new(), None);
        exec.finalize_from_verification(VerificationResult::default());
        assert_eq!(exec.status, SceneExecutionStatus::Failed);
    }

    #[test]
    fn fail_sets_ended_at_for_terminal_status() {
        let mut exec = SceneExecution::new(SceneId::new(), None);
        exec.fail("coordinator locked".to_string());
        assert!(exec.status.is_terminal());
        assert!(exec.ended_at.is_some());
    }
}
