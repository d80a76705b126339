//! Scene entity module
//!
//! A Scene names the endpoints a routine targets, their volume targets, and
//! the policy for picking a coordinator among them.

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::SceneId;
use crate::error::{CoreError, CoreResult};

/// How the Scene Executor picks which member becomes the group coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CoordinatorPreference {
    /// Prefer a soundbar-class endpoint (Arc, Beam, Ray, Playbar, Playbase)
    /// that is also a scene member.
    ArcFirst,
}

/// A single endpoint targeted by a scene.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SceneMember {
    pub endpoint_id: String,
    pub room_name: Option<String>,
    pub target_volume: Option<u8>,
    pub mute: Option<bool>,
}

impl SceneMember {
    pub fn new(endpoint_id: String) -> Self {
        Self {
            endpoint_id,
            room_name: None,
            target_volume: None,
            mute: None,
        }
    }
}

/// A named group of endpoints with volume targets and a coordinator policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scene {
    pub scene_id: SceneId,
    pub name: String,
    pub coordinator_preference: CoordinatorPreference,
    pub fallback_policy: Option<String>,
    pub members: Vec<SceneMember>,
    pub volume_ramp: Option<bool>,
    pub teardown: Option<bool>,
}

impl Scene {
    pub fn new(name: String) -> Self {
        Self {
            scene_id: SceneId::new(),
            name,
            coordinator_preference: CoordinatorPreference::ArcFirst,
            fallback_policy: None,
            members: Vec::new(),
            volume_ramp: None,
            teardown: None,
        }
    }

    /// Validates the invariants from SPEC_FULL.md §3: non-empty members
    /// (required for use in a routine) and in-range target volumes.
    pub fn validate(&self) -> CoreResult<()> {
        if self.members.is_empty() {
            return Err(CoreError::Validation(
                "scene must have at least one member to be used in a routine".to_string(),
            ));
        }
        for member in &self.members {
            if let Some(volume) = member.target_volume {
                if volume > 100 {
                    return Err(CoreError::Validation(format!(
                        "target_volume out of range for endpoint '{}': {}",
                        member.endpoint_id, volume
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene_with_members(volumes: &[u8]) -> Scene {
        let mut scene = Scene::new("Living Room".to_string());
        for (i, v) in volumes.iter().enumerate() {
            let mut member = SceneMember::new(format!("endpoint-{i}"));
            member.target_volume = Some(*v);
            scene.members.push(member);
        }
        scene
    }

    #[test]
    fn empty_scene_fails_validation() {
        assert!(Scene::new("Empty".to_string()).validate().is_err());
    }

    #[test]
    fn valid_volumes_pass() {
        assert!(scene_with_members(&[0, 50, 100]).validate().is_ok());
    }

    #[test]
    fn out_of_range_volume_fails() {
        assert!(scene_with_members(&[101]).validate().is_err());
    }
}
