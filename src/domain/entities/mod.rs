pub mod holiday;
pub mod job;
pub mod routine;
pub mod scene;
pub mod scene_execution;

pub use holiday::Holiday;
pub use job::Job;
pub use routine::{MusicPolicy, Routine};
pub use scene::{CoordinatorPreference, Scene, SceneMember};
pub use scene_execution::{SceneExecution, Step, VerificationResult};
