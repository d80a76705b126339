pub mod clock;
pub mod coordinator_lock;
pub mod job_generator;
pub mod job_runner;
pub mod preflight_checker;
pub mod schedule_calculator;
pub mod scene_executor;

pub use clock::{Clock, SystemClock};
pub use coordinator_lock::CoordinatorLock;
pub use job_generator::JobGenerator;
pub use job_runner::{JobRunner, JobRunnerConfig};
pub use preflight_checker::{create_error, PreflightChecker, PreflightIssue, PreflightResult};
pub use scene_executor::{SceneExecutor, SceneExecutorOptions};
