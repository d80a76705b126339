pub mod execution_status;
pub mod ids;
pub mod job_status;
pub mod music_content;
pub mod schedule;

pub use execution_status::{SceneExecutionStatus, StepName, StepStatus};
pub use ids::{JobId, RoutineId, SceneExecutionId, SceneId};
pub use job_status::JobStatus;
pub use music_content::{GroupBehavior, MusicContent, MusicPolicyType, QueueMode, TvPolicy};
pub use schedule::{
    weekday_set_from_csv, weekday_set_to_csv, HolidayBehavior, LocalTimeOfDay, ScheduleType,
    WeekdaySet,
};
