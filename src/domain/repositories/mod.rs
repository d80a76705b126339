pub mod holiday_repository;
pub mod job_repository;
pub mod routine_repository;
pub mod scene_execution_repository;
pub mod scene_repository;

pub use holiday_repository::HolidayRepository;
pub use job_repository::JobRepository;
pub use routine_repository::RoutineRepository;
pub use scene_execution_repository::SceneExecutionRepository;
pub use scene_repository::SceneRepository;
