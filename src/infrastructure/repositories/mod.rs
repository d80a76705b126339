mod sqlite_holiday_repository;
mod sqlite_job_repository;
mod sqlite_routine_repository;
mod sqlite_scene_execution_repository;
mod sqlite_scene_repository;

pub use sqlite_holiday_repository::SqliteHolidayRepository;
pub use sqlite_job_repository::SqliteJobRepository;
pub use sqlite_routine_repository::SqliteRoutineRepository;
pub use sqlite_scene_execution_repository::SqliteSceneExecutionRepository;
pub use sqlite_scene_repository::SqliteSceneRepository;
