//! HTTP request handlers
//!
//! Each handler does nothing but parse the request, call into a repository
//! (or, for the write-actions under `/routines/{id}/...`, update a
//! [`Routine`]/[`Job`] and write it back), and shape the response — no
//! business logic lives here, per SPEC_FULL.md §1's "thin convenience
//! front" framing.

use actix_web::{web, HttpResponse};
use chrono::{DateTime, NaiveDate, Utc};

use crate::application::services::schedule_calculator;
use crate::domain::entities::{job::manual_idempotency_key, Holiday, Job, Routine, Scene};
use crate::domain::value_objects::{JobId, RoutineId, SceneExecutionId, SceneId};
use crate::error::CoreError;
use crate::web::models::*;
use crate::web::server::AppState;

type JsonResult = actix_web::Result<HttpResponse>;

fn ok<T: serde::Serialize>(data: T) -> JsonResult {
    Ok(HttpResponse::Ok().json(ApiResponse::ok(data)))
}

fn error_response(err: CoreError) -> HttpResponse {
    let status = match &err {
        CoreError::Validation(_) => actix_web::http::StatusCode::BAD_REQUEST,
        CoreError::NotFound { .. } => actix_web::http::StatusCode::NOT_FOUND,
        CoreError::Conflict(_) => actix_web::http::StatusCode::CONFLICT,
        CoreError::CoordinatorLocked { .. } => actix_web::http::StatusCode::CONFLICT,
        _ => actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
    };
    HttpResponse::build(status).json(ApiResponse::err(err.to_api_error()))
}

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::ok("OK"))
}

// --- Routines ---------------------------------------------------------

pub async fn create_routine(state: web::Data<AppState>, body: web::Json<Routine>) -> JsonResult {
    let routine = body.into_inner();
    if let Err(err) = routine.validate() {
        return Ok(error_response(err));
    }
    match state.routines.insert(&routine) {
        Ok(()) => ok(routine),
        Err(err) => Ok(error_response(err)),
    }
}

pub async fn list_routines(state: web::Data<AppState>) -> JsonResult {
    match state.routines.list_all() {
        Ok(routines) => ok(routines),
        Err(err) => Ok(error_response(err)),
    }
}

pub async fn get_routine(state: web::Data<AppState>, path: web::Path<String>) -> JsonResult {
    let id = RoutineId::from(path.into_inner());
    match state.routines.get(&id) {
        Ok(Some(routine)) => ok(routine),
        Ok(None) => Ok(error_response(CoreError::not_found("routine", id.to_string()))),
        Err(err) => Ok(error_response(err)),
    }
}

pub async fn patch_routine(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<RoutinePatchRequest>,
) -> JsonResult {
    let id = RoutineId::from(path.into_inner());
    let mut routine = match state.routines.get(&id) {
        Ok(Some(r)) => r,
        Ok(None) => return Ok(error_response(CoreError::not_found("routine", id.to_string()))),
        Err(err) => return Ok(error_response(err)),
    };

    if let Some(name) = &body.name {
        routine.name = name.clone();
    }
    if let Some(enabled) = body.enabled {
        routine.enabled = enabled;
    }
    if let Some(timezone) = &body.timezone {
        routine.timezone = timezone.clone();
    }
    if let Some(behavior) = &body.holiday_behavior {
        match behavior.to_uppercase().as_str() {
            "SKIP" => routine.holiday_behavior = crate::domain::value_objects::HolidayBehavior::Skip,
            "DELAY" => routine.holiday_behavior = crate::domain::value_objects::HolidayBehavior::Delay,
            "RUN" => routine.holiday_behavior = crate::domain::value_objects::HolidayBehavior::Run,
            other => {
                return Ok(error_response(CoreError::Validation(format!(
                    "unknown holiday_behavior '{other}'"
                ))))
            }
        }
    }
    routine.updated_at = Utc::now();

    if let Err(err) = routine.validate() {
        return Ok(error_response(err));
    }
    match state.routines.update(&routine) {
        Ok(()) => ok(routine),
        Err(err) => Ok(error_response(err)),
    }
}

pub async fn delete_routine(state: web::Data<AppState>, path: web::Path<String>) -> JsonResult {
    let id = RoutineId::from(path.into_inner());
    match state.routines.delete(&id) {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(err) => Ok(error_response(err)),
    }
}

async fn load_routine(state: &AppState, id: &RoutineId) -> Result<Routine, CoreError> {
    state
        .routines
        .get(id)?
        .ok_or_else(|| CoreError::not_found("routine", id.to_string()))
}

pub async fn enable_routine(state: web::Data<AppState>, path: web::Path<String>) -> JsonResult {
    set_enabled(state, path, true).await
}

pub async fn disable_routine(state: web::Data<AppState>, path: web::Path<String>) -> JsonResult {
    set_enabled(state, path, false).await
}

async fn set_enabled(state: web::Data<AppState>, path: web::Path<String>, enabled: bool) -> JsonResult {
    let id = RoutineId::from(path.into_inner());
    let mut routine = match load_routine(&state, &id).await {
        Ok(r) => r,
        Err(err) => return Ok(error_response(err)),
    };
    routine.enabled = enabled;
    routine.updated_at = Utc::now();
    match state.routines.update(&routine) {
        Ok(()) => ok(routine),
        Err(err) => Ok(error_response(err)),
    }
}

pub async fn skip_routine(state: web::Data<AppState>, path: web::Path<String>) -> JsonResult {
    set_skip_next(state, path, true).await
}

pub async fn unskip_routine(state: web::Data<AppState>, path: web::Path<String>) -> JsonResult {
    set_skip_next(state, path, false).await
}

async fn set_skip_next(state: web::Data<AppState>, path: web::Path<String>, skip: bool) -> JsonResult {
    let id = RoutineId::from(path.into_inner());
    let mut routine = match load_routine(&state, &id).await {
        Ok(r) => r,
        Err(err) => return Ok(error_response(err)),
    };
    routine.skip_next = skip;
    routine.updated_at = Utc::now();
    match state.routines.update(&routine) {
        Ok(()) => ok(routine),
        Err(err) => Ok(error_response(err)),
    }
}

pub async fn snooze_routine(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<SnoozeRequest>,
) -> JsonResult {
    let id = RoutineId::from(path.into_inner());
    let until = match DateTime::parse_from_rfc3339(&body.until) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(err) => return Ok(error_response(CoreError::Validation(format!("bad until: {err}")))),
    };
    let mut routine = match load_routine(&state, &id).await {
        Ok(r) => r,
        Err(err) => return Ok(error_response(err)),
    };
    routine.snooze_until = Some(until);
    routine.updated_at = Utc::now();
    match state.routines.update(&routine) {
        Ok(()) => ok(routine),
        Err(err) => Ok(error_response(err)),
    }
}

pub async fn unsnooze_routine(state: web::Data<AppState>, path: web::Path<String>) -> JsonResult {
    let id = RoutineId::from(path.into_inner());
    let mut routine = match load_routine(&state, &id).await {
        Ok(r) => r,
        Err(err) => return Ok(error_response(err)),
    };
    routine.snooze_until = None;
    routine.updated_at = Utc::now();
    match state.routines.update(&routine) {
        Ok(()) => ok(routine),
        Err(err) => Ok(error_response(err)),
    }
}

/// Shared by `/trigger` and `/run`: inserts a job scheduled for now with
/// the `manual:{routine_id}:{nanos}` idempotency key (SPEC_FULL.md §6).
pub async fn trigger_routine(state: web::Data<AppState>, path: web::Path<String>) -> JsonResult {
    let id = RoutineId::from(path.into_inner());
    let routine = match load_routine(&state, &id).await {
        Ok(r) => r,
        Err(err) => return Ok(error_response(err)),
    };
    let now = Utc::now();
    let key = manual_idempotency_key(&routine.routine_id, now);
    let job = Job::new_pending(routine.routine_id, now, Some(key));
    match state.jobs.insert(&job) {
        Ok(()) => ok(job),
        Err(err) => Ok(error_response(err)),
    }
}

/// Dry-run: previews the next scheduled instant without inserting a job.
pub async fn test_routine(state: web::Data<AppState>, path: web::Path<String>) -> JsonResult {
    let id = RoutineId::from(path.into_inner());
    let routine = match load_routine(&state, &id).await {
        Ok(r) => r,
        Err(err) => return Ok(error_response(err)),
    };
    match schedule_calculator::next_run(&routine, Utc::now()) {
        Ok(next_run) => ok(TestRunResponse {
            routine_id: id.to_string(),
            next_run,
        }),
        Err(err) => Ok(error_response(err)),
    }
}

// --- Jobs ---------------------------------------------------------------

pub async fn get_job(state: web::Data<AppState>, path: web::Path<String>) -> JsonResult {
    let id = JobId::from(path.into_inner());
    match state.jobs.get(&id) {
        Ok(Some(job)) => ok(job),
        Ok(None) => Ok(error_response(CoreError::not_found("job", id.to_string()))),
        Err(err) => Ok(error_response(err)),
    }
}

pub async fn list_jobs_for_routine(state: web::Data<AppState>, path: web::Path<String>) -> JsonResult {
    let id = RoutineId::from(path.into_inner());
    match state.jobs.list_for_routine(&id) {
        Ok(jobs) => ok(jobs),
        Err(err) => Ok(error_response(err)),
    }
}

// --- Scenes ---------------------------------------------------------------

pub async fn create_scene(state: web::Data<AppState>, body: web::Json<Scene>) -> JsonResult {
    let scene = body.into_inner();
    if let Err(err) = scene.validate() {
        return Ok(error_response(err));
    }
    match state.scenes.insert(&scene) {
        Ok(()) => ok(scene),
        Err(err) => Ok(error_response(err)),
    }
}

pub async fn list_scenes(state: web::Data<AppState>) -> JsonResult {
    match state.scenes.list_all() {
        Ok(scenes) => ok(scenes),
        Err(err) => Ok(error_response(err)),
    }
}

pub async fn get_scene(state: web::Data<AppState>, path: web::Path<String>) -> JsonResult {
    let id = SceneId::from(path.into_inner());
    match state.scenes.get(&id) {
        Ok(Some(scene)) => ok(scene),
        Ok(None) => Ok(error_response(CoreError::not_found("scene", id.to_string()))),
        Err(err) => Ok(error_response(err)),
    }
}

// --- Executions -------------------------------------------------------

#[derive(serde::Deserialize)]
pub struct ExecutionsQuery {
    pub scene_id: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

pub async fn list_executions(state: web::Data<AppState>, query: web::Query<ExecutionsQuery>) -> JsonResult {
    let scene_id = SceneId::from(query.scene_id.clone());
    match state.executions.list_for_scene(&scene_id, query.limit) {
        Ok(executions) => ok(executions),
        Err(err) => Ok(error_response(err)),
    }
}

pub async fn get_execution(state: web::Data<AppState>, path: web::Path<String>) -> JsonResult {
    let id = SceneExecutionId::from(path.into_inner());
    match state.executions.get(&id) {
        Ok(Some(execution)) => ok(execution),
        Ok(None) => Ok(error_response(CoreError::not_found("scene_execution", id.to_string()))),
        Err(err) => Ok(error_response(err)),
    }
}

/// Re-runs the routine that produced a failed execution. Scene executions
/// do not themselves carry a routine back-reference (§3's data model
/// scopes them to a scene), so the caller names the routine explicitly;
/// this is otherwise identical to a manual trigger.
pub async fn retry_execution(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<ExecutionRetryRequest>,
) -> JsonResult {
    let execution_id = SceneExecutionId::from(path.into_inner());
    match state.executions.get(&execution_id) {
        Ok(Some(_)) => {}
        Ok(None) => return Ok(error_response(CoreError::not_found("scene_execution", execution_id.to_string()))),
        Err(err) => return Ok(error_response(err)),
    }
    trigger_routine(state, web::Path::from(body.routine_id.clone())).await
}

// --- Holidays -----------------------------------------------------------

pub async fn create_holiday(state: web::Data<AppState>, body: web::Json<HolidayCreateRequest>) -> JsonResult {
    let date: NaiveDate = match body.date.parse() {
        Ok(d) => d,
        Err(err) => return Ok(error_response(CoreError::Validation(format!("bad date: {err}")))),
    };
    let holiday = Holiday::new(date, body.name.clone(), body.is_custom);
    match state.holidays.insert(&holiday) {
        Ok(()) => ok(holiday),
        Err(err) => Ok(error_response(err)),
    }
}

pub async fn list_holidays(state: web::Data<AppState>, query: web::Query<HolidayRangeQuery>) -> JsonResult {
    let from: NaiveDate = match query.from.parse() {
        Ok(d) => d,
        Err(err) => return Ok(error_response(CoreError::Validation(format!("bad from: {err}")))),
    };
    let to: NaiveDate = match query.to.parse() {
        Ok(d) => d,
        Err(err) => return Ok(error_response(CoreError::Validation(format!("bad to: {err}")))),
    };
    match state.holidays.list_range(from, to) {
        Ok(holidays) => ok(holidays),
        Err(err) => Ok(error_response(err)),
    }
}

pub async fn check_holiday(state: web::Data<AppState>, query: web::Query<HolidayCheckQuery>) -> JsonResult {
    let date: NaiveDate = match query.date.parse() {
        Ok(d) => d,
        Err(err) => return Ok(error_response(CoreError::Validation(format!("bad date: {err}")))),
    };
    match state.holidays.is_holiday(date) {
        Ok(is_holiday) => ok(is_holiday),
        Err(err) => Ok(error_response(err)),
    }
}

pub async fn delete_holiday(state: web::Data<AppState>, path: web::Path<String>) -> JsonResult {
    let date: NaiveDate = match path.parse() {
        Ok(d) => d,
        Err(err) => return Ok(error_response(CoreError::Validation(format!("bad date: {err}")))),
    };
    match state.holidays.delete(date) {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(err) => Ok(error_response(err)),
    }
}
