//! HTTP server
//!
//! Binds actix-web to the routes enumerated in SPEC_FULL.md §6. The surface
//! is intentionally unauthenticated and stateless beyond the shared
//! repository handles in [`AppState`] — no session, no middleware beyond
//! CORS and request logging.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use tracing::info;

use crate::domain::repositories::{
    HolidayRepository, JobRepository, RoutineRepository, SceneExecutionRepository, SceneRepository,
};
use crate::web::{config::WebConfig, handlers};

pub struct AppState {
    pub routines: Arc<dyn RoutineRepository>,
    pub jobs: Arc<dyn JobRepository>,
    pub scenes: Arc<dyn SceneRepository>,
    pub holidays: Arc<dyn HolidayRepository>,
    pub executions: Arc<dyn SceneExecutionRepository>,
}

pub async fn start_web_server(
    config: WebConfig,
    routines: Arc<dyn RoutineRepository>,
    jobs: Arc<dyn JobRepository>,
    scenes: Arc<dyn SceneRepository>,
    holidays: Arc<dyn HolidayRepository>,
    executions: Arc<dyn SceneExecutionRepository>,
) -> std::io::Result<()> {
    info!(host = %config.host, port = config.port, "starting HTTP surface");

    let state = web::Data::new(AppState {
        routines,
        jobs,
        scenes,
        holidays,
        executions,
    });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Cors::permissive())
            .route("/health", web::get().to(handlers::health_check))
            .service(
                web::scope("/routines")
                    .route("", web::post().to(handlers::create_routine))
                    .route("", web::get().to(handlers::list_routines))
                    .route("/{id}", web::get().to(handlers::get_routine))
                    .route("/{id}", web::patch().to(handlers::patch_routine))
                    .route("/{id}", web::delete().to(handlers::delete_routine))
                    .route("/{id}/enable", web::post().to(handlers::enable_routine))
                    .route("/{id}/disable", web::post().to(handlers::disable_routine))
                    .route("/{id}/trigger", web::post().to(handlers::trigger_routine))
                    .route("/{id}/run", web::post().to(handlers::trigger_routine))
                    .route("/{id}/test", web::post().to(handlers::test_routine))
                    .route("/{id}/snooze", web::post().to(handlers::snooze_routine))
                    .route("/{id}/unsnooze", web::post().to(handlers::unsnooze_routine))
                    .route("/{id}/skip", web::post().to(handlers::skip_routine))
                    .route("/{id}/unskip", web::post().to(handlers::unskip_routine))
                    .route("/{id}/jobs", web::get().to(handlers::list_jobs_for_routine)),
            )
            .service(
                web::scope("/scenes")
                    .route("", web::post().to(handlers::create_scene))
                    .route("", web::get().to(handlers::list_scenes))
                    .route("/{id}", web::get().to(handlers::get_scene)),
            )
            .service(web::resource("/jobs/{id}").route(web::get().to(handlers::get_job)))
            .service(
                web::scope("/executions")
                    .route("", web::get().to(handlers::list_executions))
                    .route("/{id}", web::get().to(handlers::get_execution))
                    .route("/{id}/retry", web::post().to(handlers::retry_execution)),
            )
            .service(
                web::scope("/holidays")
                    .route("", web::post().to(handlers::create_holiday))
                    .route("", web::get().to(handlers::list_holidays))
                    .route("/check", web::get().to(handlers::check_holiday))
                    .route("/{date}", web::delete().to(handlers::delete_holiday)),
            )
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
