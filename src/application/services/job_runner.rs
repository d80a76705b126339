//! Job Runner (C8)
//!
//! The single process-wide polling loop: claims due jobs, loads the
//! routine and scene behind each one, resolves music, and hands off to the
//! [`SceneExecutor`]. Failures retry with exponential backoff up to
//! `max_retries`; a crash mid-claim is recovered at startup by
//! `recover_stale_claims`.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::domain::entities::{job::manual_idempotency_key, Job, Routine};
use crate::domain::repositories::{JobRepository, RoutineRepository, SceneExecutionRepository, SceneRepository};
use crate::domain::value_objects::{JobStatus, MusicContent, RoutineId, TvPolicy};
use crate::error::{CoreError, CoreResult};
use crate::infrastructure::music::MusicResolver;
use crate::infrastructure::rpc::EndpointRpc;
use crate::infrastructure::topology::TopologyCache;

use super::clock::Clock;
use super::coordinator_lock::CoordinatorLock;
use super::scene_executor::{SceneExecutor, SceneExecutorOptions};

pub struct JobRunnerConfig {
    pub poll_interval: StdDuration,
    pub max_retries: u32,
    pub stale_claim_timeout: StdDuration,
    pub max_pending_fetch: u32,
    pub lock_acquire_timeout: StdDuration,
    pub preflight_max_retries: u32,
}

pub struct JobRunner {
    clock: Arc<dyn Clock>,
    jobs: Arc<dyn JobRepository>,
    routines: Arc<dyn RoutineRepository>,
    scenes: Arc<dyn SceneRepository>,
    executions: Arc<dyn SceneExecutionRepository>,
    music_resolver: Arc<dyn MusicResolver>,
    rpc: Arc<dyn EndpointRpc>,
    topology: Arc<dyn TopologyCache>,
    lock: Arc<CoordinatorLock>,
    config: JobRunnerConfig,
}

impl JobRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clock: Arc<dyn Clock>,
        jobs: Arc<dyn JobRepository>,
        routines: Arc<dyn RoutineRepository>,
        scenes: Arc<dyn SceneRepository>,
        executions: Arc<dyn SceneExecutionRepository>,
        music_resolver: Arc<dyn MusicResolver>,
        rpc: Arc<dyn EndpointRpc>,
        topology: Arc<dyn TopologyCache>,
        lock: Arc<CoordinatorLock>,
        config: JobRunnerConfig,
    ) -> Self {
        Self {
            clock,
            jobs,
            routines,
            scenes,
            executions,
            music_resolver,
            rpc,
            topology,
            lock,
            config,
        }
    }

    /// Runs the poll loop until `shutdown` is cancelled, recovering stale
    /// claims once up front.
    pub async fn run(&self, shutdown: CancellationToken) {
        if let Err(err) = self.recover_stale_claims() {
            error!(error = %err, "stale claim recovery failed at startup");
        }

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("job runner shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.tick().await {
                        error!(error = %err, "job runner tick failed");
                    }
                }
            }
        }
    }

    /// Recovers jobs stuck in CLAIMED or RUNNING past the stale-claim
    /// timeout, returning them to PENDING (or FAILED, if retries are
    /// exhausted) via the normal `fail` transition.
    pub fn recover_stale_claims(&self) -> CoreResult<u32> {
        let now = self.clock.now();
        let cutoff = now - chrono::Duration::from_std(self.config.stale_claim_timeout).unwrap_or_default();
        let mut recovered = 0u32;

        for status in [JobStatus::Claimed, JobStatus::Running] {
            for job in self.jobs.list_stale_claims(status, cutoff)? {
                let can_retry = job.attempts + 1 < self.config.max_retries;
                let retry_after = can_retry.then(|| now + Job::backoff_after(job.attempts));
                self.jobs.fail(&job.job_id, "stale claim timeout", can_retry, retry_after)?;
                recovered += 1;
            }
        }

        if recovered > 0 {
            warn!(recovered, "recovered stale job claims at startup");
        }
        Ok(recovered)
    }

    /// One poll tick: fetches due PENDING jobs and executes each, returning
    /// the count processed.
    pub async fn tick(&self) -> CoreResult<u32> {
        let now = self.clock.now();
        let pending = self.jobs.list_pending(self.config.max_pending_fetch)?;
        let mut processed = 0u32;

        for job in pending {
            if !job.is_due(now) {
                continue;
            }
            self.run_job(job, now).await;
            processed += 1;
        }

        Ok(processed)
    }

    async fn run_job(&self, job: Job, now: chrono::DateTime<Utc>) {
        match self.jobs.claim(&job.job_id, now) {
            Ok(true) => {}
            Ok(false) => return,
            Err(err) => {
                error!(job_id = %job.job_id, error = %err, "claim failed");
                return;
            }
        }

        if let Err(err) = self.jobs.start(&job.job_id) {
            error!(job_id = %job.job_id, error = %err, "start transition failed");
            return;
        }

        match self.execute_claimed_job(&job).await {
            Ok(scene_execution_id) => {
                if let Err(err) = self.jobs.complete(&job.job_id, scene_execution_id) {
                    error!(job_id = %job.job_id, error = %err, "complete transition failed");
                    return;
                }
                if let Err(err) = self.routines.touch_last_run(&job.routine_id, now) {
                    warn!(routine_id = %job.routine_id, error = %err, "failed to touch last_run_at");
                }
            }
            Err(err) => {
                // SPEC_FULL.md §4.C8 step 3 / §7: a missing routine can never
                // succeed on retry, so it fails permanently on first sight
                // rather than burning through the backoff ladder.
                let routine_missing = matches!(&err, CoreError::NotFound { entity: "routine", .. });
                let can_retry = !routine_missing && job.attempts + 1 < self.config.max_retries;
                let retry_after = can_retry.then(|| now + Job::backoff_after(job.attempts));
                if let Err(fail_err) = self.jobs.fail(&job.job_id, &err.to_string(), can_retry, retry_after) {
                    error!(job_id = %job.job_id, error = %fail_err, "fail transition failed");
                }
            }
        }
    }

    async fn execute_claimed_job(
        &self,
        job: &Job,
    ) -> CoreResult<crate::domain::value_objects::SceneExecutionId> {
        let routine = self
            .routines
            .get(&job.routine_id)?
            .ok_or_else(|| CoreError::not_found("routine", job.routine_id.to_string()))?;

        let scene = self
            .scenes
            .get(&routine.scene_id)?
            .ok_or_else(|| CoreError::not_found("scene", routine.scene_id.to_string()))?;

        let options = self.build_executor_options(&routine).await?;

        let executor = SceneExecutor::new(
            self.rpc.as_ref(),
            self.topology.as_ref(),
            self.lock.as_ref(),
            self.executions.as_ref(),
            self.config.lock_acquire_timeout,
            self.config.preflight_max_retries,
        );

        let execution = executor.execute(&scene, job.idempotency_key.clone(), options).await?;
        Ok(execution.scene_execution_id)
    }

    async fn build_executor_options(&self, routine: &Routine) -> CoreResult<SceneExecutorOptions> {
        let mut options = SceneExecutorOptions::default();

        if let Some(tv_policy) = parse_tv_policy(routine.music_policy.fallback_behavior.as_deref()) {
            options.tv_policy = tv_policy;
        }

        let content = resolve_music_content(routine);
        if let Some(content) = content {
            match self.music_resolver.resolve(&content).await {
                Ok(resolved) => options.music_content = Some(resolved),
                Err(err) => {
                    warn!(routine_id = %routine.routine_id, error = %err, "music resolution failed, proceeding without content");
                }
            }
        }

        options.favorite_id = routine.music_policy.favorite_id.clone();
        Ok(options)
    }

    /// Manual trigger use case (`trigger` CLI subcommand / `POST
    /// /routines/{id}/trigger`): creates a PENDING job for immediate pickup
    /// by the next poll tick, without bypassing Claim/Start.
    pub fn trigger_manual(&self, routine_id: &RoutineId) -> CoreResult<crate::domain::value_objects::JobId> {
        let now = self.clock.now();
        let routine = self
            .routines
            .get(routine_id)?
            .ok_or_else(|| CoreError::not_found("routine", routine_id.to_string()))?;

        let key = manual_idempotency_key(&routine.routine_id, now);
        let job = Job::new_pending(routine.routine_id, now, Some(key));
        let job_id = job.job_id.clone();
        self.jobs.insert(&job)?;
        Ok(job_id)
    }
}

fn resolve_music_content(routine: &Routine) -> Option<MusicContent> {
    if let Some(blob) = &routine.music_policy.content_blob {
        if let Ok(content) = serde_json::from_str::<MusicContent>(blob) {
            return Some(content);
        }
    }
    routine.music_policy.favorite_id.as_ref().map(|favorite_id| MusicContent::SonosFavorite {
        id: favorite_id.clone(),
        name: routine.name.clone(),
        artwork: None,
        service: None,
    })
}

fn parse_tv_policy(raw: Option<&str>) -> Option<TvPolicy> {
    match raw?.to_uppercase().as_str() {
        "SKIP" => Some(TvPolicy::Skip),
        "USE_FALLBACK" => Some(TvPolicy::UseFallback),
        "ALWAYS_PLAY" => Some(TvPolicy::AlwaysPlay),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::application::services::clock::FixedClock;
    use crate::domain::entities::{Scene, SceneExecution, SceneMember};
    use crate::domain::value_objects::{JobId, SceneExecutionId, SceneId};
    use crate::infrastructure::music::{MusicResolveError, ResolvedMusic};
    use crate::infrastructure::rpc::MockEndpointRpc;
    use crate::infrastructure::topology::StaticTopologyCache;

    use super::*;

    #[derive(Default)]
    struct InMemoryJobs(Mutex<Vec<Job>>);
    impl JobRepository for InMemoryJobs {
        fn insert(&self, job: &Job) -> CoreResult<()> {
            self.0.lock().unwrap().push(job.clone());
            Ok(())
        }
        fn get(&self, id: &JobId) -> CoreResult<Option<Job>> {
            Ok(self.0.lock().unwrap().iter().find(|j| &j.job_id == id).cloned())
        }
        fn get_by_idempotency_key(&self, key: &str) -> CoreResult<Option<Job>> {
            Ok(self.0.lock().unwrap().iter().find(|j| j.idempotency_key.as_deref() == Some(key)).cloned())
        }
        fn list_for_routine(&self, routine_id: &RoutineId) -> CoreResult<Vec<Job>> {
            Ok(self.0.lock().unwrap().iter().filter(|j| &j.routine_id == routine_id).cloned().collect())
        }
        fn list_pending(&self, _limit: u32) -> CoreResult<Vec<Job>> {
            Ok(self.0.lock().unwrap().iter().filter(|j| j.status == JobStatus::Pending).cloned().collect())
        }
        fn list_stale_claims(&self, _status: JobStatus, _older_than: chrono::DateTime<Utc>) -> CoreResult<Vec<Job>> {
            Ok(Vec::new())
        }
        fn claim(&self, id: &JobId, now: chrono::DateTime<Utc>) -> CoreResult<bool> {
            let mut jobs = self.0.lock().unwrap();
            if let Some(job) = jobs.iter_mut().find(|j| &j.job_id == id) {
                if job.status == JobStatus::Pending {
                    job.status = JobStatus::Claimed;
                    job.claimed_at = Some(now);
                    return Ok(true);
                }
            }
            Ok(false)
        }
        fn start(&self, id: &JobId) -> CoreResult<()> {
            let mut jobs = self.0.lock().unwrap();
            if let Some(job) = jobs.iter_mut().find(|j| &j.job_id == id) {
                job.status = JobStatus::Running;
            }
            Ok(())
        }
        fn complete(&self, id: &JobId, scene_execution_id: SceneExecutionId) -> CoreResult<()> {
            let mut jobs = self.0.lock().unwrap();
            if let Some(job) = jobs.iter_mut().find(|j| &j.job_id == id) {
                job.status = JobStatus::Completed;
                job.scene_execution_id = Some(scene_execution_id);
            }
            Ok(())
        }
        fn fail(&self, id: &JobId, message: &str, can_retry: bool, retry_after: Option<chrono::DateTime<Utc>>) -> CoreResult<()> {
            let mut jobs = self.0.lock().unwrap();
            if let Some(job) = jobs.iter_mut().find(|j| &j.job_id == id) {
                job.attempts += 1;
                job.last_error = Some(message.to_string());
                if can_retry {
                    job.status = JobStatus::Pending;
                    job.claimed_at = None;
                    job.retry_after = retry_after;
                } else {
                    job.status = JobStatus::Failed;
                }
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct InMemoryRoutines(Mutex<Vec<Routine>>);
    impl RoutineRepository for InMemoryRoutines {
        fn insert(&self, routine: &Routine) -> CoreResult<()> {
            self.0.lock().unwrap().push(routine.clone());
            Ok(())
        }
        fn update(&self, _: &Routine) -> CoreResult<()> {
            Ok(())
        }
        fn get(&self, id: &RoutineId) -> CoreResult<Option<Routine>> {
            Ok(self.0.lock().unwrap().iter().find(|r| &r.routine_id == id).cloned())
        }
        fn delete(&self, _: &RoutineId) -> CoreResult<()> {
            Ok(())
        }
        fn list_all(&self) -> CoreResult<Vec<Routine>> {
            Ok(self.0.lock().unwrap().clone())
        }
        fn list_eligible(&self, now: chrono::DateTime<Utc>) -> CoreResult<Vec<Routine>> {
            Ok(self.0.lock().unwrap().iter().filter(|r| r.is_eligible(now)).cloned().collect())
        }
        fn touch_last_run(&self, id: &RoutineId, at: chrono::DateTime<Utc>) -> CoreResult<()> {
            let mut routines = self.0.lock().unwrap();
            if let Some(routine) = routines.iter_mut().find(|r| &r.routine_id == id) {
                routine.last_run_at = Some(at);
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct InMemoryScenes(Mutex<Vec<Scene>>);
    impl SceneRepository for InMemoryScenes {
        fn insert(&self, scene: &Scene) -> CoreResult<()> {
            self.0.lock().unwrap().push(scene.clone());
            Ok(())
        }
        fn update(&self, _: &Scene) -> CoreResult<()> {
            Ok(())
        }
        fn get(&self, id: &SceneId) -> CoreResult<Option<Scene>> {
            Ok(self.0.lock().unwrap().iter().find(|s| &s.scene_id == id).cloned())
        }
        fn delete(&self, _: &SceneId) -> CoreResult<()> {
            Ok(())
        }
        fn list_all(&self) -> CoreResult<Vec<Scene>> {
            Ok(self.0.lock().unwrap().clone())
        }
    }

    #[derive(Default)]
    struct InMemoryExecutions(Mutex<Vec<SceneExecution>>);
    impl SceneExecutionRepository for InMemoryExecutions {
        fn insert(&self, execution: &SceneExecution) -> CoreResult<()> {
            self.0.lock().unwrap().push(execution.clone());
            Ok(())
        }
        fn update(&self, _: &SceneExecution) -> CoreResult<()> {
            Ok(())
        }
        fn get(&self, id: &SceneExecutionId) -> CoreResult<Option<SceneExecution>> {
            Ok(self.0.lock().unwrap().iter().find(|e| &e.scene_execution_id == id).cloned())
        }
        fn get_by_idempotency_key(&self, key: &str) -> CoreResult<Option<SceneExecution>> {
            Ok(self.0.lock().unwrap().iter().find(|e| e.idempotency_key.as_deref() == Some(key)).cloned())
        }
        fn list_for_scene(&self, scene_id: &SceneId, _limit: u32) -> CoreResult<Vec<SceneExecution>> {
            Ok(self.0.lock().unwrap().iter().filter(|e| &e.scene_id == scene_id).cloned().collect())
        }
    }

    struct StubResolver;
    #[async_trait::async_trait]
    impl MusicResolver for StubResolver {
        async fn resolve(&self, content: &MusicContent) -> Result<ResolvedMusic, MusicResolveError> {
            match content {
                MusicContent::SonosFavorite { id, .. } => Ok(ResolvedMusic {
                    uri: format!("x-rincon-cpcontainer:{id}"),
                    metadata: "favorite".to_string(),
                    uses_queue: true,
                }),
                _ => Err(MusicResolveError::NotFound),
            }
        }
    }

    fn routine_with_scene(scene_id: SceneId) -> Routine {
        use crate::domain::value_objects::ScheduleType;
        let mut r = Routine::new("Morning Jazz".to_string(), "UTC".to_string(), ScheduleType::Once, scene_id);
        r.music_policy.favorite_id = Some("42".to_string());
        r
    }

    fn scene_with_coordinator(id: &str) -> Scene {
        let mut scene = Scene::new("Living Room".to_string());
        scene.members.push(SceneMember::new(id.to_string()));
        scene
    }

    fn build_runner(
        jobs: Arc<InMemoryJobs>,
        routines: Arc<InMemoryRoutines>,
        scenes: Arc<InMemoryScenes>,
        executions: Arc<InMemoryExecutions>,
        rpc: Arc<dyn EndpointRpc>,
        now: chrono::DateTime<Utc>,
    ) -> JobRunner {
        let topology = StaticTopologyCache::new();
        topology.seed(crate::infrastructure::topology::TopologyEntry {
            endpoint_id: "coord-1".to_string(),
            ip: "10.0.0.5".to_string(),
            room_name: "Living Room".to_string(),
            model: "arc".to_string(),
        });
        JobRunner::new(
            Arc::new(FixedClock(now)),
            jobs,
            routines,
            scenes,
            executions,
            Arc::new(StubResolver),
            rpc,
            Arc::new(topology),
            Arc::new(CoordinatorLock::new()),
            JobRunnerConfig {
                poll_interval: StdDuration::from_secs(10),
                max_retries: 3,
                stale_claim_timeout: StdDuration::from_secs(300),
                max_pending_fetch: 100,
                lock_acquire_timeout: StdDuration::from_secs(1),
                preflight_max_retries: 0,
            },
        )
    }

    #[tokio::test]
    async fn successful_job_completes_and_touches_last_run() {
        let now = Utc::now();
        let scene = scene_with_coordinator("coord-1");
        let routine = routine_with_scene(scene.scene_id.clone());

        let jobs = Arc::new(InMemoryJobs::default());
        let routines = Arc::new(InMemoryRoutines::default());
        routines.insert(&routine).unwrap();
        let scenes = Arc::new(InMemoryScenes::default());
        scenes.insert(&scene).unwrap();
        let executions = Arc::new(InMemoryExecutions::default());

        let mut rpc = MockEndpointRpc::new();
        rpc.expect_get_zone_attributes()
            .returning(|_| Ok(crate::infrastructure::rpc::ZoneAttributes { name: "c".to_string(), is_coordinator: true }));
        rpc.expect_get_transport_info()
            .returning(|_| Ok(crate::infrastructure::rpc::TransportInfo { state: crate::infrastructure::rpc::TransportState::Playing }));
        rpc.expect_get_media_info()
            .returning(|_| Ok(crate::infrastructure::rpc::MediaInfo { current_uri: "x-rincon-queue:RINCON_SELF#0".to_string() }));
        rpc.expect_remove_all_tracks_from_queue().returning(|_| Ok(()));
        rpc.expect_set_av_transport_uri().returning(|_, _, _| Ok(()));
        rpc.expect_play().returning(|_| Ok(()));
        rpc.expect_get_position_info().returning(|_| Ok(crate::infrastructure::rpc::PositionInfo { track_uri: None }));

        let job = Job::new_pending(routine.routine_id.clone(), now, None);
        jobs.insert(&job).unwrap();

        let runner = build_runner(jobs.clone(), routines.clone(), scenes, executions, Arc::new(rpc), now);
        let processed = runner.tick().await.unwrap();
        assert_eq!(processed, 1);

        let stored = jobs.0.lock().unwrap();
        let stored_job = stored.first().unwrap();
        assert_eq!(stored_job.status, JobStatus::Completed);
        assert!(stored_job.scene_execution_id.is_some());
        assert!(routines.0.lock().unwrap().first().unwrap().last_run_at.is_some());
    }

    #[tokio::test]
    async fn missing_routine_fails_job_permanently_on_first_attempt() {
        let now = Utc::now();
        let jobs = Arc::new(InMemoryJobs::default());
        let routines = Arc::new(InMemoryRoutines::default());
        let scenes = Arc::new(InMemoryScenes::default());
        let executions = Arc::new(InMemoryExecutions::default());
        let rpc = MockEndpointRpc::new();

        let job = Job::new_pending(RoutineId::new(), now, None);
        jobs.insert(&job).unwrap();

        // Default max_retries (3): a routine-not-found must still fail
        // permanently on the very first attempt, not after exhausting it.
        let runner = build_runner(jobs.clone(), routines, scenes, executions, Arc::new(rpc), now);
        runner.tick().await.unwrap();

        let stored = jobs.0.lock().unwrap();
        let stored_job = stored.first().unwrap();
        assert_eq!(stored_job.status, JobStatus::Failed);
        assert_eq!(stored_job.attempts, 1);
    }

    #[test]
    fn trigger_manual_creates_pending_job_with_manual_key() {
        let now = Utc::now();
        let routine = routine_with_scene(SceneId::new());
        let jobs = Arc::new(InMemoryJobs::default());
        let routines = Arc::new(InMemoryRoutines::default());
        routines.insert(&routine).unwrap();
        let scenes = Arc::new(InMemoryScenes::default());
        let executions = Arc::new(InMemoryExecutions::default());
        let rpc: Arc<dyn EndpointRpc> = Arc::new(MockEndpointRpc::new());

        let runner = build_runner(jobs.clone(), routines, scenes, executions, rpc, now);
        let job_id = runner.trigger_manual(&routine.routine_id).unwrap();

        let stored = jobs.0.lock().unwrap();
        let stored_job = stored.iter().find(|j| j.job_id == job_id).unwrap();
        assert_eq!(stored_job.status, JobStatus::Pending);
        assert!(stored_job.idempotency_key.as_deref().unwrap().starts_with("manual:"));
    }
}
