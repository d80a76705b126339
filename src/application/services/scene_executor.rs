//! Scene Executor (C11)
//!
//! Drives the eight-step state machine that applies a scene on a resolved
//! coordinator: pick the coordinator, hold its lock for the duration of the
//! critical section, group the other members in, push volumes, clear any
//! blocking endpoint state, start playback, and verify it stuck. Every step
//! is recorded on the [`SceneExecution`] audit trail regardless of outcome.

use std::time::Duration as StdDuration;

use chrono::Utc;
use serde::Serialize;

use crate::domain::entities::{CoordinatorPreference, Scene, SceneExecution, SceneMember};
use crate::domain::repositories::SceneExecutionRepository;
use crate::domain::value_objects::{
    GroupBehavior, QueueMode, SceneExecutionStatus, StepName, TvPolicy,
};
use crate::error::{CoreError, CoreResult, PreflightIssueKind};
use crate::infrastructure::music::ResolvedMusic;
use crate::infrastructure::rpc::{EndpointRpc, RpcError, TransportState};
use crate::infrastructure::topology::{TopologyCache, ARC_FIRST_MODELS};

use super::coordinator_lock::CoordinatorLock;
use super::preflight_checker::{create_error, PreflightChecker};

const TV_STREAM_SCHEME: &str = "x-sonos-htastream:";

/// Per-call configuration the Job Runner resolves before invoking the
/// executor, per SPEC_FULL.md §4.C11.
#[derive(Debug, Clone)]
pub struct SceneExecutorOptions {
    pub music_content: Option<ResolvedMusic>,
    pub favorite_id: Option<String>,
    pub queue_mode: QueueMode,
    pub group_behavior: GroupBehavior,
    pub tv_policy: TvPolicy,
}

impl Default for SceneExecutorOptions {
    fn default() -> Self {
        Self {
            music_content: None,
            favorite_id: None,
            queue_mode: QueueMode::ReplaceAndPlay,
            group_behavior: GroupBehavior::AutoRedirect,
            tv_policy: TvPolicy::UseFallback,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct CoordinatorHandle {
    endpoint_id: String,
    ip: String,
    room_name: String,
}

pub struct SceneExecutor<'a> {
    rpc: &'a dyn EndpointRpc,
    topology: &'a dyn TopologyCache,
    lock: &'a CoordinatorLock,
    executions: &'a dyn SceneExecutionRepository,
    lock_timeout: StdDuration,
    preflight_max_retries: u32,
}

impl<'a> SceneExecutor<'a> {
    pub fn new(
        rpc: &'a dyn EndpointRpc,
        topology: &'a dyn TopologyCache,
        lock: &'a CoordinatorLock,
        executions: &'a dyn SceneExecutionRepository,
        lock_timeout: StdDuration,
        preflight_max_retries: u32,
    ) -> Self {
        Self {
            rpc,
            topology,
            lock,
            executions,
            lock_timeout,
            preflight_max_retries,
        }
    }

    /// Applies `scene`, reusing a prior execution sharing `idempotency_key`
    /// if one already exists rather than re-running it.
    pub async fn execute(
        &self,
        scene: &Scene,
        idempotency_key: Option<String>,
        options: SceneExecutorOptions,
    ) -> CoreResult<SceneExecution> {
        if let Some(key) = &idempotency_key {
            if let Some(existing) = self.executions.get_by_idempotency_key(key)? {
                return Ok(existing);
            }
        }

        let mut execution = SceneExecution::new(scene.scene_id.clone(), idempotency_key);

        let coordinator = match self.determine_coordinator(scene, &options, &mut execution).await {
            Ok(handle) => handle,
            Err(err) => {
                execution.fail(err.to_string());
                self.executions.insert(&execution)?;
                return Err(err);
            }
        };
        execution.coordinator_used = Some(coordinator.endpoint_id.clone());

        execution.start_step(StepName::AcquireLock);
        let coordinator_id = coordinator.endpoint_id.clone();
        let lock_outcome = self
            .lock
            .with_lock(&coordinator_id, self.lock_timeout, |_guard| {
                self.run_locked_steps(&mut execution, scene, &coordinator, &options)
            })
            .await;

        // Keeps the typed error kind (§7) alongside the execution's stored
        // message, so callers can distinguish e.g. CoordinatorLocked from
        // EndpointRejected rather than seeing everything as Internal.
        let failure: Option<CoreError> = match lock_outcome {
            Some(Ok(verification)) => {
                execution.finalize_from_verification(verification);
                None
            }
            Some(Err(err)) => {
                execution.skip_step(StepName::ReleaseLock);
                execution.fail(err.to_string());
                Some(err)
            }
            None => {
                let err = CoreError::CoordinatorLocked {
                    endpoint_id: coordinator_id,
                };
                execution.fail_step(StepName::AcquireLock, err.to_string(), None);
                execution.skip_step(StepName::ReleaseLock);
                execution.fail(err.to_string());
                Some(err)
            }
        };

        self.executions.insert(&execution)?;

        match failure {
            Some(err) => Err(err),
            None => Ok(execution),
        }
    }

    /// Steps 2 (completion bookkeeping) through 8, run while the
    /// coordinator's lock guard is held.
    async fn run_locked_steps(
        &self,
        execution: &mut SceneExecution,
        scene: &Scene,
        coordinator: &CoordinatorHandle,
        options: &SceneExecutorOptions,
    ) -> CoreResult<crate::domain::entities::VerificationResult> {
        execution.complete_step(StepName::AcquireLock, None);

        self.ensure_group(scene, coordinator, options, execution).await;
        self.apply_volume(scene, execution).await;
        self.pre_flight_check(coordinator, options, execution).await?;
        self.start_playback(coordinator, options, execution).await?;
        let verification = self.verify_playback(coordinator, execution).await;

        execution.complete_step(StepName::ReleaseLock, None);
        Ok(verification)
    }

    /// Step 1: pick the coordinator. ARC_FIRST scans for a soundbar-class
    /// member first, then falls back to scene order; a candidate in TV mode
    /// is skipped when `tv_policy = SKIP`.
    async fn determine_coordinator(
        &self,
        scene: &Scene,
        options: &SceneExecutorOptions,
        execution: &mut SceneExecution,
    ) -> CoreResult<CoordinatorHandle> {
        execution.start_step(StepName::DetermineCoordinator);

        let candidates: Vec<&SceneMember> = if scene.coordinator_preference == CoordinatorPreference::ArcFirst {
            let mut ordered: Vec<&SceneMember> = scene
                .members
                .iter()
                .filter(|m| {
                    self.topology
                        .get_by_id(&m.endpoint_id)
                        .map(|e| ARC_FIRST_MODELS.contains(&e.model.to_lowercase().as_str()))
                        .unwrap_or(false)
                })
                .collect();
            for member in &scene.members {
                if !ordered.iter().any(|c| c.endpoint_id == member.endpoint_id) {
                    ordered.push(member);
                }
            }
            ordered
        } else {
            scene.members.iter().collect()
        };

        for candidate in candidates {
            let Some(entry) = self.topology.get_by_id(&candidate.endpoint_id) else {
                continue;
            };

            if options.tv_policy == TvPolicy::Skip {
                if let Ok(media) = self.rpc.get_media_info(&entry.ip).await {
                    if media.current_uri.contains(TV_STREAM_SCHEME) {
                        continue;
                    }
                }
            }

            let handle = CoordinatorHandle {
                endpoint_id: entry.endpoint_id,
                ip: entry.ip,
                room_name: entry.room_name,
            };
            execution.complete_step(StepName::DetermineCoordinator, serde_json::to_value(&handle).ok());
            return Ok(handle);
        }

        let err = CoreError::Validation("no eligible coordinator found among scene members".to_string());
        execution.fail_step(StepName::DetermineCoordinator, err.to_string(), None);
        Err(err)
    }

    /// Step 3: joins non-coordinator members to the coordinator's group.
    /// Per-member failures are recorded in `details`, never fatal.
    async fn ensure_group(
        &self,
        scene: &Scene,
        coordinator: &CoordinatorHandle,
        options: &SceneExecutorOptions,
        execution: &mut SceneExecution,
    ) {
        execution.start_step(StepName::EnsureGroup);
        let mut details = serde_json::Map::new();

        for member in &scene.members {
            if member.endpoint_id == coordinator.endpoint_id {
                continue;
            }

            let Some(ip) = self.resolve_member_ip(member) else {
                details.insert(member.endpoint_id.clone(), serde_json::Value::String("unresolved".to_string()));
                continue;
            };

            if options.group_behavior == GroupBehavior::AutoRedirect {
                if let Ok(attrs) = self.rpc.get_zone_attributes(&ip).await {
                    if !attrs.is_coordinator {
                        details.insert(
                            member.endpoint_id.clone(),
                            serde_json::Value::String("already_grouped".to_string()),
                        );
                        continue;
                    }
                }
            }

            let group_uri = format!("x-rincon:{}", coordinator.endpoint_id);
            let outcome = match self.rpc.set_av_transport_uri(&ip, &group_uri, "").await {
                Ok(()) => "joined".to_string(),
                Err(err) => format!("error: {err}"),
            };
            details.insert(member.endpoint_id.clone(), serde_json::Value::String(outcome));
        }

        execution.complete_step(StepName::EnsureGroup, Some(serde_json::Value::Object(details)));
    }

    /// Step 4: applies each member's target volume. Per-member failures are
    /// recorded, never fatal.
    async fn apply_volume(&self, scene: &Scene, execution: &mut SceneExecution) {
        execution.start_step(StepName::ApplyVolume);
        let mut details = serde_json::Map::new();

        for member in &scene.members {
            let Some(volume) = member.target_volume else {
                continue;
            };
            let outcome = match self.resolve_member_ip(member) {
                Some(ip) => match self.rpc.set_volume(&ip, volume).await {
                    Ok(()) => "applied".to_string(),
                    Err(err) => format!("error: {err}"),
                },
                None => "unresolved".to_string(),
            };
            details.insert(member.endpoint_id.clone(), serde_json::Value::String(outcome));
        }

        execution.complete_step(StepName::ApplyVolume, Some(serde_json::Value::Object(details)));
    }

    /// Step 5: runs Preflight against the coordinator, dispatching an
    /// auto-fix per `tv_policy` for a TV_MODE block and re-checking once.
    async fn pre_flight_check(
        &self,
        coordinator: &CoordinatorHandle,
        options: &SceneExecutorOptions,
        execution: &mut SceneExecution,
    ) -> CoreResult<()> {
        execution.start_step(StepName::PreFlightCheck);
        let checker = PreflightChecker::new(self.rpc);
        let mut result = checker
            .check(&coordinator.ip, Some(&coordinator.room_name), self.preflight_max_retries)
            .await;

        if !result.can_proceed {
            let issue = result.issue.clone().expect("a blocked result always carries an issue");
            let should_fix = match issue.kind {
                PreflightIssueKind::TvMode => !matches!(options.tv_policy, TvPolicy::Skip),
                _ => issue.auto_fixable,
            };

            if should_fix && checker.attempt_auto_fix(&coordinator.ip, &issue).await.is_ok() {
                result = checker
                    .check(&coordinator.ip, Some(&coordinator.room_name), self.preflight_max_retries)
                    .await;
            }

            if !result.can_proceed {
                let issue = result.issue.clone().expect("a blocked result always carries an issue");
                let err = create_error(&issue);
                execution.fail_step(
                    StepName::PreFlightCheck,
                    err.to_string(),
                    Some(serde_json::json!({ "issue_kind": format!("{:?}", issue.kind) })),
                );
                return Err(err);
            }
        }

        execution.complete_step(StepName::PreFlightCheck, None);
        Ok(())
    }

    /// Step 6: clears the queue (when replacing), sets the transport URI,
    /// and issues play. A `code 800` rejection on queue-clear is retried
    /// once after stopping the endpoint.
    async fn start_playback(
        &self,
        coordinator: &CoordinatorHandle,
        options: &SceneExecutorOptions,
        execution: &mut SceneExecution,
    ) -> CoreResult<()> {
        execution.start_step(StepName::StartPlayback);

        let Some(music) = &options.music_content else {
            execution.skip_step(StepName::StartPlayback);
            return Ok(());
        };

        if options.queue_mode == QueueMode::ReplaceAndPlay {
            if let Err(err) = self.rpc.remove_all_tracks_from_queue(&coordinator.ip).await {
                if matches!(err, RpcError::Rejected { sub_code: 800, .. }) {
                    self.stop_and_retry_clear(coordinator, execution).await?;
                } else {
                    let core_err = rpc_error(&coordinator.endpoint_id, err);
                    execution.fail_step(StepName::StartPlayback, core_err.to_string(), None);
                    return Err(core_err);
                }
            }
        }

        if let Err(err) = self.rpc.set_av_transport_uri(&coordinator.ip, &music.uri, &music.metadata).await {
            let core_err = rpc_error(&coordinator.endpoint_id, err);
            execution.fail_step(StepName::StartPlayback, core_err.to_string(), None);
            return Err(core_err);
        }

        if let Err(err) = self.rpc.play(&coordinator.ip).await {
            let core_err = rpc_error(&coordinator.endpoint_id, err);
            execution.fail_step(StepName::StartPlayback, core_err.to_string(), None);
            return Err(core_err);
        }

        execution.complete_step(StepName::StartPlayback, None);
        Ok(())
    }

    async fn stop_and_retry_clear(&self, coordinator: &CoordinatorHandle, execution: &mut SceneExecution) -> CoreResult<()> {
        self.rpc
            .stop(&coordinator.ip)
            .await
            .map_err(|err| rpc_error(&coordinator.endpoint_id, err))
            .map_err(|err| {
                execution.fail_step(StepName::StartPlayback, err.to_string(), None);
                err
            })?;
        self.rpc
            .remove_all_tracks_from_queue(&coordinator.ip)
            .await
            .map_err(|err| rpc_error(&coordinator.endpoint_id, err))
            .map_err(|err| {
                execution.fail_step(StepName::StartPlayback, err.to_string(), None);
                err
            })
    }

    /// Step 7: polls transport state; an unreachable coordinator is treated
    /// as confirmed-for-status purposes rather than a hard failure.
    async fn verify_playback(
        &self,
        coordinator: &CoordinatorHandle,
        execution: &mut SceneExecution,
    ) -> crate::domain::entities::VerificationResult {
        use crate::domain::entities::VerificationResult;

        execution.start_step(StepName::VerifyPlayback);

        match self.rpc.get_transport_info(&coordinator.ip).await {
            Ok(info) => {
                let track_uri = self
                    .rpc
                    .get_position_info(&coordinator.ip)
                    .await
                    .ok()
                    .and_then(|p| p.track_uri);
                let verification = VerificationResult {
                    playback_confirmed: info.state == TransportState::Playing,
                    transport_state: Some(format!("{:?}", info.state)),
                    track_uri,
                    checked_at: Some(Utc::now()),
                    verification_unavailable: false,
                };
                execution.complete_step(StepName::VerifyPlayback, serde_json::to_value(&verification).ok());
                verification
            }
            Err(_) => {
                let verification = VerificationResult {
                    playback_confirmed: false,
                    transport_state: None,
                    track_uri: None,
                    checked_at: Some(Utc::now()),
                    verification_unavailable: true,
                };
                execution.fail_step(StepName::VerifyPlayback, "transport query unavailable".to_string(), None);
                verification
            }
        }
    }

    fn resolve_member_ip(&self, member: &SceneMember) -> Option<String> {
        if let Some(entry) = self.topology.get_by_id(&member.endpoint_id) {
            return Some(entry.ip);
        }
        if let Some(room) = &member.room_name {
            if let Some(entry) = self.topology.get_by_room_name(room) {
                return Some(entry.ip);
            }
        }
        None
    }
}

fn rpc_error(endpoint_id: &str, err: RpcError) -> CoreError {
    match err {
        RpcError::Timeout | RpcError::Unreachable => CoreError::EndpointOffline {
            endpoint_id: endpoint_id.to_string(),
            detail: err.to_string(),
        },
        RpcError::Rejected { sub_code, detail } => CoreError::EndpointRejected {
            endpoint_id: endpoint_id.to_string(),
            sub_code,
            detail,
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use crate::domain::entities::{Scene, SceneMember};
    use crate::domain::repositories::SceneExecutionRepository;
    use crate::domain::value_objects::{SceneExecutionId, SceneId};
    use crate::infrastructure::rpc::{MediaInfo, MockEndpointRpc, PositionInfo, TransportInfo, ZoneAttributes};
    use crate::infrastructure::topology::{StaticTopologyCache, TopologyEntry};

    use super::*;

    #[derive(Default)]
    struct InMemoryExecutions(Mutex<Vec<SceneExecution>>);
    impl SceneExecutionRepository for InMemoryExecutions {
        fn insert(&self, execution: &SceneExecution) -> CoreResult<()> {
            self.0.lock().unwrap().push(execution.clone());
            Ok(())
        }
        fn update(&self, execution: &SceneExecution) -> CoreResult<()> {
            let mut rows = self.0.lock().unwrap();
            if let Some(slot) = rows.iter_mut().find(|e| e.scene_execution_id == execution.scene_execution_id) {
                *slot = execution.clone();
            }
            Ok(())
        }
        fn get(&self, id: &SceneExecutionId) -> CoreResult<Option<SceneExecution>> {
            Ok(self.0.lock().unwrap().iter().find(|e| &e.scene_execution_id == id).cloned())
        }
        fn get_by_idempotency_key(&self, key: &str) -> CoreResult<Option<SceneExecution>> {
            Ok(self
                .0
                .lock()
                .unwrap()
                .iter()
                .find(|e| e.idempotency_key.as_deref() == Some(key))
                .cloned())
        }
        fn list_for_scene(&self, scene_id: &SceneId, _limit: u32) -> CoreResult<Vec<SceneExecution>> {
            Ok(self.0.lock().unwrap().iter().filter(|e| &e.scene_id == scene_id).cloned().collect())
        }
    }

    fn scene_with_one_member() -> Scene {
        let mut scene = Scene::new("Living Room".to_string());
        let mut member = SceneMember::new("coord-1".to_string());
        member.room_name = Some("Living Room".to_string());
        member.target_volume = Some(40);
        scene.members.push(member);
        scene
    }

    fn seeded_topology() -> StaticTopologyCache {
        let topology = StaticTopologyCache::new();
        topology.seed(TopologyEntry {
            endpoint_id: "coord-1".to_string(),
            ip: "10.0.0.5".to_string(),
            room_name: "Living Room".to_string(),
            model: "arc".to_string(),
        });
        topology
    }

    #[tokio::test]
    async fn happy_path_confirms_playback() {
        let scene = scene_with_one_member();
        let topology = seeded_topology();
        let lock = CoordinatorLock::new();
        let executions = InMemoryExecutions::default();

        let mut rpc = MockEndpointRpc::new();
        rpc.expect_get_zone_attributes()
            .returning(|_| Ok(ZoneAttributes { name: "coord".to_string(), is_coordinator: true }));
        rpc.expect_set_volume().returning(|_, _| Ok(()));
        rpc.expect_get_transport_info()
            .returning(|_| Ok(TransportInfo { state: TransportState::Stopped }));
        rpc.expect_get_media_info().returning(|_| Ok(MediaInfo { current_uri: "x-rincon-queue:RINCON_SELF#0".to_string() }));
        rpc.expect_remove_all_tracks_from_queue().returning(|_| Ok(()));
        rpc.expect_set_av_transport_uri().returning(|_, _, _| Ok(()));
        rpc.expect_play().returning(|_| Ok(()));
        rpc.expect_get_position_info().returning(|_| Ok(PositionInfo { track_uri: Some("track-1".to_string()) }));

        let executor = SceneExecutor::new(&rpc, &topology, &lock, &executions, StdDuration::from_secs(1), 0);
        let options = SceneExecutorOptions {
            music_content: Some(ResolvedMusic {
                uri: "x-rincon-cpcontainer:1".to_string(),
                metadata: "Morning Jazz".to_string(),
                uses_queue: true,
            }),
            ..Default::default()
        };

        let execution = executor.execute(&scene, None, options).await.unwrap();
        assert_eq!(execution.status, SceneExecutionStatus::PlayingConfirmed);
        assert_eq!(execution.coordinator_used.as_deref(), Some("coord-1"));
    }

    #[tokio::test]
    async fn idempotency_key_short_circuits_re_execution() {
        let scene = scene_with_one_member();
        let topology = seeded_topology();
        let lock = CoordinatorLock::new();
        let executions = InMemoryExecutions::default();

        let mut prior = SceneExecution::new(scene.scene_id.clone(), Some("key-1".to_string()));
        prior.status = SceneExecutionStatus::PlayingConfirmed;
        executions.insert(&prior).unwrap();

        let rpc = MockEndpointRpc::new();
        let executor = SceneExecutor::new(&rpc, &topology, &lock, &executions, StdDuration::from_secs(1), 0);
        let result = executor
            .execute(&scene, Some("key-1".to_string()), SceneExecutorOptions::default())
            .await
            .unwrap();
        assert_eq!(result.scene_execution_id, prior.scene_execution_id);
    }

    #[tokio::test]
    async fn missing_topology_entry_fails_determine_coordinator() {
        let scene = scene_with_one_member();
        let topology = StaticTopologyCache::new();
        let lock = CoordinatorLock::new();
        let executions = InMemoryExecutions::default();
        let rpc = MockEndpointRpc::new();

        let executor = SceneExecutor::new(&rpc, &topology, &lock, &executions, StdDuration::from_secs(1), 0);
        let err = executor
            .execute(&scene, None, SceneExecutorOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn held_lock_surfaces_coordinator_locked() {
        let scene = scene_with_one_member();
        let topology = seeded_topology();
        let lock = CoordinatorLock::new();
        let executions = InMemoryExecutions::default();
        let rpc = MockEndpointRpc::new();

        let _guard = lock.try_lock("coord-1").await.unwrap();
        let executor = SceneExecutor::new(&rpc, &topology, &lock, &executions, StdDuration::from_millis(50), 0);
        let err = executor
            .execute(&scene, None, SceneExecutorOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::CoordinatorLocked { .. }));
    }
}
