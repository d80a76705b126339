//! Preflight Checker
//!
//! Diagnoses blocking coordinator states before the Scene Executor commits
//! to playback, and where possible drives a one-shot fix.

use std::time::Duration as StdDuration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::{CoreError, PreflightIssueKind};
use crate::infrastructure::rpc::{EndpointRpc, RpcError, TransportState};

/// Matches the group-member URI scheme carrying the owning coordinator's
/// UUID, e.g. `x-rincon:RINCON_000E5811234501400`.
static COORDINATOR_URI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"x-rincon:(RINCON_[0-9A-F]+)").expect("static pattern is valid"));

const TV_STREAM_SCHEME: &str = "x-sonos-htastream:";

#[derive(Debug, Clone, Serialize)]
pub struct PreflightIssue {
    pub kind: PreflightIssueKind,
    pub auto_fixable: bool,
    pub room_name: Option<String>,
    pub details: std::collections::HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct PreflightResult {
    pub can_proceed: bool,
    pub issue: Option<PreflightIssue>,
}

pub struct PreflightChecker<'a> {
    rpc: &'a dyn EndpointRpc,
}

impl<'a> PreflightChecker<'a> {
    pub fn new(rpc: &'a dyn EndpointRpc) -> Self {
        Self { rpc }
    }

    /// Runs the five ordered checks from SPEC_FULL.md §4.C10 against a
    /// single endpoint, retrying a TRANSITIONING transport state up to
    /// `retry_count` times before giving up.
    pub async fn check(&self, endpoint_ip: &str, room_name: Option<&str>, retry_count: u32) -> PreflightResult {
        let transport = match self.rpc.get_transport_info(endpoint_ip).await {
            Ok(info) => info,
            Err(_offline) => {
                return blocked(
                    PreflightIssueKind::Offline,
                    false,
                    room_name,
                    [("endpoint_ip".to_string(), endpoint_ip.to_string())],
                );
            }
        };

        let media = match self.rpc.get_media_info(endpoint_ip).await {
            Ok(info) => info,
            Err(_) => {
                return blocked(
                    PreflightIssueKind::Offline,
                    false,
                    room_name,
                    [("endpoint_ip".to_string(), endpoint_ip.to_string())],
                );
            }
        };

        if media.current_uri.contains(TV_STREAM_SCHEME) {
            return blocked(
                PreflightIssueKind::TvMode,
                true,
                room_name,
                [("current_uri".to_string(), media.current_uri)],
            );
        }

        if let Some(captures) = COORDINATOR_URI_RE.captures(&media.current_uri) {
            let coordinator_uuid = captures.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
            return blocked(
                PreflightIssueKind::NotCoordinator,
                true,
                room_name,
                [("coordinator_uuid".to_string(), coordinator_uuid)],
            );
        }

        let mut state = transport.state;
        let mut attempts = 0;
        while state == TransportState::Transitioning && attempts < retry_count.min(2) {
            tokio::time::sleep(StdDuration::from_millis(500)).await;
            match self.rpc.get_transport_info(endpoint_ip).await {
                Ok(info) => state = info.state,
                Err(_) => {
                    return blocked(
                        PreflightIssueKind::Offline,
                        false,
                        room_name,
                        [("endpoint_ip".to_string(), endpoint_ip.to_string())],
                    );
                }
            }
            attempts += 1;
        }

        if state == TransportState::Transitioning {
            return blocked(PreflightIssueKind::Transitioning, false, room_name, []);
        }

        PreflightResult {
            can_proceed: true,
            issue: None,
        }
    }

    /// Attempts the one-shot fix for an auto-fixable issue, returning
    /// whether the fix was dispatched without an RPC error (the caller
    /// re-checks afterward rather than trusting this return value alone).
    pub async fn attempt_auto_fix(&self, endpoint_ip: &str, issue: &PreflightIssue) -> Result<(), RpcError> {
        match issue.kind {
            PreflightIssueKind::TvMode => {
                self.rpc.stop(endpoint_ip).await?;
                tokio::time::sleep(StdDuration::from_millis(200)).await;
                Ok(())
            }
            PreflightIssueKind::NotCoordinator => {
                self.rpc.become_coordinator_of_standalone_group(endpoint_ip).await?;
                tokio::time::sleep(StdDuration::from_millis(300)).await;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn blocked(
    kind: PreflightIssueKind,
    auto_fixable: bool,
    room_name: Option<&str>,
    details: impl IntoIterator<Item = (String, String)>,
) -> PreflightResult {
    PreflightResult {
        can_proceed: false,
        issue: Some(PreflightIssue {
            kind,
            auto_fixable,
            room_name: room_name.map(str::to_string),
            details: details.into_iter().collect(),
        }),
    }
}

/// Maps an issue to the (code, user message, suggestion) triple the HTTP
/// surface's error envelope expects.
pub fn create_error(issue: &PreflightIssue) -> CoreError {
    CoreError::PreflightBlocked {
        kind: issue.kind,
        endpoint_id: issue.room_name.clone().unwrap_or_else(|| "unknown".to_string()),
        details: issue.details.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::rpc::{MediaInfo, MockEndpointRpc, TransportInfo};

    #[tokio::test]
    async fn tv_mode_uri_is_detected_and_auto_fixable() {
        let mut rpc = MockEndpointRpc::new();
        rpc.expect_get_transport_info()
            .returning(|_| Ok(TransportInfo { state: TransportState::Playing }));
        rpc.expect_get_media_info().returning(|_| {
            Ok(MediaInfo {
                current_uri: "x-sonos-htastream:RINCON_1:spdif".to_string(),
            })
        });

        let checker = PreflightChecker::new(&rpc);
        let result = checker.check("10.0.0.5", Some("Living Room"), 0).await;
        assert!(!result.can_proceed);
        let issue = result.issue.unwrap();
        assert_eq!(issue.kind, PreflightIssueKind::TvMode);
        assert!(issue.auto_fixable);
    }

    #[tokio::test]
    async fn healthy_endpoint_can_proceed() {
        let mut rpc = MockEndpointRpc::new();
        rpc.expect_get_transport_info()
            .returning(|_| Ok(TransportInfo { state: TransportState::Stopped }));
        rpc.expect_get_media_info().returning(|_| {
            Ok(MediaInfo {
                current_uri: "x-rincon-queue:RINCON_SELF#0".to_string(),
            })
        });

        let checker = PreflightChecker::new(&rpc);
        let result = checker.check("10.0.0.5", None, 0).await;
        assert!(result.can_proceed);
    }

    #[tokio::test]
    async fn offline_endpoint_is_not_auto_fixable() {
        let mut rpc = MockEndpointRpc::new();
        rpc.expect_get_transport_info()
            .returning(|_| Err(RpcError::Unreachable));

        let checker = PreflightChecker::new(&rpc);
        let result = checker.check("10.0.0.5", None, 0).await;
        assert!(!result.can_proceed);
        assert!(!result.issue.unwrap().auto_fixable);
    }
}
