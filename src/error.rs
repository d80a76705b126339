//! Crate-wide error type
//!
//! Every use case and service returns `Result<T, CoreError>`. The CLI wraps it
//! in `anyhow::Result`; the web layer maps it to a JSON error envelope via
//! [`CoreError::to_api_error`].

use serde::Serialize;
use std::collections::HashMap;

/// The preflight issue types a blocked coordinator can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PreflightIssueKind {
    Offline,
    TvMode,
    NotCoordinator,
    Transitioning,
    NoPlayAction,
}

/// A single error kind, matching the taxonomy of SPEC_FULL.md §7.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Bad routine/scene shape, unparsable schedule, invalid timezone, etc.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Routine, job, scene, or holiday not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Duplicate idempotency key, or a scene still referenced by a routine.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The coordinator's lock is held by another execution.
    #[error("coordinator locked: {endpoint_id}")]
    CoordinatorLocked { endpoint_id: String },

    /// The endpoint could not be reached within the RPC timeout.
    #[error("endpoint offline: {endpoint_id} ({detail})")]
    EndpointOffline { endpoint_id: String, detail: String },

    /// The endpoint rejected a command with a known sub-code.
    #[error("endpoint rejected command: {endpoint_id} (code {sub_code})")]
    EndpointRejected {
        endpoint_id: String,
        sub_code: i32,
        detail: String,
    },

    /// Preflight determined the coordinator cannot proceed and no fix applied.
    #[error("preflight blocked: {kind:?} on {endpoint_id}")]
    PreflightBlocked {
        kind: PreflightIssueKind,
        endpoint_id: String,
        details: HashMap<String, String>,
    },

    /// Anything else — store errors, serialization errors, bugs.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Short machine-readable code, matching the §7 error kind names.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "VALIDATION",
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::Conflict(_) => "CONFLICT",
            CoreError::CoordinatorLocked { .. } => "COORDINATOR_LOCKED",
            CoreError::EndpointOffline { .. } => "ENDPOINT_OFFLINE",
            CoreError::EndpointRejected { .. } => "ENDPOINT_REJECTED",
            CoreError::PreflightBlocked { .. } => "PREFLIGHT_BLOCKED",
            CoreError::Internal(_) => "INTERNAL",
        }
    }

    /// A user-facing remediation string, where one is known.
    pub fn remediation(&self) -> Option<String> {
        match self {
            CoreError::PreflightBlocked { kind, .. } => Some(match kind {
                PreflightIssueKind::TvMode => {
                    "Please use the Sonos app to switch from TV to music".to_string()
                }
                PreflightIssueKind::NotCoordinator => {
                    "The speaker is grouped elsewhere; try again or regroup manually".to_string()
                }
                PreflightIssueKind::Transitioning => {
                    "The speaker is mid-transition; it should settle shortly, try again"
                        .to_string()
                }
                PreflightIssueKind::Offline => {
                    "Check that the speaker is powered on and on the network".to_string()
                }
                PreflightIssueKind::NoPlayAction => {
                    "No playable content is configured for this routine".to_string()
                }
            }),
            CoreError::CoordinatorLocked { .. } => {
                Some("Another routine is currently using this speaker; it will be retried".to_string())
            }
            _ => None,
        }
    }

    /// Converts this error into the JSON-serializable shape exposed over HTTP.
    pub fn to_api_error(&self) -> ApiError {
        ApiError {
            code: self.code().to_string(),
            message: self.to_string(),
            remediation: self.remediation(),
            details: self.details(),
        }
    }

    fn details(&self) -> HashMap<String, String> {
        match self {
            CoreError::NotFound { entity, id } => {
                let mut d = HashMap::new();
                d.insert("entity".to_string(), entity.to_string());
                d.insert("id".to_string(), id.clone());
                d
            }
            CoreError::CoordinatorLocked { endpoint_id } => {
                let mut d = HashMap::new();
                d.insert("endpoint_id".to_string(), endpoint_id.clone());
                d
            }
            CoreError::EndpointOffline { endpoint_id, detail } => {
                let mut d = HashMap::new();
                d.insert("endpoint_id".to_string(), endpoint_id.clone());
                d.insert("detail".to_string(), detail.clone());
                d
            }
            CoreError::EndpointRejected {
                endpoint_id,
                sub_code,
                detail,
            } => {
                let mut d = HashMap::new();
                d.insert("endpoint_id".to_string(), endpoint_id.clone());
                d.insert("sub_code".to_string(), sub_code.to_string());
                d.insert("detail".to_string(), detail.clone());
                d
            }
            CoreError::PreflightBlocked { details, .. } => details.clone(),
            _ => HashMap::new(),
        }
    }
}

/// JSON-serializable error envelope returned by the HTTP surface.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    pub remediation: Option<String>,
    pub details: HashMap<String, String>,
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(sqlite_err, _)
                if sqlite_err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                CoreError::Conflict(err.to_string())
            }
            rusqlite::Error::QueryReturnedNoRows => {
                CoreError::NotFound {
                    entity: "row",
                    id: "unknown".to_string(),
                }
            }
            _ => CoreError::Internal(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Internal(format!("serialization error: {err}"))
    }
}

impl From<chrono::ParseError> for CoreError {
    fn from(err: chrono::ParseError) -> Self {
        CoreError::Validation(format!("bad timestamp: {err}"))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
