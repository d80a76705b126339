//! HTTP request/response DTOs for the §6 route surface.

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Uniform success/error envelope the handlers wrap every body in.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn err(error: ApiError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RoutinePatchRequest {
    pub name: Option<String>,
    pub enabled: Option<bool>,
    pub timezone: Option<String>,
    pub holiday_behavior: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SnoozeRequest {
    /// RFC3339 instant to snooze until.
    pub until: String,
}

#[derive(Debug, Deserialize)]
pub struct HolidayCreateRequest {
    pub date: String,
    pub name: String,
    #[serde(default)]
    pub is_custom: bool,
}

#[derive(Debug, Deserialize)]
pub struct HolidayCheckQuery {
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct HolidayRangeQuery {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Deserialize)]
pub struct ExecutionRetryRequest {
    pub routine_id: String,
}

#[derive(Debug, Serialize)]
pub struct TestRunResponse {
    pub routine_id: String,
    pub next_run: Option<chrono::DateTime<chrono::Utc>>,
}
