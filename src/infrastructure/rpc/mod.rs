//! Endpoint RPC port
//!
//! Models the opaque endpoint control surface of SPEC_FULL.md §6 as an
//! `async_trait` so the Scene Executor and Preflight Checker depend only on
//! this trait, never on the transport. The real wire protocol (SOAP over
//! HTTP) is explicitly out of scope; [`HttpEndpointRpc`] exists only so the
//! crate runs end to end, not to fully specify that protocol.

mod http_endpoint_rpc;

pub use http_endpoint_rpc::HttpEndpointRpc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportState {
    Stopped,
    Playing,
    PausedPlayback,
    Transitioning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportInfo {
    pub state: TransportState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    pub current_uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionInfo {
    pub track_uri: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneAttributes {
    pub name: String,
    pub is_coordinator: bool,
}

/// Known error classes an endpoint RPC call can fail with, per SPEC_FULL.md
/// §6. `Rejected`'s sub-code 800 ("invalid state") is the one the Scene
/// Executor's step 6 specifically recovers from with a stop-then-retry.
#[derive(Debug, Error, Clone)]
pub enum RpcError {
    #[error("endpoint RPC timed out")]
    Timeout,
    #[error("endpoint unreachable")]
    Unreachable,
    #[error("endpoint rejected command (code {sub_code})")]
    Rejected { sub_code: i32, detail: String },
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait EndpointRpc: Send + Sync {
    async fn get_transport_info(&self, ip: &str) -> Result<TransportInfo, RpcError>;
    async fn get_media_info(&self, ip: &str) -> Result<MediaInfo, RpcError>;
    async fn get_position_info(&self, ip: &str) -> Result<PositionInfo, RpcError>;
    async fn set_av_transport_uri(&self, ip: &str, uri: &str, metadata: &str) -> Result<(), RpcError>;
    async fn play(&self, ip: &str) -> Result<(), RpcError>;
    async fn stop(&self, ip: &str) -> Result<(), RpcError>;
    async fn set_volume(&self, ip: &str, volume: u8) -> Result<(), RpcError>;
    async fn remove_all_tracks_from_queue(&self, ip: &str) -> Result<(), RpcError>;
    async fn become_coordinator_of_standalone_group(&self, ip: &str) -> Result<(), RpcError>;
    async fn get_zone_attributes(&self, ip: &str) -> Result<ZoneAttributes, RpcError>;
}
