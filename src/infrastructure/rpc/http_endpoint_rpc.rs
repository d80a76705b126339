use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::{EndpointRpc, MediaInfo, PositionInfo, RpcError, TransportInfo, TransportState, ZoneAttributes};

/// A thin `reqwest`-based adapter issuing the HTTP calls a real endpoint
/// control protocol would require. The wire format itself is out of scope
/// (SPEC_FULL.md §6); this adapter only needs to exist so the crate is
/// runnable end to end against a real device or its emulator.
pub struct HttpEndpointRpc {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpEndpointRpc {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    async fn post(&self, ip: &str, path: &str, body: serde_json::Value) -> Result<reqwest::Response, RpcError> {
        let url = format!("http://{ip}{path}");
        tokio::time::timeout(self.timeout, self.client.post(&url).json(&body).send())
            .await
            .map_err(|_| RpcError::Timeout)?
            .map_err(|e| {
                warn!(%url, error = %e, "endpoint rpc call failed");
                RpcError::Unreachable
            })
    }

    async fn get(&self, ip: &str, path: &str) -> Result<reqwest::Response, RpcError> {
        let url = format!("http://{ip}{path}");
        tokio::time::timeout(self.timeout, self.client.get(&url).send())
            .await
            .map_err(|_| RpcError::Timeout)?
            .map_err(|e| {
                warn!(%url, error = %e, "endpoint rpc call failed");
                RpcError::Unreachable
            })
    }
}

#[async_trait]
impl EndpointRpc for HttpEndpointRpc {
    async fn get_transport_info(&self, ip: &str) -> Result<TransportInfo, RpcError> {
        let resp = self.get(ip, "/transportInfo").await?;
        resp.json::<RawTransportInfo>()
            .await
            .map(|raw| TransportInfo { state: raw.state })
            .map_err(|_| RpcError::Unreachable)
    }

    async fn get_media_info(&self, ip: &str) -> Result<MediaInfo, RpcError> {
        let resp = self.get(ip, "/mediaInfo").await?;
        resp.json().await.map_err(|_| RpcError::Unreachable)
    }

    async fn get_position_info(&self, ip: &str) -> Result<PositionInfo, RpcError> {
        let resp = self.get(ip, "/positionInfo").await?;
        resp.json().await.map_err(|_| RpcError::Unreachable)
    }

    async fn set_av_transport_uri(&self, ip: &str, uri: &str, metadata: &str) -> Result<(), RpcError> {
        self.post(ip, "/avTransportUri", serde_json::json!({ "uri": uri, "metadata": metadata }))
            .await?;
        Ok(())
    }

    async fn play(&self, ip: &str) -> Result<(), RpcError> {
        self.post(ip, "/play", serde_json::json!({})).await?;
        Ok(())
    }

    async fn stop(&self, ip: &str) -> Result<(), RpcError> {
        self.post(ip, "/stop", serde_json::json!({})).await?;
        Ok(())
    }

    async fn set_volume(&self, ip: &str, volume: u8) -> Result<(), RpcError> {
        self.post(ip, "/volume", serde_json::json!({ "volume": volume }))
            .await?;
        Ok(())
    }

    async fn remove_all_tracks_from_queue(&self, ip: &str) -> Result<(), RpcError> {
        self.post(ip, "/queue/clear", serde_json::json!({})).await?;
        Ok(())
    }

    async fn become_coordinator_of_standalone_group(&self, ip: &str) -> Result<(), RpcError> {
        self.post(ip, "/standaloneGroup", serde_json::json!({})).await?;
        Ok(())
    }

    async fn get_zone_attributes(&self, ip: &str) -> Result<ZoneAttributes, RpcError> {
        let resp = self.get(ip, "/zoneAttributes").await?;
        resp.json().await.map_err(|_| RpcError::Unreachable)
    }
}

#[derive(serde::Deserialize)]
struct RawTransportInfo {
    state: TransportState,
}
