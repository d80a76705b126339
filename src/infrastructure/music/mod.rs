//! Music resolver port
//!
//! Resolves a content descriptor (a Sonos favorite id, or an explicit
//! {service, content_type, content_id, title} tuple) to a playable URI. The
//! resolution service itself is opaque and out of scope (SPEC_FULL.md §6);
//! this module only defines the port and a thin stub adapter.

mod stub_music_resolver;

pub use stub_music_resolver::StubMusicResolver;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::value_objects::MusicContent;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedMusic {
    pub uri: String,
    pub metadata: String,
    pub uses_queue: bool,
}

#[derive(Debug, Error, Clone)]
pub enum MusicResolveError {
    #[error("content descriptor not found")]
    NotFound,
    #[error("upstream music service unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait MusicResolver: Send + Sync {
    async fn resolve(&self, content: &MusicContent) -> Result<ResolvedMusic, MusicResolveError>;
}
