//! Tagged variants for the dynamic music-content blob, per the
//! Re-architecture guidance in SPEC_FULL.md §9: stored as opaque JSON in a
//! single column, parsed on read, validated on write — never spread across
//! a sprawl of nullable columns.

use serde::{Deserialize, Serialize};

/// A resolved or resolvable piece of content to play when a scene starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum MusicContent {
    /// A saved favorite, identified by the provider's favorite id (legacy
    /// field on Routine, still accepted).
    SonosFavorite {
        id: String,
        name: String,
        artwork: Option<String>,
        service: Option<String>,
    },
    /// A direct content descriptor resolved by the external music resolver.
    Direct {
        service: String,
        content_type: String,
        content_id: String,
        title: Option<String>,
        artwork: Option<String>,
    },
}

/// How a routine selects among multiple configured tracks/favorites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MusicPolicyType {
    Fixed,
    Rotation,
    Shuffle,
}

/// How the queue is treated when playback starts (Scene Executor step 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueMode {
    ReplaceAndPlay,
    PlayNext,
    AddToEnd,
    QueueOnly,
}

/// How the executor handles an endpoint that is already grouped elsewhere
/// (Scene Executor step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupBehavior {
    AutoRedirect,
    UngroupAndPlay,
    RequireCoordinator,
}

/// How the executor handles a coordinator stuck in TV mode (Scene Executor
/// step 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TvPolicy {
    Skip,
    UseFallback,
    AlwaysPlay,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn music_content_round_trips_through_json() {
        let content = MusicContent::Direct {
            service: "spotify".to_string(),
            content_type: "playlist".to_string(),
            content_id: "abc123".to_string(),
            title: Some("Morning Mix".to_string()),
            artwork: None,
        };
        let json = serde_json::to_string(&content).unwrap();
        let parsed: MusicContent = serde_json::from_str(&json).unwrap();
        assert_eq!(content, parsed);
    }
}
