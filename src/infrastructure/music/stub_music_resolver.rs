use async_trait::async_trait;

use super::{MusicResolveError, MusicResolver, ResolvedMusic};
use crate::domain::value_objects::MusicContent;

/// Resolves content descriptors into queue-ready URIs by the fixed-scheme
/// conventions the real music service protocol is known to use. Acts as the
/// crate's only shipped adapter, standing in for the out-of-scope resolution
/// backend so routines are runnable end to end without a live subscription.
pub struct StubMusicResolver;

#[async_trait]
impl MusicResolver for StubMusicResolver {
    async fn resolve(&self, content: &MusicContent) -> Result<ResolvedMusic, MusicResolveError> {
        match content {
            MusicContent::SonosFavorite { id, name, .. } => Ok(ResolvedMusic {
                uri: format!("x-rincon-cpcontainer:{id}"),
                metadata: name.clone(),
                uses_queue: true,
            }),
            MusicContent::Direct {
                content_id, title, ..
            } => Ok(ResolvedMusic {
                uri: content_id.clone(),
                metadata: title.clone().unwrap_or_default(),
                uses_queue: false,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn favorite_resolves_to_cpcontainer_uri() {
        let resolver = StubMusicResolver;
        let content = MusicContent::SonosFavorite {
            id: "12".to_string(),
            name: "Morning Jazz".to_string(),
            artwork: None,
            service: None,
        };
        let resolved = resolver.resolve(&content).await.unwrap();
        assert_eq!(resolved.uri, "x-rincon-cpcontainer:12");
        assert!(resolved.uses_queue);
    }
}
