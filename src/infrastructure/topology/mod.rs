//! Endpoint topology port
//!
//! Endpoint discovery and the topology cache are external collaborators
//! (SPEC_FULL.md §1): something else on the network watches zone-group
//! announcements and keeps an id/ip/room-name/model map warm. The Scene
//! Executor's `determine_coordinator` and `ensure_group` steps only need to
//! *read* that map, so it is modeled as a narrow port with one shipped
//! adapter, the same shape as [`crate::infrastructure::rpc::EndpointRpc`].

mod static_topology_cache;

pub use static_topology_cache::StaticTopologyCache;

/// A discovered endpoint, as the topology cache would report it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyEntry {
    pub endpoint_id: String,
    pub ip: String,
    pub room_name: String,
    /// Lower-cased model name (e.g. "arc", "beam", "one"), used by
    /// `determine_coordinator`'s ARC_FIRST preference match.
    pub model: String,
}

/// Soundbar-class models eligible to be picked as coordinator under the
/// ARC_FIRST preference (SPEC_FULL.md §4.C11 step 1).
pub const ARC_FIRST_MODELS: [&str; 5] = ["arc", "beam", "ray", "playbar", "playbase"];

pub trait TopologyCache: Send + Sync {
    fn get_by_id(&self, endpoint_id: &str) -> Option<TopologyEntry>;
    fn get_by_room_name(&self, room_name: &str) -> Option<TopologyEntry>;
    fn all(&self) -> Vec<TopologyEntry>;
}
