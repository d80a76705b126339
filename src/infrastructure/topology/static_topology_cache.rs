use std::collections::HashMap;
use std::sync::RwLock;

use super::{TopologyCache, TopologyEntry};

/// An in-memory topology cache seeded once at startup, standing in for the
/// out-of-scope discovery process (SPEC_FULL.md §1) so the crate runs end to
/// end without a live zone-group listener. A real deployment would refresh
/// this from SSDP/zone-group-topology notifications; this adapter only
/// needs to serve reads.
#[derive(Default)]
pub struct StaticTopologyCache {
    by_id: RwLock<HashMap<String, TopologyEntry>>,
}

impl StaticTopologyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, entry: TopologyEntry) {
        self.by_id.write().unwrap().insert(entry.endpoint_id.clone(), entry);
    }
}

impl TopologyCache for StaticTopologyCache {
    fn get_by_id(&self, endpoint_id: &str) -> Option<TopologyEntry> {
        self.by_id.read().unwrap().get(endpoint_id).cloned()
    }

    fn get_by_room_name(&self, room_name: &str) -> Option<TopologyEntry> {
        self.by_id
            .read()
            .unwrap()
            .values()
            .find(|e| e.room_name.eq_ignore_ascii_case(room_name))
            .cloned()
    }

    fn all(&self) -> Vec<TopologyEntry> {
        self.by_id.read().unwrap().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, room: &str, model: &str) -> TopologyEntry {
        TopologyEntry {
            endpoint_id: id.to_string(),
            ip: format!("10.0.0.{id}"),
            room_name: room.to_string(),
            model: model.to_string(),
        }
    }

    #[test]
    fn looks_up_by_id_and_room_name_case_insensitively() {
        let cache = StaticTopologyCache::new();
        cache.seed(entry("1", "Living Room", "arc"));
        assert_eq!(cache.get_by_id("1").unwrap().model, "arc");
        assert_eq!(cache.get_by_room_name("living room").unwrap().endpoint_id, "1");
        assert!(cache.get_by_id("missing").is_none());
    }

    #[test]
    fn all_returns_every_seeded_entry() {
        let cache = StaticTopologyCache::new();
        cache.seed(entry("1", "Living Room", "arc"));
        cache.seed(entry("2", "Kitchen", "one"));
        assert_eq!(cache.all().len(), 2);
    }
}
