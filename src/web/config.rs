//! Web server configuration
//!
//! The HTTP surface is an unauthenticated convenience front over the core
//! (SPEC_FULL.md §1, §6) — it carries no auth, session, or tenant settings,
//! only what it needs to bind and report which database it serves.

#[derive(Debug, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    pub database_path: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_path: "routinehub.db".to_string(),
        }
    }
}
