//! Runtime configuration
//!
//! Loaded from environment variables (via `dotenvy`) with sane defaults,
//! builder-style, mirroring the upstream `WebConfig` shape but scoped to the
//! fields SPEC_FULL.md §6 enumerates plus the knobs its components need.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub host: String,
    pub port: u16,

    pub poll_interval: Duration,
    pub job_generation_interval: Duration,
    pub max_retries: u32,
    pub stale_claim_timeout: Duration,
    pub max_pending_fetch: u32,

    pub endpoint_rpc_timeout: Duration,
    pub lock_acquire_timeout: Duration,

    pub preflight_retry_delay: Duration,
    pub preflight_max_retries: u32,
    pub tv_mode_settle: Duration,
    pub ungroup_settle: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "routinehub.db".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8080,

            poll_interval: Duration::from_secs(10),
            job_generation_interval: Duration::from_secs(60),
            max_retries: 3,
            stale_claim_timeout: Duration::from_secs(5 * 60),
            max_pending_fetch: 100,

            endpoint_rpc_timeout: Duration::from_secs(5),
            lock_acquire_timeout: Duration::from_secs(60),

            preflight_retry_delay: Duration::from_millis(500),
            preflight_max_retries: 2,
            tv_mode_settle: Duration::from_millis(200),
            ungroup_settle: Duration::from_millis(300),
        }
    }
}

impl Config {
    /// Loads overrides from environment variables, falling back to
    /// [`Config::default`] for anything unset or unparsable. Call
    /// `dotenvy::dotenv().ok()` before this in `main` to pick up a `.env`
    /// file, matching the upstream binary's startup sequence.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_path: env_or("ROUTINEHUB_DATABASE_PATH", defaults.database_path),
            host: env_or("ROUTINEHUB_HOST", defaults.host),
            port: env_parse_or("ROUTINEHUB_PORT", defaults.port),

            poll_interval: env_millis_or("ROUTINEHUB_POLL_INTERVAL_MS", defaults.poll_interval),
            job_generation_interval: env_millis_or(
                "ROUTINEHUB_JOB_GENERATION_INTERVAL_MS",
                defaults.job_generation_interval,
            ),
            max_retries: env_parse_or("ROUTINEHUB_MAX_RETRIES", defaults.max_retries),
            stale_claim_timeout: env_millis_or(
                "ROUTINEHUB_STALE_CLAIM_TIMEOUT_MS",
                defaults.stale_claim_timeout,
            ),
            max_pending_fetch: env_parse_or("ROUTINEHUB_MAX_PENDING_FETCH", defaults.max_pending_fetch),

            endpoint_rpc_timeout: env_millis_or(
                "ROUTINEHUB_ENDPOINT_RPC_TIMEOUT_MS",
                defaults.endpoint_rpc_timeout,
            ),
            lock_acquire_timeout: env_millis_or(
                "ROUTINEHUB_LOCK_ACQUIRE_TIMEOUT_MS",
                defaults.lock_acquire_timeout,
            ),

            preflight_retry_delay: defaults.preflight_retry_delay,
            preflight_max_retries: defaults.preflight_max_retries,
            tv_mode_settle: defaults.tv_mode_settle,
            ungroup_settle: defaults.ungroup_settle,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_host(mut self, host: String) -> Self {
        self.host = host;
        self
    }

    pub fn with_database_path(mut self, path: String) -> Self {
        self.database_path = path;
        self
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_millis_or(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.poll_interval, Duration::from_secs(10));
        assert_eq!(cfg.job_generation_interval, Duration::from_secs(60));
        assert_eq!(cfg.max_retries, 3);
        assert_eq!(cfg.stale_claim_timeout, Duration::from_secs(300));
        assert_eq!(cfg.endpoint_rpc_timeout, Duration::from_secs(5));
        assert_eq!(cfg.lock_acquire_timeout, Duration::from_secs(60));
    }

    #[test]
    fn builder_overrides_host_and_port() {
        let cfg = Config::default().with_host("0.0.0.0".to_string()).with_port(9090);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 9090);
    }
}
