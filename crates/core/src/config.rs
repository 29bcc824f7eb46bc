use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TasklineError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_opt(key).and_then(|v| v.parse().ok())
}

// ── Top-level config ──────────────────────────────────────────

/// Configuration for a worker pool and a scheduler, typically parsed from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TasklineConfig {
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl TasklineConfig {
    /// Parse config from a TOML string, then apply env overrides and validate.
    pub fn from_toml(toml_str: &str) -> Result<Self, TasklineError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TasklineError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Defaults plus env overrides, for when no config file is present.
    pub fn from_env() -> Result<Self, TasklineError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Convention: `TASKLINE_SECTION_KEY` overrides `section.key`.
    /// Values that fail to parse are ignored.
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Some(v) = env_opt("TASKLINE_POOL_NAME") {
            self.pool.name = v;
        }
        if let Some(n) = env_parsed("TASKLINE_POOL_WORKERS") {
            self.pool.workers = n;
        }
        if let Some(n) = env_parsed("TASKLINE_POOL_BACKLOG_THRESHOLD") {
            self.pool.backlog_threshold = n;
        }
        if let Some(ms) = env_parsed("TASKLINE_POOL_SHUTDOWN_POLL_MS") {
            self.pool.shutdown_poll_ms = ms;
        }
        if let Some(v) = env_opt("TASKLINE_SCHEDULER_NAME") {
            self.scheduler.name = v;
        }
    }

    /// Reject values that cannot produce a working pool or scheduler.
    pub fn validate(&self) -> Result<(), TasklineError> {
        if self.pool.name.trim().is_empty() {
            return Err(TasklineError::Config("pool.name must not be empty".into()));
        }
        if self.pool.backlog_threshold == 0 {
            return Err(TasklineError::Config(
                "pool.backlog_threshold must be greater than 0".into(),
            ));
        }
        if self.pool.shutdown_poll_ms == 0 {
            return Err(TasklineError::Config(
                "pool.shutdown_poll_ms must be greater than 0".into(),
            ));
        }
        if self.scheduler.name.trim().is_empty() {
            return Err(TasklineError::Config("scheduler.name must not be empty".into()));
        }
        Ok(())
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!(
            "  pool:        name={}, workers={}, backlog_threshold={}, shutdown_poll={}ms",
            self.pool.name,
            self.pool.resolved_workers(),
            self.pool.backlog_threshold,
            self.pool.shutdown_poll_ms
        );
        tracing::info!("  scheduler:   name={}", self.scheduler.name);
    }

    /// JSON view of the effective settings.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "pool": {
                "name": self.pool.name,
                "workers": self.pool.resolved_workers(),
                "backlog_threshold": self.pool.backlog_threshold,
                "shutdown_poll_ms": self.pool.shutdown_poll_ms,
            },
            "scheduler": { "name": self.scheduler.name },
        })
    }
}

// ── Pool ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Thread name prefix and log identifier.
    #[serde(default = "default_pool_name")]
    pub name: String,
    /// Number of worker threads. 0 = available parallelism.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Queue depth above which a backlog warning is emitted.
    #[serde(default = "default_backlog_threshold")]
    pub backlog_threshold: usize,
    /// How often `stop` reports progress while waiting for termination.
    #[serde(default = "default_shutdown_poll_ms")]
    pub shutdown_poll_ms: u64,
}

fn default_pool_name() -> String { "worker".into() }
fn default_workers() -> usize { 1 }
fn default_backlog_threshold() -> usize { 1000 }
fn default_shutdown_poll_ms() -> u64 { 2000 }

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: default_pool_name(),
            workers: default_workers(),
            backlog_threshold: default_backlog_threshold(),
            shutdown_poll_ms: default_shutdown_poll_ms(),
        }
    }
}

impl PoolConfig {
    /// Resolve worker thread count (0 means use available parallelism).
    pub fn resolved_workers(&self) -> usize {
        if self.workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.workers
        }
    }

    pub fn shutdown_poll_interval(&self) -> Duration {
        Duration::from_millis(self.shutdown_poll_ms)
    }
}

// ── Scheduler ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Name of the lane thread.
    #[serde(default = "default_scheduler_name")]
    pub name: String,
}

fn default_scheduler_name() -> String { "scheduler".into() }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            name: default_scheduler_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = TasklineConfig::default();
        assert_eq!(cfg.pool.name, "worker");
        assert_eq!(cfg.pool.workers, 1);
        assert_eq!(cfg.pool.backlog_threshold, 1000);
        assert_eq!(cfg.pool.shutdown_poll_interval(), Duration::from_secs(2));
        assert_eq!(cfg.scheduler.name, "scheduler");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn parse_empty_toml_uses_defaults() {
        let cfg: TasklineConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.pool.workers, 1);
        assert_eq!(cfg.scheduler.name, "scheduler");
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[pool]
name = "listener-executor"
workers = 4
backlog_threshold = 50
shutdown_poll_ms = 250

[scheduler]
name = "Thread-Scheduled"
"#;
        let cfg: TasklineConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.pool.name, "listener-executor");
        assert_eq!(cfg.pool.resolved_workers(), 4);
        assert_eq!(cfg.pool.backlog_threshold, 50);
        assert_eq!(cfg.pool.shutdown_poll_interval(), Duration::from_millis(250));
        assert_eq!(cfg.scheduler.name, "Thread-Scheduled");
    }

    #[test]
    fn zero_workers_resolves_to_parallelism() {
        let cfg = PoolConfig {
            workers: 0,
            ..PoolConfig::default()
        };
        assert!(cfg.resolved_workers() > 0);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = TasklineConfig::default();
        cfg.pool.backlog_threshold = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = TasklineConfig::default();
        cfg.pool.shutdown_poll_ms = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = TasklineConfig::default();
        cfg.pool.name = "  ".into();
        assert!(cfg.validate().is_err());

        let mut cfg = TasklineConfig::default();
        cfg.scheduler.name = String::new();
        assert!(matches!(cfg.validate(), Err(TasklineError::Config(_))));
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let err = TasklineConfig::from_toml("[pool\nworkers = 2").unwrap_err();
        assert!(matches!(err, TasklineError::ConfigParse(_)));
    }

    #[test]
    fn summary_reports_resolved_values() {
        let cfg = TasklineConfig::default();
        let json = cfg.summary();
        assert_eq!(json["pool"]["name"], "worker");
        assert_eq!(json["pool"]["workers"], 1);
        assert_eq!(json["scheduler"]["name"], "scheduler");
    }

    #[test]
    fn from_file_missing_is_io_error() {
        let path = std::env::temp_dir().join(format!("taskline-missing-{}.toml", uuid::Uuid::new_v4()));
        let err = TasklineConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, TasklineError::ConfigIo(_)));
    }

    #[test]
    fn from_file_reads_toml() {
        let path = std::env::temp_dir().join(format!("taskline-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[pool]\nbacklog_threshold = 7\n").unwrap();
        let cfg = TasklineConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(cfg.pool.backlog_threshold, 7);
    }
}
