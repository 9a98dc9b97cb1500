use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub paths: PathsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub admission: AdmissionConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub alert: Option<AlertConfig>,
}

/// Which portal driver backend the server wires in.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PortalConfig {
    #[serde(default)]
    pub backend: PortalBackend,
}

/// Available driver backends. `Simulated` performs no portal traffic and
/// reports no results; real backends are wired in by the embedding
/// deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PortalBackend {
    #[default]
    Simulated,
}

/// Filesystem layout for downloads, organized artifacts and the checkpoint database.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Where portal sessions drop their raw downloads before they are moved.
    pub download_dir: PathBuf,
    /// Root of the organized artifact tree (company/accountant/period/entity).
    pub xml_dir: PathBuf,
    /// SQLite database holding per-job entity checkpoints.
    #[serde(default = "default_db_path")]
    pub database: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("harvester.db")
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

/// Resource admission thresholds and the advisory monitor loop interval.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdmissionConfig {
    /// Refuse new attempts while RAM utilization is at or above this percentage.
    #[serde(default = "default_max_ram")]
    pub max_ram_percent: f32,
    /// Advisory CPU ceiling, logged by the monitor loop when breached.
    #[serde(default = "default_max_cpu")]
    pub max_cpu_percent: f32,
    /// Advisory ceiling on concurrently open portal sessions.
    #[serde(default = "default_max_sessions")]
    pub max_portal_sessions: usize,
    /// How often the monitor loop samples CPU/RAM/sessions (seconds).
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval_secs: u64,
    /// How long a blocked entity waits before re-polling admission (milliseconds).
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_max_ram() -> f32 {
    85.0
}

fn default_max_cpu() -> f32 {
    80.0
}

fn default_max_sessions() -> usize {
    10
}

fn default_monitor_interval() -> u64 {
    60
}

fn default_backoff_ms() -> u64 {
    30_000
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_ram_percent: default_max_ram(),
            max_cpu_percent: default_max_cpu(),
            max_portal_sessions: default_max_sessions(),
            monitor_interval_secs: default_monitor_interval(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

/// Retry bounds and scheduling knobs for job processing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrchestratorConfig {
    /// Maximum attempts per entity before it is marked as errored.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Cooldown between attempts (milliseconds).
    #[serde(default = "default_cooldown_ms")]
    pub attempt_cooldown_ms: u64,
    /// Bounded corrective re-fills when the portal flags a required date field.
    #[serde(default = "default_fill_corrections")]
    pub max_fill_corrections: u32,
    /// Bounded sub-retries for transient in-portal download failures.
    #[serde(default = "default_download_retries")]
    pub max_download_retries: u32,
    /// Result counts above this go through the paged bulk download.
    #[serde(default = "default_paged_threshold")]
    pub paged_threshold: u64,
    /// Number of result pages requested per paged-download window.
    #[serde(default = "default_page_window")]
    pub page_window: u32,
    /// Maximum days per search period, imposed by the portal.
    #[serde(default = "default_period_days")]
    pub period_days: i64,
    /// Size of the job worker pool. Jobs beyond this queue up.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_cooldown_ms() -> u64 {
    2_000
}

fn default_fill_corrections() -> u32 {
    3
}

fn default_download_retries() -> u32 {
    5
}

fn default_paged_threshold() -> u64 {
    10_000
}

fn default_page_window() -> u32 {
    500
}

fn default_period_days() -> i64 {
    30
}

fn default_workers() -> usize {
    2
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            attempt_cooldown_ms: default_cooldown_ms(),
            max_fill_corrections: default_fill_corrections(),
            max_download_retries: default_download_retries(),
            paged_threshold: default_paged_threshold(),
            page_window: default_page_window(),
            period_days: default_period_days(),
            workers: default_workers(),
        }
    }
}

/// Alert sink configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertConfig {
    /// Webhook URL receiving free-text job reports (best-effort).
    pub webhook_url: String,
    /// Request timeout in seconds (default: 10)
    #[serde(default = "default_alert_timeout")]
    pub timeout_secs: u32,
}

fn default_alert_timeout() -> u32 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_config() {
        let toml = r#"
[paths]
download_dir = "/data/downloads"
xml_dir = "/data/xmls"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.paths.download_dir.to_str().unwrap(), "/data/downloads");
        assert_eq!(config.paths.database.to_str().unwrap(), "harvester.db");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.portal.backend, PortalBackend::Simulated);
        assert!(config.alert.is_none());
    }

    #[test]
    fn test_deserialize_missing_paths_fails() {
        let toml = r#"
[server]
port = 8080
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_admission_defaults() {
        let config = AdmissionConfig::default();
        assert_eq!(config.max_ram_percent, 85.0);
        assert_eq!(config.max_cpu_percent, 80.0);
        assert_eq!(config.max_portal_sessions, 10);
        assert_eq!(config.monitor_interval_secs, 60);
        assert_eq!(config.backoff_ms, 30_000);
    }

    #[test]
    fn test_orchestrator_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.attempt_cooldown_ms, 2_000);
        assert_eq!(config.max_fill_corrections, 3);
        assert_eq!(config.max_download_retries, 5);
        assert_eq!(config.paged_threshold, 10_000);
        assert_eq!(config.page_window, 500);
        assert_eq!(config.period_days, 30);
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
[paths]
download_dir = "/tmp/dl"
xml_dir = "/tmp/xml"
database = "/tmp/harvester.db"

[server]
host = "127.0.0.1"
port = 9000

[admission]
max_ram_percent = 90.0
backoff_ms = 1000

[orchestrator]
max_attempts = 3
workers = 4

[alert]
webhook_url = "https://hooks.example.com/abc"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.admission.max_ram_percent, 90.0);
        assert_eq!(config.admission.backoff_ms, 1000);
        assert_eq!(config.orchestrator.max_attempts, 3);
        assert_eq!(config.orchestrator.workers, 4);
        let alert = config.alert.unwrap();
        assert_eq!(alert.webhook_url, "https://hooks.example.com/abc");
        assert_eq!(alert.timeout_secs, 10);
    }
}
