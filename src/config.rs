use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    pub postgres_url: String,
    pub provider: ProviderConfig,
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub import: ImportConfig,
    /// Shared secret the external scheduler and ops tooling must present.
    pub ops_secret: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_token: String,
    /// Per-request timeout for provider calls
    pub timeout_ms: u64,
    #[serde(default = "default_health_timeout_ms")]
    pub health_timeout_ms: u64,
    #[serde(default = "default_health_endpoint")]
    pub health_endpoint: String,
    #[serde(default = "default_movements_endpoint")]
    pub movements_endpoint: String,
}

fn default_health_timeout_ms() -> u64 {
    3_000
}

fn default_health_endpoint() -> String {
    "/v1/status".to_string()
}

fn default_movements_endpoint() -> String {
    "/v1/movements".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WebhookConfig {
    /// Shared secret for HMAC-SHA256 signature verification
    pub signing_secret: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetryConfig {
    /// Seconds between retry-queue scans
    pub scan_interval_secs: u64,
    /// Max automatic attempts per failed call
    pub max_attempts: i32,
    /// Failed calls older than this are no longer auto-retried
    pub max_age_hours: i64,
    /// A retry claim older than this is considered abandoned
    pub claim_stale_secs: i64,
    /// Upper bound on entries retried in one pass
    pub scan_batch_size: i64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: 30,
            max_attempts: 5,
            max_age_hours: 24,
            claim_stale_secs: 600,
            scan_batch_size: 100,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ImportConfig {
    /// Page size requested from the provider movement listing
    pub page_size: u32,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self { page_size: 200 }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Self {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .unwrap_or_else(|_| panic!("Failed to read config file: {}", config_path));
        serde_yaml::from_str(&content).expect("Failed to parse config yaml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialize() {
        let yaml = r#"
log_level: "info"
log_dir: "./logs"
log_file: "paybridge.log"
use_json: false
rotation: "daily"
gateway:
  host: "0.0.0.0"
  port: 8080
postgres_url: "postgres://localhost/paybridge"
provider:
  base_url: "https://api.provider.test"
  api_token: "tok_test"
  timeout_ms: 10000
webhook:
  signing_secret: "whsec_test"
ops_secret: "ops_test"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.provider.timeout_ms, 10_000);
        assert_eq!(config.provider.health_endpoint, "/v1/status");
        // Defaulted sections
        assert_eq!(config.retry.scan_interval_secs, 30);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.import.page_size, 200);
    }

    #[test]
    fn test_retry_config_override() {
        let yaml = r#"
scan_interval_secs: 10
max_attempts: 3
max_age_hours: 48
claim_stale_secs: 120
scan_batch_size: 20
"#;
        let retry: RetryConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.max_age_hours, 48);
    }
}
