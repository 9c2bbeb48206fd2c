//! Service configuration.

use adforge_core::{MediaRef, PricingConfig};

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/adforge").
    pub data_dir: String,

    /// Shared secret for validating caller JWTs (HS256).
    pub auth_jwt_secret: Option<String>,

    /// Expected JWT audience (default: "adforge").
    pub auth_audience: String,

    /// Service API key for the worker's reconciliation callbacks.
    pub service_api_key: Option<String>,

    /// Shared secret for payment webhook signatures (optional).
    pub payment_webhook_secret: Option<String>,

    /// URL of the external generation worker's enqueue endpoint.
    pub worker_url: Option<String>,

    /// API key sent with worker handoff requests.
    pub worker_api_key: Option<String>,

    /// Base URL for resolving media references to public URLs.
    pub media_base_url: String,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Fail-and-refund jobs pending longer than this (seconds).
    pub pending_job_timeout_seconds: u64,

    /// How often the reaper scans for stale jobs (seconds).
    pub reaper_interval_seconds: u64,

    /// Pricing configuration.
    pub pricing: PricingConfig,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/adforge".into()),
            auth_jwt_secret: std::env::var("AUTH_JWT_SECRET").ok(),
            auth_audience: std::env::var("AUTH_AUDIENCE").unwrap_or_else(|_| "adforge".into()),
            service_api_key: std::env::var("SERVICE_API_KEY").ok(),
            payment_webhook_secret: std::env::var("PAYMENT_WEBHOOK_SECRET").ok(),
            worker_url: std::env::var("WORKER_URL").ok(),
            worker_api_key: std::env::var("WORKER_API_KEY").ok(),
            media_base_url: std::env::var("MEDIA_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8081/media".into()),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: std::env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024 * 1024), // 1MB
            request_timeout_seconds: std::env::var("REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            pending_job_timeout_seconds: std::env::var("PENDING_JOB_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(15 * 60),
            reaper_interval_seconds: std::env::var("REAPER_INTERVAL_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
            pricing: PricingConfig::default(),
        }
    }

    /// Resolve a blob-store reference to a public URL.
    #[must_use]
    pub fn media_url(&self, media_ref: &MediaRef) -> String {
        format!(
            "{}/{}",
            self.media_base_url.trim_end_matches('/'),
            media_ref.as_str()
        )
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/adforge".into(),
            auth_jwt_secret: None,
            auth_audience: "adforge".into(),
            service_api_key: None,
            payment_webhook_secret: None,
            worker_url: None,
            worker_api_key: None,
            media_base_url: "http://localhost:8081/media".into(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            pending_job_timeout_seconds: 15 * 60,
            reaper_interval_seconds: 60,
            pricing: PricingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_url_joins_cleanly() {
        let mut config = ServiceConfig::default();
        config.media_base_url = "https://cdn.example.com/media/".into();

        assert_eq!(
            config.media_url(&MediaRef::new("blob/out-1")),
            "https://cdn.example.com/media/blob/out-1"
        );
    }
}
