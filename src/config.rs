use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub wave_api_url: String,
    pub wave_api_key: String,
    /// Bound on every outbound provider call; on expiry the operation
    /// surfaces a retryable PROVIDER_UNAVAILABLE error.
    pub wave_timeout_secs: u64,
    pub invoice_prefix: String,
    pub quotation_prefix: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/facturio".to_string()),
            bind_address: std::env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            wave_api_url: std::env::var("WAVE_API_URL")
                .unwrap_or_else(|_| "https://api.wave.com".to_string()),
            wave_api_key: std::env::var("WAVE_API_KEY").unwrap_or_default(),
            wave_timeout_secs: std::env::var("WAVE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
            invoice_prefix: std::env::var("INVOICE_PREFIX")
                .unwrap_or_else(|_| "INV".to_string()),
            quotation_prefix: std::env::var("QUOTATION_PREFIX")
                .unwrap_or_else(|_| "PRO".to_string()),
        })
    }
}
