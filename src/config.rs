use std::net::IpAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub encryption_key: String,
    pub host: IpAddr,
    pub port: u16,
    pub provider_api_url: String,
    pub link_service_url: String,
    pub adapter_timeout: Duration,
    pub link_session_ttl: Duration,
    pub max_body_size: usize,
    pub allowed_origins: Vec<String>,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_required("DATABASE_URL")?;
        let jwt_secret = env_required("JWT_SECRET")?;
        let encryption_key = env_required("CLOUDLENS_ENCRYPTION_KEY")?;

        let host: IpAddr = env_or("CLOUDLENS_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid CLOUDLENS_HOST: {e}"))?;

        let port: u16 = env_or("CLOUDLENS_PORT", "4000")
            .parse()
            .map_err(|e| format!("Invalid CLOUDLENS_PORT: {e}"))?;

        let provider_api_url = env_or("CLOUDLENS_PROVIDER_API_URL", "http://localhost:8080")
            .trim_end_matches('/')
            .to_string();

        let link_service_url = env_or("CLOUDLENS_LINK_SERVICE_URL", "http://localhost:8081")
            .trim_end_matches('/')
            .to_string();

        let adapter_timeout_secs: u64 = env_or("CLOUDLENS_ADAPTER_TIMEOUT_SECS", "30")
            .parse()
            .map_err(|e| format!("Invalid CLOUDLENS_ADAPTER_TIMEOUT_SECS: {e}"))?;

        let link_session_ttl_secs: u64 = env_or("CLOUDLENS_LINK_SESSION_TTL_SECS", "3600")
            .parse()
            .map_err(|e| format!("Invalid CLOUDLENS_LINK_SESSION_TTL_SECS: {e}"))?;

        let max_body_size: usize = env_or("CLOUDLENS_MAX_BODY_SIZE", "1048576")
            .parse()
            .map_err(|e| format!("Invalid CLOUDLENS_MAX_BODY_SIZE: {e}"))?;

        let allowed_origins: Vec<String> = env_or("CLOUDLENS_ALLOWED_ORIGINS", "")
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let log_level = env_or("CLOUDLENS_LOG_LEVEL", "info");

        if jwt_secret.len() < 16 {
            return Err("JWT_SECRET must be at least 16 characters".to_string());
        }

        Ok(Config {
            database_url,
            jwt_secret,
            encryption_key,
            host,
            port,
            provider_api_url,
            link_service_url,
            adapter_timeout: Duration::from_secs(adapter_timeout_secs),
            link_session_ttl: Duration::from_secs(link_session_ttl_secs),
            max_body_size,
            allowed_origins,
            log_level,
        })
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
