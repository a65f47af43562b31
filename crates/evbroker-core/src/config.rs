use std::env;
use std::path::PathBuf;

/// Runtime configuration for the engine, resolved entirely from environment
/// variables with documented fallback defaults.
///
/// `DATA_DIR` and `CONFIG_DIR` are kept distinct because topic configuration
/// and individual events live under separate roots: `TopicStore` is
/// constructed against `config_dir`, `EventStore` against `data_dir`, the way
/// a caller wires `EngineConfig::from_env()`'s two paths into the two stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub config_dir: PathBuf,
    pub max_body_bytes: u64,
    pub rate_limit_per_minute: u32,
    pub multi_tenant_enabled: bool,
    pub auth_enabled: bool,
    pub system_admin_email: String,
    pub system_admin_password: String,
}

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_CONFIG_DIR: &str = "./config";
const DEFAULT_MAX_BODY_BYTES: u64 = 1024 * 1024;
const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 600;
const DEFAULT_SYSTEM_ADMIN_EMAIL: &str = "admin@localhost";

impl EngineConfig {
    /// Resolve configuration from the process environment. Every variable
    /// falls back to a documented default except `SYSTEM_ADMIN_PASSWORD`,
    /// which has no safe default and is generated fresh when absent so that
    /// bootstrap always has a usable (if unknown-to-the-caller) credential.
    pub fn from_env() -> Self {
        Self {
            port: env_parsed("PORT").unwrap_or(DEFAULT_PORT),
            data_dir: env::var("DATA_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR)),
            config_dir: env::var("CONFIG_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_DIR)),
            max_body_bytes: env_parsed("MAX_BODY_BYTES").unwrap_or(DEFAULT_MAX_BODY_BYTES),
            rate_limit_per_minute: env_parsed("RATE_LIMIT_PER_MINUTE").unwrap_or(DEFAULT_RATE_LIMIT_PER_MINUTE),
            multi_tenant_enabled: env_bool("MULTI_TENANT_ENABLED", false),
            auth_enabled: env_bool("AUTH_ENABLED", true),
            system_admin_email: env::var("SYSTEM_ADMIN_EMAIL").unwrap_or_else(|_| DEFAULT_SYSTEM_ADMIN_EMAIL.to_string()),
            system_admin_password: env::var("SYSTEM_ADMIN_PASSWORD").unwrap_or_else(|_| generate_admin_password()),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn generate_admin_password() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
