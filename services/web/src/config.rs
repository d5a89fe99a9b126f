//! Server settings assembled from defaults and the environment

use anyhow::{Context, Result};
use axum_extra::extract::cookie::Key;
use serde::Deserialize;
use std::path::PathBuf;

/// Minimum length of `SESSION_SECRET`, the size of a cookie signing key
pub const MIN_SESSION_SECRET_LEN: usize = 64;

/// HTTP server configuration
///
/// # Environment Variables
/// - `SESSION_SECRET`: Cookie signing secret, at least 64 bytes (required)
/// - `BIND_ADDRESS`: Listen address (default: "0.0.0.0:8000")
/// - `UPLOAD_DIR`: Directory for transient uploads (default: "temp_uploads")
/// - `BODY_LIMIT_MB`: Maximum request body size (default: 5)
/// - `SESSION_TTL_SECONDS`: Server-side session lifetime (default: 604800)
/// - `SESSION_COOKIE_SECURE`: Mark the session cookie `Secure` (default: false)
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub session_secret: String,
    pub bind_address: String,
    pub upload_dir: PathBuf,
    pub body_limit_mb: usize,
    pub session_ttl_seconds: u64,
    pub session_cookie_secure: bool,
}

impl ServerConfig {
    /// Load the configuration from the process environment
    pub fn from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("bind_address", "0.0.0.0:8000")?
            .set_default("upload_dir", "temp_uploads")?
            .set_default("body_limit_mb", 5)?
            .set_default("session_ttl_seconds", 604_800)?
            .set_default("session_cookie_secure", false)?
            .add_source(config::Environment::default().try_parsing(true))
            .build()?;

        let config: ServerConfig = settings
            .try_deserialize()
            .context("Invalid server configuration (is SESSION_SECRET set?)")?;

        config.cookie_key()?;
        Ok(config)
    }

    /// Key signing the session cookie
    pub fn cookie_key(&self) -> Result<Key> {
        if self.session_secret.len() < MIN_SESSION_SECRET_LEN {
            anyhow::bail!(
                "SESSION_SECRET must be at least {} bytes, got {}",
                MIN_SESSION_SECRET_LEN,
                self.session_secret.len()
            );
        }

        Key::try_from(self.session_secret.as_bytes())
            .map_err(|e| anyhow::anyhow!("Unusable SESSION_SECRET: {:?}", e))
    }

    pub fn body_limit_bytes(&self) -> usize {
        self.body_limit_mb * 1024 * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 6] = [
        "SESSION_SECRET",
        "BIND_ADDRESS",
        "UPLOAD_DIR",
        "BODY_LIMIT_MB",
        "SESSION_TTL_SECONDS",
        "SESSION_COOKIE_SECURE",
    ];

    fn clear_env() {
        for var in VARS {
            unsafe {
                std::env::remove_var(var);
            }
        }
    }

    #[test]
    #[serial]
    fn defaults_apply_when_only_secret_is_set() {
        clear_env();
        unsafe {
            std::env::set_var("SESSION_SECRET", "s".repeat(64));
        }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:8000");
        assert_eq!(config.upload_dir, PathBuf::from("temp_uploads"));
        assert_eq!(config.body_limit_bytes(), 5 * 1024 * 1024);
        assert_eq!(config.session_ttl_seconds, 604_800);
        assert!(!config.session_cookie_secure);

        clear_env();
    }

    #[test]
    #[serial]
    fn environment_overrides_defaults() {
        clear_env();
        unsafe {
            std::env::set_var("SESSION_SECRET", "k".repeat(80));
            std::env::set_var("BIND_ADDRESS", "127.0.0.1:9000");
            std::env::set_var("BODY_LIMIT_MB", "12");
            std::env::set_var("SESSION_COOKIE_SECURE", "true");
        }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.body_limit_mb, 12);
        assert!(config.session_cookie_secure);

        clear_env();
    }

    #[test]
    #[serial]
    fn missing_or_short_secret_is_rejected() {
        clear_env();
        assert!(ServerConfig::from_env().is_err());

        unsafe {
            std::env::set_var("SESSION_SECRET", "too-short");
        }
        assert!(ServerConfig::from_env().is_err());

        clear_env();
    }
}
