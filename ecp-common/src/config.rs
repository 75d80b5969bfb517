//! Service configuration
//!
//! Values resolve in priority order:
//! 1. Environment variables (`ECP_*`)
//! 2. TOML config file (optional)
//! 3. Compiled defaults (only for bind address, database path and bucket)
//!
//! Every missing required value is reported in a single `Error::Config`
//! so a misconfigured deployment fails fast with the full list.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::{Error, Result};

/// Default HTTP bind address
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5740";

/// Default object storage bucket for uploads
pub const DEFAULT_STORAGE_BUCKET: &str = "raw";

/// Contents of the optional TOML config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    pub bind_addr: Option<String>,
    pub database_path: Option<PathBuf>,
    pub app_base_url: Option<String>,
    pub notify_webhook_url: Option<String>,
    pub reprocess_webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub n8n_callback_secret: Option<String>,
    pub reprocess_callback_secret: Option<String>,
    pub storage_url: Option<String>,
    pub storage_anon_key: Option<String>,
    pub storage_service_key: Option<String>,
    pub storage_bucket: Option<String>,
    pub pdf_renderer_url: Option<String>,
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
        })
    }
}

/// Resolved configuration for the API service
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_path: PathBuf,
    /// Public base URL, used to build callback URLs handed to the automation
    pub app_base_url: String,
    /// Automation webhook receiving batch notifications
    pub notify_webhook_url: String,
    /// Automation webhook receiving reprocessing requests
    pub reprocess_webhook_url: String,
    /// Sent as `X-Webhook-Secret` on outbound webhook calls
    pub webhook_secret: String,
    /// Expected `x-n8n-token` on automation callbacks
    pub n8n_callback_secret: String,
    /// Expected `x-reprocess-secret` on reprocessing callbacks
    pub reprocess_callback_secret: String,
    /// Storage and identity service base URL
    pub storage_url: String,
    pub storage_anon_key: String,
    pub storage_service_key: String,
    pub storage_bucket: String,
    /// Headless-browser print service (POST HTML, receive PDF)
    pub pdf_renderer_url: String,
}

impl AppConfig {
    /// Load from an optional TOML file plus the process environment
    pub fn load(toml_path: Option<&Path>) -> Result<Self> {
        let toml = match toml_path {
            Some(path) => TomlConfig::from_file(path)?,
            None => TomlConfig::default(),
        };
        Self::resolve(toml, |key| std::env::var(key).ok())
    }

    /// Resolve from a parsed TOML config and an environment lookup
    pub fn resolve<F>(toml: TomlConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing: Vec<&'static str> = Vec::new();

        let mut pick = |env_key: &'static str, toml_value: Option<String>, required: bool| {
            let env_value = env(env_key).filter(|v| !v.trim().is_empty());
            let toml_value = toml_value.filter(|v| !v.trim().is_empty());
            if env_value.is_some() && toml_value.is_some() {
                warn!("{} set in both environment and TOML; using environment", env_key);
            }
            let value = env_value.or(toml_value);
            if value.is_none() && required {
                missing.push(env_key);
            }
            value.unwrap_or_default()
        };

        let bind_addr = pick("ECP_BIND_ADDR", toml.bind_addr, false);
        let database_path = pick(
            "ECP_DATABASE_PATH",
            toml.database_path.map(|p| p.to_string_lossy().into_owned()),
            false,
        );
        let app_base_url = pick("ECP_APP_BASE_URL", toml.app_base_url, true);
        let notify_webhook_url = pick("ECP_N8N_WEBHOOK_URL", toml.notify_webhook_url, true);
        let reprocess_webhook_url = pick(
            "ECP_N8N_REPROCESS_WEBHOOK_URL",
            toml.reprocess_webhook_url,
            true,
        );
        let webhook_secret = pick("ECP_WEBHOOK_SECRET", toml.webhook_secret, true);
        let n8n_callback_secret = pick("ECP_N8N_CALLBACK_SECRET", toml.n8n_callback_secret, true);
        let reprocess_callback_secret = pick(
            "ECP_REPROCESS_CALLBACK_SECRET",
            toml.reprocess_callback_secret,
            true,
        );
        let storage_url = pick("ECP_STORAGE_URL", toml.storage_url, true);
        let storage_anon_key = pick("ECP_STORAGE_ANON_KEY", toml.storage_anon_key, true);
        let storage_service_key = pick("ECP_STORAGE_SERVICE_KEY", toml.storage_service_key, true);
        let storage_bucket = pick("ECP_STORAGE_BUCKET", toml.storage_bucket, false);
        let pdf_renderer_url = pick("ECP_PDF_RENDERER_URL", toml.pdf_renderer_url, true);

        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "Missing required configuration: {}",
                missing.join(", ")
            )));
        }

        Ok(Self {
            bind_addr: non_empty_or(bind_addr, DEFAULT_BIND_ADDR),
            database_path: if database_path.is_empty() {
                default_database_path()
            } else {
                PathBuf::from(database_path)
            },
            app_base_url: app_base_url.trim_end_matches('/').to_string(),
            notify_webhook_url,
            reprocess_webhook_url,
            webhook_secret,
            n8n_callback_secret,
            reprocess_callback_secret,
            storage_url: storage_url.trim_end_matches('/').to_string(),
            storage_anon_key,
            storage_service_key,
            storage_bucket: non_empty_or(storage_bucket, DEFAULT_STORAGE_BUCKET),
            pdf_renderer_url,
        })
    }
}

fn non_empty_or(value: String, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value
    }
}

/// Platform data directory, falling back to the working directory
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ecp")
        .join("ecp.db")
}
