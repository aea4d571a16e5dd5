//! Runtime configuration.
//!
//! Settings come from an env-style file (`KEY="value"` per line) and may be
//! overridden by process environment variables of the same name. Everything is
//! resolved once into an [`AppConfig`] at start-up; nothing reads the
//! environment after that.

use anyhow::{Context, Result, anyhow, bail};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/viewtube-env";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_ACCESS_TOKEN_EXPIRY_SECS: u64 = 86_400;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

const KNOWN_KEYS: &[&str] = &[
    "DATABASE_PATH",
    "MEDIA_ROOT",
    "PUBLIC_BASE_URL",
    "VIEWTUBE_HOST",
    "VIEWTUBE_PORT",
    "ACCESS_TOKEN_SECRET",
    "ACCESS_TOKEN_EXPIRY_SECS",
    "MAX_UPLOAD_BYTES",
    "DEBUG_ERRORS",
    "LOG_FORMAT",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Raw values as found in the file and environment, before validation.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub database_path: Option<PathBuf>,
    pub media_root: Option<PathBuf>,
    pub public_base_url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub access_token_secret: Option<String>,
    pub access_token_expiry_secs: Option<u64>,
    pub max_upload_bytes: Option<usize>,
    pub debug_errors: Option<bool>,
    pub log_format: Option<LogFormat>,
}

/// Fully resolved settings shared by reference with the rest of the app.
#[derive(Clone)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub media_root: PathBuf,
    pub public_base_url: String,
    pub host: String,
    pub port: u16,
    pub access_token_secret: String,
    pub access_token_ttl: Duration,
    pub max_upload_bytes: usize,
    pub debug_errors: bool,
    pub log_format: LogFormat,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_path", &self.database_path)
            .field("media_root", &self.media_root)
            .field("public_base_url", &self.public_base_url)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("access_token_secret", &"<redacted>")
            .field("access_token_ttl", &self.access_token_ttl)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("debug_errors", &self.debug_errors)
            .field("log_format", &self.log_format)
            .finish()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

impl EnvConfig {
    /// Applies one `KEY=value` pair. Unknown keys are ignored so the same file
    /// can be shared with other tooling.
    pub fn apply(&mut self, key: &str, value: &str, origin: &str) -> Result<()> {
        match key {
            "DATABASE_PATH" => self.database_path = Some(PathBuf::from(value)),
            "MEDIA_ROOT" => self.media_root = Some(PathBuf::from(value)),
            "PUBLIC_BASE_URL" => {
                if !value.is_empty() {
                    self.public_base_url = Some(value.trim_end_matches('/').to_string());
                }
            }
            "VIEWTUBE_HOST" => {
                if !value.is_empty() {
                    self.host = Some(value.to_string());
                }
            }
            "VIEWTUBE_PORT" => {
                let port: u16 = value
                    .parse()
                    .with_context(|| format!("Parsing VIEWTUBE_PORT from {origin}"))?;
                self.port = Some(port);
            }
            "ACCESS_TOKEN_SECRET" => {
                if !value.is_empty() {
                    self.access_token_secret = Some(value.to_string());
                }
            }
            "ACCESS_TOKEN_EXPIRY_SECS" => {
                let secs: u64 = value
                    .parse()
                    .with_context(|| format!("Parsing ACCESS_TOKEN_EXPIRY_SECS from {origin}"))?;
                self.access_token_expiry_secs = Some(secs);
            }
            "MAX_UPLOAD_BYTES" => {
                let bytes: usize = value
                    .parse()
                    .with_context(|| format!("Parsing MAX_UPLOAD_BYTES from {origin}"))?;
                self.max_upload_bytes = Some(bytes);
            }
            "DEBUG_ERRORS" => {
                let flag = parse_bool(value)
                    .ok_or_else(|| anyhow!("DEBUG_ERRORS in {origin} must be a boolean"))?;
                self.debug_errors = Some(flag);
            }
            "LOG_FORMAT" => {
                self.log_format = Some(match value.to_ascii_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" | "text" | "" => LogFormat::Pretty,
                    other => bail!("unsupported LOG_FORMAT {other:?} in {origin}"),
                });
            }
            _ => {}
        }
        Ok(())
    }

    pub fn parse(content: &str, origin: &str) -> Result<Self> {
        let mut cfg = Self::default();
        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if let Some((key, value_raw)) = trimmed.split_once('=') {
                let value = value_raw.trim().trim_matches('"');
                cfg.apply(key.trim(), value, origin)?;
            }
        }
        Ok(cfg)
    }

    /// Lets variables from the process environment win over the file.
    pub fn overlay<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if KNOWN_KEYS.contains(&key.as_str()) {
                self.apply(&key, value.trim(), "the environment")?;
            }
        }
        Ok(())
    }
}

pub fn read_env_config(path: &Path) -> Result<Option<EnvConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    EnvConfig::parse(&content, &path.display().to_string()).map(Some)
}

impl AppConfig {
    pub fn resolve(cfg: EnvConfig) -> Result<Self> {
        let database_path = cfg
            .database_path
            .ok_or_else(|| anyhow!("DATABASE_PATH is not set"))?;
        let media_root = cfg
            .media_root
            .ok_or_else(|| anyhow!("MEDIA_ROOT is not set"))?;
        let access_token_secret = cfg
            .access_token_secret
            .ok_or_else(|| anyhow!("ACCESS_TOKEN_SECRET is not set"))?;
        let host = cfg.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = cfg.port.unwrap_or(DEFAULT_PORT);
        let public_base_url = cfg
            .public_base_url
            .unwrap_or_else(|| format!("http://{host}:{port}"));

        Ok(Self {
            database_path,
            media_root,
            public_base_url,
            host,
            port,
            access_token_secret,
            access_token_ttl: Duration::from_secs(
                cfg.access_token_expiry_secs
                    .unwrap_or(DEFAULT_ACCESS_TOKEN_EXPIRY_SECS),
            ),
            max_upload_bytes: cfg.max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            debug_errors: cfg.debug_errors.unwrap_or(false),
            log_format: cfg.log_format.unwrap_or_default(),
        })
    }
}

pub fn load_app_config() -> Result<AppConfig> {
    load_app_config_from(Path::new(DEFAULT_CONFIG_PATH))
}

/// Reads the file when present, then applies the process environment.
pub fn load_app_config_from(path: impl AsRef<Path>) -> Result<AppConfig> {
    let path = path.as_ref();
    let mut cfg = read_env_config(path)?.unwrap_or_default();
    cfg.overlay(std::env::vars())?;
    AppConfig::resolve(cfg).with_context(|| format!("Resolving configuration ({})", path.display()))
}
