//! Server configuration.
//!
//! The server reads a single TOML file. Every key except the notifier list
//! has a default, so an empty file starts an open-access server on
//! `127.0.0.1:8090` with no notifiers.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use alertline_core::config::defaults;
use alertline_core::{Error, Result, SourceId, UserId, ZonedClock};
use alertline_engine::SelfReportConfig;
use alertline_notifiers::{build_notifiers, NotifierConfig};

fn default_listen_address() -> String {
    defaults::LISTEN_ADDRESS.to_string()
}

fn default_listen_port() -> u16 {
    defaults::LISTEN_PORT
}

fn default_write_timeout() -> u64 {
    defaults::SERVER_WRITE_TIMEOUT_SECS
}

fn default_time_zone() -> String {
    defaults::TIME_ZONE.to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(defaults::DATA_DIR)
}

fn default_log_level() -> String {
    defaults::LOG_LEVEL.to_string()
}

fn default_self_report_app() -> String {
    defaults::SELF_REPORT_APP.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Time allowed for receiving a request body. 0 disables the limit.
    #[serde(default)]
    pub server_read_timeout_secs: u64,
    /// Time allowed for handling a request. 0 falls back to the default.
    #[serde(default = "default_write_timeout")]
    pub server_write_timeout_secs: u64,
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Link prefix used by notifiers that render report links.
    #[serde(default)]
    pub public_path: String,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub self_report: SelfReportSection,
    /// Absent means every request is anonymous.
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    #[serde(default)]
    pub notifiers: Vec<NotifierConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfReportSection {
    #[serde(default = "default_self_report_app")]
    pub app: String,
    #[serde(default)]
    pub instance: Option<String>,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

impl Default for SelfReportSection {
    fn default() -> Self {
        Self {
            app: default_self_report_app(),
            instance: None,
            user_id: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Header set by a trusted reverse proxy.
    #[serde(default)]
    pub remote_user_header: Option<String>,
    #[serde(default)]
    pub users: HashMap<String, UserId>,
    /// Identity for requests that carry no credentials. Development only.
    #[serde(default)]
    pub fallback_user_id: Option<UserId>,
    #[serde(default)]
    pub api_tokens: Vec<ApiToken>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiToken {
    /// Lowercase sha256 hex of the raw token.
    pub token_hash: String,
    pub client_id: String,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            listen_port: default_listen_port(),
            server_read_timeout_secs: 0,
            server_write_timeout_secs: default_write_timeout(),
            time_zone: default_time_zone(),
            data_dir: default_data_dir(),
            public_path: String::new(),
            log: LogConfig::default(),
            self_report: SelfReportSection::default(),
            auth: None,
            notifiers: Vec::new(),
        }
    }
}

impl Config {
    /// Read, parse and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfiguration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&content)?;
        info!(
            category = "config",
            path = %path.display(),
            notifiers = config.notifiers.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(content)
            .map_err(|e| Error::InvalidConfiguration(e.to_string()))?;
        if config.server_write_timeout_secs == 0 {
            config.server_write_timeout_secs = default_write_timeout();
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;
        self.clock()?;

        if self.self_report.app.trim().is_empty() {
            return Err(Error::InvalidConfiguration(
                "self_report.app must not be empty".to_string(),
            ));
        }

        if let Some(auth) = &self.auth {
            for token in &auth.api_tokens {
                if token.client_id.is_empty() {
                    return Err(Error::InvalidConfiguration(
                        "api token without client_id".to_string(),
                    ));
                }
                let valid_hash = token.token_hash.len() == 64
                    && token.token_hash.chars().all(|c| c.is_ascii_hexdigit());
                if !valid_hash {
                    return Err(Error::InvalidConfiguration(format!(
                        "token_hash of client `{}` is not a sha256 hex digest",
                        token.client_id
                    )));
                }
            }
        }

        build_notifiers(&self.notifier_configs()).map_err(Error::from)?;
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.listen_address.parse().map_err(|e| {
            Error::InvalidConfiguration(format!(
                "invalid listen address {}: {}",
                self.listen_address, e
            ))
        })?;
        Ok(SocketAddr::new(ip, self.listen_port))
    }

    pub fn clock(&self) -> Result<ZonedClock> {
        ZonedClock::from_name(&self.time_zone)
    }

    /// Notifier entries with `public_path` filled in as their `public_url`
    /// unless they set one themselves.
    pub fn notifier_configs(&self) -> Vec<NotifierConfig> {
        let public_url = self.public_path.trim_end_matches('/');
        self.notifiers
            .iter()
            .cloned()
            .map(|mut notifier| {
                if public_url.is_empty() {
                    return notifier;
                }
                if notifier.args.is_null() {
                    notifier.args = serde_json::Value::Object(serde_json::Map::new());
                }
                if let Some(args) = notifier.args.as_object_mut() {
                    args.entry("public_url")
                        .or_insert_with(|| serde_json::Value::String(public_url.to_string()));
                }
                notifier
            })
            .collect()
    }

    pub fn self_report_config(&self) -> SelfReportConfig {
        let mut source = SourceId::new(self.self_report.app.clone());
        source.instance = self.self_report.instance.clone();
        SelfReportConfig {
            source: source.normalized(),
            user_id: self.self_report.user_id,
        }
    }

    /// One line per setting, for `check-config`.
    pub fn summary(&self) -> Vec<String> {
        let mut lines = vec![
            format!("listen: {}:{}", self.listen_address, self.listen_port),
            format!("time zone: {}", self.time_zone),
            format!("data dir: {}", self.data_dir.display()),
            format!(
                "timeouts: read {}s, write {}s",
                self.server_read_timeout_secs, self.server_write_timeout_secs
            ),
            format!("self-report source: {}", self.self_report_config().source.label()),
        ];
        match &self.auth {
            None => lines.push("auth: disabled (anonymous access)".to_string()),
            Some(auth) => lines.push(format!(
                "auth: {} users, {} api tokens, remote user header {}, fallback user {}",
                auth.users.len(),
                auth.api_tokens.len(),
                auth.remote_user_header.as_deref().unwrap_or("-"),
                auth.fallback_user_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string())
            )),
        }
        for notifier in &self.notifiers {
            lines.push(format!("notifier: {} ({})", notifier.name, notifier.notifier_type));
        }
        lines
    }
}
