//! RON configuration for the terminal client.
//!
//! Every field has a default, so a missing file or a partial file is fine.
//! Command-line flags override what the file says.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chat_core::{ChatMode, DEFAULT_TITLE};
use chat_engine::TransportSettings;
use chat_logging::{LogDestination, LogSettings};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;
use crate::render::Banner;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
    #[error("invalid log level `{0}`")]
    LogLevel(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub endpoint: String,
    pub mode: ChatMode,
    pub title: Option<String>,
    pub placeholder: Option<String>,
    pub connect_timeout_secs: u64,
    /// No deadline unless set; long answers can take a while to stream.
    pub request_timeout_secs: Option<u64>,
    pub max_response_bytes: u64,
    pub log: LogDestination,
    pub log_file: PathBuf,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let transport = TransportSettings::default();
        let logging = LogSettings::default();
        Self {
            endpoint: transport.endpoint,
            mode: ChatMode::default(),
            title: None,
            placeholder: None,
            connect_timeout_secs: transport.connect_timeout.as_secs(),
            request_timeout_secs: transport.request_timeout.map(|t| t.as_secs()),
            max_response_bytes: transport.max_bytes,
            log: logging.destination,
            log_file: logging.file,
            log_level: logging.level.to_string().to_ascii_lowercase(),
        }
    }
}

/// Load `path`, falling back to defaults when the file does not exist.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(AppConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    ron::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl AppConfig {
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(endpoint) = &cli.endpoint {
            self.endpoint = endpoint.clone();
        }
        if let Some(mode) = cli.mode {
            self.mode = mode;
        }
    }

    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            endpoint: self.endpoint.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: self.request_timeout_secs.map(Duration::from_secs),
            max_bytes: self.max_response_bytes,
        }
    }

    pub fn log_settings(&self) -> Result<LogSettings, ConfigError> {
        let level = log::LevelFilter::from_str(&self.log_level)
            .map_err(|_| ConfigError::LogLevel(self.log_level.clone()))?;
        Ok(LogSettings {
            destination: self.log,
            file: self.log_file.clone(),
            level,
        })
    }

    pub fn banner(&self) -> Banner {
        Banner {
            title: self.title.clone().unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            subtitle: self.mode.default_subtitle().to_string(),
            placeholder: self
                .placeholder
                .clone()
                .unwrap_or_else(|| self.mode.default_placeholder().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::Parser;
    use pretty_assertions::assert_eq;
    use tempfile::{NamedTempFile, TempDir};

    use super::*;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(content.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&dir.path().join("absent.ron")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.endpoint, "http://localhost:8000/query");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let file = write_config(
            r#"(
                endpoint: "http://rag.internal/query",
                mode: infra,
                request_timeout_secs: Some(120),
                log: both,
            )"#,
        );
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.endpoint, "http://rag.internal/query");
        assert_eq!(config.mode, ChatMode::Infra);
        assert_eq!(config.log, LogDestination::Both);
        assert_eq!(config.connect_timeout_secs, 10);

        let transport = config.transport_settings();
        assert_eq!(transport.request_timeout, Some(Duration::from_secs(120)));
        assert_eq!(transport.max_bytes, 16 * 1024 * 1024);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let file = write_config("(endpoint: 42");
        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "{err}");
    }

    #[test]
    fn bad_log_level_is_rejected() {
        let config = AppConfig {
            log_level: "chatty".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(
            config.log_settings(),
            Err(ConfigError::LogLevel(level)) if level == "chatty"
        ));
    }

    #[test]
    fn cli_flags_override_file_values() {
        let mut config = AppConfig::default();
        let cli = Cli::try_parse_from([
            "chat_app",
            "--endpoint",
            "http://other/query",
            "--mode",
            "infra",
        ])
        .unwrap();
        config.apply_cli(&cli);

        assert_eq!(config.endpoint, "http://other/query");
        assert_eq!(config.mode, ChatMode::Infra);
    }

    #[test]
    fn banner_falls_back_to_mode_strings() {
        let config = AppConfig {
            mode: ChatMode::Infra,
            title: Some("Ops Desk".to_string()),
            ..AppConfig::default()
        };
        let banner = config.banner();
        assert_eq!(banner.title, "Ops Desk");
        assert_eq!(banner.placeholder, ChatMode::Infra.default_placeholder());
    }

    #[test]
    fn both_modes_share_the_default_title() {
        for mode in [ChatMode::Rag, ChatMode::Infra] {
            let config = AppConfig {
                mode,
                ..AppConfig::default()
            };
            let banner = config.banner();
            assert_eq!(banner.title, DEFAULT_TITLE);
            assert_eq!(banner.subtitle, mode.default_subtitle());
        }
    }
}
