use std::path::PathBuf;

use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes settings for the server and for logging.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server: ServerSettings,
    pub log: LogSettings,
}

/// Configuration settings for the server.
///
/// Defines the address the server binds to and how long shutdown may wait for
/// queued deliveries.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

impl ServerSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration settings for logging.
///
/// `file` is optional; when absent logs go to stdout.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    pub file: Option<PathBuf>,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values are filled from
/// defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub shutdown_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
    pub file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "0.0.0.0".to_string(),
                port: 50051,
                shutdown_timeout_secs: 30,
            },
            log: LogSettings {
                level: "info".to_string(),
                file: None,
            },
        }
    }
}

impl PartialSettings {
    /// Merges what was provided over the defaults. Empty strings count as
    /// absent.
    pub fn merge(self, default: Settings) -> Settings {
        let server = self.server;
        let log = self.log;
        let non_empty = |s: String| if s.is_empty() { None } else { Some(s) };

        Settings {
            server: ServerSettings {
                host: server
                    .as_ref()
                    .and_then(|s| s.host.clone())
                    .and_then(non_empty)
                    .unwrap_or(default.server.host),
                port: server
                    .as_ref()
                    .and_then(|s| s.port)
                    .unwrap_or(default.server.port),
                shutdown_timeout_secs: server
                    .as_ref()
                    .and_then(|s| s.shutdown_timeout_secs)
                    .unwrap_or(default.server.shutdown_timeout_secs),
            },
            log: LogSettings {
                level: log
                    .as_ref()
                    .and_then(|l| l.level.clone())
                    .and_then(non_empty)
                    .unwrap_or(default.log.level),
                file: log
                    .and_then(|l| l.file)
                    .filter(|f| !f.as_os_str().is_empty())
                    .or(default.log.file),
            },
        }
    }
}
