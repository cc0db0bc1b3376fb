use std::str::FromStr;
use std::time::Duration;
use std::{env, fmt, fs, path};

use chrono_tz::Tz;
use logger::LogFormat;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::monitoring::lister::DEFAULT_LIST_TIMEOUT;
use crate::monitoring::scheduler::Schedule;
use crate::monitoring::validation::validate_timeout;

/// Default probe timeout is the schedule period divided by this
const TIMEOUT_SAFETY_FACTOR: u32 = 4;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read config {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: std::io::Error },
    #[error("Failed to write config {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: std::io::Error },
    #[error("Failed to parse config: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("No config path available: neither XDG_CONFIG_HOME nor HOME is set")]
    ConfigPathUnavailable,
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub schedule: ScheduleConfig,
    pub probe: ProbeConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Cron expression or `every <n><s|m|h>`
    pub cadence: String,
    /// IANA timezone the cron expression is evaluated in
    pub timezone: String,
    pub run_on_start: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Derived from the schedule period when unset
    pub timeout_seconds: Option<u64>,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: usize,
    /// A target listing slower than this aborts the cycle
    pub list_timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `compact` or `json`
    pub format: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cadence: "*/5 * * * *".into(),
            timezone: "America/Los_Angeles".into(),
            run_on_start: false,
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self { timeout_seconds: None, user_agent: concat!("project-monitor/", env!("CARGO_PKG_VERSION")).into() }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "monitor.db".into(),
            max_connections: 16,
            list_timeout_seconds: DEFAULT_LIST_TIMEOUT.as_secs(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { enabled: true, bind: "0.0.0.0".into(), port: 8080 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".into(), format: "compact".into() }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/project-monitor/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("project-monitor/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        let timeout = match self.probe.timeout_seconds {
            Some(seconds) => format!("{seconds}s"),
            None => "derived from schedule".to_string(),
        };

        writeln!(f, "Current Configuration State:")?;
        write_title_1(f, "Schedule")?;
        write_1(f, "Cadence", &self.schedule.cadence)?;
        write_1(f, "Timezone", &self.schedule.timezone)?;
        write_1(f, "Run On Start", &self.schedule.run_on_start)?;
        write_title_1(f, "Probe")?;
        write_1(f, "Timeout", &timeout)?;
        write_1(f, "User Agent", &self.probe.user_agent)?;
        write_title_1(f, "Database")?;
        write_1(f, "Path", &self.database.path)?;
        write_1(f, "Max Connections", &self.database.max_connections)?;
        write_1(f, "List Timeout", &format!("{}s", self.database.list_timeout_seconds))?;
        write_title_1(f, "Status Server")?;
        write_1(f, "Enabled", &self.server.enabled)?;
        write_1(f, "Bind Address", &self.server.bind)?;
        write_1(f, "Port", &self.server.port)?;
        write_title_1(f, "Logging")?;
        write_1(f, "Level", &self.logging.level)?;
        write_1(f, "Format", &self.logging.format)?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/project-monitor/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let config = if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| Error::ReadFailed { path: config_path.clone(), source })?;
            Self::from_toml(&raw_string)?
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Check the values that are only interpreted later on
    pub fn validate(&self) -> Result<(), Error> {
        let schedule = self.schedule()?;
        self.probe_timeout(&schedule)?;

        if self.database.list_timeout_seconds == 0 {
            return Err(Error::Invalid("database.list_timeout_seconds must be positive".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(Error::Invalid("database.max_connections must be positive".to_string()));
        }

        Ok(())
    }

    pub fn from_toml(raw: &str) -> Result<Self, Error> {
        Ok(toml::from_str(raw)?)
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &std::path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| Error::WriteFailed { path: parent.to_path_buf(), source })?;
        }

        fs::write(path, config_str).map_err(|source| Error::WriteFailed { path: path.to_path_buf(), source })
    }

    /// Apply overrides from the process environment
    ///
    /// Returns a message for every override that was ignored.
    pub fn apply_env_overrides(&mut self) -> Vec<String> {
        self.apply_overrides(|name| env::var(name).ok())
    }

    /// Apply overrides from any variable source
    ///
    /// `MONITOR_DATABASE_PATH`, `MONITOR_CADENCE`, `MONITOR_TIMEZONE` and
    /// `PORT` are recognised. Values that do not parse are left out and
    /// reported in the returned list, so they can be logged once tracing is up.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut ignored = Vec::new();

        if let Some(path) = lookup("MONITOR_DATABASE_PATH") {
            self.database.path = path;
        }

        let cadence = lookup("MONITOR_CADENCE");
        let timezone = lookup("MONITOR_TIMEZONE");
        if let Some(timezone) = timezone {
            match Tz::from_str(timezone.trim()) {
                Ok(_) => self.schedule.timezone = timezone,
                Err(_) => ignored.push(format!("Ignoring invalid MONITOR_TIMEZONE value: {timezone}")),
            }
        }
        if let Some(cadence) = cadence {
            match Schedule::parse(&cadence, &self.schedule.timezone) {
                Ok(_) => self.schedule.cadence = cadence,
                Err(e) => ignored.push(format!("Ignoring invalid MONITOR_CADENCE value: {e}")),
            }
        }

        if let Some(port) = lookup("PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => ignored.push(format!("Ignoring invalid PORT value: {port}")),
            }
        }

        ignored
    }

    /// Parse the configured schedule
    pub fn schedule(&self) -> Result<Schedule, Error> {
        Schedule::parse(&self.schedule.cadence, &self.schedule.timezone).map_err(|e| Error::Invalid(e.to_string()))
    }

    /// Probe timeout, explicit or derived from the schedule period
    pub fn probe_timeout(&self, schedule: &Schedule) -> Result<Duration, Error> {
        let timeout = match self.probe.timeout_seconds {
            Some(seconds) => Duration::from_secs(seconds),
            None => (schedule.period() / TIMEOUT_SAFETY_FACTOR)
                .clamp(Duration::from_secs(1), Duration::from_secs(300)),
        };

        validate_timeout(timeout).map_err(|e| Error::Invalid(e.to_string()))?;

        if timeout >= schedule.period() {
            warn!(
                "Probe timeout ({}s) is not shorter than the schedule period ({}s); slow targets will overlap cycles",
                timeout.as_secs(),
                schedule.period().as_secs()
            );
        }

        Ok(timeout)
    }

    pub fn log_format(&self) -> Result<LogFormat, String> {
        self.logging.format.parse()
    }

    /// Bound on each cycle's registry snapshot
    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.database.list_timeout_seconds)
    }
}
