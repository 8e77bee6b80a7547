use std::collections::HashSet;
use std::time::Duration;
use std::{env, fmt, fs, io, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::probes::ServiceKind;
use crate::validation;

#[derive(Debug, Error)]
pub enum Error {
    #[error("config file not found: {}", .0.display())]
    NotFound(path::PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    ReadFailed { path: path::PathBuf, source: io::Error },

    #[error("failed to write {}: {source}", .path.display())]
    WriteFailed { path: path::PathBuf, source: io::Error },

    #[error("failed to parse {}: {source}", .path.display())]
    ParseFailed { path: path::PathBuf, source: toml::de::Error },

    #[error("invalid TOML: {0}")]
    Syntax(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("no config path available, set XDG_CONFIG_HOME or HOME")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Seconds between two sweeps
    #[serde(alias = "interval", default = "default_interval")]
    pub interval_seconds: u64,
    /// Display categories, passed through to the query API untouched
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub probes: ProbeSettings,
    #[serde(default)]
    pub instances: Vec<ServiceConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    pub timeout_ms: u64,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

/// One monitored instance. Everything except `kind` and `target` is display
/// metadata the engine never interprets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    #[serde(rename = "type", alias = "kind")]
    pub kind: ServiceKind,
    #[serde(rename = "ping_url", alias = "target", default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

fn default_interval() -> u64 {
    60
}

fn default_category() -> String {
    "unknown".into()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: "0.0.0.0".into(), port: 5000 }
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self { timeout_ms: 2000, max_attempts: 3, retry_delay_ms: 1000 }
    }
}

impl ProbeSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl ServiceConfig {
    /// Target handed to the probe, `None` when this instance is never probed
    pub fn probe_target(&self) -> Option<&str> {
        if !self.kind.is_probed() {
            return None;
        }
        self.target.as_deref().map(str::trim).filter(|target| !target.is_empty())
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

/// Get default config path ($XDG_CONFIG_HOME/homewatch/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Some(config_home) = env::var_os("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::var_os("HOME") {
        path::PathBuf::from(home_dir).join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("homewatch/config.toml"))
}

/// Resolve the file a config would be read from or written to
pub fn resolve_path(optional_path: Option<impl AsRef<path::Path>>) -> Result<path::PathBuf, Error> {
    match optional_path {
        Some(path) => Ok(normalize_toml_path(path.as_ref())),
        None => default_config_path(),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval(),
            categories: Vec::new(),
            server: ServerSettings::default(),
            probes: ProbeSettings::default(),
            instances: Vec::new(),
        }
    }
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
        let write_title_2 = write_title_indented(2);
        let write_1 = write_indented(1);
        let write_2 = write_indented(2);

        writeln!(f, "Current Monitoring Configuration:")?;
        write_1(f, "Sweep Interval", &format!("{}s", self.interval_seconds))?;
        write_1(f, "Categories", &self.categories.join(", "))?;
        write_title_1(f, "Server")?;
        write_2(f, "Bind Address", &self.server.bind)?;
        write_2(f, "Port", &self.server.port)?;
        write_title_1(f, "Probes")?;
        write_2(f, "Timeout", &format!("{}ms", self.probes.timeout_ms))?;
        write_2(f, "Max Attempts", &self.probes.max_attempts)?;
        write_2(f, "Retry Delay", &format!("{}ms", self.probes.retry_delay_ms))?;
        write_title_1(f, &format!("Instances ({})", self.instances.len()))?;
        for service in &self.instances {
            write_title_2(f, &service.name)?;
            write_2(f, "Kind", &service.kind)?;
            write_2(f, "Target", &service.probe_target().unwrap_or("(not probed)"))?;
            write_2(f, "Category", &service.category)?;
        }

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Reads ~/.config/homewatch/config.toml or the specified path. Unlike
    /// other settings files a missing config is an error: starting without a
    /// service list would silently monitor nothing.
    ///
    /// ```rust,ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path = resolve_path(optional_path)?;

        if !config_path.exists() {
            return Err(Error::NotFound(config_path));
        }

        let raw_string = fs::read_to_string(&config_path)
            .map_err(|source| Error::ReadFailed { path: config_path.clone(), source })?;

        Self::from_toml_str(&raw_string).map_err(|err| match err {
            Error::Syntax(source) => Error::ParseFailed { path: config_path, source },
            other => other,
        })
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(raw: &str) -> Result<Self, Error> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| Error::WriteFailed { path: path.to_path_buf(), source })?;
        }

        fs::write(path, config_str)
            .map_err(|source| Error::WriteFailed { path: path.to_path_buf(), source })
    }

    /// Override server settings from `HOMEWATCH_BIND` / `HOMEWATCH_PORT`
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("HOMEWATCH_BIND").filter(|bind| !bind.trim().is_empty()) {
            self.server.bind = bind.trim().to_string();
        }
        if let Some(port) = lookup("HOMEWATCH_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| Error::Invalid(format!("HOMEWATCH_PORT is not a port: {port}")))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |err: anyhow::Error| Error::Invalid(format!("{err:#}"));

        validation::validate_check_interval(self.interval_seconds).map_err(invalid)?;
        validation::validate_timeout(self.probes.timeout_ms).map_err(invalid)?;
        validation::validate_max_attempts(self.probes.max_attempts).map_err(invalid)?;
        validation::validate_retry_delay(self.probes.retry_delay_ms).map_err(invalid)?;

        let mut seen = HashSet::new();
        for service in &self.instances {
            let name = service.name.trim();
            if name.is_empty() {
                return Err(Error::Invalid("instance with an empty name".into()));
            }
            if !seen.insert(name) {
                return Err(Error::Invalid(format!("duplicate instance name `{name}`")));
            }
            if let Some(target) = service.probe_target() {
                validation::validate_service_target(service.kind, target).map_err(|err| {
                    Error::Invalid(format!("instance `{name}`: {err:#}"))
                })?;
            }
        }

        Ok(())
    }

    /// Instances the scheduler will actually probe
    pub fn probed_instances(&self) -> impl Iterator<Item = &ServiceConfig> {
        self.instances.iter().filter(|service| service.probe_target().is_some())
    }

    pub fn instance(&self, name: &str) -> Option<&ServiceConfig> {
        self.instances.iter().find(|service| service.name == name)
    }

    /// Sample configuration written by `init-config`
    pub fn example() -> Self {
        let instance = |name: &str, kind: ServiceKind, target: &str, category: &str| ServiceConfig {
            name: name.into(),
            kind,
            target: Some(target.into()),
            host: None,
            category: category.into(),
            public_url: None,
            icon_url: None,
        };

        Self {
            categories: vec!["Media".into(), "Network".into()],
            instances: vec![
                ServiceConfig {
                    public_url: Some("https://plex.example.com".into()),
                    ..instance("Plex", ServiceKind::Plex, "http://192.168.1.10:32400/identity", "Media")
                },
                instance("NAS SSH", ServiceKind::Ssh, "192.168.1.10:22", "Network"),
                instance("Resolver", ServiceKind::Dns, "192.168.1.1", "Network"),
                instance("WireGuard", ServiceKind::Wireguard, "vpn.example.com:51820", "Network"),
                instance("Router", ServiceKind::Host, "192.168.1.1", "Network"),
                ServiceConfig {
                    target: None,
                    public_url: Some("https://wiki.example.com".into()),
                    ..instance("Wiki", ServiceKind::Redirect, "", "Media")
                },
            ],
            ..Self::default()
        }
    }
}
