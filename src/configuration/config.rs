use super::types::*;
use crate::error_handling::types::ConfigError;
use clap::builder::FalseyValueParser;
use clap::Parser;
use log::debug;
use std::fs::OpenOptions;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration structure that defines all runtime parameters.
///
/// Every field can be given as a long command-line flag or through the
/// environment variable named in its `env` attribute, which is how the agent is
/// normally deployed next to the VPN daemon.
///
/// # Examples
///
/// ```no_run
/// use vpn_node_agent::configuration::config::Config;
///
/// let config = Config::from_args();
/// config.validate().expect("invalid configuration");
/// println!("Watching {}", config.status_file.display());
/// ```
///
/// # Fields Overview
///
/// - `status_file`, `recovery_file`: the watched status file and the recovery
///   snapshot written after every pass
/// - `node_id`: this gateway's id on the backend, must be at least 1
/// - `internal_api_*`: directory location and credentials
/// - `backend_role`: directory role the commands are sent to
/// - `relay_*`: authentication relay listener
/// - `debounce_ms`, `settle_delay_ms`: watcher timing
/// - `request_timeout_secs`: upper bound for any single HTTP request
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "node-agent")]
#[command(about = "Keeps the backend informed about VPN sessions on this node")]
pub struct Config {
    /// Status file written by the VPN daemon.
    ///
    /// Must exist and be readable and writable when the agent starts.
    #[arg(long, env = "OPENVPN_STATUS_FILE")]
    pub status_file: PathBuf,

    /// Recovery snapshot file.
    ///
    /// Its directory must exist; the file itself is created on the first pass.
    #[arg(long, env = "RECOVERY_FILE")]
    pub recovery_file: PathBuf,

    /// Id of this node on the backend.
    #[arg(long, env = "NODE_ID")]
    pub node_id: u32,

    /// Host (and optional port) of the internal API serving the directory.
    #[arg(long, env = "INTERNAL_API_ENDPOINT")]
    pub internal_api_endpoint: String,

    /// Use https for the internal API.
    #[arg(
        long,
        env = "INTERNAL_API_ENDPOINT_SECURE",
        action = clap::ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    pub internal_api_secure: bool,

    /// Path prefix placed before `/internal-api/`.
    #[arg(long, env = "INTERNAL_API_PATH_PREFIX", default_value = "")]
    pub internal_api_path_prefix: String,

    /// Token sent to the internal API.
    #[arg(long, env = "INTERNAL_API_TOKEN", hide_env_values = true)]
    pub internal_api_token: String,

    /// Directory role that receives session and authentication commands.
    #[arg(long, env = "BACKEND_ROLE", default_value = "ff-backend")]
    pub backend_role: String,

    /// Address the authentication relay listens on.
    ///
    /// Requests from anything but loopback are refused regardless of this value.
    #[arg(long, env = "RELAY_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub relay_bind_address: IpAddr,

    /// Port the authentication relay listens on.
    #[arg(long, env = "RELAY_PORT", default_value_t = 4351)]
    pub relay_port: u16,

    /// Do not start the authentication relay.
    #[arg(
        long,
        env = "RELAY_DISABLED",
        action = clap::ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    pub relay_disabled: bool,

    /// Notifications within this many milliseconds of the last accepted one are ignored.
    #[arg(long, env = "WATCH_DEBOUNCE_MS", default_value_t = 100)]
    pub debounce_ms: u64,

    /// Milliseconds to wait after a notification before reading the status file.
    #[arg(long, env = "WATCH_SETTLE_DELAY_MS", default_value_t = 500)]
    pub settle_delay_ms: u64,

    /// Timeout in seconds for every directory and command request.
    #[arg(long, env = "RPC_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,
}

impl Config {
    /// Creates a new instance of `Config` from the command line and environment.
    ///
    /// # Panics
    /// Does not panic, but exits the process with clap's usage message when a
    /// required value is missing or malformed.
    pub fn from_args() -> Self {
        Config::parse()
    }

    /// Same as [`Config::from_args`] over an explicit argument list.
    pub fn try_from_iter<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Config::try_parse_from(args)
    }

    /// Checks everything clap cannot: value ranges and the files the agent
    /// depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_id < 1 {
            return Err(ConfigError::InvalidNodeId(format!(
                "node id must be at least 1, got {}",
                self.node_id
            )));
        }

        if self.internal_api_endpoint.trim().is_empty() {
            return Err(ConfigError::MissingValue("internal API endpoint".into()));
        }
        if self.internal_api_token.is_empty() {
            return Err(ConfigError::MissingValue("internal API token".into()));
        }
        if self.backend_role.trim().is_empty() {
            return Err(ConfigError::MissingValue("backend role".into()));
        }

        for (name, value) in [
            ("debounce window", self.debounce_ms),
            ("settle delay", self.settle_delay_ms),
            ("request timeout", self.request_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::NotInRange(format!("{} must be positive", name)));
            }
        }

        check_read_write(&self.status_file)?;
        check_parent_exists(&self.recovery_file)?;

        debug!("Configuration validated");
        Ok(())
    }

    pub fn directory_settings(&self) -> DirectorySettings {
        DirectorySettings {
            endpoint: self.internal_api_endpoint.clone(),
            secure: self.internal_api_secure,
            path_prefix: self.internal_api_path_prefix.clone(),
            token: self.internal_api_token.clone(),
        }
    }

    pub fn watch_settings(&self) -> WatchSettings {
        WatchSettings {
            debounce: Duration::from_millis(self.debounce_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
        }
    }

    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            enabled: !self.relay_disabled,
            bind_address: self.relay_bind_address,
            port: self.relay_port,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn check_read_write(path: &Path) -> Result<(), ConfigError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map(|_| ())
        .map_err(|e| ConfigError::FileNotAccessible(format!("{}: {}", path.display(), e)))
}

fn check_parent_exists(path: &Path) -> Result<(), ConfigError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.is_dir() => Err(
            ConfigError::DirectoryDoesNotExist(parent.display().to_string()),
        ),
        _ => Ok(()),
    }
}
