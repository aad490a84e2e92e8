use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Where and how to reach the internal API directory.
#[derive(Debug, PartialEq, Clone)]
pub struct DirectorySettings {
    /// Host, optionally with `:port`.
    pub endpoint: String,
    pub secure: bool,
    pub path_prefix: String,
    pub token: String,
}

impl DirectorySettings {
    /// `{scheme}://{endpoint}{path_prefix}/internal-api/`
    pub fn base_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!(
            "{}://{}{}/internal-api/",
            scheme,
            self.endpoint,
            self.path_prefix.trim_end_matches('/')
        )
    }
}

/// Timing of the status file watcher.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct WatchSettings {
    /// Notifications closer than this to the last accepted one are dropped.
    pub debounce: Duration,
    /// Wait between a notification and reading the file.
    pub settle_delay: Duration,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(100),
            settle_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct RelaySettings {
    pub enabled: bool,
    pub bind_address: IpAddr,
    pub port: u16,
}

impl RelaySettings {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url() {
        let mut settings = DirectorySettings {
            endpoint: "api.internal:8080".into(),
            secure: false,
            path_prefix: "/v2/".into(),
            token: "t".into(),
        };
        assert_eq!(settings.base_url(), "http://api.internal:8080/v2/internal-api/");

        settings.secure = true;
        settings.path_prefix.clear();
        assert_eq!(settings.base_url(), "https://api.internal:8080/internal-api/");
    }
}
