use crate::core::{CommandError, Result};
use std::time::Duration;

const SCHEME: &str = "sheetcmd://";

/// Command subsystem configuration
///
/// Covers the undo history and the connection to the remote authority.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandConfig {
    /// Authority host
    pub host: String,

    /// Authority port
    pub port: u16,

    /// Path the authority accepts requests on
    pub path: String,

    /// Maximum number of undoable entries kept
    pub history_limit: usize,

    /// Batches built from this config (`CompoundCommand::from_config`,
    /// `CommandStack::batch`) emit one refresh per item even without changes
    pub force_refresh: bool,

    /// Time allowed for one server round trip
    pub request_timeout: Duration,

    /// Requests queued per document before senders wait
    pub queue_capacity: usize,
}

impl CommandConfig {
    pub fn new() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            path: "/commands".to_string(),
            history_limit: 100,
            force_refresh: false,
            request_timeout: Duration::from_secs(10),
            queue_capacity: 64,
        }
    }

    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn path(mut self, path: &str) -> Self {
        self.path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        self
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// HTTP endpoint of the authority.
    pub fn server_url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, self.path)
    }

    /// Parse from a configuration URL
    ///
    /// Format: "sheetcmd://host:port/path?history=100&timeout_ms=5000&queue=64&force_refresh=true"
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let config = CommandConfig::from_url("sheetcmd://authority:9000/commands?history=50")?;
    /// ```
    pub fn from_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix(SCHEME)
            .ok_or_else(|| CommandError::InvalidConfig(format!("URL must start with '{}'", SCHEME)))?;

        let (location, query) = match rest.split_once('?') {
            Some((location, query)) => (location, Some(query)),
            None => (rest, None),
        };
        let (authority, path) = match location.split_once('/') {
            Some((authority, path)) => (authority, path),
            None => (location, "commands"),
        };
        if authority.is_empty() {
            return Err(CommandError::InvalidConfig("missing host".to_string()));
        }

        let mut config = Self::new().path(path);
        match authority.split_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .map_err(|_| CommandError::InvalidConfig(format!("invalid port '{}'", port)))?;
                config = config.host(host).port(port);
            }
            None => config = config.host(authority),
        }

        for pair in query.into_iter().flat_map(|q| q.split('&')).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| CommandError::InvalidConfig(format!("invalid parameter '{}'", pair)))?;
            config = match key {
                "history" => config.history_limit(parse_number(key, value)?),
                "timeout_ms" => config.request_timeout(Duration::from_millis(parse_number(key, value)?)),
                "queue" => config.queue_capacity(parse_number(key, value)?),
                "force_refresh" => config.force_refresh(value == "true" || value == "1"),
                other => {
                    return Err(CommandError::InvalidConfig(format!("unknown parameter '{}'", other)));
                }
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Convert to configuration URL
    pub fn to_url(&self) -> String {
        format!(
            "{}{}:{}{}?history={}&timeout_ms={}&queue={}&force_refresh={}",
            SCHEME,
            self.host,
            self.port,
            self.path,
            self.history_limit,
            self.request_timeout.as_millis(),
            self.queue_capacity,
            self.force_refresh
        )
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(CommandError::InvalidConfig("host cannot be empty".to_string()));
        }

        if self.history_limit == 0 {
            return Err(CommandError::InvalidConfig("history_limit must be > 0".to_string()));
        }

        if self.queue_capacity == 0 {
            return Err(CommandError::InvalidConfig("queue_capacity must be > 0".to_string()));
        }

        if self.request_timeout.is_zero() {
            return Err(CommandError::InvalidConfig("request_timeout must be > 0".to_string()));
        }

        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CommandError::InvalidConfig(format!("invalid value '{}' for '{}'", value, key)))
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CommandConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.history_limit, 100);
        assert_eq!(config.server_url(), "http://localhost:8080/commands");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = CommandConfig::new()
            .host("authority.example.com")
            .port(9000)
            .path("api/commands")
            .history_limit(20)
            .request_timeout(Duration::from_millis(250));

        assert_eq!(config.server_url(), "http://authority.example.com:9000/api/commands");
        assert_eq!(config.history_limit, 20);
        assert_eq!(config.request_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_from_url() {
        let config = CommandConfig::from_url(
            "sheetcmd://authority:9000/commands?history=50&timeout_ms=1500&queue=8&force_refresh=true",
        )
        .unwrap();

        assert_eq!(config.host, "authority");
        assert_eq!(config.port, 9000);
        assert_eq!(config.history_limit, 50);
        assert_eq!(config.request_timeout, Duration::from_millis(1500));
        assert_eq!(config.queue_capacity, 8);
        assert!(config.force_refresh);
    }

    #[test]
    fn test_url_round_trip() {
        let config = CommandConfig::new().host("h").port(1).history_limit(3);
        assert_eq!(CommandConfig::from_url(&config.to_url()).unwrap(), config);
    }

    #[test]
    fn test_invalid_urls() {
        assert!(CommandConfig::from_url("http://localhost:8080").is_err());
        assert!(CommandConfig::from_url("sheetcmd://localhost:port/x").is_err());
        assert!(CommandConfig::from_url("sheetcmd://localhost/x?history=0").is_err());
        assert!(CommandConfig::from_url("sheetcmd://localhost/x?colour=red").is_err());
    }
}
