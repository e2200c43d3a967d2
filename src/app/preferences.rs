use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "panorama-view";

/// Loader settings. Timeouts are handed to the HTTP transport as is; `None` keeps
/// the transport's own default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub network_timeout_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub user_agent: String,
    pub max_payload_bytes: Option<u64>,
}

impl LoaderConfig {
    pub fn new() -> Self {
        Self {
            network_timeout_secs: None,
            connect_timeout_secs: None,
            user_agent: format!("{APP_NAME}/{}", env!("CARGO_PKG_VERSION")),
            max_payload_bytes: None,
        }
    }

    /// Reads the stored config, falling back to defaults.
    pub fn load() -> Self {
        let mut config: LoaderConfig = match confy::load(APP_NAME, None) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Could not load config, using defaults: {err}");
                LoaderConfig::default()
            }
        };
        config.clamp();
        config
    }

    pub fn store(&self) -> Result<(), confy::ConfyError> {
        confy::store(APP_NAME, None, self)
    }

    /// Zero means "not configured".
    pub fn clamp(&mut self) {
        self.network_timeout_secs = self.network_timeout_secs.filter(|secs| *secs > 0);
        self.connect_timeout_secs = self.connect_timeout_secs.filter(|secs| *secs > 0);
        self.max_payload_bytes = self.max_payload_bytes.filter(|bytes| *bytes > 0);
    }

    pub fn network_timeout(&self) -> Option<Duration> {
        self.network_timeout_secs.map(Duration::from_secs)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_drops_zero_values() {
        let mut config = LoaderConfig {
            network_timeout_secs: Some(0),
            connect_timeout_secs: Some(5),
            max_payload_bytes: Some(0),
            ..LoaderConfig::default()
        };
        config.clamp();
        assert_eq!(config.network_timeout(), None);
        assert_eq!(config.connect_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.max_payload_bytes, None);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let config: LoaderConfig = serde_json::from_str(r#"{"network_timeout_secs": 30}"#).unwrap();
        assert_eq!(config.network_timeout(), Some(Duration::from_secs(30)));
        assert!(config.user_agent.starts_with(APP_NAME));
    }
}
