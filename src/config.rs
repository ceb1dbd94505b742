//! Backend configuration.
//!
//! Everything a backend needs to be constructed is passed in explicitly as a
//! [`BackendConfig`]; nothing is read from process-wide state. The CLI fills
//! it from flags with environment-variable fallbacks.

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::MoonlabelError;

/// Base URL of the hosted detection service.
pub const CLOUD_ENDPOINT: &str = "https://api.moondream.ai/v1";

/// Default base URL of a self-hosted station on this machine.
pub const DEFAULT_STATION_ENDPOINT: &str = "http://localhost:2020/v1";

/// Default global timeout for one backend request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Where inference runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BackendMode {
    /// Hosted service, authenticated with an API key.
    #[default]
    Cloud,
    /// Network service at a configurable address, no key.
    Station,
    /// In-process model supplied by the embedding application.
    Local,
}

impl BackendMode {
    pub fn name(&self) -> &'static str {
        match self {
            BackendMode::Cloud => "cloud",
            BackendMode::Station => "station",
            BackendMode::Local => "local",
        }
    }
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Explicit backend settings for one session.
#[derive(Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub mode: BackendMode,
    /// Required in cloud mode, ignored otherwise.
    pub api_key: Option<String>,
    /// Base URL used in station mode.
    pub station_endpoint: String,
    pub timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            mode: BackendMode::Cloud,
            api_key: None,
            station_endpoint: DEFAULT_STATION_ENDPOINT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl BackendConfig {
    pub fn cloud(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    pub fn station(endpoint: impl Into<String>) -> Self {
        Self {
            mode: BackendMode::Station,
            station_endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn local() -> Self {
        Self {
            mode: BackendMode::Local,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Checks the settings the selected mode depends on.
    pub fn validate(&self) -> Result<(), MoonlabelError> {
        match self.mode {
            BackendMode::Cloud => {
                let has_key = self
                    .api_key
                    .as_deref()
                    .is_some_and(|key| !key.trim().is_empty());
                if !has_key {
                    return Err(MoonlabelError::InvalidBackendConfig(
                        "cloud mode requires an API key (--api-key or MOONLABEL_API_KEY)"
                            .to_string(),
                    ));
                }
            }
            BackendMode::Station => {
                self.station_url()?;
            }
            BackendMode::Local => {}
        }

        if self.timeout.is_zero() {
            return Err(MoonlabelError::InvalidBackendConfig(
                "timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Base URL requests are sent to, for the network modes.
    pub fn base_url(&self) -> Result<Url, MoonlabelError> {
        match self.mode {
            BackendMode::Cloud => Url::parse(CLOUD_ENDPOINT).map_err(|source| {
                MoonlabelError::InvalidBackendConfig(format!("invalid cloud endpoint: {source}"))
            }),
            BackendMode::Station => self.station_url(),
            BackendMode::Local => Err(MoonlabelError::InvalidBackendConfig(
                "local mode has no network endpoint".to_string(),
            )),
        }
    }

    fn station_url(&self) -> Result<Url, MoonlabelError> {
        let url = Url::parse(self.station_endpoint.trim()).map_err(|source| {
            MoonlabelError::InvalidBackendConfig(format!(
                "invalid station endpoint '{}': {source}",
                self.station_endpoint
            ))
        })?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(MoonlabelError::InvalidBackendConfig(format!(
                "station endpoint must use http or https, got '{other}'"
            ))),
        }
    }
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendConfig")
            .field("mode", &self.mode)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("station_endpoint", &self.station_endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}
