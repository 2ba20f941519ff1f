//! Client configuration.

use std::collections::HashMap;
use std::time::Duration;

use callkit_core::endpoint::Endpoint;

use crate::error::TransportError;

/// Endpoint parameter holding the request timeout in milliseconds.
pub const PARAM_TIMEOUT: &str = "timeout";
/// Endpoint parameter holding the connect timeout in milliseconds.
pub const PARAM_CONNECT_TIMEOUT: &str = "connect-timeout";
/// Endpoint parameter holding the per-stream buffer size.
pub const PARAM_STREAM_BUFFER: &str = "stream-buffer";

/// Per-client transport configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ClientConfig {
    /// Maximum time a network transport may spend establishing a
    /// connection.
    ///
    /// The memory transport connects instantly and does not read it.
    pub connect_timeout: Duration,
    /// Default deadline for calls whose context has none.
    ///
    /// `None` leaves calls without a deadline.
    pub request_timeout: Option<Duration>,
    /// Number of messages buffered in each direction of a stream.
    pub stream_buffer: usize,
    /// Metadata sent with every call.
    pub metadata: HashMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            request_timeout: None,
            stream_buffer: 32,
            metadata: HashMap::new(),
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the configuration from an endpoint's parameters.
    ///
    /// Parameters that are absent keep their default values. Recognized
    /// parameters are `timeout` and `connect-timeout` (milliseconds) and
    /// `stream-buffer` (messages).
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Config`] if a parameter is present but not
    /// a valid number, or if `stream-buffer` is zero.
    pub fn from_endpoint(endpoint: &Endpoint) -> Result<Self, TransportError> {
        Self::default().apply_endpoint(endpoint)
    }

    /// Override this configuration with an endpoint's parameters.
    ///
    /// # Errors
    ///
    /// Same as [`ClientConfig::from_endpoint`].
    pub fn apply_endpoint(self, endpoint: &Endpoint) -> Result<Self, TransportError> {
        let mut config = self;

        if let Some(ms) = parse_param::<u64>(endpoint, PARAM_TIMEOUT)? {
            config.request_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(ms) = parse_param::<u64>(endpoint, PARAM_CONNECT_TIMEOUT)? {
            config.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(size) = parse_param::<usize>(endpoint, PARAM_STREAM_BUFFER)? {
            if size == 0 {
                return Err(TransportError::config(format!(
                    "{PARAM_STREAM_BUFFER} must be greater than zero"
                )));
            }
            config.stream_buffer = size;
        }

        Ok(config)
    }

    /// Set the connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the default request timeout.
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Disable the default request timeout.
    #[must_use]
    pub const fn no_request_timeout(mut self) -> Self {
        self.request_timeout = None;
        self
    }

    /// Set the stream buffer size. Zero is raised to one.
    #[must_use]
    pub fn stream_buffer(mut self, size: usize) -> Self {
        self.stream_buffer = size.max(1);
        self
    }

    /// Add a metadata entry.
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

fn parse_param<T: std::str::FromStr>(
    endpoint: &Endpoint,
    key: &str,
) -> Result<Option<T>, TransportError> {
    endpoint
        .param(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| TransportError::config(format!("invalid {key} value: {value:?}")))
        })
        .transpose()
}
