//! Endpoint descriptors.
//!
//! An [`Endpoint`] names one RPC target: the protocol, the network address,
//! the service path and a set of string parameters that transports read
//! their configuration from.
//!
//! ```rust
//! use callkit_core::Endpoint;
//!
//! let endpoint = Endpoint::parse("tri://127.0.0.1:20000/greet.Greeter?timeout=3000").unwrap();
//! assert_eq!(endpoint.protocol(), "tri");
//! assert_eq!(endpoint.address(), "127.0.0.1:20000");
//! assert_eq!(endpoint.service(), "greet.Greeter");
//! assert_eq!(endpoint.param("timeout"), Some("3000"));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InvokeError;

/// A parsed RPC target descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
    protocol: String,
    address: String,
    service: String,
    params: BTreeMap<String, String>,
}

impl Endpoint {
    /// Parse an endpoint string such as `tri://host:port/pkg.Service?k=v`.
    pub fn parse(input: &str) -> Result<Self, InvokeError> {
        let parsed =
            url::Url::parse(input).map_err(|e| InvokeError::invalid_endpoint(input, e.to_string()))?;

        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| InvokeError::invalid_endpoint(input, "missing host"))?;
        let address = match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        let service = parsed.path().trim_matches('/').to_string();
        if service.is_empty() {
            return Err(InvokeError::invalid_endpoint(input, "missing service path"));
        }

        let params = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        Ok(Self {
            protocol: parsed.scheme().to_string(),
            address,
            service,
            params,
        })
    }

    /// The protocol (URL scheme), e.g. `tri`.
    #[must_use]
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// The `host[:port]` address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The service path without surrounding slashes.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Look up a parameter.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// All parameters, sorted by key.
    #[must_use]
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Set a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Identity of the target, ignoring parameters.
    ///
    /// Two endpoints with the same key address the same service instance.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}://{}/{}", self.protocol, self.address, self.service)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.protocol, self.address, self.service)?;
        let mut sep = '?';
        for (k, v) in &self.params {
            write!(f, "{sep}{k}={v}")?;
            sep = '&';
        }
        Ok(())
    }
}

impl FromStr for Endpoint {
    type Err = InvokeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Endpoint {
    type Error = InvokeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_full_endpoint() {
        let ep = Endpoint::parse("tri://10.0.0.1:50051/org.demo.Echo?timeout=500&group=a").unwrap();
        assert_eq!(ep.protocol(), "tri");
        assert_eq!(ep.address(), "10.0.0.1:50051");
        assert_eq!(ep.service(), "org.demo.Echo");
        assert_eq!(ep.param("timeout"), Some("500"));
        assert_eq!(ep.param("group"), Some("a"));
        assert_eq!(ep.param("missing"), None);
    }

    #[test]
    fn test_key_ignores_params() {
        let a = Endpoint::parse("tri://h:1/S?timeout=1").unwrap();
        let b = Endpoint::parse("tri://h:1/S?timeout=2").unwrap();
        assert_ne!(a, b);
        assert_eq!(a.key(), b.key());
        assert_eq!(a.key(), "tri://h:1/S");
    }

    #[test]
    fn test_display_is_parseable() {
        let ep = Endpoint::parse("mem://local/Echo")
            .unwrap()
            .with_param("b", "2")
            .with_param("a", "1");
        let text = ep.to_string();
        assert_eq!(text, "mem://local/Echo?a=1&b=2");
        assert_eq!(text.parse::<Endpoint>().unwrap(), ep);
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(matches!(
            Endpoint::parse("not a url"),
            Err(InvokeError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            Endpoint::parse("tri://host:1"),
            Err(InvokeError::InvalidEndpoint { message, .. }) if message == "missing service path"
        ));
    }

    #[test]
    fn test_serde_as_string() {
        let ep = Endpoint::parse("tri://h:7/S").unwrap();
        let json = serde_json::to_string(&ep).unwrap();
        assert_eq!(json, "\"tri://h:7/S\"");
        let back: Endpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ep);
    }
}
