//! Invocation requests.
//!
//! An [`Invocation`] is the transport-agnostic description of one call: the
//! method name, the raw parameter values, attributes used by the framework
//! (most importantly the call type under [`CALL_TYPE_KEY`]) and string
//! attachments forwarded to the peer.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value::RawValue;

/// Attribute key holding the [`CallType`] of an invocation, as a string.
pub const CALL_TYPE_KEY: &str = "call-type";

/// The shape of an RPC call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallType {
    /// One request, one response.
    Unary,
    /// Many requests, one response.
    ClientStream,
    /// One request, many responses.
    ServerStream,
    /// Requests and responses interleaved.
    BidiStream,
}

impl CallType {
    /// All call types.
    pub const ALL: [Self; 4] = [
        Self::Unary,
        Self::ClientStream,
        Self::ServerStream,
        Self::BidiStream,
    ];

    /// The attribute value for this call type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unary => "unary",
            Self::ClientStream => "client-stream",
            Self::ServerStream => "server-stream",
            Self::BidiStream => "bidi-stream",
        }
    }

    /// Number of raw parameter values an invocation of this type must carry,
    /// or `None` when the count is not checked.
    #[must_use]
    pub const fn expected_raw_values(self) -> Option<usize> {
        match self {
            Self::Unary => Some(2),
            Self::ServerStream => Some(1),
            Self::ClientStream | Self::BidiStream => None,
        }
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown call type name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown call type: {0}")]
pub struct UnknownCallType(pub String);

impl FromStr for CallType {
    type Err = UnknownCallType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownCallType(s.to_string()))
    }
}

/// A single call request.
#[derive(Clone, Default)]
pub struct Invocation {
    method_name: String,
    parameter_raw_values: Vec<RawValue>,
    attributes: HashMap<String, Value>,
    attachments: HashMap<String, String>,
}

impl Invocation {
    /// Create an invocation for the given method with no parameters.
    pub fn new(method_name: impl Into<String>) -> Self {
        Self {
            method_name: method_name.into(),
            ..Self::default()
        }
    }

    /// Set the call type attribute.
    pub fn with_call_type(self, call_type: CallType) -> Self {
        self.with_attribute(CALL_TYPE_KEY, call_type.as_str())
    }

    /// Append a raw parameter value.
    pub fn with_raw_value(mut self, value: RawValue) -> Self {
        self.parameter_raw_values.push(value);
        self
    }

    /// Replace all raw parameter values.
    pub fn with_raw_values(mut self, values: Vec<RawValue>) -> Self {
        self.parameter_raw_values = values;
        self
    }

    /// Set an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set an attachment.
    pub fn with_attachment(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attachments.insert(key.into(), value.into());
        self
    }

    /// The method name.
    #[must_use]
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// The raw parameter values, in order.
    #[must_use]
    pub fn parameter_raw_values(&self) -> &[RawValue] {
        &self.parameter_raw_values
    }

    /// Look up an attribute.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Set an attribute in place.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Look up an attachment.
    #[must_use]
    pub fn attachment(&self, key: &str) -> Option<&str> {
        self.attachments.get(key).map(String::as_str)
    }

    /// All attachments.
    #[must_use]
    pub fn attachments(&self) -> &HashMap<String, String> {
        &self.attachments
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("method_name", &self.method_name)
            .field("raw_values", &self.parameter_raw_values.len())
            .field("attributes", &self.attributes)
            .field("attachments", &self.attachments)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::raw;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_call_type_round_trips_names() {
        for t in CallType::ALL {
            assert_eq!(t.as_str().parse::<CallType>(), Ok(t));
        }
        assert_eq!(
            "streaming".parse::<CallType>(),
            Err(UnknownCallType("streaming".to_string()))
        );
    }

    #[test]
    fn test_call_type_serde_matches_attribute_value() {
        let json = serde_json::to_value(CallType::BidiStream).unwrap();
        assert_eq!(json, Value::String("bidi-stream".to_string()));
    }

    #[test]
    fn test_expected_raw_values() {
        assert_eq!(CallType::Unary.expected_raw_values(), Some(2));
        assert_eq!(CallType::ServerStream.expected_raw_values(), Some(1));
        assert_eq!(CallType::ClientStream.expected_raw_values(), None);
        assert_eq!(CallType::BidiStream.expected_raw_values(), None);
    }

    #[test]
    fn test_builder() {
        let inv = Invocation::new("SayHello")
            .with_call_type(CallType::Unary)
            .with_raw_value(raw("req"))
            .with_raw_value(raw(0_u8))
            .with_attachment("trace-id", "abc");

        assert_eq!(inv.method_name(), "SayHello");
        assert_eq!(inv.parameter_raw_values().len(), 2);
        assert_eq!(
            inv.attribute(CALL_TYPE_KEY),
            Some(&Value::String("unary".to_string()))
        );
        assert_eq!(inv.attachment("trace-id"), Some("abc"));
        assert!(format!("{inv:?}").contains("raw_values: 2"));
    }
}
