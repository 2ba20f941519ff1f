//! Invocation results.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::error::InvokeError;

/// The outcome of an invocation.
///
/// Carries either an [`InvokeError`] or a success payload. Unary calls
/// succeed without a payload (the response went into the caller's carrier);
/// streaming calls carry the opened stream handle, which the caller moves out
/// with [`RpcResult::take_value`].
#[derive(Default)]
pub struct RpcResult {
    error: Option<InvokeError>,
    value: Option<Box<dyn Any + Send + Sync>>,
    attachments: HashMap<String, Value>,
}

impl RpcResult {
    /// A successful result without a payload.
    #[must_use]
    pub fn ok() -> Self {
        Self::default()
    }

    /// A successful result carrying `value`.
    pub fn with_value<T: Any + Send + Sync>(value: T) -> Self {
        let mut result = Self::ok();
        result.set_value(value);
        result
    }

    /// A failed result.
    #[must_use]
    pub fn from_error(error: InvokeError) -> Self {
        let mut result = Self::ok();
        result.set_error(error);
        result
    }

    /// Record an error.
    pub fn set_error(&mut self, error: InvokeError) {
        self.error = Some(error);
    }

    /// Record the payload.
    pub fn set_value<T: Any + Send + Sync>(&mut self, value: T) {
        self.value = Some(Box::new(value));
    }

    /// The error, if the invocation failed.
    #[must_use]
    pub fn error(&self) -> Option<&InvokeError> {
        self.error.as_ref()
    }

    /// Take the error out of the result.
    pub fn take_error(&mut self) -> Option<InvokeError> {
        self.error.take()
    }

    /// Whether the invocation succeeded.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Whether a payload is present.
    #[must_use]
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// Whether the payload is of type `T`.
    #[must_use]
    pub fn value_is<T: Any>(&self) -> bool {
        self.value.as_ref().is_some_and(|v| v.is::<T>())
    }

    /// Borrow the payload as `T`.
    #[must_use]
    pub fn value_ref<T: Any>(&self) -> Option<&T> {
        self.value.as_ref()?.downcast_ref::<T>()
    }

    /// Move the payload out as `T`.
    ///
    /// Leaves the payload in place and returns `None` if it has a different
    /// type.
    pub fn take_value<T: Any>(&mut self) -> Option<T> {
        match self.value.take()?.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(other) => {
                self.value = Some(other);
                None
            }
        }
    }

    /// Set a result attachment.
    pub fn set_attachment(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attachments.insert(key.into(), value.into());
    }

    /// Look up a result attachment.
    #[must_use]
    pub fn attachment(&self, key: &str) -> Option<&Value> {
        self.attachments.get(key)
    }

    /// All result attachments.
    #[must_use]
    pub fn attachments(&self) -> &HashMap<String, Value> {
        &self.attachments
    }

    /// Convert into a `Result`, discarding the payload on success.
    pub fn into_result(self) -> Result<(), InvokeError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for RpcResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcResult")
            .field("error", &self.error)
            .field("has_value", &self.value.is_some())
            .field("attachments", &self.attachments)
            .finish()
    }
}

impl From<InvokeError> for RpcResult {
    fn from(error: InvokeError) -> Self {
        Self::from_error(error)
    }
}
