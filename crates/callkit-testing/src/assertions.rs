//! Custom assertions for invoker testing.
//!
//! This module provides assertion helpers that make it easier to test
//! [`RpcResult`]s and the errors they carry.

use std::any::Any;
use std::error::Error;

use callkit_core::error::InvokeError;
use callkit_core::result::RpcResult;

/// Assert that a result carries no error.
///
/// # Panics
///
/// Panics if the result carries an error.
pub fn assert_invoke_ok(result: &RpcResult) {
    if let Some(err) = result.error() {
        panic!("Expected successful invocation, but got error: {err}");
    }
}

/// Assert that a result failed because the invoker was destroyed or its
/// client closed.
///
/// # Panics
///
/// Panics if the result is successful or failed for another reason.
pub fn assert_unavailable(result: &RpcResult) {
    match result.error() {
        Some(err) => assert!(
            err.is_unavailable(),
            "Expected unavailable invoker error, but got: {err}"
        ),
        None => panic!("Expected unavailable invoker error, but got success"),
    }
}

/// Assert that a result carries a transport error of type `E`, and return it.
///
/// # Panics
///
/// Panics if the result is successful, carries a non-transport error, or
/// the transport error is not an `E`.
pub fn assert_transport_error<E: Error + 'static>(result: &RpcResult) -> &E {
    let Some(err) = result.error() else {
        panic!("Expected transport error, but got success");
    };
    assert!(
        matches!(err, InvokeError::Transport { .. }),
        "Expected transport error, but got: {err}"
    );
    err.transport_source::<E>()
        .unwrap_or_else(|| panic!("Transport error has an unexpected type: {err}"))
}

/// Take the stream handle out of a successful streaming result.
///
/// # Panics
///
/// Panics if the result carries an error or no value of type `T`.
pub fn take_stream<T: Any>(mut result: RpcResult) -> T {
    assert_invoke_ok(&result);
    result
        .take_value::<T>()
        .unwrap_or_else(|| panic!("Expected result value of type {}", std::any::type_name::<T>()))
}

/// Macro for asserting the error a result carries.
///
/// # Example
///
/// ```rust
/// use callkit_testing::assert_invoke_error;
/// use callkit_core::{InvokeError, RpcResult};
///
/// let result = RpcResult::from_error(InvokeError::ClientClosed);
/// assert_invoke_error!(result, InvokeError::ClientClosed);
/// ```
#[macro_export]
macro_rules! assert_invoke_error {
    ($result:expr, $pattern:pat) => {
        match $result.error() {
            Some($pattern) => {}
            Some(other) => panic!(
                "Expected error matching {}, but got: {other:?}",
                stringify!($pattern)
            ),
            None => panic!(
                "Expected error matching {}, but got success",
                stringify!($pattern)
            ),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use callkit_transport::error::TransportError;

    #[test]
    fn test_assert_invoke_ok_passes() {
        assert_invoke_ok(&RpcResult::ok());
    }

    #[test]
    #[should_panic(expected = "Expected successful invocation")]
    fn test_assert_invoke_ok_fails_on_error() {
        assert_invoke_ok(&RpcResult::from_error(InvokeError::ClientClosed));
    }

    #[test]
    fn test_assert_unavailable() {
        assert_unavailable(&RpcResult::from_error(InvokeError::ClientClosed));
    }

    #[test]
    #[should_panic(expected = "but got success")]
    fn test_assert_unavailable_fails_on_success() {
        assert_unavailable(&RpcResult::ok());
    }

    #[test]
    fn test_assert_transport_error_downcasts() {
        let result = RpcResult::from_error(InvokeError::transport(TransportError::NotConnected));
        let err = assert_transport_error::<TransportError>(&result);
        assert_eq!(err, &TransportError::NotConnected);
    }

    #[test]
    fn test_take_stream() {
        let result = RpcResult::with_value(7_u8);
        assert_eq!(take_stream::<u8>(result), 7);
    }

    #[test]
    #[should_panic(expected = "Expected error matching")]
    fn test_assert_invoke_error_macro_mismatch() {
        let result = RpcResult::from_error(InvokeError::ClientClosed);
        assert_invoke_error!(result, InvokeError::Transport { .. });
    }
}
