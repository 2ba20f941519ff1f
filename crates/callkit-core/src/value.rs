//! Opaque parameter values and response carriers.
//!
//! Invocations hand their parameters to the transport untouched. A
//! [`RawValue`] is a shared, type-erased value; the transport downcasts it to
//! whatever message type it understands. Unary calls pass a [`Carrier`] as
//! their second value so the transport has somewhere to write the response.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// A type-erased parameter value shared between caller and transport.
pub type RawValue = Arc<dyn Any + Send + Sync>;

/// Wrap a value as a [`RawValue`].
pub fn raw<T: Any + Send + Sync>(value: T) -> RawValue {
    Arc::new(value)
}

/// A shared slot the transport fills with a unary response.
///
/// Clones share the same slot, so the caller keeps one clone and passes the
/// other (wrapped in a [`RawValue`]) to the invocation.
///
/// ```rust
/// use callkit_core::value::{raw, Carrier};
///
/// let carrier: Carrier<String> = Carrier::new();
/// let param = raw(carrier.clone());
///
/// // transport side
/// param.downcast_ref::<Carrier<String>>().unwrap().fill("hello".to_string());
///
/// assert_eq!(carrier.take().as_deref(), Some("hello"));
/// ```
pub struct Carrier<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> Carrier<T> {
    /// Create an empty carrier.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Store a value, replacing any previous one.
    pub fn fill(&self, value: T) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    /// Remove and return the stored value.
    #[must_use]
    pub fn take(&self) -> Option<T> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Whether a value is stored.
    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl<T: Clone> Carrier<T> {
    /// Return a copy of the stored value, leaving it in place.
    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl<T> Clone for Carrier<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Default for Carrier<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Carrier<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Carrier")
            .field("filled", &self.is_filled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_slot() {
        let a: Carrier<u32> = Carrier::new();
        let b = a.clone();
        assert!(!a.is_filled());

        b.fill(7);
        assert!(a.is_filled());
        assert_eq!(a.get(), Some(7));
        assert_eq!(a.take(), Some(7));
        assert!(!b.is_filled());
    }

    #[test]
    fn test_raw_downcast() {
        let value = raw(42_u64);
        assert_eq!(value.downcast_ref::<u64>(), Some(&42));
        assert!(value.downcast_ref::<String>().is_none());
    }
}
