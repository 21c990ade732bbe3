//! Error types for rate limiter engines
use std::time::Duration;

/// Unified error type returned by every limiter.
///
/// Local limiter decisions (capacity, lifecycle) are resolved at the engine
/// boundary and never reach the downstream operation. Failures of the
/// downstream operation itself are carried verbatim in [`LimiterError::Inner`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LimiterError<E> {
    /// Capacity was unavailable and the request asked to fail instead of waiting.
    #[error("request dropped because {reason}")]
    RateLimitReached {
        /// Human readable cause (limit reached, limiter paused, ...).
        reason: String,
    },
    /// The limiter was destroyed before or while the request was waiting.
    #[error("rate limiter was destroyed")]
    Destroyed,
    /// The request was dropped from the queue by `clear()`.
    #[error("request removed from queue because the rate limiter was cleared")]
    Cleared,
    /// The downstream operation failed.
    #[error("{0}")]
    Inner(E),
}

impl<E> LimiterError<E> {
    pub(crate) fn limit_reached(reason: impl Into<String>) -> Self {
        Self::RateLimitReached { reason: reason.into() }
    }

    /// Check if this error is due to exhausted capacity
    pub fn is_rate_limit_reached(&self) -> bool {
        matches!(self, Self::RateLimitReached { .. })
    }
    /// Check if this error is due to a destroyed limiter
    pub fn is_destroyed(&self) -> bool {
        matches!(self, Self::Destroyed)
    }
    /// Check if this error is due to `clear()`
    pub fn is_cleared(&self) -> bool {
        matches!(self, Self::Cleared)
    }
    /// Check if this error wraps a downstream failure.
    pub fn is_inner(&self) -> bool {
        matches!(self, Self::Inner(_))
    }
    /// Get the inner error if this is an Inner variant
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }
    /// Borrow the inner error if present.
    pub fn as_inner(&self) -> Option<&E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }
    /// Map the downstream error type, leaving limiter variants untouched.
    pub fn map_inner<F, O>(self, f: O) -> LimiterError<F>
    where
        O: FnOnce(E) -> F,
    {
        match self {
            Self::RateLimitReached { reason } => LimiterError::RateLimitReached { reason },
            Self::Destroyed => LimiterError::Destroyed,
            Self::Cleared => LimiterError::Cleared,
            Self::Inner(e) => LimiterError::Inner(f(e)),
        }
    }
}

/// Errors produced when validating limiter configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Bucket size must be > 0.
    #[error("bucket_size must be > 0 (got {provided})")]
    InvalidBucketSize {
        /// Value provided by caller.
        provided: usize,
    },
    /// Time frame must be > 0.
    #[error("time_frame must be > 0 (got {0:?})")]
    InvalidTimeFrame(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::fmt;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct DummyError(&'static str);
    impl fmt::Display for DummyError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }
    impl std::error::Error for DummyError {}

    #[test]
    fn rate_limit_reached_display_includes_reason() {
        let err: LimiterError<DummyError> = LimiterError::limit_reached("the rate limit was reached");
        let msg = err.to_string();
        assert_eq!(msg, "request dropped because the rate limit was reached");
        assert!(err.is_rate_limit_reached());
        assert!(!err.is_destroyed());
    }

    #[test]
    fn inner_display_is_transparent() {
        let err = LimiterError::Inner(DummyError("boom"));
        assert_eq!(err.to_string(), "boom");
        assert!(err.is_inner());
        assert_eq!(err.as_inner(), Some(&DummyError("boom")));
        assert_eq!(err.into_inner(), Some(DummyError("boom")));
    }

    #[test]
    fn limiter_variants_have_no_inner() {
        let destroyed: LimiterError<DummyError> = LimiterError::Destroyed;
        assert!(destroyed.is_destroyed());
        assert!(destroyed.as_inner().is_none());
        assert!(destroyed.source().is_none());

        let cleared: LimiterError<DummyError> = LimiterError::Cleared;
        assert!(cleared.is_cleared());
        assert!(cleared.into_inner().is_none());
    }

    #[test]
    fn map_inner_only_touches_inner() {
        let inner: LimiterError<DummyError> = LimiterError::Inner(DummyError("x"));
        assert_eq!(inner.map_inner(|e| e.0.len()), LimiterError::Inner(1));

        let destroyed: LimiterError<DummyError> = LimiterError::Destroyed;
        assert_eq!(destroyed.map_inner(|e| e.0.len()), LimiterError::Destroyed);
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::InvalidBucketSize { provided: 0 };
        assert!(err.to_string().contains("bucket_size"));
        let err = ConfigError::InvalidTimeFrame(Duration::ZERO);
        assert!(err.to_string().contains("time_frame"));
    }
}
