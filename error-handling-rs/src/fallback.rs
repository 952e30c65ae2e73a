//! # Fallback Strategies
//!
//! Graceful degradation for stage calls: a failed operation is replaced by a
//! fixed default and the error is kept alongside it so callers can record it.

use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};

/// Result of a fallback operation
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackResult<T, E> {
    /// The primary operation succeeded
    Primary(T),
    /// The primary operation failed and the default was substituted
    Fallback { value: T, error: E },
}

impl<T, E> FallbackResult<T, E> {
    /// Resolve an already-settled result, substituting `fallback` on error.
    pub fn from_result(result: Result<T, E>, fallback: impl FnOnce() -> T) -> Self {
        match result {
            Ok(value) => FallbackResult::Primary(value),
            Err(error) => FallbackResult::Fallback {
                value: fallback(),
                error,
            },
        }
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            FallbackResult::Primary(_) => None,
            FallbackResult::Fallback { error, .. } => Some(error),
        }
    }

    pub fn value(&self) -> &T {
        match self {
            FallbackResult::Primary(value) | FallbackResult::Fallback { value, .. } => value,
        }
    }

    /// Gets the value regardless of source
    pub fn into_value(self) -> T {
        match self {
            FallbackResult::Primary(value) | FallbackResult::Fallback { value, .. } => value,
        }
    }
}

/// A settled stage call together with how long it took.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedFallback<T, E> {
    pub result: FallbackResult<T, E>,
    pub elapsed: Duration,
}

/// Run `operation`, substituting `fallback()` if it fails. Never fails itself.
pub async fn with_fallback<T, E, Fut>(
    label: &str,
    operation: Fut,
    fallback: impl FnOnce() -> T,
) -> TimedFallback<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let started = Instant::now();
    let outcome = operation.await;
    let elapsed = started.elapsed();

    if let Err(err) = &outcome {
        log::warn!("{} failed after {:?}, using fallback: {}", label, elapsed, err);
    }

    TimedFallback {
        result: FallbackResult::from_result(outcome, fallback),
        elapsed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_result_keeps_primary() {
        let result: FallbackResult<u32, String> = FallbackResult::from_result(Ok(7), || 0);
        assert_eq!(result, FallbackResult::Primary(7));
        assert_eq!(result.error(), None);
        assert_eq!(result.into_value(), 7);
    }

    #[test]
    fn test_from_result_substitutes_fallback() {
        let result: FallbackResult<u32, String> =
            FallbackResult::from_result(Err("boom".to_string()), || 42);
        assert_eq!(*result.value(), 42);
        assert_eq!(result.error().map(String::as_str), Some("boom"));
        assert_eq!(result.into_value(), 42);
    }

    #[tokio::test]
    async fn test_with_fallback_never_fails() {
        let timed = with_fallback(
            "color_analysis",
            async { Err::<String, _>("upstream timeout") },
            || "neutral".to_string(),
        )
        .await;

        assert_eq!(timed.result.error(), Some(&"upstream timeout"));
        assert_eq!(timed.result.into_value(), "neutral");
    }

    #[tokio::test]
    async fn test_with_fallback_measures_elapsed() {
        let timed = with_fallback(
            "slow",
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, String>(1)
            },
            || 0,
        )
        .await;

        assert_eq!(timed.result, FallbackResult::Primary(1));
        assert!(timed.elapsed >= Duration::from_millis(20));
    }
}
