//! Persistence handle shared by both workflows.
//!
//! The repository traits live next to the workflow that consumes them; this module holds the
//! common error type and the in-memory backend.

mod memory;

pub use memory::MemoryStore;

use tracing::warn;

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// A transactional invariant rejected the write.
    #[error("{0}")]
    Conflict(String),
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Run an idempotent read, retrying exactly once when the backend reports itself unavailable.
/// Writes never go through here.
pub(crate) fn read_with_retry<T>(
    operation: &'static str,
    mut read: impl FnMut() -> Result<T, RepositoryError>,
) -> Result<T, RepositoryError> {
    match read() {
        Err(RepositoryError::Unavailable(reason)) => {
            warn!(operation, %reason, "storage read failed, retrying once");
            read()
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn read_with_retry_retries_unavailable_once() {
        let attempts = Cell::new(0);
        let result = read_with_retry("test", || {
            attempts.set(attempts.get() + 1);
            if attempts.get() == 1 {
                Err(RepositoryError::Unavailable("blip".to_string()))
            } else {
                Ok(7)
            }
        });
        assert_eq!(result, Ok(7));
        assert_eq!(attempts.get(), 2);
    }

    #[test]
    fn read_with_retry_gives_up_after_second_failure() {
        let attempts = Cell::new(0);
        let result: Result<(), _> = read_with_retry("test", || {
            attempts.set(attempts.get() + 1);
            Err(RepositoryError::Unavailable("down".to_string()))
        });
        assert!(matches!(result, Err(RepositoryError::Unavailable(_))));
        assert_eq!(attempts.get(), 2);
    }

    #[test]
    fn read_with_retry_does_not_retry_domain_errors() {
        let attempts = Cell::new(0);
        let result: Result<(), _> = read_with_retry("test", || {
            attempts.set(attempts.get() + 1);
            Err(RepositoryError::NotFound)
        });
        assert_eq!(result, Err(RepositoryError::NotFound));
        assert_eq!(attempts.get(), 1);
    }
}
