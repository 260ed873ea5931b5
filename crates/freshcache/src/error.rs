use thiserror::Error;

/// An error surfaced on the public cache API.
///
/// Computation failures are deliberately not represented here. A failing or
/// crashing computation is retried by its worker and logged; readers waiting
/// on it only ever observe [`Timeout`](CacheError::Timeout).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CacheError {
    /// A computation is already registered under this key.
    #[error("a computation is already registered for this key")]
    AlreadyRegistered,
    /// No computation was ever registered under this key.
    #[error("no computation is registered for this key")]
    NotRegistered,
    /// No successful value arrived within the caller's deadline.
    #[error("timed out waiting for the current computation")]
    Timeout,
}

/// Result alias used throughout the public API.
pub type CacheResult<T> = Result<T, CacheError>;
