//! Error surfaced by the retry executor.

/// Terminal failure of a retried operation.
///
/// Client, auth and exhausted transient failures all surface the caller's
/// own error unchanged in [`RetryError::Operation`]; only an offline host
/// replaces it.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// The operation's last error, unwrapped.
    #[error(transparent)]
    Operation(E),
    /// The host reported no connectivity when the operation failed.
    #[error("no network connectivity")]
    Offline,
}

impl<E> RetryError<E> {
    pub fn is_offline(&self) -> bool {
        matches!(self, RetryError::Offline)
    }

    /// The caller's error, if this is not an offline short-circuit.
    pub fn into_operation(self) -> Option<E> {
        match self {
            RetryError::Operation(e) => Some(e),
            RetryError::Offline => None,
        }
    }

    pub fn operation(&self) -> Option<&E> {
        match self {
            RetryError::Operation(e) => Some(e),
            RetryError::Offline => None,
        }
    }
}
