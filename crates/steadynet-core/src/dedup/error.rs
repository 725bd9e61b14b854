use std::sync::Arc;

/// Failure shared by every caller waiting on one deduplicated call.
#[derive(Debug, thiserror::Error)]
pub enum DedupError<E> {
    /// The underlying operation failed; all concurrent waiters see the same error.
    #[error("{0}")]
    Operation(Arc<E>),
    /// The underlying operation panicked or its task was aborted.
    #[error("deduplicated operation did not complete")]
    Panicked,
}

// Manual impl: cloning only clones the `Arc`, so `E` need not be `Clone`.
impl<E> Clone for DedupError<E> {
    fn clone(&self) -> Self {
        match self {
            DedupError::Operation(e) => DedupError::Operation(Arc::clone(e)),
            DedupError::Panicked => DedupError::Panicked,
        }
    }
}

impl<E> DedupError<E> {
    pub fn operation(&self) -> Option<&E> {
        match self {
            DedupError::Operation(e) => Some(e),
            DedupError::Panicked => None,
        }
    }
}
