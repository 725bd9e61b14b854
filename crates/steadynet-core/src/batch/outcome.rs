//! Per-item batch outcomes and aggregate counts.

use serde::Serialize;

/// Failure of one batch item.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BatchError<E> {
    /// The operation returned an error.
    #[error("{0}")]
    Operation(E),
    /// The operation panicked or was cancelled before completing.
    #[error("batch item did not complete: {0}")]
    Panicked(String),
}

impl<E> BatchError<E> {
    pub fn operation(&self) -> Option<&E> {
        match self {
            BatchError::Operation(e) => Some(e),
            BatchError::Panicked(_) => None,
        }
    }
}

/// Success/failure counts for a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_results<T, E>(results: &[Result<T, E>]) -> Self {
        let succeeded = results.iter().filter(|r| r.is_ok()).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts() {
        let results: Vec<Result<u8, BatchError<&str>>> = vec![
            Ok(1),
            Err(BatchError::Operation("x")),
            Ok(2),
            Err(BatchError::Panicked("boom".into())),
        ];
        let s = BatchSummary::from_results(&results);
        assert_eq!(s, BatchSummary { total: 4, succeeded: 2, failed: 2 });
        assert!(!s.all_succeeded());
        assert!(BatchSummary::from_results::<u8, ()>(&[]).all_succeeded());
    }
}
