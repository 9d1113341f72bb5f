// Persistence failures surfaced to the hub.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    // The store rejected the statement because of a concurrent writer; safe to retry.
    #[error("write conflict: {0}")]
    Conflict(String),
    #[error("store backend failure: {0}")]
    Backend(String),
    #[error("store returned an out-of-range id: {0}")]
    InvalidId(u64),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}
