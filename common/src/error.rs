/// Failure reported by a collaborator (message store, uploader, channel).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// The store refused the write, e.g. the ownership predicate matched no row.
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("unavailable: {0}")]
    Unavailable(String),
}

/// Error surfaced by the synchronization core to its caller.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("transient error: {0}")]
    Transient(String),
}

impl SyncError {
    /// Only network/server hiccups are worth retrying; the core never retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transient(_))
    }
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unauthorized(msg) => SyncError::Unauthorized(msg),
            StoreError::NotFound(msg) => SyncError::NotFound(msg),
            StoreError::Rejected(msg) => SyncError::Rejected(msg),
            StoreError::Invalid(msg) => SyncError::Validation(msg),
            StoreError::Unavailable(msg) => SyncError::Transient(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_is_retryable() {
        assert!(SyncError::from(StoreError::Unavailable("timeout".into())).is_retryable());
        assert!(!SyncError::from(StoreError::Rejected("not owner".into())).is_retryable());
        assert!(!SyncError::Validation("empty".into()).is_retryable());
    }

    #[test]
    fn store_invalid_maps_to_validation() {
        let err = SyncError::from(StoreError::Invalid("too long".into()));
        assert!(matches!(err, SyncError::Validation(msg) if msg == "too long"));
    }
}
