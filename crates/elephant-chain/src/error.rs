use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("ledger query timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("ledger query failed: {0}")]
    Query(String),
    #[error("transaction send failed: {0}")]
    Send(String),
    #[error("nonce resynchronization failed: {0}")]
    NonceSync(String),
    #[error("batch submission exhausted its retry budget: {0}")]
    SubmissionFailed(String),
}

impl ChainError {
    /// Whether the error text matches the nonce-class pattern that should
    /// trigger a nonce resynchronization before the next retry.
    #[must_use]
    pub fn is_nonce_class(&self) -> bool {
        crate::submitter::is_nonce_class_error(&self.to_string())
    }
}
