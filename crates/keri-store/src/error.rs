use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("SAID does not match recomputed digest")]
    SaidMismatch,

    #[error("event out of order: expected sequence {expected}, got {got}")]
    OutOfOrder { expected: u64, got: u64 },

    #[error("prior event digest does not match stored head")]
    PriorMismatch,

    #[error("rotation key pre-images do not match prior next-key digests")]
    RotationKeyMismatch,

    #[error("event already stored with different content at this sequence number")]
    DuplicateEvent,

    #[error("requested item not found")]
    NotFound,

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Storage(#[from] kv_store::StorageError),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serde(e.to_string())
    }
}
