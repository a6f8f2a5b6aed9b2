#[derive(Debug, thiserror::Error)]
pub enum ChallengeError {
    #[error("unknown challenge")]
    UnknownChallenge,
    #[error("challenge expired")]
    Expired,
    #[error("challenge already consumed")]
    AlreadyConsumed,
    #[error("purpose does not match issued challenge")]
    PurposeMismatch,
    #[error("argsHash does not match issued challenge")]
    ArgsMismatch,
    #[error("unknown key state for aid at requested ksn")]
    UnknownKeyState,
    #[error("key state ksn regression: stored {stored}, got {got}")]
    StaleKeyState { stored: u64, got: u64 },
    #[error("fewer than threshold valid signatures")]
    InsufficientSignatures,
    #[error("malformed signature or key index")]
    InvalidSignature,
    #[error(transparent)]
    Storage(#[from] kv_store::StorageError),
    #[error("serialization error: {0}")]
    Serde(String),
}

impl From<serde_json::Error> for ChallengeError {
    fn from(e: serde_json::Error) -> Self {
        ChallengeError::Serde(e.to_string())
    }
}
