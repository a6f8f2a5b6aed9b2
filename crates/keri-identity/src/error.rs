use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("alias is already bound to an account")]
    AliasInUse,

    #[error("mnemonic failed validation")]
    WeakEntropy,

    #[error("key material for this AID is not unlocked")]
    LockedKey,

    #[error("signer's public key is not among the AID's current KEL keys")]
    SignerKeyMismatch,

    #[error("no account found for this AID")]
    NotFound,

    #[error("bundle decryption failed")]
    Decryption,

    #[error(transparent)]
    Store(#[from] keri_store::StoreError),

    #[error(transparent)]
    Storage(#[from] kv_store::StorageError),

    #[error("serialization error: {0}")]
    Serde(String),
}

impl From<serde_json::Error> for IdentityError {
    fn from(e: serde_json::Error) -> Self {
        IdentityError::Serde(e.to_string())
    }
}
