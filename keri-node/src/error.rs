use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Identity(#[from] keri_identity::IdentityError),

    #[error(transparent)]
    Store(#[from] keri_store::StoreError),

    #[error(transparent)]
    Group(#[from] group_consensus::GroupError),

    #[error(transparent)]
    Challenge(#[from] challenge_auth::ChallengeError),

    #[error(transparent)]
    Storage(#[from] kv_store::StorageError),

    #[error("AID has no KEL yet, cannot derive a key-state snapshot")]
    NoKel,
}
