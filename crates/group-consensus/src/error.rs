use thiserror::Error;

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("group does not exist")]
    NotFound,

    #[error("AID is not a member of this group")]
    NotMember,

    #[error("prevId does not reference a stored message in this group")]
    InvalidPrevId,

    #[error("recomputed message id does not match the claimed id")]
    InvalidMessageHash,

    #[error("message with this id is already stored")]
    DuplicateMessage,

    #[error("vote references an unknown message")]
    UnknownMessage,

    #[error(transparent)]
    Storage(#[from] kv_store::StorageError),

    #[error("serialization error: {0}")]
    Serde(String),
}

impl From<serde_json::Error> for GroupError {
    fn from(e: serde_json::Error) -> Self {
        GroupError::Serde(e.to_string())
    }
}
