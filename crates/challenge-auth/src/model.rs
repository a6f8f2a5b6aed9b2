use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengePayload {
    pub nonce: String,
    pub aid: String,
    pub purpose: String,
    pub args_hash: String,
    pub iat: DateTime<Utc>,
    pub exp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeRecord {
    pub challenge_id: String,
    pub payload: ChallengePayload,
    pub consumed: bool,
}

/// One entry of `verify`'s `sigs` argument: a base64 signature paired
/// with the position of the key it was produced with in the key-state
/// record's `currentKeys`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedSignature {
    pub key_index: usize,
    pub signature: String,
}
