//! Per-AID key-state snapshot. Written by the identity owner
//! (`keri-identity`) after every rotation; read by the challenge
//! authenticator (`challenge-auth`) to verify signatures without
//! re-walking an entire KEL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyStateRecord {
    pub aid: String,
    /// Key Sequence Number: the `s` of the latest KEL event establishing
    /// these keys.
    pub ksn: u64,
    pub current_keys: Vec<String>,
    pub threshold: u32,
    pub last_evt_said: String,
    pub updated_at: DateTime<Utc>,
}
