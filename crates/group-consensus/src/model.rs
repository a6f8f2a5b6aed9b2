//! Group/member/message data model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::VectorClock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Creator,
    Member,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSettings {
    /// `(0, 1]`; `0.5` selects strict-majority arithmetic.
    pub quorum_threshold: f64,
    pub allow_member_invite: bool,
}

impl Default for GroupSettings {
    fn default() -> Self {
        Self {
            quorum_threshold: 0.5,
            allow_member_invite: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub aid: String,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
    pub last_seen_message_id: Option<String>,
    pub vector_clock: VectorClock,
    pub last_online_at: Option<DateTime<Utc>>,
    pub is_online: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub group_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub creator_aid: String,
    pub members: Vec<GroupMember>,
    pub settings: GroupSettings,
    pub last_read_message_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Canonical,
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupMessage {
    pub id: String,
    pub group_id: String,
    pub from: String,
    pub prev_id: Option<String>,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub lamport_clock: u64,
    pub vector_clock: VectorClock,
    pub votes: BTreeMap<String, bool>,
    pub status: MessageStatus,
    pub seq: Option<u64>,
}

/// Outbound vote record. Carries a `from` field
/// rather than relying on vector-clock-delta inference — Open Question
/// resolution in `SPEC_FULL.md` §D.1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub group_id: String,
    pub message_id: String,
    pub from: String,
    pub vote: bool,
    pub vector_clock: VectorClock,
}
