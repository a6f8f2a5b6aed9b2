//! The group consensus engine: send, receive message,
//! receive vote, quorum check, canonicalisation, conflict resolution,
//! and the pull-based sync protocol.
//!
//! No direct `keriox` analogue — it has no group-chat concept. Grounded
//! on `hxrts-aura/crates/aura-chat` (`group.rs`, `service.rs`) for the
//! state split and on `aura-consensus` for the quorum/vote vocabulary,
//! reimplemented with a flat `thiserror` error enum, `Arc<S: Storage>`
//! handle, and explicit `Result` returns instead of `aura`'s effects
//! system.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use kv_store::{ListOptions, Storage};
use serde::{Deserialize, Serialize};
use structured_key::StructuredKey;
use uuid::Uuid;

use crate::clock::VectorClock;
use crate::error::GroupError;
use crate::message_id::compute_message_id;
use crate::model::{Group, GroupMember, GroupMessage, GroupSettings, MessageStatus, Role, Vote};
use crate::quorum::has_quorum;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    pub group_id: String,
    pub my_head: Option<String>,
    pub my_vector_clock: VectorClock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    pub group_id: String,
    pub messages: Vec<GroupMessage>,
    pub my_head: Option<String>,
    pub my_vector_clock: VectorClock,
}

pub struct GroupEngine<S: Storage> {
    storage: Arc<S>,
    self_aid: String,
    on_canonical: Option<Box<dyn Fn(&GroupMessage) + Send + Sync>>,
}

impl<S: Storage> GroupEngine<S> {
    pub fn new(storage: Arc<S>, self_aid: String) -> Self {
        Self {
            storage,
            self_aid,
            on_canonical: None,
        }
    }

    pub fn with_on_canonical(mut self, callback: impl Fn(&GroupMessage) + Send + Sync + 'static) -> Self {
        self.on_canonical = Some(Box::new(callback));
        self
    }

    fn metadata_key(group_id: &str) -> Vec<u8> {
        StructuredKey::json(["groups", group_id, "metadata"]).encode()
    }

    fn message_key(group_id: &str, id: &str) -> Vec<u8> {
        StructuredKey::json(["groups", group_id, "messages", id]).encode()
    }

    fn messages_prefix(group_id: &str) -> Vec<u8> {
        format!("groups/{group_id}/messages/").into_bytes()
    }

    fn head_key(group_id: &str) -> Vec<u8> {
        StructuredKey::text(["groups", group_id, "HEAD"]).encode()
    }

    fn seq_key(group_id: &str) -> Vec<u8> {
        StructuredKey::text(["groups", group_id, "seq"]).encode()
    }

    fn lamport_key(group_id: &str) -> Vec<u8> {
        StructuredKey::text(["groups", group_id, "lamportClock"]).encode()
    }

    async fn load_group(&self, group_id: &str) -> Result<Group, GroupError> {
        let bytes = self
            .storage
            .get(&Self::metadata_key(group_id))
            .await?
            .ok_or(GroupError::NotFound)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn put_group(&self, group: &Group) -> Result<(), GroupError> {
        self.storage
            .put(&Self::metadata_key(&group.group_id), &serde_json::to_vec(group)?)
            .await?;
        Ok(())
    }

    async fn load_message(&self, group_id: &str, id: &str) -> Result<Option<GroupMessage>, GroupError> {
        match self.storage.get(&Self::message_key(group_id, id)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put_message(&self, message: &GroupMessage) -> Result<(), GroupError> {
        self.storage
            .put(
                &Self::message_key(&message.group_id, &message.id),
                &serde_json::to_vec(message)?,
            )
            .await?;
        Ok(())
    }

    async fn load_head(&self, group_id: &str) -> Result<Option<String>, GroupError> {
        match self.storage.get(&Self::head_key(group_id)).await? {
            Some(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            None => Ok(None),
        }
    }

    async fn load_counter(&self, key: Vec<u8>) -> Result<u64, GroupError> {
        match self.storage.get(&key).await? {
            Some(bytes) => Ok(String::from_utf8_lossy(&bytes).parse().unwrap_or(0)),
            None => Ok(0),
        }
    }

    async fn all_messages(&self, group_id: &str) -> Result<Vec<GroupMessage>, GroupError> {
        let entries = self
            .storage
            .list(&Self::messages_prefix(group_id), ListOptions::default())
            .await?;
        entries
            .into_iter()
            .map(|e| {
                let bytes = e.value.unwrap_or_default();
                serde_json::from_slice(&bytes).map_err(GroupError::from)
            })
            .collect()
    }

    /// Create a new group with `self_aid` as creator. Not a named
    /// operation in this layer, but necessary scaffolding any caller of
    /// `send`/`receiveMessage` needs before those operations apply.
    pub async fn create_group(
        &self,
        name: &str,
        settings: GroupSettings,
    ) -> Result<Group, GroupError> {
        let group_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let group = Group {
            group_id: group_id.clone(),
            name: name.to_string(),
            created_at: now,
            creator_aid: self.self_aid.clone(),
            members: vec![GroupMember {
                aid: self.self_aid.clone(),
                role: Role::Creator,
                joined_at: now,
                last_seen_message_id: None,
                vector_clock: VectorClock::new(),
                last_online_at: Some(now),
                is_online: true,
            }],
            settings,
            last_read_message_id: None,
        };
        self.put_group(&group).await?;
        self.storage.put(&Self::seq_key(&group_id), b"0").await?;
        self.storage.put(&Self::lamport_key(&group_id), b"0").await?;
        Ok(group)
    }

    pub async fn add_member(&self, group_id: &str, aid: &str) -> Result<Group, GroupError> {
        let mut group = self.load_group(group_id).await?;
        if group.members.iter().any(|m| m.aid == aid) {
            return Ok(group);
        }
        group.members.push(GroupMember {
            aid: aid.to_string(),
            role: Role::Member,
            joined_at: Utc::now(),
            last_seen_message_id: None,
            vector_clock: VectorClock::new(),
            last_online_at: None,
            is_online: false,
        });
        self.put_group(&group).await?;
        Ok(group)
    }

    /// A member persists its own local copy of a group's metadata after
    /// learning about it out-of-band (an invite, a membership change
    /// relayed by another member). Not a named operation in this layer,
    /// but necessary scaffolding: membership propagation between
    /// independent backends is otherwise out of scope here, and
    /// `receiveMessage`/`createSyncRequest` both require a local `Group`
    /// record to already exist.
    pub async fn adopt_group(&self, group: Group) -> Result<(), GroupError> {
        self.put_group(&group).await
    }

    /// `send(groupId, content)`.
    pub async fn send(&self, group_id: &str, content: &str) -> Result<GroupMessage, GroupError> {
        let mut group = self.load_group(group_id).await?;
        let member_idx = group
            .members
            .iter()
            .position(|m| m.aid == self.self_aid)
            .ok_or(GroupError::NotMember)?;

        let prev_id = self.load_head(group_id).await?;

        let mut vector_clock = group.members[member_idx].vector_clock.clone();
        vector_clock.increment(&self.self_aid);

        let lamport_clock = self.load_counter(Self::lamport_key(group_id)).await? + 1;

        let timestamp = Utc::now();
        let id = compute_message_id(prev_id.as_deref(), &self.self_aid, content, timestamp);

        let mut votes = BTreeMap::new();
        votes.insert(self.self_aid.clone(), true);

        let message = GroupMessage {
            id: id.clone(),
            group_id: group_id.to_string(),
            from: self.self_aid.clone(),
            prev_id,
            content: content.to_string(),
            timestamp,
            lamport_clock,
            vector_clock: vector_clock.clone(),
            votes,
            status: MessageStatus::Pending,
            seq: None,
        };
        self.put_message(&message).await?;
        self.storage
            .put(&Self::lamport_key(group_id), lamport_clock.to_string().as_bytes())
            .await?;

        group.members[member_idx].vector_clock = vector_clock;
        self.put_group(&group).await?;

        self.check_quorum(group_id, &id).await?;
        Ok(self.load_message(group_id, &id).await?.expect("just stored"))
    }

    /// `receiveMessage(message)`.
    pub async fn receive_message(&self, mut incoming: GroupMessage) -> Result<Vote, GroupError> {
        let mut group = self.load_group(&incoming.group_id).await?;
        if !group.members.iter().any(|m| m.aid == self.self_aid) {
            return Err(GroupError::NotMember);
        }
        if !group.members.iter().any(|m| m.aid == incoming.from) {
            return Err(GroupError::NotMember);
        }

        if let Some(prev) = &incoming.prev_id {
            if self.load_message(&incoming.group_id, prev).await?.is_none() {
                return Err(GroupError::InvalidPrevId);
            }
        }

        let recomputed = compute_message_id(
            incoming.prev_id.as_deref(),
            &incoming.from,
            &incoming.content,
            incoming.timestamp,
        );
        if recomputed != incoming.id {
            return Err(GroupError::InvalidMessageHash);
        }

        if self
            .load_message(&incoming.group_id, &incoming.id)
            .await?
            .is_some()
        {
            return Err(GroupError::DuplicateMessage);
        }

        let member_idx = group
            .members
            .iter()
            .position(|m| m.aid == self.self_aid)
            .expect("checked above");
        let mut vector_clock = group.members[member_idx].vector_clock.clone();
        vector_clock.merge(&incoming.vector_clock);
        vector_clock.increment(&self.self_aid);

        let lamport_clock = self
            .load_counter(Self::lamport_key(&incoming.group_id))
            .await?
            .max(incoming.lamport_clock)
            + 1;
        self.storage
            .put(
                &Self::lamport_key(&incoming.group_id),
                lamport_clock.to_string().as_bytes(),
            )
            .await?;

        // A synced message arrives already `Canonical` with the sender's
        // own `seq` (`createSyncResponse` only ever emits canonical
        // messages) — both are foreign bookkeeping that must be
        // re-derived locally, not adopted verbatim, or `checkQuorum`'s
        // `Pending`-only guard skips it forever and this member's own
        // `seq` counter collides with the sender's on its next `send`.
        incoming.status = MessageStatus::Pending;
        incoming.seq = None;
        incoming.votes.insert(self.self_aid.clone(), true);
        self.put_message(&incoming).await?;

        group.members[member_idx].vector_clock = vector_clock.clone();
        self.put_group(&group).await?;

        self.check_quorum(&incoming.group_id, &incoming.id).await?;

        Ok(Vote {
            group_id: incoming.group_id.clone(),
            message_id: incoming.id.clone(),
            from: self.self_aid.clone(),
            vote: true,
            vector_clock,
        })
    }

    /// `receiveVote(vote)`. The voter is read directly
    /// from the vote's `from` field (Open Question resolution), rather
    /// than inferred from a vector-clock delta.
    pub async fn receive_vote(&self, vote: Vote) -> Result<(), GroupError> {
        let group = self.load_group(&vote.group_id).await?;
        if !group.members.iter().any(|m| m.aid == vote.from) {
            log::debug!("receive_vote: rejecting vote from non-member {}", vote.from);
            return Ok(());
        }
        let mut message = self
            .load_message(&vote.group_id, &vote.message_id)
            .await?
            .ok_or(GroupError::UnknownMessage)?;
        message.votes.insert(vote.from.clone(), vote.vote);
        self.put_message(&message).await?;
        self.check_quorum(&vote.group_id, &message.id).await?;
        Ok(())
    }

    /// `checkQuorum`. A message that just reached quorum
    /// is canonicalised immediately only if no other pending message
    /// contends for the same `prevId`. If rivals exist, resolution is
    /// deferred until every rival has itself reached quorum — resolving
    /// as soon as one rival is quorate but others are still undecided
    /// would let whichever side happens to cross-deliver first "win" by
    /// timing alone, which is not reproducible across members and
    /// breaks the conflict-resolution determinism invariant. Once all contenders are quorate, `hasQuorum` ties
    /// trivially and the Lamport-clock/id tie-break in §4.E.7 decides.
    async fn check_quorum(&self, group_id: &str, message_id: &str) -> Result<(), GroupError> {
        let group = self.load_group(group_id).await?;
        let message = match self.load_message(group_id, message_id).await? {
            Some(m) if m.status == MessageStatus::Pending => m,
            _ => return Ok(()),
        };

        if !has_quorum(&message.votes, group.members.len(), group.settings.quorum_threshold) {
            return Ok(());
        }

        let rivals: Vec<GroupMessage> = self
            .all_messages(group_id)
            .await?
            .into_iter()
            .filter(|other| {
                other.status == MessageStatus::Pending
                    && other.prev_id == message.prev_id
                    && other.id != message.id
            })
            .collect();

        if rivals.is_empty() {
            self.canonicalize(group_id, &message.id).await?;
        } else if rivals
            .iter()
            .all(|r| has_quorum(&r.votes, group.members.len(), group.settings.quorum_threshold))
        {
            let mut candidates = rivals;
            candidates.push(message);
            self.resolve_conflict(group_id, candidates).await?;
        } else {
            log::debug!("check_quorum: {group_id}/{message_id} quorate but a rival is undecided, deferring");
        }
        Ok(())
    }

    /// `canonicalise`.
    async fn canonicalize(&self, group_id: &str, message_id: &str) -> Result<(), GroupError> {
        let mut message = self
            .load_message(group_id, message_id)
            .await?
            .ok_or(GroupError::UnknownMessage)?;
        let seq = self.load_counter(Self::seq_key(group_id)).await? + 1;
        message.status = MessageStatus::Canonical;
        message.seq = Some(seq);
        self.put_message(&message).await?;
        self.storage
            .put(&Self::seq_key(group_id), seq.to_string().as_bytes())
            .await?;
        self.storage
            .put(&Self::head_key(group_id), message.id.as_bytes())
            .await?;
        log::debug!("canonicalize: {group_id}/{message_id} -> seq {seq}");
        if let Some(callback) = &self.on_canonical {
            callback(&message);
        }
        Ok(())
    }

    /// `resolveConflict`. Deterministic: quorum-true
    /// first, then ascending Lamport clock, then ascending id.
    async fn resolve_conflict(
        &self,
        group_id: &str,
        mut conflicts: Vec<GroupMessage>,
    ) -> Result<(), GroupError> {
        let group = self.load_group(group_id).await?;
        let n = group.members.len();
        let threshold = group.settings.quorum_threshold;

        conflicts.sort_by(|a, b| {
            let a_quorum = has_quorum(&a.votes, n, threshold);
            let b_quorum = has_quorum(&b.votes, n, threshold);
            b_quorum
                .cmp(&a_quorum)
                .then(a.lamport_clock.cmp(&b.lamport_clock))
                .then(a.id.cmp(&b.id))
        });

        let winner = conflicts.remove(0);
        self.canonicalize(group_id, &winner.id).await?;

        for mut loser in conflicts {
            loser.status = MessageStatus::Discarded;
            loser.seq = None;
            self.put_message(&loser).await?;
        }
        Ok(())
    }

    /// `createSyncRequest(groupId)`.
    pub async fn create_sync_request(&self, group_id: &str) -> Result<SyncRequest, GroupError> {
        let group = self.load_group(group_id).await?;
        let idx = group
            .members
            .iter()
            .position(|m| m.aid == self.self_aid)
            .ok_or(GroupError::NotMember)?;
        Ok(SyncRequest {
            group_id: group_id.to_string(),
            my_head: self.load_head(group_id).await?,
            my_vector_clock: group.members[idx].vector_clock.clone(),
        })
    }

    /// `createSyncResponse(request)`.
    pub async fn create_sync_response(&self, request: &SyncRequest) -> Result<SyncResponse, GroupError> {
        let group = self.load_group(&request.group_id).await?;
        let idx = group
            .members
            .iter()
            .position(|m| m.aid == self.self_aid)
            .ok_or(GroupError::NotMember)?;

        let requester_seq = match &request.my_head {
            None => 0,
            Some(head_id) => self
                .load_message(&request.group_id, head_id)
                .await?
                .and_then(|m| m.seq)
                .unwrap_or(0),
        };

        let mut messages: Vec<GroupMessage> = self
            .all_messages(&request.group_id)
            .await?
            .into_iter()
            .filter(|m| m.status == MessageStatus::Canonical)
            .filter(|m| m.seq.map(|s| s > requester_seq).unwrap_or(false))
            .collect();
        messages.sort_by_key(|m| m.seq.unwrap_or(0));

        Ok(SyncResponse {
            group_id: request.group_id.clone(),
            messages,
            my_head: self.load_head(&request.group_id).await?,
            my_vector_clock: group.members[idx].vector_clock.clone(),
        })
    }

    /// `processSyncResponse(response)`. Per-message
    /// failures are logged and skipped; a single bad message never
    /// halts the sync.
    pub async fn process_sync_response(&self, response: SyncResponse) -> Result<(), GroupError> {
        for message in response.messages {
            let id = message.id.clone();
            if let Err(e) = self.receive_message(message).await {
                log::warn!("process_sync_response: skipping {id}: {e}");
            }
        }

        let mut group = self.load_group(&response.group_id).await?;
        if let Some(idx) = group.members.iter().position(|m| m.aid == self.self_aid) {
            group.members[idx].vector_clock.merge(&response.my_vector_clock);
            self.put_group(&group).await?;
        }
        Ok(())
    }
}
