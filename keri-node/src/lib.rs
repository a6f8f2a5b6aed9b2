//! Wires the four independent components over one shared storage
//! backend: a KEL/TEL/ACDC event store, the mnemonic-backed key
//! manager, a per-group consensus engine, and the challenge
//! authenticator that bridges the first two.
//!
//! Grounded on `components/controller`'s top-level `Controller` struct
//! (inside the `THCLab-keriox` retrieval snapshot), which holds one
//! `Arc<SledEventDatabase>` and constructs an `EventStorage` and a
//! `KeyManager` over it rather than each owning a separate backend.

pub mod error;

use std::sync::Arc;

use kv_store::Storage;

pub use error::NodeError;

use challenge_auth::ChallengeAuthenticator;
use group_consensus::GroupEngine;
use keri_identity::KeyManager;
use keri_store::{EventStore, KeyStateRecord};

/// A node's view of the system: one storage backend shared by every
/// component. `GroupEngine` is constructed per `self_aid` on demand
/// rather than held, since a node may act on behalf of more than one
/// local AID and a group engine is scoped to exactly one.
pub struct Node<S: Storage> {
    storage: Arc<S>,
    pub events: EventStore<S>,
    pub identity: KeyManager<S>,
    pub challenges: ChallengeAuthenticator<S>,
}

impl<S: Storage> Node<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            events: EventStore::new(storage.clone()),
            identity: KeyManager::new(storage.clone()),
            challenges: ChallengeAuthenticator::new(storage.clone()),
            storage,
        }
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    pub fn group_engine(&self, self_aid: impl Into<String>) -> GroupEngine<S> {
        GroupEngine::new(self.storage.clone(), self_aid.into())
    }

    /// Rebuilds a `KeyStateRecord` from an AID's current KEL head and
    /// registers it with the challenge authenticator, so a signature
    /// made with the key the KEL currently names can be verified
    /// without the authenticator re-walking the KEL itself.
    pub async fn sync_key_state(&self, aid: &str) -> Result<KeyStateRecord, NodeError> {
        let kel = self.events.get_kel(aid).await?;
        let head = kel.last().ok_or(NodeError::NoKel)?;
        let record = KeyStateRecord {
            aid: aid.to_string(),
            ksn: head.sn,
            current_keys: head.keys.clone(),
            threshold: head.signing_threshold,
            last_evt_said: head.said.clone(),
            updated_at: chrono::Utc::now(),
        };
        self.challenges.register_key_state(record.clone()).await?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kv_store::memory::MemoryBackend;

    fn random_phrase() -> String {
        use bip39::{Language, Mnemonic, MnemonicType};
        Mnemonic::new(MnemonicType::Words12, Language::English)
            .phrase()
            .to_string()
    }

    #[async_std::test]
    async fn sync_key_state_reflects_kel_head_after_rotation() {
        let node = Node::new(Arc::new(MemoryBackend::new()));
        let mut identity = KeyManager::new(node.storage().clone());
        let aid = identity
            .new_account("alice", &random_phrase(), b"pw")
            .await
            .unwrap();

        let record = node.sync_key_state(&aid).await.unwrap();
        assert_eq!(record.ksn, 0);

        identity.rotate(&aid, None, b"pw").await.unwrap();
        let record = node.sync_key_state(&aid).await.unwrap();
        assert_eq!(record.ksn, 1);
    }

    #[async_std::test]
    async fn group_engine_is_scoped_to_the_given_aid() {
        let node = Node::new(Arc::new(MemoryBackend::new()));
        let engine = node.group_engine("aidAlice");
        let group = engine
            .create_group("general", group_consensus::GroupSettings::default())
            .await
            .unwrap();
        assert_eq!(group.creator_aid, "aidAlice");
    }
}
