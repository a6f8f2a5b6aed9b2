//! Key Event Log events: inception, rotation, interaction.
//!
//! Field names follow `keriox_core::event::event_data` (`inception.rs`,
//! `rotation.rs`, `interaction.rs`): `d`, `i`, `s`, `p`, `k`, `kt`, `n`,
//! `nt`. Multi-signature weighted thresholds (keriox's `fraction`-backed
//! `SignatureThreshold`) are dropped — no caller here needs anything
//! past a plain signature count, so `kt`/`nt` are plain counts.

use serde::{Deserialize, Serialize};

use crate::said::SaidField;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KelEventKind {
    Icp,
    Rot,
    Ixn,
}

impl KelEventKind {
    pub fn to_structured(self) -> structured_key::EventKind {
        match self {
            KelEventKind::Icp => structured_key::EventKind::Icp,
            KelEventKind::Rot => structured_key::EventKind::Rot,
            KelEventKind::Ixn => structured_key::EventKind::Ixn,
        }
    }
}

/// A single KEL event, keyed by its own self-addressing digest `d`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KelEvent {
    #[serde(rename = "d")]
    pub said: String,
    #[serde(rename = "t")]
    pub kind: KelEventKind,
    #[serde(rename = "i")]
    pub aid: String,
    #[serde(rename = "s")]
    pub sn: u64,
    #[serde(rename = "p", skip_serializing_if = "Option::is_none")]
    pub prior: Option<String>,
    /// Current signing keys (opaque public-key encodings; real key
    /// material and CESR derivation codes live beneath the Signer
    /// capability, out of this layer's concern).
    #[serde(rename = "k")]
    pub keys: Vec<String>,
    #[serde(rename = "kt")]
    pub signing_threshold: u32,
    /// Digests of the next key set, committed to now and revealed at the
    /// following rotation.
    #[serde(rename = "n")]
    pub next_key_digests: Vec<String>,
    #[serde(rename = "nt")]
    pub next_threshold: u32,
}

impl SaidField for KelEvent {
    fn said(&self) -> &str {
        &self.said
    }
    fn set_said(&mut self, said: String) {
        self.said = said;
    }
}

impl KelEvent {
    pub fn inception(
        keys: Vec<String>,
        signing_threshold: u32,
        next_key_digests: Vec<String>,
        next_threshold: u32,
    ) -> Self {
        let mut event = KelEvent {
            said: String::new(),
            kind: KelEventKind::Icp,
            aid: String::new(),
            sn: 0,
            prior: None,
            keys,
            signing_threshold,
            next_key_digests,
            next_threshold,
        };
        let said = crate::said::compute_said(&event).expect("KelEvent always serializes");
        event.said = said.clone();
        // An inception event's AID is its own SAID.
        event.aid = said;
        event
    }

    pub fn rotation(
        aid: String,
        sn: u64,
        prior: String,
        keys: Vec<String>,
        signing_threshold: u32,
        next_key_digests: Vec<String>,
        next_threshold: u32,
    ) -> Self {
        let mut event = KelEvent {
            said: String::new(),
            kind: KelEventKind::Rot,
            aid,
            sn,
            prior: Some(prior),
            keys,
            signing_threshold,
            next_key_digests,
            next_threshold,
        };
        event.said = crate::said::compute_said(&event).expect("KelEvent always serializes");
        event
    }

    pub fn interaction(aid: String, sn: u64, prior: String) -> Self {
        let mut event = KelEvent {
            said: String::new(),
            kind: KelEventKind::Ixn,
            aid,
            sn,
            prior: Some(prior),
            keys: Vec::new(),
            signing_threshold: 0,
            next_key_digests: Vec::new(),
            next_threshold: 0,
        };
        event.said = crate::said::compute_said(&event).expect("KelEvent always serializes");
        event
    }
}
