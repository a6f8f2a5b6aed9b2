//! Transaction Event Log events: registry inception, credential issuance,
//! credential revocation.
//!
//! Grounded on `support/teliox`'s split between a management sub-chain
//! (`ManagerTelEvent`, here `Vcp`) and a per-credential sub-chain
//! (`VCEvent`, here `Iss`/`Rev`), renamed to this crate's own vocabulary.
//! Each sub-chain is scoped and ordered independently by `i`.

use serde::{Deserialize, Serialize};

use crate::said::SaidField;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TelEventKind {
    Vcp,
    Iss,
    Rev,
}

impl TelEventKind {
    pub fn to_structured(self) -> structured_key::EventKind {
        match self {
            TelEventKind::Vcp => structured_key::EventKind::Vcp,
            TelEventKind::Iss => structured_key::EventKind::Iss,
            TelEventKind::Rev => structured_key::EventKind::Rev,
        }
    }
}

/// A single TEL event. `i` is the chain-scope identifier: for `vcp` it is
/// the registry's own SAID (set equal to `d` on inception); for `iss`/
/// `rev` it is the credential SAID the event is chained under. `ri` names
/// the owning registry in every case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelEvent {
    #[serde(rename = "d")]
    pub said: String,
    #[serde(rename = "t")]
    pub kind: TelEventKind,
    #[serde(rename = "i")]
    pub scope_id: String,
    #[serde(rename = "ri")]
    pub registry_id: String,
    #[serde(rename = "s")]
    pub sn: u64,
    #[serde(rename = "p", skip_serializing_if = "Option::is_none")]
    pub prior: Option<String>,
}

impl SaidField for TelEvent {
    fn said(&self) -> &str {
        &self.said
    }
    fn set_said(&mut self, said: String) {
        self.said = said;
    }
}

impl TelEvent {
    /// Registry inception. The registry's identifier is its own SAID.
    pub fn registry_inception() -> Self {
        let mut event = TelEvent {
            said: String::new(),
            kind: TelEventKind::Vcp,
            scope_id: String::new(),
            registry_id: String::new(),
            sn: 0,
            prior: None,
        };
        let said = crate::said::compute_said(&event).expect("TelEvent always serializes");
        event.said = said.clone();
        event.scope_id = said.clone();
        event.registry_id = said;
        event
    }

    pub fn issuance(registry_id: String, credential_said: String) -> Self {
        let mut event = TelEvent {
            said: String::new(),
            kind: TelEventKind::Iss,
            scope_id: credential_said,
            registry_id,
            sn: 0,
            prior: None,
        };
        event.said = crate::said::compute_said(&event).expect("TelEvent always serializes");
        event
    }

    pub fn revocation(
        registry_id: String,
        credential_said: String,
        sn: u64,
        prior: String,
    ) -> Self {
        let mut event = TelEvent {
            said: String::new(),
            kind: TelEventKind::Rev,
            scope_id: credential_said,
            registry_id,
            sn,
            prior: Some(prior),
        };
        event.said = crate::said::compute_said(&event).expect("TelEvent always serializes");
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_inception_is_self_scoped() {
        let vcp = TelEvent::registry_inception();
        assert_eq!(vcp.scope_id, vcp.said);
        assert_eq!(vcp.registry_id, vcp.said);
    }

    #[test]
    fn revocation_chains_to_issuance() {
        let vcp = TelEvent::registry_inception();
        let iss = TelEvent::issuance(vcp.registry_id.clone(), "Ecred".into());
        let rev = TelEvent::revocation(
            vcp.registry_id.clone(),
            "Ecred".into(),
            1,
            iss.said.clone(),
        );
        assert_eq!(rev.prior.as_deref(), Some(iss.said.as_str()));
        assert_eq!(rev.scope_id, iss.scope_id);
    }
}
