//! The KERI Event Store: admits a serialised event, verifies
//! its SAID and chaining, persists it under canonical keys, and
//! maintains the `said/` reverse index and per-AID/registry head
//! pointers.
//!
//! Grounded on the split between
//! `keriox_core::processor::event_storage::EventStorage` (read path) and
//! `keriox_core::processor::validator::EventValidator` (chaining checks)
//! — both collapsed into one struct here since this layer's chaining
//! rules are much narrower than `keriox`'s full validator (no
//! delegation, no witness receipts, no escrow).

use std::sync::Arc;

use kv_store::{ListOptions, Storage};
use structured_key::StructuredKey;

use crate::acdc::Acdc;
use crate::error::StoreError;
use crate::kel::{KelEvent, KelEventKind};
use crate::said::{digest_bytes, verify_said};
use crate::tel::{TelEvent, TelEventKind};

pub struct EventStore<S: Storage> {
    storage: Arc<S>,
}

impl<S: Storage> EventStore<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    fn kel_key(aid: &str, sn: u64, kind: KelEventKind) -> Vec<u8> {
        StructuredKey::cesr_typed(
            ["aid", aid, "kel", &format!("{sn:06}")],
            kind.to_structured(),
            None,
        )
        .encode()
    }

    fn kel_sn_prefix(aid: &str, sn: u64) -> Vec<u8> {
        let mut p = format!("aid/{aid}/kel/{sn:06}.").into_bytes();
        p.shrink_to_fit();
        p
    }

    fn kel_prefix(aid: &str) -> Vec<u8> {
        format!("aid/{aid}/kel/").into_bytes()
    }

    fn head_key(aid: &str) -> Vec<u8> {
        StructuredKey::text(["aid", aid, "head"]).encode()
    }

    fn said_key(said: &str) -> Vec<u8> {
        StructuredKey::cesr(["said", said]).encode()
    }

    async fn get_head_event(&self, aid: &str) -> Result<Option<KelEvent>, StoreError> {
        let head = self.storage.get(&Self::head_key(aid)).await?;
        let Some(head_said) = head else {
            return Ok(None);
        };
        let head_said = String::from_utf8(head_said)
            .map_err(|_| StoreError::MalformedEvent("head pointer not UTF-8".into()))?;
        let bytes = self
            .storage
            .get(&Self::said_key(&head_said))
            .await?
            .ok_or_else(|| StoreError::MalformedEvent("head pointer dangles".into()))?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Admit a KEL event. `bytes` is the canonical JSON serialisation of
    /// a `KelEvent` with its `d` field already computed by the producer
    /// (`keri-identity`).
    pub async fn put_event(&self, bytes: &[u8]) -> Result<KelEvent, StoreError> {
        let event: KelEvent = serde_json::from_slice(bytes)
            .map_err(|e| StoreError::MalformedEvent(e.to_string()))?;

        if !verify_said(&event)? {
            return Err(StoreError::SaidMismatch);
        }

        let canonical = serde_json::to_vec(&event)?;

        // Duplicate detection: is there already something at this (aid, sn)?
        let existing = self
            .storage
            .list(&Self::kel_sn_prefix(&event.aid, event.sn), ListOptions::default())
            .await?;
        if let Some(entry) = existing.into_iter().next() {
            let stored_bytes = entry.value.unwrap_or_default();
            if stored_bytes == canonical {
                log::debug!(
                    "putEvent: idempotent resubmission of {} at sn {}",
                    event.aid,
                    event.sn
                );
                return Ok(event);
            }
            log::warn!(
                "putEvent: conflicting event at ({}, {})",
                event.aid,
                event.sn
            );
            return Err(StoreError::DuplicateEvent);
        }

        match self.get_head_event(&event.aid).await? {
            None => {
                if event.kind != KelEventKind::Icp || event.sn != 0 || event.aid != event.said {
                    return Err(StoreError::MalformedEvent(
                        "first event of an AID must be an inception at sn=0 with i==d".into(),
                    ));
                }
            }
            Some(head) => {
                if event.sn != head.sn + 1 {
                    return Err(StoreError::OutOfOrder {
                        expected: head.sn + 1,
                        got: event.sn,
                    });
                }
                if event.prior.as_deref() != Some(head.said.as_str()) {
                    return Err(StoreError::PriorMismatch);
                }
                if event.kind == KelEventKind::Rot {
                    if event.keys.len() != head.next_key_digests.len() {
                        return Err(StoreError::RotationKeyMismatch);
                    }
                    for (key, committed) in event.keys.iter().zip(head.next_key_digests.iter()) {
                        if digest_bytes(key.as_bytes()) != *committed {
                            return Err(StoreError::RotationKeyMismatch);
                        }
                    }
                }
            }
        }

        self.storage
            .put(&Self::kel_key(&event.aid, event.sn, event.kind), &canonical)
            .await?;
        self.storage
            .put(&Self::said_key(&event.said), &canonical)
            .await?;
        self.storage
            .put(&Self::head_key(&event.aid), event.said.as_bytes())
            .await?;

        Ok(event)
    }

    pub async fn get_event_by_said(&self, said: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.storage.get(&Self::said_key(said)).await?)
    }

    pub async fn get_kel(&self, aid: &str) -> Result<Vec<KelEvent>, StoreError> {
        let entries = self
            .storage
            .list(&Self::kel_prefix(aid), ListOptions::default())
            .await?;
        entries
            .into_iter()
            .map(|e| {
                let bytes = e.value.unwrap_or_default();
                serde_json::from_slice(&bytes).map_err(StoreError::from)
            })
            .collect()
    }

    // --- TEL ---------------------------------------------------------

    fn tel_key(scope_id: &str, sn: u64, kind: TelEventKind) -> Vec<u8> {
        StructuredKey::cesr_typed(
            ["tel", scope_id, &format!("{sn:06}")],
            kind.to_structured(),
            None,
        )
        .encode()
    }

    fn tel_sn_prefix(scope_id: &str, sn: u64) -> Vec<u8> {
        format!("tel/{scope_id}/{sn:06}.").into_bytes()
    }

    fn tel_prefix(scope_id: &str) -> Vec<u8> {
        format!("tel/{scope_id}/").into_bytes()
    }

    fn tel_head_key(scope_id: &str) -> Vec<u8> {
        StructuredKey::text(["tel", scope_id, "head"]).encode()
    }

    async fn get_tel_head(&self, scope_id: &str) -> Result<Option<TelEvent>, StoreError> {
        let head = self.storage.get(&Self::tel_head_key(scope_id)).await?;
        let Some(head_said) = head else {
            return Ok(None);
        };
        let head_said = String::from_utf8(head_said)
            .map_err(|_| StoreError::MalformedEvent("TEL head pointer not UTF-8".into()))?;
        let bytes = self
            .storage
            .get(&Self::said_key(&head_said))
            .await?
            .ok_or_else(|| StoreError::MalformedEvent("TEL head pointer dangles".into()))?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    pub async fn put_tel_event(&self, bytes: &[u8]) -> Result<TelEvent, StoreError> {
        let event: TelEvent = serde_json::from_slice(bytes)
            .map_err(|e| StoreError::MalformedEvent(e.to_string()))?;

        if !verify_said(&event)? {
            return Err(StoreError::SaidMismatch);
        }

        let canonical = serde_json::to_vec(&event)?;

        let existing = self
            .storage
            .list(
                &Self::tel_sn_prefix(&event.scope_id, event.sn),
                ListOptions::default(),
            )
            .await?;
        if let Some(entry) = existing.into_iter().next() {
            let stored_bytes = entry.value.unwrap_or_default();
            if stored_bytes == canonical {
                return Ok(event);
            }
            return Err(StoreError::DuplicateEvent);
        }

        match self.get_tel_head(&event.scope_id).await? {
            None => {
                let is_valid_inception = match event.kind {
                    TelEventKind::Vcp => event.sn == 0 && event.scope_id == event.said,
                    TelEventKind::Iss => event.sn == 0,
                    TelEventKind::Rev => false,
                };
                if !is_valid_inception {
                    return Err(StoreError::MalformedEvent(
                        "first event of a TEL chain must be vcp or iss at sn=0".into(),
                    ));
                }
            }
            Some(head) => {
                if event.sn != head.sn + 1 {
                    return Err(StoreError::OutOfOrder {
                        expected: head.sn + 1,
                        got: event.sn,
                    });
                }
                if event.prior.as_deref() != Some(head.said.as_str()) {
                    return Err(StoreError::PriorMismatch);
                }
            }
        }

        self.storage
            .put(
                &Self::tel_key(&event.scope_id, event.sn, event.kind),
                &canonical,
            )
            .await?;
        self.storage
            .put(&Self::said_key(&event.said), &canonical)
            .await?;
        self.storage
            .put(&Self::tel_head_key(&event.scope_id), event.said.as_bytes())
            .await?;

        Ok(event)
    }

    pub async fn get_tel(&self, scope_id: &str) -> Result<Vec<TelEvent>, StoreError> {
        let entries = self
            .storage
            .list(&Self::tel_prefix(scope_id), ListOptions::default())
            .await?;
        entries
            .into_iter()
            .map(|e| {
                let bytes = e.value.unwrap_or_default();
                serde_json::from_slice(&bytes).map_err(StoreError::from)
            })
            .collect()
    }

    // --- ACDC ----------------------------------------------------------

    fn acdc_key(said: &str) -> Vec<u8> {
        StructuredKey::json(["acdc", said]).encode()
    }

    pub async fn put_acdc(&self, bytes: &[u8]) -> Result<Acdc, StoreError> {
        let acdc: Acdc = serde_json::from_slice(bytes)
            .map_err(|e| StoreError::MalformedEvent(e.to_string()))?;
        if !verify_said(&acdc)? {
            return Err(StoreError::SaidMismatch);
        }
        let canonical = serde_json::to_vec(&acdc)?;
        self.storage.put(&Self::acdc_key(&acdc.said), &canonical).await?;
        self.storage
            .put(&Self::said_key(&acdc.said), &canonical)
            .await?;
        Ok(acdc)
    }

    pub async fn get_acdc(&self, said: &str) -> Result<Option<Acdc>, StoreError> {
        match self.storage.get(&Self::acdc_key(said)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kv_store::memory::MemoryBackend;

    fn store() -> EventStore<MemoryBackend> {
        EventStore::new(Arc::new(MemoryBackend::new()))
    }

    #[async_std::test]
    async fn inception_then_rotation_chain() {
        let s = store();
        let icp = KelEvent::inception(vec!["K0".into()], 1, vec![digest_bytes(b"K1")], 1);
        let aid = icp.aid.clone();
        s.put_event(&serde_json::to_vec(&icp).unwrap()).await.unwrap();

        let rot = KelEvent::rotation(
            aid.clone(),
            1,
            icp.said.clone(),
            vec!["K1".into()],
            1,
            vec![digest_bytes(b"K2")],
            1,
        );
        s.put_event(&serde_json::to_vec(&rot).unwrap()).await.unwrap();

        let kel = s.get_kel(&aid).await.unwrap();
        assert_eq!(kel.len(), 2);
        assert_eq!(kel[0].sn, 0);
        assert_eq!(kel[1].sn, 1);
    }

    #[async_std::test]
    async fn rotation_with_wrong_preimage_is_rejected() {
        let s = store();
        let icp = KelEvent::inception(vec!["K0".into()], 1, vec![digest_bytes(b"K1")], 1);
        let aid = icp.aid.clone();
        s.put_event(&serde_json::to_vec(&icp).unwrap()).await.unwrap();

        let bad_rot = KelEvent::rotation(
            aid,
            1,
            icp.said.clone(),
            vec!["WRONG_KEY".into()],
            1,
            vec![digest_bytes(b"K2")],
            1,
        );
        let err = s
            .put_event(&serde_json::to_vec(&bad_rot).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RotationKeyMismatch));
    }

    #[async_std::test]
    async fn out_of_order_sn_is_rejected() {
        let s = store();
        let icp = KelEvent::inception(vec!["K0".into()], 1, vec![digest_bytes(b"K1")], 1);
        let aid = icp.aid.clone();
        s.put_event(&serde_json::to_vec(&icp).unwrap()).await.unwrap();

        let skip = KelEvent::interaction(aid, 2, icp.said.clone());
        let err = s
            .put_event(&serde_json::to_vec(&skip).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::OutOfOrder { expected: 1, got: 2 }));
    }

    #[async_std::test]
    async fn resubmitting_identical_bytes_is_idempotent() {
        let s = store();
        let icp = KelEvent::inception(vec!["K0".into()], 1, vec![digest_bytes(b"K1")], 1);
        let bytes = serde_json::to_vec(&icp).unwrap();
        s.put_event(&bytes).await.unwrap();
        s.put_event(&bytes).await.unwrap();
    }

    #[async_std::test]
    async fn resubmitting_different_bytes_at_same_sn_is_duplicate_error() {
        let s = store();
        let icp = KelEvent::inception(vec!["K0".into()], 1, vec![digest_bytes(b"K1")], 1);
        let aid = icp.aid.clone();
        s.put_event(&serde_json::to_vec(&icp).unwrap()).await.unwrap();

        // A different icp sharing the AID namespace is nonsensical, so
        // forge a conflicting ixn at sn 0 instead, bypassing the
        // constructor's own invariant to exercise the store's check.
        let mut forged = KelEvent::interaction(aid, 0, icp.said.clone());
        forged.prior = None;
        forged.said = crate::said::compute_said(&forged).unwrap();
        let err = s
            .put_event(&serde_json::to_vec(&forged).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEvent));
    }

    #[async_std::test]
    async fn said_mismatch_is_rejected() {
        let s = store();
        let mut icp = KelEvent::inception(vec!["K0".into()], 1, vec![digest_bytes(b"K1")], 1);
        icp.said = "E".to_string() + &"0".repeat(43);
        let err = s
            .put_event(&serde_json::to_vec(&icp).unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SaidMismatch));
    }

    #[async_std::test]
    async fn tel_registry_then_issuance_and_revocation() {
        let s = store();
        let vcp = TelEvent::registry_inception();
        s.put_tel_event(&serde_json::to_vec(&vcp).unwrap())
            .await
            .unwrap();

        let iss = TelEvent::issuance(vcp.registry_id.clone(), "Ecred".into());
        s.put_tel_event(&serde_json::to_vec(&iss).unwrap())
            .await
            .unwrap();

        let rev = TelEvent::revocation(
            vcp.registry_id.clone(),
            "Ecred".into(),
            1,
            iss.said.clone(),
        );
        s.put_tel_event(&serde_json::to_vec(&rev).unwrap())
            .await
            .unwrap();

        let chain = s.get_tel("Ecred").await.unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].kind, TelEventKind::Iss);
        assert_eq!(chain[1].kind, TelEventKind::Rev);
    }

    #[async_std::test]
    async fn acdc_round_trips_by_said() {
        let s = store();
        let acdc = Acdc::new(
            "Eissuer".into(),
            "Eschema".into(),
            serde_json::json!({"name": "Alice"}),
        );
        s.put_acdc(&serde_json::to_vec(&acdc).unwrap()).await.unwrap();
        let got = s.get_acdc(&acdc.said).await.unwrap().unwrap();
        assert_eq!(got, acdc);
    }
}
