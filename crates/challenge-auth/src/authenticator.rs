//! Gates a privileged operation on proof that the caller controls the
//! signing key registered for an AID: issue a single-use nonce-bearing
//! challenge, have the caller sign it, then verify a threshold of
//! signatures against the AID's latest key-state snapshot.
//!
//! Grounded on `hxrts-aura/crates/aura-authentication`'s `session.rs`
//! (nonce/expiry/scope ticket shape) and `threshold.rs` (M-of-N
//! signature counting), reimplemented against `keri-store`'s
//! `KeyStateRecord` instead of `aura`'s own device/session types.

use std::sync::Arc;

use chrono::{Duration, Utc};
use ed25519_dalek::{PublicKey, Signature, Verifier};
use kv_store::Storage;
use keri_store::KeyStateRecord;
use rand::RngCore;
use structured_key::StructuredKey;
use uuid::Uuid;

use crate::canonical::canonicalize;
use crate::error::ChallengeError;
use crate::model::{ChallengePayload, ChallengeRecord, IndexedSignature};

const DEFAULT_TTL_SECONDS: i64 = 5 * 60;

pub struct ChallengeAuthenticator<S: Storage> {
    storage: Arc<S>,
}

impl<S: Storage> ChallengeAuthenticator<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    fn challenge_key(challenge_id: &str) -> Vec<u8> {
        StructuredKey::text(["challenges", challenge_id]).encode()
    }

    fn key_state_key(aid: &str) -> Vec<u8> {
        StructuredKey::text(["keystate", aid]).encode()
    }

    pub async fn register_key_state(&self, record: KeyStateRecord) -> Result<(), ChallengeError> {
        if let Some(existing) = self.load_key_state(&record.aid).await? {
            if record.ksn < existing.ksn {
                return Err(ChallengeError::StaleKeyState {
                    stored: existing.ksn,
                    got: record.ksn,
                });
            }
        }
        let bytes = serde_json::to_vec(&record)?;
        self.storage
            .put(&Self::key_state_key(&record.aid), &bytes)
            .await?;
        Ok(())
    }

    async fn load_key_state(&self, aid: &str) -> Result<Option<KeyStateRecord>, ChallengeError> {
        match self.storage.get(&Self::key_state_key(aid)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn issue_challenge(
        &self,
        aid: &str,
        purpose: &str,
        args_hash: &str,
    ) -> Result<(String, ChallengePayload), ChallengeError> {
        let mut nonce_bytes = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = base64::encode_config(nonce_bytes, base64::URL_SAFE_NO_PAD);

        let iat = Utc::now();
        let exp = iat + Duration::seconds(DEFAULT_TTL_SECONDS);
        let payload = ChallengePayload {
            nonce,
            aid: aid.to_string(),
            purpose: purpose.to_string(),
            args_hash: args_hash.to_string(),
            iat,
            exp,
        };

        let challenge_id = Uuid::new_v4().to_string();
        let record = ChallengeRecord {
            challenge_id: challenge_id.clone(),
            payload: payload.clone(),
            consumed: false,
        };
        let bytes = serde_json::to_vec(&record)?;
        self.storage
            .put(&Self::challenge_key(&challenge_id), &bytes)
            .await?;

        Ok((challenge_id, payload))
    }

    async fn load_challenge(
        &self,
        challenge_id: &str,
    ) -> Result<ChallengeRecord, ChallengeError> {
        let bytes = self
            .storage
            .get(&Self::challenge_key(challenge_id))
            .await?
            .ok_or(ChallengeError::UnknownChallenge)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn verify(
        &self,
        challenge_id: &str,
        sigs: &[IndexedSignature],
        ksn: u64,
        purpose: &str,
        args_hash: &str,
    ) -> Result<(), ChallengeError> {
        let mut record = self.load_challenge(challenge_id).await?;

        if record.consumed {
            return Err(ChallengeError::AlreadyConsumed);
        }
        if Utc::now() > record.payload.exp {
            return Err(ChallengeError::Expired);
        }
        if record.payload.purpose != purpose {
            return Err(ChallengeError::PurposeMismatch);
        }
        if record.payload.args_hash != args_hash {
            return Err(ChallengeError::ArgsMismatch);
        }

        let key_state = self
            .load_key_state(&record.payload.aid)
            .await?
            .filter(|ks| ks.ksn == ksn)
            .ok_or(ChallengeError::UnknownKeyState)?;

        let canonical = canonicalize(&record.payload)?;

        let mut valid = 0usize;
        for sig in sigs {
            let key_str = key_state
                .current_keys
                .get(sig.key_index)
                .ok_or(ChallengeError::InvalidSignature)?;
            let key_bytes = base64::decode_config(key_str, base64::URL_SAFE_NO_PAD)
                .map_err(|_| ChallengeError::InvalidSignature)?;
            let public_key =
                PublicKey::from_bytes(&key_bytes).map_err(|_| ChallengeError::InvalidSignature)?;
            let sig_bytes = base64::decode_config(&sig.signature, base64::URL_SAFE_NO_PAD)
                .map_err(|_| ChallengeError::InvalidSignature)?;
            let signature = Signature::from_bytes(&sig_bytes)
                .map_err(|_| ChallengeError::InvalidSignature)?;
            if public_key.verify(&canonical, &signature).is_ok() {
                valid += 1;
            }
        }

        if valid < key_state.threshold as usize {
            return Err(ChallengeError::InsufficientSignatures);
        }

        record.consumed = true;
        let bytes = serde_json::to_vec(&record)?;
        self.storage
            .put(&Self::challenge_key(challenge_id), &bytes)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Keypair, Signer as DalekSigner};
    use kv_store::memory::MemoryBackend;
    use rand::rngs::OsRng;

    fn keypair() -> Keypair {
        Keypair::generate(&mut OsRng)
    }

    fn key_state(aid: &str, ksn: u64, keys: &[&Keypair], threshold: u32) -> KeyStateRecord {
        KeyStateRecord {
            aid: aid.to_string(),
            ksn,
            current_keys: keys
                .iter()
                .map(|k| base64::encode_config(k.public.as_bytes(), base64::URL_SAFE_NO_PAD))
                .collect(),
            threshold,
            last_evt_said: "Eabc".to_string(),
            updated_at: Utc::now(),
        }
    }

    fn sign_payload(kp: &Keypair, payload: &ChallengePayload, key_index: usize) -> IndexedSignature {
        let canonical = canonicalize(payload).unwrap();
        let sig = kp.sign(&canonical);
        IndexedSignature {
            key_index,
            signature: base64::encode_config(sig.to_bytes(), base64::URL_SAFE_NO_PAD),
        }
    }

    #[async_std::test]
    async fn issue_then_verify_succeeds_once_and_replay_is_rejected() {
        let auth = ChallengeAuthenticator::new(Arc::new(MemoryBackend::new()));
        let kp = keypair();
        auth.register_key_state(key_state("aidA", 0, &[&kp], 1))
            .await
            .unwrap();

        let (challenge_id, payload) = auth
            .issue_challenge("aidA", "send", "argsHash1")
            .await
            .unwrap();
        let sigs = vec![sign_payload(&kp, &payload, 0)];

        auth.verify(&challenge_id, &sigs, 0, "send", "argsHash1")
            .await
            .unwrap();

        let err = auth
            .verify(&challenge_id, &sigs, 0, "send", "argsHash1")
            .await
            .unwrap_err();
        assert!(matches!(err, ChallengeError::AlreadyConsumed));
    }

    #[async_std::test]
    async fn purpose_mismatch_is_rejected() {
        let auth = ChallengeAuthenticator::new(Arc::new(MemoryBackend::new()));
        let kp = keypair();
        auth.register_key_state(key_state("aidA", 0, &[&kp], 1))
            .await
            .unwrap();
        let (challenge_id, payload) = auth
            .issue_challenge("aidA", "send", "argsHash1")
            .await
            .unwrap();
        let sigs = vec![sign_payload(&kp, &payload, 0)];

        let err = auth
            .verify(&challenge_id, &sigs, 0, "receive", "argsHash1")
            .await
            .unwrap_err();
        assert!(matches!(err, ChallengeError::PurposeMismatch));
    }

    #[async_std::test]
    async fn insufficient_signatures_below_threshold_is_rejected() {
        let auth = ChallengeAuthenticator::new(Arc::new(MemoryBackend::new()));
        let kp1 = keypair();
        let kp2 = keypair();
        auth.register_key_state(key_state("aidA", 0, &[&kp1, &kp2], 2))
            .await
            .unwrap();
        let (challenge_id, payload) = auth
            .issue_challenge("aidA", "send", "argsHash1")
            .await
            .unwrap();
        let sigs = vec![sign_payload(&kp1, &payload, 0)];

        let err = auth
            .verify(&challenge_id, &sigs, 0, "send", "argsHash1")
            .await
            .unwrap_err();
        assert!(matches!(err, ChallengeError::InsufficientSignatures));
    }

    #[async_std::test]
    async fn threshold_met_across_two_of_two_signers_succeeds() {
        let auth = ChallengeAuthenticator::new(Arc::new(MemoryBackend::new()));
        let kp1 = keypair();
        let kp2 = keypair();
        auth.register_key_state(key_state("aidA", 0, &[&kp1, &kp2], 2))
            .await
            .unwrap();
        let (challenge_id, payload) = auth
            .issue_challenge("aidA", "send", "argsHash1")
            .await
            .unwrap();
        let sigs = vec![
            sign_payload(&kp1, &payload, 0),
            sign_payload(&kp2, &payload, 1),
        ];

        auth.verify(&challenge_id, &sigs, 0, "send", "argsHash1")
            .await
            .unwrap();
    }

    #[async_std::test]
    async fn stale_ksn_registration_is_rejected() {
        let auth = ChallengeAuthenticator::new(Arc::new(MemoryBackend::new()));
        let kp = keypair();
        auth.register_key_state(key_state("aidA", 2, &[&kp], 1))
            .await
            .unwrap();

        let err = auth
            .register_key_state(key_state("aidA", 1, &[&kp], 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ChallengeError::StaleKeyState { stored: 2, got: 1 }));
    }

    #[async_std::test]
    async fn forged_signature_does_not_count_towards_threshold() {
        let auth = ChallengeAuthenticator::new(Arc::new(MemoryBackend::new()));
        let kp = keypair();
        let impostor = keypair();
        auth.register_key_state(key_state("aidA", 0, &[&kp], 1))
            .await
            .unwrap();
        let (challenge_id, payload) = auth
            .issue_challenge("aidA", "send", "argsHash1")
            .await
            .unwrap();
        let sigs = vec![sign_payload(&impostor, &payload, 0)];

        let err = auth
            .verify(&challenge_id, &sigs, 0, "send", "argsHash1")
            .await
            .unwrap_err();
        assert!(matches!(err, ChallengeError::InsufficientSignatures));
    }

    #[async_std::test]
    async fn unknown_challenge_is_rejected() {
        let auth = ChallengeAuthenticator::new(Arc::new(MemoryBackend::new()));
        let err = auth
            .verify("nonexistent", &[], 0, "send", "argsHash1")
            .await
            .unwrap_err();
        assert!(matches!(err, ChallengeError::UnknownChallenge));
    }
}
