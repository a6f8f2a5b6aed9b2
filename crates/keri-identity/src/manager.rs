//! Account lifecycle: mnemonic-derived keypairs, encrypted persistence,
//! rotation, and the Signer-issuing invariant.
//!
//! Grounded on `keriox_core::signer::{Signer, CryptoBox, KeyManager}`
//! for the "exposes a capability, never the secret" shape and on
//! `components/controller/src/identifier_controller.rs` for the
//! account/rotate lifecycle (construct an `icp`, store it, later
//! construct a `rot` revealing the committed pre-image).

use std::collections::HashMap;
use std::sync::Arc;

use bip39::{Language, Mnemonic};
use ed25519_dalek::{PublicKey, SecretKey};
use kv_store::Storage;
use rand::RngCore;

use keri_store::{digest_bytes, EventStore, KelEvent};
use structured_key::StructuredKey;

use crate::bundle::{self, KeyBundlePlain};
use crate::error::IdentityError;
use crate::signer::Signer;

fn b64(bytes: &[u8]) -> String {
    base64::encode_config(bytes, base64::URL_SAFE_NO_PAD)
}

struct UnlockedRing {
    alias: String,
    current_seed: [u8; 32],
    next_seed: [u8; 32],
}

pub struct KeyManager<S: Storage> {
    storage: Arc<S>,
    store: EventStore<S>,
    ring: HashMap<String, UnlockedRing>,
}

impl<S: Storage> KeyManager<S> {
    pub fn new(storage: Arc<S>) -> Self {
        let store = EventStore::new(storage.clone());
        Self {
            storage,
            store,
            ring: HashMap::new(),
        }
    }

    fn alias_key(alias: &str) -> Vec<u8> {
        StructuredKey::text(["keymanager", "alias", alias]).encode()
    }

    fn bundle_key(aid: &str) -> Vec<u8> {
        StructuredKey::text(["keymanager", aid, "bundle"]).encode()
    }

    fn seed_from_mnemonic(mnemonic: &Mnemonic, label: &str) -> [u8; 32] {
        blake3::derive_key(&format!("keri-identity seed {label} v1"), mnemonic.entropy())
    }

    /// `newAccount(alias, mnemonic)`: derives `current`/`next` seeds from
    /// the mnemonic, stores an `icp` event, and persists the encrypted
    /// bundle under `keymanager/{aid}/bundle`. Returns the new AID.
    pub async fn new_account(
        &mut self,
        alias: &str,
        mnemonic_phrase: &str,
        passphrase: &[u8],
    ) -> Result<String, IdentityError> {
        if self.storage.get(&Self::alias_key(alias)).await?.is_some() {
            return Err(IdentityError::AliasInUse);
        }

        let mnemonic = Mnemonic::from_phrase(mnemonic_phrase, Language::English)
            .map_err(|_| IdentityError::WeakEntropy)?;

        let current_seed = Self::seed_from_mnemonic(&mnemonic, "current");
        let next_seed = Self::seed_from_mnemonic(&mnemonic, "next");

        let current_public =
            PublicKey::from(&SecretKey::from_bytes(&current_seed).expect("32-byte seed"));
        let next_public = PublicKey::from(&SecretKey::from_bytes(&next_seed).expect("32-byte seed"));

        let current_pub_b64 = b64(current_public.as_bytes());
        let next_digest = digest_bytes(b64(next_public.as_bytes()).as_bytes());

        let icp = KelEvent::inception(vec![current_pub_b64], 1, vec![next_digest], 1);
        let aid = icp.aid.clone();
        self.store.put_event(&serde_json::to_vec(&icp)?).await?;

        let plain = KeyBundlePlain {
            alias: alias.to_string(),
            current_seed,
            next_seed,
        };
        let sealed = bundle::seal(passphrase, &plain)?;
        self.storage.put(&Self::bundle_key(&aid), &sealed).await?;
        self.storage.put(&Self::alias_key(alias), aid.as_bytes()).await?;

        log::debug!("new_account: created {aid} under alias {alias}");
        self.ring.insert(
            aid.clone(),
            UnlockedRing {
                alias: alias.to_string(),
                current_seed,
                next_seed,
            },
        );
        Ok(aid)
    }

    /// `unlockFromStore(aid)`: decrypts the stored bundle into the
    /// in-memory ring. Returns `Ok(false)` on a wrong passphrase (a
    /// recoverable, expected outcome) and `Err` when the bundle itself
    /// cannot be found.
    pub async fn unlock_from_store(
        &mut self,
        aid: &str,
        passphrase: &[u8],
    ) -> Result<bool, IdentityError> {
        let sealed = self
            .storage
            .get(&Self::bundle_key(aid))
            .await?
            .ok_or(IdentityError::NotFound)?;
        match bundle::open(passphrase, &sealed) {
            Ok(plain) => {
                self.ring.insert(
                    aid.to_string(),
                    UnlockedRing {
                        alias: plain.alias,
                        current_seed: plain.current_seed,
                        next_seed: plain.next_seed,
                    },
                );
                Ok(true)
            }
            Err(_) => {
                log::warn!("unlock_from_store: decryption failed for {aid}");
                Ok(false)
            }
        }
    }

    /// `getSigner(aid)`: returns a capability bound to the current
    /// signing key, after checking it is still the one the latest KEL
    /// event names.
    pub async fn get_signer(&self, aid: &str) -> Result<Signer, IdentityError> {
        let ring = self.ring.get(aid).ok_or(IdentityError::LockedKey)?;
        let secret = SecretKey::from_bytes(&ring.current_seed).expect("32-byte seed");
        let public = PublicKey::from(&secret);
        let public_b64 = b64(public.as_bytes());

        let kel = self.store.get_kel(aid).await?;
        let head = kel.last().ok_or(IdentityError::NotFound)?;
        if !head.keys.iter().any(|k| k == &public_b64) {
            return Err(IdentityError::SignerKeyMismatch);
        }

        Ok(Signer::new(aid.to_string(), public, ring.current_seed))
    }

    /// `rotate(aid, newMnemonic?)`: reveals the pre-image matching the
    /// prior commitment, commits a fresh next-key digest, stores the
    /// `rot` event, and re-seals the bundle. Returns the new `ksn`.
    pub async fn rotate(
        &mut self,
        aid: &str,
        new_mnemonic: Option<&str>,
        passphrase: &[u8],
    ) -> Result<u64, IdentityError> {
        let (alias, next_seed) = {
            let ring = self.ring.get(aid).ok_or(IdentityError::LockedKey)?;
            (ring.alias.clone(), ring.next_seed)
        };

        let kel = self.store.get_kel(aid).await?;
        let head = kel.last().ok_or(IdentityError::NotFound)?.clone();

        let next_public =
            PublicKey::from(&SecretKey::from_bytes(&next_seed).expect("32-byte seed"));
        let revealed_pub_b64 = b64(next_public.as_bytes());

        let new_next_seed = match new_mnemonic {
            Some(phrase) => {
                let mnemonic = Mnemonic::from_phrase(phrase, Language::English)
                    .map_err(|_| IdentityError::WeakEntropy)?;
                Self::seed_from_mnemonic(&mnemonic, "next")
            }
            None => {
                let mut seed = [0u8; 32];
                rand::rngs::OsRng.fill_bytes(&mut seed);
                seed
            }
        };
        let new_next_public =
            PublicKey::from(&SecretKey::from_bytes(&new_next_seed).expect("32-byte seed"));
        let new_next_digest = digest_bytes(b64(new_next_public.as_bytes()).as_bytes());

        let rot = KelEvent::rotation(
            aid.to_string(),
            head.sn + 1,
            head.said.clone(),
            vec![revealed_pub_b64.clone()],
            1,
            vec![new_next_digest],
            1,
        );
        self.store.put_event(&serde_json::to_vec(&rot)?).await?;

        if !rot.keys.iter().any(|k| k == &revealed_pub_b64) {
            return Err(IdentityError::SignerKeyMismatch);
        }

        let plain = KeyBundlePlain {
            alias: alias.clone(),
            current_seed: next_seed,
            next_seed: new_next_seed,
        };
        let sealed = bundle::seal(passphrase, &plain)?;
        self.storage.put(&Self::bundle_key(aid), &sealed).await?;

        log::debug!("rotate: {aid} advanced to ksn {}", rot.sn);
        self.ring.insert(
            aid.to_string(),
            UnlockedRing {
                alias,
                current_seed: next_seed,
                next_seed: new_next_seed,
            },
        );
        Ok(rot.sn)
    }
}
