//! Encrypted key-bundle persistence (`keymanager/{AID}/bundle`). The
//! bundle holds the two raw ed25519 seeds (`current`, `next`) plus the
//! account alias, sealed with ChaCha20-Poly1305 under a key derived
//! from the caller-supplied passphrase.
//!
//! `keriox`'s own `wallet` feature delegates key-at-rest encryption to
//! an opaque external crate rather than implementing it directly; this
//! uses `chacha20poly1305` + `zeroize`, already in the workspace stack,
//! per `DESIGN.md`.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::IdentityError;

const NONCE_LEN: usize = 12;
const DERIVE_CONTEXT: &str = "keri-identity key bundle v1";

#[derive(Serialize, Deserialize)]
pub(crate) struct KeyBundlePlain {
    pub alias: String,
    pub current_seed: [u8; 32],
    pub next_seed: [u8; 32],
}

fn derive_key(passphrase: &[u8]) -> Zeroizing<[u8; 32]> {
    Zeroizing::new(blake3::derive_key(DERIVE_CONTEXT, passphrase))
}

pub(crate) fn seal(passphrase: &[u8], plain: &KeyBundlePlain) -> Result<Vec<u8>, IdentityError> {
    let key_bytes = derive_key(passphrase);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&*key_bytes));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let plaintext = serde_json::to_vec(plain)?;
    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_ref())
        .map_err(|_| IdentityError::Decryption)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

pub(crate) fn open(passphrase: &[u8], sealed: &[u8]) -> Result<KeyBundlePlain, IdentityError> {
    if sealed.len() < NONCE_LEN {
        return Err(IdentityError::Decryption);
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let key_bytes = derive_key(passphrase);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&*key_bytes));
    let nonce = Nonce::from_slice(nonce_bytes);

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| IdentityError::Decryption)?;
    Ok(serde_json::from_slice(&plaintext)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_open_round_trips() {
        let plain = KeyBundlePlain {
            alias: "alice".into(),
            current_seed: [1u8; 32],
            next_seed: [2u8; 32],
        };
        let sealed = seal(b"correct horse", &plain).unwrap();
        let opened = open(b"correct horse", &sealed).unwrap();
        assert_eq!(opened.alias, plain.alias);
        assert_eq!(opened.current_seed, plain.current_seed);
        assert_eq!(opened.next_seed, plain.next_seed);
    }

    #[test]
    fn wrong_passphrase_fails_to_open() {
        let plain = KeyBundlePlain {
            alias: "alice".into(),
            current_seed: [1u8; 32],
            next_seed: [2u8; 32],
        };
        let sealed = seal(b"correct horse", &plain).unwrap();
        assert!(open(b"wrong passphrase", &sealed).is_err());
    }
}
