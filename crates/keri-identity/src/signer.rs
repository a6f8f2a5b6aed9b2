//! The Signer capability: holds exactly enough key material
//! to produce signatures and never exposes it.
//!
//! Grounded on `keriox_core::signer::{Signer, CryptoBox}`: a struct that
//! carries a keypair internally but whose public API is `public_key`/
//! `sign` only. Secret bytes are kept behind `zeroize::Zeroizing` so a
//! `Signer` going out of scope wipes them.

use ed25519_dalek::{Keypair, PublicKey, SecretKey, Signer as DalekSigner};
use zeroize::Zeroizing;

use crate::error::IdentityError;

pub struct Signer {
    aid: String,
    public_key: PublicKey,
    secret_seed: Zeroizing<[u8; 32]>,
}

impl Signer {
    pub(crate) fn new(aid: String, public_key: PublicKey, secret_seed: [u8; 32]) -> Self {
        Self {
            aid,
            public_key,
            secret_seed: Zeroizing::new(secret_seed),
        }
    }

    pub fn aid(&self) -> &str {
        &self.aid
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    pub fn public_key_b64(&self) -> String {
        base64::encode_config(self.public_key.as_bytes(), base64::URL_SAFE_NO_PAD)
    }

    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, IdentityError> {
        let secret = SecretKey::from_bytes(&*self.secret_seed)
            .map_err(|_| IdentityError::Decryption)?;
        let keypair = Keypair {
            secret,
            public: self.public_key,
        };
        Ok(keypair.sign(message).to_bytes().to_vec())
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("aid", &self.aid)
            .field("public_key", &self.public_key_b64())
            .field("secret_seed", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::Verifier;

    #[test]
    fn sign_produces_verifiable_signature() {
        let seed = [7u8; 32];
        let secret = SecretKey::from_bytes(&seed).unwrap();
        let public = PublicKey::from(&secret);
        let signer = Signer::new("Etest".into(), public, seed);

        let sig_bytes = signer.sign(b"hello").unwrap();
        let sig = ed25519_dalek::Signature::from_bytes(&sig_bytes).unwrap();
        assert!(public.verify(b"hello", &sig).is_ok());
    }

    #[test]
    fn debug_output_never_contains_secret_bytes() {
        let seed = [9u8; 32];
        let secret = SecretKey::from_bytes(&seed).unwrap();
        let public = PublicKey::from(&secret);
        let signer = Signer::new("Etest".into(), public, seed);
        let rendered = format!("{signer:?}");
        assert!(rendered.contains("redacted"));
        assert!(!rendered.contains(&hex::encode(seed)));
    }
}
