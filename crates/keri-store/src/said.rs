//! SAID (Self-Addressing Identifier) computation and verification.
//!
//! A SAID is the digest of the canonical serialisation of the object it
//! appears in, with the SAID field itself replaced by a same-length
//! placeholder before hashing. CESR derivation codes are out
//! of scope; this is a direct blake3 digest, grounded on
//! `keriox_core::sai::digest::blake3_256_digest` and
//! `SelfAddressing::Blake3_256`, its most common variant.

use subtle::ConstantTimeEq;

/// Character used to fill the SAID field before re-hashing.
pub const PLACEHOLDER_CHAR: char = '#';

/// `"E"` + unpadded base64-url of a 32-byte blake3 digest: 1 + 43 = 44
/// characters, matching the length of a real KERI self-addressing
/// prefix even though the derivation code itself is a placeholder
/// stand-in for the full CESR code table.
pub const SAID_LEN: usize = 44;

/// Anything that carries a SAID field named `d` and can be re-serialised
/// with that field blanked out for digesting. Implemented by every
/// stored event type (`KelEvent`, `TelEvent`, `Acdc`).
pub trait SaidField: Clone + serde::Serialize {
    fn said(&self) -> &str;
    fn set_said(&mut self, said: String);
}

fn said_digest(canonical_bytes: &[u8]) -> String {
    let digest = blake3::hash(canonical_bytes);
    let encoded = base64::encode_config(digest.as_bytes(), base64::URL_SAFE_NO_PAD);
    format!("E{encoded}")
}

/// Compute the SAID an object should have, given its current (non-SAID)
/// fields. The caller is responsible for assigning the result into the
/// object's `d` field afterwards.
pub fn compute_said<T: SaidField>(value: &T) -> Result<String, serde_json::Error> {
    let mut placeholdered = value.clone();
    placeholdered.set_said(PLACEHOLDER_CHAR.to_string().repeat(SAID_LEN));
    let bytes = serde_json::to_vec(&placeholdered)?;
    Ok(said_digest(&bytes))
}

/// Verify that `value`'s stored `d` field matches the digest recomputed
/// with its own length used for the placeholder. Comparison is constant-time.
pub fn verify_said<T: SaidField>(value: &T) -> Result<bool, serde_json::Error> {
    let claimed = value.said().to_string();
    let mut placeholdered = value.clone();
    placeholdered.set_said(PLACEHOLDER_CHAR.to_string().repeat(claimed.len()));
    let bytes = serde_json::to_vec(&placeholdered)?;
    let recomputed = said_digest(&bytes);
    Ok(bool::from(claimed.as_bytes().ct_eq(recomputed.as_bytes())))
}

/// Digest arbitrary bytes (used for rotation pre-image checks: hashing a
/// revealed public key and comparing it to a prior commitment).
pub fn digest_bytes(bytes: &[u8]) -> String {
    said_digest(bytes)
}
