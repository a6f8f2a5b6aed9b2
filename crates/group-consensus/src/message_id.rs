//! Deterministic message id: a tagged, truncated cryptographic
//! digest of `(prevId, from, content, timestamp)`. Any two replicas
//! computing this over the same fields land on the same id without
//! coordination.

use chrono::{DateTime, Utc};
use serde::Serialize;

const TAG: char = 'M';
const DIGEST_LEN: usize = 16;

#[derive(Serialize)]
struct Canonical<'a> {
    prev_id: Option<&'a str>,
    from: &'a str,
    content: &'a str,
    timestamp: String,
}

pub fn compute_message_id(
    prev_id: Option<&str>,
    from: &str,
    content: &str,
    timestamp: DateTime<Utc>,
) -> String {
    let canonical = Canonical {
        prev_id,
        from,
        content,
        timestamp: timestamp.to_rfc3339(),
    };
    let bytes = serde_json::to_vec(&canonical).expect("Canonical always serializes");
    let digest = blake3::hash(&bytes);
    let truncated = &digest.as_bytes()[..DIGEST_LEN];
    format!("{TAG}{}", base64::encode_config(truncated, base64::URL_SAFE_NO_PAD))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_yields_same_id() {
        let ts = Utc::now();
        let a = compute_message_id(None, "alice", "hi", ts);
        let b = compute_message_id(None, "alice", "hi", ts);
        assert_eq!(a, b);
    }

    #[test]
    fn different_content_yields_different_id() {
        let ts = Utc::now();
        let a = compute_message_id(None, "alice", "hi", ts);
        let b = compute_message_id(None, "alice", "bye", ts);
        assert_ne!(a, b);
    }

    #[test]
    fn id_is_tagged() {
        let id = compute_message_id(None, "alice", "hi", Utc::now());
        assert!(id.starts_with(TAG));
    }
}
