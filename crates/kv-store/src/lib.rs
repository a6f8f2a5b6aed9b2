//! Byte-level associative storage.
//!
//! `Storage` is the polymorphic interface every component of the system
//! stores through. It is deliberately small: get/put/del/list/batch over
//! raw bytes. Everything above this layer (structured keys, SAID
//! invariants, group state) is built on top, never around it.

pub mod disk;
pub mod memory;

#[cfg(all(target_arch = "wasm32", feature = "indexeddb"))]
pub mod indexeddb;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("backend is not atomic and the batch partially applied: {applied} of {total} ops")]
    PartialBatch { applied: usize, total: usize },

    #[error("key contains no valid UTF-8 path representation")]
    InvalidKeyEncoding,

    #[error("backend error: {0}")]
    Backend(String),
}

/// One write operation inside a `batch` call.
#[derive(Debug, Clone)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Del { key: Vec<u8> },
}

/// Options controlling a `list` prefix scan.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Return keys only; omit the (possibly large) stored value.
    pub keys_only: bool,
    /// Hard cap on the number of entries returned.
    pub limit: Option<usize>,
}

/// A single entry returned from `list`. `value` is `None` when
/// `ListOptions::keys_only` was set.
#[derive(Debug, Clone)]
pub struct ListEntry {
    pub key: Vec<u8>,
    pub value: Option<Vec<u8>>,
}

/// The storage contract satisfied by the in-memory, on-disk, and
/// indexed-database backends. Not thread-safe beyond what the
/// concrete backend documents; callers serialize access themselves
/// when a backend doesn't guarantee it.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError>;

    /// Idempotent: deleting a missing key is not an error.
    async fn del(&self, key: &[u8]) -> Result<(), StorageError>;

    /// Enumerate all keys whose byte string starts with `prefix`, in
    /// ascending lexicographic order.
    async fn list(
        &self,
        prefix: &[u8],
        opts: ListOptions,
    ) -> Result<Vec<ListEntry>, StorageError>;

    /// Best-effort atomic application of a batch of writes. Backends that
    /// support transactions (memory, indexed-db) apply all-or-nothing;
    /// the disk backend applies sequentially and may leave a partial
    /// prefix committed on failure.
    async fn batch(&self, ops: Vec<BatchOp>) -> Result<(), StorageError>;
}
