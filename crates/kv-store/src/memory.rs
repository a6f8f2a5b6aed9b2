//! In-memory KV backend. Fully atomic batches; ordered enumeration.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::{BatchOp, ListEntry, ListOptions, Storage, StorageError};

/// Ordered map behind an `RwLock`. Reads take a shared lock; writes and
/// batches take an exclusive lock for the duration of the call, which is
/// what makes `batch` here fully atomic.
#[derive(Default)]
pub struct MemoryBackend {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryBackend {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let guard = self
            .data
            .read()
            .map_err(|_| StorageError::Backend("lock poisoned".into()))?;
        Ok(guard.get(key).cloned())
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StorageError::Backend("lock poisoned".into()))?;
        guard.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    async fn del(&self, key: &[u8]) -> Result<(), StorageError> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StorageError::Backend("lock poisoned".into()))?;
        guard.remove(key);
        Ok(())
    }

    async fn list(
        &self,
        prefix: &[u8],
        opts: ListOptions,
    ) -> Result<Vec<ListEntry>, StorageError> {
        let guard = self
            .data
            .read()
            .map_err(|_| StorageError::Backend("lock poisoned".into()))?;
        let mut out = Vec::new();
        for (k, v) in guard.range(prefix.to_vec()..) {
            if !k.starts_with(prefix) {
                break;
            }
            out.push(ListEntry {
                key: k.clone(),
                value: if opts.keys_only { None } else { Some(v.clone()) },
            });
            if let Some(limit) = opts.limit {
                if out.len() >= limit {
                    break;
                }
            }
        }
        Ok(out)
    }

    async fn batch(&self, ops: Vec<BatchOp>) -> Result<(), StorageError> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StorageError::Backend("lock poisoned".into()))?;
        for op in ops {
            match op {
                BatchOp::Put { key, value } => {
                    guard.insert(key, value);
                }
                BatchOp::Del { key } => {
                    guard.remove(&key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_suite::*;

    #[async_std::test]
    async fn get_put_del() {
        exercise_get_put_del(&MemoryBackend::new()).await;
    }

    #[async_std::test]
    async fn list_ordering() {
        exercise_list_ordering(&MemoryBackend::new()).await;
    }

    #[async_std::test]
    async fn list_limit() {
        exercise_list_limit(&MemoryBackend::new()).await;
    }

    #[async_std::test]
    async fn batch_is_atomic() {
        exercise_batch_atomicity_when_supported(&MemoryBackend::new()).await;
    }

    #[async_std::test]
    async fn batch_failure_leaves_no_partial_state() {
        // Memory backend takes the write lock for the whole batch, so
        // there is no way to observe a partially-applied batch.
        let s = MemoryBackend::new();
        s.batch(vec![
            BatchOp::Put { key: b"k1".to_vec(), value: b"v1".to_vec() },
            BatchOp::Put { key: b"k2".to_vec(), value: b"v2".to_vec() },
        ])
        .await
        .unwrap();
        assert_eq!(s.get(b"k1").await.unwrap(), Some(b"v1".to_vec()));
        assert_eq!(s.get(b"k2").await.unwrap(), Some(b"v2".to_vec()));
    }
}
