//! Browser IndexedDB backend. A single object store, key-range scans.
//! Only compiled for `wasm32` targets with the `indexeddb` feature.

use async_trait::async_trait;
use indexed_db_futures::database::Database;
use indexed_db_futures::prelude::*;
use indexed_db_futures::transaction::TransactionMode;

use crate::{BatchOp, ListEntry, ListOptions, Storage, StorageError};

const STORE: &str = "kv";

pub struct IndexedDbBackend {
    db_name: String,
}

impl IndexedDbBackend {
    pub async fn open(db_name: &str) -> Result<Self, StorageError> {
        // Creating the database here ensures the object store exists
        // before any get/put/del call opens its own short-lived
        // connection; each call below reopens rather than holding a
        // connection across an `await` boundary, matching how the
        // browser's IndexedDB transactions are scoped to a single tick.
        Database::open(db_name)
            .with_version(1u32)
            .with_on_upgrade_needed(|_event, db| {
                if !db.object_store_names().any(|n| n == STORE) {
                    db.create_object_store(STORE).build()?;
                }
                Ok(())
            })
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(Self {
            db_name: db_name.to_string(),
        })
    }

    async fn connect(&self) -> Result<Database, StorageError> {
        Database::open(&self.db_name)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))
    }
}

#[async_trait(?Send)]
impl Storage for IndexedDbBackend {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let db = self.connect().await?;
        let tx = db
            .transaction(STORE)
            .with_mode(TransactionMode::Readonly)
            .build()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let store = tx
            .object_store(STORE)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let value: Option<Vec<u8>> = store
            .get(key)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(value)
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let db = self.connect().await?;
        let tx = db
            .transaction(STORE)
            .with_mode(TransactionMode::Readwrite)
            .build()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let store = tx
            .object_store(STORE)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        store
            .put(value)
            .with_key(key)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        tx.commit()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    async fn del(&self, key: &[u8]) -> Result<(), StorageError> {
        let db = self.connect().await?;
        let tx = db
            .transaction(STORE)
            .with_mode(TransactionMode::Readwrite)
            .build()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let store = tx
            .object_store(STORE)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        store
            .delete(key)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        tx.commit()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    async fn list(
        &self,
        prefix: &[u8],
        opts: ListOptions,
    ) -> Result<Vec<ListEntry>, StorageError> {
        let db = self.connect().await?;
        let tx = db
            .transaction(STORE)
            .with_mode(TransactionMode::Readonly)
            .build()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let store = tx
            .object_store(STORE)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        // IndexedDB key ranges don't express "starts with" directly for
        // arbitrary byte keys, so scan the whole store and filter client
        // side; object stores here are expected to stay small enough
        // (per-group / per-AID) for this to be acceptable.
        let mut out = Vec::new();
        let mut cursor = store
            .open_cursor()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        while let Some(entry) = cursor
            .next()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?
        {
            let key: Vec<u8> = entry.key();
            if !key.starts_with(prefix) {
                continue;
            }
            let value = if opts.keys_only {
                None
            } else {
                Some(entry.value::<Vec<u8>>())
            };
            out.push(ListEntry { key, value });
            if let Some(limit) = opts.limit {
                if out.len() >= limit {
                    break;
                }
            }
        }
        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(out)
    }

    async fn batch(&self, ops: Vec<BatchOp>) -> Result<(), StorageError> {
        let db = self.connect().await?;
        let tx = db
            .transaction(STORE)
            .with_mode(TransactionMode::Readwrite)
            .build()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let store = tx
            .object_store(STORE)
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        // A single IndexedDB transaction is atomic: either every request
        // in it commits or the whole transaction aborts.
        for op in ops {
            match op {
                BatchOp::Put { key, value } => {
                    store
                        .put(value)
                        .with_key(key)
                        .await
                        .map_err(|e| StorageError::Backend(e.to_string()))?;
                }
                BatchOp::Del { key } => {
                    store
                        .delete(key)
                        .await
                        .map_err(|e| StorageError::Backend(e.to_string()))?;
                }
            }
        }
        tx.commit()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))
    }
}
