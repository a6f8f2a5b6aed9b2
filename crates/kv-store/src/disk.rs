//! On-disk KV backend: a literal filesystem tree. Each key is a `/`-split
//! path; `/` becomes a directory separator and the reserved characters
//! `% \ : * ? " < > |` are percent-escaped within each segment.
//!
//! `batch` is applied sequentially, not atomically: a failure partway
//! through leaves the already-applied prefix committed.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{BatchOp, ListEntry, ListOptions, Storage, StorageError};

const RESERVED: &[char] = &['%', '\\', ':', '*', '?', '"', '<', '>', '|'];

fn escape_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        if RESERVED.contains(&c) {
            out.push('%');
            out.push_str(&format!("{:02X}", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}

fn unescape_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    let mut chars = segment.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '%' {
            let hex: String = chars.by_ref().take(2).collect();
            if let Ok(code) = u32::from_str_radix(&hex, 16) {
                if let Some(ch) = char::from_u32(code) {
                    out.push(ch);
                    continue;
                }
            }
            // malformed escape: keep literally
            out.push('%');
            out.push_str(&hex);
        } else {
            out.push(c);
        }
    }
    out
}

fn key_to_str(key: &[u8]) -> Result<&str, StorageError> {
    std::str::from_utf8(key).map_err(|_| StorageError::InvalidKeyEncoding)
}

pub struct DiskBackend {
    root: PathBuf,
}

impl DiskBackend {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| StorageError::Io(e.to_string()))?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut p = self.root.clone();
        for segment in key.split('/') {
            p.push(escape_segment(segment));
        }
        p
    }

    /// Recursively reconstruct the logical key string for every file under
    /// `root`, paired with its filesystem path.
    fn walk(&self) -> Result<Vec<(String, PathBuf)>, StorageError> {
        fn visit(
            dir: &Path,
            prefix: &[String],
            out: &mut Vec<(String, PathBuf)>,
        ) -> Result<(), StorageError> {
            let entries = match std::fs::read_dir(dir) {
                Ok(e) => e,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
                Err(e) => return Err(StorageError::Io(e.to_string())),
            };
            for entry in entries {
                let entry = entry.map_err(|e| StorageError::Io(e.to_string()))?;
                let file_type = entry.file_type().map_err(|e| StorageError::Io(e.to_string()))?;
                let name = entry.file_name().to_string_lossy().into_owned();
                let decoded = unescape_segment(&name);
                let mut next_prefix = prefix.to_vec();
                next_prefix.push(decoded);
                if file_type.is_dir() {
                    visit(&entry.path(), &next_prefix, out)?;
                } else {
                    out.push((next_prefix.join("/"), entry.path()));
                }
            }
            Ok(())
        }
        let mut out = Vec::new();
        visit(&self.root, &[], &mut out)?;
        Ok(out)
    }
}

#[async_trait]
impl Storage for DiskBackend {
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let key = key_to_str(key)?;
        let path = self.path_for(key);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e.to_string())),
        }
    }

    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        let key = key_to_str(key)?;
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        std::fs::write(&path, value).map_err(|e| StorageError::Io(e.to_string()))
    }

    async fn del(&self, key: &[u8]) -> Result<(), StorageError> {
        let key = key_to_str(key)?;
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e.to_string())),
        }
    }

    async fn list(
        &self,
        prefix: &[u8],
        opts: ListOptions,
    ) -> Result<Vec<ListEntry>, StorageError> {
        let prefix = key_to_str(prefix)?;
        let mut matches: Vec<(String, PathBuf)> = self
            .walk()?
            .into_iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .collect();
        matches.sort_by(|a, b| a.0.cmp(&b.0));
        if let Some(limit) = opts.limit {
            matches.truncate(limit);
        }
        let mut out = Vec::with_capacity(matches.len());
        for (k, path) in matches {
            let value = if opts.keys_only {
                None
            } else {
                Some(std::fs::read(&path).map_err(|e| StorageError::Io(e.to_string()))?)
            };
            out.push(ListEntry {
                key: k.into_bytes(),
                value,
            });
        }
        Ok(out)
    }

    async fn batch(&self, ops: Vec<BatchOp>) -> Result<(), StorageError> {
        let total = ops.len();
        for (applied, op) in ops.into_iter().enumerate() {
            let result = match &op {
                BatchOp::Put { key, value } => self.put(key, value).await,
                BatchOp::Del { key } => self.del(key).await,
            };
            if let Err(e) = result {
                log::warn!(
                    "disk backend batch partially applied: {applied} of {total} ops before error: {e}"
                );
                return Err(StorageError::PartialBatch { applied, total });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_suite::*;

    fn backend() -> DiskBackend {
        let dir = tempfile::Builder::new().prefix("kv-disk-test").tempdir().unwrap();
        // leak the tempdir so it outlives the backend for the duration of the test
        DiskBackend::new(dir.into_path()).unwrap()
    }

    #[async_std::test]
    async fn get_put_del() {
        exercise_get_put_del(&backend()).await;
    }

    #[async_std::test]
    async fn list_ordering() {
        exercise_list_ordering(&backend()).await;
    }

    #[async_std::test]
    async fn list_limit() {
        exercise_list_limit(&backend()).await;
    }

    #[async_std::test]
    async fn reserved_characters_round_trip() {
        let b = backend();
        let key = b"said/E abc%def:ghi.cesr";
        b.put(key, b"payload").await.unwrap();
        assert_eq!(b.get(key).await.unwrap(), Some(b"payload".to_vec()));
        let listed = b.list(b"said/", ListOptions::default()).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key, key.to_vec());
    }

    #[async_std::test]
    async fn directories_mirror_slash_segments() {
        let b = backend();
        b.put(b"aid/EABC/kel/000000.icp.cesr", b"e1").await.unwrap();
        assert!(b.root.join("aid").join("EABC").join("kel").is_dir());
    }
}
