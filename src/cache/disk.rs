//! Disk Store Module
//!
//! Persistent cache storage: one directory per generation, one JSON file per
//! bucket of query variants. Files are written to a temporary path and
//! renamed into place, so a reader sees either the old or the new bucket.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::cache::{
    key, CacheEntry, CacheStorage, CachedResponse, GenerationInfo, MatchOptions,
};
use crate::error::{AgentError, Result};

const INDEX_FILE: &str = "generations.json";

// == On-Disk Records ==
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexRecord {
    name: String,
    complete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DiskEntry {
    request_id: String,
    status: u16,
    headers: Vec<(String, String)>,
    body_base64: String,
    stored_at: DateTime<Utc>,
}

impl From<&CacheEntry> for DiskEntry {
    fn from(entry: &CacheEntry) -> Self {
        Self {
            request_id: entry.request_id.clone(),
            status: entry.response.status,
            headers: entry.response.headers.clone(),
            body_base64: BASE64.encode(&entry.response.body),
            stored_at: entry.stored_at,
        }
    }
}

impl DiskEntry {
    fn to_response(&self) -> Result<CachedResponse> {
        let body = BASE64
            .decode(&self.body_base64)
            .map_err(|e| AgentError::Storage(format!("corrupt body for {}: {}", self.request_id, e)))?;
        Ok(CachedResponse {
            status: self.status,
            headers: self.headers.clone(),
            body: Bytes::from(body),
        })
    }
}

/// File name of the bucket holding every query variant of `request_id`.
fn bucket_file_name(request_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key::strip_query(request_id).as_bytes());
    format!("{}.json", hex::encode(hasher.finalize()))
}

/// Directory name of a generation. Names are arbitrary strings, so they are hex-encoded.
fn generation_dir_name(name: &str) -> String {
    hex::encode(name.as_bytes())
}

// == Disk Cache Store ==
/// Cache storage persisted under a root directory.
#[derive(Debug)]
pub struct DiskCacheStore {
    root: PathBuf,
    /// Generation index in creation order; the write lock also serializes bucket writes
    index: RwLock<Vec<IndexRecord>>,
    tmp_counter: AtomicU64,
}

impl DiskCacheStore {
    // == Constructor ==
    /// Opens (or initializes) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;

        let index = match fs::read(root.join(INDEX_FILE)).await {
            Ok(raw) => serde_json::from_slice(&raw)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        debug!("Opened disk cache store at {}", root.display());
        Ok(Self {
            root,
            index: RwLock::new(index),
            tmp_counter: AtomicU64::new(0),
        })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn generation_dir(&self, name: &str) -> PathBuf {
        self.root.join(generation_dir_name(name))
    }

    async fn write_atomic(&self, path: &Path, contents: Vec<u8>) -> Result<()> {
        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("tmp{}-{}", std::process::id(), n));
        fs::write(&tmp, contents).await?;
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn persist_index(&self, index: &[IndexRecord]) -> Result<()> {
        let raw = serde_json::to_vec_pretty(index)?;
        self.write_atomic(&self.root.join(INDEX_FILE), raw).await
    }

    fn bucket_path(&self, generation: &str, request_id: &str) -> PathBuf {
        self.generation_dir(generation)
            .join(bucket_file_name(request_id))
    }

    /// Reads a bucket. An undecodable bucket reads as empty, so the next put
    /// replaces it.
    async fn read_bucket(&self, generation: &str, request_id: &str) -> Result<Vec<DiskEntry>> {
        let path = self.bucket_path(generation, request_id);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&raw) {
            Ok(bucket) => Ok(bucket),
            Err(e) => {
                warn!("Ignoring corrupt cache bucket {}: {}", path.display(), e);
                Ok(Vec::new())
            }
        }
    }

    async fn count_entries(&self, generation: &str) -> Result<usize> {
        let mut dir = match fs::read_dir(self.generation_dir(generation)).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut count = 0;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = fs::read(&path).await?;
            if let Ok(bucket) = serde_json::from_slice::<Vec<DiskEntry>>(&raw) {
                count += bucket.len();
            }
        }
        Ok(count)
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStore {
    async fn create_generation(&self, name: &str) -> Result<bool> {
        let mut index = self.index.write().await;
        if index.iter().any(|r| r.name == name) {
            return Ok(false);
        }

        // A directory left behind by a failed delete must not leak old entries.
        let dir = self.generation_dir(name);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => debug!("Cleared leftover files of generation '{}'", name),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(&dir).await?;
        index.push(IndexRecord {
            name: name.to_string(),
            complete: false,
        });
        if let Err(e) = self.persist_index(&index).await {
            index.pop();
            return Err(e);
        }
        Ok(true)
    }

    async fn put(
        &self,
        generation: &str,
        request_id: &str,
        response: CachedResponse,
    ) -> Result<()> {
        let index = self.index.write().await;
        if !index.iter().any(|r| r.name == generation) {
            return Err(AgentError::NotFound(format!("generation '{}'", generation)));
        }

        let mut bucket = self.read_bucket(generation, request_id).await?;
        let record = DiskEntry::from(&CacheEntry::new(request_id, response));
        match bucket.iter_mut().find(|e| e.request_id == request_id) {
            Some(existing) => *existing = record,
            None => bucket.push(record),
        }

        let path = self.bucket_path(generation, request_id);
        self.write_atomic(&path, serde_json::to_vec(&bucket)?).await
    }

    async fn match_any(
        &self,
        request_id: &str,
        options: &MatchOptions,
    ) -> Result<Option<CachedResponse>> {
        let index = self.index.read().await;
        let names = index
            .iter()
            .map(|r| r.name.as_str())
            .filter(|n| options.generation.as_deref().map_or(true, |g| g == *n));

        for name in names {
            let bucket = self.read_bucket(name, request_id).await?;
            if let Some(found) = bucket
                .iter()
                .find(|e| options.matches(&e.request_id, request_id))
            {
                match found.to_response() {
                    Ok(response) => return Ok(Some(response)),
                    Err(e) => warn!("Skipping unreadable entry in '{}': {}", name, e),
                }
            }
        }
        Ok(None)
    }

    async fn list_generations(&self) -> Result<Vec<String>> {
        let index = self.index.read().await;
        Ok(index.iter().map(|r| r.name.clone()).collect())
    }

    async fn delete_generation(&self, name: &str) -> Result<bool> {
        let mut index = self.index.write().await;
        let Some(position) = index.iter().position(|r| r.name == name) else {
            return Ok(false);
        };

        let removed = index.remove(position);
        if let Err(e) = self.persist_index(&index).await {
            index.insert(position, removed);
            return Err(e);
        }

        match fs::remove_dir_all(self.generation_dir(name)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            // Already unlisted; the orphaned directory is unreachable.
            Err(e) => warn!("Generation '{}' unlisted but its files remain: {}", name, e),
        }
        Ok(true)
    }

    async fn mark_complete(&self, name: &str) -> Result<()> {
        let mut index = self.index.write().await;
        let record = index
            .iter_mut()
            .find(|r| r.name == name)
            .ok_or_else(|| AgentError::NotFound(format!("generation '{}'", name)))?;
        if record.complete {
            return Ok(());
        }
        record.complete = true;

        if let Err(e) = self.persist_index(&index).await {
            if let Some(record) = index.iter_mut().find(|r| r.name == name) {
                record.complete = false;
            }
            return Err(e);
        }
        Ok(())
    }

    async fn generation_info(&self, name: &str) -> Result<Option<GenerationInfo>> {
        let index = self.index.read().await;
        let Some(record) = index.iter().find(|r| r.name == name) else {
            return Ok(None);
        };
        Ok(Some(GenerationInfo {
            name: record.name.clone(),
            entries: self.count_entries(name).await?,
            complete: record.complete,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_bucket_file_name_ignores_query() {
        assert_eq!(bucket_file_name("/data?x=1"), bucket_file_name("/data"));
        assert_ne!(bucket_file_name("/data"), bucket_file_name("/data2"));
        assert_eq!(bucket_file_name("/").len(), 64 + ".json".len());
    }

    #[test]
    fn test_generation_dir_name_is_path_safe() {
        let dir = generation_dir_name("../v1");
        assert!(dir.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_disk_store_put_and_match() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskCacheStore::open(dir.path()).await.unwrap();

        store.create_generation("v1").await.unwrap();
        let response = CachedResponse::new(200, vec![0u8, 159, 255])
            .with_header("Content-Type", "image/jpeg");
        store.put("v1", "/img/1.jpg", response.clone()).await.unwrap();

        let found = store
            .match_any("/img/1.jpg?size=large", &MatchOptions::ignore_query())
            .await
            .unwrap();
        assert_eq!(found, Some(response));
    }

    #[tokio::test]
    async fn test_disk_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = DiskCacheStore::open(dir.path()).await.unwrap();
            store.create_generation("v1").await.unwrap();
            store.create_generation("v2").await.unwrap();
            store.put("v2", "/", CachedResponse::new(200, "home")).await.unwrap();
            store.mark_complete("v2").await.unwrap();
        }

        let store = DiskCacheStore::open(dir.path()).await.unwrap();
        assert_eq!(store.list_generations().await.unwrap(), vec!["v1", "v2"]);

        let info = store.generation_info("v2").await.unwrap().unwrap();
        assert!(info.complete);
        assert_eq!(info.entries, 1);
    }

    #[tokio::test]
    async fn test_disk_store_delete_generation() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskCacheStore::open(dir.path()).await.unwrap();
        store.create_generation("v1").await.unwrap();
        store.put("v1", "/a", CachedResponse::new(200, "a")).await.unwrap();

        assert!(store.delete_generation("v1").await.unwrap());
        assert!(!store.delete_generation("v1").await.unwrap());
        assert!(!store.generation_dir("v1").exists());
        assert!(store
            .match_any("/a", &MatchOptions::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_disk_store_query_variants_share_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskCacheStore::open(dir.path()).await.unwrap();
        store.create_generation("v1").await.unwrap();
        store.put("v1", "/q?a=1", CachedResponse::new(200, "a")).await.unwrap();
        store.put("v1", "/q?b=2", CachedResponse::new(200, "b")).await.unwrap();
        store.put("v1", "/q?a=1", CachedResponse::new(200, "a2")).await.unwrap();

        assert_eq!(store.count_entries("v1").await.unwrap(), 2);
        let first = store
            .match_any("/q", &MatchOptions::ignore_query())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.body, "a2");
    }

    #[tokio::test]
    async fn test_disk_store_body_is_base64() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskCacheStore::open(dir.path()).await.unwrap();
        store.create_generation("v1").await.unwrap();
        store
            .put("v1", "/blob", CachedResponse::new(200, vec![7u8; 300]))
            .await
            .unwrap();

        let raw = fs::read(store.bucket_path("v1", "/blob")).await.unwrap();
        let bucket: Vec<DiskEntry> = serde_json::from_slice(&raw).unwrap();
        assert_eq!(bucket[0].body_base64.len(), 400);
        assert_eq!(bucket[0].to_response().unwrap().body.len(), 300);
    }

    #[tokio::test]
    async fn test_disk_store_concurrent_writers_and_readers() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DiskCacheStore::open(dir.path()).await.unwrap());
        store.create_generation("v1").await.unwrap();

        let bodies: Vec<String> = (0..8)
            .map(|i| format!("body-{}-{}", i, "x".repeat(i * 512)))
            .collect();
        let mut handles = Vec::new();

        for body in bodies.clone() {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .put("v1", "/shared?v=1", CachedResponse::new(200, body))
                    .await
                    .unwrap();
                None
            }));
        }
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .match_any("/shared", &MatchOptions::ignore_query())
                    .await
                    .unwrap()
            }));
        }

        for handle in handles {
            if let Some(read) = handle.await.unwrap() {
                assert!(bodies.iter().any(|b| read.body == b.as_str()));
            }
        }

        let last = store
            .match_any("/shared?v=1", &MatchOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert!(bodies.iter().any(|b| last.body == b.as_str()));
        assert_eq!(store.count_entries("v1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_recreated_generation_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskCacheStore::open(dir.path()).await.unwrap();
        store.create_generation("v1").await.unwrap();
        store.put("v1", "/stale", CachedResponse::new(200, "old")).await.unwrap();

        // Unlist the generation but leave its directory, as a failed removal would.
        {
            let mut index = store.index.write().await;
            index.clear();
            store.persist_index(&index).await.unwrap();
        }
        assert!(store.generation_dir("v1").exists());

        assert!(store.create_generation("v1").await.unwrap());
        assert!(store
            .match_any("/stale", &MatchOptions::default())
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.count_entries("v1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_bucket_is_skipped_and_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskCacheStore::open(dir.path()).await.unwrap();
        store.create_generation("v1").await.unwrap();
        store.create_generation("v2").await.unwrap();
        store.put("v2", "/page", CachedResponse::new(200, "fresh")).await.unwrap();
        fs::write(store.bucket_path("v1", "/page"), b"{not json").await.unwrap();

        let found = store
            .match_any("/page", &MatchOptions::ignore_query())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.body, "fresh");

        store.put("v1", "/page", CachedResponse::new(200, "rewritten")).await.unwrap();
        let options = MatchOptions::default().in_generation("v1");
        let found = store.match_any("/page", &options).await.unwrap().unwrap();
        assert_eq!(found.body, "rewritten");
    }
}
