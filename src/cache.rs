//! Client-side persistent cache.
//!
//! Values are stored under a fixed key scheme inside a versioned envelope.
//! Entries older than the configured TTL, or written under another schema
//! version, read as misses. Staged book payloads are bounded: writing one
//! evicts the least recently written payloads beyond `max_book_entries`.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use anyhow::Context as _;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::config::CacheConfig;

pub const CACHE_SCHEMA_VERSION: u32 = 1;

const BOOK_DATA_PREFIX: &str = "bookData-";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Full book catalog (`allBooks`).
    Catalog,
    /// One staged book payload (`bookData-<bookId>`).
    BookData(String),
    Cart,
    GuruPurnimaToken,
}

impl CacheKey {
    pub fn book_data(book_id: &str) -> Self {
        Self::BookData(book_id.to_owned())
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "allBooks" => Some(Self::Catalog),
            "cart" => Some(Self::Cart),
            "gp-token-info" => Some(Self::GuruPurnimaToken),
            _ => raw
                .strip_prefix(BOOK_DATA_PREFIX)
                .filter(|id| !id.is_empty())
                .map(Self::book_data),
        }
    }

    pub fn is_book_data(&self) -> bool {
        matches!(self, Self::BookData(_))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Catalog => f.write_str("allBooks"),
            Self::BookData(book_id) => write!(f, "{BOOK_DATA_PREFIX}{book_id}"),
            Self::Cart => f.write_str("cart"),
            Self::GuruPurnimaToken => f.write_str("gp-token-info"),
        }
    }
}

/// Raw key/value persistence underneath [`LocalCache`].
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn read(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
    async fn write(&self, key: &str, bytes: Vec<u8>) -> anyhow::Result<()>;
    async fn remove(&self, key: &str) -> anyhow::Result<()>;
    async fn keys(&self) -> anyhow::Result<Vec<String>>;
    /// When `key` was last written, without reading its value.
    async fn modified(&self, key: &str) -> anyhow::Result<Option<SystemTime>>;
}

/// One JSON file per key. Writes replace the file atomically, so concurrent
/// writers sharing a directory resolve to whichever rename lands last.
#[derive(Debug, Clone)]
pub struct LocalFsCacheStore {
    base_dir: PathBuf,
}

impl LocalFsCacheStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn entries_dir(&self) -> PathBuf {
        self.base_dir.join("entries")
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.entries_dir().join(format!("{}.json", encode_key(key)))
    }
}

#[async_trait]
impl CacheStore for LocalFsCacheStore {
    async fn read(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let path = self.entry_path(key);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("read: {}", path.display())),
        }
    }

    async fn write(&self, key: &str, bytes: Vec<u8>) -> anyhow::Result<()> {
        write_atomic(&self.entry_path(key), &bytes).await
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        let path = self.entry_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("remove: {}", path.display())),
        }
    }

    async fn keys(&self) -> anyhow::Result<Vec<String>> {
        let dir = self.entries_dir();
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err).with_context(|| format!("list: {}", dir.display())),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            keys.push(decode_key(stem));
        }
        keys.sort();
        Ok(keys)
    }

    async fn modified(&self, key: &str) -> anyhow::Result<Option<SystemTime>> {
        let path = self.entry_path(key);
        match fs::metadata(&path).await {
            Ok(meta) => Ok(Some(
                meta.modified()
                    .with_context(|| format!("mtime: {}", path.display()))?,
            )),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("stat: {}", path.display())),
        }
    }
}

fn encode_key(key: &str) -> String {
    url::form_urlencoded::byte_serialize(key.as_bytes()).collect()
}

fn decode_key(encoded: &str) -> String {
    url::form_urlencoded::parse(encoded.as_bytes())
        .next()
        .map(|(key, _)| key.into_owned())
        .unwrap_or_default()
}

async fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    fs::create_dir_all(parent)
        .await
        .with_context(|| format!("create parent dir: {}", parent.display()))?;

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    fs::write(&tmp_path, data)
        .await
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}

type MemoryEntries = HashMap<String, (Vec<u8>, SystemTime)>;

#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<MemoryEntries>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, MemoryEntries>> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory cache lock poisoned"))
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn read(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.lock()?.get(key).map(|(bytes, _)| bytes.clone()))
    }

    async fn write(&self, key: &str, bytes: Vec<u8>) -> anyhow::Result<()> {
        self.lock()?
            .insert(key.to_owned(), (bytes, SystemTime::now()));
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn keys(&self) -> anyhow::Result<Vec<String>> {
        let mut keys = self.lock()?.keys().cloned().collect::<Vec<_>>();
        keys.sort();
        Ok(keys)
    }

    async fn modified(&self, key: &str) -> anyhow::Result<Option<SystemTime>> {
        Ok(self.lock()?.get(key).map(|(_, at)| *at))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub max_book_entries: usize,
    pub ttl: chrono::Duration,
}

impl CachePolicy {
    pub fn from_config(config: &CacheConfig) -> Self {
        let ttl_secs = i64::try_from(config.ttl_secs).unwrap_or(i64::MAX);
        Self {
            max_book_entries: config.max_book_entries.max(1),
            ttl: chrono::Duration::try_seconds(ttl_secs).unwrap_or(chrono::Duration::MAX),
        }
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    written_at: DateTime<Utc>,
    value: T,
}

/// Typed cache over a [`CacheStore`].
pub struct LocalCache {
    store: Arc<dyn CacheStore>,
    policy: CachePolicy,
}

impl LocalCache {
    pub fn new(store: Arc<dyn CacheStore>, policy: CachePolicy) -> Self {
        Self { store, policy }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCacheStore::new()), CachePolicy::default())
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> anyhow::Result<Option<T>> {
        let raw_key = key.to_string();
        let Some(bytes) = self.store.read(&raw_key).await? else {
            return Ok(None);
        };

        let envelope: Envelope<T> = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(key = %raw_key, %err, "dropping unreadable cache entry");
                self.store.remove(&raw_key).await?;
                return Ok(None);
            }
        };

        if envelope.version != CACHE_SCHEMA_VERSION {
            tracing::debug!(key = %raw_key, version = envelope.version, "dropping cache entry from another schema version");
            self.store.remove(&raw_key).await?;
            return Ok(None);
        }
        if self.is_expired(envelope.written_at) {
            tracing::debug!(key = %raw_key, written_at = %envelope.written_at, "cache entry expired");
            self.store.remove(&raw_key).await?;
            return Ok(None);
        }

        Ok(Some(envelope.value))
    }

    pub async fn put<T: Serialize>(&self, key: &CacheKey, value: &T) -> anyhow::Result<()> {
        let raw_key = key.to_string();
        let envelope = Envelope {
            version: CACHE_SCHEMA_VERSION,
            written_at: Utc::now(),
            value,
        };
        let bytes = serde_json::to_vec(&envelope).context("serialize cache entry")?;
        self.store
            .write(&raw_key, bytes)
            .await
            .with_context(|| format!("write cache entry {raw_key}"))?;

        if key.is_book_data() {
            self.evict_book_data(&raw_key).await?;
        }
        Ok(())
    }

    pub async fn remove(&self, key: &CacheKey) -> anyhow::Result<()> {
        self.store.remove(&key.to_string()).await
    }

    /// Keeps the `max_book_entries` most recently written payloads. Only
    /// write times are consulted; payload bodies are never read here.
    async fn evict_book_data(&self, just_written: &str) -> anyhow::Result<()> {
        let keys = self
            .store
            .keys()
            .await?
            .into_iter()
            .filter(|key| key.starts_with(BOOK_DATA_PREFIX))
            .collect::<Vec<_>>();
        if keys.len() <= self.policy.max_book_entries {
            return Ok(());
        }

        let mut staged = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(modified) = self.store.modified(&key).await? else {
                continue;
            };
            staged.push((key, modified));
        }
        if staged.len() <= self.policy.max_book_entries {
            return Ok(());
        }

        staged.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        let excess = staged.len() - self.policy.max_book_entries;
        for (key, _) in staged
            .into_iter()
            .filter(|(key, _)| key != just_written)
            .take(excess)
        {
            tracing::debug!(key = %key, "evicting staged book payload");
            self.store.remove(&key).await?;
        }
        Ok(())
    }

    fn is_expired(&self, written_at: DateTime<Utc>) -> bool {
        Utc::now().signed_duration_since(written_at) > self.policy.ttl
    }
}
