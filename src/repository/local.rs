//! Local artifact cache
//!
//! Mirrors the repository layout under one directory. Every cached file has a
//! `<file>.meta.json` side-file recording when and where it was fetched and
//! its blake3 checksum. Writers hold an exclusive lock on `<file>.lock` and
//! publish through a temp file + atomic rename, so readers never observe a
//! partial file.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

/// Side-file contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntryMeta {
    pub fetched_at: DateTime<Utc>,
    /// Id of the endpoint that supplied the bytes
    pub source: String,
    /// blake3 hex digest of the file
    pub checksum: String,
}

impl CacheEntryMeta {
    pub fn is_older_than(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(max_age) {
            Ok(age) => now.signed_duration_since(self.fetched_at) > age,
            Err(_) => false,
        }
    }
}

/// Exclusive lock on one cache entry, released on drop
#[derive(Debug)]
pub struct EntryLock {
    file: File,
}

impl Drop for EntryLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// A cached file that passed its checksum check
#[derive(Debug, Clone)]
pub struct CachedEntry {
    pub path: PathBuf,
    pub meta: Option<CacheEntryMeta>,
}

/// On-disk cache of repository files
#[derive(Debug, Clone)]
pub struct LocalCache {
    root: PathBuf,
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

fn checksum(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp_path = suffixed(path, ".part");

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

        file.write_all(bytes)
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;
        file.sync_all()
            .with_context(|| format!("Failed to sync {}", temp_path.display()))?;
    }

    fs::rename(&temp_path, path).with_context(|| {
        format!(
            "Failed to rename {} to {}",
            temp_path.display(),
            path.display()
        )
    })
}

impl LocalCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a repository-relative path
    pub fn path_of(&self, relative: &str) -> Result<PathBuf> {
        let rel = Path::new(relative);
        if relative.is_empty() || !rel.components().all(|c| matches!(c, Component::Normal(_))) {
            bail!("Invalid repository path: {}", relative);
        }
        Ok(self.root.join(rel))
    }

    fn meta_path(path: &Path) -> PathBuf {
        suffixed(path, ".meta.json")
    }

    /// Takes the exclusive lock guarding one entry
    pub fn lock(&self, relative: &str) -> Result<EntryLock> {
        let path = self.path_of(relative)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let lock_path = suffixed(&path, ".lock");
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;

        file.lock_exclusive()
            .with_context(|| format!("Failed to lock cache entry: {}", path.display()))?;

        Ok(EntryLock { file })
    }

    /// Reads the side-file of an entry, if any
    pub fn meta(&self, relative: &str) -> Result<Option<CacheEntryMeta>> {
        let meta_path = Self::meta_path(&self.path_of(relative)?);
        if !meta_path.exists() {
            return Ok(None);
        }

        let content = fs::read(&meta_path)
            .with_context(|| format!("Failed to read {}", meta_path.display()))?;

        // An unreadable side-file only costs a refetch
        Ok(serde_json::from_slice(&content).ok())
    }

    /// Looks up a cached entry. Entries whose content no longer matches the
    /// recorded checksum are treated as missing.
    pub fn lookup(&self, relative: &str) -> Result<Option<CachedEntry>> {
        let path = self.path_of(relative)?;
        if !path.is_file() {
            return Ok(None);
        }

        let meta = self.meta(relative)?;
        if let Some(meta) = &meta {
            let bytes =
                fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
            if checksum(&bytes) != meta.checksum {
                tracing::warn!(
                    target: "brood::repository",
                    path = %path.display(),
                    "cached file does not match its checksum"
                );
                return Ok(None);
            }
        }

        Ok(Some(CachedEntry { path, meta }))
    }

    /// Stores bytes fetched from `source`. Callers hold the entry lock.
    pub fn store(&self, relative: &str, bytes: &[u8], source: &str) -> Result<PathBuf> {
        let path = self.path_of(relative)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        write_atomic(&path, bytes)?;

        let meta = CacheEntryMeta {
            fetched_at: Utc::now(),
            source: source.to_string(),
            checksum: checksum(bytes),
        };
        let meta_bytes = serde_json::to_vec_pretty(&meta).context("Failed to serialize side-file")?;
        write_atomic(&Self::meta_path(&path), &meta_bytes)?;

        Ok(path)
    }
}
