//! Clip storage
//!
//! Every clip is two sibling files in the clip directory:
//!
//! ```text
//! clips/
//! ├── .staging/                               # in-flight uploads
//! ├── 3f2a...c91e                             # blob (raw uploaded bytes)
//! └── 3f2a...c91e.meta                        # sidecar {"name": .., "mime": ..}
//! ```
//!
//! A clip exists only while both files are present and are regular files.
//! Uploads are staged in `.staging/`, then committed by renaming
//! the blob into place and the sidecar last, so listings (which are gated on
//! the sidecar) never see a half-written clip.

use crate::config::Config;
use crate::error::ClipError;
use crate::guard::{GuardMode, SerializationGuard};
use crate::id::{ClipId, IdGenerator, RandomIds};
use crate::scan::{self, ClipFile, Inventory, META_SUFFIX};
use crate::sniff;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Staging directory name, relative to the clip directory
pub const STAGING_DIR: &str = ".staging";

/// Route prefix used for resource and share links
pub const CLIPS_ROUTE: &str = "/api/v1/clips";

/// How often a commit retries when a generated id is already taken
const MAX_ID_ATTEMPTS: usize = 8;

/// Sidecar contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime: String,
}

/// A committed clip as returned by an upload
#[derive(Debug, Clone)]
pub struct Clip {
    pub id: ClipId,
    pub meta: ClipMeta,
    /// Upload time
    pub created: SystemTime,
    /// Blob mtime, if the blob could be stat'ed after commit
    pub modified: Option<SystemTime>,
    /// Blob size, if the blob could be stat'ed after commit
    pub size: Option<u64>,
}

/// JSON view of a clip used by listing and upload responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipSummary {
    pub id: String,
    pub name: String,
    pub mime: String,
    /// Unix seconds
    pub ctime: i64,
    /// Unix seconds, -1 when unknown
    pub mtime: i64,
    /// Bytes, -1 when unknown
    pub size: i64,
    pub resource: String,
    pub share: String,
}

impl ClipSummary {
    fn new(id: &ClipId, meta: ClipMeta, ctime: i64, mtime: i64, size: i64) -> Self {
        Self {
            id: id.to_string(),
            name: meta.name,
            mime: meta.mime,
            ctime,
            mtime,
            size,
            resource: resource_link(id),
            share: share_link(id),
        }
    }
}

impl From<&Clip> for ClipSummary {
    fn from(clip: &Clip) -> Self {
        ClipSummary::new(
            &clip.id,
            clip.meta.clone(),
            unix_secs(clip.created),
            clip.modified.map(unix_secs).unwrap_or(-1),
            clip.size.map(|s| s as i64).unwrap_or(-1),
        )
    }
}

/// An open clip ready to be streamed out
#[derive(Debug)]
pub struct ClipContent {
    pub id: ClipId,
    pub meta: ClipMeta,
    pub file: File,
    pub size: u64,
    pub modified: SystemTime,
}

pub fn resource_link(id: &ClipId) -> String {
    format!("{}/{}", CLIPS_ROUTE, id)
}

pub fn share_link(id: &ClipId) -> String {
    format!("{}/{}/share", CLIPS_ROUTE, id)
}

pub fn unix_secs(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}

/// Trimmed, lowercased MIME declared by the uploader, if any
fn normalize_mime(declared: Option<&str>) -> Option<String> {
    declared
        .map(|m| m.trim().to_lowercase())
        .filter(|m| !m.is_empty())
}

/// Staged upload files, removed on drop unless they were renamed away
struct Staged {
    blob: PathBuf,
    meta: PathBuf,
}

impl Drop for Staged {
    // Blocking unlinks on the runtime thread: at most two small files per upload.
    fn drop(&mut self) {
        for path in [&self.blob, &self.meta] {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "Removed staged file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove staged file"),
            }
        }
    }
}

/// Clip store over a single directory
pub struct ClipStore {
    clip_dir: PathBuf,
    staging_dir: PathBuf,
    /// Upload cap in bytes, 0 = unlimited
    max_clip_size: u64,
    guard: SerializationGuard,
    ids: Box<dyn IdGenerator>,
}

impl ClipStore {
    /// Open (and create if needed) a clip store at `clip_dir`.
    ///
    /// Leftovers in the staging directory from an earlier run are removed.
    pub async fn open<P: AsRef<Path>>(
        clip_dir: P,
        max_clip_size: u64,
        mode: GuardMode,
    ) -> Result<Self, ClipError> {
        let clip_dir = clip_dir.as_ref().to_path_buf();

        match fs::metadata(&clip_dir).await {
            Ok(meta) if !meta.is_dir() => {
                return Err(ClipError::Config(format!(
                    "{} is not a directory",
                    clip_dir.display()
                )));
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                fs::create_dir_all(&clip_dir).await?;
            }
            Err(e) => return Err(e.into()),
        }

        let staging_dir = clip_dir.join(STAGING_DIR);
        if fs::metadata(&staging_dir).await.is_ok() {
            fs::remove_dir_all(&staging_dir).await?;
        }
        fs::create_dir_all(&staging_dir).await?;

        info!(
            path = %clip_dir.display(),
            max_clip_size,
            guard = %mode,
            "Initialized clip store"
        );

        Ok(Self {
            clip_dir,
            staging_dir,
            max_clip_size,
            guard: SerializationGuard::new(mode),
            ids: Box::new(RandomIds),
        })
    }

    /// Open the store described by `config`
    pub async fn from_config(config: &Config) -> Result<Self, ClipError> {
        Self::open(&config.clip_dir, config.max_clip_size, config.guard).await
    }

    /// Replace the id source
    pub fn with_id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    pub fn clip_dir(&self) -> &Path {
        &self.clip_dir
    }

    pub fn max_clip_size(&self) -> u64 {
        self.max_clip_size
    }

    fn blob_path(&self, id: &ClipId) -> PathBuf {
        self.clip_dir.join(id.as_str())
    }

    fn meta_path(&self, id: &ClipId) -> PathBuf {
        self.clip_dir.join(format!("{}{}", id, META_SUFFIX))
    }

    /// Store an uploaded body as a new clip.
    ///
    /// The body is streamed into the staging area; once more than
    /// `max_clip_size` bytes arrive the upload is aborted with
    /// [`ClipError::PayloadTooLarge`] and nothing is kept.
    pub async fn put<S, E>(
        &self,
        mut body: S,
        declared_mime: Option<&str>,
        declared_name: Option<&str>,
    ) -> Result<Clip, ClipError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Display,
    {
        let created = SystemTime::now();
        let token = Uuid::new_v4().simple().to_string();
        let staged = Staged {
            blob: self.staging_dir.join(format!("{}.part", token)),
            meta: self.staging_dir.join(format!("{}.meta.part", token)),
        };

        let mut file = File::create(&staged.blob).await?;
        let mut written: u64 = 0;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| ClipError::Body(e.to_string()))?;
            written += chunk.len() as u64;
            if self.max_clip_size > 0 && written > self.max_clip_size {
                warn!(limit = self.max_clip_size, "Upload exceeds maximum clip size");
                return Err(ClipError::PayloadTooLarge {
                    limit: self.max_clip_size,
                });
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        let mime = match normalize_mime(declared_mime) {
            Some(mime) => mime,
            None => sniff::sniff_file(&staged.blob).await?.to_string(),
        };
        let meta = ClipMeta {
            name: declared_name.map(|n| n.trim().to_string()).unwrap_or_default(),
            mime,
        };
        fs::write(&staged.meta, serde_json::to_vec(&meta)?).await?;

        let id = {
            let _ticket = self.guard.exclusive().await;
            self.commit(&staged).await?
        };

        // populate from a successful stat only
        let (modified, size) = match fs::metadata(self.blob_path(&id)).await {
            Ok(m) => (Some(scan::modified_time(&m)), Some(m.len())),
            Err(e) => {
                warn!(id = %id, error = %e, "Could not stat committed clip");
                (None, None)
            }
        };

        info!(id = %id, size = written, mime = %meta.mime, "Stored clip");

        Ok(Clip {
            id,
            meta,
            created,
            modified,
            size,
        })
    }

    /// Move staged files into the clip directory under a fresh id.
    /// Caller holds the exclusive guard.
    async fn commit(&self, staged: &Staged) -> Result<ClipId, ClipError> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = self.ids.next_id();
            let blob_path = self.blob_path(&id);

            if fs::symlink_metadata(&blob_path).await.is_ok() {
                warn!(id = %id, "Generated clip id already in use, retrying");
                continue;
            }

            fs::rename(&staged.blob, &blob_path).await?;

            if let Err(e) = fs::rename(&staged.meta, self.meta_path(&id)).await {
                // no blob without a sidecar
                if let Err(cleanup) = fs::remove_file(&blob_path).await {
                    warn!(id = %id, error = %cleanup, "Failed to remove blob after sidecar failure");
                }
                return Err(e.into());
            }

            return Ok(id);
        }

        Err(ClipError::Internal(format!(
            "no free clip id after {} attempts",
            MAX_ID_ATTEMPTS
        )))
    }

    /// Check that both files of a clip exist and are regular files.
    /// Returns the blob's filesystem metadata.
    async fn lookup(&self, id: &ClipId) -> Result<std::fs::Metadata, ClipError> {
        let blob = stat_file(&self.blob_path(id), id).await?;
        stat_file(&self.meta_path(id), id).await?;
        Ok(blob)
    }

    /// Open a clip for reading
    pub async fn get(&self, id: &str) -> Result<ClipContent, ClipError> {
        let id = ClipId::parse(id).ok_or_else(|| ClipError::NotFound(id.to_string()))?;
        let _ticket = self.guard.shared().await;

        let blob_meta = self.lookup(&id).await?;
        let meta: ClipMeta = serde_json::from_slice(&fs::read(self.meta_path(&id)).await?)?;
        let file = File::open(self.blob_path(&id)).await.map_err(|e| not_found_or(e, &id))?;

        debug!(id = %id, size = blob_meta.len(), "Opened clip");

        Ok(ClipContent {
            id,
            meta,
            file,
            size: blob_meta.len(),
            modified: scan::modified_time(&blob_meta),
        })
    }

    /// Scan the clip directory
    pub async fn scan(&self) -> Result<Inventory, ClipError> {
        let dir = self.clip_dir.clone();
        let inventory = tokio::task::spawn_blocking(move || scan::scan_clip_dir(&dir))
            .await
            .map_err(|e| ClipError::Internal(format!("scan task failed: {}", e)))??;

        for skipped in inventory.skipped() {
            debug!(path = %skipped.path.display(), reason = ?skipped.reason, "Scan skipped entry");
        }

        Ok(inventory)
    }

    /// Scanned clips whose sidecar also decodes, newest first.
    /// Caller holds a guard ticket.
    async fn readable_clips(&self) -> Result<Vec<(ClipFile, ClipMeta)>, ClipError> {
        let inventory = self.scan().await?;

        let mut clips = Vec::with_capacity(inventory.len());
        for clip in inventory {
            match read_meta(&clip).await {
                Ok(meta) => clips.push((clip, meta)),
                Err(e) => {
                    debug!(id = %clip.id, error = %e, "Skipping clip with unreadable sidecar");
                }
            }
        }

        Ok(clips)
    }

    /// List all clips, newest first
    pub async fn list(&self) -> Result<Vec<ClipSummary>, ClipError> {
        let _ticket = self.guard.shared().await;

        Ok(self
            .readable_clips()
            .await?
            .into_iter()
            .map(|(clip, meta)| {
                let mtime = unix_secs(clip.modified);
                ClipSummary::new(&clip.id, meta, mtime, mtime, clip.size as i64)
            })
            .collect())
    }

    /// Number of clips a listing would return
    pub async fn count(&self) -> Result<usize, ClipError> {
        let _ticket = self.guard.shared().await;
        Ok(self.readable_clips().await?.len())
    }

    /// Delete one clip
    pub async fn delete(&self, id: &str) -> Result<(), ClipError> {
        let id = ClipId::parse(id).ok_or_else(|| ClipError::NotFound(id.to_string()))?;
        let _ticket = self.guard.exclusive().await;
        self.delete_unlocked(&id).await
    }

    async fn delete_unlocked(&self, id: &ClipId) -> Result<(), ClipError> {
        self.lookup(id).await?;

        fs::remove_file(self.blob_path(id))
            .await
            .map_err(|e| not_found_or(e, id))?;

        // without its blob the sidecar can never surface again
        if let Err(e) = fs::remove_file(self.meta_path(id)).await {
            warn!(id = %id, error = %e, "Failed to remove clip sidecar");
        }

        info!(id = %id, "Deleted clip");
        Ok(())
    }

    /// Delete every clip. Stops at the first failure; clips deleted before it
    /// stay deleted.
    pub async fn delete_all(&self) -> Result<usize, ClipError> {
        let _ticket = self.guard.exclusive().await;
        let mut deleted = 0;

        for clip in self.scan().await? {
            self.delete_unlocked(&clip.id).await?;
            deleted += 1;
        }

        info!(count = deleted, "Deleted all clips");
        Ok(deleted)
    }
}

async fn read_meta(clip: &ClipFile) -> Result<ClipMeta, ClipError> {
    let bytes = fs::read(&clip.meta_path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn not_found_or(e: std::io::Error, id: &ClipId) -> ClipError {
    if e.kind() == std::io::ErrorKind::NotFound {
        ClipError::NotFound(id.to_string())
    } else {
        ClipError::Io(e)
    }
}

/// Symlinks are not regular files here, matching the scanner
async fn stat_file(path: &Path, id: &ClipId) -> Result<std::fs::Metadata, ClipError> {
    let meta = fs::symlink_metadata(path).await.map_err(|e| not_found_or(e, id))?;
    if !meta.is_file() {
        return Err(ClipError::NotFound(id.to_string()));
    }
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use std::convert::Infallible;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    struct FixedId(&'static str);

    impl IdGenerator for FixedId {
        fn next_id(&self) -> ClipId {
            ClipId::parse(self.0).unwrap()
        }
    }

    fn body(chunks: &[&'static [u8]]) -> impl Stream<Item = Result<Bytes, Infallible>> + Unpin {
        stream::iter(
            chunks
                .iter()
                .map(|c| Ok(Bytes::from_static(c)))
                .collect::<Vec<_>>(),
        )
    }

    async fn open_store(dir: &Path, max: u64) -> ClipStore {
        ClipStore::open(dir, max, GuardMode::ReadWrite).await.unwrap()
    }

    async fn read_all(mut content: ClipContent) -> Vec<u8> {
        let mut data = Vec::new();
        content.file.read_to_end(&mut data).await.unwrap();
        data
    }

    fn clip_dir_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|n| n != STAGING_DIR)
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 0).await;

        let clip = store
            .put(body(&[b"hel", b"lo"]), Some(" Text/Plain "), Some("  note.txt "))
            .await
            .unwrap();

        assert_eq!(clip.meta.mime, "text/plain");
        assert_eq!(clip.meta.name, "note.txt");

        let content = store.get(clip.id.as_str()).await.unwrap();
        assert_eq!(content.meta, clip.meta);
        assert_eq!(content.size, 5);
        assert_eq!(read_all(content).await, b"hello");

        let files = clip_dir_files(temp_dir.path());
        assert_eq!(files, vec![clip.id.to_string(), format!("{}.meta", clip.id)]);
    }

    #[tokio::test]
    async fn test_put_sniffs_when_undeclared() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 0).await;

        let png = store
            .put(body(&[b"\x89PNG\r\n\x1a\n", b"rest"]), None, None)
            .await
            .unwrap();
        assert_eq!(png.meta.mime, "image/png");
        assert_eq!(png.meta.name, "");

        let text = store.put(body(&[b"plain words"]), Some("   "), None).await.unwrap();
        assert_eq!(text.meta.mime, sniff::TEXT_PLAIN_UTF8);

        let empty = store.put(body(&[]), None, None).await.unwrap();
        assert_eq!(empty.meta.mime, sniff::TEXT_PLAIN_UTF8);
        assert_eq!(empty.size, Some(0));
    }

    #[tokio::test]
    async fn test_put_reports_stat_fields() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 0).await;

        let clip = store.put(body(&[b"twelve bytes"]), None, None).await.unwrap();
        assert_eq!(clip.size, Some(12));
        assert!(clip.modified.is_some());

        let summary = ClipSummary::from(&clip);
        assert_eq!(summary.size, 12);
        assert!(summary.mtime > 0);
        assert!(summary.ctime > 0);
        assert_eq!(summary.resource, format!("/api/v1/clips/{}", clip.id));
        assert_eq!(summary.share, format!("/api/v1/clips/{}/share", clip.id));
    }

    #[tokio::test]
    async fn test_put_over_limit_leaves_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 8).await;

        let err = store
            .put(body(&[b"12345", b"67890", b"abc"]), Some("text/plain"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ClipError::PayloadTooLarge { limit: 8 }));

        assert!(clip_dir_files(temp_dir.path()).is_empty());
        let staged = std::fs::read_dir(temp_dir.path().join(STAGING_DIR)).unwrap().count();
        assert_eq!(staged, 0);

        // exactly at the limit is fine
        store.put(body(&[b"12345678"]), None, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_put_body_error_cleans_staging() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 0).await;

        let broken = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err("connection reset"),
        ]);
        let err = store.put(broken, None, None).await.unwrap_err();
        assert!(matches!(err, ClipError::Body(_)));

        assert!(clip_dir_files(temp_dir.path()).is_empty());
        let staged = std::fs::read_dir(temp_dir.path().join(STAGING_DIR)).unwrap().count();
        assert_eq!(staged, 0);
    }

    #[tokio::test]
    async fn test_sidecar_failure_removes_blob() {
        const ID: &str = "0123456789abcdef0123456789abcdef";
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 0).await.with_id_generator(FixedId(ID));

        // a directory where the sidecar should go makes the sidecar rename fail
        std::fs::create_dir(temp_dir.path().join(format!("{}.meta", ID))).unwrap();

        let err = store.put(body(&[b"data"]), None, None).await.unwrap_err();
        assert!(err.is_storage_error());
        assert!(!temp_dir.path().join(ID).exists());
        assert!(matches!(store.get(ID).await, Err(ClipError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_commit_skips_taken_ids() {
        const ID: &str = "ffffffffffffffffffffffffffffffff";
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 0).await.with_id_generator(FixedId(ID));

        std::fs::write(temp_dir.path().join(ID), b"existing").unwrap();

        let err = store.put(body(&[b"new"]), None, None).await.unwrap_err();
        assert!(matches!(err, ClipError::Internal(_)));
        assert_eq!(std::fs::read(temp_dir.path().join(ID)).unwrap(), b"existing");
    }

    #[tokio::test]
    async fn test_invalid_ids_are_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 0).await;

        for id in ["not-a-valid-id", "", "../etc/passwd", "ABCDEF0123456789ABCDEF0123456789"] {
            assert!(matches!(store.get(id).await, Err(ClipError::NotFound(_))));
            assert!(matches!(store.delete(id).await, Err(ClipError::NotFound(_))));
        }
    }

    #[tokio::test]
    async fn test_get_requires_both_files() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let store = open_store(dir, 0).await;

        let orphan = "11111111111111111111111111111111";
        std::fs::write(dir.join(orphan), b"blob only").unwrap();
        assert!(matches!(store.get(orphan).await, Err(ClipError::NotFound(_))));

        let dir_blob = "22222222222222222222222222222222";
        std::fs::create_dir(dir.join(dir_blob)).unwrap();
        std::fs::write(dir.join(format!("{}.meta", dir_blob)), b"{}").unwrap();
        assert!(matches!(store.get(dir_blob).await, Err(ClipError::NotFound(_))));

        let missing = "33333333333333333333333333333333";
        assert!(matches!(store.get(missing).await, Err(ClipError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_and_count() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 0).await;

        let first = store.put(body(&[b"one"]), Some("text/plain"), Some("a")).await.unwrap();
        let second = store.put(body(&[b"two!"]), Some("text/plain"), Some("b")).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(store.count().await.unwrap(), 2);

        let ids: Vec<&str> = listed.iter().map(|c| c.id.as_str()).collect();
        assert!(ids.contains(&first.id.as_str()));
        assert!(ids.contains(&second.id.as_str()));
        for item in &listed {
            assert_eq!(item.ctime, item.mtime);
        }

        // stable with no writes in between
        assert_eq!(store.list().await.unwrap(), listed);
    }

    #[tokio::test]
    async fn test_count_matches_list_with_corrupt_sidecar() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 0).await;

        let good = store.put(body(&[b"fine"]), None, None).await.unwrap();
        let bad = "44444444444444444444444444444444";
        std::fs::write(temp_dir.path().join(bad), b"x").unwrap();
        std::fs::write(temp_dir.path().join(format!("{}.meta", bad)), b"not json").unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, good.id.to_string());
        assert_eq!(store.count().await.unwrap(), listed.len());
        assert!(matches!(store.get(bad).await, Err(ClipError::Json(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_files_are_not_clips() {
        use std::os::unix::fs::symlink;

        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        let store = open_store(dir, 0).await;

        let outside = TempDir::new().unwrap();
        let target_meta = outside.path().join("meta.json");
        let target_blob = outside.path().join("blob");
        std::fs::write(&target_meta, br#"{"name":"","mime":"text/plain"}"#).unwrap();
        std::fs::write(&target_blob, b"elsewhere").unwrap();

        let linked_meta = "55555555555555555555555555555555";
        std::fs::write(dir.join(linked_meta), b"blob").unwrap();
        symlink(&target_meta, dir.join(format!("{}.meta", linked_meta))).unwrap();

        let linked_blob = "66666666666666666666666666666666";
        symlink(&target_blob, dir.join(linked_blob)).unwrap();
        std::fs::write(dir.join(format!("{}.meta", linked_blob)), b"{}").unwrap();

        assert!(store.list().await.unwrap().is_empty());
        assert_eq!(store.count().await.unwrap(), 0);
        for id in [linked_meta, linked_blob] {
            assert!(matches!(store.get(id).await, Err(ClipError::NotFound(_))));
            assert!(matches!(store.delete(id).await, Err(ClipError::NotFound(_))));
        }
        assert!(target_blob.exists());
    }

    #[tokio::test]
    async fn test_delete_and_delete_all() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(temp_dir.path(), 0).await;

        let a = store.put(body(&[b"a"]), None, None).await.unwrap();
        store.put(body(&[b"b"]), None, None).await.unwrap();
        store.put(body(&[b"c"]), None, None).await.unwrap();

        store.delete(a.id.as_str()).await.unwrap();
        assert!(matches!(store.get(a.id.as_str()).await, Err(ClipError::NotFound(_))));
        assert!(matches!(store.delete(a.id.as_str()).await, Err(ClipError::NotFound(_))));

        assert_eq!(store.delete_all().await.unwrap(), 2);
        assert!(store.list().await.unwrap().is_empty());
        assert!(clip_dir_files(temp_dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_open_clears_staging_and_rejects_files() {
        let temp_dir = TempDir::new().unwrap();
        let staging = temp_dir.path().join(STAGING_DIR);
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(staging.join("leftover.part"), b"junk").unwrap();

        open_store(temp_dir.path(), 0).await;
        assert_eq!(std::fs::read_dir(&staging).unwrap().count(), 0);

        let not_dir = temp_dir.path().join("file");
        std::fs::write(&not_dir, b"").unwrap();
        let err = ClipStore::open(&not_dir, 0, GuardMode::ReadWrite).await.err().unwrap();
        assert!(matches!(err, ClipError::Config(_)));
    }

    #[tokio::test]
    async fn test_exclusive_mode_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = ClipStore::open(temp_dir.path(), 0, GuardMode::Exclusive).await.unwrap();

        let clip = store.put(body(&[b"serial"]), None, None).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(read_all(store.get(clip.id.as_str()).await.unwrap()).await, b"serial");
    }
}
