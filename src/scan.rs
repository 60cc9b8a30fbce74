//! Clip directory scanner
//!
//! Walks the clip directory looking for `<id>.meta` sidecars, validates the
//! id, and keeps the pair only if both files are regular files. Symlinks are
//! never followed, so a linked blob or sidecar does not count. The result is
//! ordered newest first by blob modification time.
//!
//! Scanning is best-effort: entries that cannot be read are skipped and
//! reported in [`Inventory::skipped`] rather than failing the whole scan.
//! Only a failure to open the clip directory itself is an error.

use crate::error::ClipError;
use crate::id::ClipId;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;
use walkdir::WalkDir;

/// Suffix of clip sidecar files
pub const META_SUFFIX: &str = ".meta";

/// A blob/sidecar pair found on disk
#[derive(Debug, Clone)]
pub struct ClipFile {
    pub id: ClipId,
    pub blob_path: PathBuf,
    pub meta_path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

/// Why a directory entry did not make it into the inventory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The walker could not read this entry
    Unreadable(String),
    /// Name ends in `.meta` but the rest is not a canonical id
    InvalidId,
    /// Sidecar without a blob next to it
    MissingBlob,
    /// Blob path exists but is a directory, symlink or special file
    BlobNotFile,
    /// `<id>.meta` is a directory, symlink or special file
    MetaNotFile,
}

#[derive(Debug, Clone)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Ordered result of a directory scan.
///
/// Iterating consumes the entries; call [`scan_clip_dir`] again for a fresh
/// pass.
#[derive(Debug)]
pub struct Inventory {
    entries: std::vec::IntoIter<ClipFile>,
    skipped: Vec<SkippedEntry>,
}

impl Inventory {
    /// Entries that were passed over, for diagnostics
    pub fn skipped(&self) -> &[SkippedEntry] {
        &self.skipped
    }
}

impl Iterator for Inventory {
    type Item = ClipFile;

    fn next(&mut self) -> Option<ClipFile> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for Inventory {}

/// Scan `dir` for valid clips.
///
/// Only the top level is considered: clip ids are looked up directly under
/// the clip directory, so anything deeper (including the staging area) could
/// never be fetched and is not listed.
pub fn scan_clip_dir(dir: &Path) -> Result<Inventory, ClipError> {
    let mut entries = Vec::new();
    let mut skipped = Vec::new();

    for entry in WalkDir::new(dir).min_depth(0).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                let io = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("clip directory walk failed"));
                return Err(ClipError::Io(io));
            }
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                debug!(path = %path.display(), error = %e, "Skipping unreadable entry");
                skipped.push(SkippedEntry {
                    path,
                    reason: SkipReason::Unreadable(e.to_string()),
                });
                continue;
            }
        };

        if entry.depth() == 0 {
            continue;
        }

        let Some(file_name) = entry.file_name().to_str() else {
            continue;
        };
        let Some(candidate) = file_name.strip_suffix(META_SUFFIX) else {
            continue;
        };

        let meta_path = entry.path().to_path_buf();
        let mut skip = |reason: SkipReason| {
            debug!(path = %meta_path.display(), ?reason, "Skipping clip candidate");
            skipped.push(SkippedEntry {
                path: meta_path.clone(),
                reason,
            });
        };

        if !entry.file_type().is_file() {
            skip(SkipReason::MetaNotFile);
            continue;
        }

        let Some(id) = ClipId::parse(candidate) else {
            skip(SkipReason::InvalidId);
            continue;
        };

        let blob_path = dir.join(id.as_str());
        let blob_meta = match std::fs::symlink_metadata(&blob_path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                skip(SkipReason::MissingBlob);
                continue;
            }
            Err(e) => {
                skip(SkipReason::Unreadable(e.to_string()));
                continue;
            }
        };

        if !blob_meta.is_file() {
            skip(SkipReason::BlobNotFile);
            continue;
        }

        entries.push(ClipFile {
            id,
            blob_path,
            meta_path,
            size: blob_meta.len(),
            modified: modified_time(&blob_meta),
        });
    }

    sort_newest_first(&mut entries);

    Ok(Inventory {
        entries: entries.into_iter(),
        skipped,
    })
}

/// Newest first; ids break ties so repeated scans agree on order
fn sort_newest_first(entries: &mut [ClipFile]) {
    entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.id.cmp(&b.id)));
}

pub(crate) fn modified_time(meta: &Metadata) -> SystemTime {
    meta.modified().unwrap_or(SystemTime::UNIX_EPOCH)
}
