use crate::error::StreamError;
use clap::ValueEnum;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Extensions (lowercase, without dot) that qualify a file for the playlist.
pub const MEDIA_EXTENSIONS: [&str; 5] = ["mp4", "mov", "avi", "mkv", "flv"];

/// How a pass orders the files of the media folder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OrderingMode {
    /// Ascending by file name.
    #[default]
    Sequential,
    /// A fresh random permutation on every scan.
    Shuffled,
}

impl fmt::Display for OrderingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderingMode::Sequential => f.write_str("sequential"),
            OrderingMode::Shuffled => f.write_str("shuffled"),
        }
    }
}

/// A media file scheduled for streaming in the current pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaylistEntry {
    path: PathBuf,
}

impl PlaylistEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> Option<&OsStr> {
        self.path.file_name()
    }
}

impl fmt::Display for PlaylistEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Source of directory listings.
///
/// Implementations return the regular files found directly inside `dir`;
/// sub-directories are not descended into.
pub trait DirectoryLister: Send + Sync {
    fn list_files(
        &self,
        dir: &Path,
    ) -> impl Future<Output = std::io::Result<Vec<PathBuf>>> + Send;
}

/// Lists the real filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsLister;

impl DirectoryLister for FsLister {
    async fn list_files(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            // metadata() follows symlinks, a dangling link is simply skipped
            match tokio::fs::metadata(&path).await {
                Ok(metadata) if metadata.is_file() => files.push(path),
                Ok(_) => trace!(path = %path.display(), "Skipping non-file entry"),
                Err(error) => trace!(path = %path.display(), %error, "Skipping unreadable entry"),
            }
        }

        Ok(files)
    }
}

/// Returns true when the extension is on the media allow-list (case-insensitive).
pub fn is_media_file(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| {
            MEDIA_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}

/// Scans `dir` and produces the entries of one pass.
///
/// An empty result is not an error: the caller waits and scans again.
pub async fn build_playlist<L>(
    lister: &L,
    dir: &Path,
    ordering: OrderingMode,
) -> Result<Vec<PlaylistEntry>, StreamError>
where
    L: DirectoryLister,
{
    let files = lister
        .list_files(dir)
        .await
        .map_err(|source| StreamError::DirectoryUnreadable {
            path: dir.to_path_buf(),
            source,
        })?;

    let mut entries = files
        .into_iter()
        .filter(|path| is_media_file(path))
        .map(PlaylistEntry::new)
        .collect::<Vec<_>>();

    match ordering {
        OrderingMode::Sequential => entries.sort_by(|a, b| a.file_name().cmp(&b.file_name())),
        OrderingMode::Shuffled => entries.shuffle(&mut rand::rng()),
    }

    debug!(dir = %dir.display(), count = entries.len(), %ordering, "Playlist built");
    Ok(entries)
}
