//! Deterministic artifact naming and the on-disk frame cache.

use std::{
    fmt, io,
    path::{Path, PathBuf},
};

use frame_planner::Window;

pub const IMAGE_PREFIX: &str = "kline_";
pub const IMAGE_EXTENSION: &str = "png";
pub const DOCUMENT_PREFIX: &str = "render_";
pub const DOCUMENT_EXTENSION: &str = "html";

const MIN_PAD_WIDTH: usize = 4;

/// Zero-padding width for a run over `bar_count` bars and `frame_count`
/// planned windows, wide enough that lexicographic order is playback order.
pub fn pad_width(bar_count: usize, frame_count: usize) -> usize {
    let largest = bar_count.max(frame_count);
    let digits = largest.checked_ilog10().map_or(1, |d| d as usize + 1);
    digits.max(MIN_PAD_WIDTH)
}

/// Identifier of one window's artifacts, e.g. `kline_0003_0001_0004`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactId {
    window: Window,
    width: usize,
}

impl ArtifactId {
    pub fn new(window: Window, width: usize) -> Self {
        Self { window, width }
    }

    pub fn window(&self) -> Window {
        self.window
    }

    /// Zero-padded `{sequence}_{start}_{end}` triple.
    pub fn stem(&self) -> String {
        let w = self.width;
        format!(
            "{:0w$}_{:0w$}_{:0w$}",
            self.window.sequence, self.window.start, self.window.end
        )
    }

    pub fn image_name(&self) -> String {
        format!("{IMAGE_PREFIX}{}.{IMAGE_EXTENSION}", self.stem())
    }

    pub fn document_name(&self) -> String {
        format!("{DOCUMENT_PREFIX}{}.{DOCUMENT_EXTENSION}", self.stem())
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{IMAGE_PREFIX}{}", self.stem())
    }
}

/// Flat directory holding rendered frame images and their transient documents.
#[derive(Debug, Clone)]
pub struct FrameStore {
    dir: PathBuf,
}

impl FrameStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn image_path(&self, id: &ArtifactId) -> PathBuf {
        self.dir.join(id.image_name())
    }

    pub fn document_path(&self, id: &ArtifactId) -> PathBuf {
        self.dir.join(id.document_name())
    }

    pub async fn ensure_dir(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Completed frame images already in the store, in playback order.
    ///
    /// Partial files and intermediate documents are ignored.
    pub async fn completed_images(&self) -> io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut images = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_frame = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(IMAGE_PREFIX))
                && path.extension().is_some_and(|e| e == IMAGE_EXTENSION);
            if is_frame && shared_utils::artifact::is_complete(&path).await {
                images.push(path);
            }
        }
        images.sort();
        Ok(images)
    }
}
