//! Crash-safe artifact files.
//!
//! Producers never write to an artifact's final path directly. They write to
//! the sibling `<name>.partial` path and call [`promote`] once the content is
//! complete, so the presence of the final path is a reliable "done" marker even
//! after an interrupted run. Stale partial files are discarded, never reused.

use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
};

/// Suffix appended to an artifact path while it is being written.
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Returns the in-progress path used while producing `final_path`.
pub fn partial_path(final_path: &Path) -> PathBuf {
    let mut name: OsString = final_path.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Whether `final_path` names a completed artifact (a non-empty regular file).
pub async fn is_complete(final_path: &Path) -> bool {
    match tokio::fs::metadata(final_path).await {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

/// Atomically moves a finished partial file into its final location.
///
/// Fails with `InvalidData` when the partial file is missing or empty, which
/// means the producer did not actually write anything.
pub async fn promote(partial: &Path, final_path: &Path) -> io::Result<()> {
    let meta = tokio::fs::metadata(partial).await?;
    if meta.len() == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("artifact {} is empty", partial.display()),
        ));
    }
    tokio::fs::rename(partial, final_path).await
}

/// Removes a file if it exists. Missing files are not an error.
pub async fn discard(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to discard file");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_path_appends_suffix() {
        let p = partial_path(Path::new("/tmp/images/kline_0000_0000_0001.png"));
        assert_eq!(
            p,
            PathBuf::from("/tmp/images/kline_0000_0000_0001.png.partial")
        );
    }

    #[tokio::test]
    async fn promote_moves_complete_file() {
        let dir = tempfile::tempdir().unwrap();
        let final_path = dir.path().join("a.png");
        let partial = partial_path(&final_path);
        tokio::fs::write(&partial, b"png").await.unwrap();

        assert!(!is_complete(&final_path).await);
        promote(&partial, &final_path).await.unwrap();
        assert!(is_complete(&final_path).await);
        assert!(!partial.exists());
    }

    #[tokio::test]
    async fn empty_partial_is_never_promoted() {
        let dir = tempfile::tempdir().unwrap();
        let final_path = dir.path().join("a.png");
        let partial = partial_path(&final_path);
        tokio::fs::write(&partial, b"").await.unwrap();

        let err = promote(&partial, &final_path).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(!is_complete(&final_path).await);
    }

    #[tokio::test]
    async fn discard_ignores_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        discard(&dir.path().join("nope.html")).await.unwrap();
    }
}
