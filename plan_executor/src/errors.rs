use std::path::PathBuf;

use snafu::{Backtrace, Snafu};

use crate::artifact::ArtifactId;

/// Errors raised by a renderer backend, before window context is attached.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SessionError {
    /// The backend could not be started or is misconfigured.
    #[snafu(display("Renderer unavailable: {message}"))]
    Unavailable { message: String },

    /// Reading or writing a render file failed.
    #[snafu(display("Renderer I/O on {}: {source}", path.display()))]
    SessionIo {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The snapshot command ran but did not succeed.
    #[snafu(display("Snapshot command `{command}` failed: {message}"))]
    Command { command: String, message: String },

    /// The session was already closed.
    #[snafu(display("Renderer session is closed"))]
    Closed,
}

/// Failure to produce the frame for one window.
///
/// Every variant tied to a window carries its [`ArtifactId`], which encodes the
/// `(sequence, start, end)` triple.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RenderError {
    #[snafu(display("Failed to open renderer session: {source}"))]
    OpenSession {
        source: SessionError,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to prepare output directory {}: {source}", path.display()))]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Window {artifact} is outside a series of {len} bars"))]
    WindowOutOfRange {
        artifact: ArtifactId,
        len: usize,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to render document for {artifact}: {source}"))]
    Document {
        artifact: ArtifactId,
        source: SessionError,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to snapshot {artifact}: {source}"))]
    Snapshot {
        artifact: ArtifactId,
        source: SessionError,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to store image for {artifact}: {source}"))]
    Store {
        artifact: ArtifactId,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// The worker task itself died (panic or runtime shutdown).
    #[snafu(display("Render worker {worker} aborted: {message}"))]
    WorkerAborted {
        worker: usize,
        message: String,
        backtrace: Backtrace,
    },
}

impl RenderError {
    /// The artifact this error is about, if it concerns a single window.
    pub fn artifact(&self) -> Option<&ArtifactId> {
        match self {
            RenderError::WindowOutOfRange { artifact, .. }
            | RenderError::Document { artifact, .. }
            | RenderError::Snapshot { artifact, .. }
            | RenderError::Store { artifact, .. } => Some(artifact),
            _ => None,
        }
    }
}
