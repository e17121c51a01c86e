//! Renderer abstraction and the scoped render session.
//!
//! A [`ChartRenderer`] opens one [`RenderSession`] per run (for a browser-based
//! backend: one browser). The session is shared by every worker and must be
//! closed exactly once, which [`SessionGuard`] takes care of.

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use snafu::ResultExt;
use tracing::{debug, error, warn};

use crate::{
    chart_frame::ChartFrame,
    errors::{OpenSessionSnafu, RenderError, SessionError},
};

/// Factory for render sessions.
///
/// Implementations are selected at runtime, so the trait is object safe.
#[async_trait]
pub trait ChartRenderer: Send + Sync {
    async fn open_session(&self) -> Result<Arc<dyn RenderSession>, SessionError>;
}

/// A live renderer, safe to use from several workers at once.
#[async_trait]
pub trait RenderSession: Send + Sync {
    /// Writes the intermediate document describing `frame` to `document`.
    async fn render_document(&self, frame: &ChartFrame, document: &Path) -> Result<(), SessionError>;

    /// Rasterizes `document` into `image`.
    async fn snapshot(&self, document: &Path, image: &Path) -> Result<(), SessionError>;

    async fn close(&self) -> Result<(), SessionError>;
}

/// Owns an open session and closes it on every exit path.
///
/// Call [`SessionGuard::release`] to close and observe the result. A guard
/// dropped without release (early return, panic unwinding) schedules the close
/// on the current Tokio runtime instead.
pub struct SessionGuard {
    session: Arc<dyn RenderSession>,
    released: bool,
}

impl SessionGuard {
    pub async fn acquire(renderer: &dyn ChartRenderer) -> Result<Self, RenderError> {
        let session = renderer.open_session().await.context(OpenSessionSnafu)?;
        debug!("renderer session opened");
        Ok(Self {
            session,
            released: false,
        })
    }

    /// Shared handle for a worker. Workers must be joined before release.
    pub fn session(&self) -> Arc<dyn RenderSession> {
        Arc::clone(&self.session)
    }

    pub async fn release(mut self) {
        self.released = true;
        match self.session.close().await {
            Ok(()) => debug!("renderer session closed"),
            Err(e) => error!(error = %e, "failed to close renderer session"),
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let session = Arc::clone(&self.session);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = session.close().await {
                        error!(error = %e, "failed to close renderer session");
                    }
                });
            }
            Err(_) => warn!("renderer session dropped outside a runtime; it was not closed"),
        }
    }
}
