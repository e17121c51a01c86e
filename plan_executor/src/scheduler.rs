//! Scatter/gather rendering of a window plan.
//!
//! Windows are dealt round-robin into one bucket per worker. Each worker walks
//! its bucket in order on its own task, reusing cached images and rendering the
//! rest through the shared session. A failing window ends its worker only; the
//! run collects every worker's outcome and restores playback order by name.

use std::{
    num::NonZeroUsize,
    path::PathBuf,
    sync::Arc,
};

use frame_planner::Window;
use futures::future::join_all;
use shared_utils::artifact;
use snafu::{IntoError, OptionExt, ResultExt};
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::{
    artifact::{ArtifactId, FrameStore, pad_width},
    chart_frame::ChartContext,
    errors::{
        DocumentSnafu, OutputDirSnafu, RenderError, SnapshotSnafu, StoreSnafu,
        WindowOutOfRangeSnafu, WorkerAbortedSnafu,
    },
    renderer::{ChartRenderer, RenderSession, SessionGuard},
};

/// A window whose image exists in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedFrame {
    pub window: Window,
    pub artifact: ArtifactId,
    pub path: PathBuf,
    /// Found complete in the store rather than rendered by a live worker.
    pub cached: bool,
}

/// Everything a run produced, in playback order.
#[derive(Debug, Default)]
pub struct RenderReport {
    pub frames: Vec<RenderedFrame>,
    pub failures: Vec<RenderError>,
    /// Windows never attempted because their worker stopped early.
    pub skipped: Vec<Window>,
}

impl RenderReport {
    pub fn image_paths(&self) -> Vec<PathBuf> {
        self.frames.iter().map(|f| f.path.clone()).collect()
    }

    pub fn rendered(&self) -> usize {
        self.frames.iter().filter(|f| !f.cached).count()
    }

    pub fn cached(&self) -> usize {
        self.frames.iter().filter(|f| f.cached).count()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }
}

#[derive(Debug, Default)]
struct WorkerOutcome {
    frames: Vec<RenderedFrame>,
    failure: Option<RenderError>,
    skipped: Vec<Window>,
}

/// The window's image if the store already holds a complete one.
async fn stored_frame(store: &FrameStore, window: Window, width: usize) -> Option<RenderedFrame> {
    let id = ArtifactId::new(window, width);
    let image = store.image_path(&id);
    artifact::is_complete(&image).await.then(|| RenderedFrame {
        window,
        artifact: id,
        path: image,
        cached: true,
    })
}

/// Deals `windows` into `workers` buckets: window `i` goes to bucket `i % workers`.
pub fn partition(windows: &[Window], workers: NonZeroUsize) -> Vec<Vec<Window>> {
    let mut buckets = vec![Vec::new(); workers.get()];
    for (i, window) in windows.iter().enumerate() {
        buckets[i % workers.get()].push(*window);
    }
    buckets
}

pub struct ChunkScheduler {
    workers: NonZeroUsize,
    store: FrameStore,
}

impl ChunkScheduler {
    pub fn new(workers: NonZeroUsize, store: FrameStore) -> Self {
        Self { workers, store }
    }

    pub fn store(&self) -> &FrameStore {
        &self.store
    }

    /// Renders every window of `plan` that is not already cached.
    ///
    /// Returns `Err` only when the run cannot start (output directory or
    /// session). Per-window failures are reported in [`RenderReport::failures`].
    pub async fn run(
        &self,
        renderer: &dyn ChartRenderer,
        context: Arc<ChartContext>,
        plan: &[Window],
    ) -> Result<RenderReport, RenderError> {
        self.store
            .ensure_dir()
            .await
            .context(OutputDirSnafu { path: self.store.dir() })?;

        let width = pad_width(context.len(), plan.len());
        let buckets = partition(plan, self.workers);

        let guard = SessionGuard::acquire(renderer).await?;
        let handles: Vec<_> = buckets
            .iter()
            .cloned()
            .enumerate()
            .map(|(worker, bucket)| {
                let job = Job {
                    session: guard.session(),
                    context: Arc::clone(&context),
                    store: self.store.clone(),
                    width,
                };
                let span = info_span!("render_worker", worker, windows = bucket.len());
                tokio::spawn(job.run_bucket(bucket).instrument(span))
            })
            .collect();
        let results = join_all(handles).await;
        guard.release().await;

        let mut report = RenderReport::default();
        for (worker, (bucket, result)) in buckets.into_iter().zip(results).enumerate() {
            match result {
                Ok(outcome) => {
                    report.frames.extend(outcome.frames);
                    report.skipped.extend(outcome.skipped);
                    if let Some(failure) = outcome.failure {
                        report.failures.push(failure);
                    }
                }
                Err(join_error) => {
                    error!(worker, error = %join_error, "render worker aborted");
                    // The worker's own outcome is lost; recover its progress from the store.
                    for window in bucket {
                        match stored_frame(&self.store, window, width).await {
                            Some(frame) => report.frames.push(frame),
                            None => report.skipped.push(window),
                        }
                    }
                    report.failures.push(
                        WorkerAbortedSnafu {
                            worker,
                            message: join_error.to_string(),
                        }
                        .build(),
                    );
                }
            }
        }

        report.frames.sort_by(|a, b| a.path.cmp(&b.path));
        report.skipped.sort_by_key(|w| w.sequence);

        info!(
            rendered = report.rendered(),
            cached = report.cached(),
            failed = report.failures.len(),
            skipped = report.skipped.len(),
            "chart rendering finished"
        );
        Ok(report)
    }
}

/// What one worker task needs, owned so the task is `'static`.
struct Job {
    session: Arc<dyn RenderSession>,
    context: Arc<ChartContext>,
    store: FrameStore,
    width: usize,
}

impl Job {
    async fn run_bucket(self, bucket: Vec<Window>) -> WorkerOutcome {
        let mut outcome = WorkerOutcome::default();
        let mut pending = bucket.into_iter();
        while let Some(window) = pending.next() {
            match self.render_window(window).await {
                Ok(frame) => outcome.frames.push(frame),
                Err(e) => {
                    error!(artifact = ?e.artifact().map(ToString::to_string), error = %e, "window failed; stopping worker");
                    outcome.failure = Some(e);
                    outcome.skipped.extend(pending.by_ref());
                    break;
                }
            }
        }
        outcome
    }

    async fn render_window(&self, window: Window) -> Result<RenderedFrame, RenderError> {
        if let Some(frame) = stored_frame(&self.store, window, self.width).await {
            debug!(artifact = %frame.artifact, "cache hit");
            return Ok(frame);
        }
        let id = ArtifactId::new(window, self.width);
        let image = self.store.image_path(&id);

        let partial = artifact::partial_path(&image);
        if artifact::discard(&partial).await.is_err() {
            warn!(artifact = %id, "stale partial image could not be removed");
        }

        let frame = self.context.frame(window).context(WindowOutOfRangeSnafu {
            artifact: id.clone(),
            len: self.context.len(),
        })?;

        // The document is only an intermediate; it never outlives this call.
        let document = self.store.document_path(&id);
        if let Err(source) = self.session.render_document(&frame, &document).await {
            let _ = artifact::discard(&document).await;
            return Err(DocumentSnafu { artifact: id }.into_error(source));
        }
        let snapshot = self.session.snapshot(&document, &partial).await;
        let _ = artifact::discard(&document).await;

        if let Err(source) = snapshot {
            let _ = artifact::discard(&partial).await;
            return Err(SnapshotSnafu { artifact: id }.into_error(source));
        }

        artifact::promote(&partial, &image)
            .await
            .context(StoreSnafu { artifact: id.clone() })?;
        debug!(artifact = %id, "rendered");

        Ok(RenderedFrame {
            window,
            artifact: id,
            path: image,
            cached: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(n: usize) -> Vec<Window> {
        (0..n)
            .map(|i| Window {
                sequence: i,
                start: 0,
                end: i,
            })
            .collect()
    }

    #[test]
    fn partition_deals_round_robin() {
        let buckets = partition(&plan(7), NonZeroUsize::new(3).unwrap());
        let seqs: Vec<Vec<usize>> = buckets
            .iter()
            .map(|b| b.iter().map(|w| w.sequence).collect())
            .collect();
        assert_eq!(seqs, vec![vec![0, 3, 6], vec![1, 4], vec![2, 5]]);
    }

    #[test]
    fn more_workers_than_windows_leaves_empty_buckets() {
        let buckets = partition(&plan(2), NonZeroUsize::new(4).unwrap());
        assert_eq!(buckets.len(), 4);
        assert!(buckets[2].is_empty() && buckets[3].is_empty());
    }
}
