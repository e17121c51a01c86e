use std::{
    collections::HashSet,
    num::NonZeroUsize,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use frame_planner::{FullReveal, PlannerKind, SlidingWindow, WindowPlanner};
use market_data::{indicators::enrich, models::{bar::Bar, period::Period}};
use plan_executor::{
    ChunkScheduler, RenderError, SessionError,
    artifact::FrameStore,
    chart_frame::{ChartContext, ChartFrame},
    renderer::{ChartRenderer, RenderSession},
};

#[derive(Default)]
struct Calls {
    opened: AtomicUsize,
    closed: AtomicUsize,
    documents: AtomicUsize,
    snapshots: AtomicUsize,
}

/// Writes placeholder files and fails snapshots for the listed sequences.
struct MockSession {
    calls: Arc<Calls>,
    fail_on: HashSet<usize>,
    fail_document_on: HashSet<usize>,
    panic_on: HashSet<usize>,
}

fn sequence_of(document: &Path) -> usize {
    let name = document.file_name().unwrap().to_str().unwrap();
    name["render_".len().."render_".len() + 4].parse().unwrap()
}

#[async_trait]
impl RenderSession for MockSession {
    async fn render_document(&self, frame: &ChartFrame, document: &Path) -> Result<(), SessionError> {
        self.calls.documents.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(document, frame.subtitle.as_bytes())
            .await
            .map_err(|source| SessionError::SessionIo {
                path: document.to_path_buf(),
                source,
            })?;
        let sequence = sequence_of(document);
        if self.fail_document_on.contains(&sequence) {
            return Err(SessionError::Command {
                command: "mock".into(),
                message: format!("bad template at {sequence}"),
            });
        }
        Ok(())
    }

    async fn snapshot(&self, document: &Path, image: &Path) -> Result<(), SessionError> {
        self.calls.snapshots.fetch_add(1, Ordering::SeqCst);
        let sequence = sequence_of(document);
        if self.panic_on.contains(&sequence) {
            panic!("renderer crashed at {sequence}");
        }
        if self.fail_on.contains(&sequence) {
            // leave a half-written image behind, like a crashed browser would
            tokio::fs::write(image, b"pn").await.unwrap();
            return Err(SessionError::Command {
                command: "mock".into(),
                message: format!("boom at {sequence}"),
            });
        }
        tokio::fs::write(image, b"png").await.unwrap();
        Ok(())
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.calls.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MockRenderer {
    calls: Arc<Calls>,
    fail_on: HashSet<usize>,
    fail_document_on: HashSet<usize>,
    panic_on: HashSet<usize>,
}

impl MockRenderer {
    fn new(fail_on: &[usize]) -> Self {
        Self {
            calls: Arc::new(Calls::default()),
            fail_on: fail_on.iter().copied().collect(),
            fail_document_on: HashSet::new(),
            panic_on: HashSet::new(),
        }
    }

    fn failing_documents(mut self, sequences: &[usize]) -> Self {
        self.fail_document_on = sequences.iter().copied().collect();
        self
    }

    fn panicking(mut self, sequences: &[usize]) -> Self {
        self.panic_on = sequences.iter().copied().collect();
        self
    }
}

#[async_trait]
impl ChartRenderer for MockRenderer {
    async fn open_session(&self) -> Result<Arc<dyn RenderSession>, SessionError> {
        self.calls.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockSession {
            calls: self.calls.clone(),
            fail_on: self.fail_on.clone(),
            fail_document_on: self.fail_document_on.clone(),
            panic_on: self.panic_on.clone(),
        }))
    }
}

fn five_bars() -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    [
        (10.0, 12.0, 9.0, 11.0, 100.0),
        (11.0, 13.0, 10.0, 12.0, 120.0),
        (12.0, 14.0, 11.0, 13.0, 90.0),
        (13.0, 15.0, 12.0, 14.0, 150.0),
        (14.0, 16.0, 13.0, 15.0, 130.0),
    ]
    .iter()
    .enumerate()
    .map(|(i, &(open, high, low, close, volume))| Bar {
        timestamp: start + Duration::days(i as i64),
        open,
        high,
        low,
        close,
        volume,
    })
    .collect()
}

fn context(bars: &[Bar], mode: PlannerKind) -> Arc<ChartContext> {
    let enriched = enrich(bars).unwrap();
    Arc::new(ChartContext::new("Demo", Period::Daily, &enriched, mode).unwrap())
}

fn file_names(paths: &[std::path::PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_str().unwrap().to_owned())
        .collect()
}

fn workers(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

#[tokio::test]
async fn five_bar_full_reveal_produces_six_ordered_frames() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = ChunkScheduler::new(workers(1), FrameStore::new(dir.path()));
    let renderer = MockRenderer::new(&[]);
    let plan = FullReveal.plan(5);

    let report = scheduler
        .run(&renderer, context(&five_bars(), PlannerKind::Bg), &plan)
        .await
        .unwrap();

    assert!(report.is_complete());
    insta::assert_snapshot!(file_names(&report.image_paths()).join("\n"), @r"
    kline_0000_0000_0000.png
    kline_0001_0000_0001.png
    kline_0002_0000_0002.png
    kline_0003_0000_0003.png
    kline_0004_0000_0004.png
    kline_0005_0000_0005.png
    ");
    assert_eq!(renderer.calls.opened.load(Ordering::SeqCst), 1);
    assert_eq!(renderer.calls.closed.load(Ordering::SeqCst), 1);
    assert_eq!(report.rendered(), 6);

    // only final images remain: no documents, no partial files
    let mut leftovers = tokio::fs::read_dir(dir.path()).await.unwrap();
    while let Some(entry) = leftovers.next_entry().await.unwrap() {
        let name = entry.file_name().into_string().unwrap();
        assert!(name.starts_with("kline_") && name.ends_with(".png"), "{name}");
    }
}

#[tokio::test]
async fn rerun_with_full_cache_makes_no_render_calls() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = ChunkScheduler::new(workers(3), FrameStore::new(dir.path()));
    let bars: Vec<Bar> = five_bars();
    let ctx = context(&bars, PlannerKind::Windows);
    let plan = SlidingWindow::new(3, 1).unwrap().plan(bars.len());

    let first = scheduler.run(&MockRenderer::new(&[]), ctx.clone(), &plan).await.unwrap();

    let renderer = MockRenderer::new(&[]);
    let second = scheduler.run(&renderer, ctx, &plan).await.unwrap();

    assert_eq!(renderer.calls.documents.load(Ordering::SeqCst), 0);
    assert_eq!(renderer.calls.snapshots.load(Ordering::SeqCst), 0);
    assert_eq!(second.cached(), plan.len());
    assert_eq!(first.image_paths(), second.image_paths());
}

#[tokio::test]
async fn failing_window_stops_only_its_worker() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = ChunkScheduler::new(workers(2), FrameStore::new(dir.path()));
    // bucket 0 = [0, 2, 4], bucket 1 = [1, 3, 5]
    let renderer = MockRenderer::new(&[2]);
    let plan = FullReveal.plan(5);

    let report = scheduler
        .run(&renderer, context(&five_bars(), PlannerKind::Bg), &plan)
        .await
        .unwrap();

    let kept: Vec<usize> = report.frames.iter().map(|f| f.window.sequence).collect();
    assert_eq!(kept, vec![0, 1, 3, 5]);
    assert_eq!(report.skipped.iter().map(|w| w.sequence).collect::<Vec<_>>(), vec![4]);
    assert_eq!(report.failures.len(), 1);
    match &report.failures[0] {
        RenderError::Snapshot { artifact, .. } => {
            assert_eq!(artifact.to_string(), "kline_0002_0000_0002");
        }
        other => panic!("unexpected failure: {other}"),
    }
    assert_eq!(renderer.calls.closed.load(Ordering::SeqCst), 1);

    // nothing half-written for the failed window survives
    assert!(!dir.path().join("kline_0002_0000_0002.png").exists());
    assert!(!dir.path().join("kline_0002_0000_0002.png.partial").exists());

    // a retry resumes: only the failed and skipped windows are rendered
    let retry = MockRenderer::new(&[]);
    let report = scheduler
        .run(&retry, context(&five_bars(), PlannerKind::Bg), &plan)
        .await
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(retry.calls.snapshots.load(Ordering::SeqCst), 2);
    assert_eq!(report.frames.len(), 6);
}

#[tokio::test]
async fn stale_partial_image_is_not_trusted() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(dir.path().join("kline_0001_0000_0001.png.partial"), b"half")
        .await
        .unwrap();
    let scheduler = ChunkScheduler::new(workers(1), FrameStore::new(dir.path()));
    let renderer = MockRenderer::new(&[]);
    let plan = FullReveal.plan(2);

    let report = scheduler
        .run(&renderer, context(&five_bars()[..2], PlannerKind::Bg), &plan)
        .await
        .unwrap();

    assert_eq!(renderer.calls.snapshots.load(Ordering::SeqCst), 3);
    assert_eq!(report.cached(), 0);
    assert!(!dir.path().join("kline_0001_0000_0001.png.partial").exists());
}

#[tokio::test]
async fn window_outside_series_is_a_window_failure() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = ChunkScheduler::new(workers(1), FrameStore::new(dir.path()));
    let renderer = MockRenderer::new(&[]);
    // planned for more bars than the context holds
    let plan = FullReveal.plan(7);

    let report = scheduler
        .run(&renderer, context(&five_bars(), PlannerKind::Bg), &plan)
        .await
        .unwrap();

    assert_eq!(report.frames.len(), 6);
    assert!(matches!(report.failures[0], RenderError::WindowOutOfRange { len: 5, .. }));
    assert_eq!(report.skipped.len(), 1);
}

#[tokio::test]
async fn failed_document_is_removed() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = ChunkScheduler::new(workers(1), FrameStore::new(dir.path()));
    let renderer = MockRenderer::new(&[]).failing_documents(&[1]);
    let plan = FullReveal.plan(2);

    let report = scheduler
        .run(&renderer, context(&five_bars()[..2], PlannerKind::Bg), &plan)
        .await
        .unwrap();

    assert_eq!(report.frames.len(), 1);
    match &report.failures[0] {
        RenderError::Document { artifact, .. } => {
            assert_eq!(artifact.to_string(), "kline_0001_0000_0001");
        }
        other => panic!("unexpected failure: {other}"),
    }
    assert_eq!(renderer.calls.snapshots.load(Ordering::SeqCst), 1);

    let mut leftovers = tokio::fs::read_dir(dir.path()).await.unwrap();
    while let Some(entry) = leftovers.next_entry().await.unwrap() {
        let name = entry.file_name().into_string().unwrap();
        assert!(!name.ends_with(".html"), "{name}");
        assert!(!name.ends_with(".partial"), "{name}");
    }
}

#[tokio::test]
async fn aborted_worker_keeps_the_frames_it_finished() {
    let dir = tempfile::tempdir().unwrap();
    let scheduler = ChunkScheduler::new(workers(1), FrameStore::new(dir.path()));
    let renderer = MockRenderer::new(&[]).panicking(&[2]);
    let plan = FullReveal.plan(5);

    let report = scheduler
        .run(&renderer, context(&five_bars(), PlannerKind::Bg), &plan)
        .await
        .unwrap();

    let kept: Vec<usize> = report.frames.iter().map(|f| f.window.sequence).collect();
    assert_eq!(kept, vec![0, 1]);
    assert_eq!(
        report.skipped.iter().map(|w| w.sequence).collect::<Vec<_>>(),
        vec![2, 3, 4, 5]
    );
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0], RenderError::WorkerAborted { worker: 0, .. }));
    assert_eq!(renderer.calls.closed.load(Ordering::SeqCst), 1);
}
