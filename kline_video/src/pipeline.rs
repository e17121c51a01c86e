//! One video run: fetch → validate → enrich → plan → render → narrate →
//! compose → encode.
//!
//! Every stage caches its artifacts under `output/<symbol>/<period>/`, so a
//! run that fails part way is resumed by running it again.

use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use frame_planner::PlanError;
use market_data::{
    indicators::enrich,
    models::{bar_series::BarSeries, period::Period, request_params::BarsRequest},
    providers::DataProvider,
};
use plan_executor::{
    ChunkScheduler, RenderError, RenderReport, artifact::FrameStore, chart_frame::ChartContext,
    renderer::ChartRenderer,
};
use shared_utils::artifact;
use thiserror::Error;
use timeline::{
    CompositionError, CompositionInput, EncodeError, NarrationError, Narrator, SpeechSynthesizer,
    TimedComposition, compose,
    encoder::{EncodeOutcome, VideoEncoder, encode_unless_exists},
    script::NarrationScript,
};
use tracing::{info, instrument, warn};

use crate::config::{ChartCfg, Config};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Market data error: {0}")]
    Data(#[from] market_data::Error),

    #[error("No bars for {symbol} in the requested range")]
    EmptySeries { symbol: String },

    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    #[error("Rendering error: {0}")]
    Render(#[from] RenderError),

    #[error("Narration error: {0}")]
    Narration(#[from] NarrationError),

    #[error("Composition error: {0}")]
    Composition(#[from] CompositionError),

    #[error("Encoding error: {0}")]
    Encode(#[from] EncodeError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Directories of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    pub root: PathBuf,
    pub images: PathBuf,
    pub audios: PathBuf,
}

impl RunLayout {
    pub fn new(output_dir: &Path, symbol: &str, period: Period) -> Self {
        let root = output_dir.join(symbol).join(period.as_str());
        Self {
            images: root.join("images"),
            audios: root.join("audios"),
            root,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VideoRequest {
    pub bars: BarsRequest,
    /// Narration text, sentences separated by `｜`.
    pub script: String,
    /// Pre-rendered report images shown before the chart.
    pub report_frames: Vec<PathBuf>,
    /// Regenerate every artifact of the run.
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub layout: RunLayout,
    pub planned_windows: usize,
    pub rendered_frames: usize,
    pub cached_frames: usize,
    /// Windows left out of the video because rendering failed or their worker stopped.
    pub excluded_windows: usize,
    pub narration_clips: usize,
    pub duration: f64,
    pub output: EncodeOutcome,
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The run's output already existed.
    Skipped(PathBuf),
    Completed(RunSummary),
}

pub struct Pipeline {
    config: Config,
    provider: Arc<dyn DataProvider>,
    renderer: Arc<dyn ChartRenderer>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    encoder: Arc<dyn VideoEncoder>,
}

impl Pipeline {
    pub fn new(
        config: Config,
        provider: Arc<dyn DataProvider>,
        renderer: Arc<dyn ChartRenderer>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        encoder: Arc<dyn VideoEncoder>,
    ) -> Self {
        Self {
            config,
            provider,
            renderer,
            synthesizer,
            encoder,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn layout(&self, request: &BarsRequest) -> RunLayout {
        RunLayout::new(&self.config.output_dir, &request.symbol, request.period)
    }

    #[instrument(skip_all, fields(symbol = %request.bars.symbol, period = %request.bars.period))]
    pub async fn run(&self, request: &VideoRequest) -> Result<RunOutcome, PipelineError> {
        let script = NarrationScript::parse(&request.script, self.config.narration.title_from_first_sentence);
        if script.is_empty() {
            return Err(CompositionError::EmptyNarration.into());
        }

        let layout = self.layout(&request.bars);
        let output = layout.root.join(self.encoder.output_file_name());

        if request.force {
            remove_dir_if_exists(&layout.root).await?;
        } else if artifact::is_complete(&output).await {
            info!(output = %output.display(), "video already exists, skipping run");
            return Ok(RunOutcome::Skipped(output));
        }

        let series = self.fetch(&request.bars).await?;
        let (planned_windows, report) = self.render(&series, &layout.images).await?;
        let chart_frames = report.image_paths();

        let narrator = Narrator::new(
            Arc::clone(&self.synthesizer),
            self.config.narration.voice.clone(),
            self.config.narration.retry_policy(),
            &layout.audios,
        )?;
        let clips = narrator.narrate(&script.sentences).await?;

        let composition = self.compose(CompositionInput {
            title: script.title.as_deref(),
            report_frames: &request.report_frames,
            chart_frames: &chart_frames,
            clips: &clips,
        })?;

        let outcome = encode_unless_exists(
            self.encoder.as_ref(),
            &composition,
            &self.config.video.encode_settings(),
            &output,
            request.force,
        )
        .await?;

        Ok(RunOutcome::Completed(RunSummary {
            layout,
            planned_windows,
            rendered_frames: report.rendered(),
            cached_frames: report.cached(),
            excluded_windows: report.failures.len() + report.skipped.len(),
            narration_clips: clips.len(),
            duration: composition.duration,
            output: outcome,
        }))
    }

    pub async fn fetch(&self, request: &BarsRequest) -> Result<BarSeries, PipelineError> {
        fetch_series(self.provider.as_ref(), request).await
    }

    pub async fn render(&self, series: &BarSeries, images_dir: &Path) -> Result<(usize, RenderReport), PipelineError> {
        render_series(&self.config.chart, self.renderer.as_ref(), series, images_dir).await
    }

    pub fn compose(&self, input: CompositionInput<'_>) -> Result<TimedComposition, PipelineError> {
        Ok(compose(&self.config.video.composer_settings(), input)?)
    }
}

/// Fetches and validates a series; an empty one is an error.
#[instrument(skip_all, fields(symbol = %request.symbol))]
pub async fn fetch_series(provider: &dyn DataProvider, request: &BarsRequest) -> Result<BarSeries, PipelineError> {
    let series = provider.fetch_bars(request).await?;
    series.validate()?;
    if series.is_empty() {
        return Err(PipelineError::EmptySeries {
            symbol: request.symbol.clone(),
        });
    }
    info!(bars = series.len(), "series fetched");
    Ok(series)
}

/// Renders every planned window of `series` into `images_dir`.
///
/// Returns the plan length with the report. Failed windows are logged and
/// left out of the report's frames; the run only fails when it cannot start.
#[instrument(skip_all, fields(bars = series.len(), mode = ?chart.mode))]
pub async fn render_series(
    chart: &ChartCfg,
    renderer: &dyn ChartRenderer,
    series: &BarSeries,
    images_dir: &Path,
) -> Result<(usize, RenderReport), PipelineError> {
    let enriched = enrich(&series.bars)?;
    let plan = chart.planner()?.plan(enriched.len());
    let context = ChartContext::new(&series.name, series.period, &enriched, chart.mode)?;

    let scheduler = ChunkScheduler::new(chart.workers(), FrameStore::new(images_dir));
    let report = scheduler.run(renderer, Arc::new(context), &plan).await?;

    if !report.is_complete() {
        for failure in &report.failures {
            warn!(error = %failure, "window excluded from the video");
        }
        warn!(
            failed = report.failures.len(),
            skipped = report.skipped.len(),
            "chart rendering incomplete; continuing with the frames that rendered"
        );
    }
    Ok((plan.len(), report))
}

async fn remove_dir_if_exists(dir: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_nests_symbol_and_period() {
        let layout = RunLayout::new(Path::new("output"), "002594", Period::Weekly);
        assert_eq!(layout.root, PathBuf::from("output/002594/weekly"));
        assert_eq!(layout.images, PathBuf::from("output/002594/weekly/images"));
        assert_eq!(layout.audios, PathBuf::from("output/002594/weekly/audios"));
    }

    #[tokio::test]
    async fn removing_a_missing_dir_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        remove_dir_if_exists(&dir.path().join("absent")).await.unwrap();

        let present = dir.path().join("present");
        tokio::fs::create_dir_all(present.join("images")).await.unwrap();
        remove_dir_if_exists(&present).await.unwrap();
        assert!(!present.exists());
    }
}
