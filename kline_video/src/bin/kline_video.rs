use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use frame_planner::PlannerKind;
use kline_video::{
    Config, RunLayout,
    config::{default_config_path, load_config_path},
    pipeline::{fetch_series, render_series},
};
use market_data::{
    models::{period::Period, request_params::BarsRequest},
    providers::json_file::JsonFileProvider,
};
use plan_executor::{artifact::FrameStore, echarts::EchartsRenderer};
use timeline::{
    CompositionInput, NarrationClip, compose,
    encoder::{EncodeOutcome, MANIFEST_FILE_NAME, ManifestEncoder, encode_unless_exists},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Kline video CLI")]
struct Cli {
    /// Config file. Falls back to $KLINE_VIDEO_CONFIG, then to built-in defaults.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print the window plan for a series length, one JSON window per line.
    Plan(PlanArgs),
    /// Render chart frames from a JSON bars file.
    Render(RenderArgs),
    /// Compose a timeline from rendered frames and narration clips.
    Compose(ComposeArgs),
}

#[derive(Args)]
struct PlanArgs {
    /// Number of bars in the series.
    #[arg(long)]
    bars: usize,
    /// `bg` or `windows`; overrides chart.mode.
    #[arg(long, value_parser = parse_mode)]
    mode: Option<PlannerKind>,
    /// Overrides chart.windows.length.
    #[arg(long)]
    length: Option<usize>,
    /// Overrides chart.windows.step.
    #[arg(long)]
    step: Option<usize>,
}

#[derive(Args)]
struct RenderArgs {
    /// JSON document of bars keyed by symbol.
    #[arg(long, value_name = "FILE")]
    bars_file: PathBuf,
    #[arg(long)]
    symbol: String,
    /// Display name for chart titles; defaults to the symbol.
    #[arg(long)]
    name: Option<String>,
    #[arg(long, default_value = "daily")]
    period: Period,
    /// First day to include (YYYY-MM-DD).
    #[arg(long)]
    start: Option<NaiveDate>,
    /// Last day to include (YYYY-MM-DD).
    #[arg(long)]
    end: Option<NaiveDate>,
}

#[derive(Args)]
struct ComposeArgs {
    /// Directory of rendered chart frames.
    #[arg(long, value_name = "DIR")]
    frames: PathBuf,
    /// JSON array of narration clips: `{index, text, path, duration}`.
    #[arg(long, value_name = "FILE")]
    narration: PathBuf,
    #[arg(long)]
    title: Option<String>,
    /// Report image shown before the chart; repeat for several.
    #[arg(long = "report", value_name = "FILE")]
    reports: Vec<PathBuf>,
    /// Where the composition manifest is written.
    #[arg(long, value_name = "FILE", default_value = MANIFEST_FILE_NAME)]
    out: PathBuf,
    /// Overwrite an existing manifest.
    #[arg(long)]
    force: bool,
}

fn parse_mode(s: &str) -> Result<PlannerKind, String> {
    match s {
        "bg" => Ok(PlannerKind::Bg),
        "windows" => Ok(PlannerKind::Windows),
        other => Err(format!("unknown mode `{other}`, expected `bg` or `windows`")),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    match path.or_else(default_config_path) {
        Some(path) => load_config_path(path),
        None => Ok(Config::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    match cli.cmd {
        Cmd::Plan(args) => plan(config, args),
        Cmd::Render(args) => render(config, args).await,
        Cmd::Compose(args) => compose_manifest(config, args).await,
    }
}

fn plan(mut config: Config, args: PlanArgs) -> Result<()> {
    let chart = &mut config.chart;
    if let Some(mode) = args.mode {
        chart.mode = mode;
    }
    if let Some(length) = args.length {
        chart.windows.length = length;
    }
    if let Some(step) = args.step {
        chart.windows.step = step;
    }

    let planner = chart.planner().context("build window planner")?;
    for window in planner.plan(args.bars) {
        println!("{}", serde_json::to_string(&window)?);
    }
    Ok(())
}

async fn render(config: Config, args: RenderArgs) -> Result<()> {
    let start = match args.start {
        Some(day) => day.and_hms_opt(0, 0, 0).context("invalid start date")?.and_utc(),
        None => DateTime::<Utc>::MIN_UTC,
    };
    let end = match args.end {
        Some(day) => day.and_hms_opt(23, 59, 59).context("invalid end date")?.and_utc(),
        None => DateTime::<Utc>::MAX_UTC,
    };
    let request = BarsRequest {
        name: args.name.unwrap_or_else(|| args.symbol.clone()),
        symbol: args.symbol,
        period: args.period,
        start,
        end,
    };

    let provider = JsonFileProvider::new(&args.bars_file);
    let series = fetch_series(&provider, &request)
        .await
        .with_context(|| format!("load bars from {}", args.bars_file.display()))?;

    let layout = RunLayout::new(&config.output_dir, &request.symbol, request.period);
    let renderer = EchartsRenderer::new(config.chart.echarts_settings());
    let (planned, report) = render_series(&config.chart, &renderer, &series, &layout.images)
        .await
        .context("render chart frames")?;

    for path in report.image_paths() {
        println!("{}", path.display());
    }
    info!(
        planned,
        rendered = report.rendered(),
        cached = report.cached(),
        dir = %layout.images.display(),
        "frames ready"
    );
    Ok(())
}

async fn compose_manifest(config: Config, args: ComposeArgs) -> Result<()> {
    let text = tokio::fs::read_to_string(&args.narration)
        .await
        .with_context(|| format!("read narration manifest {}", args.narration.display()))?;
    let clips: Vec<NarrationClip> = serde_json::from_str(&text).context("failed to parse narration manifest")?;

    let frames = FrameStore::new(&args.frames)
        .completed_images()
        .await
        .with_context(|| format!("list frames in {}", args.frames.display()))?;

    let composition = compose(
        &config.video.composer_settings(),
        CompositionInput {
            title: args.title.as_deref(),
            report_frames: &args.reports,
            chart_frames: &frames,
            clips: &clips,
        },
    )
    .context("compose timeline")?;

    let outcome = encode_unless_exists(
        &ManifestEncoder,
        &composition,
        &config.video.encode_settings(),
        &args.out,
        args.force,
    )
    .await?;

    match outcome {
        EncodeOutcome::Written(path) => info!(path = %path.display(), duration = composition.duration, "composition written"),
        EncodeOutcome::Skipped(path) => info!(path = %path.display(), "composition exists; use --force to overwrite"),
    }
    Ok(())
}
