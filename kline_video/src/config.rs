//! Run configuration loaded from one TOML document.
//!
//! Every section and field is optional; an empty document yields
//! [`Config::default`]. Unknown keys are rejected so typos surface early.
//!
//! ```toml
//! output_dir = "output"
//!
//! [chart]
//! mode = "windows"
//! workers = 4
//! [chart.windows]
//! length = 100
//! step = 3
//!
//! [video.subtitle]
//! interval = 0.2
//!
//! [narration]
//! voice = "zh-CN-YunxiNeural"
//! ```
//!
//! Entrypoints: [`load_config_str`], [`load_config_path`] and
//! [`default_config_path`] for the `KLINE_VIDEO_CONFIG` fallback.

use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, bail, ensure};
use frame_planner::{PlanError, PlannerKind, WindowPlanner};
use plan_executor::echarts::EchartsSettings;
use serde::{Deserialize, Serialize};
use shared_utils::env::get_env_var;
use timeline::{ComposerSettings, RetryPolicy, encoder::EncodeSettings};

/// Names the config file used when `--config` is not given.
pub const CONFIG_ENV_VAR: &str = "KLINE_VIDEO_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Root of `<symbol>/<period>/...` run directories.
    pub output_dir: PathBuf,
    pub chart: ChartCfg,
    pub video: VideoCfg,
    pub narration: NarrationCfg,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            chart: ChartCfg::default(),
            video: VideoCfg::default(),
            narration: NarrationCfg::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChartCfg {
    pub mode: PlannerKind,
    pub windows: WindowsCfg,
    pub workers: usize,
    pub width: u32,
    pub height: u32,
    pub js_host: String,
    pub pixel_ratio: u32,
    /// Headless snapshot program and arguments with `{html}`, `{image}`,
    /// `{width}`, `{height}` and `{pixel_ratio}` placeholders.
    pub snapshot_command: Vec<String>,
}

impl Default for ChartCfg {
    fn default() -> Self {
        Self {
            mode: PlannerKind::default(),
            windows: WindowsCfg::default(),
            workers: 4,
            width: 960,
            height: 540,
            js_host: "https://assets.pyecharts.org/assets/v5/".into(),
            pixel_ratio: 2,
            snapshot_command: [
                "chromium",
                "--headless",
                "--disable-gpu",
                "--hide-scrollbars",
                "--screenshot={image}",
                "--window-size={width},{height}",
                "--force-device-scale-factor={pixel_ratio}",
                "file://{html}",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowsCfg {
    pub length: usize,
    pub step: usize,
}

impl Default for WindowsCfg {
    fn default() -> Self {
        Self { length: 100, step: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VideoCfg {
    pub fps: u32,
    pub codec: String,
    pub threads: u32,
    pub width: u32,
    pub height: u32,
    pub background_audio: Option<PathBuf>,
    pub background_audio_volume: f64,
    pub title: TitleCfg,
    pub report: IntervalCfg,
    pub subtitle: IntervalCfg,
}

impl Default for VideoCfg {
    fn default() -> Self {
        Self {
            fps: 24,
            codec: "libx264".into(),
            threads: 4,
            width: 1920,
            height: 1080,
            background_audio: None,
            background_audio_volume: 0.2,
            title: TitleCfg::default(),
            report: IntervalCfg { interval: 3.0 },
            subtitle: IntervalCfg { interval: 0.2 },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TitleCfg {
    pub interval: f64,
    pub bg_image_opacity: f64,
}

impl Default for TitleCfg {
    fn default() -> Self {
        Self {
            interval: 3.0,
            bg_image_opacity: 0.3,
        }
    }
}

/// A duration in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntervalCfg {
    pub interval: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NarrationCfg {
    pub voice: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Show the first sentence of the script as the title instead of narrating it.
    pub title_from_first_sentence: bool,
}

impl Default for NarrationCfg {
    fn default() -> Self {
        Self {
            voice: "zh-CN-YunxiNeural".into(),
            max_retries: 3,
            retry_delay_ms: 3000,
            title_from_first_sentence: false,
        }
    }
}

fn ensure_seconds(what: &str, value: f64) -> anyhow::Result<()> {
    if !(value.is_finite() && value >= 0.0) {
        bail!("{what} must be a finite number of seconds >= 0, got {value}");
    }
    Ok(())
}

fn ensure_unit(what: &str, value: f64) -> anyhow::Result<()> {
    if !(0.0..=1.0).contains(&value) {
        bail!("{what} must be within [0, 1], got {value}");
    }
    Ok(())
}

impl Config {
    /// Checks the ranges serde cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        let chart = &self.chart;
        ensure!(chart.workers >= 1, "chart.workers must be at least 1");
        ensure!(chart.windows.length >= 1, "chart.windows.length must be at least 1");
        ensure!(chart.windows.step >= 1, "chart.windows.step must be at least 1");
        ensure!(chart.width > 0 && chart.height > 0, "chart size must be non-zero");
        ensure!(chart.pixel_ratio >= 1, "chart.pixel_ratio must be at least 1");
        ensure!(
            !chart.snapshot_command.is_empty(),
            "chart.snapshot_command must name a program"
        );

        let video = &self.video;
        ensure!(video.fps > 0, "video.fps must be positive");
        ensure!(video.width > 0 && video.height > 0, "video size must be non-zero");
        ensure_seconds("video.title.interval", video.title.interval)?;
        ensure_seconds("video.report.interval", video.report.interval)?;
        ensure_seconds("video.subtitle.interval", video.subtitle.interval)?;
        ensure_unit("video.title.bg_image_opacity", video.title.bg_image_opacity)?;
        ensure_unit("video.background_audio_volume", video.background_audio_volume)?;

        ensure!(self.narration.max_retries >= 1, "narration.max_retries must be at least 1");
        Ok(())
    }
}

impl ChartCfg {
    pub fn workers(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.workers).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn planner(&self) -> Result<Box<dyn WindowPlanner + Send + Sync>, PlanError> {
        self.mode.build(self.windows.length, self.windows.step)
    }

    pub fn echarts_settings(&self) -> EchartsSettings {
        EchartsSettings {
            width: self.width,
            height: self.height,
            js_host: self.js_host.clone(),
            pixel_ratio: self.pixel_ratio,
            snapshot_command: self.snapshot_command.clone(),
        }
    }
}

impl VideoCfg {
    pub fn composer_settings(&self) -> ComposerSettings {
        ComposerSettings {
            title_duration: self.title.interval,
            title_opacity: self.title.bg_image_opacity,
            report_duration: self.report.interval,
            subtitle_gap: self.subtitle.interval,
            background_audio: self.background_audio.clone(),
            background_volume: self.background_audio_volume,
        }
    }

    pub fn encode_settings(&self) -> EncodeSettings {
        EncodeSettings {
            fps: self.fps,
            codec: self.codec.clone(),
            threads: self.threads,
            width: self.width,
            height: self.height,
        }
    }
}

impl NarrationCfg {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

/// Parses and validates a TOML config document.
pub fn load_config_str(toml_str: &str) -> anyhow::Result<Config> {
    let config: Config = toml::from_str(toml_str).context("failed to parse config TOML")?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Reads, parses and validates a config file.
pub fn load_config_path(path: impl AsRef<Path>) -> anyhow::Result<Config> {
    let text = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("read config file {}", path.as_ref().display()))?;
    load_config_str(&text).with_context(|| format!("load config file {}", path.as_ref().display()))
}

/// The path named by `KLINE_VIDEO_CONFIG`, if set.
pub fn default_config_path() -> Option<PathBuf> {
    get_env_var(CONFIG_ENV_VAR).ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn empty_document_is_the_default() {
        let config = load_config_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.chart.mode, PlannerKind::Bg);
        assert_eq!(config.video.subtitle.interval, 0.2);
        assert_eq!(config.narration.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn sections_override_defaults() {
        let config = load_config_str(
            r#"
            output_dir = "/tmp/videos"

            [chart]
            mode = "windows"
            workers = 2
            [chart.windows]
            length = 30

            [video]
            fps = 30
            background_audio = "bgm.mp3"
            [video.title]
            interval = 2.5
            [video.report]
            interval = 4.0

            [narration]
            max_retries = 5
            retry_delay_ms = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("/tmp/videos"));
        assert_eq!(config.chart.mode, PlannerKind::Windows);
        assert_eq!(config.chart.workers().get(), 2);
        assert_eq!(config.chart.windows, WindowsCfg { length: 30, step: 3 });
        assert_eq!(config.chart.planner().unwrap().name(), "windows");

        let composer = config.video.composer_settings();
        assert_eq!(composer.title_duration, 2.5);
        assert_eq!(composer.title_opacity, 0.3);
        assert_eq!(composer.report_duration, 4.0);
        assert_eq!(composer.background_audio, Some(PathBuf::from("bgm.mp3")));
        assert_eq!(config.video.encode_settings().fps, 30);

        let policy = config.narration.retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.delay, Duration::from_millis(10));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = load_config_str("[chart]\nworkerz = 3\n").unwrap_err();
        assert!(format!("{err:#}").contains("workerz"), "{err:#}");
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        for doc in [
            "[chart]\nworkers = 0",
            "[chart.windows]\nstep = 0",
            "[chart]\nsnapshot_command = []",
            "[video.subtitle]\ninterval = -1.0",
            "[video]\nbackground_audio_volume = 1.5",
            "[narration]\nmax_retries = 0",
        ] {
            assert!(load_config_str(doc).is_err(), "accepted: {doc}");
        }
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = load_config_path("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }

    #[test]
    fn reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kline.toml");
        std::fs::write(&path, "[chart]\nmode = \"windows\"\n").unwrap();
        assert_eq!(load_config_path(&path).unwrap().chart.mode, PlannerKind::Windows);
    }

    #[test]
    #[serial]
    fn env_var_names_default_path() {
        // SAFETY: serialized with every other test touching the environment.
        unsafe { std::env::set_var(CONFIG_ENV_VAR, "/etc/kline.toml") };
        assert_eq!(default_config_path(), Some(PathBuf::from("/etc/kline.toml")));
        unsafe { std::env::remove_var(CONFIG_ENV_VAR) };
        assert_eq!(default_config_path(), None);
    }
}
