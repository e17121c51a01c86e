//! Timeline composition.
//!
//! The visual track is laid end to end with no gaps: optional title card,
//! report frames, then the chart frames sharing the narrated time equally.
//! Narration clips play back to back after the lead-in (title + reports), each
//! followed by a fixed gap, and subtitles mirror their intervals. The total
//! length is therefore fixed by the narration alone.

use std::path::PathBuf;

use serde::Serialize;
use tracing::debug;

use crate::{errors::CompositionError, narration::NarrationClip};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComposerSettings {
    /// Title card length in seconds.
    pub title_duration: f64,
    /// Opacity of the image behind the title caption.
    pub title_opacity: f64,
    /// Display time of each report frame.
    pub report_duration: f64,
    /// Silence after every narration clip.
    pub subtitle_gap: f64,
    pub background_audio: Option<PathBuf>,
    pub background_volume: f64,
}

impl Default for ComposerSettings {
    fn default() -> Self {
        Self {
            title_duration: 3.0,
            title_opacity: 0.3,
            report_duration: 3.0,
            subtitle_gap: 0.2,
            background_audio: None,
            background_volume: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualKind {
    Title,
    Report,
    Chart,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisualEntry {
    pub kind: VisualKind,
    pub asset: PathBuf,
    pub start: f64,
    pub end: f64,
    pub opacity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtitleEntry {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioEntry {
    pub asset: PathBuf,
    pub start: f64,
    /// Playing time; background audio is looped or cut to fit.
    pub duration: f64,
    pub volume: f64,
    pub looped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimedComposition {
    pub visuals: Vec<VisualEntry>,
    pub subtitles: Vec<SubtitleEntry>,
    /// Background audio first (if any), then narration in order.
    pub audio: Vec<AudioEntry>,
    pub title_caption: Option<SubtitleEntry>,
    pub duration: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CompositionInput<'a> {
    pub title: Option<&'a str>,
    pub report_frames: &'a [PathBuf],
    pub chart_frames: &'a [PathBuf],
    pub clips: &'a [NarrationClip],
}

fn check(what: &'static str, value: f64) -> Result<f64, CompositionError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(CompositionError::InvalidDuration { what, value })
    }
}

pub fn compose(settings: &ComposerSettings, input: CompositionInput<'_>) -> Result<TimedComposition, CompositionError> {
    if input.clips.is_empty() {
        return Err(CompositionError::EmptyNarration);
    }
    let Some(first_chart) = input.chart_frames.first() else {
        return Err(CompositionError::NoFrames);
    };
    let title_duration = check("title", settings.title_duration)?;
    let report_duration = check("report", settings.report_duration)?;
    let gap = check("subtitle gap", settings.subtitle_gap)?;

    let mut visuals = Vec::new();
    let mut cursor = 0.0;

    let title = input.title.map(str::trim).filter(|t| !t.is_empty());
    let title_caption = title.map(|text| {
        let backdrop = input.report_frames.first().unwrap_or(first_chart);
        visuals.push(VisualEntry {
            kind: VisualKind::Title,
            asset: backdrop.clone(),
            start: 0.0,
            end: title_duration,
            opacity: settings.title_opacity,
        });
        cursor = title_duration;
        SubtitleEntry {
            text: text.to_owned(),
            start: 0.0,
            end: title_duration,
        }
    });

    for frame in input.report_frames {
        visuals.push(VisualEntry {
            kind: VisualKind::Report,
            asset: frame.clone(),
            start: cursor,
            end: cursor + report_duration,
            opacity: 1.0,
        });
        cursor += report_duration;
    }
    let lead_in = cursor;

    let mut subtitles = Vec::with_capacity(input.clips.len());
    let mut audio = Vec::with_capacity(input.clips.len() + 1);
    let mut spoken = 0.0;
    for clip in input.clips {
        let duration = check("narration clip", clip.duration)?;
        let start = lead_in + spoken;
        spoken += duration + gap;
        subtitles.push(SubtitleEntry {
            text: clip.text.clone(),
            start,
            end: lead_in + spoken,
        });
        audio.push(AudioEntry {
            asset: clip.path.clone(),
            start,
            duration,
            volume: 1.0,
            looped: false,
        });
    }
    let total = lead_in + spoken;

    let count = input.chart_frames.len();
    let share = spoken / count as f64;
    for (i, frame) in input.chart_frames.iter().enumerate() {
        let end = if i + 1 == count {
            total
        } else {
            lead_in + share * (i + 1) as f64
        };
        visuals.push(VisualEntry {
            kind: VisualKind::Chart,
            asset: frame.clone(),
            start: lead_in + share * i as f64,
            end,
            opacity: 1.0,
        });
    }

    if let Some(background) = &settings.background_audio {
        audio.insert(
            0,
            AudioEntry {
                asset: background.clone(),
                start: 0.0,
                duration: total,
                volume: settings.background_volume,
                looped: true,
            },
        );
    }

    debug!(
        duration = total,
        visuals = visuals.len(),
        subtitles = subtitles.len(),
        "timeline composed"
    );

    Ok(TimedComposition {
        visuals,
        subtitles,
        audio,
        title_caption,
        duration: total,
    })
}
