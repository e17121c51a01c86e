//! Per-window chart data handed to a renderer.
//!
//! A [`ChartContext`] is built once per run from the enriched series. It owns
//! the rounded band values and, in sliding-window mode, the axis bounds that
//! stay pinned for every frame. [`ChartContext::frame`] then slices out what a
//! single window shows.

use chrono::{DateTime, Utc};
use frame_planner::{
    PlanError, PlannerKind, Window,
    axis::{AxisBounds, PRICE_SPLIT_COUNT, VOLUME_SPLIT_COUNT, scale_nice_val},
};
use market_data::{indicators::EnrichedBar, models::period::Period};
use serde::Serialize;

/// One candle in ECharts order: `[open, close, low, high]`.
pub type Candle = [f64; 4];

/// One volume bar: `(bar index, volume, +1 rising / -1 falling)`.
pub type VolumePoint = (usize, f64, i8);

/// Faded full-series layer drawn behind the revealed prefix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Backdrop {
    pub candles: Vec<Candle>,
    pub volumes: Vec<VolumePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartFrame {
    pub title: String,
    /// `first~last` date of the x axis.
    pub subtitle: String,
    pub dates: Vec<String>,
    pub candles: Vec<Candle>,
    pub volumes: Vec<VolumePoint>,
    pub boll_lower: Vec<Option<f64>>,
    /// Upper minus lower, so the band can be drawn as a stacked area on top of `boll_lower`.
    pub boll_width: Vec<Option<f64>>,
    pub boll_mid: Vec<Option<f64>>,
    pub backdrop: Option<Backdrop>,
    pub price_axis: Option<AxisBounds>,
    pub volume_axis: Option<AxisBounds>,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round_ties_even() / 100.0
}

fn date_label(ts: DateTime<Utc>, period: Period) -> String {
    match period {
        Period::Hourly => ts.format("%Y-%m-%d %H:%M").to_string(),
        _ => ts.format("%Y-%m-%d").to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct ChartContext {
    title: String,
    mode: PlannerKind,
    dates: Vec<String>,
    candles: Vec<Candle>,
    volumes: Vec<VolumePoint>,
    boll_lower: Vec<Option<f64>>,
    boll_width: Vec<Option<f64>>,
    boll_mid: Vec<Option<f64>>,
    price_axis: Option<AxisBounds>,
    volume_axis: Option<AxisBounds>,
}

impl ChartContext {
    pub fn new(name: &str, period: Period, bars: &[EnrichedBar], mode: PlannerKind) -> Result<Self, PlanError> {
        let (price_axis, volume_axis) = if mode.pins_axes() && !bars.is_empty() {
            let (price, volume) = pinned_axes(bars)?;
            (Some(price), Some(volume))
        } else {
            (None, None)
        };

        let boll_lower: Vec<Option<f64>> = bars.iter().map(|b| b.boll_lower.map(round2)).collect();
        let boll_width = bars
            .iter()
            .zip(&boll_lower)
            .map(|(b, lower)| Some(round2(b.boll_upper? - (*lower)?)))
            .collect();

        Ok(Self {
            title: format!("{name} Boll & Kline"),
            mode,
            dates: bars.iter().map(|b| date_label(b.bar.timestamp, period)).collect(),
            candles: bars
                .iter()
                .map(|b| [b.bar.open, b.bar.close, b.bar.low, b.bar.high])
                .collect(),
            volumes: bars
                .iter()
                .enumerate()
                .map(|(i, b)| (i, b.bar.volume, if b.bar.is_rising() { 1 } else { -1 }))
                .collect(),
            boll_lower,
            boll_width,
            boll_mid: bars.iter().map(|b| b.boll_mid.map(round2)).collect(),
            price_axis,
            volume_axis,
        })
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn mode(&self) -> PlannerKind {
        self.mode
    }

    pub fn price_axis(&self) -> Option<AxisBounds> {
        self.price_axis
    }

    pub fn volume_axis(&self) -> Option<AxisBounds> {
        self.volume_axis
    }

    /// Builds the frame for `window`, or `None` if it lies outside the series.
    pub fn frame(&self, window: Window) -> Option<ChartFrame> {
        if window.start > window.end || window.end > self.len() {
            return None;
        }
        let visible = window.start..window.end;

        let frame = match self.mode {
            // Full x axis and bands; only the revealed prefix is drawn solid.
            PlannerKind::Bg => ChartFrame {
                title: self.title.clone(),
                subtitle: self.subtitle(&self.dates),
                dates: self.dates.clone(),
                candles: self.candles[visible.clone()].to_vec(),
                volumes: self.volumes[visible].to_vec(),
                boll_lower: self.boll_lower.clone(),
                boll_width: self.boll_width.clone(),
                boll_mid: self.boll_mid.clone(),
                backdrop: Some(Backdrop {
                    candles: self.candles.clone(),
                    volumes: self.volumes.clone(),
                }),
                price_axis: None,
                volume_axis: None,
            },
            PlannerKind::Windows => {
                let dates = &self.dates[visible.clone()];
                ChartFrame {
                    title: self.title.clone(),
                    subtitle: self.subtitle(dates),
                    dates: dates.to_vec(),
                    candles: self.candles[visible.clone()].to_vec(),
                    volumes: self.volumes[visible.clone()].to_vec(),
                    boll_lower: self.boll_lower[visible.clone()].to_vec(),
                    boll_width: self.boll_width[visible.clone()].to_vec(),
                    boll_mid: self.boll_mid[visible].to_vec(),
                    backdrop: None,
                    price_axis: self.price_axis,
                    volume_axis: self.volume_axis,
                }
            }
        };
        Some(frame)
    }

    fn subtitle(&self, dates: &[String]) -> String {
        match (dates.first(), dates.last()) {
            (Some(first), Some(last)) => format!("{first}~{last}"),
            _ => String::new(),
        }
    }
}

/// Price bounds cover both the candles and the Bollinger bands; volume uses
/// two splits.
fn pinned_axes(bars: &[EnrichedBar]) -> Result<(AxisBounds, AxisBounds), PlanError> {
    let high = bars.iter().map(|b| b.bar.high).fold(f64::NEG_INFINITY, f64::max);
    let low = bars.iter().map(|b| b.bar.low).fold(f64::INFINITY, f64::min);
    let mut price = scale_nice_val(high, low, PRICE_SPLIT_COUNT)?;

    let upper = bars.iter().filter_map(|b| b.boll_upper).reduce(f64::max);
    let lower = bars.iter().filter_map(|b| b.boll_lower).reduce(f64::min);
    if let (Some(upper), Some(lower)) = (upper, lower) {
        price = price.union(scale_nice_val(upper, lower, PRICE_SPLIT_COUNT)?);
    }

    let vol_max = bars.iter().map(|b| b.bar.volume).fold(f64::NEG_INFINITY, f64::max);
    let vol_min = bars.iter().map(|b| b.bar.volume).fold(f64::INFINITY, f64::min);
    let volume = scale_nice_val(vol_max, vol_min, VOLUME_SPLIT_COUNT)?;

    Ok((price, volume))
}
