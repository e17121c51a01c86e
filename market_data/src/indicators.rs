//! Indicator engine: raw bars in, enriched bars out.
//!
//! Everything here is a pure function of the input slice. Rolling statistics
//! are `None` until their trailing window is full; exponential averages are
//! seeded by the first value (no warm-up bias adjustment) and are therefore
//! defined from the first bar.

use crate::{
    errors::Error,
    models::{bar::Bar, bar_series::validate_bars},
};

pub const MA_WINDOWS: [usize; 4] = [5, 20, 60, 120];
pub const BOLL_WINDOW: usize = 20;
pub const BOLL_K: f64 = 2.0;
pub const EMA_FAST: usize = 12;
pub const EMA_SLOW: usize = 26;
pub const EMA_SIGNAL: usize = 9;
pub const RSI_WINDOW: usize = 14;
pub const VOLUME_WINDOWS: [usize; 2] = [5, 10];

/// A bar plus its derived indicator values.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedBar {
    pub bar: Bar,
    pub ma5: Option<f64>,
    pub ma20: Option<f64>,
    pub ma60: Option<f64>,
    pub ma120: Option<f64>,
    pub boll_mid: Option<f64>,
    pub boll_upper: Option<f64>,
    pub boll_lower: Option<f64>,
    pub ema12: f64,
    pub ema26: f64,
    /// MACD line (EMA12 − EMA26).
    pub dif: f64,
    /// Signal line: 9-span EMA of `dif`.
    pub dea: f64,
    /// Histogram: `(dif − dea) × 2`.
    pub macd: f64,
    /// `None` while the window is filling and whenever the average loss is zero.
    pub rsi14: Option<f64>,
    pub vol5: Option<f64>,
    pub vol10: Option<f64>,
}

impl EnrichedBar {
    pub fn bollinger_width(&self) -> Option<f64> {
        Some(self.boll_upper? - self.boll_lower?)
    }
}

/// Trailing simple moving average.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            (window > 0 && i + 1 >= window).then(|| {
                let slice = &values[i + 1 - window..=i];
                slice.iter().sum::<f64>() / window as f64
            })
        })
        .collect()
}

/// Trailing sample standard deviation (n − 1 denominator).
pub fn rolling_std(values: &[f64], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            (window > 1 && i + 1 >= window).then(|| {
                let slice = &values[i + 1 - window..=i];
                let mean = slice.iter().sum::<f64>() / window as f64;
                let ss: f64 = slice.iter().map(|v| (v - mean) * (v - mean)).sum();
                (ss / (window - 1) as f64).sqrt()
            })
        })
        .collect()
}

/// Exponential moving average with `alpha = 2 / (span + 1)`, seeded by the first value.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &v in values {
        let next = match prev {
            None => v,
            Some(p) => alpha * v + (1.0 - alpha) * p,
        };
        out.push(next);
        prev = Some(next);
    }
    out
}

fn rsi(avg_gain: Option<f64>, avg_loss: Option<f64>) -> Option<f64> {
    let (gain, loss) = (avg_gain?, avg_loss?);
    if loss == 0.0 {
        return None;
    }
    Some(100.0 - 100.0 / (1.0 + gain / loss))
}

/// Computes every indicator for `bars`.
///
/// Fails with [`Error::InvalidInput`] on non-finite values or timestamps that
/// are not strictly increasing.
pub fn enrich(bars: &[Bar]) -> Result<Vec<EnrichedBar>, Error> {
    validate_bars(bars)?;

    let close: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volume: Vec<f64> = bars.iter().map(|b| b.volume).collect();

    let [ma5, ma20, ma60, ma120] = MA_WINDOWS.map(|w| rolling_mean(&close, w));

    let boll_mid = rolling_mean(&close, BOLL_WINDOW);
    let boll_std = rolling_std(&close, BOLL_WINDOW);

    let ema12 = ema(&close, EMA_FAST);
    let ema26 = ema(&close, EMA_SLOW);
    let dif: Vec<f64> = ema12.iter().zip(&ema26).map(|(f, s)| f - s).collect();
    let dea = ema(&dif, EMA_SIGNAL);

    // The first bar has no previous close; it contributes zero gain and zero loss.
    let change: Vec<f64> = std::iter::once(0.0)
        .chain(close.windows(2).map(|w| w[1] - w[0]))
        .collect();
    let gain: Vec<f64> = change.iter().map(|c| c.max(0.0)).collect();
    let loss: Vec<f64> = change.iter().map(|c| (-c).max(0.0)).collect();
    let avg_gain = rolling_mean(&gain, RSI_WINDOW);
    let avg_loss = rolling_mean(&loss, RSI_WINDOW);

    let [vol5, vol10] = VOLUME_WINDOWS.map(|w| rolling_mean(&volume, w));

    let enriched = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let (upper, lower) = match (boll_mid[i], boll_std[i]) {
                (Some(mid), Some(std)) => (Some(mid + BOLL_K * std), Some(mid - BOLL_K * std)),
                _ => (None, None),
            };
            EnrichedBar {
                bar: bar.clone(),
                ma5: ma5[i],
                ma20: ma20[i],
                ma60: ma60[i],
                ma120: ma120[i],
                boll_mid: boll_mid[i],
                boll_upper: upper,
                boll_lower: lower,
                ema12: ema12[i],
                ema26: ema26[i],
                dif: dif[i],
                dea: dea[i],
                macd: (dif[i] - dea[i]) * 2.0,
                rsi14: rsi(avg_gain[i], avg_loss[i]),
                vol5: vol5[i],
                vol10: vol10[i],
            }
        })
        .collect();

    Ok(enriched)
}
