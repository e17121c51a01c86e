//! Reads bars from a JSON export on disk.
//!
//! Expected layout, one entry per symbol:
//!
//! ```json
//! { "002594": [ { "date": "2024-01-02", "open": 10, "high": 12, "low": 9, "close": 11, "volume": 100 } ] }
//! ```
//!
//! `date` accepts `YYYY-MM-DD` (midnight UTC) or an RFC 3339 timestamp.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::{
    errors::Error,
    models::{bar::Bar, bar_series::BarSeries, request_params::BarsRequest},
    providers::DataProvider,
};

/// One raw row. Every column is optional so that a missing one is reported
/// as [`Error::InvalidInput`] with its position instead of a generic parse error.
#[derive(Debug, Deserialize)]
struct RawBar {
    date: Option<String>,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
}

pub struct JsonFileProvider {
    path: PathBuf,
}

impl JsonFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn convert(symbol: &str, index: usize, raw: RawBar) -> Result<Bar, Error> {
    let missing = |column: &str| {
        Error::InvalidInput(format!("{symbol}: bar {index} is missing `{column}`"))
    };
    let date = raw.date.ok_or_else(|| missing("date"))?;
    let timestamp = parse_date(&date).ok_or_else(|| {
        Error::InvalidInput(format!("{symbol}: bar {index} has unparseable date `{date}`"))
    })?;
    Ok(Bar {
        timestamp,
        open: raw.open.ok_or_else(|| missing("open"))?,
        high: raw.high.ok_or_else(|| missing("high"))?,
        low: raw.low.ok_or_else(|| missing("low"))?,
        close: raw.close.ok_or_else(|| missing("close"))?,
        volume: raw.volume.ok_or_else(|| missing("volume"))?,
    })
}

/// Parses a bar document and extracts `request.symbol`, filtered to the requested range.
pub fn parse_document(text: &str, request: &BarsRequest) -> Result<BarSeries, Error> {
    let mut document: IndexMap<String, Vec<RawBar>> = serde_json::from_str(text)
        .map_err(|e| Error::InvalidInput(format!("malformed bar document: {e}")))?;

    let rows = document
        .shift_remove(&request.symbol)
        .ok_or_else(|| Error::Provider(format!("symbol {} not found", request.symbol)))?;

    let mut bars = Vec::with_capacity(rows.len());
    for (i, raw) in rows.into_iter().enumerate() {
        let bar = convert(&request.symbol, i, raw)?;
        if request.contains(bar.timestamp) {
            bars.push(bar);
        }
    }

    let series = BarSeries {
        symbol: request.symbol.clone(),
        name: request.name.clone(),
        period: request.period,
        bars,
    };
    series.validate()?;
    Ok(series)
}

#[async_trait]
impl DataProvider for JsonFileProvider {
    async fn fetch_bars(&self, request: &BarsRequest) -> Result<BarSeries, Error> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        let series = parse_document(&text, request)?;
        tracing::debug!(
            symbol = %request.symbol,
            bars = series.len(),
            path = %self.path.display(),
            "loaded bars from file"
        );
        Ok(series)
    }
}
