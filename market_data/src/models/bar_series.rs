//! A collection of time-series bars for a specific symbol and period.

use crate::{
    errors::Error,
    models::{bar::Bar, period::Period},
};

/// Represents a complete set of time-series data for a single symbol.
///
/// Bars are ordered by timestamp ascending and timestamps are unique.
/// [`BarSeries::validate`] checks that contract.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    /// The symbol this data represents (e.g., "002594", "AAPL").
    pub symbol: String,
    /// Human-readable instrument name used in chart titles.
    pub name: String,
    /// The period of each bar in the series.
    pub period: Period,
    /// The collection of OHLCV bars.
    pub bars: Vec<Bar>,
}

impl BarSeries {
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Rejects non-finite prices/volumes and timestamps that are not strictly increasing.
    pub fn validate(&self) -> Result<(), Error> {
        validate_bars(&self.bars)
    }
}

pub(crate) fn validate_bars(bars: &[Bar]) -> Result<(), Error> {
    for (i, bar) in bars.iter().enumerate() {
        if !bar.is_finite() {
            return Err(Error::InvalidInput(format!(
                "bar {i} ({}) has a non-finite value",
                bar.timestamp
            )));
        }
    }
    for (i, pair) in bars.windows(2).enumerate() {
        if pair[1].timestamp <= pair[0].timestamp {
            return Err(Error::InvalidInput(format!(
                "bar {} ({}) is not after bar {i} ({})",
                i + 1,
                pair[1].timestamp,
                pair[0].timestamp
            )));
        }
    }
    Ok(())
}
