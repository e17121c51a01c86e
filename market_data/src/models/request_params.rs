use chrono::{DateTime, Utc};

use crate::models::period::Period;

/// What to fetch from a [`DataProvider`](crate::providers::DataProvider).
#[derive(Debug, Clone, PartialEq)]
pub struct BarsRequest {
    /// Provider symbol (e.g. "002594").
    pub symbol: String,
    /// Display name carried into the resulting series.
    pub name: String,
    pub period: Period,
    /// Inclusive start.
    pub start: DateTime<Utc>,
    /// Inclusive end.
    pub end: DateTime<Utc>,
}

impl BarsRequest {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }
}
