//! Provider abstraction for market data sources.
//!
//! This module defines the [`DataProvider`] trait, the single seam through which
//! the pipeline obtains bars. Network vendors live outside this workspace; the
//! bundled [`json_file::JsonFileProvider`] reads bars exported to disk.
//!
//! The trait is designed for async usage and supports dynamic dispatch
//! (`dyn DataProvider`) for runtime selection of providers.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use market_data::{
//!     Error,
//!     models::{bar_series::BarSeries, request_params::BarsRequest},
//!     providers::DataProvider,
//! };
//!
//! struct EmptyProvider;
//!
//! #[async_trait]
//! impl DataProvider for EmptyProvider {
//!     async fn fetch_bars(&self, request: &BarsRequest) -> Result<BarSeries, Error> {
//!         Ok(BarSeries {
//!             symbol: request.symbol.clone(),
//!             name: request.name.clone(),
//!             period: request.period,
//!             bars: vec![],
//!         })
//!     }
//! }
//! ```

pub mod json_file;

use async_trait::async_trait;

use crate::{
    errors::Error,
    models::{bar_series::BarSeries, request_params::BarsRequest},
};

/// Trait for fetching time-series bar data from a market data source.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Fetches the bars of one symbol for the requested period and date range.
    ///
    /// Returns bars in chronological order. An empty series is a valid answer.
    async fn fetch_bars(&self, request: &BarsRequest) -> Result<BarSeries, Error>;
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;

    use crate::models::period::Period;

    use super::*;

    struct EmptyProvider;
    struct FailingProvider;

    #[async_trait]
    impl DataProvider for EmptyProvider {
        async fn fetch_bars(&self, request: &BarsRequest) -> Result<BarSeries, Error> {
            Ok(BarSeries {
                symbol: request.symbol.clone(),
                name: request.name.clone(),
                period: request.period,
                bars: vec![],
            })
        }
    }

    #[async_trait]
    impl DataProvider for FailingProvider {
        async fn fetch_bars(&self, _request: &BarsRequest) -> Result<BarSeries, Error> {
            Err(Error::Provider("upstream unavailable".into()))
        }
    }

    // Chosen at runtime, which is why the pipeline stores `Box<dyn DataProvider>`.
    fn get_provider(name: &str) -> Box<dyn DataProvider> {
        if name == "empty" {
            Box::new(EmptyProvider)
        } else {
            Box::new(FailingProvider)
        }
    }

    #[tokio::test]
    async fn test_dynamic_provider() {
        let request = BarsRequest {
            symbol: "002594".into(),
            name: "BYD".into(),
            period: Period::Daily,
            start: Utc::now(),
            end: Utc::now(),
        };

        let series = get_provider("empty").fetch_bars(&request).await.unwrap();
        assert!(series.is_empty());
        assert_eq!(series.symbol, "002594");

        let err = get_provider("other").fetch_bars(&request).await.unwrap_err();
        assert!(matches!(err, Error::Provider(_)));
    }
}
