//! Market data for kline videos: canonical bar models, the [`providers::DataProvider`]
//! abstraction and the [`indicators`] engine that enriches raw bars.

pub mod errors;
pub mod indicators;
pub mod models;
pub mod providers;

pub use errors::Error;
