//! Narrated kline videos from market data.
//!
//! [`config`] loads the run configuration; [`pipeline`] wires the data
//! provider, chart renderer, speech synthesizer and encoder into one run.

pub mod config;
pub mod pipeline;

pub use config::{Config, load_config_path, load_config_str};
pub use pipeline::{Pipeline, PipelineError, RunLayout, RunOutcome, RunSummary, VideoRequest};
