//! Executes a window plan: turns every planned [`frame_planner::Window`] into a
//! cached chart image.
//!
//! - [`chart_frame`] slices the enriched series into per-window chart data.
//! - [`renderer`] defines the renderer/session traits and the session guard.
//! - [`echarts`] is the ECharts + headless-browser backend.
//! - [`scheduler`] fans the plan out over workers and gathers the results.

pub mod artifact;
pub mod chart_frame;
pub mod echarts;
pub mod errors;
pub mod renderer;
pub mod scheduler;

pub use errors::{RenderError, SessionError};
pub use scheduler::{ChunkScheduler, RenderReport, RenderedFrame};
