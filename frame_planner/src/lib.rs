//! Pure planning for kline reveal videos.
//!
//! - [`axis`] turns a data range into "nice" pinned axis bounds.
//! - [`window`] decides which bars every output frame shows and in which order.

pub mod axis;
pub mod errors;
pub mod window;

pub use errors::PlanError;
pub use window::{FullReveal, PlannerKind, SlidingWindow, Window, WindowPlanner};
