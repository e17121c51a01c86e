use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PlanError {
    #[error("Invalid axis input: max={max}, min={min}, split_count={split_count}")]
    InvalidAxisInput { max: f64, min: f64, split_count: u32 },

    #[error("Invalid planner parameter: {0}")]
    InvalidParameter(String),
}
