use thiserror::Error;

/// The unified error type for the `market_data` crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Raw bars are malformed: missing fields, non-finite numbers or
    /// out-of-order timestamps. Never retried.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An error originating from a data provider.
    #[error("Provider error: {0}")]
    Provider(String),

    /// A generic I/O error.
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}
