use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the range coder and the models layered on it.
///
/// `StorageExhausted`, `PatchFailure` and `CorruptSymbol` are recorded as
/// sticky errors on the coder that hit them and surface when the caller
/// inspects the coder or finishes the packet. `InvalidParameter` is returned
/// immediately and leaves the coder untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Storage exhausted: {0}")]
    StorageExhausted(String),

    #[error("Corrupt symbol: {0}")]
    CorruptSymbol(String),

    #[error("Patch failed: {0}")]
    PatchFailure(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}
