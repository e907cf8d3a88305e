//! Errors surfaced to view callers.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViewError {
    #[error("invalid parameter {name}: {value} (must be at least 1)")]
    InvalidParameter { name: &'static str, value: usize },
}

/// Reject zero for a count-like parameter.
pub fn require_positive(name: &'static str, value: usize) -> Result<usize, ViewError> {
    if value == 0 {
        return Err(ViewError::InvalidParameter { name, value });
    }
    Ok(value)
}
