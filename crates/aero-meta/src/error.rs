use thiserror::Error;

use crate::context::ContextError;

/// Failure reported by a backend hook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("out of memory while allocating {what}")]
    OutOfMemory { what: &'static str },
    #[error("invalid {0} handle")]
    InvalidHandle(&'static str),
    #[error("unsupported backend request: {0}")]
    Unsupported(String),
}

/// Failure inside a meta operation.
///
/// None of these escape the public entry points: they are folded into the
/// context's error flag (see [`MetaError::context_error`]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetaError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("out of host memory for {0}")]
    OutOfMemory(&'static str),
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),
}

impl MetaError {
    pub fn context_error(&self) -> ContextError {
        match self {
            Self::Backend(BackendError::OutOfMemory { .. }) | Self::OutOfMemory(_) => {
                ContextError::OutOfMemory
            }
            Self::Backend(_) | Self::InvalidOperation(_) => ContextError::InvalidOperation,
        }
    }

    pub fn is_out_of_memory(&self) -> bool {
        self.context_error() == ContextError::OutOfMemory
    }
}
