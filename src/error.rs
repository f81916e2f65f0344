//! Console session errors

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsoleError {
    /// Operation called before `create` or after `destroy`
    #[error("Console session is not initialized")]
    NotInitialized,

    #[error("Console session is already initialized")]
    AlreadyInitialized,

    /// Requested size is outside what the console can display
    #[error("Unsupported console geometry: {width}x{height}")]
    UnsupportedGeometry { width: u16, height: u16 },

    #[error("Input buffer size must be at least 1 character")]
    InvalidInputBufferSize,

    /// The console refused an otherwise well-formed request
    #[error("Console rejected {operation}: {source}")]
    Platform {
        operation: &'static str,
        #[source]
        source: io::Error,
    },
}

impl ConsoleError {
    pub fn platform(operation: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| ConsoleError::Platform { operation, source }
    }
}

pub type Result<T> = std::result::Result<T, ConsoleError>;
