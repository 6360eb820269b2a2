//! Error types for the Galaxy3D transfer layer
//!
//! This module defines the error types used by the buffer builder, the
//! memory synchronization helpers, the copy engine and the device backends.

use std::fmt;

/// Result type for Galaxy3D operations
pub type Result<T> = std::result::Result<T, Error>;

/// Galaxy3D errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (Vulkan, DirectX, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource configuration (zero size, empty flags, ...)
    InvalidResource(String),

    /// Initialization failed (engine, device, subsystems)
    InitializationFailed(String),

    /// No memory type satisfies the requested properties, or allocation/binding failed
    AllocationFailed(String),

    /// Mapping rejected (already mapped, out of range, not host-visible)
    MappingFailed(String),

    /// Buffer used for an operation its usage flags do not declare
    InvalidUsage(String),

    /// Transfer submission or completion failed, destination contents are undefined
    TransferFailed(String),

    /// Transfer did not complete within the configured timeout (nanoseconds)
    TransferTimeout(u64),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::AllocationFailed(msg) => write!(f, "Allocation failed: {}", msg),
            Error::MappingFailed(msg) => write!(f, "Mapping failed: {}", msg),
            Error::InvalidUsage(msg) => write!(f, "Invalid usage: {}", msg),
            Error::TransferFailed(msg) => write!(f, "Transfer failed: {}", msg),
            Error::TransferTimeout(ns) => write!(f, "Transfer timed out after {} ns", ns),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
