//! Unit tests for error.rs
//!
//! Tests all Error variants and their implementations (Display, Debug, Clone, std::error::Error).

use crate::error::{Error, Result};

// ============================================================================
// ERROR DISPLAY TESTS
// ============================================================================

#[test]
fn test_backend_error_display() {
    let err = Error::BackendError("vkQueueSubmit returned ERROR_DEVICE_LOST".to_string());
    let display = format!("{}", err);
    assert!(display.contains("Backend error"));
    assert!(display.contains("ERROR_DEVICE_LOST"));
}

#[test]
fn test_out_of_memory_display() {
    let err = Error::OutOfMemory;
    assert_eq!(format!("{}", err), "Out of GPU memory");
}

#[test]
fn test_allocation_failed_display() {
    let err = Error::AllocationFailed("no memory type with HOST_VISIBLE | DEVICE_LOCAL".to_string());
    let display = format!("{}", err);
    assert!(display.starts_with("Allocation failed"));
    assert!(display.contains("HOST_VISIBLE"));
}

#[test]
fn test_mapping_failed_display() {
    let err = Error::MappingFailed("memory already mapped".to_string());
    assert_eq!(format!("{}", err), "Mapping failed: memory already mapped");
}

#[test]
fn test_invalid_usage_display() {
    let err = Error::InvalidUsage("source lacks TRANSFER_SRC".to_string());
    assert!(format!("{}", err).contains("TRANSFER_SRC"));
}

#[test]
fn test_transfer_errors_display() {
    let failed = Error::TransferFailed("fence wait failed".to_string());
    assert!(format!("{}", failed).starts_with("Transfer failed"));

    let timeout = Error::TransferTimeout(1_000_000);
    assert_eq!(format!("{}", timeout), "Transfer timed out after 1000000 ns");
}

// ============================================================================
// ERROR TRAIT IMPLEMENTATIONS
// ============================================================================

#[test]
fn test_error_is_std_error() {
    let err = Error::OutOfMemory;
    let _: &dyn std::error::Error = &err;
}

#[test]
fn test_error_debug() {
    let debug = format!("{:?}", Error::InvalidResource("size".to_string()));
    assert!(debug.contains("InvalidResource"));

    let debug = format!("{:?}", Error::TransferTimeout(5));
    assert!(debug.contains("TransferTimeout"));
}

#[test]
fn test_error_clone() {
    let err1 = Error::MappingFailed("offset out of range".to_string());
    let err2 = err1.clone();
    assert_eq!(format!("{}", err1), format!("{}", err2));
}

// ============================================================================
// RESULT TYPE
// ============================================================================

#[test]
fn test_result_propagation() {
    fn inner() -> Result<u32> {
        Err(Error::InvalidUsage("destination lacks TRANSFER_DST".to_string()))
    }

    fn outer() -> Result<u32> {
        let value = inner()?;
        Ok(value + 1)
    }

    assert!(matches!(outer(), Err(Error::InvalidUsage(_))));
}
