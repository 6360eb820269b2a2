//! Unit tests for graphics_device buffer types
//!
//! Tests memory type negotiation and the opaque handle types.

use crate::graphics_device::{
    find_memory_type, BufferHandle, MemoryHandle, MemoryPropertyFlags, MemoryType,
};

fn desktop_memory_types() -> Vec<MemoryType> {
    vec![
        MemoryType::new(MemoryPropertyFlags::DEVICE_LOCAL),
        MemoryType::new(MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT),
        MemoryType::new(MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_CACHED),
        MemoryType::new(
            MemoryPropertyFlags::DEVICE_LOCAL
                | MemoryPropertyFlags::HOST_VISIBLE
                | MemoryPropertyFlags::HOST_COHERENT,
        ),
    ]
}

// ============================================================================
// MEMORY TYPE SELECTION
// ============================================================================

#[test]
fn test_find_memory_type_first_match() {
    let types = desktop_memory_types();
    let index = find_memory_type(&types, 0b1111, MemoryPropertyFlags::HOST_VISIBLE);
    assert_eq!(index, Some(1));
}

#[test]
fn test_find_memory_type_requires_full_property_set() {
    let types = desktop_memory_types();
    let index = find_memory_type(
        &types,
        0b1111,
        MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::DEVICE_LOCAL,
    );
    assert_eq!(index, Some(3));
}

#[test]
fn test_find_memory_type_respects_type_bits() {
    let types = desktop_memory_types();
    // Type 1 is excluded by the buffer's requirements
    let index = find_memory_type(&types, 0b1100, MemoryPropertyFlags::HOST_VISIBLE);
    assert_eq!(index, Some(2));
}

#[test]
fn test_find_memory_type_none_when_unsatisfiable() {
    let types = desktop_memory_types();
    let index = find_memory_type(
        &types,
        0b0011,
        MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_CACHED,
    );
    assert_eq!(index, None);

    let empty: Vec<MemoryType> = Vec::new();
    assert_eq!(find_memory_type(&empty, u32::MAX, MemoryPropertyFlags::DEVICE_LOCAL), None);
}

// ============================================================================
// HANDLES
// ============================================================================

#[test]
fn test_handles_round_trip_raw_values() {
    let buffer = BufferHandle::from_raw(0xDEAD_BEEF);
    assert_eq!(buffer.as_raw(), 0xDEAD_BEEF);
    assert!(!buffer.is_null());

    let memory = MemoryHandle::from_raw(42);
    assert_eq!(memory.as_raw(), 42);
    assert!(MemoryHandle::null().is_null());
    assert!(BufferHandle::null().is_null());
}
