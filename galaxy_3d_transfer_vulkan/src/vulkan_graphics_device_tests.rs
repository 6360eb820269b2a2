//! Unit tests for the Vulkan conversion helpers
//!
//! These run without a GPU. Device-level behavior is covered by the
//! ignored tests in tests/vulkan_transfer_tests.rs.

use super::*;

#[test]
fn test_buffer_usage_conversion() {
    let usage = to_vk_buffer_usage(BufferUsageFlags::TRANSFER_SRC | BufferUsageFlags::STORAGE);
    assert_eq!(usage, vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::STORAGE_BUFFER);

    assert_eq!(to_vk_buffer_usage(BufferUsageFlags::TRANSFER_DST), vk::BufferUsageFlags::TRANSFER_DST);
    assert_eq!(to_vk_buffer_usage(BufferUsageFlags::UNIFORM), vk::BufferUsageFlags::UNIFORM_BUFFER);
    assert_eq!(
        to_vk_buffer_usage(BufferUsageFlags::INDEX | BufferUsageFlags::VERTEX),
        vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::VERTEX_BUFFER
    );
    assert!(to_vk_buffer_usage(BufferUsageFlags::empty()).is_empty());
}

#[test]
fn test_memory_property_conversion() {
    let flags = from_vk_memory_properties(
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    );
    assert_eq!(flags, MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT);

    let flags = from_vk_memory_properties(
        vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::LAZILY_ALLOCATED,
    );
    assert_eq!(flags, MemoryPropertyFlags::DEVICE_LOCAL);

    assert_eq!(
        from_vk_memory_properties(vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_CACHED),
        MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_CACHED
    );
}

#[test]
fn test_align_to_atom_widens_range() {
    // [10, 30) with 64-byte atoms becomes [0, 64)
    assert_eq!(align_to_atom(10, 20, 64, 4096), (0, 64));
    // [100, 200) becomes [64, 256)
    assert_eq!(align_to_atom(100, 100, 64, 4096), (64, 192));
    // Already aligned
    assert_eq!(align_to_atom(128, 64, 64, 4096), (128, 64));
}

#[test]
fn test_align_to_atom_clamps_to_block() {
    // Block of 100 bytes: end would round to 128
    assert_eq!(align_to_atom(70, 30, 64, 100), (64, 36));
    assert_eq!(align_to_atom(0, 100, 64, 100), (0, 100));
}

#[test]
fn test_align_to_atom_unit_atom_is_identity() {
    assert_eq!(align_to_atom(13, 7, 1, 4096), (13, 7));
}

#[test]
fn test_allocation_size_rounds_non_coherent_only() {
    let non_coherent = MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_CACHED;
    assert_eq!(allocation_size(100, non_coherent, 64), 128);
    assert_eq!(allocation_size(128, non_coherent, 64), 128);

    let coherent = MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT;
    assert_eq!(allocation_size(100, coherent, 64), 100);
    assert_eq!(allocation_size(100, MemoryPropertyFlags::DEVICE_LOCAL, 64), 100);
}

#[test]
fn test_timeout_conversion() {
    assert_eq!(timeout_ns(None), u64::MAX);
    assert_eq!(timeout_ns(Some(Duration::from_millis(5))), 5_000_000);
    assert_eq!(timeout_ns(Some(Duration::MAX)), u64::MAX);
}

#[test]
fn test_allocation_error_mapping() {
    assert!(matches!(
        allocation_error("vkAllocateMemory", vk::Result::ERROR_OUT_OF_DEVICE_MEMORY),
        Error::OutOfMemory
    ));
    assert!(matches!(
        allocation_error("vkAllocateMemory", vk::Result::ERROR_OUT_OF_HOST_MEMORY),
        Error::OutOfMemory
    ));
    assert!(matches!(
        allocation_error("vkBindBufferMemory", vk::Result::ERROR_INVALID_EXTERNAL_HANDLE),
        Error::AllocationFailed(ref m) if m.starts_with("vkBindBufferMemory failed")
    ));
}

#[test]
fn test_device_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<VulkanGraphicsDevice>();
}

#[test]
fn test_device_creation_succeeds_or_reports_initialization_failure() {
    // Without a Vulkan driver the context unwinds whatever it created so far
    let config = Config { enable_validation: false, ..Config::default() };
    match VulkanGraphicsDevice::new(config) {
        Ok(device) => {
            assert!(!device.memory_types().is_empty());
            device.wait_idle().unwrap();
        }
        Err(e) => assert!(matches!(e, Error::InitializationFailed(_)), "unexpected error: {}", e),
    }
}
