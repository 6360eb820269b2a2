/// Buffer and memory types shared by all graphics device backends

use bitflags::bitflags;

bitflags! {
    /// Buffer usage flags
    ///
    /// A buffer must declare every capability it is used for:
    /// a copy source needs `TRANSFER_SRC`, a copy destination `TRANSFER_DST`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsageFlags: u32 {
        /// Source of a transfer command
        const TRANSFER_SRC = 1 << 0;
        /// Destination of a transfer command
        const TRANSFER_DST = 1 << 1;
        /// Uniform/constant buffer
        const UNIFORM = 1 << 2;
        /// Storage buffer
        const STORAGE = 1 << 3;
        /// Index buffer
        const INDEX = 1 << 4;
        /// Vertex buffer
        const VERTEX = 1 << 5;
    }
}

bitflags! {
    /// Memory property flags of a device memory type
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemoryPropertyFlags: u32 {
        /// Fastest memory for device access
        const DEVICE_LOCAL = 1 << 0;
        /// Can be mapped into the host address space
        const HOST_VISIBLE = 1 << 1;
        /// Host writes/reads need no explicit flush/invalidate
        const HOST_COHERENT = 1 << 2;
        /// Cached on the host (fast host reads, usually not coherent)
        const HOST_CACHED = 1 << 3;
    }
}

/// One entry of a device's memory type table (index = position in the table)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryType {
    /// Properties of memory allocated from this type
    pub property_flags: MemoryPropertyFlags,
}

impl MemoryType {
    pub fn new(property_flags: MemoryPropertyFlags) -> Self {
        Self { property_flags }
    }
}

/// Memory requirements of a freshly created buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRequirements {
    /// Allocation size in bytes (may exceed the buffer size)
    pub size: u64,
    /// Required alignment of the bind offset
    pub alignment: u64,
    /// Bit `i` is set when memory type `i` can back the buffer
    pub memory_type_bits: u32,
}

/// Opaque buffer handle issued by a graphics device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(u64);

impl BufferHandle {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_raw(&self) -> u64 {
        self.0
    }

    pub const fn null() -> Self {
        Self(0)
    }

    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// Opaque device memory handle issued by a graphics device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryHandle(u64);

impl MemoryHandle {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_raw(&self) -> u64 {
        self.0
    }

    pub const fn null() -> Self {
        Self(0)
    }

    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// Region of a mapped memory block passed to flush/invalidate
///
/// Offsets are relative to the start of the memory block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRange {
    /// From the mapping offset to the end of the memory block
    Whole,
    /// Explicit byte range
    Range { offset: u64, size: u64 },
}

/// Find the first memory type allowed by `type_bits` whose flags contain all of `required`
///
/// # Arguments
///
/// * `memory_types` - Device memory type table
/// * `type_bits` - `MemoryRequirements::memory_type_bits` of the resource
/// * `required` - Properties that must all be present
///
/// # Returns
///
/// The memory type index, or None if no type satisfies the full property set
pub fn find_memory_type(
    memory_types: &[MemoryType],
    type_bits: u32,
    required: MemoryPropertyFlags,
) -> Option<u32> {
    memory_types
        .iter()
        .enumerate()
        .take(32)
        .find(|(index, memory_type)| {
            type_bits & (1 << index) != 0 && memory_type.property_flags.contains(required)
        })
        .map(|(index, _)| index as u32)
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
