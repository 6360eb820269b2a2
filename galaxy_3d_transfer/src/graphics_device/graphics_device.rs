/// GraphicsDevice trait - device interface for buffer allocation, mapping and transfers

use std::ptr::NonNull;
use std::time::Duration;

use crate::error::Result;
use crate::graphics_device::{
    BufferHandle, BufferUsageFlags, MemoryHandle, MemoryRequirements, MemoryType, SyncRange,
};

/// Validation message verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugSeverity {
    /// Only errors
    ErrorsOnly,
    /// Errors and warnings
    ErrorsAndWarnings,
    /// Everything, including info and verbose messages
    All,
}

/// Graphics device configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Application name reported to the driver
    pub app_name: String,
    /// Enable validation/debug layers
    pub enable_validation: bool,
    /// Which validation messages reach the logger
    pub debug_severity: DebugSeverity,
    /// Maximum time a transfer may take before `Error::TransferTimeout` (None = wait forever)
    pub transfer_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "Galaxy3D Application".to_string(),
            enable_validation: cfg!(debug_assertions),
            debug_severity: DebugSeverity::ErrorsAndWarnings,
            transfer_timeout: None,
        }
    }
}

/// Validation message counters reported by backends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

/// Graphics device trait
///
/// Raw handle level interface implemented by backends (e.g., VulkanGraphicsDevice).
/// Ownership of buffers and memory is expressed one level up by
/// `BufferResource`, which releases both on drop.
///
/// All calls are synchronous. `copy_buffer` is the only one that blocks on the device.
pub trait GraphicsDevice: Send + Sync {
    /// Memory type table of the device
    fn memory_types(&self) -> Vec<MemoryType>;

    /// Create an unbound buffer
    ///
    /// # Returns
    ///
    /// The buffer handle and its memory requirements
    fn create_buffer(&self, size: u64, usage: BufferUsageFlags) -> Result<(BufferHandle, MemoryRequirements)>;

    /// Destroy a buffer (its memory must be freed separately, after this call)
    fn destroy_buffer(&self, buffer: BufferHandle);

    /// Allocate `size` bytes from the given memory type
    fn allocate_memory(&self, size: u64, memory_type_index: u32) -> Result<MemoryHandle>;

    /// Free a memory block
    fn free_memory(&self, memory: MemoryHandle);

    /// Bind memory to a buffer at `offset`
    fn bind_buffer_memory(&self, buffer: BufferHandle, memory: MemoryHandle, offset: u64) -> Result<()>;

    /// Map a range of host-visible memory
    ///
    /// Fails with `Error::MappingFailed` if the block is already mapped.
    fn map_memory(&self, memory: MemoryHandle, offset: u64, size: u64) -> Result<NonNull<u8>>;

    /// Unmap a mapped memory block
    fn unmap_memory(&self, memory: MemoryHandle);

    /// Make host writes in a mapped range visible to the device
    fn flush_mapped_range(&self, memory: MemoryHandle, range: SyncRange) -> Result<()>;

    /// Make device writes in a mapped range visible to the host
    fn invalidate_mapped_range(&self, memory: MemoryHandle, range: SyncRange) -> Result<()>;

    /// Copy `size` bytes from offset 0 of `src` to offset 0 of `dst`
    ///
    /// Records a transfer command, submits it and blocks until the device signals completion.
    fn copy_buffer(&self, src: BufferHandle, dst: BufferHandle, size: u64) -> Result<()>;

    /// Wait for all device operations to complete
    fn wait_idle(&self) -> Result<()>;
}

#[cfg(test)]
#[path = "graphics_device_tests.rs"]
mod tests;
