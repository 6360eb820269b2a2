/// ResourceBuilder - allocates device buffers bound to memory with the requested properties

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::graphics_device::{
    find_memory_type, BufferHandle, BufferUsageFlags, GraphicsDevice, MemoryHandle,
    MemoryPropertyFlags,
};
use crate::{engine_bail, engine_debug, engine_error};

/// Immutable buffer configuration
///
/// All fields are required; `build()` validates them before touching the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferConfig {
    /// Size in bytes (> 0)
    pub size: u64,
    /// Capabilities the buffer will be used for (non-empty)
    pub usage: BufferUsageFlags,
    /// Properties the backing memory type must all have (non-empty)
    pub memory_properties: MemoryPropertyFlags,
    /// Debug name used in log messages
    pub name: String,
}

impl BufferConfig {
    pub fn new(size: u64, usage: BufferUsageFlags, memory_properties: MemoryPropertyFlags) -> Self {
        Self {
            size,
            usage,
            memory_properties,
            name: "buffer".to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

// ============================================================================
// Ownership types
// ============================================================================

/// Owned device buffer handle, destroyed on drop
struct DeviceBuffer {
    device: Arc<dyn GraphicsDevice>,
    handle: BufferHandle,
}

impl Drop for DeviceBuffer {
    fn drop(&mut self) {
        self.device.destroy_buffer(self.handle);
    }
}

/// Owned device memory block, freed on drop
struct DeviceMemory {
    device: Arc<dyn GraphicsDevice>,
    handle: MemoryHandle,
}

impl Drop for DeviceMemory {
    fn drop(&mut self) {
        self.device.free_memory(self.handle);
    }
}

// ============================================================================
// BufferResource
// ============================================================================

/// A device buffer and the memory block bound to it
///
/// Exclusively owned by its creator. Dropping it destroys the buffer first,
/// then frees the memory (field order below). Map it with `map()`.
pub struct BufferResource {
    buffer: DeviceBuffer,
    memory: DeviceMemory,
    name: String,
    size: u64,
    usage: BufferUsageFlags,
    memory_properties: MemoryPropertyFlags,
    requested_properties: MemoryPropertyFlags,
    memory_type_index: u32,
}

impl BufferResource {
    /// Device the buffer was allocated on
    pub fn device(&self) -> &Arc<dyn GraphicsDevice> {
        &self.buffer.device
    }

    pub fn handle(&self) -> BufferHandle {
        self.buffer.handle
    }

    /// Backing memory handle, for callers that map the memory directly
    pub fn memory(&self) -> MemoryHandle {
        self.memory.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn usage(&self) -> BufferUsageFlags {
        self.usage
    }

    /// Actual properties of the selected memory type (a superset of the requested ones)
    pub fn memory_properties(&self) -> MemoryPropertyFlags {
        self.memory_properties
    }

    pub fn requested_properties(&self) -> MemoryPropertyFlags {
        self.requested_properties
    }

    pub fn memory_type_index(&self) -> u32 {
        self.memory_type_index
    }

    pub fn is_host_visible(&self) -> bool {
        self.memory_properties.contains(MemoryPropertyFlags::HOST_VISIBLE)
    }

    /// True when host writes/reads need no explicit flush/invalidate
    pub fn is_coherent(&self) -> bool {
        self.memory_properties.contains(MemoryPropertyFlags::HOST_COHERENT)
    }
}

impl std::fmt::Debug for BufferResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferResource")
            .field("name", &self.name)
            .field("handle", &self.buffer.handle)
            .field("memory", &self.memory.handle)
            .field("size", &self.size)
            .field("usage", &self.usage)
            .field("memory_properties", &self.memory_properties)
            .field("memory_type_index", &self.memory_type_index)
            .finish()
    }
}

// ============================================================================
// ResourceBuilder
// ============================================================================

/// Builds `BufferResource`s on a graphics device
///
/// Holds no configuration: every `build()` call is independent and
/// returns a resource fully owned by the caller.
pub struct ResourceBuilder {
    device: Arc<dyn GraphicsDevice>,
}

impl ResourceBuilder {
    pub fn new(device: Arc<dyn GraphicsDevice>) -> Self {
        Self { device }
    }

    /// Allocate a buffer, select a memory type with all requested properties and bind them
    ///
    /// # Errors
    ///
    /// - `Error::InvalidResource` if size is 0 or a flag set is empty
    /// - `Error::AllocationFailed` if no memory type satisfies the requested properties,
    ///   or the allocation/binding fails
    /// - `Error::OutOfMemory` if the device is out of memory
    ///
    /// Anything acquired before a failure is released before returning.
    pub fn build(&self, config: &BufferConfig) -> Result<BufferResource> {
        if config.size == 0 {
            engine_bail!("galaxy3d::transfer", InvalidResource,
                "Buffer '{}': size must be > 0", config.name);
        }
        if config.usage.is_empty() {
            engine_bail!("galaxy3d::transfer", InvalidResource,
                "Buffer '{}': usage flags must not be empty", config.name);
        }
        if config.memory_properties.is_empty() {
            engine_bail!("galaxy3d::transfer", InvalidResource,
                "Buffer '{}': memory properties must not be empty", config.name);
        }

        let (handle, requirements) = self.device
            .create_buffer(config.size, config.usage)
            .inspect_err(|e| engine_error!("galaxy3d::transfer",
                "Buffer '{}': creation of {} bytes failed: {}", config.name, config.size, e))?;
        let buffer = DeviceBuffer {
            device: Arc::clone(&self.device),
            handle,
        };

        let memory_types = self.device.memory_types();
        let memory_type_index = match find_memory_type(
            &memory_types,
            requirements.memory_type_bits,
            config.memory_properties,
        ) {
            Some(index) => index,
            None => {
                engine_bail!("galaxy3d::transfer", AllocationFailed,
                    "Buffer '{}': no memory type satisfies {:?} (allowed type bits {:#b})",
                    config.name, config.memory_properties, requirements.memory_type_bits);
            }
        };
        let memory_properties = memory_types[memory_type_index as usize].property_flags;

        engine_debug!("galaxy3d::transfer",
            "Buffer '{}': {} bytes, usage {:?}, memory type {} ({:?})",
            config.name, config.size, config.usage, memory_type_index, memory_properties);

        let memory_handle = self.device
            .allocate_memory(requirements.size, memory_type_index)
            .map_err(|e| {
                engine_error!("galaxy3d::transfer",
                    "Buffer '{}': allocation of {} bytes from memory type {} failed: {}",
                    config.name, requirements.size, memory_type_index, e);
                match e {
                    Error::OutOfMemory => Error::OutOfMemory,
                    other => Error::AllocationFailed(other.to_string()),
                }
            })?;
        let memory = DeviceMemory {
            device: Arc::clone(&self.device),
            handle: memory_handle,
        };

        self.device
            .bind_buffer_memory(buffer.handle, memory.handle, 0)
            .map_err(|e| {
                engine_error!("galaxy3d::transfer", "Buffer '{}': bind failed: {}", config.name, e);
                Error::AllocationFailed(e.to_string())
            })?;

        Ok(BufferResource {
            buffer,
            memory,
            name: config.name.clone(),
            size: config.size,
            usage: config.usage,
            memory_properties,
            requested_properties: config.memory_properties,
            memory_type_index,
        })
    }
}

#[cfg(test)]
#[path = "resource_builder_tests.rs"]
mod tests;
