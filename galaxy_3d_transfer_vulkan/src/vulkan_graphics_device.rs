/// VulkanGraphicsDevice - GraphicsDevice implementation on top of ash
///
/// Every buffer gets its own `vkAllocateMemory` block. Host-visible blocks are
/// mapped whole, so flush/invalidate ranges can always be widened to
/// `nonCoherentAtomSize` without leaving the mapping.

use ash::vk;
use ash::vk::Handle;
use rustc_hash::FxHashMap;
use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use galaxy_3d_transfer::galaxy3d::{Result, Error};
use galaxy_3d_transfer::galaxy3d::render::{
    BufferHandle, BufferUsageFlags, Config, GraphicsDevice, MemoryHandle, MemoryPropertyFlags,
    MemoryRequirements, MemoryType, SyncRange,
};
use galaxy_3d_transfer::{engine_bail, engine_debug, engine_err, engine_error, engine_trace, engine_warn};

use crate::vulkan_context::{GpuContext, TransferState};

/// Bookkeeping for one vkAllocateMemory block
#[derive(Debug, Clone, Copy)]
struct MemoryBlock {
    /// Allocated size (rounded up to the atom size for non-coherent memory)
    size: u64,
    property_flags: MemoryPropertyFlags,
    /// Range handed out by map_memory (offset, size)
    mapping: Option<(u64, u64)>,
}

/// Vulkan graphics device (headless)
pub struct VulkanGraphicsDevice {
    /// Memory blocks allocated through this device
    blocks: Mutex<FxHashMap<MemoryHandle, MemoryBlock>>,

    /// Memory type table, indices match Vulkan's
    memory_types: Vec<MemoryType>,

    /// VkPhysicalDeviceLimits::nonCoherentAtomSize
    non_coherent_atom_size: u64,

    /// Fence wait limit for copies, in nanoseconds
    transfer_timeout_ns: u64,

    device_name: String,

    /// Dropped last: owns the Vulkan device and instance
    context: GpuContext,
}

impl VulkanGraphicsDevice {
    /// Create a new headless Vulkan device
    ///
    /// # Arguments
    ///
    /// * `config` - Device configuration (validation, transfer timeout)
    pub fn new(config: Config) -> Result<Self> {
        let context = GpuContext::new(&config)?;

        let (memory_types, non_coherent_atom_size, device_name) = unsafe {
            let memory_properties = context.instance
                .get_physical_device_memory_properties(context.physical_device);
            let memory_types = memory_properties
                .memory_types_as_slice()
                .iter()
                .map(|memory_type| MemoryType::new(from_vk_memory_properties(memory_type.property_flags)))
                .collect::<Vec<_>>();

            let properties = context.instance.get_physical_device_properties(context.physical_device);
            let device_name = properties
                .device_name_as_c_str()
                .ok()
                .and_then(|name| name.to_str().ok())
                .unwrap_or("Unknown")
                .to_string();

            (memory_types, properties.limits.non_coherent_atom_size.max(1), device_name)
        };

        engine_debug!("galaxy3d::vulkan", "Transfer queue family {}, {} memory types, nonCoherentAtomSize = {}",
            context.queue_family, memory_types.len(), non_coherent_atom_size);

        Ok(Self {
            blocks: Mutex::new(FxHashMap::default()),
            memory_types,
            non_coherent_atom_size,
            transfer_timeout_ns: timeout_ns(config.transfer_timeout),
            device_name,
            context,
        })
    }

    /// Name reported by the driver
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn non_coherent_atom_size(&self) -> u64 {
        self.non_coherent_atom_size
    }

    fn lock_blocks(&self) -> Result<MutexGuard<'_, FxHashMap<MemoryHandle, MemoryBlock>>> {
        self.blocks.lock()
            .map_err(|_| engine_err!("galaxy3d::vulkan", "Memory block table lock poisoned"))
    }

    fn lock_transfer(&self) -> Result<MutexGuard<'_, TransferState>> {
        self.context.transfer.lock()
            .map_err(|_| engine_err!("galaxy3d::vulkan", "Transfer state lock poisoned"))
    }

    /// Flush or invalidate the atom-aligned version of `range`
    fn sync_mapped_range(&self, memory: MemoryHandle, range: SyncRange, flush: bool) -> Result<()> {
        let blocks = self.lock_blocks()?;
        let block = match blocks.get(&memory) {
            Some(block) => block,
            None => engine_bail!("galaxy3d::vulkan", MappingFailed, "Unknown memory block {:?}", memory),
        };
        let (map_offset, map_size) = match block.mapping {
            Some(mapping) => mapping,
            None => engine_bail!("galaxy3d::vulkan", MappingFailed, "Memory block {:?} is not mapped", memory),
        };

        let (offset, size) = match range {
            SyncRange::Whole => (map_offset, block.size - map_offset),
            SyncRange::Range { offset, size } => {
                let inside = offset >= map_offset
                    && offset.checked_add(size).is_some_and(|end| end <= map_offset + map_size);
                if !inside {
                    engine_bail!("galaxy3d::vulkan", MappingFailed,
                        "Range [{}, +{}) outside of mapped range [{}, +{})", offset, size, map_offset, map_size);
                }
                (offset, size)
            }
        };

        if block.property_flags.contains(MemoryPropertyFlags::HOST_COHERENT) {
            return Ok(());
        }

        let (aligned_offset, aligned_size) = align_to_atom(offset, size, self.non_coherent_atom_size, block.size);
        let memory_range = vk::MappedMemoryRange::default()
            .memory(vk::DeviceMemory::from_raw(memory.as_raw()))
            .offset(aligned_offset)
            .size(aligned_size);

        // The whole block is mapped, so the widened range is always inside the mapping
        let result = unsafe {
            if flush {
                self.context.device.flush_mapped_memory_ranges(&[memory_range])
            } else {
                self.context.device.invalidate_mapped_memory_ranges(&[memory_range])
            }
        };
        result.map_err(|e| {
            let operation = if flush { "vkFlushMappedMemoryRanges" } else { "vkInvalidateMappedMemoryRanges" };
            logged(Error::MappingFailed(format!("{} failed: {:?}", operation, e)))
        })
    }

    /// Free the command buffer of a timed out copy once its fence signals
    unsafe fn retire_pending(&self, transfer: &mut TransferState, timeout_ns: u64) -> Result<()> {
        let Some(command_buffer) = transfer.pending else {
            return Ok(());
        };
        let device = &self.context.device;
        match device.wait_for_fences(&[transfer.fence], true, timeout_ns) {
            Ok(()) => {
                device.free_command_buffers(transfer.command_pool, &[command_buffer]);
                transfer.pending = None;
                Ok(())
            }
            Err(vk::Result::TIMEOUT) => {
                engine_error!("galaxy3d::vulkan", "Previous copy still running after {} ns", timeout_ns);
                Err(Error::TransferTimeout(timeout_ns))
            }
            Err(e) => Err(logged(Error::TransferFailed(format!("Waiting for previous copy failed: {:?}", e)))),
        }
    }

    /// Block until a timed out copy has completed
    ///
    /// Its source and destination must stay alive until then, so every
    /// buffer or memory release goes through here first.
    fn wait_pending_copy(&self) {
        let mut transfer = match self.context.transfer.lock() {
            Ok(transfer) => transfer,
            Err(poisoned) => poisoned.into_inner(),
        };
        if transfer.pending.is_none() {
            return;
        }
        engine_debug!("galaxy3d::vulkan", "Waiting for a timed out copy before releasing its resources");
        unsafe {
            if self.retire_pending(&mut transfer, u64::MAX).is_err() {
                // Fence wait failed (device lost): fall back to a full idle wait
                self.context.device.device_wait_idle().ok();
            }
        }
    }

    /// Record the copy plus a host read barrier, then submit with the transfer fence
    unsafe fn record_and_submit(
        &self,
        transfer: &TransferState,
        command_buffer: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        size: u64,
    ) -> Result<()> {
        let device = &self.context.device;
        let submit_error = |what: &str, e: vk::Result| logged(Error::TransferFailed(format!("{} failed: {:?}", what, e)));

        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        device.begin_command_buffer(command_buffer, &begin_info)
            .map_err(|e| submit_error("vkBeginCommandBuffer", e))?;

        let region = vk::BufferCopy::default()
            .src_offset(0)
            .dst_offset(0)
            .size(size);
        device.cmd_copy_buffer(command_buffer, src, dst, &[region]);

        // Make the transfer write visible to host reads after the fence wait
        let barrier = vk::BufferMemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(vk::AccessFlags::HOST_READ)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .buffer(dst)
            .offset(0)
            .size(size);
        device.cmd_pipeline_barrier(
            command_buffer,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::HOST,
            vk::DependencyFlags::empty(),
            &[],
            &[barrier],
            &[],
        );

        device.end_command_buffer(command_buffer)
            .map_err(|e| submit_error("vkEndCommandBuffer", e))?;

        device.reset_fences(&[transfer.fence])
            .map_err(|e| submit_error("vkResetFences", e))?;

        let command_buffers = [command_buffer];
        let submit_info = vk::SubmitInfo::default()
            .command_buffers(&command_buffers);
        device.queue_submit(self.context.queue, &[submit_info], transfer.fence)
            .map_err(|e| submit_error("vkQueueSubmit", e))
    }
}

impl GraphicsDevice for VulkanGraphicsDevice {
    fn memory_types(&self) -> Vec<MemoryType> {
        self.memory_types.clone()
    }

    fn create_buffer(&self, size: u64, usage: BufferUsageFlags) -> Result<(BufferHandle, MemoryRequirements)> {
        if size == 0 {
            engine_bail!("galaxy3d::vulkan", InvalidResource, "Buffer size must be > 0");
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(to_vk_buffer_usage(usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        unsafe {
            let buffer = self.context.device.create_buffer(&buffer_info, None)
                .map_err(|e| logged(allocation_error("vkCreateBuffer", e)))?;
            let requirements = self.context.device.get_buffer_memory_requirements(buffer);

            engine_trace!("galaxy3d::vulkan", "Created buffer {:#x} ({} bytes, requires {} bytes)",
                buffer.as_raw(), size, requirements.size);

            Ok((
                BufferHandle::from_raw(buffer.as_raw()),
                MemoryRequirements {
                    size: requirements.size,
                    alignment: requirements.alignment,
                    memory_type_bits: requirements.memory_type_bits,
                },
            ))
        }
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        self.wait_pending_copy();
        unsafe {
            self.context.device.destroy_buffer(vk::Buffer::from_raw(buffer.as_raw()), None);
        }
    }

    fn allocate_memory(&self, size: u64, memory_type_index: u32) -> Result<MemoryHandle> {
        let Some(memory_type) = self.memory_types.get(memory_type_index as usize) else {
            engine_bail!("galaxy3d::vulkan", AllocationFailed,
                "Memory type {} out of range ({} types)", memory_type_index, self.memory_types.len());
        };

        let allocation_size = allocation_size(size, memory_type.property_flags, self.non_coherent_atom_size);
        let allocate_info = vk::MemoryAllocateInfo::default()
            .allocation_size(allocation_size)
            .memory_type_index(memory_type_index);

        let memory = unsafe {
            self.context.device.allocate_memory(&allocate_info, None)
                .map_err(|e| logged(allocation_error("vkAllocateMemory", e)))?
        };
        let handle = MemoryHandle::from_raw(memory.as_raw());

        let mut blocks = match self.lock_blocks() {
            Ok(blocks) => blocks,
            Err(e) => {
                unsafe { self.context.device.free_memory(memory, None) };
                return Err(e);
            }
        };
        blocks.insert(handle, MemoryBlock {
            size: allocation_size,
            property_flags: memory_type.property_flags,
            mapping: None,
        });

        engine_trace!("galaxy3d::vulkan", "Allocated {} bytes from memory type {} ({:?})",
            allocation_size, memory_type_index, memory_type.property_flags);
        Ok(handle)
    }

    fn free_memory(&self, memory: MemoryHandle) {
        self.wait_pending_copy();
        let block = match self.blocks.lock() {
            Ok(mut blocks) => blocks.remove(&memory),
            Err(_) => {
                engine_error!("galaxy3d::vulkan", "Memory block table lock poisoned, leaking {:?}", memory);
                return;
            }
        };
        let Some(block) = block else {
            engine_warn!("galaxy3d::vulkan", "free_memory on unknown block {:?}", memory);
            return;
        };

        let vk_memory = vk::DeviceMemory::from_raw(memory.as_raw());
        unsafe {
            if block.mapping.is_some() {
                self.context.device.unmap_memory(vk_memory);
            }
            self.context.device.free_memory(vk_memory, None);
        }
    }

    fn bind_buffer_memory(&self, buffer: BufferHandle, memory: MemoryHandle, offset: u64) -> Result<()> {
        unsafe {
            self.context.device
                .bind_buffer_memory(
                    vk::Buffer::from_raw(buffer.as_raw()),
                    vk::DeviceMemory::from_raw(memory.as_raw()),
                    offset,
                )
                .map_err(|e| logged(allocation_error("vkBindBufferMemory", e)))
        }
    }

    fn map_memory(&self, memory: MemoryHandle, offset: u64, size: u64) -> Result<NonNull<u8>> {
        let mut blocks = self.lock_blocks()?;
        let Some(block) = blocks.get_mut(&memory) else {
            engine_bail!("galaxy3d::vulkan", MappingFailed, "Unknown memory block {:?}", memory);
        };
        if !block.property_flags.contains(MemoryPropertyFlags::HOST_VISIBLE) {
            engine_bail!("galaxy3d::vulkan", MappingFailed, "Memory block {:?} is not host-visible", memory);
        }
        if block.mapping.is_some() {
            engine_bail!("galaxy3d::vulkan", MappingFailed, "Memory block {:?} is already mapped", memory);
        }
        if size == 0 || offset.checked_add(size).map_or(true, |end| end > block.size) {
            engine_bail!("galaxy3d::vulkan", MappingFailed,
                "Range [{}, +{}) exceeds allocation of {} bytes", offset, size, block.size);
        }

        let base = unsafe {
            self.context.device
                .map_memory(
                    vk::DeviceMemory::from_raw(memory.as_raw()),
                    0,
                    vk::WHOLE_SIZE,
                    vk::MemoryMapFlags::empty(),
                )
                .map_err(|e| logged(Error::MappingFailed(format!("vkMapMemory failed: {:?}", e))))?
        };

        let Some(ptr) = NonNull::new((base as *mut u8).wrapping_add(offset as usize)) else {
            unsafe { self.context.device.unmap_memory(vk::DeviceMemory::from_raw(memory.as_raw())) };
            engine_bail!("galaxy3d::vulkan", MappingFailed, "vkMapMemory returned a null pointer");
        };
        block.mapping = Some((offset, size));
        Ok(ptr)
    }

    fn unmap_memory(&self, memory: MemoryHandle) {
        let mut blocks = match self.blocks.lock() {
            Ok(blocks) => blocks,
            Err(_) => {
                engine_error!("galaxy3d::vulkan", "Memory block table lock poisoned, {:?} stays mapped", memory);
                return;
            }
        };
        let was_mapped = blocks.get_mut(&memory).and_then(|block| block.mapping.take()).is_some();
        if was_mapped {
            unsafe {
                self.context.device.unmap_memory(vk::DeviceMemory::from_raw(memory.as_raw()));
            }
        }
    }

    fn flush_mapped_range(&self, memory: MemoryHandle, range: SyncRange) -> Result<()> {
        self.sync_mapped_range(memory, range, true)
    }

    fn invalidate_mapped_range(&self, memory: MemoryHandle, range: SyncRange) -> Result<()> {
        self.sync_mapped_range(memory, range, false)
    }

    fn copy_buffer(&self, src: BufferHandle, dst: BufferHandle, size: u64) -> Result<()> {
        let mut transfer = self.lock_transfer()?;
        let device = &self.context.device;

        unsafe {
            self.retire_pending(&mut transfer, self.transfer_timeout_ns)?;

            let alloc_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(transfer.command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffer = device.allocate_command_buffers(&alloc_info)
                .map_err(|e| logged(Error::TransferFailed(format!("vkAllocateCommandBuffers failed: {:?}", e))))?[0];

            if let Err(e) = self.record_and_submit(
                &transfer,
                command_buffer,
                vk::Buffer::from_raw(src.as_raw()),
                vk::Buffer::from_raw(dst.as_raw()),
                size,
            ) {
                device.free_command_buffers(transfer.command_pool, &[command_buffer]);
                return Err(e);
            }

            match device.wait_for_fences(&[transfer.fence], true, self.transfer_timeout_ns) {
                Ok(()) => {
                    device.free_command_buffers(transfer.command_pool, &[command_buffer]);
                    engine_trace!("galaxy3d::vulkan", "Copied {} bytes", size);
                    Ok(())
                }
                Err(vk::Result::TIMEOUT) => {
                    // Still executing: retired by the next copy, buffer release, wait_idle or drop
                    transfer.pending = Some(command_buffer);
                    engine_error!("galaxy3d::vulkan", "Copy of {} bytes timed out after {} ns",
                        size, self.transfer_timeout_ns);
                    Err(Error::TransferTimeout(self.transfer_timeout_ns))
                }
                Err(e) => {
                    transfer.pending = Some(command_buffer);
                    Err(logged(Error::TransferFailed(format!("vkWaitForFences failed: {:?}", e))))
                }
            }
        }
    }

    fn wait_idle(&self) -> Result<()> {
        // Holding the transfer lock keeps the queue externally synchronized
        let mut transfer = self.lock_transfer()?;
        unsafe {
            self.context.device.device_wait_idle()
                .map_err(|e| engine_err!("galaxy3d::vulkan", "vkDeviceWaitIdle failed: {:?}", e))?;
            if let Some(command_buffer) = transfer.pending.take() {
                self.context.device.free_command_buffers(transfer.command_pool, &[command_buffer]);
            }
        }
        Ok(())
    }
}

impl Drop for VulkanGraphicsDevice {
    fn drop(&mut self) {
        let blocks = match self.blocks.get_mut() {
            Ok(blocks) => blocks,
            Err(poisoned) => poisoned.into_inner(),
        };
        if blocks.is_empty() {
            return;
        }

        engine_warn!("galaxy3d::vulkan", "{} memory block(s) still allocated at device drop", blocks.len());
        unsafe {
            self.context.device.device_wait_idle().ok();
            for (handle, block) in blocks.drain() {
                let memory = vk::DeviceMemory::from_raw(handle.as_raw());
                if block.mapping.is_some() {
                    self.context.device.unmap_memory(memory);
                }
                self.context.device.free_memory(memory, None);
            }
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

fn logged(error: Error) -> Error {
    engine_error!("galaxy3d::vulkan", "{}", error);
    error
}

/// Out-of-memory results map to `Error::OutOfMemory`, anything else to `AllocationFailed`
pub(crate) fn allocation_error(operation: &str, result: vk::Result) -> Error {
    match result {
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => Error::OutOfMemory,
        other => Error::AllocationFailed(format!("{} failed: {:?}", operation, other)),
    }
}

pub(crate) fn to_vk_buffer_usage(usage: BufferUsageFlags) -> vk::BufferUsageFlags {
    let mut flags = vk::BufferUsageFlags::empty();
    if usage.contains(BufferUsageFlags::TRANSFER_SRC) {
        flags |= vk::BufferUsageFlags::TRANSFER_SRC;
    }
    if usage.contains(BufferUsageFlags::TRANSFER_DST) {
        flags |= vk::BufferUsageFlags::TRANSFER_DST;
    }
    if usage.contains(BufferUsageFlags::UNIFORM) {
        flags |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if usage.contains(BufferUsageFlags::STORAGE) {
        flags |= vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    if usage.contains(BufferUsageFlags::INDEX) {
        flags |= vk::BufferUsageFlags::INDEX_BUFFER;
    }
    if usage.contains(BufferUsageFlags::VERTEX) {
        flags |= vk::BufferUsageFlags::VERTEX_BUFFER;
    }
    flags
}

/// Vulkan properties outside the four tracked ones (lazily allocated, protected, ...) are dropped
pub(crate) fn from_vk_memory_properties(flags: vk::MemoryPropertyFlags) -> MemoryPropertyFlags {
    let mut properties = MemoryPropertyFlags::empty();
    if flags.contains(vk::MemoryPropertyFlags::DEVICE_LOCAL) {
        properties |= MemoryPropertyFlags::DEVICE_LOCAL;
    }
    if flags.contains(vk::MemoryPropertyFlags::HOST_VISIBLE) {
        properties |= MemoryPropertyFlags::HOST_VISIBLE;
    }
    if flags.contains(vk::MemoryPropertyFlags::HOST_COHERENT) {
        properties |= MemoryPropertyFlags::HOST_COHERENT;
    }
    if flags.contains(vk::MemoryPropertyFlags::HOST_CACHED) {
        properties |= MemoryPropertyFlags::HOST_CACHED;
    }
    properties
}

/// Widen `[offset, offset + size)` to atom boundaries, clamped to the block size
///
/// # Returns
///
/// (aligned offset, aligned size)
pub(crate) fn align_to_atom(offset: u64, size: u64, atom: u64, block_size: u64) -> (u64, u64) {
    let start = offset / atom * atom;
    let end = (offset + size).div_ceil(atom).saturating_mul(atom).min(block_size);
    (start, end - start)
}

/// Non-coherent host-visible blocks are rounded up to whole atoms
pub(crate) fn allocation_size(size: u64, properties: MemoryPropertyFlags, atom: u64) -> u64 {
    let non_coherent = properties.contains(MemoryPropertyFlags::HOST_VISIBLE)
        && !properties.contains(MemoryPropertyFlags::HOST_COHERENT);
    if non_coherent {
        size.div_ceil(atom) * atom
    } else {
        size
    }
}

/// Fence timeout in nanoseconds (None = wait forever)
pub(crate) fn timeout_ns(timeout: Option<Duration>) -> u64 {
    match timeout {
        Some(duration) => u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX),
        None => u64::MAX,
    }
}

#[cfg(test)]
#[path = "vulkan_graphics_device_tests.rs"]
mod tests;
