/// Mock graphics device for unit tests (no GPU required)
///
/// Emulates device memory in host RAM. Non-coherent memory types keep two
/// copies of every block: the device view and a host view standing in for
/// the CPU cache. Only flush (host -> device) and invalidate (device -> host)
/// move bytes between them, so skipping either shows up as stale data just
/// like on real hardware. Coherent types share a single view.

use std::ptr::NonNull;
use std::sync::Mutex;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::graphics_device::{
    BufferHandle, BufferUsageFlags, GraphicsDevice, MemoryHandle, MemoryPropertyFlags,
    MemoryRequirements, MemoryType, SyncRange,
};

/// Byte pattern of freshly allocated mock memory
pub const MOCK_UNINITIALIZED_BYTE: u8 = 0xCD;

/// Alignment reported in mock memory requirements
pub const MOCK_ALIGNMENT: u64 = 256;

/// Timeout reported by `time_out_next_copy`
pub const MOCK_TRANSFER_TIMEOUT_NS: u64 = 1_000;

// ============================================================================
// Mock state
// ============================================================================

#[derive(Debug)]
struct MockBuffer {
    size: u64,
    usage: BufferUsageFlags,
    binding: Option<(MemoryHandle, u64)>,
}

#[derive(Debug)]
struct MockMemory {
    property_flags: MemoryPropertyFlags,
    device_bytes: Box<[u8]>,
    /// Host view, only used for non-coherent memory
    host_bytes: Box<[u8]>,
    mapped: Option<(u64, u64)>,
}

impl MockMemory {
    fn is_coherent(&self) -> bool {
        self.property_flags.contains(MemoryPropertyFlags::HOST_COHERENT)
    }

    /// Resolve a sync range against the active mapping
    fn resolve(&self, range: SyncRange) -> Result<(usize, usize)> {
        let (map_offset, map_size) = self.mapped
            .ok_or_else(|| Error::MappingFailed("memory is not mapped".to_string()))?;
        let (offset, size) = match range {
            SyncRange::Whole => return Ok((map_offset as usize, self.device_bytes.len())),
            SyncRange::Range { offset, size } => (offset, size),
        };
        if offset < map_offset || offset + size > map_offset + map_size {
            return Err(Error::MappingFailed(format!(
                "range [{}, {}) outside of mapped range", offset, offset + size
            )));
        }
        Ok((offset as usize, (offset + size) as usize))
    }
}

#[derive(Debug, Default)]
struct MockState {
    next_handle: u64,
    buffers: FxHashMap<BufferHandle, MockBuffer>,
    memories: FxHashMap<MemoryHandle, MockMemory>,
    calls: Vec<String>,
    flush_count: usize,
    invalidate_count: usize,
    copy_count: usize,
    wait_idle_count: usize,
    corrupt_after_copy: Vec<usize>,
    corrupt_next_flush: Vec<usize>,
    fail_next_submit: bool,
    time_out_next_copy: bool,
    /// A timed out copy the device has not waited for yet
    pending_copy: bool,
    fail_next_allocation: bool,
    fail_next_bind: bool,
    memory_type_bits: Option<u32>,
}

impl MockState {
    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    /// Resources must outlive a timed out copy, so release waits for it first
    fn wait_pending_copy(&mut self) {
        if std::mem::take(&mut self.pending_copy) {
            self.calls.push("wait_pending_copy".to_string());
        }
    }
}

// ============================================================================
// Mock GraphicsDevice
// ============================================================================

pub struct MockGraphicsDevice {
    memory_types: Vec<MemoryType>,
    state: Mutex<MockState>,
}

impl MockGraphicsDevice {
    /// Device with one device-local type, one non-coherent host-visible type,
    /// one coherent host-visible type and one cached non-coherent type
    pub fn new() -> Self {
        Self::with_memory_types(vec![
            MemoryType::new(MemoryPropertyFlags::DEVICE_LOCAL),
            MemoryType::new(MemoryPropertyFlags::HOST_VISIBLE),
            MemoryType::new(MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_COHERENT),
            MemoryType::new(MemoryPropertyFlags::HOST_VISIBLE | MemoryPropertyFlags::HOST_CACHED),
        ])
    }

    pub fn with_memory_types(memory_types: Vec<MemoryType>) -> Self {
        Self {
            memory_types,
            state: Mutex::new(MockState::default()),
        }
    }

    // ===== Fault injection =====

    /// Flip the given destination bytes (device view) after the next copies
    pub fn corrupt_after_copy(&self, indices: Vec<usize>) {
        self.state.lock().unwrap().corrupt_after_copy = indices;
    }

    /// Flip the given device bytes right after the next flush
    pub fn corrupt_next_flush(&self, indices: Vec<usize>) {
        self.state.lock().unwrap().corrupt_next_flush = indices;
    }

    /// Let the next copy run but report a timeout, leaving it pending
    pub fn time_out_next_copy(&self) {
        self.state.lock().unwrap().time_out_next_copy = true;
    }

    /// Make the next copy submission fail
    pub fn fail_next_submit(&self) {
        self.state.lock().unwrap().fail_next_submit = true;
    }

    /// Make the next memory allocation fail with OutOfMemory
    pub fn fail_next_allocation(&self) {
        self.state.lock().unwrap().fail_next_allocation = true;
    }

    /// Make the next bind fail
    pub fn fail_next_bind(&self) {
        self.state.lock().unwrap().fail_next_bind = true;
    }

    /// Override `memory_type_bits` reported for new buffers
    pub fn set_memory_type_bits(&self, bits: u32) {
        self.state.lock().unwrap().memory_type_bits = Some(bits);
    }

    // ===== Inspection =====

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn live_buffer_count(&self) -> usize {
        self.state.lock().unwrap().buffers.len()
    }

    pub fn live_memory_count(&self) -> usize {
        self.state.lock().unwrap().memories.len()
    }

    pub fn flush_count(&self) -> usize {
        self.state.lock().unwrap().flush_count
    }

    pub fn invalidate_count(&self) -> usize {
        self.state.lock().unwrap().invalidate_count
    }

    pub fn copy_count(&self) -> usize {
        self.state.lock().unwrap().copy_count
    }

    pub fn wait_idle_count(&self) -> usize {
        self.state.lock().unwrap().wait_idle_count
    }

    pub fn has_pending_copy(&self) -> bool {
        self.state.lock().unwrap().pending_copy
    }

    pub fn is_mapped(&self, memory: MemoryHandle) -> bool {
        self.state.lock().unwrap()
            .memories
            .get(&memory)
            .is_some_and(|m| m.mapped.is_some())
    }

    /// Snapshot of what the device sees in a memory block
    pub fn device_bytes(&self, memory: MemoryHandle) -> Vec<u8> {
        self.state.lock().unwrap()
            .memories
            .get(&memory)
            .map(|m| m.device_bytes.to_vec())
            .unwrap_or_default()
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn memory_types(&self) -> Vec<MemoryType> {
        self.memory_types.clone()
    }

    fn create_buffer(&self, size: u64, usage: BufferUsageFlags) -> Result<(BufferHandle, MemoryRequirements)> {
        let mut state = self.state.lock().unwrap();
        if size == 0 {
            return Err(Error::InvalidResource("buffer size is 0".to_string()));
        }
        let handle = BufferHandle::from_raw(state.next_handle());
        state.buffers.insert(handle, MockBuffer { size, usage, binding: None });
        state.calls.push("create_buffer".to_string());

        let all_types = if self.memory_types.len() >= 32 {
            u32::MAX
        } else {
            (1u32 << self.memory_types.len()) - 1
        };
        let requirements = MemoryRequirements {
            size: size.div_ceil(MOCK_ALIGNMENT) * MOCK_ALIGNMENT,
            alignment: MOCK_ALIGNMENT,
            memory_type_bits: state.memory_type_bits.unwrap_or(all_types),
        };
        Ok((handle, requirements))
    }

    fn destroy_buffer(&self, buffer: BufferHandle) {
        let mut state = self.state.lock().unwrap();
        state.wait_pending_copy();
        state.buffers.remove(&buffer);
        state.calls.push("destroy_buffer".to_string());
    }

    fn allocate_memory(&self, size: u64, memory_type_index: u32) -> Result<MemoryHandle> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_next_allocation) {
            return Err(Error::OutOfMemory);
        }
        let memory_type = self.memory_types
            .get(memory_type_index as usize)
            .ok_or_else(|| Error::AllocationFailed(format!("invalid memory type {}", memory_type_index)))?;

        let handle = MemoryHandle::from_raw(state.next_handle());
        state.memories.insert(handle, MockMemory {
            property_flags: memory_type.property_flags,
            device_bytes: vec![MOCK_UNINITIALIZED_BYTE; size as usize].into_boxed_slice(),
            host_bytes: vec![MOCK_UNINITIALIZED_BYTE; size as usize].into_boxed_slice(),
            mapped: None,
        });
        state.calls.push("allocate_memory".to_string());
        Ok(handle)
    }

    fn free_memory(&self, memory: MemoryHandle) {
        let mut state = self.state.lock().unwrap();
        state.wait_pending_copy();
        state.memories.remove(&memory);
        state.calls.push("free_memory".to_string());
    }

    fn bind_buffer_memory(&self, buffer: BufferHandle, memory: MemoryHandle, offset: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_next_bind) {
            return Err(Error::AllocationFailed("bind rejected by mock".to_string()));
        }
        if !state.memories.contains_key(&memory) {
            return Err(Error::InvalidResource("unknown memory".to_string()));
        }
        let entry = state.buffers
            .get_mut(&buffer)
            .ok_or_else(|| Error::InvalidResource("unknown buffer".to_string()))?;
        entry.binding = Some((memory, offset));
        state.calls.push("bind_buffer_memory".to_string());
        Ok(())
    }

    fn map_memory(&self, memory: MemoryHandle, offset: u64, size: u64) -> Result<NonNull<u8>> {
        let mut state = self.state.lock().unwrap();
        let entry = state.memories
            .get_mut(&memory)
            .ok_or_else(|| Error::MappingFailed("unknown memory".to_string()))?;
        if !entry.property_flags.contains(MemoryPropertyFlags::HOST_VISIBLE) {
            return Err(Error::MappingFailed("memory is not host-visible".to_string()));
        }
        if entry.mapped.is_some() {
            return Err(Error::MappingFailed("memory is already mapped".to_string()));
        }
        if size == 0 || offset + size > entry.device_bytes.len() as u64 {
            return Err(Error::MappingFailed("range exceeds allocation".to_string()));
        }
        entry.mapped = Some((offset, size));
        let base = if entry.is_coherent() {
            entry.device_bytes.as_mut_ptr()
        } else {
            entry.host_bytes.as_mut_ptr()
        };
        state.calls.push("map_memory".to_string());
        // SAFETY: offset + size was checked against the block length
        let ptr = unsafe { base.add(offset as usize) };
        NonNull::new(ptr).ok_or_else(|| Error::MappingFailed("null mapping".to_string()))
    }

    fn unmap_memory(&self, memory: MemoryHandle) {
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.memories.get_mut(&memory) {
            entry.mapped = None;
        }
        state.calls.push("unmap_memory".to_string());
    }

    fn flush_mapped_range(&self, memory: MemoryHandle, range: SyncRange) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let entry = state.memories
            .get_mut(&memory)
            .ok_or_else(|| Error::MappingFailed("unknown memory".to_string()))?;
        let (start, end) = entry.resolve(range)?;
        if !entry.is_coherent() {
            let MockMemory { device_bytes, host_bytes, .. } = entry;
            device_bytes[start..end].copy_from_slice(&host_bytes[start..end]);
        }
        for index in std::mem::take(&mut state.corrupt_next_flush) {
            if let Some(byte) = state.memories.get_mut(&memory).and_then(|m| m.device_bytes.get_mut(index)) {
                *byte ^= 0xFF;
            }
        }
        state.flush_count += 1;
        state.calls.push("flush_mapped_range".to_string());
        Ok(())
    }

    fn invalidate_mapped_range(&self, memory: MemoryHandle, range: SyncRange) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let entry = state.memories
            .get_mut(&memory)
            .ok_or_else(|| Error::MappingFailed("unknown memory".to_string()))?;
        let (start, end) = entry.resolve(range)?;
        if !entry.is_coherent() {
            let MockMemory { device_bytes, host_bytes, .. } = entry;
            host_bytes[start..end].copy_from_slice(&device_bytes[start..end]);
        }
        state.invalidate_count += 1;
        state.calls.push("invalidate_mapped_range".to_string());
        Ok(())
    }

    fn copy_buffer(&self, src: BufferHandle, dst: BufferHandle, size: u64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("copy_buffer".to_string());
        if std::mem::take(&mut state.fail_next_submit) {
            return Err(Error::TransferFailed("mock submission failure".to_string()));
        }

        let (src_memory, src_offset) = {
            let buffer = state.buffers.get(&src)
                .ok_or_else(|| Error::TransferFailed("unknown source buffer".to_string()))?;
            if !buffer.usage.contains(BufferUsageFlags::TRANSFER_SRC) {
                return Err(Error::TransferFailed("source buffer lacks TRANSFER_SRC".to_string()));
            }
            if size > buffer.size {
                return Err(Error::TransferFailed("copy exceeds source size".to_string()));
            }
            buffer.binding.ok_or_else(|| Error::TransferFailed("source buffer is unbound".to_string()))?
        };
        let (dst_memory, dst_offset) = {
            let buffer = state.buffers.get(&dst)
                .ok_or_else(|| Error::TransferFailed("unknown destination buffer".to_string()))?;
            if !buffer.usage.contains(BufferUsageFlags::TRANSFER_DST) {
                return Err(Error::TransferFailed("destination buffer lacks TRANSFER_DST".to_string()));
            }
            if size > buffer.size {
                return Err(Error::TransferFailed("copy exceeds destination size".to_string()));
            }
            buffer.binding.ok_or_else(|| Error::TransferFailed("destination buffer is unbound".to_string()))?
        };

        let bytes: Vec<u8> = {
            let memory = state.memories.get(&src_memory)
                .ok_or_else(|| Error::TransferFailed("source memory freed".to_string()))?;
            let start = src_offset as usize;
            memory.device_bytes[start..start + size as usize].to_vec()
        };
        let corrupt = state.corrupt_after_copy.clone();
        let memory = state.memories.get_mut(&dst_memory)
            .ok_or_else(|| Error::TransferFailed("destination memory freed".to_string()))?;
        let start = dst_offset as usize;
        memory.device_bytes[start..start + bytes.len()].copy_from_slice(&bytes);
        for index in corrupt {
            if index < bytes.len() {
                memory.device_bytes[start + index] ^= 0xFF;
            }
        }

        state.copy_count += 1;
        if std::mem::take(&mut state.time_out_next_copy) {
            state.pending_copy = true;
            return Err(Error::TransferTimeout(MOCK_TRANSFER_TIMEOUT_NS));
        }
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.pending_copy = false;
        state.wait_idle_count += 1;
        state.calls.push("wait_idle".to_string());
        Ok(())
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
