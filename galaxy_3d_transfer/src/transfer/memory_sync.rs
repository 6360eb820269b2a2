/// MemorySync - mapped ranges and explicit flush/invalidate
///
/// Flush and invalidate only exist on an active `MappedRange`, so the
/// memory is always mapped when they run. On `HOST_COHERENT` memory both are
/// accepted and do nothing.
///
/// Ordering at the host/device boundary:
/// - host -> device: write, `flush()`, unmap, then submit device work
/// - device -> host: wait for device work, map, `invalidate()`, then read

use std::ptr::NonNull;

use crate::error::Result;
use crate::graphics_device::SyncRange;
use crate::transfer::BufferResource;
use crate::{engine_bail, engine_error, engine_trace};

/// An active host mapping of a buffer's memory
///
/// Borrows the resource mutably, so a buffer has at most one mapping and
/// cannot be copied or dropped while mapped. Unmapped on drop.
pub struct MappedRange<'a> {
    resource: &'a BufferResource,
    ptr: NonNull<u8>,
    offset: u64,
    size: u64,
}

impl BufferResource {
    /// Map the whole buffer
    pub fn map(&mut self) -> Result<MappedRange<'_>> {
        let size = self.size();
        self.map_range(0, size)
    }

    /// Map `size` bytes starting at `offset` (relative to the buffer start)
    ///
    /// # Errors
    ///
    /// `Error::MappingFailed` if the range is empty or out of bounds, the memory
    /// is not host-visible, or the device reports the block as already mapped.
    pub fn map_range(&mut self, offset: u64, size: u64) -> Result<MappedRange<'_>> {
        if size == 0 || offset.checked_add(size).map_or(true, |end| end > self.size()) {
            engine_bail!("galaxy3d::transfer", MappingFailed,
                "Buffer '{}': cannot map [{}, {}) of a {} byte buffer",
                self.name(), offset, offset.saturating_add(size), self.size());
        }
        if !self.is_host_visible() {
            engine_bail!("galaxy3d::transfer", MappingFailed,
                "Buffer '{}': memory {:?} is not host-visible", self.name(), self.memory_properties());
        }

        let ptr = self.device()
            .map_memory(self.memory(), offset, size)
            .inspect_err(|e| engine_error!("galaxy3d::transfer",
                "Buffer '{}': map failed: {}", self.name(), e))?;

        Ok(MappedRange {
            resource: self,
            ptr,
            offset,
            size,
        })
    }
}

impl<'a> MappedRange<'a> {
    /// Resource this mapping belongs to
    pub fn resource(&self) -> &BufferResource {
        self.resource
    }

    /// Offset of the mapping from the buffer start
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.size as usize
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the device mapped `size` bytes at `ptr`; the mapping is exclusive
        // and stays valid until this value is dropped
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len()) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: see as_slice; &mut self guarantees no other slice is alive
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len()) }
    }

    /// Copy `data` into the mapping at `offset` (relative to the mapping start)
    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        if offset.checked_add(data.len()).map_or(true, |end| end > self.len()) {
            engine_bail!("galaxy3d::transfer", MappingFailed,
                "Buffer '{}': write of {} bytes at {} exceeds mapping of {} bytes",
                self.resource.name(), data.len(), offset, self.len());
        }
        self.as_mut_slice()[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Copy bytes from the mapping at `offset` into `out`
    pub fn read(&self, offset: usize, out: &mut [u8]) -> Result<()> {
        if offset.checked_add(out.len()).map_or(true, |end| end > self.len()) {
            engine_bail!("galaxy3d::transfer", MappingFailed,
                "Buffer '{}': read of {} bytes at {} exceeds mapping of {} bytes",
                self.resource.name(), out.len(), offset, self.len());
        }
        out.copy_from_slice(&self.as_slice()[offset..offset + out.len()]);
        Ok(())
    }

    /// Set every mapped byte to `value`
    pub fn fill(&mut self, value: u8) {
        self.as_mut_slice().fill(value);
    }

    /// Make host writes to the whole mapping visible to the device
    pub fn flush(&self) -> Result<()> {
        self.sync(self.whole_range(), SyncDirection::Flush)
    }

    /// Make host writes to `[offset, offset + size)` visible to the device
    ///
    /// Offsets are relative to the buffer start and must lie inside the mapping.
    pub fn flush_range(&self, offset: u64, size: u64) -> Result<()> {
        let range = self.checked_range(offset, size)?;
        self.sync(range, SyncDirection::Flush)
    }

    /// Make device writes to the whole mapping visible to the host
    pub fn invalidate(&self) -> Result<()> {
        self.sync(self.whole_range(), SyncDirection::Invalidate)
    }

    /// Make device writes to `[offset, offset + size)` visible to the host
    ///
    /// Offsets are relative to the buffer start and must lie inside the mapping.
    pub fn invalidate_range(&self, offset: u64, size: u64) -> Result<()> {
        let range = self.checked_range(offset, size)?;
        self.sync(range, SyncDirection::Invalidate)
    }

    /// Unmap explicitly (same as dropping)
    pub fn unmap(self) {}

    fn whole_range(&self) -> SyncRange {
        if self.offset == 0 && self.size == self.resource.size() {
            SyncRange::Whole
        } else {
            SyncRange::Range { offset: self.offset, size: self.size }
        }
    }

    fn checked_range(&self, offset: u64, size: u64) -> Result<SyncRange> {
        let end = offset.checked_add(size);
        if size == 0 || offset < self.offset || end.map_or(true, |end| end > self.offset + self.size) {
            engine_bail!("galaxy3d::transfer", MappingFailed,
                "Buffer '{}': sync range [{}, {}) outside of mapping [{}, {})",
                self.resource.name(), offset, offset.saturating_add(size),
                self.offset, self.offset + self.size);
        }
        Ok(SyncRange::Range { offset, size })
    }

    fn sync(&self, range: SyncRange, direction: SyncDirection) -> Result<()> {
        if self.resource.is_coherent() {
            engine_trace!("galaxy3d::transfer",
                "Buffer '{}': {} skipped, memory is coherent", self.resource.name(), direction.name());
            return Ok(());
        }

        let device = self.resource.device();
        let memory = self.resource.memory();
        let result = match direction {
            SyncDirection::Flush => device.flush_mapped_range(memory, range),
            SyncDirection::Invalidate => device.invalidate_mapped_range(memory, range),
        };
        result.inspect_err(|e| engine_error!("galaxy3d::transfer",
            "Buffer '{}': {} of {:?} failed: {}", self.resource.name(), direction.name(), range, e))
    }
}

impl Drop for MappedRange<'_> {
    fn drop(&mut self) {
        self.resource.device().unmap_memory(self.resource.memory());
    }
}

#[derive(Debug, Clone, Copy)]
enum SyncDirection {
    Flush,
    Invalidate,
}

impl SyncDirection {
    fn name(self) -> &'static str {
        match self {
            SyncDirection::Flush => "flush",
            SyncDirection::Invalidate => "invalidate",
        }
    }
}

#[cfg(test)]
#[path = "memory_sync_tests.rs"]
mod tests;
