/// CopyEngine - device-side buffer to buffer copies

use std::sync::Arc;

use crate::error::Result;
use crate::graphics_device::BufferUsageFlags;
use crate::transfer::BufferResource;
use crate::{engine_bail, engine_debug, engine_error};

/// A single copy of `size` bytes from offset 0 of `source` to offset 0 of `destination`
#[derive(Debug, Clone, Copy)]
pub struct TransferRequest<'a> {
    pub source: &'a BufferResource,
    pub destination: &'a BufferResource,
    pub size: u64,
}

impl<'a> TransferRequest<'a> {
    pub fn new(source: &'a BufferResource, destination: &'a BufferResource, size: u64) -> Self {
        Self { source, destination, size }
    }

    /// Copy the whole source buffer
    pub fn whole(source: &'a BufferResource, destination: &'a BufferResource) -> Self {
        Self::new(source, destination, source.size())
    }

    /// Check the request against both buffers
    ///
    /// # Errors
    ///
    /// `Error::InvalidUsage` when the size is 0 or exceeds either buffer, a
    /// transfer capability is missing, both sides are the same buffer, or the
    /// buffers live on different devices.
    pub fn validate(&self) -> Result<()> {
        let (src, dst) = (self.source, self.destination);

        if self.size == 0 {
            engine_bail!("galaxy3d::transfer", InvalidUsage,
                "Copy '{}' -> '{}': size must be > 0", src.name(), dst.name());
        }
        if self.size > src.size() || self.size > dst.size() {
            engine_bail!("galaxy3d::transfer", InvalidUsage,
                "Copy '{}' -> '{}': {} bytes exceeds buffer sizes ({} / {})",
                src.name(), dst.name(), self.size, src.size(), dst.size());
        }
        if !src.usage().contains(BufferUsageFlags::TRANSFER_SRC) {
            engine_bail!("galaxy3d::transfer", InvalidUsage,
                "Copy source '{}' was not created with TRANSFER_SRC (usage {:?})", src.name(), src.usage());
        }
        if !dst.usage().contains(BufferUsageFlags::TRANSFER_DST) {
            engine_bail!("galaxy3d::transfer", InvalidUsage,
                "Copy destination '{}' was not created with TRANSFER_DST (usage {:?})", dst.name(), dst.usage());
        }
        if !Arc::ptr_eq(src.device(), dst.device()) {
            engine_bail!("galaxy3d::transfer", InvalidUsage,
                "Copy '{}' -> '{}': buffers belong to different devices", src.name(), dst.name());
        }
        if src.handle() == dst.handle() {
            engine_bail!("galaxy3d::transfer", InvalidUsage,
                "Copy '{}': source and destination are the same buffer", src.name());
        }
        Ok(())
    }
}

/// Record, submit and wait for a single buffer copy
///
/// Returns once the device has finished the copy. The source must have been
/// flushed (or be coherent) and unmapped; invalidate the destination before
/// reading it back.
///
/// # Errors
///
/// - `Error::InvalidUsage` if the request is invalid (nothing is submitted)
/// - `Error::TransferFailed` if recording or submission fails
/// - `Error::TransferTimeout` if the device does not finish in time
pub fn copy_buffer(request: &TransferRequest) -> Result<()> {
    request.validate()?;

    let (src, dst) = (request.source, request.destination);
    engine_debug!("galaxy3d::transfer",
        "Copying {} bytes '{}' -> '{}'", request.size, src.name(), dst.name());

    src.device()
        .copy_buffer(src.handle(), dst.handle(), request.size)
        .inspect_err(|e| engine_error!("galaxy3d::transfer",
            "Copy '{}' -> '{}' failed: {}", src.name(), dst.name(), e))
}

#[cfg(test)]
#[path = "copy_engine_tests.rs"]
mod tests;
