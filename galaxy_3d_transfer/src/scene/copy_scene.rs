/// CopyScene - runs the copy verification once at setup

use std::sync::Arc;

use crate::error::Result;
use crate::graphics_device::GraphicsDevice;
use crate::scene::Scene;
use crate::transfer::{BufferResource, CopyVerification, VerificationConfig, VerificationReport};
use crate::{engine_bail, engine_debug, engine_info, engine_trace, engine_warn};

const LOG_SOURCE: &str = "galaxy3d::scene";

/// Scene that verifies a host -> device -> host buffer copy
///
/// A failed comparison is reported through `report()`, it does not fail
/// `setup`. Allocation, mapping and transfer errors do. After such an error
/// the scene keeps its device so `teardown` can still wait for it, and a new
/// `setup` is only accepted after that teardown.
pub struct CopyScene {
    config: VerificationConfig,
    device: Option<Arc<dyn GraphicsDevice>>,
    report: Option<VerificationReport>,
    update_count: u64,
}

impl CopyScene {
    pub fn new() -> Self {
        Self::with_config(VerificationConfig::default())
    }

    pub fn with_config(config: VerificationConfig) -> Self {
        Self {
            config,
            device: None,
            report: None,
            update_count: 0,
        }
    }

    /// Report of the verification run during setup
    pub fn report(&self) -> Option<&VerificationReport> {
        self.report.as_ref()
    }

    /// True between setup and teardown, including after a setup that failed
    pub fn is_active(&self) -> bool {
        self.device.is_some()
    }

    pub fn update_count(&self) -> u64 {
        self.update_count
    }
}

impl Default for CopyScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for CopyScene {
    fn name(&self) -> &str {
        "copy"
    }

    fn setup(&mut self, device: Arc<dyn GraphicsDevice>, resources: &[Arc<BufferResource>]) -> Result<()> {
        if self.device.is_some() {
            engine_bail!(LOG_SOURCE, InvalidUsage, "Scene '{}' is already set up", self.name());
        }
        engine_info!(LOG_SOURCE, "Scene '{}': setup", self.name());
        if !resources.is_empty() {
            engine_debug!(LOG_SOURCE, "Scene '{}' ignores {} driver resources, it allocates its own buffers",
                self.name(), resources.len());
        }

        self.device = Some(Arc::clone(&device));
        self.report = None;
        self.update_count = 0;

        let report = CopyVerification::with_config(device, self.config.clone()).run()?;
        if report.passed() {
            engine_info!(LOG_SOURCE, "Scene '{}': copy verified ({} bytes)", self.name(), report.buffer_size);
        } else {
            engine_warn!(LOG_SOURCE, "Scene '{}': copy verification failed ({} of {} bytes differ)",
                self.name(), report.mismatch_count, report.buffer_size);
        }
        self.report = Some(report);
        Ok(())
    }

    fn update(&mut self) -> Result<()> {
        self.update_count += 1;
        engine_trace!(LOG_SOURCE, "Scene '{}': update {}", self.name(), self.update_count);
        Ok(())
    }

    fn teardown(&mut self) -> Result<()> {
        let Some(device) = self.device.take() else {
            return Ok(());
        };
        engine_info!(LOG_SOURCE, "Scene '{}': teardown", self.name());
        device.wait_idle()
    }
}

#[cfg(test)]
#[path = "copy_scene_tests.rs"]
mod tests;
