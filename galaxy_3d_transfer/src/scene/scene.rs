/// Scene - lifecycle contract driven by an external loop
///
/// The driver calls `setup` once, `update` any number of times, then
/// `teardown` once. Scenes never sequence themselves.

use std::sync::Arc;

use crate::error::Result;
use crate::graphics_device::GraphicsDevice;
use crate::transfer::BufferResource;

pub trait Scene {
    /// Name used in log messages
    fn name(&self) -> &str;

    /// Prepare the scene on `device`
    ///
    /// # Arguments
    ///
    /// * `device` - Device shared with the driver; the scene keeps it until teardown
    /// * `resources` - Buffers the driver already created for this scene (may be empty)
    fn setup(&mut self, device: Arc<dyn GraphicsDevice>, resources: &[Arc<BufferResource>]) -> Result<()>;

    /// Advance the scene by one step
    fn update(&mut self) -> Result<()>;

    /// Release everything acquired in `setup`
    ///
    /// Must wait for the device to be idle before releasing device objects.
    /// Calling it on a scene that was never set up does nothing.
    fn teardown(&mut self) -> Result<()>;
}
