/*!
# Galaxy 3D Transfer - Vulkan Backend

Vulkan implementation of the `GraphicsDevice` trait from galaxy_3d_transfer,
built on the Ash bindings.

The device is headless: no window, no surface, no swapchain. It allocates one
memory block per buffer, maps host-visible blocks whole and submits copies as
one-shot command buffers waited on with a fence.

# Example

```no_run
use galaxy_3d_transfer::galaxy3d::Engine;
use galaxy_3d_transfer::galaxy3d::render::Config;
use galaxy_3d_transfer_vulkan::galaxy3d::VulkanGraphicsDevice;

Engine::initialize()?;
let device = Engine::create_graphics_device(VulkanGraphicsDevice::new(Config::default())?)?;
# Ok::<(), galaxy_3d_transfer::galaxy3d::Error>(())
```
*/

mod vulkan_context;
mod vulkan_graphics_device;
mod debug;

pub mod galaxy3d {
    pub use crate::vulkan_graphics_device::VulkanGraphicsDevice;

    // Validation statistics (empty unless built with `vulkan-validation`)
    pub use crate::debug::{get_validation_stats, print_validation_stats_report};
}
