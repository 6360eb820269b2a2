/*!
# Galaxy 3D Transfer

Core types for GPU buffer resources and host/device transfers.

This crate is platform-agnostic: it talks to the GPU only through the
`GraphicsDevice` trait. Backend implementations (Vulkan, ...) live in their
own crates and provide the concrete device.

## Architecture

- **ResourceBuilder**: allocates a buffer bound to memory with the requested properties
- **BufferResource**: exclusively owned buffer + memory, released on drop
- **MappedRange**: host mapping with explicit flush / invalidate
- **copy_buffer**: blocking device-side copy between two buffers
- **CopyVerification**: end to end check of the copy path
- **Scene / CopyScene**: lifecycle contract and the scene running the check
*/

// Internal modules
mod error;
mod engine;
pub mod log;
pub mod graphics_device;
pub mod transfer;
pub mod scene;

// Main galaxy3d namespace module
pub mod galaxy3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Engine singleton
    pub use crate::engine::Engine;

    // Graphics device trait
    pub use crate::graphics_device::GraphicsDevice;

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger};
        // Note: engine_* macros are exported at the crate root by #[macro_export]
    }

    // Render sub-module with device-level types
    pub mod render {
        pub use crate::graphics_device::*;
    }

    // Transfer sub-module
    pub mod transfer {
        pub use crate::transfer::*;
    }

    // Scene sub-module
    pub mod scene {
        pub use crate::scene::*;
    }
}
