/// Transfer module - buffer resources, host mapping, device copies and verification

pub mod resource_builder;
pub mod memory_sync;
pub mod copy_engine;
pub mod verification;

pub use resource_builder::*;
pub use memory_sync::*;
pub use copy_engine::*;
pub use verification::*;
