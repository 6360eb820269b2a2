//! Scene module
//!
//! The lifecycle contract an external driver loop runs scenes through,
//! and the copy verification scene.

mod scene;
mod copy_scene;

pub use scene::Scene;
pub use copy_scene::CopyScene;
