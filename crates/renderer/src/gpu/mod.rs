//! Headless GPU backend.
//!
//! - `context` requests an adapter and device without any surface.
//! - `pipeline` turns the fixed vertex stage and a wrapped fragment shader
//!   into a render pipeline, and holds the quad vertex buffers.
//! - `uniforms` mirrors the injected uniform block.
//! - `target` owns offscreen textures and their readback.
//! - `state` implements [`glsltex::Renderer`] on top of the above.

mod context;
mod pipeline;
mod state;
mod target;
mod uniforms;

pub use pipeline::{GpuBatch, GpuProgram};
pub use state::GpuRenderer;
pub use target::GpuTarget;
