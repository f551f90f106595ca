//! Headless GPU renderer for glsltex.
//!
//! Implements [`glsltex::Renderer`] with `wgpu`. User fragment shaders are
//! written in classic `gl_FragColor` GLSL; they are wrapped at compile time so
//! they build as Vulkan GLSL 450 with the `u_resolution`/`u_time` uniforms
//! living in a uniform block:
//!
//! ```text
//!   fragment text ──▶ wrap_fragment ──▶ naga validate ──▶ render pipeline
//!                                                             │
//!   offscreen target ◀── clear ◀── draw quad ◀── uniform block┘
//!          │
//!          └─▶ copy to buffer ──▶ unpad rows ──▶ RGBA8, top row first
//! ```

mod compile;
mod gpu;
pub mod types;

pub use gpu::{GpuBatch, GpuProgram, GpuRenderer, GpuTarget};
pub use types::{AdapterProfile, GpuPowerPreference, RendererConfig};
