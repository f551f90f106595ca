//! Interfaces of the host collaborators the live pipeline drives.
//!
//! The pipeline never owns shader documents or published images; it looks
//! them up by name every tick through [`DocumentStore`] and [`ImageStore`].
//! GPU work goes through [`Renderer`], whose offscreen targets are only ever
//! handed out wrapped in an [`OffscreenTarget`] guard so they are released on
//! every exit path of a render step.

use std::path::Path;

use crate::error::{CompileError, DocumentError, ImageError, RenderError, UniformError};

/// Text storage for shader sources, addressed by document id.
pub trait DocumentStore {
    fn exists(&self, id: &str) -> bool;
    /// Imports the file at `path` and returns the id it was stored under.
    fn open_from_file(&mut self, path: &Path) -> Result<String, DocumentError>;
    /// Creates an empty, memory-resident document.
    fn create_empty(&mut self, id: &str) -> Result<(), DocumentError>;
    /// Replaces the whole text of the document.
    fn write(&mut self, id: &str, text: &str) -> Result<(), DocumentError>;
    fn read_all(&self, id: &str) -> Result<String, DocumentError>;
    fn is_externally_backed(&self, id: &str) -> bool;
    /// True when the backing file changed since it was last read.
    fn is_stale_on_disk(&self, id: &str) -> bool;
    fn reload_from_disk(&mut self, id: &str) -> Result<(), DocumentError>;
}

/// Image storage for published textures.
///
/// Pixels are normalized RGBA floats with rows stored bottom-to-top: the
/// first `width * 4` values describe the bottom row of the picture.
pub trait ImageStore {
    fn exists(&self, id: &str) -> bool;
    fn create(&mut self, id: &str, width: u32, height: u32) -> Result<(), ImageError>;
    /// Resizes the image; a no-op when it already has these dimensions.
    fn resize(&mut self, id: &str, width: u32, height: u32) -> Result<(), ImageError>;
    fn write_pixels(&mut self, id: &str, pixels: &[f32]) -> Result<(), ImageError>;
}

/// Value assigned to a shader uniform for one draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
}

impl UniformValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            UniformValue::Float(_) => "float",
            UniformValue::Vec2(_) => "vec2",
        }
    }
}

/// Per-vertex data for a four-vertex quad, keyed by vertex input name.
///
/// Vertices are ordered for a triangle strip: bottom-left, bottom-right,
/// top-left, top-right.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadGeometry {
    pub positions: [[f32; 2]; 4],
    pub texcoords: [[f32; 2]; 4],
}

impl QuadGeometry {
    /// Looks up the data feeding the vertex input called `name`.
    pub fn attribute(&self, name: &str) -> Option<&[[f32; 2]; 4]> {
        match name {
            crate::template::POSITION_ATTRIBUTE => Some(&self.positions),
            crate::template::TEXCOORD_ATTRIBUTE => Some(&self.texcoords),
            _ => None,
        }
    }
}

/// GPU capability used by the shader pipeline.
///
/// Programs, batches and targets are opaque handles owned by the caller;
/// dropping a handle releases it.
pub trait Renderer {
    type Program;
    type Batch;
    type Target;

    fn compile_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self::Program, CompileError>;

    /// Builds a quad batch laid out for `program`'s vertex inputs.
    fn create_quad_batch(
        &mut self,
        program: &Self::Program,
        quad: &QuadGeometry,
    ) -> Result<Self::Batch, RenderError>;

    /// Prefer [`OffscreenTarget::acquire`], which guarantees the release.
    fn create_offscreen_target(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<Self::Target, RenderError>;

    fn release_offscreen_target(&mut self, target: Self::Target);

    fn clear(&mut self, target: &mut Self::Target) -> Result<(), RenderError>;

    fn bind_program(&mut self, target: &mut Self::Target, program: &Self::Program);

    /// Returns [`UniformError::NotFound`] when the program does not declare `name`.
    fn set_uniform(
        &mut self,
        program: &mut Self::Program,
        name: &str,
        value: UniformValue,
    ) -> Result<(), UniformError>;

    fn draw(
        &mut self,
        target: &mut Self::Target,
        batch: &Self::Batch,
        program: &Self::Program,
    ) -> Result<(), RenderError>;

    /// Tightly packed RGBA8, `width * height * 4` bytes, rows top-to-bottom.
    fn read_color_buffer(&mut self, target: &mut Self::Target) -> Result<Vec<u8>, RenderError>;
}

/// Scoped offscreen render target. Released back to the renderer on drop.
pub struct OffscreenTarget<'r, R: Renderer> {
    renderer: &'r mut R,
    target: Option<R::Target>,
    width: u32,
    height: u32,
}

impl<'r, R: Renderer> OffscreenTarget<'r, R> {
    pub fn acquire(renderer: &'r mut R, width: u32, height: u32) -> Result<Self, RenderError> {
        let target = renderer.create_offscreen_target(width, height)?;
        Ok(Self {
            renderer,
            target: Some(target),
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn clear(&mut self) -> Result<(), RenderError> {
        let target = self.target.as_mut().ok_or(RenderError::TargetReleased)?;
        self.renderer.clear(target)
    }

    pub fn bind_program(&mut self, program: &R::Program) -> Result<(), RenderError> {
        let target = self.target.as_mut().ok_or(RenderError::TargetReleased)?;
        self.renderer.bind_program(target, program);
        Ok(())
    }

    pub fn set_uniform(
        &mut self,
        program: &mut R::Program,
        name: &str,
        value: UniformValue,
    ) -> Result<(), UniformError> {
        self.renderer.set_uniform(program, name, value)
    }

    pub fn draw(&mut self, batch: &R::Batch, program: &R::Program) -> Result<(), RenderError> {
        let target = self.target.as_mut().ok_or(RenderError::TargetReleased)?;
        self.renderer.draw(target, batch, program)
    }

    pub fn read_color_buffer(&mut self) -> Result<Vec<u8>, RenderError> {
        let target = self.target.as_mut().ok_or(RenderError::TargetReleased)?;
        self.renderer.read_color_buffer(target)
    }
}

impl<R: Renderer> Drop for OffscreenTarget<'_, R> {
    fn drop(&mut self) {
        if let Some(target) = self.target.take() {
            self.renderer.release_offscreen_target(target);
        }
    }
}
