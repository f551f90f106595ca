use std::path::PathBuf;

/// Failures reported by a [`DocumentStore`](crate::host::DocumentStore).
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("no document named '{0}'")]
    Missing(String),
    #[error("shader file {} does not exist", .0.display())]
    FileNotFound(PathBuf),
    #[error("failed to access shader file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("document '{0}' is not backed by a file")]
    NotExternal(String),
}

/// A vertex + fragment program that could not be built.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileError {
    #[error("vertex stage failed to compile:\n{0}")]
    Vertex(String),
    #[error("fragment stage failed to compile:\n{0}")]
    Fragment(String),
    #[error("program could not be linked: {0}")]
    Link(String),
}

/// Failures inside the render step. None of these end a session.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("no compiled program is available")]
    NoProgram,
    #[error("offscreen target {width}x{height} could not be created: {reason}")]
    Target {
        width: u32,
        height: u32,
        reason: String,
    },
    #[error("offscreen target was already released")]
    TargetReleased,
    #[error("quad geometry provides no data for vertex input '{0}'")]
    MissingAttribute(String),
    #[error("geometry batch was built for a different program")]
    BatchMismatch,
    #[error("program is not bound to the offscreen target")]
    ProgramNotBound,
    #[error("GPU validation failed: {0}")]
    Validation(String),
    #[error("color buffer readback failed: {0}")]
    Readback(String),
}

/// Outcome of setting a uniform the program may not use.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UniformError {
    #[error("program does not use uniform '{0}'")]
    NotFound(String),
    #[error("uniform '{name}' expects a {expected} value")]
    TypeMismatch { name: String, expected: &'static str },
}

/// Failures reported by an [`ImageStore`](crate::host::ImageStore).
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("no image named '{0}'")]
    Missing(String),
    #[error("image dimensions must be positive, got {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("pixel buffer holds {actual} values, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
    #[error("failed to prepare image directory {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to export image to {}: {source}", path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Invalid parameters handed to a session constructor or resize.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session dimensions must be at least 1x1, got {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("shader source name must not be empty")]
    EmptySource,
}
