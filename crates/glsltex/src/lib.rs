//! Live GLSL shader-to-texture compilation.
//!
//! A [`Session`] watches one fragment shader document, recompiles it whenever
//! its text changes, renders it offscreen and publishes the pixels as a named
//! image. Hosts plug in their document storage, image storage and GPU through
//! the traits in [`host`] and drive sessions with [`run`].

pub mod clock;
pub mod documents;
pub mod error;
pub mod host;
pub mod images;
pub mod pipeline;
pub mod registry;
pub mod runner;
pub mod session;
pub mod sink;
pub mod template;
pub mod watcher;

#[cfg(test)]
mod fakes;

pub use clock::{
    time_source, CancelHandle, Clock, ClockEvent, IntervalClock, ScriptedClock, TimeMode,
    TimeSample, TimeSource,
};
pub use documents::FsDocumentStore;
pub use error::{CompileError, DocumentError, ImageError, RenderError, SessionError, UniformError};
pub use host::{DocumentStore, ImageStore, OffscreenTarget, QuadGeometry, Renderer, UniformValue};
pub use images::{MemoryImageStore, PngImageStore, StoredImage};
pub use pipeline::{PipelineState, ShaderPipeline};
pub use registry::{SessionRecord, SessionRegistry};
pub use runner::{run, RunSummary};
pub use session::{Session, SessionParams, TickReport};
pub use sink::{image_key, TextureSink};
pub use watcher::{SourceSnapshot, SourceWatcher};
