//! One live shader-to-texture session: watcher, pipeline and sink wired
//! together for a single source document.

use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::host::{DocumentStore, ImageStore, Renderer};
use crate::pipeline::{FrameRequest, PipelineState, ShaderPipeline};
use crate::registry::SessionRecord;
use crate::sink::TextureSink;
use crate::watcher::SourceWatcher;

pub const DEFAULT_SOURCE: &str = "default.frag";
pub const DEFAULT_WIDTH: u32 = 512;
pub const DEFAULT_HEIGHT: u32 = 512;

/// Invocation parameters of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    pub source: String,
    pub width: u32,
    pub height: u32,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub recompiled: bool,
    pub rendered: bool,
    pub published: bool,
    pub externally_modified: bool,
    pub state: PipelineState,
}

pub struct Session<R: Renderer> {
    watcher: SourceWatcher,
    pipeline: ShaderPipeline<R>,
    sink: TextureSink,
    width: u32,
    height: u32,
    last_source_text: String,
    last_sample_time: f32,
    render_pending: bool,
}

fn check_dimensions(width: u32, height: u32) -> Result<(), SessionError> {
    if width == 0 || height == 0 {
        return Err(SessionError::InvalidDimensions { width, height });
    }
    Ok(())
}

impl<R: Renderer> Session<R> {
    pub fn new(params: SessionParams) -> Result<Self, SessionError> {
        if params.source.trim().is_empty() {
            return Err(SessionError::EmptySource);
        }
        check_dimensions(params.width, params.height)?;

        let sink = TextureSink::for_source(&params.source);
        info!(
            source = %params.source,
            image = %sink.key(),
            width = params.width,
            height = params.height,
            "starting shader session"
        );
        Ok(Self {
            watcher: SourceWatcher::new(params.source),
            pipeline: ShaderPipeline::new(),
            sink,
            width: params.width,
            height: params.height,
            last_source_text: String::new(),
            last_sample_time: 0.0,
            render_pending: false,
        })
    }

    pub fn source_id(&self) -> &str {
        self.watcher.source_id()
    }

    pub fn image_key(&self) -> &str {
        self.sink.key()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn state(&self) -> PipelineState {
        self.pipeline.state()
    }

    /// Changes the output size. Takes effect on the next render.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), SessionError> {
        check_dimensions(width, height)?;
        if (width, height) != (self.width, self.height) {
            debug!(source = %self.source_id(), width, height, "session resized");
        }
        self.width = width;
        self.height = height;
        Ok(())
    }

    pub fn record(&self) -> SessionRecord {
        SessionRecord {
            source: self.source_id().to_string(),
            width: self.width,
            height: self.height,
        }
    }

    /// Runs one watcher → pipeline → sink pass at clock time `now`.
    pub fn tick<D, I>(&mut self, documents: &mut D, renderer: &mut R, images: &mut I, now: f32) -> TickReport
    where
        D: DocumentStore,
        I: ImageStore,
    {
        let mut report = TickReport {
            recompiled: false,
            rendered: false,
            published: false,
            externally_modified: false,
            state: self.pipeline.state(),
        };

        let snapshot = match self.watcher.poll(documents, &self.last_source_text) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(source = %self.source_id(), error = %err, "shader source unavailable this tick");
                return report;
            }
        };
        report.externally_modified = snapshot.externally_modified;

        // A failed render is retried on the next tick even at the same time.
        let time_advanced = now != self.last_sample_time || self.render_pending;
        let outcome = self.pipeline.tick(
            renderer,
            &FrameRequest {
                fragment_source: &snapshot.text,
                content_changed: snapshot.content_changed,
                time_advanced,
                width: self.width,
                height: self.height,
                time: now,
            },
        );
        if snapshot.content_changed {
            self.last_source_text = snapshot.text;
        }
        if outcome.pixels.is_some() {
            self.last_sample_time = now;
        }
        self.render_pending = outcome.render_failed;

        report.recompiled = outcome.recompiled;
        report.state = self.pipeline.state();
        if let Some(pixels) = outcome.pixels {
            report.rendered = true;
            match self.sink.publish(images, self.width, self.height, pixels) {
                Ok(()) => report.published = true,
                Err(err) => {
                    warn!(image = %self.sink.key(), error = %err, "failed to publish rendered frame");
                }
            }
        }
        report
    }
}
