//! Compile/render state machine for one shader session.
//!
//! A source edit forces a recompile and a render; an advancing clock forces a
//! render only. Compile failures park the pipeline in
//! [`PipelineState::CompileFailed`] until the text changes again, so a broken
//! shader costs nothing per tick and the last good output stays published.

use std::fmt;

use tracing::{debug, info, trace, warn};

use crate::error::{RenderError, UniformError};
use crate::host::{OffscreenTarget, Renderer, UniformValue};
use crate::template::{FULLSCREEN_QUAD, RESOLUTION_UNIFORM, TIME_UNIFORM, VERTEX_STAGE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    NoShader,
    Compiling,
    Ready,
    CompileFailed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::NoShader => f.write_str("no-shader"),
            PipelineState::Compiling => f.write_str("compiling"),
            PipelineState::Ready => f.write_str("ready"),
            PipelineState::CompileFailed => f.write_str("compile-failed"),
        }
    }
}

/// Inputs of one pipeline tick.
#[derive(Debug, Clone, Copy)]
pub struct FrameRequest<'a> {
    pub fragment_source: &'a str,
    pub content_changed: bool,
    pub time_advanced: bool,
    pub width: u32,
    pub height: u32,
    pub time: f32,
}

/// Result of one pipeline tick.
#[derive(Debug, Default)]
pub struct FrameOutcome {
    pub recompiled: bool,
    /// RGBA8 rows top-to-bottom; present iff a render executed.
    pub pixels: Option<Vec<u8>>,
    /// A render was attempted from `Ready` and failed.
    pub render_failed: bool,
}

pub struct ShaderPipeline<R: Renderer> {
    state: PipelineState,
    program: Option<R::Program>,
    batch: Option<R::Batch>,
}

impl<R: Renderer> Default for ShaderPipeline<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Renderer> ShaderPipeline<R> {
    pub fn new() -> Self {
        Self {
            state: PipelineState::NoShader,
            program: None,
            batch: None,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn has_program(&self) -> bool {
        self.program.is_some()
    }

    pub fn has_batch(&self) -> bool {
        self.batch.is_some()
    }

    pub fn tick(&mut self, renderer: &mut R, request: &FrameRequest<'_>) -> FrameOutcome {
        let needs_compile = request.content_changed || self.state == PipelineState::NoShader;
        if !needs_compile && !request.time_advanced {
            trace!(state = %self.state, "source and time unchanged; skipping tick");
            return FrameOutcome::default();
        }

        let mut outcome = FrameOutcome::default();
        if needs_compile {
            self.compile(renderer, request.fragment_source);
            outcome.recompiled = true;
        }

        if self.state != PipelineState::Ready {
            debug!(state = %self.state, "no usable program; skipping render");
            return outcome;
        }

        match self.render(renderer, request) {
            Ok(pixels) => outcome.pixels = Some(pixels),
            Err(err) => {
                warn!(error = %err, width = request.width, height = request.height, "render step failed");
                outcome.render_failed = true;
            }
        }
        outcome
    }

    fn compile(&mut self, renderer: &mut R, fragment_source: &str) {
        self.state = PipelineState::Compiling;
        // The batch is tied to the program it was laid out for.
        self.batch = None;
        self.program = None;

        match renderer.compile_program(VERTEX_STAGE, fragment_source) {
            Ok(program) => {
                self.program = Some(program);
                self.state = PipelineState::Ready;
                info!("shader compiled");
            }
            Err(err) => {
                self.state = PipelineState::CompileFailed;
                warn!(error = %err, "shader compilation failed; keeping last published image");
            }
        }
    }

    fn render(&mut self, renderer: &mut R, request: &FrameRequest<'_>) -> Result<Vec<u8>, RenderError> {
        let program = self.program.as_mut().ok_or(RenderError::NoProgram)?;
        if self.batch.is_none() {
            self.batch = Some(renderer.create_quad_batch(program, &FULLSCREEN_QUAD)?);
            debug!("built full-screen quad batch");
        }
        let batch = self.batch.as_ref().ok_or(RenderError::NoProgram)?;

        let mut target = OffscreenTarget::acquire(renderer, request.width, request.height)?;
        target.clear()?;
        target.bind_program(program)?;
        apply_uniform(
            &mut target,
            program,
            RESOLUTION_UNIFORM,
            UniformValue::Vec2([request.width as f32, request.height as f32]),
        );
        apply_uniform(&mut target, program, TIME_UNIFORM, UniformValue::Float(request.time));
        target.draw(batch, program)?;
        let pixels = target.read_color_buffer()?;

        let expected = request.width as usize * request.height as usize * 4;
        if pixels.len() != expected {
            return Err(RenderError::Readback(format!(
                "expected {expected} bytes, got {}",
                pixels.len()
            )));
        }
        Ok(pixels)
    }
}

fn apply_uniform<R: Renderer>(
    target: &mut OffscreenTarget<'_, R>,
    program: &mut R::Program,
    name: &str,
    value: UniformValue,
) {
    match target.set_uniform(program, name, value) {
        Ok(()) => {}
        Err(UniformError::NotFound(_)) => trace!(uniform = name, "shader does not use uniform"),
        Err(err) => debug!(uniform = name, error = %err, "uniform not applied"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{Call, RecordingRenderer, SYNTAX_ERROR};
    use crate::template::DEFAULT_FRAGMENT;

    fn request(source: &str, content_changed: bool, time_advanced: bool, time: f32) -> FrameRequest<'_> {
        FrameRequest {
            fragment_source: source,
            content_changed,
            time_advanced,
            width: 4,
            height: 2,
            time,
        }
    }

    #[test]
    fn first_tick_compiles_and_renders() {
        let mut renderer = RecordingRenderer::new();
        let mut pipeline = ShaderPipeline::new();

        let outcome = pipeline.tick(&mut renderer, &request(DEFAULT_FRAGMENT, true, false, 0.0));

        assert!(outcome.recompiled);
        assert_eq!(outcome.pixels.as_ref().map(Vec::len), Some(4 * 2 * 4));
        assert_eq!(pipeline.state(), PipelineState::Ready);
        assert!(pipeline.has_batch());
        assert_eq!(
            renderer.calls,
            vec![
                Call::Compile,
                Call::CreateBatch { program: 1 },
                Call::AcquireTarget { width: 4, height: 2 },
                Call::Clear,
                Call::Bind { program: 1 },
                Call::SetUniform {
                    name: RESOLUTION_UNIFORM.into(),
                    value: UniformValue::Vec2([4.0, 2.0]),
                },
                Call::SetUniform {
                    name: TIME_UNIFORM.into(),
                    value: UniformValue::Float(0.0),
                },
                Call::Draw,
                Call::Readback,
                Call::ReleaseTarget,
            ]
        );
    }

    #[test]
    fn steady_state_does_nothing() {
        let mut renderer = RecordingRenderer::new();
        let mut pipeline = ShaderPipeline::new();
        pipeline.tick(&mut renderer, &request(DEFAULT_FRAGMENT, true, true, 0.0));
        renderer.take_calls();

        for _ in 0..5 {
            let outcome = pipeline.tick(&mut renderer, &request(DEFAULT_FRAGMENT, false, false, 0.0));
            assert!(outcome.pixels.is_none());
            assert!(!outcome.recompiled);
        }
        assert!(renderer.calls.is_empty());
    }

    #[test]
    fn time_advance_renders_without_recompile() {
        let mut renderer = RecordingRenderer::new();
        let mut pipeline = ShaderPipeline::new();
        pipeline.tick(&mut renderer, &request(DEFAULT_FRAGMENT, true, false, 0.0));
        renderer.take_calls();

        let outcome = pipeline.tick(&mut renderer, &request(DEFAULT_FRAGMENT, false, true, 0.5));

        assert!(!outcome.recompiled);
        assert!(outcome.pixels.is_some());
        assert_eq!(renderer.compiles(), 0);
        assert!(renderer.calls.contains(&Call::SetUniform {
            name: TIME_UNIFORM.into(),
            value: UniformValue::Float(0.5),
        }));
        // batch survives while the program does
        assert_eq!(renderer.count(|call| matches!(call, Call::CreateBatch { .. })), 0);
    }

    #[test]
    fn compile_failure_parks_until_text_changes() {
        let mut renderer = RecordingRenderer::new();
        let mut pipeline = ShaderPipeline::new();
        pipeline.tick(&mut renderer, &request(DEFAULT_FRAGMENT, true, false, 0.0));
        assert_eq!(pipeline.state(), PipelineState::Ready);

        let broken = format!("{DEFAULT_FRAGMENT}\n{SYNTAX_ERROR}\n");
        let outcome = pipeline.tick(&mut renderer, &request(&broken, true, false, 0.0));
        assert!(outcome.recompiled);
        assert!(outcome.pixels.is_none());
        assert_eq!(pipeline.state(), PipelineState::CompileFailed);
        assert!(!pipeline.has_program());
        assert!(!pipeline.has_batch());

        renderer.take_calls();
        for step in 1..4 {
            let outcome = pipeline.tick(&mut renderer, &request(&broken, false, true, step as f32));
            assert!(outcome.pixels.is_none());
        }
        assert_eq!(renderer.compiles(), 0);
        assert_eq!(renderer.readbacks(), 0);

        let outcome = pipeline.tick(&mut renderer, &request(DEFAULT_FRAGMENT, true, false, 3.0));
        assert!(outcome.pixels.is_some());
        assert_eq!(pipeline.state(), PipelineState::Ready);
    }

    #[test]
    fn recompile_rebuilds_batch_for_new_program() {
        let mut renderer = RecordingRenderer::new();
        let mut pipeline = ShaderPipeline::new();
        pipeline.tick(&mut renderer, &request(DEFAULT_FRAGMENT, true, false, 0.0));
        let edited = DEFAULT_FRAGMENT.replace("1.0);", "0.5);");
        pipeline.tick(&mut renderer, &request(&edited, true, false, 0.0));

        let batches: Vec<_> = renderer
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::CreateBatch { program } => Some(*program),
                _ => None,
            })
            .collect();
        assert_eq!(batches, vec![1, 2]);
    }

    #[test]
    fn undeclared_uniforms_are_ignored() {
        let mut renderer = RecordingRenderer::new();
        let mut pipeline = ShaderPipeline::new();
        let source = "void main() { gl_FragColor = vec4(1.0); }";

        let outcome = pipeline.tick(&mut renderer, &request(source, true, false, 0.0));

        assert!(outcome.pixels.is_some());
        assert_eq!(renderer.uniform_calls(), 2);
    }

    #[test]
    fn failed_draw_still_releases_target() {
        let mut renderer = RecordingRenderer::new();
        renderer.fail_draw = true;
        let mut pipeline = ShaderPipeline::new();

        let outcome = pipeline.tick(&mut renderer, &request(DEFAULT_FRAGMENT, true, false, 0.0));

        assert!(outcome.pixels.is_none());
        assert!(outcome.render_failed);
        assert_eq!(renderer.live_targets, 0);
        assert_eq!(renderer.calls.last(), Some(&Call::ReleaseTarget));
        assert_eq!(renderer.readbacks(), 0);
        assert_eq!(pipeline.state(), PipelineState::Ready);
    }

    #[test]
    fn empty_source_attempts_single_compile() {
        let mut renderer = RecordingRenderer::new();
        let mut pipeline = ShaderPipeline::new();

        pipeline.tick(&mut renderer, &request("", false, false, 0.0));
        pipeline.tick(&mut renderer, &request("", false, false, 0.0));

        assert_eq!(renderer.compiles(), 1);
        assert_eq!(pipeline.state(), PipelineState::CompileFailed);
    }
}
