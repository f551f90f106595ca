//! Recording renderer used by the pipeline and session tests.

use crate::error::{CompileError, RenderError, UniformError};
use crate::host::{QuadGeometry, Renderer, UniformValue};
use crate::template::{RESOLUTION_UNIFORM, TIME_UNIFORM};

/// Marker that makes [`RecordingRenderer::compile_program`] fail.
pub(crate) const SYNTAX_ERROR: &str = "#error broken";

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Compile,
    CreateBatch { program: u32 },
    AcquireTarget { width: u32, height: u32 },
    ReleaseTarget,
    Clear,
    Bind { program: u32 },
    SetUniform { name: String, value: UniformValue },
    Draw,
    Readback,
}

#[derive(Debug)]
pub(crate) struct FakeProgram {
    pub id: u32,
    declared: Vec<&'static str>,
}

#[derive(Debug)]
pub(crate) struct FakeBatch {
    program: u32,
}

#[derive(Debug)]
pub(crate) struct FakeTarget {
    width: u32,
    height: u32,
    bound: Option<u32>,
}

#[derive(Debug, Default)]
pub(crate) struct RecordingRenderer {
    pub calls: Vec<Call>,
    pub live_targets: usize,
    pub fail_draw: bool,
    next_program: u32,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| matches(call)).count()
    }

    pub fn compiles(&self) -> usize {
        self.count(|call| matches!(call, Call::Compile))
    }

    pub fn readbacks(&self) -> usize {
        self.count(|call| matches!(call, Call::Readback))
    }

    pub fn uniform_calls(&self) -> usize {
        self.count(|call| matches!(call, Call::SetUniform { .. }))
    }

    pub fn take_calls(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }
}

/// Pixel written by the fake at column `x` of readback row `row` (row 0 = top).
pub(crate) fn fake_pixel(x: u32, row: u32) -> [u8; 4] {
    [row as u8, x as u8, 7, 255]
}

impl Renderer for RecordingRenderer {
    type Program = FakeProgram;
    type Batch = FakeBatch;
    type Target = FakeTarget;

    fn compile_program(
        &mut self,
        _vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self::Program, CompileError> {
        self.calls.push(Call::Compile);
        if fragment_source.contains(SYNTAX_ERROR) || !fragment_source.contains("void main") {
            return Err(CompileError::Fragment("0:1: syntax error".to_string()));
        }
        self.next_program += 1;
        let declared = [RESOLUTION_UNIFORM, TIME_UNIFORM]
            .into_iter()
            .filter(|name| fragment_source.contains(&format!("{name};")))
            .collect();
        Ok(FakeProgram {
            id: self.next_program,
            declared,
        })
    }

    fn create_quad_batch(
        &mut self,
        program: &Self::Program,
        _quad: &QuadGeometry,
    ) -> Result<Self::Batch, RenderError> {
        self.calls.push(Call::CreateBatch {
            program: program.id,
        });
        Ok(FakeBatch {
            program: program.id,
        })
    }

    fn create_offscreen_target(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<Self::Target, RenderError> {
        self.calls.push(Call::AcquireTarget { width, height });
        self.live_targets += 1;
        Ok(FakeTarget {
            width,
            height,
            bound: None,
        })
    }

    fn release_offscreen_target(&mut self, _target: Self::Target) {
        self.calls.push(Call::ReleaseTarget);
        self.live_targets -= 1;
    }

    fn clear(&mut self, _target: &mut Self::Target) -> Result<(), RenderError> {
        self.calls.push(Call::Clear);
        Ok(())
    }

    fn bind_program(&mut self, target: &mut Self::Target, program: &Self::Program) {
        self.calls.push(Call::Bind {
            program: program.id,
        });
        target.bound = Some(program.id);
    }

    fn set_uniform(
        &mut self,
        program: &mut Self::Program,
        name: &str,
        value: UniformValue,
    ) -> Result<(), UniformError> {
        self.calls.push(Call::SetUniform {
            name: name.to_string(),
            value,
        });
        if program.declared.contains(&name) {
            Ok(())
        } else {
            Err(UniformError::NotFound(name.to_string()))
        }
    }

    fn draw(
        &mut self,
        target: &mut Self::Target,
        batch: &Self::Batch,
        program: &Self::Program,
    ) -> Result<(), RenderError> {
        self.calls.push(Call::Draw);
        if self.fail_draw {
            return Err(RenderError::Validation("device lost".to_string()));
        }
        if batch.program != program.id {
            return Err(RenderError::BatchMismatch);
        }
        if target.bound != Some(program.id) {
            return Err(RenderError::ProgramNotBound);
        }
        Ok(())
    }

    fn read_color_buffer(&mut self, target: &mut Self::Target) -> Result<Vec<u8>, RenderError> {
        self.calls.push(Call::Readback);
        let mut bytes = Vec::with_capacity((target.width * target.height * 4) as usize);
        for row in 0..target.height {
            for x in 0..target.width {
                bytes.extend_from_slice(&fake_pixel(x, row));
            }
        }
        Ok(bytes)
    }
}
