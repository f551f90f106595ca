use bytemuck::{Pod, Zeroable};
use glsltex::template::{RESOLUTION_UNIFORM, TIME_UNIFORM};
use glsltex::{UniformError, UniformValue};

use crate::compile::DeclaredUniforms;

/// CPU mirror of the `GlslTexParams` std140 block injected by the wrapper.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub(crate) struct ProgramUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
    pub pad0: f32,
    pub target_size: [f32; 2],
    pub pad1: [f32; 2],
}

impl ProgramUniforms {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Stores `value` if the program declared `name` with a matching type.
    pub fn set(
        &mut self,
        declared: DeclaredUniforms,
        name: &str,
        value: UniformValue,
    ) -> Result<(), UniformError> {
        match (name, value) {
            (RESOLUTION_UNIFORM, _) if !declared.resolution => {
                Err(UniformError::NotFound(name.to_string()))
            }
            (TIME_UNIFORM, _) if !declared.time => Err(UniformError::NotFound(name.to_string())),
            (RESOLUTION_UNIFORM, UniformValue::Vec2(resolution)) => {
                self.resolution = resolution;
                Ok(())
            }
            (TIME_UNIFORM, UniformValue::Float(time)) => {
                self.time = time;
                Ok(())
            }
            (RESOLUTION_UNIFORM, _) => Err(UniformError::TypeMismatch {
                name: name.to_string(),
                expected: "vec2",
            }),
            (TIME_UNIFORM, _) => Err(UniformError::TypeMismatch {
                name: name.to_string(),
                expected: "float",
            }),
            _ => Err(UniformError::NotFound(name.to_string())),
        }
    }
}

impl Default for ProgramUniforms {
    fn default() -> Self {
        Self::zeroed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOTH: DeclaredUniforms = DeclaredUniforms {
        resolution: true,
        time: true,
    };

    #[test]
    fn layout_matches_std140_block() {
        assert_eq!(ProgramUniforms::SIZE, 32);
        assert_eq!(std::mem::offset_of!(ProgramUniforms, time), 8);
        assert_eq!(std::mem::offset_of!(ProgramUniforms, target_size), 16);
    }

    #[test]
    fn stores_declared_values() {
        let mut uniforms = ProgramUniforms::default();
        uniforms
            .set(BOTH, RESOLUTION_UNIFORM, UniformValue::Vec2([640.0, 480.0]))
            .unwrap();
        uniforms.set(BOTH, TIME_UNIFORM, UniformValue::Float(2.5)).unwrap();
        assert_eq!(uniforms.resolution, [640.0, 480.0]);
        assert_eq!(uniforms.time, 2.5);
    }

    #[test]
    fn undeclared_and_unknown_names_are_not_found() {
        let mut uniforms = ProgramUniforms::default();
        let none = DeclaredUniforms::default();
        assert_eq!(
            uniforms.set(none, TIME_UNIFORM, UniformValue::Float(1.0)),
            Err(UniformError::NotFound(TIME_UNIFORM.into()))
        );
        assert_eq!(
            uniforms.set(BOTH, "u_mouse", UniformValue::Vec2([0.0, 0.0])),
            Err(UniformError::NotFound("u_mouse".into()))
        );
        assert_eq!(uniforms, ProgramUniforms::default());
    }

    #[test]
    fn wrong_type_is_reported() {
        let mut uniforms = ProgramUniforms::default();
        assert_eq!(
            uniforms.set(BOTH, TIME_UNIFORM, UniformValue::Vec2([1.0, 2.0])),
            Err(UniformError::TypeMismatch {
                name: TIME_UNIFORM.into(),
                expected: "float"
            })
        );
    }
}
