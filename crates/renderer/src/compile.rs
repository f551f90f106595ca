use std::borrow::Cow;
use std::error::Error as _;

use glsltex::template::{RESOLUTION_UNIFORM, TIME_UNIFORM};
use glsltex::CompileError;
use wgpu::naga::front::glsl::{Frontend, Options};
use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};
use wgpu::naga::ShaderStage;

/// Texture units available to `uniform sampler2D` declarations.
pub(crate) const MAX_TEXTURE_UNIFORMS: usize = 4;

const PRECISIONS: [&str; 3] = ["lowp", "mediump", "highp"];

/// Which built-in uniforms the user fragment declared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DeclaredUniforms {
    pub resolution: bool,
    pub time: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct WrappedFragment {
    pub source: String,
    pub uniforms: DeclaredUniforms,
    /// Loose uniforms the host never feeds, turned into zeroed globals.
    pub defaulted: Vec<String>,
    /// `sampler2D` uniforms, in texture unit order.
    pub textures: Vec<String>,
}

/// A `layout(location = N) in vec2 NAME;` vertex input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VertexInput {
    pub location: u32,
    pub name: String,
}

/// Produces a GLSL 450 fragment shader from classic `gl_FragColor` code.
///
/// Steps performed:
///
/// 1. Blank out the `#version` directive, `precision` statements and the loose
///    `u_resolution`/`u_time` declarations. Lines are blanked or rewritten in
///    place, never removed, so compiler messages keep the user's line numbers.
/// 2. Rewrite every other loose uniform. Plain data uniforms become globals
///    holding zero (or their own initialiser); `sampler2D` uniforms are
///    mapped onto one of [`MAX_TEXTURE_UNIFORMS`] texture units at set 1,
///    which the renderer binds to an empty texture.
/// 3. Prepend [`HEADER`] with the uniform block, the colour output and macros
///    mapping the classic names onto them.
/// 4. Append [`FOOTER`], whose `main` remaps `gl_FragCoord` to a bottom-left
///    origin and calls the user's `main`.
///
/// Other opaque uniform types (cube maps, images, ...) are rejected.
pub(crate) fn wrap_fragment(source: &str) -> Result<WrappedFragment, CompileError> {
    let mut scan = UniformScan::default();
    let mut body = String::with_capacity(source.len());
    let mut skipped_version = false;

    for line in source.lines() {
        let trimmed = line.trim_start();
        if !skipped_version && trimmed.starts_with("#version") {
            skipped_version = true;
        } else if let Some(uniform) = loose_uniform(trimmed) {
            body.push_str(&scan.rewrite(uniform)?);
        } else if !trimmed.starts_with("precision ") {
            body.push_str(line);
        }
        body.push('\n');
    }

    let mut prelude = String::new();
    for (unit, name) in scan.textures.iter().enumerate() {
        prelude.push_str(&format!(
            "layout(set = 1, binding = {}) uniform texture2D glsltex_texture{unit};\n\
             layout(set = 1, binding = {}) uniform sampler glsltex_sampler{unit};\n\
             #define {name} sampler2D(glsltex_texture{unit}, glsltex_sampler{unit})\n",
            unit * 2,
            unit * 2 + 1,
        ));
    }
    if !scan.textures.is_empty() {
        prelude.push_str("#define texture2D texture\n");
    }
    if scan.declared.resolution {
        prelude.push_str(&format!("#define {RESOLUTION_UNIFORM} glsltex_params.resolution\n"));
    }
    if scan.declared.time {
        prelude.push_str(&format!("#define {TIME_UNIFORM} glsltex_params.time\n"));
    }

    Ok(WrappedFragment {
        source: format!("{HEADER}{prelude}#line 1\n{body}{FOOTER}"),
        uniforms: scan.declared,
        defaulted: scan.defaulted,
        textures: scan.textures,
    })
}

/// A plain `uniform [precision] TYPE NAME[, NAME...] [= VALUE];` line.
#[derive(Debug, PartialEq, Eq)]
struct LooseUniform<'a> {
    ty: &'a str,
    names: Vec<&'a str>,
    initializer: Option<&'a str>,
}

/// Parses a loose uniform declaration. Uniform blocks and anything that is
/// not a plain declaration return `None`.
fn loose_uniform(trimmed: &str) -> Option<LooseUniform<'_>> {
    let rest = trimmed.strip_prefix("uniform")?;
    if !rest.starts_with(char::is_whitespace) || rest.contains('{') {
        return None;
    }
    let (declaration, _) = rest.split_once(';')?;
    let (declaration, initializer) = match declaration.split_once('=') {
        Some((head, value)) => (head, Some(value.trim())),
        None => (declaration, None),
    };

    let mut rest = declaration.trim_start();
    let ty = loop {
        let (token, tail) = rest.split_once(char::is_whitespace)?;
        rest = tail.trim_start();
        if !PRECISIONS.contains(&token) {
            break token;
        }
    };
    let names: Vec<&str> = if initializer.is_some() {
        vec![rest.trim()]
    } else {
        rest.split(',').map(str::trim).collect()
    };
    if names.iter().any(|name| name.is_empty()) {
        return None;
    }
    Some(LooseUniform {
        ty,
        names,
        initializer,
    })
}

#[derive(Debug, Default)]
struct UniformScan {
    declared: DeclaredUniforms,
    defaulted: Vec<String>,
    textures: Vec<String>,
}

impl UniformScan {
    /// Returns the text that replaces the declaration's line.
    fn rewrite(&mut self, uniform: LooseUniform<'_>) -> Result<String, CompileError> {
        let mut names = Vec::with_capacity(uniform.names.len());
        for name in uniform.names {
            if !self.declare_builtin(uniform.ty, name)? {
                names.push(name);
            }
        }
        if names.is_empty() {
            return Ok(String::new());
        }

        if uniform.ty == "sampler2D" {
            for name in names {
                self.bind_texture(name)?;
            }
            return Ok(String::new());
        }
        if is_opaque(uniform.ty) {
            return Err(CompileError::Fragment(format!(
                "uniform '{}' has unsupported type {}; only sampler2D textures can be declared",
                names.join(", "),
                uniform.ty
            )));
        }

        let ty = uniform.ty;
        self.defaulted.extend(names.iter().map(|name| name.to_string()));
        if let Some(value) = uniform.initializer {
            return Ok(format!("{ty} {} = {value};", names.join(", ")));
        }
        let declarators: Vec<String> = names
            .iter()
            .map(|name| match zero_value(ty) {
                Some(zero) if !name.contains('[') => format!("{name} = {zero}"),
                _ => name.to_string(),
            })
            .collect();
        Ok(format!("{ty} {};", declarators.join(", ")))
    }

    /// Records `u_resolution`/`u_time`; `false` for any other name.
    fn declare_builtin(&mut self, ty: &str, name: &str) -> Result<bool, CompileError> {
        let (slot, expected) = match name {
            RESOLUTION_UNIFORM => (&mut self.declared.resolution, "vec2"),
            TIME_UNIFORM => (&mut self.declared.time, "float"),
            _ => return Ok(false),
        };
        if ty != expected {
            return Err(CompileError::Fragment(format!(
                "uniform '{name}' must be declared as {expected}, found {ty}"
            )));
        }
        *slot = true;
        Ok(true)
    }

    fn bind_texture(&mut self, name: &str) -> Result<(), CompileError> {
        if name.contains('[') {
            return Err(CompileError::Fragment(format!(
                "sampler array '{name}' is not supported"
            )));
        }
        if self.textures.len() == MAX_TEXTURE_UNIFORMS {
            return Err(CompileError::Fragment(format!(
                "uniform '{name}' exceeds the limit of {MAX_TEXTURE_UNIFORMS} sampler2D uniforms"
            )));
        }
        self.textures.push(name.to_string());
        Ok(())
    }
}

fn is_opaque(ty: &str) -> bool {
    const OPAQUE_PREFIXES: [&str; 11] = [
        "sampler", "isampler", "usampler", "image", "iimage", "uimage", "texture", "itexture",
        "utexture", "atomic_uint", "subpassInput",
    ];
    OPAQUE_PREFIXES.iter().any(|prefix| ty.starts_with(prefix))
}

/// `TYPE(0)` spelled with a literal the type's constructor accepts, or `None`
/// for structs and anything else without a scalar constructor.
fn zero_value(ty: &str) -> Option<String> {
    let is_shape = |suffix: &str| {
        !suffix.is_empty() && suffix.chars().all(|c| matches!(c, '2'..='4' | 'x'))
    };
    let literal = match ty {
        "float" => "0.0",
        "int" => "0",
        "uint" => "0u",
        "bool" => "false",
        _ if ty.strip_prefix("vec").is_some_and(is_shape) => "0.0",
        _ if ty.strip_prefix("mat").is_some_and(is_shape) => "0.0",
        _ if ty.strip_prefix("ivec").is_some_and(is_shape) => "0",
        _ if ty.strip_prefix("uvec").is_some_and(is_shape) => "0u",
        _ if ty.strip_prefix("bvec").is_some_and(is_shape) => "false",
        _ => return None,
    };
    Some(format!("{ty}({literal})"))
}

/// Vertex inputs declared with an explicit location, in declaration order.
pub(crate) fn parse_vertex_inputs(source: &str) -> Result<Vec<VertexInput>, CompileError> {
    let mut inputs = Vec::new();
    for line in source.lines() {
        let trimmed = line.trim();
        let Some(rest) = trimmed.strip_prefix("layout") else {
            continue;
        };
        let Some((qualifiers, declaration)) = rest.trim_start().strip_prefix('(').and_then(|r| r.split_once(')')) else {
            continue;
        };
        let mut tokens = declaration.trim().trim_end_matches(';').split_whitespace();
        if tokens.next() != Some("in") {
            continue;
        }
        let ty = tokens.next().unwrap_or_default();
        let name = tokens.next().unwrap_or_default();
        if ty != "vec2" || name.is_empty() {
            return Err(CompileError::Vertex(format!(
                "vertex input '{name}' must be a vec2, found '{ty}'"
            )));
        }
        let location = qualifiers
            .split(',')
            .filter_map(|qualifier| qualifier.split_once('='))
            .find(|(key, _)| key.trim() == "location")
            .and_then(|(_, value)| value.trim().parse::<u32>().ok())
            .ok_or_else(|| {
                CompileError::Vertex(format!("vertex input '{name}' has no location"))
            })?;
        inputs.push(VertexInput {
            location,
            name: name.to_string(),
        });
    }
    Ok(inputs)
}

/// Parses and validates one stage with naga so errors read like compiler
/// output instead of a device validation dump.
pub(crate) fn validate_stage(stage: ShaderStage, source: &str) -> Result<(), String> {
    let mut frontend = Frontend::default();
    let options = Options {
        stage,
        defines: Default::default(),
    };
    let module = frontend
        .parse(&options, source)
        .map_err(|errors| errors.emit_to_string(source))?;
    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|err| {
            let mut message = err.to_string();
            let mut cause = err.source();
            while let Some(inner) = cause {
                message.push_str(&format!(": {inner}"));
                cause = inner.source();
            }
            message
        })?;
    Ok(())
}

pub(crate) fn glsl_module<'a>(
    device: &wgpu::Device,
    label: &'a str,
    source: &'a str,
    stage: ShaderStage,
) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(source),
            stage,
            defines: &[],
        },
    })
}

/// Prologue of every wrapped fragment shader.
///
/// The block layout must match `ProgramUniforms` in `gpu/uniforms.rs`.
/// `target_size` always carries the render size, even when the shader does not
/// declare `u_resolution`, so the footer can flip `gl_FragCoord`.
const HEADER: &str = r"#version 450
layout(std140, set = 0, binding = 0) uniform GlslTexParams {
    vec2 resolution;
    float time;
    float pad0;
    vec2 target_size;
    vec2 pad1;
} glsltex_params;

layout(location = 0) out vec4 glsltex_FragColor;
vec4 glsltex_FragCoord;

#define gl_FragColor glsltex_FragColor
#define gl_FragCoord glsltex_FragCoord
#define main glsltex_user_main
";

const FOOTER: &str = r"
#undef main
#undef gl_FragCoord
void main() {
    glsltex_FragCoord = vec4(
        gl_FragCoord.x,
        glsltex_params.target_size.y - gl_FragCoord.y,
        gl_FragCoord.z,
        gl_FragCoord.w
    );
    glsltex_FragColor = vec4(0.0);
    glsltex_user_main();
}
";
