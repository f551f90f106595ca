//! Built-in shader sources and the full-screen quad.

use crate::host::QuadGeometry;

/// Uniform carrying the render target size in pixels (`vec2`).
pub const RESOLUTION_UNIFORM: &str = "u_resolution";
/// Uniform carrying the clock time in seconds (`float`).
pub const TIME_UNIFORM: &str = "u_time";

pub const POSITION_ATTRIBUTE: &str = "a_position";
pub const TEXCOORD_ATTRIBUTE: &str = "a_texcoord";

/// Fixed vertex stage paired with every user fragment shader.
pub const VERTEX_STAGE: &str = r"#version 450
layout(location = 0) in vec2 a_position;
layout(location = 1) in vec2 a_texcoord;
layout(location = 0) out vec2 v_texcoord;

void main() {
    v_texcoord = a_texcoord;
    gl_Position = vec4(a_position, 0.0, 1.0);
}
";

/// Contents of a freshly created internal shader document.
pub const DEFAULT_FRAGMENT: &str = r"uniform vec2    u_resolution;
uniform float   u_time;

void main() {
    vec3 color = vec3(0.0);
    vec2 st = gl_FragCoord.xy / u_resolution;

    color.rg = st;
    color.b = abs(sin(u_time));

    gl_FragColor = vec4(color, 1.0);
}
";

/// Quad covering clip space `[-1, 1]²` with texture coordinates `[0, 1]²`.
pub const FULLSCREEN_QUAD: QuadGeometry = QuadGeometry {
    positions: [[-1.0, -1.0], [1.0, -1.0], [-1.0, 1.0], [1.0, 1.0]],
    texcoords: [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]],
};
