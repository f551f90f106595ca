use glsltex::CompileError;
use wgpu::naga::ShaderStage;

use crate::compile::{self, DeclaredUniforms, VertexInput, MAX_TEXTURE_UNIFORMS};

use super::uniforms::ProgramUniforms;

/// Format of every offscreen target and therefore of every pipeline.
pub(crate) const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const VERTEX_STRIDE: wgpu::BufferAddress = std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress;

/// Layout objects shared by all programs.
pub(crate) struct PipelineLayouts {
    pub uniform_layout: wgpu::BindGroupLayout,
    pub texture_layout: wgpu::BindGroupLayout,
    pub pipeline_layout: wgpu::PipelineLayout,
}

impl PipelineLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("glsltex uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(ProgramUniforms::SIZE),
                },
                count: None,
            }],
        });
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("glsltex texture layout"),
            entries: &texture_layout_entries(),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("glsltex pipeline layout"),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });
        Self {
            uniform_layout,
            texture_layout,
            pipeline_layout,
        }
    }
}

/// One texture + sampler pair per `sampler2D` unit, at bindings `2n`/`2n + 1`.
fn texture_layout_entries() -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = Vec::with_capacity(MAX_TEXTURE_UNIFORMS * 2);
    for unit in 0..MAX_TEXTURE_UNIFORMS as u32 {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: unit * 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: unit * 2 + 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }
    entries
}

/// A compiled vertex + fragment pair.
pub struct GpuProgram {
    pub(crate) id: u64,
    pub(crate) pipeline: wgpu::RenderPipeline,
    pub(crate) inputs: Vec<VertexInput>,
    pub(crate) declared: DeclaredUniforms,
    pub(crate) defaulted: Vec<String>,
    pub(crate) textures: Vec<String>,
    pub(crate) uniforms: ProgramUniforms,
}

impl GpuProgram {
    /// Builds the render pipeline, reporting each failure against the stage
    /// that caused it.
    pub(crate) fn build(
        device: &wgpu::Device,
        layouts: &PipelineLayouts,
        id: u64,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self, CompileError> {
        let inputs = compile::parse_vertex_inputs(vertex_source)?;
        compile::validate_stage(ShaderStage::Vertex, vertex_source).map_err(CompileError::Vertex)?;

        let wrapped = compile::wrap_fragment(fragment_source)?;
        compile::validate_stage(ShaderStage::Fragment, &wrapped.source)
            .map_err(CompileError::Fragment)?;

        let attributes: Vec<[wgpu::VertexAttribute; 1]> = inputs
            .iter()
            .map(|input| {
                [wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x2,
                    offset: 0,
                    shader_location: input.location,
                }]
            })
            .collect();
        let buffers: Vec<wgpu::VertexBufferLayout<'_>> = attributes
            .iter()
            .map(|attribute| wgpu::VertexBufferLayout {
                array_stride: VERTEX_STRIDE,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: attribute,
            })
            .collect();

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let vertex_module = compile::glsl_module(device, "glsltex vertex", vertex_source, ShaderStage::Vertex);
        let fragment_module =
            compile::glsl_module(device, "glsltex fragment", &wrapped.source, ShaderStage::Fragment);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("glsltex pipeline"),
            layout: Some(&layouts.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some("main"),
                buffers: &buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TARGET_FORMAT,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(CompileError::Link(err.to_string()));
        }

        Ok(Self {
            id,
            pipeline,
            inputs,
            declared: wrapped.uniforms,
            defaulted: wrapped.defaulted,
            textures: wrapped.textures,
            uniforms: ProgramUniforms::default(),
        })
    }
}

/// Vertex buffers for the quad, one per program input, in input order.
pub struct GpuBatch {
    pub(crate) program: u64,
    pub(crate) buffers: Vec<wgpu::Buffer>,
    pub(crate) vertex_count: u32,
}
