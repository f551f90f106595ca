use anyhow::Result;
use glsltex::{CompileError, QuadGeometry, RenderError, Renderer, UniformError, UniformValue};
use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::compile::MAX_TEXTURE_UNIFORMS;
use crate::types::{AdapterProfile, RendererConfig};

use super::context::GpuContext;
use super::pipeline::{GpuBatch, GpuProgram, PipelineLayouts};
use super::target::GpuTarget;
use super::uniforms::ProgramUniforms;

/// Headless `wgpu` implementation of [`Renderer`].
///
/// Every call blocks until the GPU has finished the submitted work, so a
/// readback always sees the preceding draw.
pub struct GpuRenderer {
    context: GpuContext,
    layouts: PipelineLayouts,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    texture_bind_group: wgpu::BindGroup,
    next_program_id: u64,
}

impl GpuRenderer {
    pub fn new(config: &RendererConfig) -> Result<Self> {
        let context = GpuContext::new(config)?;
        let layouts = PipelineLayouts::new(&context.device);
        let uniform_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("glsltex uniforms"),
            size: ProgramUniforms::SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = context.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("glsltex uniform bind group"),
            layout: &layouts.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        let texture_bind_group =
            empty_texture_bind_group(&context.device, &context.queue, &layouts.texture_layout);
        tracing::info!(adapter = %context.adapter_profile.name, "GPU renderer ready");
        Ok(Self {
            context,
            layouts,
            uniform_buffer,
            uniform_bind_group,
            texture_bind_group,
            next_program_id: 0,
        })
    }

    pub fn adapter_profile(&self) -> &AdapterProfile {
        &self.context.adapter_profile
    }

    fn submit_pass(
        &self,
        target: &GpuTarget,
        load: wgpu::LoadOp<wgpu::Color>,
        record: impl FnOnce(&mut wgpu::RenderPass<'_>),
    ) -> Result<(), RenderError> {
        let device = &self.context.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("glsltex render encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("glsltex render pass"),
                color_attachments: &[Some(target.color_attachment(load))],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            record(&mut pass);
        }
        self.context.queue.submit(std::iter::once(encoder.finish()));
        match pollster::block_on(device.pop_error_scope()) {
            Some(err) => Err(RenderError::Validation(err.to_string())),
            None => Ok(()),
        }
    }
}

impl Renderer for GpuRenderer {
    type Program = GpuProgram;
    type Batch = GpuBatch;
    type Target = GpuTarget;

    fn compile_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self::Program, CompileError> {
        self.next_program_id += 1;
        let program = GpuProgram::build(
            &self.context.device,
            &self.layouts,
            self.next_program_id,
            vertex_source,
            fragment_source,
        )?;
        tracing::debug!(
            program = program.id,
            uses_resolution = program.declared.resolution,
            uses_time = program.declared.time,
            defaulted = ?program.defaulted,
            textures = ?program.textures,
            "built render pipeline"
        );
        Ok(program)
    }

    fn create_quad_batch(
        &mut self,
        program: &Self::Program,
        quad: &QuadGeometry,
    ) -> Result<Self::Batch, RenderError> {
        let buffers = program
            .inputs
            .iter()
            .map(|input| {
                let data = quad
                    .attribute(&input.name)
                    .ok_or_else(|| RenderError::MissingAttribute(input.name.clone()))?;
                Ok(self
                    .context
                    .device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("glsltex quad attribute"),
                        contents: bytemuck::cast_slice(data.as_slice()),
                        usage: wgpu::BufferUsages::VERTEX,
                    }))
            })
            .collect::<Result<Vec<_>, RenderError>>()?;
        Ok(GpuBatch {
            program: program.id,
            buffers,
            vertex_count: quad.positions.len() as u32,
        })
    }

    fn create_offscreen_target(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<Self::Target, RenderError> {
        GpuTarget::new(&self.context.device, width, height, self.context.max_dimension())
    }

    fn release_offscreen_target(&mut self, target: Self::Target) {
        target.texture.destroy();
    }

    fn clear(&mut self, target: &mut Self::Target) -> Result<(), RenderError> {
        self.submit_pass(target, wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT), |_| {})
    }

    fn bind_program(&mut self, target: &mut Self::Target, program: &Self::Program) {
        target.bound = Some(program.id);
    }

    fn set_uniform(
        &mut self,
        program: &mut Self::Program,
        name: &str,
        value: UniformValue,
    ) -> Result<(), UniformError> {
        program.uniforms.set(program.declared, name, value)
    }

    fn draw(
        &mut self,
        target: &mut Self::Target,
        batch: &Self::Batch,
        program: &Self::Program,
    ) -> Result<(), RenderError> {
        if batch.program != program.id {
            return Err(RenderError::BatchMismatch);
        }
        if target.bound != Some(program.id) {
            return Err(RenderError::ProgramNotBound);
        }

        let mut uniforms = program.uniforms;
        uniforms.target_size = [target.width as f32, target.height as f32];
        self.context
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        self.submit_pass(target, wgpu::LoadOp::Load, |pass| {
            pass.set_pipeline(&program.pipeline);
            pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            pass.set_bind_group(1, &self.texture_bind_group, &[]);
            for (slot, buffer) in batch.buffers.iter().enumerate() {
                pass.set_vertex_buffer(slot as u32, buffer.slice(..));
            }
            pass.draw(0..batch.vertex_count, 0..1);
        })
    }

    fn read_color_buffer(&mut self, target: &mut Self::Target) -> Result<Vec<u8>, RenderError> {
        target.read_back(&self.context.device, &self.context.queue)
    }
}

/// Binds every `sampler2D` unit to a 1x1 transparent texture, so sampling a
/// texture the host never supplies reads `vec4(0.0)`.
fn empty_texture_bind_group(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
) -> wgpu::BindGroup {
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some("glsltex empty texture"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        TextureDataOrder::LayerMajor,
        &[0u8; 4],
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    });

    let entries: Vec<wgpu::BindGroupEntry<'_>> = (0..MAX_TEXTURE_UNIFORMS as u32)
        .flat_map(|unit| {
            [
                wgpu::BindGroupEntry {
                    binding: unit * 2,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: unit * 2 + 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ]
        })
        .collect();
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("glsltex texture bind group"),
        layout,
        entries: &entries,
    })
}
