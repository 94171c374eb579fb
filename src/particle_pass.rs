use std::mem::size_of;

use bytemuck::{bytes_of, cast_slice, Pod, Zeroable};
use glam::{const_vec3, vec2, Mat4, Vec2, Vec3};
use log::{debug, info};
use wgpu::util::DeviceExt;

use crate::{
    entity::Scene,
    error::{Error, Result},
    frame_buffers::FrameBuffers,
    particle_field::{ParticleInstance, ParticleSet},
    window::Size,
};

const QUAD_VERTICES: [Vec3; 4] = [
    const_vec3!([-0.5, -0.5, 0.]),
    const_vec3!([-0.5, 0.5, 0.]),
    const_vec3!([0.5, -0.5, 0.]),
    const_vec3!([0.5, 0.5, 0.]),
];
const QUAD_INDICES: [u16; 6] = [0, 2, 1, 1, 2, 3];

const INSTANCE_ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
    1 => Float32x3,
    2 => Float32,
    3 => Float32x3,
    4 => Float32
];

const ADDITIVE_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

#[derive(Debug, Copy, Clone, Default, Pod, Zeroable)]
#[repr(C)]
struct ParticleUniforms {
    v_mat: Mat4,
    p_mat: Mat4,
    viewport: Vec2,
    time: f32,
    drift: f32,
    pixel_ratio: f32,
    point_scale: f32,
    _pad0: [f32; 2],
}

impl ParticleUniforms {
    fn new(scene: &Scene, viewport: Size) -> Self {
        Self {
            v_mat: scene.camera.view_matrix(),
            p_mat: scene.camera.projection_matrix(),
            viewport: vec2(viewport.width as _, viewport.height as _),
            time: scene.elapsed,
            drift: scene.drift,
            pixel_ratio: scene.pixel_ratio,
            point_scale: scene.point_scale,
            ..Default::default()
        }
    }
}

/// GPU copy of the current particle set. There is at most one alive at a
/// time; dropping it destroys the instance buffer immediately.
struct ParticleBuffers {
    instance_buffer: wgpu::Buffer,
    render_bundle: wgpu::RenderBundle,
    count: u32,
}

impl Drop for ParticleBuffers {
    fn drop(&mut self) {
        self.instance_buffer.destroy();
    }
}

pub struct ParticleRenderer {
    uniform_buffer: wgpu::Buffer,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    render_pipeline: wgpu::RenderPipeline,
    particles: Option<ParticleBuffers>,
}

impl ParticleRenderer {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Uniform Buffer"),
            size: size_of::<ParticleUniforms>() as _,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Vertex Buffer"),
            contents: bytes_of(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Index Buffer"),
            contents: bytes_of(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: None,
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(size_of::<ParticleUniforms>() as _),
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let render_pipeline = {
            let shader_module = device.create_shader_module(&wgpu::include_wgsl!("particle.wgsl"));

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: None,
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Particle Render Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader_module,
                    entry_point: "vs_main",
                    buffers: &[
                        wgpu::VertexBufferLayout {
                            array_stride: size_of::<Vec3>() as _,
                            step_mode: wgpu::VertexStepMode::Vertex,
                            attributes: &[wgpu::VertexAttribute {
                                format: wgpu::VertexFormat::Float32x3,
                                offset: 0,
                                shader_location: 0,
                            }],
                        },
                        wgpu::VertexBufferLayout {
                            array_stride: size_of::<ParticleInstance>() as _,
                            step_mode: wgpu::VertexStepMode::Instance,
                            attributes: &INSTANCE_ATTRIBUTES,
                        },
                    ],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader_module,
                    entry_point: "fs_main",
                    targets: &[wgpu::ColorTargetState {
                        format: FrameBuffers::COLOR_FORMAT,
                        blend: Some(ADDITIVE_BLEND),
                        write_mask: wgpu::ColorWrites::ALL,
                    }],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    unclipped_depth: false,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    conservative: false,
                },
                // Particles never occlude each other.
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            })
        };

        Self {
            uniform_buffer,
            vertex_buffer,
            index_buffer,
            bind_group,
            render_pipeline,
            particles: None,
        }
    }

    /// Releases the resident set before uploading the replacement.
    pub fn replace_particles(&mut self, device: &wgpu::Device, set: &ParticleSet) -> Result<()> {
        if set.is_empty() {
            return Err(Error::InvalidInput("particle set is empty".to_string()));
        }
        let count = u32::try_from(set.len()).map_err(|_| {
            Error::InvalidInput(format!("{} particles exceed the instance limit", set.len()))
        })?;

        self.clear_particles();

        let instance_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Instance Buffer"),
            contents: cast_slice(set.instances().as_slice()),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let render_bundle = {
            let mut encoder =
                device.create_render_bundle_encoder(&wgpu::RenderBundleEncoderDescriptor {
                    label: None,
                    color_formats: &[FrameBuffers::COLOR_FORMAT],
                    depth_stencil: None,
                    sample_count: 1,
                    multiview: None,
                });

            encoder.set_pipeline(&self.render_pipeline);
            encoder.set_bind_group(0, &self.bind_group, &[]);
            encoder.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            encoder.set_vertex_buffer(1, instance_buffer.slice(..));
            encoder.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            encoder.draw_indexed(0..(QUAD_INDICES.len() as _), 0, 0..count);

            encoder.finish(&wgpu::RenderBundleDescriptor {
                label: Some("Particle Render Bundle"),
            })
        };

        info!("Uploaded {} particles", count);
        self.particles = Some(ParticleBuffers {
            instance_buffer,
            render_bundle,
            count,
        });

        Ok(())
    }

    pub fn clear_particles(&mut self) {
        if let Some(old) = self.particles.take() {
            debug!("Releasing {} particles", old.count);
        }
    }

    pub fn particle_count(&self) -> u32 {
        self.particles.as_ref().map_or(0, |p| p.count)
    }

    pub fn update(&self, queue: &wgpu::Queue, scene: &Scene, viewport: Size) {
        queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytes_of(&ParticleUniforms::new(scene, viewport)),
        );
    }

    /// Clears the color target even when no set is resident.
    pub fn draw(&self, encoder: &mut wgpu::CommandEncoder, frame_buffers: &FrameBuffers) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Particle Render Pass"),
            color_attachments: &[wgpu::RenderPassColorAttachment {
                view: &frame_buffers.color.texture_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: true,
                },
            }],
            depth_stencil_attachment: None,
        });
        if let Some(particles) = &self.particles {
            render_pass.execute_bundles(Some(&particles.render_bundle).into_iter());
        }
    }
}
