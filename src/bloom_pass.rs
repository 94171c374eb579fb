use std::mem::size_of;

use bytemuck::{bytes_of, Pod, Zeroable};
use glam::{vec2, Vec2};
use wgpu::util::DeviceExt;

use crate::{
    entity::Scene,
    frame_buffers::{FrameBuffer, FrameBuffers},
    samplers::Samplers,
};

/// Width of the soft knee above the bright-pass threshold.
const BRIGHT_KNEE: f32 = 0.01;

/// Kernel radius per blur level, in texels of that level.
const BLUR_KERNEL_RADII: [u32; FrameBuffers::BLOOM_LEVELS as usize] = [3, 5, 7];

#[derive(Debug, Copy, Clone, Default, Pod, Zeroable)]
#[repr(C)]
struct BrightUniforms {
    threshold: f32,
    knee: f32,
    _pad0: [f32; 2],
}

impl BrightUniforms {
    fn new(scene: &Scene) -> Self {
        Self {
            threshold: scene.bloom.threshold,
            knee: BRIGHT_KNEE,
            ..Default::default()
        }
    }
}

#[derive(Debug, Copy, Clone, Default, Pod, Zeroable)]
#[repr(C)]
struct BlurUniforms {
    direction: Vec2,
    sigma: f32,
    radius: u32,
}

/// Bright pass followed by the blur chain. The composite pass reads the
/// vertical output of every level.
pub struct BloomRenderer {
    bright_pass: BrightPass,
    blur_pass: BlurPass,
}

impl BloomRenderer {
    pub fn new(device: &wgpu::Device, frame_buffers: &FrameBuffers, samplers: &Samplers) -> Self {
        let vertex_shader_module =
            device.create_shader_module(&wgpu::include_wgsl!("fullscreen_vs.wgsl"));

        let bright_pass = BrightPass::new(device, &vertex_shader_module, frame_buffers, samplers);
        let blur_pass = BlurPass::new(device, &vertex_shader_module, frame_buffers, samplers);

        Self {
            bright_pass,
            blur_pass,
        }
    }

    pub fn recreate_bind_group(
        &mut self,
        device: &wgpu::Device,
        frame_buffers: &FrameBuffers,
        samplers: &Samplers,
    ) {
        self.bright_pass
            .recreate_bind_group(device, frame_buffers, samplers);
        self.blur_pass
            .recreate_bind_group(device, frame_buffers, samplers);
    }

    pub fn update(&self, queue: &wgpu::Queue, scene: &Scene) {
        self.bright_pass.update(queue, scene);
    }

    pub fn draw(&self, encoder: &mut wgpu::CommandEncoder, frame_buffers: &FrameBuffers) {
        self.bright_pass.draw(encoder, frame_buffers);
        self.blur_pass.draw(encoder, frame_buffers);
    }
}

fn texture_sampler_layout_entries(
    uniform_size: usize,
) -> [wgpu::BindGroupLayoutEntry; 3] {
    [
        wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: wgpu::BufferSize::new(uniform_size as _),
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        },
    ]
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniform_buffer: &wgpu::Buffer,
    texture_view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: None,
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(texture_view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

fn create_fullscreen_pipeline(
    device: &wgpu::Device,
    label: &str,
    vertex_shader_module: &wgpu::ShaderModule,
    fragment_shader_module: &wgpu::ShaderModule,
    bind_group_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: None,
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: vertex_shader_module,
            entry_point: "main",
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: fragment_shader_module,
            entry_point: "main",
            targets: &[FrameBuffers::BLOOM_FORMAT.into()],
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}

fn draw_fullscreen(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    target: &FrameBuffer,
    render_pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
) {
    let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[wgpu::RenderPassColorAttachment {
            view: &target.texture_view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: true,
            },
        }],
        depth_stencil_attachment: None,
    });
    rpass.set_bind_group(0, bind_group, &[]);
    rpass.set_pipeline(render_pipeline);
    rpass.draw(0..3, 0..1);
}

struct BrightPass {
    bright_uniform_buffer: wgpu::Buffer,
    bright_bind_group: wgpu::BindGroup,
    bright_bind_group_layout: wgpu::BindGroupLayout,
    bright_render_pipeline: wgpu::RenderPipeline,
}

impl BrightPass {
    fn new(
        device: &wgpu::Device,
        vertex_shader_module: &wgpu::ShaderModule,
        frame_buffers: &FrameBuffers,
        samplers: &Samplers,
    ) -> Self {
        let bright_uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Bloom Bright Uniform Buffer"),
            size: size_of::<BrightUniforms>() as _,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bright_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: None,
                entries: &texture_sampler_layout_entries(size_of::<BrightUniforms>()),
            });

        let bright_bind_group = create_bind_group(
            device,
            &bright_bind_group_layout,
            &bright_uniform_buffer,
            &frame_buffers.color.texture_view,
            &samplers.bilinear,
        );

        let fragment_shader_module =
            device.create_shader_module(&wgpu::include_wgsl!("bloom_fs_bright.wgsl"));
        let bright_render_pipeline = create_fullscreen_pipeline(
            device,
            "Bloom Bright Render Pipeline",
            vertex_shader_module,
            &fragment_shader_module,
            &bright_bind_group_layout,
        );

        Self {
            bright_uniform_buffer,
            bright_bind_group,
            bright_bind_group_layout,
            bright_render_pipeline,
        }
    }

    fn recreate_bind_group(
        &mut self,
        device: &wgpu::Device,
        frame_buffers: &FrameBuffers,
        samplers: &Samplers,
    ) {
        self.bright_bind_group = create_bind_group(
            device,
            &self.bright_bind_group_layout,
            &self.bright_uniform_buffer,
            &frame_buffers.color.texture_view,
            &samplers.bilinear,
        );
    }

    fn update(&self, queue: &wgpu::Queue, scene: &Scene) {
        queue.write_buffer(
            &self.bright_uniform_buffer,
            0,
            bytes_of(&BrightUniforms::new(scene)),
        );
    }

    fn draw(&self, encoder: &mut wgpu::CommandEncoder, frame_buffers: &FrameBuffers) {
        draw_fullscreen(
            encoder,
            "Bloom Bright Render Pass",
            &frame_buffers.bright,
            &self.bright_render_pipeline,
            &self.bright_bind_group,
        );
    }
}

/// Bind groups for one level: horizontal reads the previous level, vertical
/// reads the horizontal result.
struct BlurLevelBindGroups {
    horizontal: wgpu::BindGroup,
    vertical: wgpu::BindGroup,
}

struct BlurPass {
    blur_bind_group_layout: wgpu::BindGroupLayout,
    blur_bind_groups: Vec<BlurLevelBindGroups>,
    blur_render_pipeline: wgpu::RenderPipeline,
}

impl BlurPass {
    fn new(
        device: &wgpu::Device,
        vertex_shader_module: &wgpu::ShaderModule,
        frame_buffers: &FrameBuffers,
        samplers: &Samplers,
    ) -> Self {
        let blur_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: None,
                entries: &texture_sampler_layout_entries(size_of::<BlurUniforms>()),
            });

        let blur_bind_groups =
            Self::create_blur_bind_groups(device, &blur_bind_group_layout, frame_buffers, samplers);

        let fragment_shader_module =
            device.create_shader_module(&wgpu::include_wgsl!("bloom_fs_blur.wgsl"));
        let blur_render_pipeline = create_fullscreen_pipeline(
            device,
            "Bloom Blur Render Pipeline",
            vertex_shader_module,
            &fragment_shader_module,
            &blur_bind_group_layout,
        );

        Self {
            blur_bind_group_layout,
            blur_bind_groups,
            blur_render_pipeline,
        }
    }

    fn create_blur_bind_groups(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        frame_buffers: &FrameBuffers,
        samplers: &Samplers,
    ) -> Vec<BlurLevelBindGroups> {
        let create_uniform_buffer = |direction: Vec2, radius: u32| {
            let uniforms = BlurUniforms {
                direction,
                sigma: radius as f32,
                radius,
            };
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Bloom Blur Uniform Buffer"),
                contents: bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM,
            })
        };

        frame_buffers
            .blur_levels
            .iter()
            .enumerate()
            .map(|(i, level)| {
                let source = match i {
                    0 => &frame_buffers.bright,
                    _ => &frame_buffers.blur_levels[i - 1].vertical,
                };
                let radius = BLUR_KERNEL_RADII[i];
                let texel = vec2(
                    1.0 / level.horizontal.size.width as f32,
                    1.0 / level.horizontal.size.height as f32,
                );

                let horizontal_uniforms = create_uniform_buffer(vec2(texel.x, 0.), radius);
                let vertical_uniforms = create_uniform_buffer(vec2(0., texel.y), radius);

                BlurLevelBindGroups {
                    horizontal: create_bind_group(
                        device,
                        layout,
                        &horizontal_uniforms,
                        &source.texture_view,
                        &samplers.bilinear,
                    ),
                    vertical: create_bind_group(
                        device,
                        layout,
                        &vertical_uniforms,
                        &level.horizontal.texture_view,
                        &samplers.bilinear,
                    ),
                }
            })
            .collect::<Vec<_>>()
    }

    fn recreate_bind_group(
        &mut self,
        device: &wgpu::Device,
        frame_buffers: &FrameBuffers,
        samplers: &Samplers,
    ) {
        self.blur_bind_groups = Self::create_blur_bind_groups(
            device,
            &self.blur_bind_group_layout,
            frame_buffers,
            samplers,
        );
    }

    fn draw(&self, encoder: &mut wgpu::CommandEncoder, frame_buffers: &FrameBuffers) {
        for (level, bind_groups) in frame_buffers.blur_levels.iter().zip(&self.blur_bind_groups) {
            draw_fullscreen(
                encoder,
                "Bloom Blur Horizontal Render Pass",
                &level.horizontal,
                &self.blur_render_pipeline,
                &bind_groups.horizontal,
            );
            draw_fullscreen(
                encoder,
                "Bloom Blur Vertical Render Pass",
                &level.vertical,
                &self.blur_render_pipeline,
                &bind_groups.vertical,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_layouts_match_shaders() {
        assert_eq!(size_of::<BrightUniforms>(), 16);
        assert_eq!(size_of::<BlurUniforms>(), 16);
    }

    #[test]
    fn kernels_widen_with_each_level() {
        assert!(BLUR_KERNEL_RADII.windows(2).all(|pair| pair[1] > pair[0]));
    }
}
