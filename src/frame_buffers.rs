use crate::window::Size;

pub struct FrameBuffer {
    pub texture: wgpu::Texture,
    pub texture_view: wgpu::TextureView,
    pub size: Size,
}

impl FrameBuffer {
    fn new(
        device: &wgpu::Device,
        label: &str,
        format: wgpu::TextureFormat,
        size: Size,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: size.into(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
        });
        let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            texture_view,
            size,
        }
    }

    fn new_hdr_color(device: &wgpu::Device, label: &str, size: Size) -> Self {
        Self::new(
            device,
            label,
            FrameBuffers::BLOOM_FORMAT,
            size,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::RENDER_ATTACHMENT,
        )
    }
}

/// One blur level: the horizontal pass writes `horizontal`, the vertical
/// pass reads it back and writes `vertical`.
pub struct BlurLevel {
    pub horizontal: FrameBuffer,
    pub vertical: FrameBuffer,
}

pub struct FrameBuffers {
    pub size: Size,
    pub color: FrameBuffer,
    pub bright: FrameBuffer,
    pub blur_levels: Vec<BlurLevel>,
    /// Composited LDR frame. Presented to the surface and read back on capture.
    pub output: FrameBuffer,
}

impl FrameBuffers {
    pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
    pub const BLOOM_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
    pub const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
    pub const BLOOM_LEVELS: u32 = 3;

    pub fn new(device: &wgpu::Device, size: Size) -> Self {
        let color = FrameBuffer::new(
            device,
            "Offscreen Color Texture",
            Self::COLOR_FORMAT,
            size,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::RENDER_ATTACHMENT,
        );

        let bright = FrameBuffer::new_hdr_color(device, "Bloom Bright Texture", size.downscaled(1));

        let blur_levels = (0..Self::BLOOM_LEVELS)
            .map(|level| {
                let level_size = size.downscaled(level + 1);
                BlurLevel {
                    horizontal: FrameBuffer::new_hdr_color(
                        device,
                        &format!("Bloom Blur Texture {} H", level),
                        level_size,
                    ),
                    vertical: FrameBuffer::new_hdr_color(
                        device,
                        &format!("Bloom Blur Texture {} V", level),
                        level_size,
                    ),
                }
            })
            .collect::<Vec<_>>();

        let output = FrameBuffer::new(
            device,
            "Output Texture",
            Self::OUTPUT_FORMAT,
            size,
            wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC,
        );

        Self {
            size,
            color,
            bright,
            blur_levels,
            output,
        }
    }

    pub fn resize(&mut self, device: &wgpu::Device, size: Size) {
        *self = Self::new(device, size);
    }
}
