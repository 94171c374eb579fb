use log::{debug, info};

use crate::{
    bloom_pass::BloomRenderer,
    capture::{FrameCapture, RasterImage},
    composite_pass::CompositeRenderer,
    entity::Scene,
    error::{Error, Result},
    frame_buffers::FrameBuffers,
    particle_field::ParticleSet,
    particle_pass::ParticleRenderer,
    present_pass::PresentRenderPass,
    samplers::Samplers,
    surface::Surface,
    window::{Size, Window},
};

/// Window surface plus the pass that blits the output frame onto it.
struct Presenter {
    surface: Surface,
    present_pass: PresentRenderPass,
}

/// Owns the GPU context and every pass. The offscreen chain is
/// particles → bloom → composite; the composited frame is what both the
/// window and frame capture see.
pub struct Renderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    size: Size,
    presenter: Option<Presenter>,
    frame_buffers: FrameBuffers,
    samplers: Samplers,
    particle_renderer: ParticleRenderer,
    bloom_renderer: BloomRenderer,
    composite_renderer: CompositeRenderer,
    frame_capture: FrameCapture,
}

impl Renderer {
    pub async fn new(window: &impl Window) -> Result<Self> {
        let size = window.size();
        if size.is_empty() {
            return Err(Error::ResourceAcquisition(
                "cannot create a surface for a zero-sized window".to_string(),
            ));
        }

        let instance = wgpu::Instance::new(wgpu::Backends::PRIMARY);
        let wgpu_surface = unsafe { instance.create_surface(window) };

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&wgpu_surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| Error::ResourceAcquisition("no adapter found".to_string()))?;

        let surface_format = wgpu_surface.get_preferred_format(&adapter).ok_or_else(|| {
            Error::ResourceAcquisition("surface is incompatible with the adapter".to_string())
        })?;

        let (device, queue) = request_device(&adapter).await?;
        check_target_size(size, device.limits().max_texture_dimension_2d)?;

        let surface = Surface::new(wgpu_surface, surface_format);
        surface.configure(&device, size);
        info!("Configured {:?} surface at {}x{}", surface_format, size.width, size.height);

        Ok(Self::from_parts(device, queue, size, Some(surface)))
    }

    /// Renders offscreen only; frames are reachable through `capture`.
    pub async fn headless(size: Size) -> Result<Self> {
        if size.is_empty() {
            return Err(Error::InvalidInput(format!(
                "headless target must be non-empty, got {}x{}",
                size.width, size.height
            )));
        }

        let instance = wgpu::Instance::new(wgpu::Backends::PRIMARY);
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| Error::ResourceAcquisition("no adapter found".to_string()))?;

        let (device, queue) = request_device(&adapter).await?;
        check_target_size(size, device.limits().max_texture_dimension_2d)?;
        info!("Created headless renderer at {}x{}", size.width, size.height);

        Ok(Self::from_parts(device, queue, size, None))
    }

    fn from_parts(
        device: wgpu::Device,
        queue: wgpu::Queue,
        size: Size,
        surface: Option<Surface>,
    ) -> Self {
        let frame_buffers = FrameBuffers::new(&device, size);
        let samplers = Samplers::new(&device);

        let particle_renderer = ParticleRenderer::new(&device);
        let bloom_renderer = BloomRenderer::new(&device, &frame_buffers, &samplers);
        let composite_renderer = CompositeRenderer::new(&device, &frame_buffers, &samplers);
        let frame_capture = FrameCapture::new(&device, size);

        let presenter = surface.map(|surface| {
            let present_pass =
                PresentRenderPass::new(&device, &frame_buffers, &samplers, surface.texture_format);
            Presenter {
                surface,
                present_pass,
            }
        });

        Self {
            device,
            queue,
            size,
            presenter,
            frame_buffers,
            samplers,
            particle_renderer,
            bloom_renderer,
            composite_renderer,
            frame_capture,
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    /// A zero-sized target (e.g. a minimized window) is ignored. A target
    /// beyond the device's texture limit is rejected and the current targets
    /// are kept.
    pub fn resize(&mut self, size: Size) -> Result<()> {
        if size.is_empty() {
            debug!("Ignoring resize to {}x{}", size.width, size.height);
            return Ok(());
        }
        if size == self.size {
            return Ok(());
        }
        check_target_size(size, self.device.limits().max_texture_dimension_2d)?;
        debug!("Resizing render targets to {}x{}", size.width, size.height);

        self.size = size;
        self.frame_buffers.resize(&self.device, size);
        self.bloom_renderer
            .recreate_bind_group(&self.device, &self.frame_buffers, &self.samplers);
        self.composite_renderer
            .recreate_bind_group(&self.device, &self.frame_buffers, &self.samplers);
        self.frame_capture = FrameCapture::new(&self.device, size);

        if let Some(presenter) = &mut self.presenter {
            presenter.surface.configure(&self.device, size);
            presenter
                .present_pass
                .recreate_bind_group(&self.device, &self.frame_buffers, &self.samplers);
        }

        Ok(())
    }

    pub fn replace_particles(&mut self, set: &ParticleSet) -> Result<()> {
        self.particle_renderer.replace_particles(&self.device, set)
    }

    pub fn clear_particles(&mut self) {
        self.particle_renderer.clear_particles();
    }

    pub fn particle_count(&self) -> u32 {
        self.particle_renderer.particle_count()
    }

    /// Renders one frame and presents it. A frame the surface refuses is
    /// skipped without error.
    pub fn render(&mut self, scene: &Scene) -> Result<()> {
        let surface_texture = match &self.presenter {
            Some(presenter) => match presenter.surface.acquire(&self.device, self.size)? {
                Some(frame) => Some(frame),
                None => return Ok(()),
            },
            None => None,
        };

        self.update(scene);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Command Encoder"),
            });
        self.encode_offscreen(&mut encoder);

        if let (Some(presenter), Some(frame)) = (&self.presenter, &surface_texture) {
            let view = frame
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default());
            presenter.present_pass.draw(&mut encoder, &view);
        }

        self.queue.submit(Some(encoder.finish()));

        if let Some(frame) = surface_texture {
            frame.present();
        }

        Ok(())
    }

    /// Renders `scene` offscreen and reads the composited frame back. The
    /// window surface is left untouched.
    pub fn capture(&mut self, scene: &Scene) -> Result<RasterImage> {
        self.update(scene);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Capture Command Encoder"),
            });
        self.encode_offscreen(&mut encoder);
        self.frame_capture
            .copy_from(&mut encoder, &self.frame_buffers.output)?;
        self.queue.submit(Some(encoder.finish()));

        self.frame_capture.read(&self.device)
    }

    fn update(&self, scene: &Scene) {
        self.particle_renderer
            .update(&self.queue, scene, self.frame_buffers.size);
        self.bloom_renderer.update(&self.queue, scene);
        self.composite_renderer.update(&self.queue, scene);
    }

    fn encode_offscreen(&self, encoder: &mut wgpu::CommandEncoder) {
        self.particle_renderer.draw(encoder, &self.frame_buffers);
        self.bloom_renderer.draw(encoder, &self.frame_buffers);
        self.composite_renderer.draw(encoder, &self.frame_buffers);
    }
}

async fn request_device(adapter: &wgpu::Adapter) -> Result<(wgpu::Device, wgpu::Queue)> {
    adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("Stardust Device"),
                features: wgpu::Features::empty(),
                limits: wgpu::Limits::default(),
            },
            None,
        )
        .await
        .map_err(|e| Error::ResourceAcquisition(format!("no device found: {}", e)))
}

fn check_target_size(size: Size, max_dimension: u32) -> Result<()> {
    if size.width > max_dimension || size.height > max_dimension {
        return Err(Error::ResourceAcquisition(format!(
            "{}x{} render target exceeds the device limit of {} px",
            size.width, size.height, max_dimension
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_size_within_limit_is_accepted() {
        assert!(check_target_size(Size::new(8192, 8192), 8192).is_ok());
        assert!(check_target_size(Size::new(1, 1), 8192).is_ok());
    }

    #[test]
    fn target_size_over_limit_is_rejected() {
        assert!(matches!(
            check_target_size(Size::new(8193, 16), 8192),
            Err(Error::ResourceAcquisition(_))
        ));
        assert!(matches!(
            check_target_size(Size::new(16, 1 << 15), 8192),
            Err(Error::ResourceAcquisition(_))
        ));
    }
}
