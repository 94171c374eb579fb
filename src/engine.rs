use std::time::{Duration, SystemTime};

use log::{debug, info};
use pollster::FutureExt as _;

use crate::{
    capture::RasterImage,
    clock::AnimationClock,
    config::Settings,
    entity::Scene,
    error::{Error, Result},
    export::FrameSource,
    image_buffer::ImageBuffer,
    particle_field::ParticleSet,
    renderer::Renderer,
    window::{Size, Window},
};

/// The public face of the library: one loaded image, its particle field and
/// the render state that animates it.
///
/// The engine never schedules itself. Call `advance` then `render` (or
/// `tick`) once per display refresh.
pub struct Engine {
    renderer: Renderer,
    scene: Scene,
    clock: AnimationClock,
    settings: Settings,
    image: Option<ImageBuffer>,
    seed: u64,
}

impl Engine {
    pub fn new(window: &impl Window, settings: Settings) -> Result<Self> {
        let renderer = Renderer::new(window).block_on()?;
        Ok(Self::with_renderer(renderer, settings, window.pixel_ratio()))
    }

    pub fn headless(size: Size, settings: Settings) -> Result<Self> {
        let renderer = Renderer::headless(size).block_on()?;
        Ok(Self::with_renderer(renderer, settings, 1.))
    }

    fn with_renderer(renderer: Renderer, settings: Settings, pixel_ratio: f32) -> Self {
        let seed = settings.seed.unwrap_or_else(time_seed);
        info!("Seeded particle generation with {}", seed);

        let scene = Scene::new(&settings, renderer.size().aspect_ratio(), pixel_ratio);

        Self {
            renderer,
            scene,
            clock: AnimationClock::new(),
            settings,
            image: None,
            seed,
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn size(&self) -> Size {
        self.renderer.size()
    }

    pub fn image(&self) -> Option<&ImageBuffer> {
        self.image.as_ref()
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed()
    }

    /// Number of particles resident on the GPU.
    pub fn particle_count(&self) -> u32 {
        self.renderer.particle_count()
    }

    /// Replaces the current image and its particles. The animation restarts
    /// from zero and drift, bloom and camera go back to the configured
    /// values. On error the previous image and state are kept.
    pub fn load_image(&mut self, image: ImageBuffer, count: usize) -> Result<()> {
        let set = ParticleSet::generate(&image, count, self.seed)?;
        self.renderer.replace_particles(&set)?;
        self.scene = self.configured_scene();
        self.scene.image_aspect = set.image_aspect();
        self.fit_camera();
        info!(
            "Loaded {}x{} image as {} particles",
            image.width(),
            image.height(),
            set.len()
        );
        self.image = Some(image);
        self.clock.reset();
        Ok(())
    }

    /// Rebuilds the particle field of the retained image with a new count.
    pub fn regenerate(&mut self, count: usize) -> Result<()> {
        if count == 0 {
            return Err(Error::InvalidInput(
                "particle count must be greater than zero".to_string(),
            ));
        }
        let image = match &self.image {
            Some(image) => image,
            None => {
                debug!("No image loaded; nothing to regenerate");
                return Ok(());
            }
        };
        let set = ParticleSet::generate(image, count, self.seed)?;
        self.renderer.replace_particles(&set)?;
        self.scene.image_aspect = set.image_aspect();
        self.fit_camera();
        Ok(())
    }

    /// Render state as `Settings` describes it, at the current target size.
    fn configured_scene(&self) -> Scene {
        Scene::new(
            &self.settings,
            self.renderer.size().aspect_ratio(),
            self.scene.pixel_ratio,
        )
    }

    fn fit_camera(&mut self) {
        self.scene.fit_camera(self.renderer.size().aspect_ratio());
        debug!(
            "Camera fitted at z = {} (image aspect {})",
            self.scene.camera.position.z, self.scene.image_aspect
        );
    }

    pub fn set_drift(&mut self, drift: f32) {
        self.scene.drift = drift;
    }

    pub fn set_bloom(&mut self, strength: f32) {
        self.scene.bloom.strength = strength;
    }

    pub fn set_bloom_radius(&mut self, radius: f32) {
        self.scene.bloom.radius = radius;
    }

    pub fn set_bloom_threshold(&mut self, threshold: f32) {
        self.scene.bloom.threshold = threshold;
    }

    /// Fails with `ResourceAcquisition` when `size` exceeds what the device
    /// can render; the previous size stays in effect.
    pub fn resize(&mut self, size: Size, pixel_ratio: f32) -> Result<()> {
        if size.is_empty() {
            debug!("Ignoring resize to {}x{}", size.width, size.height);
            return Ok(());
        }
        self.renderer.resize(size)?;
        self.scene.pixel_ratio = pixel_ratio.min(self.settings.max_pixel_ratio);
        self.fit_camera();
        Ok(())
    }

    pub fn advance(&mut self, delta: Duration) {
        self.clock.advance(delta);
        self.scene.elapsed = self.clock.elapsed_secs();
    }

    pub fn render(&mut self) -> Result<()> {
        self.renderer.render(&self.scene)
    }

    pub fn tick(&mut self, delta: Duration) -> Result<()> {
        self.advance(delta);
        self.render()
    }

    /// Renders the current state offscreen and reads it back. Does not
    /// advance the clock.
    pub fn capture_frame(&mut self) -> Result<RasterImage> {
        self.renderer.capture(&self.scene)
    }

    /// Drops the particles and the retained image and restores the
    /// configured defaults.
    pub fn reset(&mut self) {
        self.renderer.clear_particles();
        self.image = None;
        self.clock.reset();
        self.scene = self.configured_scene();
        info!("Engine reset");
    }
}

impl FrameSource for Engine {
    fn advance(&mut self, delta: Duration) {
        Engine::advance(self, delta);
    }

    fn capture_frame(&mut self) -> Result<RasterImage> {
        Engine::capture_frame(self)
    }
}

fn time_seed() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
