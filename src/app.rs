use std::{
    fs,
    path::PathBuf,
    sync::mpsc::{self, Receiver, TryRecvError},
    thread,
    time::Duration,
};

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use winit::{dpi::PhysicalSize, event::VirtualKeyCode, window::Window as WinitWindow};

use stardust::{
    decode,
    export::{self, FrameSequenceEncoder, GifSequenceEncoder, Recorder},
    Engine, FrameTimer, Settings, Window,
};

const DRIFT_STEP: f32 = 0.1;
const MAX_DRIFT: f32 = 5.;
const BLOOM_STEP: f32 = 0.1;
const MAX_BLOOM_STRENGTH: f32 = 3.;
const MAX_BLOOM_RADIUS: f32 = 1.5;
const DENSITY_STEP: usize = 5_000;
const MIN_DENSITY: usize = 5_000;
const MAX_DENSITY: usize = 200_000;

pub struct App {
    window: WinitWindow,
    engine: Engine,
    image_path: PathBuf,
    density: usize,
    frame_timer: FrameTimer,
    recorder: Option<Recorder>,
    gif_export: Option<Receiver<Result<PathBuf>>>,
}

impl App {
    pub fn new(window: WinitWindow, image_path: PathBuf, settings: Settings) -> Result<Self> {
        let density = settings.particle_count;
        let engine = Engine::new(&window, settings).context("Failed to create the engine")?;

        let mut app = Self {
            window,
            engine,
            image_path,
            density,
            frame_timer: FrameTimer::new(),
            recorder: None,
            gif_export: None,
        };
        app.load_image()?;
        Ok(app)
    }

    fn load_image(&mut self) -> Result<()> {
        let max_dimension = self.engine.settings().max_image_dimension;
        let image = decode::load_image(&self.image_path, max_dimension)?;
        self.engine
            .load_image(image, self.density)
            .with_context(|| format!("Failed to load {}", self.image_path.display()))
    }

    pub fn on_resize(&mut self, size: PhysicalSize<u32>) {
        if let Err(e) = self.engine.resize(size.into(), self.window.pixel_ratio()) {
            error!("Resize failed: {}", e);
        }
    }

    pub fn on_key_up(&mut self, keycode: VirtualKeyCode) {
        let scene = *self.engine.scene();
        match keycode {
            VirtualKeyCode::LBracket | VirtualKeyCode::RBracket => {
                let step = if keycode == VirtualKeyCode::LBracket {
                    -DRIFT_STEP
                } else {
                    DRIFT_STEP
                };
                let drift = (scene.drift + step).clamp(0., MAX_DRIFT);
                self.engine.set_drift(drift);
                info!("Drift: {:.1}", drift);
            }
            VirtualKeyCode::Minus | VirtualKeyCode::Equals => {
                let step = if keycode == VirtualKeyCode::Minus {
                    -BLOOM_STEP
                } else {
                    BLOOM_STEP
                };
                let strength = (scene.bloom.strength + step).clamp(0., MAX_BLOOM_STRENGTH);
                self.engine.set_bloom(strength);
                info!("Bloom strength: {:.1}", strength);
            }
            VirtualKeyCode::Comma | VirtualKeyCode::Period => {
                let step = if keycode == VirtualKeyCode::Comma {
                    -BLOOM_STEP
                } else {
                    BLOOM_STEP
                };
                let radius = (scene.bloom.radius + step).clamp(0., MAX_BLOOM_RADIUS);
                self.engine.set_bloom_radius(radius);
                info!("Bloom radius: {:.1}", radius);
            }
            VirtualKeyCode::J | VirtualKeyCode::K => {
                self.density = if keycode == VirtualKeyCode::J {
                    self.density.saturating_sub(DENSITY_STEP).max(MIN_DENSITY)
                } else {
                    (self.density + DENSITY_STEP).min(MAX_DENSITY)
                };
                info!("Density: {}", self.density);
                if let Err(e) = self.engine.regenerate(self.density) {
                    error!("Failed to regenerate particles: {}", e);
                }
            }
            VirtualKeyCode::P => {
                if let Err(e) = self.save_png() {
                    error!("PNG export failed: {:#}", e);
                }
            }
            VirtualKeyCode::G => self.start_recording(),
            VirtualKeyCode::R => {
                self.density = self.engine.settings().particle_count;
                self.engine.reset();
            }
            VirtualKeyCode::O => {
                if let Err(e) = self.load_image() {
                    error!("{:#}", e);
                }
            }
            _ => (),
        }
    }

    fn save_png(&mut self) -> Result<()> {
        let frame = self.engine.capture_frame()?;
        let bytes = export::encode_png(&frame)?;
        let path = PathBuf::from(export::timestamped_file_name("png"));
        fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Saved {}", path.display());
        Ok(())
    }

    fn start_recording(&mut self) {
        if self.recorder.is_some() || self.gif_export.is_some() {
            warn!("A GIF export is already running");
            return;
        }
        let settings = self.engine.settings();
        match Recorder::new(settings.recording_duration, settings.recording_fps) {
            Ok(recorder) => {
                info!("Recording {} frames", recorder.total_frames());
                self.recorder = Some(recorder);
            }
            Err(e) => error!("Cannot record: {}", e),
        }
    }

    pub fn render(&mut self) {
        let delta = self.frame_timer.tick();
        self.engine.advance(delta);

        self.poll_recording(delta);
        self.poll_gif_export();

        if let Err(e) = self.engine.render() {
            error!("Render failed: {}", e);
        }
    }

    fn poll_recording(&mut self, delta: Duration) {
        let recorder = match &mut self.recorder {
            Some(recorder) => recorder,
            None => return,
        };

        if let Err(e) = recorder.on_tick(delta, &mut self.engine) {
            error!("GIF capture failed: {}", e);
            self.recorder = None;
            return;
        }
        if !recorder.is_complete() {
            return;
        }

        let frames = match self.recorder.take() {
            Some(recorder) => recorder.into_frames(),
            None => return,
        };
        let (sender, receiver) = mpsc::channel();
        thread::spawn(move || {
            let result = GifSequenceEncoder::default()
                .encode(&frames, &mut |p| debug!("Encoding {:.0}%", (p - 0.5) * 200.))
                .and_then(|bytes| {
                    let path = PathBuf::from(export::timestamped_file_name("gif"));
                    fs::write(&path, bytes)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    Ok(path)
                });
            let _ = sender.send(result);
        });
        self.gif_export = Some(receiver);
    }

    fn poll_gif_export(&mut self) {
        let receiver = match &self.gif_export {
            Some(receiver) => receiver,
            None => return,
        };
        match receiver.try_recv() {
            Ok(Ok(path)) => info!("Saved {}", path.display()),
            Ok(Err(e)) => error!("GIF export failed: {:#}", e),
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => error!("GIF encoder thread exited early"),
        }
        self.gif_export = None;
    }
}
