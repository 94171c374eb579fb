use std::time::Duration;

use stardust::{
    export::{FrameSequenceEncoder, GifSequenceEncoder, Recorder},
    Engine, Error, ImageBuffer, Settings, Size,
};

fn gradient_image(width: u32, height: u32) -> ImageBuffer {
    let pixels = (0..width * height)
        .flat_map(|i| {
            let x = (i % width) as f32 / width as f32;
            let y = (i / width) as f32 / height as f32;
            [(x * 255.) as u8, (y * 255.) as u8, 200, 255]
        })
        .collect();
    ImageBuffer::new(pixels, width, height).unwrap()
}

fn engine(size: Size) -> Engine {
    let settings = Settings {
        seed: Some(7),
        bloom_strength: 1.0,
        drift: 1.0,
        ..Default::default()
    };
    Engine::headless(size, settings).unwrap()
}

#[test]
#[ignore = "requires a GPU adapter"]
fn empty_scene_renders_black() {
    let mut engine = engine(Size::new(64, 48));
    engine.tick(Duration::from_millis(16)).unwrap();

    let frame = engine.capture_frame().unwrap();
    assert_eq!((frame.width, frame.height), (64, 48));
    assert_eq!(frame.pixels.len(), 64 * 48 * 4);
    assert!(frame.pixels.chunks_exact(4).all(|px| px[..3] == [0, 0, 0]));
}

#[test]
#[ignore = "requires a GPU adapter"]
fn consecutive_captures_are_identical() {
    let mut engine = engine(Size::new(160, 90));
    engine.load_image(gradient_image(40, 20), 5_000).unwrap();
    engine.advance(Duration::from_millis(750));

    let first = engine.capture_frame().unwrap();
    let second = engine.capture_frame().unwrap();
    assert_eq!(first, second);
    assert!(first.pixels.chunks_exact(4).any(|px| px[..3] != [0, 0, 0]));
}

#[test]
#[ignore = "requires a GPU adapter"]
fn capture_leaves_the_clock_alone() {
    let mut engine = engine(Size::new(32, 32));
    engine.advance(Duration::from_millis(100));
    engine.capture_frame().unwrap();
    assert_eq!(engine.elapsed(), Duration::from_millis(100));
}

#[test]
#[ignore = "requires a GPU adapter"]
fn regenerate_replaces_the_resident_set() {
    let mut engine = engine(Size::new(64, 64));
    engine.load_image(gradient_image(16, 16), 1_000).unwrap();
    assert_eq!(engine.particle_count(), 1_000);

    engine.regenerate(2_500).unwrap();
    assert_eq!(engine.particle_count(), 2_500);

    assert!(matches!(engine.regenerate(0), Err(Error::InvalidInput(_))));
    assert_eq!(engine.particle_count(), 2_500);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn loading_a_wide_image_pulls_the_camera_back() {
    let mut engine = engine(Size::new(100, 100));
    engine.load_image(gradient_image(10, 10), 100).unwrap();
    let square = engine.scene().camera.position.z;

    engine.load_image(gradient_image(30, 10), 100).unwrap();
    assert!(engine.scene().camera.position.z > square);
    assert_eq!(engine.scene().image_aspect, 3.0);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn resize_changes_the_captured_resolution() {
    let mut engine = engine(Size::new(64, 64));
    engine.resize(Size::new(100, 30), 1.0).unwrap();
    let frame = engine.capture_frame().unwrap();
    assert_eq!((frame.width, frame.height), (100, 30));

    engine.resize(Size::new(0, 30), 1.0).unwrap();
    assert_eq!(engine.size(), Size::new(100, 30));
}

#[test]
#[ignore = "requires a GPU adapter"]
fn oversized_targets_are_rejected() {
    assert!(matches!(
        Engine::headless(Size::new(1 << 15, 16), Settings::default()),
        Err(Error::ResourceAcquisition(_))
    ));

    let mut engine = engine(Size::new(64, 64));
    assert!(matches!(
        engine.resize(Size::new(16, 1 << 15), 1.0),
        Err(Error::ResourceAcquisition(_))
    ));
    assert_eq!(engine.size(), Size::new(64, 64));
    let frame = engine.capture_frame().unwrap();
    assert_eq!((frame.width, frame.height), (64, 64));
}

#[test]
#[ignore = "requires a GPU adapter"]
fn loading_an_image_restores_configured_controls() {
    let mut engine = engine(Size::new(64, 64));
    engine.load_image(gradient_image(16, 16), 1_000).unwrap();
    engine.set_drift(2.0);
    engine.set_bloom(2.5);
    engine.set_bloom_radius(0.3);
    engine.set_bloom_threshold(0.8);
    engine.advance(Duration::from_secs(3));

    engine.load_image(gradient_image(16, 16), 1_000).unwrap();
    let settings = engine.settings().clone();
    let scene = engine.scene();
    assert_eq!(scene.drift, settings.drift);
    assert_eq!(scene.bloom.strength, settings.bloom_strength);
    assert_eq!(scene.bloom.radius, settings.bloom_radius);
    assert_eq!(scene.bloom.threshold, settings.bloom_threshold);
    assert_eq!(scene.elapsed, 0.);
    assert_eq!(engine.elapsed(), Duration::ZERO);
}

fn bloomed_engine() -> Engine {
    let mut engine = engine(Size::new(160, 90));
    engine.load_image(gradient_image(40, 20), 20_000).unwrap();
    engine.set_bloom(2.0);
    engine
}

#[test]
#[ignore = "requires a GPU adapter"]
fn bloom_threshold_changes_the_frame() {
    let mut engine = bloomed_engine();

    engine.set_bloom_threshold(0.0);
    let everything_glows = engine.capture_frame().unwrap();
    engine.set_bloom_threshold(1.0);
    let only_hot_spots_glow = engine.capture_frame().unwrap();

    assert_ne!(everything_glows, only_hot_spots_glow);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn bloom_radius_changes_the_frame() {
    let mut engine = bloomed_engine();

    engine.set_bloom_radius(0.0);
    let tight = engine.capture_frame().unwrap();
    engine.set_bloom_radius(1.5);
    let wide = engine.capture_frame().unwrap();

    assert_ne!(tight, wide);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn reset_releases_particles() {
    let mut engine = engine(Size::new(32, 32));
    engine.load_image(gradient_image(8, 8), 500).unwrap();
    engine.set_bloom(2.5);
    engine.reset();

    assert_eq!(engine.particle_count(), 0);
    assert!(engine.image().is_none());
    assert_eq!(engine.scene().bloom.strength, 1.0);
    engine.render().unwrap();
}

#[test]
#[ignore = "requires a GPU adapter"]
fn recorded_frames_encode_to_gif() {
    let mut engine = engine(Size::new(48, 32));
    engine.load_image(gradient_image(12, 8), 2_000).unwrap();

    let frames = Recorder::new(Duration::from_millis(200), 20)
        .unwrap()
        .record(&mut engine, |_| {})
        .unwrap();
    assert_eq!(frames.len(), 4);
    assert_eq!(engine.elapsed(), Duration::from_millis(200));

    let bytes = GifSequenceEncoder::default()
        .encode(&frames, &mut |_| {})
        .unwrap();
    assert!(bytes.starts_with(b"GIF89a"));
}
