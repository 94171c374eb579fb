//! Turns a still image into an animated, bloomed particle field.
//!
//! [`Engine`] is the entry point. Decoding and export live in [`decode`]
//! and [`export`].

mod bloom_pass;
mod capture;
mod clock;
mod composite_pass;
mod config;
pub mod decode;
mod engine;
mod entity;
mod error;
pub mod export;
mod frame_buffers;
mod image_buffer;
mod particle_field;
mod particle_pass;
mod present_pass;
mod renderer;
mod samplers;
mod surface;
mod window;

pub use capture::RasterImage;
pub use clock::{AnimationClock, FrameTimer};
pub use config::Settings;
pub use engine::Engine;
pub use entity::{fit_distance, Bloom, Camera, Scene};
pub use error::{Error, Result};
pub use image_buffer::{luminance, ImageBuffer, PixelSample};
pub use particle_field::{ParticleInstance, ParticleSet, FIELD_DEPTH, FIELD_EXTENT};
pub use window::{HasSize, Size, Window};
