use std::path::Path;

use anyhow::Context;
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use log::{debug, info};

use crate::image_buffer::ImageBuffer;

/// Decodes `path` and scales it down to fit `max_dimension`.
pub fn load_image(path: impl AsRef<Path>, max_dimension: u32) -> anyhow::Result<ImageBuffer> {
    let path = path.as_ref();
    let image = image::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    info!(
        "Decoded {} ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );
    from_dynamic_image(image, max_dimension)
}

/// Aspect ratio is preserved; images already within bounds are not resampled.
pub fn from_dynamic_image(image: DynamicImage, max_dimension: u32) -> anyhow::Result<ImageBuffer> {
    let (width, height) = image.dimensions();
    let image = match fitted_dimensions(width, height, max_dimension) {
        Some((w, h)) => {
            debug!("Resizing {}x{} to {}x{}", width, height, w, h);
            image.resize_exact(w, h, FilterType::Triangle)
        }
        None => image,
    };

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(ImageBuffer::new(rgba.into_raw(), width, height)?)
}

/// Target size when `max(width, height)` exceeds `max_dimension`.
fn fitted_dimensions(width: u32, height: u32, max_dimension: u32) -> Option<(u32, u32)> {
    let longest = width.max(height);
    if longest <= max_dimension || max_dimension == 0 {
        return None;
    }
    let scale = max_dimension as f64 / longest as f64;
    let fit = |side: u32| ((side as f64 * scale).round() as u32).clamp(1, max_dimension);
    Some((fit(width), fit(height)))
}
