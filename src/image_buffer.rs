use crate::error::{Error, Result};

/// Decoded RGBA8 pixels, row-major, four bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
}

/// Normalized color at one pixel plus its BT.709 relative luminance.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct PixelSample {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
    pub brightness: f32,
}

impl PixelSample {
    fn from_rgba(rgba: &[u8]) -> Self {
        let r = rgba[0] as f32 / 255.;
        let g = rgba[1] as f32 / 255.;
        let b = rgba[2] as f32 / 255.;
        let a = rgba[3] as f32 / 255.;

        Self {
            r,
            g,
            b,
            a,
            brightness: luminance(r, g, b),
        }
    }
}

/// No gamma decoding is applied; channels are used as stored. Clamped so
/// float rounding on pure white cannot leave `[0, 1]`.
pub fn luminance(r: f32, g: f32, b: f32) -> f32 {
    (0.2126 * r + 0.7152 * g + 0.0722 * b).clamp(0.0, 1.0)
}

impl ImageBuffer {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidInput(format!(
                "image must have non-zero dimensions, got {}x{}",
                width, height
            )));
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(Error::InvalidInput(format!(
                "{}x{} RGBA image needs {} bytes, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }

        Ok(Self {
            pixels,
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Nearest-neighbor lookup at `(u, v)` in `[0, 1]`. `1.0` maps onto the
    /// last row/column.
    pub fn sample(&self, u: f32, v: f32) -> Result<PixelSample> {
        let in_range = |t: f32| (0.0..=1.0).contains(&t);
        if !in_range(u) || !in_range(v) {
            return Err(Error::InvalidInput(format!(
                "sample coordinates ({}, {}) outside [0, 1]",
                u, v
            )));
        }
        Ok(self.sample_unchecked(u, v))
    }

    /// Caller guarantees `u` and `v` are finite and within `[0, 1]`.
    pub(crate) fn sample_unchecked(&self, u: f32, v: f32) -> PixelSample {
        let x = ((u * self.width as f32) as u32).min(self.width - 1) as usize;
        let y = ((v * self.height as f32) as u32).min(self.height - 1) as usize;
        let index = (y * self.width as usize + x) * 4;

        PixelSample::from_rgba(&self.pixels[index..index + 4])
    }
}
