use std::num::NonZeroU32;

use pollster::FutureExt;

use crate::{
    error::{Error, Result},
    frame_buffers::FrameBuffer,
    window::Size,
};

const BYTES_PER_PIXEL: u32 = 4;

/// Tightly packed RGBA8 frame, rows top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Staging buffer that the output frame is copied into for CPU readback.
pub struct FrameCapture {
    readback_buffer: wgpu::Buffer,
    size: Size,
    unpadded_bytes_per_row: u32,
    padded_bytes_per_row: u32,
}

impl FrameCapture {
    pub fn new(device: &wgpu::Device, size: Size) -> Self {
        let unpadded_bytes_per_row = size.width * BYTES_PER_PIXEL;
        let padded_bytes_per_row =
            align_to(unpadded_bytes_per_row, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);

        let readback_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Capture Readback Buffer"),
            size: u64::from(padded_bytes_per_row) * u64::from(size.height),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            readback_buffer,
            size,
            unpadded_bytes_per_row,
            padded_bytes_per_row,
        }
    }

    pub fn copy_from(&self, encoder: &mut wgpu::CommandEncoder, source: &FrameBuffer) -> Result<()> {
        if source.size != self.size {
            return Err(Error::Capture(format!(
                "source is {}x{} but the readback buffer is {}x{}",
                source.size.width, source.size.height, self.size.width, self.size.height
            )));
        }

        let padded_bytes_per_row = NonZeroU32::new(self.padded_bytes_per_row).ok_or_else(|| {
            Error::Capture(format!("invalid padded row size {}", self.padded_bytes_per_row))
        })?;
        let rows_per_image = NonZeroU32::new(self.size.height)
            .ok_or_else(|| Error::Capture(format!("invalid frame height {}", self.size.height)))?;

        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &source.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &self.readback_buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(rows_per_image),
                },
            },
            self.size.into(),
        );

        Ok(())
    }

    /// Blocks until the copy submitted after `copy_from` has landed.
    pub fn read(&self, device: &wgpu::Device) -> Result<RasterImage> {
        let buffer_slice = self.readback_buffer.slice(..);
        let mapping = buffer_slice.map_async(wgpu::MapMode::Read);
        device.poll(wgpu::Maintain::Wait);
        mapping
            .block_on()
            .map_err(|e| Error::Capture(format!("GPU buffer mapping failed: {}", e)))?;

        let pixels = {
            let mapped = buffer_slice.get_mapped_range();
            copy_tight_rows(
                &mapped,
                self.unpadded_bytes_per_row,
                self.padded_bytes_per_row,
                self.size.height,
            )
        };
        self.readback_buffer.unmap();

        Ok(RasterImage {
            pixels: pixels?,
            width: self.size.width,
            height: self.size.height,
        })
    }
}

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}

fn copy_tight_rows(
    mapped: &[u8],
    unpadded_bytes_per_row: u32,
    padded_bytes_per_row: u32,
    height: u32,
) -> Result<Vec<u8>> {
    let required_len = padded_bytes_per_row as usize * height as usize;
    if mapped.len() < required_len {
        return Err(Error::Capture(format!(
            "mapped frame too small: expected at least {} bytes, got {}",
            required_len,
            mapped.len()
        )));
    }

    let pixels = mapped
        .chunks_exact(padded_bytes_per_row as usize)
        .take(height as usize)
        .flat_map(|row| &row[..unpadded_bytes_per_row as usize])
        .copied()
        .collect::<Vec<_>>();

    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_to_rounds_up_to_the_copy_alignment() {
        assert_eq!(align_to(4, 256), 256);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(257, 256), 512);
    }

    #[test]
    fn copy_tight_rows_strips_padding() {
        let mapped = [1, 2, 3, 4, 0, 0, 0, 0, 5, 6, 7, 8, 0, 0, 0, 0];
        let tight = copy_tight_rows(&mapped, 4, 8, 2).unwrap();
        assert_eq!(tight, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn copy_tight_rows_keeps_already_tight_rows() {
        let mapped = [1, 2, 3, 4, 5, 6, 7, 8];
        let tight = copy_tight_rows(&mapped, 4, 4, 2).unwrap();
        assert_eq!(tight, mapped.to_vec());
    }

    #[test]
    fn copy_tight_rows_rejects_short_buffers() {
        let mapped = [0u8; 12];
        assert!(matches!(
            copy_tight_rows(&mapped, 4, 8, 2),
            Err(Error::Capture(_))
        ));
    }
}
