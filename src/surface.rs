use log::{debug, warn};

use crate::{
    error::{Error, Result},
    window::Size,
};

pub struct Surface {
    pub wgpu_surface: wgpu::Surface,
    pub texture_format: wgpu::TextureFormat,
}

impl Surface {
    pub fn new(wgpu_surface: wgpu::Surface, texture_format: wgpu::TextureFormat) -> Self {
        Self {
            wgpu_surface,
            texture_format,
        }
    }

    pub fn configure(&self, device: &wgpu::Device, size: Size) {
        self.wgpu_surface.configure(
            device,
            &wgpu::SurfaceConfiguration {
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                format: self.texture_format,
                width: size.width,
                height: size.height,
                present_mode: wgpu::PresentMode::Fifo,
            },
        );
    }

    /// Returns `None` when this frame should be skipped. A lost or outdated
    /// surface is reconfigured before returning.
    pub fn acquire(&self, device: &wgpu::Device, size: Size) -> Result<Option<wgpu::SurfaceTexture>> {
        match self.wgpu_surface.get_current_texture() {
            Ok(frame) => Ok(Some(frame)),
            Err(e @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                warn!("{}; reconfiguring surface", e);
                self.configure(device, size);
                Ok(None)
            }
            Err(wgpu::SurfaceError::Timeout) => {
                debug!("Surface timed out; skipping frame");
                Ok(None)
            }
            Err(wgpu::SurfaceError::OutOfMemory) => Err(Error::ResourceAcquisition(
                "out of memory while acquiring the surface texture".to_string(),
            )),
        }
    }
}
