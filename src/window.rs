pub trait HasSize {
    fn size(&self) -> Size;
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    /// Halves both sides `level` times, never going below one pixel.
    pub fn downscaled(&self, level: u32) -> Self {
        Self {
            width: (self.width >> level).max(1),
            height: (self.height >> level).max(1),
        }
    }
}

impl From<Size> for wgpu::Extent3d {
    fn from(size: Size) -> Self {
        Self {
            width: size.width,
            height: size.height,
            depth_or_array_layers: 1,
        }
    }
}

impl From<winit::dpi::PhysicalSize<u32>> for Size {
    fn from(size: winit::dpi::PhysicalSize<u32>) -> Self {
        Self {
            width: size.width,
            height: size.height,
        }
    }
}

impl HasSize for winit::window::Window {
    fn size(&self) -> Size {
        self.inner_size().into()
    }
}

pub trait Window: HasSize + raw_window_handle::HasRawWindowHandle {
    fn pixel_ratio(&self) -> f32;
}

impl Window for winit::window::Window {
    fn pixel_ratio(&self) -> f32 {
        self.scale_factor() as f32
    }
}
