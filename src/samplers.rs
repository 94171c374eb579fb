pub struct Samplers {
    /// Used by the bloom chain when reading across resolutions.
    pub bilinear: wgpu::Sampler,
    /// Used for same-size blits, so presented pixels match captured ones.
    pub nearest: wgpu::Sampler,
}

impl Samplers {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            bilinear: clamped_sampler(device, "Bilinear Clamp Sampler", wgpu::FilterMode::Linear),
            nearest: clamped_sampler(device, "Nearest Clamp Sampler", wgpu::FilterMode::Nearest),
        }
    }
}

fn clamped_sampler(device: &wgpu::Device, label: &str, filter: wgpu::FilterMode) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter,
        min_filter: filter,
        ..Default::default()
    })
}
