use bytemuck::{Pod, Zeroable};
use glam::{vec3, Vec3};
use rand::prelude::*;
use rand_pcg::Pcg64Mcg;
use rayon::prelude::*;

use crate::{
    error::{Error, Result},
    image_buffer::ImageBuffer,
};

/// Width of the field in world units. Height is `FIELD_EXTENT / aspect`.
pub const FIELD_EXTENT: f32 = 10.0;
pub const FIELD_DEPTH: f32 = 0.1;

/// One particle as uploaded to the instance buffer.
#[derive(Debug, Copy, Clone, PartialEq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct ParticleInstance {
    pub position: Vec3,
    pub size: f32,
    pub color: Vec3,
    pub seed: f32,
}

/// A generated point cloud held as parallel arrays of equal length.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParticleSet {
    positions: Vec<Vec3>,
    colors: Vec<Vec3>,
    sizes: Vec<f32>,
    seeds: Vec<f32>,
    image_aspect: f32,
}

impl ParticleSet {
    /// Every draw yields a particle; brightness only modulates color and size.
    pub fn generate(image: &ImageBuffer, count: usize, seed: u64) -> Result<Self> {
        if count == 0 {
            return Err(Error::InvalidInput(
                "particle count must be greater than zero".to_string(),
            ));
        }

        let image_aspect = image.aspect_ratio();

        let instances: Vec<_> = (0..count)
            .into_par_iter()
            .map(|i| {
                let mut rng = particle_rng(seed, i as u64);
                spawn_particle(image, image_aspect, &mut rng)
            })
            .collect();

        let mut set = Self {
            positions: Vec::with_capacity(count),
            colors: Vec::with_capacity(count),
            sizes: Vec::with_capacity(count),
            seeds: Vec::with_capacity(count),
            image_aspect,
        };
        for instance in instances {
            set.positions.push(instance.position);
            set.colors.push(instance.color);
            set.sizes.push(instance.size);
            set.seeds.push(instance.seed);
        }

        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn image_aspect(&self) -> f32 {
        self.image_aspect
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn colors(&self) -> &[Vec3] {
        &self.colors
    }

    pub fn sizes(&self) -> &[f32] {
        &self.sizes
    }

    pub fn seeds(&self) -> &[f32] {
        &self.seeds
    }

    pub fn instances(&self) -> Vec<ParticleInstance> {
        (0..self.len())
            .map(|i| ParticleInstance {
                position: self.positions[i],
                size: self.sizes[i],
                color: self.colors[i],
                seed: self.seeds[i],
            })
            .collect()
    }
}

fn particle_rng(seed: u64, index: u64) -> Pcg64Mcg {
    Pcg64Mcg::seed_from_u64(seed ^ index.wrapping_mul(0x9e37_79b9_7f4a_7c15))
}

/// `u, v` in `[0, 1)` mapped to world space, width normalized to `FIELD_EXTENT`.
pub fn field_position(u: f32, v: f32, z: f32, image_aspect: f32) -> Vec3 {
    vec3(
        (u - 0.5) * FIELD_EXTENT * image_aspect,
        (0.5 - v) * FIELD_EXTENT,
        z,
    )
}

/// Darker samples get a larger boost so they still reach the bloom threshold.
/// The result is intentionally left unclamped.
pub fn boost_color(r: f32, g: f32, b: f32, brightness: f32) -> Vec3 {
    let boost = 0.2 + (1.0 - brightness) * 0.15;
    vec3(r + r * boost, g + g * boost, b + b * boost)
}

pub fn particle_size(size_rand: f32, brightness: f32) -> f32 {
    (size_rand + 1.0) * (brightness * 0.6 + 0.4)
}

fn spawn_particle(image: &ImageBuffer, image_aspect: f32, rng: &mut impl Rng) -> ParticleInstance {
    let u: f32 = rng.gen_range(0.0..1.0);
    let v: f32 = rng.gen_range(0.0..1.0);
    let sample = image.sample_unchecked(u, v);

    let z = rng.gen_range(-FIELD_DEPTH..FIELD_DEPTH);
    let size_rand = rng.gen_range(0.0..2.0);

    ParticleInstance {
        position: field_position(u, v, z, image_aspect),
        size: particle_size(size_rand, sample.brightness),
        color: boost_color(sample.r, sample.g, sample.b, sample.brightness),
        seed: rng.gen_range(0.0..1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> ImageBuffer {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        ImageBuffer::new(pixels, width, height).unwrap()
    }

    #[test]
    fn zero_count_is_rejected() {
        let image = solid(4, 4, [255; 4]);
        assert!(matches!(
            ParticleSet::generate(&image, 0, 1),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn arrays_share_count_and_stay_in_bounds() {
        let image = solid(100, 50, [200, 120, 40, 255]);
        let set = ParticleSet::generate(&image, 5_000, 7).unwrap();
        let aspect = 2.0;

        assert_eq!(set.len(), 5_000);
        assert_eq!(set.colors().len(), 5_000);
        assert_eq!(set.sizes().len(), 5_000);
        assert_eq!(set.seeds().len(), 5_000);
        assert_eq!(set.image_aspect(), aspect);

        for p in set.positions() {
            assert!(p.x >= -5.0 * aspect && p.x <= 5.0 * aspect, "{:?}", p);
            assert!(p.y >= -5.0 && p.y <= 5.0, "{:?}", p);
            assert!(p.z >= -FIELD_DEPTH && p.z <= FIELD_DEPTH, "{:?}", p);
        }
        for &seed in set.seeds() {
            assert!((0.0..1.0).contains(&seed));
        }
    }

    #[test]
    fn same_seed_reproduces_the_set() {
        let image = solid(8, 8, [10, 200, 30, 255]);
        let a = ParticleSet::generate(&image, 1_000, 42).unwrap();
        let b = ParticleSet::generate(&image, 1_000, 42).unwrap();
        let c = ParticleSet::generate(&image, 1_000, 43).unwrap();

        assert_eq!(a, b);
        assert_ne!(a.positions(), c.positions());
    }

    #[test]
    fn shorter_set_is_prefix_of_longer_one() {
        let image = solid(8, 8, [90, 90, 90, 255]);
        let short = ParticleSet::generate(&image, 10, 3).unwrap();
        let long = ParticleSet::generate(&image, 20, 3).unwrap();
        assert_eq!(short.positions(), &long.positions()[..10]);
    }

    #[test]
    fn corner_coordinates_map_to_field_edges() {
        let top_left = field_position(0.0, 0.0, 0.0, 2.0);
        assert_eq!(top_left.x, -10.0);
        assert_eq!(top_left.y, 5.0);

        let near_bottom_right = field_position(0.999_999, 0.999_999, 0.0, 2.0);
        assert!((near_bottom_right.x - 10.0).abs() < 1e-4);
        assert!((near_bottom_right.y + 5.0).abs() < 1e-4);
        assert!(near_bottom_right.x < 10.0);
        assert!(near_bottom_right.y > -5.0);
    }

    #[test]
    fn black_image_stays_black_with_small_particles() {
        let image = solid(16, 16, [0, 0, 0, 255]);
        let set = ParticleSet::generate(&image, 500, 11).unwrap();

        for color in set.colors() {
            assert_eq!(*color, Vec3::ZERO);
        }
        for &size in set.sizes() {
            // (rand * 2 + 1) * 0.4 with rand in [0, 1)
            assert!(size >= 0.4 && size < 1.2, "{}", size);
        }
    }

    #[test]
    fn boost_scales_with_darkness() {
        let dark = boost_color(0.2, 0.2, 0.2, 0.0);
        assert!((dark.x - 0.2 * 1.35).abs() < 1e-6);

        let bright = boost_color(1.0, 1.0, 1.0, 1.0);
        assert!((bright.x - 1.2).abs() < 1e-6);
        assert!(bright.x > 1.0);
    }

    #[test]
    fn brighter_samples_get_larger_particles() {
        assert!((particle_size(0.0, 0.0) - 0.4).abs() < 1e-6);
        assert!((particle_size(2.0, 1.0) - 3.0).abs() < 1e-6);
        assert!(particle_size(1.0, 0.9) > particle_size(1.0, 0.1));
    }

    #[test]
    fn instances_interleave_parallel_arrays() {
        let image = solid(4, 2, [255, 0, 0, 255]);
        let set = ParticleSet::generate(&image, 3, 5).unwrap();
        let instances = set.instances();

        assert_eq!(instances.len(), 3);
        for (i, instance) in instances.iter().enumerate() {
            assert_eq!(instance.position, set.positions()[i]);
            assert_eq!(instance.color, set.colors()[i]);
            assert_eq!(instance.size, set.sizes()[i]);
            assert_eq!(instance.seed, set.seeds()[i]);
        }
        assert_eq!(std::mem::size_of::<ParticleInstance>(), 32);
    }
}
