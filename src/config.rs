use std::{str::FromStr, time::Duration};

use log::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub particle_count: usize,
    pub max_pixel_ratio: f32,
    /// Screen-space multiplier applied to the per-particle size attribute.
    pub point_scale: f32,
    pub drift: f32,
    pub bloom_strength: f32,
    pub bloom_radius: f32,
    pub bloom_threshold: f32,
    /// Fixed seed for particle generation; a time-based seed is used when unset.
    pub seed: Option<u64>,
    pub max_image_dimension: u32,
    pub recording_duration: Duration,
    pub recording_fps: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fov: 45.,
            near: 0.1,
            far: 1000.,
            particle_count: 30_000,
            max_pixel_ratio: 2.,
            point_scale: 30.,
            drift: 0.,
            bloom_strength: 0.,
            bloom_radius: 1.2,
            bloom_threshold: 0.,
            seed: None,
            max_image_dimension: 1024,
            recording_duration: Duration::from_millis(3000),
            recording_fps: 20,
        }
    }
}

impl Settings {
    pub const PARTICLES_VAR: &'static str = "STARDUST_PARTICLES";
    pub const SEED_VAR: &'static str = "STARDUST_SEED";
    pub const DRIFT_VAR: &'static str = "STARDUST_DRIFT";
    pub const BLOOM_VAR: &'static str = "STARDUST_BLOOM";

    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let count: Option<usize> = parse_var(&lookup, Self::PARTICLES_VAR);
        if let Some(count) = count {
            if count > 0 {
                self.particle_count = count;
            } else {
                warn!("Ignoring {}=0", Self::PARTICLES_VAR);
            }
        }
        if let Some(seed) = parse_var(&lookup, Self::SEED_VAR) {
            self.seed = Some(seed);
        }
        if let Some(drift) = parse_var(&lookup, Self::DRIFT_VAR) {
            self.drift = drift;
        }
        if let Some(strength) = parse_var(&lookup, Self::BLOOM_VAR) {
            self.bloom_strength = strength;
        }
        self
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparsable {}={:?}", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key: &str| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn defaults_match_viewer_constants() {
        let settings = Settings::default();
        assert_eq!(settings.fov, 45.);
        assert_eq!(settings.particle_count, 30_000);
        assert_eq!(settings.bloom_radius, 1.2);
        assert_eq!(settings.bloom_threshold, 0.);
        assert_eq!(settings.recording_fps, 20);
        assert!(settings.seed.is_none());
    }

    #[test]
    fn overrides_apply_parsed_values() {
        let vars = [
            (Settings::PARTICLES_VAR, "5000"),
            (Settings::SEED_VAR, " 99 "),
            (Settings::DRIFT_VAR, "0.5"),
            (Settings::BLOOM_VAR, "1.5"),
        ];
        let settings = Settings::default().with_overrides(lookup(&vars));
        assert_eq!(settings.particle_count, 5000);
        assert_eq!(settings.seed, Some(99));
        assert_eq!(settings.drift, 0.5);
        assert_eq!(settings.bloom_strength, 1.5);
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let vars = [
            (Settings::PARTICLES_VAR, "0"),
            (Settings::SEED_VAR, "not-a-number"),
            (Settings::DRIFT_VAR, ""),
        ];
        let settings = Settings::default().with_overrides(lookup(&vars));
        assert_eq!(settings, Settings::default());
    }
}
