use glam::{vec3, Mat4, Vec3};

use crate::config::Settings;

/// Half of the field's vertical extent plus a 10% margin.
pub const FIT_HALF_EXTENT: f32 = 5.5;

#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Camera {
    pub position: Vec3,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, Vec3::ZERO, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov.to_radians(),
            self.aspect_ratio,
            self.near,
            self.far,
        )
    }

    /// Pulls the camera back along +Z until the whole field is visible.
    pub fn fit_to(&mut self, viewport_aspect: f32, image_aspect: f32) {
        self.aspect_ratio = viewport_aspect;
        self.position = vec3(0., 0., fit_distance(self.fov, viewport_aspect, image_aspect));
    }
}

/// Fits the field height, or its width when the viewport is narrower than
/// the image.
pub fn fit_distance(fov: f32, viewport_aspect: f32, image_aspect: f32) -> f32 {
    let half_fov_tan = (fov.to_radians() * 0.5).tan();
    if viewport_aspect < image_aspect {
        (FIT_HALF_EXTENT * image_aspect) / (viewport_aspect * half_fov_tan)
    } else {
        FIT_HALF_EXTENT / half_fov_tan
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Bloom {
    pub strength: f32,
    pub radius: f32,
    pub threshold: f32,
}

/// Everything the passes read each frame. Mutated by controls and the clock.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Scene {
    pub camera: Camera,
    pub bloom: Bloom,
    pub drift: f32,
    pub elapsed: f32,
    pub pixel_ratio: f32,
    pub point_scale: f32,
    pub image_aspect: f32,
}

impl Scene {
    pub fn new(settings: &Settings, viewport_aspect: f32, pixel_ratio: f32) -> Self {
        let mut scene = Self {
            camera: Camera {
                position: vec3(0., 0., 10.),
                fov: settings.fov,
                aspect_ratio: viewport_aspect,
                near: settings.near,
                far: settings.far,
            },
            bloom: Bloom {
                strength: settings.bloom_strength,
                radius: settings.bloom_radius,
                threshold: settings.bloom_threshold,
            },
            drift: settings.drift,
            elapsed: 0.,
            pixel_ratio: pixel_ratio.min(settings.max_pixel_ratio),
            point_scale: settings.point_scale,
            image_aspect: 1.,
        };
        scene.fit_camera(viewport_aspect);
        scene
    }

    pub fn fit_camera(&mut self, viewport_aspect: f32) {
        self.camera.fit_to(viewport_aspect, self.image_aspect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_viewport_fits_height() {
        let expected = 5.5 / (22.5f32.to_radians()).tan();
        assert!((fit_distance(45., 2.0, 1.0) - expected).abs() < 1e-4);
        // Image aspect is irrelevant while the viewport is wider.
        assert_eq!(fit_distance(45., 2.0, 1.5), fit_distance(45., 2.0, 0.5));
    }

    #[test]
    fn narrow_viewport_fits_width() {
        let half_tan = (22.5f32.to_radians()).tan();
        let expected = 5.5 * 2.0 / (0.5 * half_tan);
        assert!((fit_distance(45., 0.5, 2.0) - expected).abs() < 1e-3);
    }

    #[test]
    fn distance_grows_with_image_aspect_in_narrow_viewport() {
        let viewport_aspect = 0.75;
        let distances: Vec<_> = [1.0f32, 1.5, 2.0, 3.0, 4.0]
            .iter()
            .map(|&image_aspect| fit_distance(45., viewport_aspect, image_aspect))
            .collect();
        for pair in distances.windows(2) {
            assert!(pair[1] > pair[0], "{:?}", distances);
        }
    }

    #[test]
    fn fit_moves_camera_along_z() {
        let mut scene = Scene::new(&Settings::default(), 1.0, 1.0);
        scene.image_aspect = 2.0;
        scene.fit_camera(1.0);

        assert_eq!(scene.camera.position.x, 0.);
        assert_eq!(scene.camera.position.y, 0.);
        assert!((scene.camera.position.z - fit_distance(45., 1.0, 2.0)).abs() < 1e-5);
        assert_eq!(scene.camera.aspect_ratio, 1.0);
    }

    #[test]
    fn pixel_ratio_is_capped() {
        let scene = Scene::new(&Settings::default(), 1.0, 3.0);
        assert_eq!(scene.pixel_ratio, 2.0);
    }
}
