use image::{ImageBuffer, RgbImage};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

use crate::types::color::{Color, ColorOps};
use crate::types::ray::Ray;
use crate::types::sampler::{Sampler, SquareSampler};

pub struct Camera {
    image_width: u32,
    image_height: u32,
    center: Point3<f32>,
    pixel00: Point3<f32>,
    pixel_du: Vector3<f32>,
    pixel_dv: Vector3<f32>,
    spp: u32,
}

impl Camera {
    pub fn new(
        image_width: u32,
        image_height: u32,
        eye: Point3<f32>,
        look_at: Point3<f32>,
        up: Vector3<f32>,
        fov_degrees: f32,
        spp: u32,
    ) -> Self {
        let focal_length = (eye - look_at).norm();
        let h = (fov_degrees.to_radians() / 2.0).tan();
        let viewport_height = 2.0 * h * focal_length;
        let viewport_width = viewport_height * (image_width as f32 / image_height as f32);

        // Right-handed look-at basis; w points backwards.
        let w = (eye - look_at).normalize();
        let u = up.cross(&w).normalize();
        let v = w.cross(&u);

        let viewport_u = viewport_width * u;
        let viewport_v = viewport_height * -v;
        let pixel_du = viewport_u / (image_width as f32);
        let pixel_dv = viewport_v / (image_height as f32);

        let viewport_upper_left =
            eye - focal_length * w - viewport_u / 2_f32 - viewport_v / 2_f32;
        let pixel00 = viewport_upper_left + 0.5_f32 * pixel_du + 0.5_f32 * pixel_dv;

        Self {
            image_width,
            image_height,
            center: eye,
            pixel00,
            pixel_du,
            pixel_dv,
            spp,
        }
    }

    /// Run `trace` over every pixel, `spp` jittered samples each. The pixel
    /// loop is the only parallel part of the renderer; `trace` runs on many
    /// threads at once and must bring its own per-ray state.
    pub fn render<F>(&self, trace: F) -> RgbImage
    where
        F: Fn(&Ray) -> Color + Sync,
    {
        let mut buffer: RgbImage = ImageBuffer::new(self.image_width, self.image_height);
        buffer.par_enumerate_pixels_mut().for_each(|(u, v, pixel)| {
            let sampler = SquareSampler::new((0.0, 0.0), 0.5);
            let mut rng = rand::thread_rng();
            let pixel_color: Color = (0..self.spp)
                .map(|_| -> Color {
                    let ray = self.get_ray(&sampler, &mut rng, u as f32, v as f32);
                    trace(&ray)
                })
                .sum::<Color>()
                / self.spp as f32;

            *pixel = pixel_color.to_rgb();
        });

        buffer
    }

    fn get_ray(
        &self,
        sampler: &impl Sampler<(f32, f32)>,
        rng: &mut impl rand::Rng,
        u: f32,
        v: f32,
    ) -> Ray {
        let (offset_u, offset_v) = sampler.sample(rng);
        let pixel_center =
            self.pixel00 + (u + offset_u) * self.pixel_du + (v + offset_v) * self.pixel_dv;
        let ray_direction = pixel_center - self.center;
        Ray::new_bounded(self.center, ray_direction, 0.0, f32::INFINITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_pixel_points_at_look_at() {
        let eye = Point3::new(0.0, 0.0, 5.0);
        let camera = Camera::new(
            64,
            64,
            eye,
            Point3::origin(),
            Vector3::new(0.0, 1.0, 0.0),
            45.0,
            1,
        );
        let sampler = SquareSampler::new((0.0, 0.0), 1e-6);
        let mut rng = rand::thread_rng();
        // Center of the 64x64 grid is between pixels 31 and 32.
        let ray = camera.get_ray(&sampler, &mut rng, 31.5, 31.5);
        let dir = ray.direction.normalize();
        assert!((dir - Vector3::new(0.0, 0.0, -1.0)).norm() < 1e-4);
    }

    #[test]
    fn test_render_fills_buffer() {
        let camera = Camera::new(
            8,
            8,
            Point3::new(0.0, 0.0, 5.0),
            Point3::origin(),
            Vector3::new(0.0, 1.0, 0.0),
            45.0,
            2,
        );
        let buffer = camera.render(|_ray| Color::new(1.0, 0.0, 0.0));
        assert_eq!(buffer.dimensions(), (8, 8));
        assert!(buffer.pixels().all(|p| p.0 == [255, 0, 0]));
    }
}
