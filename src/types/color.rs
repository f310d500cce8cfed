extern crate nalgebra as na;

use image::Rgb;

pub type Color = na::Vector3<f32>;

pub trait ColorOps {
    fn get_r(&self) -> f32;
    fn get_g(&self) -> f32;
    fn get_b(&self) -> f32;
    fn to_rgb(&self) -> Rgb<u8>;
}

impl ColorOps for Color {
    fn get_r(&self) -> f32 {
        self.x
    }

    fn get_g(&self) -> f32 {
        self.y
    }

    fn get_b(&self) -> f32 {
        self.z
    }

    fn to_rgb(&self) -> Rgb<u8> {
        let quantize = |c: f32| (c.clamp(0.0, 1.0) * 255.0) as u8;
        Rgb([quantize(self.x), quantize(self.y), quantize(self.z)])
    }
}
