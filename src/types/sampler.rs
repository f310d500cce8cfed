use rand::Rng;

pub trait Sampler<T> {
    fn sample(&self, rng: &mut impl Rng) -> T;
}

pub struct SquareSampler {
    center: (f32, f32),
    apothem: f32,
}

impl SquareSampler {
    pub fn new(center: (f32, f32), apothem: f32) -> Self {
        Self { center, apothem }
    }
}

impl Sampler<(f32, f32)> for SquareSampler {
    fn sample(&self, rng: &mut impl Rng) -> (f32, f32) {
        let x = rng.gen_range(self.center.0 - self.apothem..self.center.0 + self.apothem);
        let y = rng.gen_range(self.center.1 - self.apothem..self.center.1 + self.apothem);

        (x, y)
    }
}
