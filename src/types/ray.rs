use na::{Point3, Vector3};

#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Point3<f32>,
    pub direction: Vector3<f32>,
    pub t_min: f32,
    pub t_max: f32,
}

impl Ray {
    pub fn new_bounded(
        origin: Point3<f32>,
        direction: Vector3<f32>,
        t_min: f32,
        t_max: f32,
    ) -> Self {
        Self {
            origin,
            direction,
            t_min,
            t_max,
        }
    }

    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Self {
        Self::new_bounded(origin, direction, 0.001, f32::INFINITY)
    }

    pub fn at(&self, t: f32) -> Point3<f32> {
        self.origin + t * self.direction
    }

    /// Componentwise reciprocal of the direction. IEEE division maps a zero
    /// component to the signed infinity matching its sign bit, which is what
    /// the slab test expects for axis-parallel rays.
    pub fn inv_direction(&self) -> Vector3<f32> {
        Vector3::new(
            1.0 / self.direction.x,
            1.0 / self.direction.y,
            1.0 / self.direction.z,
        )
    }

    pub fn is_finite(&self) -> bool {
        self.origin.coords.iter().all(|c| c.is_finite())
            && self.direction.iter().all(|c| c.is_finite())
    }
}
