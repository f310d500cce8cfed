use na::{Point3, Vector3};

/// Axis-aligned bounding box stored as two corner points.
///
/// The empty box is `min = +inf, max = -inf`, so merging anything into an
/// empty box yields that thing back.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl BBox {
    // a, b are opposite corners
    #[inline(always)]
    pub fn new(a: Point3<f32>, b: Point3<f32>) -> Self {
        let min = Point3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z));
        let max = Point3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z));
        Self { min, max }
    }

    #[inline(always)]
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    #[inline(always)]
    pub fn point(point: Point3<f32>) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    #[inline(always)]
    pub fn merge(&self, other: &Self) -> Self {
        let min = Point3::new(
            self.min.x.min(other.min.x),
            self.min.y.min(other.min.y),
            self.min.z.min(other.min.z),
        );
        let max = Point3::new(
            self.max.x.max(other.max.x),
            self.max.y.max(other.max.y),
            self.max.z.max(other.max.z),
        );
        Self { min, max }
    }

    #[inline(always)]
    pub fn enclose(&self, other: &Point3<f32>) -> Self {
        let min = Point3::new(
            self.min.x.min(other.x),
            self.min.y.min(other.y),
            self.min.z.min(other.z),
        );
        let max = Point3::new(
            self.max.x.max(other.x),
            self.max.y.max(other.y),
            self.max.z.max(other.z),
        );
        Self { min, max }
    }

    #[inline(always)]
    pub fn centroid(&self) -> Point3<f32> {
        na::center(&self.min, &self.max)
    }

    #[inline(always)]
    pub fn extent(&self) -> Vector3<f32> {
        self.max - self.min
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn is_finite(&self) -> bool {
        self.min.coords.iter().all(|c| c.is_finite())
            && self.max.coords.iter().all(|c| c.is_finite())
    }

    #[inline(always)]
    pub fn surface_area(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let extent = self.extent();
        2.0 * (extent.x * extent.y + extent.y * extent.z + extent.z * extent.x)
    }

    #[inline(always)]
    pub fn longest_axis(&self) -> usize {
        let extent = self.extent();
        if extent.x > extent.y && extent.x > extent.z {
            0
        } else if extent.y > extent.z {
            1
        } else {
            2
        }
    }

    /// Slab intersection against the interval `[t_min, t_max]`. Returns the
    /// clamped `(t_enter, t_exit)` interval, or `None` on a miss.
    ///
    /// `inv_dir` comes from `Ray::inv_direction`; zero direction components
    /// carry signed infinities through the per-axis products. An origin lying
    /// exactly on a slab plane of a parallel axis produces `0 * inf = NaN`,
    /// which counts as a miss.
    pub fn intersect(
        &self,
        origin: &Point3<f32>,
        inv_dir: &Vector3<f32>,
        t_min: f32,
        t_max: f32,
    ) -> Option<(f32, f32)> {
        let mut t_enter = t_min;
        let mut t_exit = t_max;

        for axis in 0..3 {
            let t0 = (self.min[axis] - origin[axis]) * inv_dir[axis];
            let t1 = (self.max[axis] - origin[axis]) * inv_dir[axis];
            let (near, far) = if inv_dir[axis] < 0.0 { (t1, t0) } else { (t0, t1) };

            if near.is_nan() || far.is_nan() {
                return None;
            }

            if near > t_enter {
                t_enter = near;
            }
            if far < t_exit {
                t_exit = far;
            }
            if t_exit < t_enter {
                return None;
            }
        }

        Some((t_enter, t_exit))
    }
}
