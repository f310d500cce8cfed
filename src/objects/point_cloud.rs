use std::f32::consts::PI;

use na::{Point3, Vector3};

use crate::bvh::bbox::BBox;
use crate::bvh::{Intersector, PrimitiveSet, TraceOptions};
use crate::objects::Intersection;
use crate::types::color::Color;
use crate::types::ray::Ray;

/// A set of colored spheres, one per particle.
pub struct PointCloud {
    centers: Vec<Point3<f32>>,
    radii: Vec<f32>,
    colors: Vec<Color>,
}

impl PointCloud {
    pub fn new(centers: Vec<Point3<f32>>, radii: Vec<f32>, colors: Vec<Color>) -> Self {
        debug_assert_eq!(centers.len(), radii.len());
        debug_assert_eq!(centers.len(), colors.len());
        Self {
            centers,
            radii,
            colors,
        }
    }

    pub fn len(&self) -> u32 {
        self.centers.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    pub fn center(&self, prim_id: u32) -> Point3<f32> {
        self.centers[prim_id as usize]
    }

    pub fn color(&self, prim_id: u32) -> Color {
        self.colors[prim_id as usize]
    }

    pub fn normal_at(&self, prim_id: u32, point: &Point3<f32>) -> Vector3<f32> {
        (point - self.center(prim_id)).normalize()
    }
}

impl PrimitiveSet for PointCloud {
    fn bounding_box(&self, prim_id: u32) -> BBox {
        let center = self.centers[prim_id as usize];
        let r = Vector3::repeat(self.radii[prim_id as usize]);
        BBox::new(center - r, center + r)
    }

    fn centroid(&self, prim_id: u32) -> Point3<f32> {
        self.centers[prim_id as usize]
    }
}

/// Analytic ray/sphere tester over a borrowed point cloud.
pub struct SphereIntersector<'a> {
    cloud: &'a PointCloud,
    ray_org: Point3<f32>,
    ray_dir: Vector3<f32>,
    t_min: f32,
    options: TraceOptions,
    best: Option<Intersection>,
}

impl<'a> SphereIntersector<'a> {
    pub fn new(cloud: &'a PointCloud) -> Self {
        Self {
            cloud,
            ray_org: Point3::origin(),
            ray_dir: Vector3::zeros(),
            t_min: 0.0,
            options: TraceOptions::default(),
            best: None,
        }
    }
}

impl Intersector for SphereIntersector<'_> {
    type Output = Intersection;

    fn prepare(&mut self, ray: &Ray, options: &TraceOptions) {
        self.ray_org = ray.origin;
        self.ray_dir = ray.direction;
        self.t_min = ray.t_min;
        self.options = *options;
        self.best = None;
    }

    fn intersect(&mut self, t_current: f32, prim_id: u32) -> Option<f32> {
        if prim_id < self.options.prim_ids_range[0]
            || prim_id >= self.options.prim_ids_range[1]
        {
            return None;
        }

        let center = self.cloud.centers[prim_id as usize];
        let radius = self.cloud.radii[prim_id as usize];

        let oc = self.ray_org - center;
        let a = self.ray_dir.dot(&self.ray_dir);
        let b = 2.0 * self.ray_dir.dot(&oc);
        let c = oc.dot(&oc) - radius * radius;

        let disc = b * b - 4.0 * a * c;
        if disc < 0.0 {
            return None;
        }

        // The q form keeps the subtraction between like-signed quantities.
        let (mut t0, mut t1) = if disc == 0.0 {
            let t = -0.5 * b / a;
            (t, t)
        } else {
            let q = if b < 0.0 {
                (-b + disc.sqrt()) * 0.5
            } else {
                (-b - disc.sqrt()) * 0.5
            };
            (q / a, c / q)
        };
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }

        // Both roots behind the origin: the sphere is in the ray's negative
        // direction.
        if t1 < 0.0 {
            return None;
        }
        let t = if t0 < 0.0 { t1 } else { t0 };

        let closer = match &self.best {
            Some(best) => t < best.t,
            None => t <= t_current,
        };
        if closer && t >= self.t_min {
            self.best = Some(Intersection {
                t,
                prim_id,
                u: 0.0,
                v: 0.0,
            });
            Some(t)
        } else {
            None
        }
    }

    // Surface parameters come from the hit normal, computed once here rather
    // than per candidate.
    fn finalize(&self, _ray: &Ray, hit: bool) -> Option<Intersection> {
        if !hit {
            return None;
        }
        let mut isect = self.best?;
        let p = self.ray_org + isect.t * self.ray_dir;
        let n = self.cloud.normal_at(isect.prim_id, &p);
        isect.u = (n.x.atan2(n.z) + PI) * 0.5 / PI;
        isect.v = n.y.clamp(-1.0, 1.0).acos() / PI;
        Some(isect)
    }
}
