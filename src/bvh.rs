//! Binned-SAH bounding volume hierarchy over caller-described primitives.
//!
//! The accel never looks at geometry directly. At build time a
//! [`PrimitiveSet`] supplies per-primitive bounding boxes and centroids; at
//! query time an [`Intersector`] tests the candidate primitive ids the
//! traversal hands it and keeps its own closest-hit record. Built-in
//! implementations for triangle soups and sphere sets live in
//! `crate::objects`.

pub mod bbox;
mod builder;
mod sah;

use na::Point3;
use thiserror::Error;

use crate::types::ray::Ray;
pub use bbox::BBox;

// Fixed traversal stack; comfortably above the (clamped) depth cap.
const TRAVERSAL_STACK_SIZE: usize = 64;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("no primitives to build over")]
    EmptyInput,

    #[error("primitive {0} has a non-finite bounding box")]
    NonFiniteBounds(u32),

    #[error("allocation failed during build: {0}")]
    OutOfMemory(#[from] std::collections::TryReserveError),
}

#[derive(Clone, Copy, Debug)]
pub struct BuildOptions {
    /// Ranges at or below this size always become leaves.
    pub min_leaf_primitives: u32,
    /// Soft upper cap on leaf size; oversized ranges the SAH declines to
    /// split fall back to a median cut.
    pub max_leaf_primitives: u32,
    /// Number of SAH bins per axis.
    pub bin_size: u32,
    /// Depth at which recursion stops regardless of size. Values above 62
    /// are clamped so the fixed traversal stack can never overflow; the
    /// depth actually reached is reported in `BuildStats::max_tree_depth`.
    pub max_tree_depth: u32,
    /// Precompute every primitive bounding box once instead of re-asking the
    /// primitive set during splits.
    pub cache_bbox: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            min_leaf_primitives: 4,
            max_leaf_primitives: 16,
            bin_size: 64,
            max_tree_depth: 30,
            cache_bbox: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub num_leaf_nodes: u32,
    pub num_branch_nodes: u32,
    pub max_tree_depth: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct TraceOptions {
    /// Half-open range of primitive ids eligible for intersection. Enforced
    /// by intersectors, letting callers mask out objects or avoid
    /// self-intersection.
    pub prim_ids_range: [u32; 2],
    /// Consumed by intersectors that support it (triangles); ignored by the
    /// traversal itself.
    pub cull_back_face: bool,
}

impl Default for TraceOptions {
    fn default() -> Self {
        Self {
            prim_ids_range: [0, u32::MAX],
            cull_back_face: false,
        }
    }
}

/// Build-time view of a primitive set.
pub trait PrimitiveSet {
    fn bounding_box(&self, prim_id: u32) -> BBox;
    fn centroid(&self, prim_id: u32) -> Point3<f32>;
}

/// Query-time primitive tester. One instance per in-flight ray; all per-ray
/// scratch (cached ray, closest hit so far) lives here, which is what makes
/// concurrent traversals over one accel safe.
pub trait Intersector {
    type Output;

    /// Called once before traversal starts.
    fn prepare(&mut self, ray: &Ray, options: &TraceOptions);

    /// Test one primitive. A `Some(t)` return means a hit no farther than
    /// `t_current` was found and recorded; the traversal tightens its upper
    /// bound to `t`.
    fn intersect(&mut self, t_current: f32, prim_id: u32) -> Option<f32>;

    /// Called once after traversal to materialise the recorded hit.
    fn finalize(&self, ray: &Ray, hit: bool) -> Option<Self::Output>;
}

/// Flat BVH node. Branch children are `self + 1` (preorder) and `right`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BVHNode {
    Branch { right: u32, axis: u8, bounds: BBox },
    Leaf { first: u32, count: u32, bounds: BBox },
}

impl BVHNode {
    #[inline(always)]
    pub fn bounds(&self) -> &BBox {
        match self {
            BVHNode::Branch { bounds, .. } => bounds,
            BVHNode::Leaf { bounds, .. } => bounds,
        }
    }
}

/// The acceleration structure facade: a flat node array plus the primitive-id
/// permutation its leaves slice into.
///
/// Created empty; `build` populates it and fully replaces any previous
/// contents. After a successful build the accel is immutable and `traverse`
/// may be called from any number of threads, each with its own intersector.
pub struct BVH {
    nodes: Vec<BVHNode>,
    indices: Vec<u32>,
    scene_bounds: BBox,
    stats: BuildStats,
}

impl BVH {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            indices: Vec::new(),
            scene_bounds: BBox::empty(),
            stats: BuildStats::default(),
        }
    }

    /// Build over `num_prims` primitives. On error the previous contents are
    /// left untouched; on success they are replaced wholesale.
    pub fn build<P: PrimitiveSet>(
        &mut self,
        num_prims: u32,
        prims: &P,
        options: &BuildOptions,
    ) -> Result<(), BuildError> {
        let built = builder::BVHBuilder::build(prims, num_prims, options)?;
        self.nodes = built.nodes;
        self.indices = built.indices;
        self.scene_bounds = built.scene_bounds;
        self.stats = built.stats;
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        !self.nodes.is_empty()
    }

    /// Scene bounds of the last successful build. Empty-box sentinel values
    /// before that.
    pub fn bounding_box(&self) -> (Point3<f32>, Point3<f32>) {
        (self.scene_bounds.min, self.scene_bounds.max)
    }

    pub fn statistics(&self) -> BuildStats {
        self.stats
    }

    /// Walk the tree for `ray`, feeding candidate primitives to `isector`,
    /// and return its finalized closest hit. Near children are visited
    /// first (by slab entry distance) and subtrees that cannot beat the
    /// current best hit are skipped. An unbuilt accel and non-finite rays
    /// report no hit.
    pub fn traverse<I: Intersector>(
        &self,
        ray: &Ray,
        isector: &mut I,
        options: &TraceOptions,
    ) -> Option<I::Output> {
        isector.prepare(ray, options);

        if self.nodes.is_empty() || !ray.is_finite() {
            return isector.finalize(ray, false);
        }

        let inv_dir = ray.inv_direction();
        let mut t_best = ray.t_max;
        let mut hit = false;

        let mut stack = [(0_u32, 0.0_f32); TRAVERSAL_STACK_SIZE];
        let mut top = 0;
        match self.nodes[0]
            .bounds()
            .intersect(&ray.origin, &inv_dir, ray.t_min, t_best)
        {
            Some((t_enter, _)) => {
                stack[top] = (0, t_enter);
                top += 1;
            }
            None => return isector.finalize(ray, false),
        }

        while top > 0 {
            top -= 1;
            let (index, t_enter) = stack[top];
            // Entry distance recorded at push time; the best hit may have
            // tightened since.
            if t_enter > t_best {
                continue;
            }

            match self.nodes[index as usize] {
                BVHNode::Leaf { first, count, .. } => {
                    for &id in &self.indices[first as usize..(first + count) as usize] {
                        if let Some(t) = isector.intersect(t_best, id) {
                            t_best = t;
                            hit = true;
                        }
                    }
                }
                BVHNode::Branch { right, .. } => {
                    let left = index + 1;
                    let hit_l = self.nodes[left as usize].bounds().intersect(
                        &ray.origin,
                        &inv_dir,
                        ray.t_min,
                        t_best,
                    );
                    let hit_r = self.nodes[right as usize].bounds().intersect(
                        &ray.origin,
                        &inv_dir,
                        ray.t_min,
                        t_best,
                    );

                    // Push far first so the near child pops next.
                    match (hit_l, hit_r) {
                        (Some((tl, _)), Some((tr, _))) => {
                            let (near, far) = if tl <= tr {
                                ((left, tl), (right, tr))
                            } else {
                                ((right, tr), (left, tl))
                            };
                            stack[top] = far;
                            stack[top + 1] = near;
                            top += 2;
                        }
                        (Some((tl, _)), None) => {
                            stack[top] = (left, tl);
                            top += 1;
                        }
                        (None, Some((tr, _))) => {
                            stack[top] = (right, tr);
                            top += 1;
                        }
                        (None, None) => {}
                    }
                }
            }
        }

        isector.finalize(ray, hit)
    }
}

impl Default for BVH {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use na::Vector3;

    use crate::objects::point_cloud::{PointCloud, SphereIntersector};
    use crate::objects::tri_mesh::{TriMesh, TriangleIntersector};
    use crate::types::color::Color;

    fn unit_triangle() -> TriMesh {
        TriMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
    }

    fn down_ray() -> Ray {
        Ray::new_bounded(
            Point3::new(0.25, 0.25, 1.0),
            Vector3::new(0.0, 0.0, -1.0),
            0.0,
            f32::INFINITY,
        )
    }

    fn build(mesh: &TriMesh) -> BVH {
        let mut accel = BVH::new();
        accel
            .build(mesh.num_triangles(), mesh, &BuildOptions::default())
            .unwrap();
        accel
    }

    #[test]
    fn test_single_triangle_hit() {
        let mesh = unit_triangle();
        let accel = build(&mesh);
        assert!(accel.is_valid());

        let mut isector = TriangleIntersector::new(&mesh);
        let isect = accel
            .traverse(&down_ray(), &mut isector, &TraceOptions::default())
            .unwrap();
        assert!((isect.t - 1.0).abs() < 1e-5);
        assert!((isect.u - 0.25).abs() < 1e-5);
        assert!((isect.v - 0.25).abs() < 1e-5);
        assert_eq!(isect.prim_id, 0);
    }

    #[test]
    fn test_single_triangle_miss_above() {
        let mesh = unit_triangle();
        let accel = build(&mesh);

        let ray = Ray::new_bounded(
            Point3::new(0.25, 0.25, 1.0),
            Vector3::new(0.0, 0.0, 1.0),
            0.0,
            f32::INFINITY,
        );
        let mut isector = TriangleIntersector::new(&mesh);
        assert!(accel
            .traverse(&ray, &mut isector, &TraceOptions::default())
            .is_none());
    }

    #[test]
    fn test_two_triangles_closer_wins() {
        // Triangle 0 at z = 0, triangle 1 translated to z = -1.
        let mesh = TriMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(0.0, 0.0, -1.0),
                Point3::new(1.0, 0.0, -1.0),
                Point3::new(0.0, 1.0, -1.0),
            ],
            vec![[0, 1, 2], [3, 4, 5]],
        );
        let accel = build(&mesh);

        let mut isector = TriangleIntersector::new(&mesh);
        let isect = accel
            .traverse(&down_ray(), &mut isector, &TraceOptions::default())
            .unwrap();
        assert_eq!(isect.prim_id, 0);
        assert!((isect.t - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_sphere_hit_with_normal() {
        let cloud = PointCloud::new(
            vec![Point3::new(0.0, 0.0, 0.0)],
            vec![1.0],
            vec![Color::new(1.0, 1.0, 1.0)],
        );
        let mut accel = BVH::new();
        accel
            .build(cloud.len(), &cloud, &BuildOptions::default())
            .unwrap();

        let ray = Ray::new_bounded(
            Point3::new(0.0, 0.0, 3.0),
            Vector3::new(0.0, 0.0, -1.0),
            0.0,
            f32::INFINITY,
        );
        let mut isector = SphereIntersector::new(&cloud);
        let isect = accel
            .traverse(&ray, &mut isector, &TraceOptions::default())
            .unwrap();
        assert!((isect.t - 2.0).abs() < 1e-5);

        let normal = cloud.normal_at(isect.prim_id, &ray.at(isect.t));
        assert!((normal - Vector3::new(0.0, 0.0, 1.0)).norm() < 1e-5);
    }

    #[test]
    fn test_sphere_grazing_miss() {
        let cloud = PointCloud::new(
            vec![Point3::new(0.0, 0.0, 0.0)],
            vec![1.0],
            vec![Color::new(1.0, 1.0, 1.0)],
        );
        let mut accel = BVH::new();
        accel
            .build(cloud.len(), &cloud, &BuildOptions::default())
            .unwrap();

        let ray = Ray::new_bounded(
            Point3::new(0.0, 1.0001, 3.0),
            Vector3::new(0.0, 0.0, -1.0),
            0.0,
            f32::INFINITY,
        );
        let mut isector = SphereIntersector::new(&cloud);
        assert!(accel
            .traverse(&ray, &mut isector, &TraceOptions::default())
            .is_none());
    }

    #[test]
    fn test_empty_scene_build_fails_and_traverse_is_a_no_hit() {
        let mesh = TriMesh::new(Vec::new(), Vec::new());
        let mut accel = BVH::new();
        let err = accel
            .build(0, &mesh, &BuildOptions::default())
            .unwrap_err();
        assert!(matches!(err, BuildError::EmptyInput));
        assert!(!accel.is_valid());

        let mut isector = TriangleIntersector::new(&mesh);
        assert!(accel
            .traverse(&down_ray(), &mut isector, &TraceOptions::default())
            .is_none());
    }

    #[test]
    fn test_non_finite_ray_is_a_no_hit() {
        let mesh = unit_triangle();
        let accel = build(&mesh);

        let ray = Ray::new_bounded(
            Point3::new(f32::NAN, 0.25, 1.0),
            Vector3::new(0.0, 0.0, -1.0),
            0.0,
            f32::INFINITY,
        );
        let mut isector = TriangleIntersector::new(&mesh);
        assert!(accel
            .traverse(&ray, &mut isector, &TraceOptions::default())
            .is_none());
    }

    #[test]
    fn test_prim_id_range_masks_the_closer_sphere() {
        let cloud = PointCloud::new(
            vec![Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 0.0, -4.0)],
            vec![1.0, 1.0],
            vec![Color::new(1.0, 1.0, 1.0); 2],
        );
        let mut accel = BVH::new();
        accel
            .build(cloud.len(), &cloud, &BuildOptions::default())
            .unwrap();

        let ray = Ray::new_bounded(
            Point3::new(0.0, 0.0, 3.0),
            Vector3::new(0.0, 0.0, -1.0),
            0.0,
            f32::INFINITY,
        );

        let mut isector = SphereIntersector::new(&cloud);
        let nearest = accel
            .traverse(&ray, &mut isector, &TraceOptions::default())
            .unwrap();
        assert_eq!(nearest.prim_id, 0);

        let masked = TraceOptions {
            prim_ids_range: [1, 2],
            ..TraceOptions::default()
        };
        let mut isector = SphereIntersector::new(&cloud);
        let isect = accel.traverse(&ray, &mut isector, &masked).unwrap();
        assert_eq!(isect.prim_id, 1);
        assert!((isect.t - 6.0).abs() < 1e-5);
    }

    #[test]
    fn test_traverse_matches_linear_scan() {
        use rand::{rngs::StdRng, Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(0x5eed);
        let n = 128;
        let centers: Vec<Point3<f32>> = (0..n)
            .map(|_| {
                Point3::new(
                    rng.gen_range(-4.0..4.0),
                    rng.gen_range(-4.0..4.0),
                    rng.gen_range(-4.0..4.0),
                )
            })
            .collect();
        let radii: Vec<f32> = (0..n).map(|_| rng.gen_range(0.05..0.4)).collect();
        let cloud = PointCloud::new(centers, radii, vec![Color::new(1.0, 1.0, 1.0); n]);

        let mut accel = BVH::new();
        accel
            .build(cloud.len(), &cloud, &BuildOptions::default())
            .unwrap();

        let options = TraceOptions::default();
        for _ in 0..256 {
            let ray = Ray::new_bounded(
                Point3::new(
                    rng.gen_range(-6.0..6.0),
                    rng.gen_range(-6.0..6.0),
                    rng.gen_range(-6.0..6.0),
                ),
                {
                    // Keep every component away from zero so no direction is
                    // axis-parallel by accident.
                    let mut component = || {
                        let sign = if rng.gen::<bool>() { 1.0 } else { -1.0 };
                        sign * rng.gen_range(0.1..1.0_f32)
                    };
                    Vector3::new(component(), component(), component())
                },
                0.0,
                f32::INFINITY,
            );

            // Ground truth: the same intersector run over every primitive.
            let mut linear = SphereIntersector::new(&cloud);
            linear.prepare(&ray, &options);
            let mut t_best = ray.t_max;
            let mut any = false;
            for id in 0..cloud.len() {
                if let Some(t) = linear.intersect(t_best, id) {
                    t_best = t;
                    any = true;
                }
            }
            let expected = linear.finalize(&ray, any);

            let mut isector = SphereIntersector::new(&cloud);
            let got = accel.traverse(&ray, &mut isector, &options);

            match (expected, got) {
                (None, None) => {}
                (Some(a), Some(b)) => {
                    assert_eq!(a.prim_id, b.prim_id);
                    assert!((a.t - b.t).abs() < 1e-5);
                }
                (a, b) => panic!(
                    "traversal disagrees with linear scan: {:?} vs {:?}",
                    a.map(|i| i.t),
                    b.map(|i| i.t)
                ),
            }
        }
    }

    #[test]
    fn test_concurrent_traversals_share_the_accel() {
        let cloud = PointCloud::new(
            vec![Point3::new(-2.0, 0.0, 0.0), Point3::new(2.0, 0.0, 0.0)],
            vec![1.0, 1.0],
            vec![Color::new(1.0, 1.0, 1.0); 2],
        );
        let mut accel = BVH::new();
        accel
            .build(cloud.len(), &cloud, &BuildOptions::default())
            .unwrap();

        // Each thread brings its own intersector; the accel is shared.
        std::thread::scope(|scope| {
            for prim_id in 0..cloud.len() {
                let accel = &accel;
                let cloud = &cloud;
                scope.spawn(move || {
                    let center = cloud.center(prim_id);
                    let ray = Ray::new_bounded(
                        Point3::new(center.x, center.y, center.z + 3.0),
                        Vector3::new(0.0, 0.0, -1.0),
                        0.0,
                        f32::INFINITY,
                    );
                    let mut isector = SphereIntersector::new(cloud);
                    let isect = accel
                        .traverse(&ray, &mut isector, &TraceOptions::default())
                        .unwrap();
                    assert_eq!(isect.prim_id, prim_id);
                    assert!((isect.t - 2.0).abs() < 1e-5);
                });
            }
        });
    }

    #[test]
    fn test_rebuild_replaces_contents() {
        let mesh = unit_triangle();
        let mut accel = BVH::new();
        accel
            .build(mesh.num_triangles(), &mesh, &BuildOptions::default())
            .unwrap();
        let (min_a, max_a) = accel.bounding_box();

        let far_mesh = TriMesh::new(
            vec![
                Point3::new(10.0, 10.0, 10.0),
                Point3::new(11.0, 10.0, 10.0),
                Point3::new(10.0, 11.0, 10.0),
            ],
            vec![[0, 1, 2]],
        );
        accel
            .build(far_mesh.num_triangles(), &far_mesh, &BuildOptions::default())
            .unwrap();
        let (min_b, max_b) = accel.bounding_box();
        assert_ne!((min_a, max_a), (min_b, max_b));
        assert_eq!(min_b, Point3::new(10.0, 10.0, 10.0));

        // Old geometry is gone.
        let mut isector = TriangleIntersector::new(&far_mesh);
        assert!(accel
            .traverse(&down_ray(), &mut isector, &TraceOptions::default())
            .is_none());
    }

    #[test]
    fn test_repeated_builds_are_deterministic() {
        let mesh = TriMesh::new(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(2.0, 0.0, 1.0),
                Point3::new(3.0, 0.0, 1.0),
                Point3::new(2.0, 1.0, 1.0),
                Point3::new(-2.0, 0.0, -1.0),
                Point3::new(-1.0, 0.0, -1.0),
                Point3::new(-2.0, 1.0, -1.0),
            ],
            vec![[0, 1, 2], [3, 4, 5], [6, 7, 8]],
        );

        let mut a = BVH::new();
        let mut b = BVH::new();
        let options = BuildOptions {
            min_leaf_primitives: 1,
            ..BuildOptions::default()
        };
        a.build(mesh.num_triangles(), &mesh, &options).unwrap();
        b.build(mesh.num_triangles(), &mesh, &options).unwrap();

        assert_eq!(a.nodes, b.nodes);
        assert_eq!(a.indices, b.indices);
        assert_eq!(a.stats, b.stats);
    }
}
