use na::{Point3, Vector3};

use crate::bvh::bbox::BBox;
use crate::bvh::{Intersector, PrimitiveSet, TraceOptions};
use crate::objects::Intersection;
use crate::types::ray::Ray;

/// Indexed triangle soup. Face `i` is the triangle over
/// `positions[faces[i][0..3]]`.
pub struct TriMesh {
    positions: Vec<Point3<f32>>,
    faces: Vec<[u32; 3]>,
}

impl TriMesh {
    pub fn new(positions: Vec<Point3<f32>>, faces: Vec<[u32; 3]>) -> Self {
        Self { positions, faces }
    }

    /// Load every model in a Wavefront OBJ file into one triangle soup.
    pub fn load(path: &str) -> Result<Self, tobj::LoadError> {
        let (models, _materials) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                triangulate: true,
                ..Default::default()
            },
        )?;

        let mut positions = Vec::new();
        let mut faces = Vec::new();
        for model in &models {
            let base = positions.len() as u32;
            positions.extend(
                model
                    .mesh
                    .positions
                    .chunks_exact(3)
                    .map(|p| Point3::new(p[0], p[1], p[2])),
            );
            faces.extend(
                model
                    .mesh
                    .indices
                    .chunks_exact(3)
                    .map(|f| [base + f[0], base + f[1], base + f[2]]),
            );
        }

        log::info!(
            "loaded {} ({} vertices, {} triangles)",
            path,
            positions.len(),
            faces.len()
        );

        Ok(Self::new(positions, faces))
    }

    pub fn num_triangles(&self) -> u32 {
        self.faces.len() as u32
    }

    #[inline(always)]
    fn triangle(&self, prim_id: u32) -> (Point3<f32>, Point3<f32>, Point3<f32>) {
        let [i0, i1, i2] = self.faces[prim_id as usize];
        (
            self.positions[i0 as usize],
            self.positions[i1 as usize],
            self.positions[i2 as usize],
        )
    }

    pub fn face_normal(&self, prim_id: u32) -> Vector3<f32> {
        let (v0, v1, v2) = self.triangle(prim_id);
        (v1 - v0).cross(&(v2 - v0)).normalize()
    }

    /// Translate and uniformly scale the mesh so it is centered on the origin
    /// with its longest side spanning one unit.
    pub fn normalize_to_unit(&mut self) {
        let bounds = self
            .positions
            .iter()
            .fold(BBox::empty(), |acc, p| acc.enclose(p));
        let extent = bounds.extent();
        let size = extent.x.max(extent.y).max(extent.z);
        if !(size > 0.0) {
            return;
        }

        let center = bounds.centroid();
        let inv_size = 1.0 / size;
        for p in self.positions.iter_mut() {
            *p = Point3::from((*p - center) * inv_size);
        }
    }
}

impl PrimitiveSet for TriMesh {
    fn bounding_box(&self, prim_id: u32) -> BBox {
        let (v0, v1, v2) = self.triangle(prim_id);
        BBox::point(v0).enclose(&v1).enclose(&v2)
    }

    // Vertex mean, not the bounding-box center.
    fn centroid(&self, prim_id: u32) -> Point3<f32> {
        let (v0, v1, v2) = self.triangle(prim_id);
        Point3::from((v0.coords + v1.coords + v2.coords) / 3.0)
    }
}

/// Möller–Trumbore ray/triangle tester over a borrowed mesh.
pub struct TriangleIntersector<'a> {
    mesh: &'a TriMesh,
    ray_org: Point3<f32>,
    ray_dir: Vector3<f32>,
    t_min: f32,
    options: TraceOptions,
    best: Option<Intersection>,
}

impl<'a> TriangleIntersector<'a> {
    pub fn new(mesh: &'a TriMesh) -> Self {
        Self {
            mesh,
            ray_org: Point3::origin(),
            ray_dir: Vector3::zeros(),
            t_min: 0.0,
            options: TraceOptions::default(),
            best: None,
        }
    }
}

impl Intersector for TriangleIntersector<'_> {
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

        let (v0, v1, v2) = self.mesh.triangle(prim_id);
        let s = self.ray_org - v0;
        let e1 = v1 - v0;
        let e2 = v2 - v0;
        let d = self.ray_dir;

        let e1_x_d = e1.cross(&d);
        let s_x_e2 = s.cross(&e2);

        // Zero for degenerate triangles and edge-on rays. Front faces see a
        // positive determinant with this operand order.
        let triple = e1_x_d.dot(&e2);
        if triple == 0.0 || (self.options.cull_back_face && triple < 0.0) {
            return None;
        }

        let inv = 1.0 / triple;
        let u = (-s_x_e2).dot(&d) * inv;
        let v = e1_x_d.dot(&s) * inv;
        let t = (-s_x_e2).dot(&e1) * inv;

        // First-seen hit wins at equal distance; NaN fails every comparison
        // and falls through to a miss.
        let closer = match &self.best {
            Some(best) => t < best.t,
            None => t <= t_current,
        };
        if closer && t >= self.t_min && u >= 0.0 && v >= 0.0 && u + v <= 1.0 {
            self.best = Some(Intersection { t, prim_id, u, v });
            Some(t)
        } else {
            None
        }
    }

    fn finalize(&self, _ray: &Ray, hit: bool) -> Option<Intersection> {
        if hit {
            self.best
        } else {
            None
        }
    }
}
