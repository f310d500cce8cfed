pub mod point_cloud;
pub mod tri_mesh;

/// Hit record produced by the built-in intersectors: distance along the ray,
/// the primitive that was hit, and its surface parameters (barycentrics for
/// triangles, spherical coordinates for spheres).
#[derive(Clone, Copy, Debug)]
pub struct Intersection {
    pub t: f32,
    pub prim_id: u32,
    pub u: f32,
    pub v: f32,
}
