use na::Point3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::objects::point_cloud::PointCloud;
use crate::objects::tri_mesh::TriMesh;
use crate::types::color::Color;

/// Load an OBJ file and normalise it into the unit cube so the default
/// camera framing works for any input.
pub fn load_mesh(path: &str) -> Result<TriMesh, tobj::LoadError> {
    let mut mesh = TriMesh::load(path)?;
    mesh.normalize_to_unit();
    Ok(mesh)
}

/// Procedural stand-in for a scanned point set: `num_points` particles in the
/// unit cube, radii scaled to the expected point spacing so neighbouring
/// particles roughly touch.
pub fn generate_point_cloud(num_points: u32, seed: u64) -> PointCloud {
    let mut rng = StdRng::seed_from_u64(seed);
    let n = num_points.max(1);
    let radius = 0.5 / (n as f32).cbrt();

    let mut centers = Vec::with_capacity(n as usize);
    let mut radii = Vec::with_capacity(n as usize);
    let mut colors = Vec::with_capacity(n as usize);
    for _ in 0..n {
        centers.push(Point3::new(
            rng.gen_range(-0.5..0.5),
            rng.gen_range(-0.5..0.5),
            rng.gen_range(-0.5..0.5),
        ));
        radii.push(radius);
        colors.push(Color::new(
            rng.gen_range(0.25..1.0),
            rng.gen_range(0.25..1.0),
            rng.gen_range(0.25..1.0),
        ));
    }

    log::info!("generated point cloud: {} particles, radius {}", n, radius);

    PointCloud::new(centers, radii, colors)
}
