use std::time::Duration;

use nalgebra::{Point3, Vector3};

use raybin::bvh::{BuildOptions, TraceOptions, BVH};
use raybin::camera::Camera;
use raybin::config::RenderConfig;
use raybin::objects::point_cloud::SphereIntersector;
use raybin::objects::tri_mesh::TriangleIntersector;
use raybin::scenes;
use raybin::types::color::Color;

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => match RenderConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Failed to load config {}: {}", path, e);
                return;
            }
        },
        None => {
            log::info!("No config given, rendering the default scene");
            RenderConfig::default()
        }
    };

    match config.scene.as_str() {
        "mesh" => render_mesh(&config),
        "points" => render_points(&config),
        other => log::error!("Unknown scene kind {:?} (expected \"mesh\" or \"points\")", other),
    }
}

fn camera_from(config: &RenderConfig) -> Camera {
    Camera::new(
        config.width,
        config.height,
        Point3::from(config.eye),
        Point3::from(config.look_at),
        Vector3::from(config.up),
        config.fov,
        config.spp.max(1),
    )
}

fn elapsed_since(now: &std::time::SystemTime) -> Duration {
    match now.elapsed() {
        Ok(elapsed) => elapsed,
        Err(e) => {
            log::error!("Failed to get elapsed time: {}", e);
            Duration::from_secs(0)
        }
    }
}

fn report_build(accel: &BVH, elapsed: Duration) {
    let stats = accel.statistics();
    let (bmin, bmax) = accel.bounding_box();
    log::info!("BVH build time: {:?}", elapsed);
    log::info!("  # of leaf nodes  : {}", stats.num_leaf_nodes);
    log::info!("  # of branch nodes: {}", stats.num_branch_nodes);
    log::info!("  max tree depth   : {}", stats.max_tree_depth);
    log::info!("  bmin             : {}, {}, {}", bmin.x, bmin.y, bmin.z);
    log::info!("  bmax             : {}, {}, {}", bmax.x, bmax.y, bmax.z);
}

fn render_mesh(config: &RenderConfig) {
    let mesh = match scenes::load_mesh(&config.obj_path) {
        Ok(mesh) => mesh,
        Err(e) => {
            log::error!("Failed to load mesh {}: {}", config.obj_path, e);
            return;
        }
    };

    log::info!("Building BVH...");
    let now = std::time::SystemTime::now();
    let mut accel = BVH::new();
    if let Err(e) = accel.build(mesh.num_triangles(), &mesh, &BuildOptions::default()) {
        log::error!("Failed to build BVH: {}", e);
        return;
    }
    report_build(&accel, elapsed_since(&now));

    log::info!("Rendering...");
    let now = std::time::SystemTime::now();
    let camera = camera_from(config);
    let options = TraceOptions::default();
    let buffer = camera.render(|ray| {
        let mut isector = TriangleIntersector::new(&mesh);
        match accel.traverse(ray, &mut isector, &options) {
            // Visualise the geometric normal.
            Some(isect) => {
                let n = mesh.face_normal(isect.prim_id);
                0.5_f32 * Color::new(n.x + 1_f32, n.y + 1_f32, n.z + 1_f32)
            }
            None => Color::zeros(),
        }
    });
    let render_elapsed = elapsed_since(&now);

    if let Err(e) = buffer.save(&config.output) {
        log::error!("Failed to save {}: {}", config.output, e);
        return;
    }
    log::info!("Done. Render time: {:?}. Wrote {}", render_elapsed, config.output);
}

fn render_points(config: &RenderConfig) {
    let cloud = scenes::generate_point_cloud(config.max_points, 0);

    log::info!("Building BVH...");
    let now = std::time::SystemTime::now();
    let mut accel = BVH::new();
    if let Err(e) = accel.build(cloud.len(), &cloud, &BuildOptions::default()) {
        log::error!("Failed to build BVH: {}", e);
        return;
    }
    report_build(&accel, elapsed_since(&now));

    log::info!("Rendering...");
    let now = std::time::SystemTime::now();
    let camera = camera_from(config);
    let options = TraceOptions::default();
    let buffer = camera.render(|ray| {
        let mut isector = SphereIntersector::new(&cloud);
        match accel.traverse(ray, &mut isector, &options) {
            Some(isect) => {
                let p = ray.at(isect.t);
                let n = cloud.normal_at(isect.prim_id, &p);
                let n_dot_v = n.dot(&ray.direction.normalize()).abs();
                cloud.color(isect.prim_id) * n_dot_v
            }
            None => Color::zeros(),
        }
    });
    let render_elapsed = elapsed_since(&now);

    if let Err(e) = buffer.save(&config.output) {
        log::error!("Failed to save {}: {}", config.output, e);
        return;
    }
    log::info!("Done. Render time: {:?}. Wrote {}", render_elapsed, config.output);
}
