extern crate nalgebra as na;

pub mod bvh;
pub mod camera;
pub mod config;
pub mod objects;
pub mod scenes;
pub mod types;

pub use bvh::{
    BBox, BuildError, BuildOptions, BuildStats, Intersector, PrimitiveSet, TraceOptions, BVH,
};
pub use objects::Intersection;
pub use types::ray::Ray;
