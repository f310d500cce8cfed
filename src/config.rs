use std::fs;

use thiserror::Error;
use toml::Value;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Render settings for the demo binary, loaded from a TOML file. Every field
/// has a default, so a partial (or absent) file still renders something.
#[derive(Clone, Debug)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub spp: u32,
    pub eye: [f32; 3],
    pub look_at: [f32; 3],
    pub up: [f32; 3],
    pub fov: f32,
    /// "mesh" or "points".
    pub scene: String,
    pub obj_path: String,
    pub max_points: u32,
    pub output: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            spp: 4,
            eye: [0.0, 0.0, 5.0],
            look_at: [0.0, 0.0, 0.0],
            up: [0.0, 1.0, 0.0],
            fov: 45.0,
            scene: "points".to_string(),
            obj_path: "scene.obj".to_string(),
            max_points: 100_000,
            output: "output.png".to_string(),
        }
    }
}

impl RenderConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let value: Value = contents.parse()?;

        let mut config = RenderConfig::default();
        config.width = get_u32(&value, "width", config.width);
        config.height = get_u32(&value, "height", config.height);
        config.spp = get_u32(&value, "spp", config.spp);
        config.eye = get_vec3(&value, "eye", config.eye);
        config.look_at = get_vec3(&value, "look_at", config.look_at);
        config.up = get_vec3(&value, "up", config.up);
        config.fov = get_f32(&value, "fov", config.fov);
        config.scene = get_string(&value, "scene", &config.scene);
        config.obj_path = get_string(&value, "obj_path", &config.obj_path);
        config.max_points = get_u32(&value, "max_points", config.max_points);
        config.output = get_string(&value, "output", &config.output);

        Ok(config)
    }
}

fn get_f32(value: &Value, key: &str, default: f32) -> f32 {
    match value.get(key) {
        Some(v) => match v.as_float().or_else(|| v.as_integer().map(|i| i as f64)) {
            Some(f) => f as f32,
            None => {
                log::warn!("config key '{}' is not a number, using default", key);
                default
            }
        },
        None => default,
    }
}

fn get_u32(value: &Value, key: &str, default: u32) -> u32 {
    match value.get(key) {
        Some(v) => match v.as_integer() {
            Some(i) if i >= 0 => i as u32,
            _ => {
                log::warn!("config key '{}' is not a count, using default", key);
                default
            }
        },
        None => default,
    }
}

fn get_string(value: &Value, key: &str, default: &str) -> String {
    match value.get(key).and_then(|v| v.as_str()) {
        Some(s) => s.to_string(),
        None => default.to_string(),
    }
}

fn get_vec3(value: &Value, key: &str, default: [f32; 3]) -> [f32; 3] {
    let parsed = value.get(key).and_then(|v| v.as_array()).and_then(|arr| {
        if arr.len() != 3 {
            return None;
        }
        let mut out = [0.0_f32; 3];
        for (slot, v) in out.iter_mut().zip(arr) {
            *slot = v
                .as_float()
                .or_else(|| v.as_integer().map(|i| i as f64))?
                as f32;
        }
        Some(out)
    });
    match parsed {
        Some(v) => v,
        None => {
            if value.get(key).is_some() {
                log::warn!("config key '{}' is not a 3-vector, using default", key);
            }
            default
        }
    }
}
