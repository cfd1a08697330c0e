//! Sandbox configuration.

use mesh_extractor::geometry::Shape;
use std::{env, path::PathBuf, str::FromStr};

#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub(crate) struct Config {
    pub(crate) width: u32,
    pub(crate) height: u32,
    /// Vertical field of view in degrees.
    pub(crate) fov: f32,
    pub(crate) near_clip: f32,
    pub(crate) far_clip: f32,
    pub(crate) scale: f32,
    pub(crate) clear_color: [f32; 4],
    pub(crate) shape: Shape,
    /// Directory for daily rolling log files. Logs only go to stderr when unset.
    pub(crate) log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }
}

impl Config {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Build a `Config` from `SANDBOX_*` variables, falling back to defaults for missing or
    /// unparsable values.
    pub(crate) fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        fn parse<T: FromStr>(value: Option<String>) -> Option<T> {
            value.and_then(|value| value.trim().parse().ok())
        }

        Self {
            width: parse::<u32>(var("SANDBOX_WIDTH"))
                .filter(|&width| width > 0)
                .unwrap_or(600),
            height: parse::<u32>(var("SANDBOX_HEIGHT"))
                .filter(|&height| height > 0)
                .unwrap_or(600),
            fov: parse(var("SANDBOX_FOV"))
                .filter(|fov: &f32| (1.0..180.0).contains(fov))
                .unwrap_or(45.0),
            near_clip: 0.1,
            far_clip: 100.0,
            scale: 0.5,
            clear_color: [0.1, 0.2, 0.3, 1.0],
            shape: parse(var("SANDBOX_SHAPE")).unwrap_or_default(),
            log_dir: var("SANDBOX_LOG_DIR")
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from),
        }
    }
}
