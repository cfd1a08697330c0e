//! Headless sandbox: loads an FBX model, or builds a demo shape, and reports what would be
//! uploaded and drawn.
//!
//! ```text
//! sandbox [MODEL]
//! ```

#![warn(
    anonymous_parameters,
    bare_trait_objects,
    clippy::branches_sharing_code,
    clippy::map_unwrap_or,
    clippy::match_wildcard_for_single_variants,
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::needless_for_each,
    clippy::redundant_closure_for_method_calls,
    clippy::semicolon_if_nothing_returned,
    clippy::unreadable_literal,
    clippy::unwrap_used,
    clippy::expect_used,
    deprecated_in_future,
    ellipsis_inclusive_range_patterns,
    future_incompatible,
    missing_copy_implementations,
    missing_debug_implementations,
    nonstandard_style,
    rust_2018_compatibility,
    rust_2018_idioms,
    rust_2021_compatibility,
    single_use_lifetimes,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused
)]

use anyhow::{Context, Result};
use camera::Camera;
use config::Config;
use glam::{Mat4, Vec3};
use mesh_extractor::{
    geometry::{self, ShapeConfig},
    Bounds, Vertex,
};
use std::{env, fmt, process::ExitCode};

mod camera;
mod config;
mod trace;

/// Everything the sandbox would hand to a renderer.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
struct Report {
    source: String,
    num_vertices: usize,
    num_indices: usize,
    upload_size: usize,
    bounds: Option<Bounds>,
    camera_position: Vec3,
    far_clip: f32,
    projection_view: Mat4,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "source: {}", self.source)?;
        writeln!(f, "vertices: {}", self.num_vertices)?;
        if self.num_indices > 0 {
            writeln!(f, "indices: {}", self.num_indices)?;
        }
        writeln!(f, "upload size: {} bytes", self.upload_size)?;
        match self.bounds {
            Some(bounds) => writeln!(f, "bounds: {:?} to {:?}", bounds.min, bounds.max)?,
            None => writeln!(f, "bounds: empty")?,
        }
        writeln!(f, "camera: {}", self.camera_position)?;
        writeln!(f, "far clip: {}", self.far_clip)?;
        write!(f, "projection * view: {}", self.projection_view)
    }
}

/// Load `model`, or the configured demo shape when there is none, and frame it.
fn run(config: &Config, model: Option<&str>) -> Result<Report> {
    let (source, vertices, num_indices, upload_size) = match model {
        Some(model) => {
            let vertices = mesh_extractor::extract(model)
                .with_context(|| format!("failed to load model {model:?}"))?;
            let upload_size = bytemuck::cast_slice::<Vertex, u8>(&vertices).len();
            (model.to_owned(), vertices, 0, upload_size)
        }
        None => {
            let shape = geometry::build_geometry(
                &ShapeConfig::new(config.shape).with_scale(config.scale),
            );
            tracing::debug!("built {} with {} triangles", config.shape, shape.num_triangles());
            let vertices = shape
                .vertices
                .iter()
                .map(|vertex| Vertex::from(vertex.position))
                .collect::<Vec<_>>();
            let upload_size = shape.vertex_bytes().len() + shape.index_bytes().len();
            (
                format!("demo {}", config.shape),
                vertices,
                shape.indices.len(),
                upload_size,
            )
        }
    };

    let bounds = Bounds::from_vertices(&vertices);
    let mut camera = Camera::new(config.width, config.height, Vec3::Z * 2.0);
    let far_clip = match bounds {
        Some(bounds) => config.far_clip.max(camera.frame(&bounds, config.fov)),
        None => config.far_clip,
    };
    let matrices = camera.matrices(config.fov, config.near_clip, far_clip);
    tracing::debug!(
        "viewport {}x{}, aspect {}, clear color {:?}",
        config.width,
        config.height,
        camera.aspect_ratio(),
        config.clear_color
    );
    tracing::trace!("view: {}, projection: {}", matrices.view, matrices.projection);

    Ok(Report {
        source,
        num_vertices: vertices.len(),
        num_indices,
        upload_size,
        bounds,
        camera_position: camera.position(),
        far_clip,
        projection_view: matrices.projection_view,
    })
}

fn main() -> ExitCode {
    let config = Config::new();
    let _trace = trace::initialize(config.log_dir.as_deref());

    let model = env::args().nth(1);
    match run(&config, model.as_deref()) {
        Ok(report) => {
            tracing::info!(
                "loaded {} vertices from {}",
                report.num_vertices,
                report.source
            );
            println!("{report}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
