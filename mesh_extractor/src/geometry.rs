//! Built-in demo shapes, used when no scene file is given.
//!
//! Shapes are described by a [ShapeConfig] and turned into vertex and index buffers by
//! [build_geometry].

use bytemuck::{offset_of, Pod, Zeroable};
use serde::{Deserialize, Serialize};
use std::{fmt, mem, str::FromStr};

const SQRT_3: f32 = 1.732_050_8;

/// A shaded vertex with a color and texture coordinate.
#[derive(Default, Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
#[must_use]
pub struct ShadedVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
    pub uv: [f32; 2],
}

/// One entry of a vertex buffer layout.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[must_use]
pub struct VertexAttribute {
    pub location: u32,
    pub components: u32,
    pub offset: usize,
}

impl ShadedVertex {
    /// Create a new `ShadedVertex` instance.
    pub const fn new(position: [f32; 3], color: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            color,
            uv,
        }
    }

    /// Distance in bytes between consecutive vertices.
    pub const STRIDE: usize = mem::size_of::<Self>();

    /// Attribute layout: position at location 0, color at 1, uv at 2.
    #[must_use]
    pub fn attributes() -> [VertexAttribute; 3] {
        [
            VertexAttribute {
                location: 0,
                components: 3,
                offset: offset_of!(ShadedVertex, position),
            },
            VertexAttribute {
                location: 1,
                components: 3,
                offset: offset_of!(ShadedVertex, color),
            },
            VertexAttribute {
                location: 2,
                components: 2,
                offset: offset_of!(ShadedVertex, uv),
            },
        ]
    }
}

/// Vertices plus the triangle list indexing them.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[must_use]
pub struct IndexedGeometry {
    pub vertices: Vec<ShadedVertex>,
    pub indices: Vec<u32>,
}

impl IndexedGeometry {
    #[must_use]
    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    /// Vertex bytes ready to be uploaded.
    #[must_use]
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Index bytes ready to be uploaded.
    #[must_use]
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// Demo shape kinds.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[must_use]
pub enum Shape {
    Triangle,
    #[default]
    Quad,
    Triforce,
}

impl Shape {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Triangle => "triangle",
            Self::Quad => "quad",
            Self::Triforce => "triforce",
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown shape `{0}`, expected one of: triangle, quad, triforce")]
pub struct ParseShapeError(String);

impl FromStr for Shape {
    type Err = ParseShapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Triangle, Self::Quad, Self::Triforce]
            .into_iter()
            .find(|shape| shape.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseShapeError(s.to_owned()))
    }
}

/// Which shape to build and how to place it.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[must_use]
pub struct ShapeConfig {
    pub shape: Shape,
    /// Positions are grown by this factor: `p + p * scale`.
    pub scale: f32,
    pub offset: [f32; 3],
}

impl Default for ShapeConfig {
    fn default() -> Self {
        Self {
            shape: Shape::default(),
            scale: 0.0,
            offset: [0.0; 3],
        }
    }
}

impl ShapeConfig {
    /// Create a new `ShapeConfig` for a shape at the origin.
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            ..Default::default()
        }
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_offset(mut self, offset: [f32; 3]) -> Self {
        self.offset = offset;
        self
    }
}

const RED: [f32; 3] = [1.0, 0.0, 0.0];
const GREEN: [f32; 3] = [0.0, 1.0, 0.0];
const BLUE: [f32; 3] = [0.0, 0.0, 1.0];
const WHITE: [f32; 3] = [1.0, 1.0, 1.0];
const GOLD: [f32; 3] = [0.8, 0.3, 0.02];
const AMBER: [f32; 3] = [0.9, 0.45, 0.17];

/// Positions, colors and indices of an unscaled shape centered on the origin.
fn outline(shape: Shape) -> (Vec<([f32; 3], [f32; 3])>, Vec<u32>) {
    match shape {
        Shape::Quad => (
            vec![
                ([-0.5, -0.5, 0.0], RED),
                ([-0.5, 0.5, 0.0], GREEN),
                ([0.5, 0.5, 0.0], BLUE),
                ([0.5, -0.5, 0.0], WHITE),
            ],
            vec![0, 2, 1, 0, 3, 2],
        ),
        Shape::Triangle => (
            vec![
                ([-0.5, -0.5 * SQRT_3 / 3.0, 0.0], RED),
                ([0.5, -0.5 * SQRT_3 / 3.0, 0.0], GREEN),
                ([0.0, SQRT_3 / 3.0, 0.0], BLUE),
            ],
            vec![0, 1, 2],
        ),
        Shape::Triforce => (
            vec![
                ([-0.5, -0.5 * SQRT_3 / 3.0, 0.0], GOLD),
                ([0.5, -0.5 * SQRT_3 / 3.0, 0.0], GOLD),
                ([0.0, SQRT_3 / 3.0, 0.0], GOLD),
                ([-0.25, SQRT_3 / 12.0, 0.0], AMBER),
                ([0.25, SQRT_3 / 12.0, 0.0], AMBER),
                ([0.0, -0.5 * SQRT_3 / 3.0, 0.0], AMBER),
            ],
            vec![0, 3, 5, 3, 2, 4, 5, 4, 1],
        ),
    }
}

/// Build the vertex and index buffers for a shape.
///
/// Texture coordinates map the unscaled shape's XY extent onto `[0, 1]`, so `scale` and `offset`
/// never change them.
pub fn build_geometry(config: &ShapeConfig) -> IndexedGeometry {
    let (outline, indices) = outline(config.shape);

    let mut min = [f32::INFINITY; 2];
    let mut max = [f32::NEG_INFINITY; 2];
    for (position, _) in &outline {
        for axis in 0..2 {
            min[axis] = min[axis].min(position[axis]);
            max[axis] = max[axis].max(position[axis]);
        }
    }
    let extent = [max[0] - min[0], max[1] - min[1]];

    let vertices = outline
        .into_iter()
        .map(|(position, color)| {
            let uv = [0, 1].map(|axis| (position[axis] - min[axis]) / extent[axis]);
            let position = [0, 1, 2]
                .map(|axis| position[axis] + position[axis] * config.scale + config.offset[axis]);
            ShadedVertex::new(position, color, uv)
        })
        .collect();

    IndexedGeometry { vertices, indices }
}
