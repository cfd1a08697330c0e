use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// A single renderer-ready vertex position.
#[derive(Default, Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
#[must_use]
pub struct Vertex {
    pub position: [f32; 3],
}

/// Vertices in mesh order, then in-mesh index order.
pub type VertexBuffer = Vec<Vertex>;

impl Vertex {
    /// Create a new `Vertex` instance.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: [x, y, z],
        }
    }
}

impl From<[f64; 3]> for Vertex {
    /// Narrow a double precision position to the nearest single precision value.
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self::new(x as f32, y as f32, z as f32)
    }
}

impl From<[f32; 3]> for Vertex {
    fn from(position: [f32; 3]) -> Self {
        Self { position }
    }
}

/// Axis-aligned bounds of a set of vertices.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[must_use]
pub struct Bounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Bounds {
    /// Bounds enclosing every vertex, or `None` when there are none.
    #[must_use]
    pub fn from_vertices(vertices: &[Vertex]) -> Option<Self> {
        let (first, rest) = vertices.split_first()?;
        let bounds = rest.iter().fold(
            Self {
                min: first.position,
                max: first.position,
            },
            |mut bounds, vertex| {
                for axis in 0..3 {
                    bounds.min[axis] = bounds.min[axis].min(vertex.position[axis]);
                    bounds.max[axis] = bounds.max[axis].max(vertex.position[axis]);
                }
                bounds
            },
        );
        Some(bounds)
    }

    #[must_use]
    pub fn center(&self) -> [f32; 3] {
        [0, 1, 2].map(|axis| (self.min[axis] + self.max[axis]) * 0.5)
    }

    #[must_use]
    pub fn size(&self) -> [f32; 3] {
        [0, 1, 2].map(|axis| self.max[axis] - self.min[axis])
    }

    /// Radius of the sphere centered on [Bounds::center] that encloses the bounds.
    #[must_use]
    pub fn radius(&self) -> f32 {
        let [x, y, z] = self.size();
        (x * x + y * y + z * z).sqrt() * 0.5
    }
}
