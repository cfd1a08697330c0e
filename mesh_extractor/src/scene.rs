//! Scene assets decoded from FBX documents.

use crate::{
    fbx::{self, Document, Node},
    filesystem::DataSource,
    vertex::{Vertex, VertexBuffer},
    LoadError,
};

/// One mesh within a scene.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct MeshRecord {
    name: String,
    positions: Option<Vec<[f64; 3]>>,
}

impl MeshRecord {
    /// Create a new `MeshRecord`. `None` positions means the mesh has no position attribute.
    pub fn new(name: impl Into<String>, positions: Option<Vec<[f64; 3]>>) -> Self {
        Self {
            name: name.into(),
            positions,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn num_vertices(&self) -> usize {
        self.positions.as_ref().map_or(0, Vec::len)
    }

    /// Model space vertex positions, indexed by vertex.
    #[must_use]
    pub fn vertex_positions(&self) -> Option<&[[f64; 3]]> {
        self.positions.as_deref()
    }
}

/// A parsed scene. Owns every mesh and releases them when dropped.
#[derive(Default, Debug, Clone, PartialEq)]
#[must_use]
pub struct SceneAsset {
    meshes: Vec<MeshRecord>,
}

impl SceneAsset {
    /// Load a `SceneAsset` from a file path or an in-memory buffer.
    ///
    /// # Errors
    ///
    /// Returns [LoadError::ParseFailure] if the source can not be read or decoded.
    pub fn load(source: impl Into<DataSource>) -> Result<Self, LoadError> {
        let source = source.into();
        tracing::debug!("loading scene {}", source.name());
        let data = source.read().map_err(|err| LoadError::ParseFailure {
            description: format!("{err:#}"),
        })?;
        let scene = Self::from_bytes(&data)?;
        tracing::debug!(
            "loaded scene {}: {} meshes, {} vertices",
            source.name(),
            scene.meshes.len(),
            scene.num_vertices()
        );
        Ok(scene)
    }

    /// Decode a `SceneAsset` from the contents of an FBX file.
    ///
    /// # Errors
    ///
    /// Returns [LoadError::ParseFailure] if the data is not a valid FBX document.
    pub fn from_bytes(data: &[u8]) -> Result<Self, LoadError> {
        let document = fbx::parse(data)?;
        Self::from_document(&document)
    }

    /// Collect the meshes of a decoded document in document order.
    ///
    /// # Errors
    ///
    /// Returns [LoadError::ParseFailure] if a mesh holds malformed vertex data.
    pub fn from_document(document: &Document) -> Result<Self, LoadError> {
        let meshes = match document.node("Objects") {
            Some(objects) => objects
                .children
                .iter()
                .filter_map(|node| mesh_record(node).transpose())
                .collect::<Result<Vec<_>, _>>()?,
            None => vec![],
        };
        tracing::trace!(
            "scene from FBX {} ({:?}): {} meshes",
            document.version,
            document.encoding,
            meshes.len()
        );
        Ok(Self { meshes })
    }

    #[must_use]
    pub fn meshes(&self) -> &[MeshRecord] {
        &self.meshes
    }

    /// Total vertex count across all meshes.
    #[must_use]
    pub fn num_vertices(&self) -> usize {
        self.meshes.iter().map(MeshRecord::num_vertices).sum()
    }

    /// Flatten every mesh into a single buffer, narrowing positions to `f32`.
    ///
    /// # Errors
    ///
    /// Returns [LoadError::MissingAttribute] if any mesh lacks vertex positions.
    pub fn vertex_buffer(&self) -> Result<VertexBuffer, LoadError> {
        let mut vertices = Vec::with_capacity(self.num_vertices());
        for (i, mesh) in self.meshes.iter().enumerate() {
            let positions = mesh
                .vertex_positions()
                .ok_or_else(|| LoadError::MissingAttribute {
                    mesh: mesh.name.clone(),
                })?;
            tracing::debug!("mesh[{i}] `{}`: {} vertices", mesh.name, positions.len());
            vertices.extend(positions.iter().copied().map(Vertex::from));
        }
        Ok(vertices)
    }
}

/// Strip the class from an object name: `Class::Name` in ASCII files, `Name\0\x01Class` in
/// binary files.
fn object_name(raw: &str) -> &str {
    if let Some((name, _class)) = raw.split_once("\u{0}\u{1}") {
        name
    } else if let Some((_class, name)) = raw.split_once("::") {
        name
    } else {
        raw
    }
}

fn mesh_record(node: &Node) -> Result<Option<MeshRecord>, LoadError> {
    if node.strings().last() != Some("Mesh") {
        return Ok(None);
    }
    let vertices = node.child("Vertices");
    // FBX 6 stores geometry directly on the model, FBX 7 models reference a Geometry object.
    let is_mesh = match node.name.as_str() {
        "Geometry" => true,
        "Model" => vertices.is_some(),
        _ => false,
    };
    if !is_mesh {
        return Ok(None);
    }

    let name = node.strings().next().map(object_name).unwrap_or_default();
    let positions = vertices
        .map(|vertices| read_positions(name, vertices))
        .transpose()?;
    Ok(Some(MeshRecord::new(name, positions)))
}

fn read_positions(mesh: &str, vertices: &Node) -> Result<Vec<[f64; 3]>, LoadError> {
    let values = vertices
        .numeric_values()
        .ok_or_else(|| LoadError::ParseFailure {
            description: format!("mesh `{mesh}` has non-numeric vertex data"),
        })?;
    if values.len() % 3 != 0 {
        return Err(LoadError::ParseFailure {
            description: format!(
                "mesh `{mesh}` has {} vertex coordinates, not a multiple of 3",
                values.len()
            ),
        });
    }
    Ok(values
        .chunks_exact(3)
        .map(|position| [position[0], position[1], position[2]])
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fbx::{binary, Property};

    fn geometry(id: i64, name: &str, class: &str, vertices: Option<Vec<f64>>) -> Node {
        let children = vertices
            .map(|vertices| vec![Node::new("Vertices", vec![Property::F64Array(vertices)])])
            .unwrap_or_default();
        Node::new(
            "Geometry",
            vec![
                Property::I64(id),
                Property::String(format!("{name}\u{0}\u{1}Geometry")),
                Property::String(class.into()),
            ],
        )
        .with_children(children)
    }

    fn objects(children: Vec<Node>) -> Vec<Node> {
        vec![
            Node::new("FBXHeaderExtension", vec![]),
            Node::new("Objects", vec![]).with_children(children),
        ]
    }

    #[test]
    fn meshes_in_document_order() {
        let nodes = objects(vec![
            geometry(1, "First", "Mesh", Some(vec![0.0, 0.0, 0.0, 1.0, 2.0, 3.0])),
            Node::new(
                "Model",
                vec![
                    Property::I64(2),
                    Property::String("First\u{0}\u{1}Model".into()),
                    Property::String("Mesh".into()),
                ],
            ),
            geometry(3, "Blend", "Shape", Some(vec![9.0, 9.0, 9.0])),
            geometry(4, "Empty", "Mesh", Some(vec![])),
            geometry(5, "Last", "Mesh", Some(vec![-1.0, -2.0, -3.0])),
        ]);
        let bytes = binary::encode::document(7400, &nodes, true);
        let scene = SceneAsset::from_bytes(&bytes).expect("valid scene");

        let names: Vec<_> = scene.meshes().iter().map(MeshRecord::name).collect();
        assert_eq!(names, ["First", "Empty", "Last"]);
        assert_eq!(scene.num_vertices(), 3);
        assert_eq!(
            scene.meshes()[0].vertex_positions(),
            Some(&[[0.0, 0.0, 0.0], [1.0, 2.0, 3.0]][..])
        );
        assert_eq!(scene.meshes()[1].num_vertices(), 0);

        let vertices = scene.vertex_buffer().expect("valid vertex buffer");
        assert_eq!(
            vertices,
            [
                Vertex::new(0.0, 0.0, 0.0),
                Vertex::new(1.0, 2.0, 3.0),
                Vertex::new(-1.0, -2.0, -3.0),
            ]
        );
    }

    #[test]
    fn legacy_model_meshes() {
        let text = "Objects:  {\n\tModel: \"Model::Cube\", \"Mesh\" {\n\t\tVertices: 0,0,0,1,1,1\n\t}\n\tModel: \"Model::Camera\", \"Camera\" {\n\t}\n}\n";
        let scene = SceneAsset::from_bytes(text.as_bytes()).expect("valid scene");
        assert_eq!(scene.meshes().len(), 1);
        assert_eq!(scene.meshes()[0].name(), "Cube");
        assert_eq!(scene.num_vertices(), 2);
    }

    #[test]
    fn missing_position_attribute() {
        let nodes = objects(vec![
            geometry(1, "Good", "Mesh", Some(vec![0.0; 3])),
            geometry(2, "Hollow", "Mesh", None),
        ]);
        let scene = SceneAsset::from_bytes(&binary::encode::document(7500, &nodes, false))
            .expect("valid scene");
        assert_eq!(scene.meshes()[1].vertex_positions(), None);
        assert_eq!(
            scene.vertex_buffer(),
            Err(LoadError::MissingAttribute {
                mesh: "Hollow".into()
            })
        );
    }

    #[test]
    fn malformed_vertex_data() {
        let nodes = objects(vec![geometry(1, "Odd", "Mesh", Some(vec![0.0; 4]))]);
        let err = SceneAsset::from_bytes(&binary::encode::document(7400, &nodes, false))
            .expect_err("coordinate count not a multiple of 3");
        assert_eq!(
            err,
            LoadError::ParseFailure {
                description: "mesh `Odd` has 4 vertex coordinates, not a multiple of 3".into()
            }
        );

        let text = "Objects:  {\n\tGeometry: 1, \"Geometry::Words\", \"Mesh\" {\n\t\tVertices: \"a\", \"b\", \"c\"\n\t}\n}\n";
        let err = SceneAsset::from_bytes(text.as_bytes()).expect_err("non-numeric vertices");
        assert!(err.to_string().contains("non-numeric vertex data"), "{err}");
    }

    #[test]
    fn scene_without_objects() {
        let scene = SceneAsset::from_bytes(b"FBXHeaderExtension:  {\n\tFBXVersion: 7400\n}\n")
            .expect("valid scene");
        assert!(scene.meshes().is_empty());
        assert_eq!(scene.vertex_buffer(), Ok(vec![]));
    }

    #[test]
    fn object_names() {
        assert_eq!(object_name("Cube\u{0}\u{1}Geometry"), "Cube");
        assert_eq!(object_name("Geometry::Cube"), "Cube");
        assert_eq!(object_name("Cube"), "Cube");
    }
}
