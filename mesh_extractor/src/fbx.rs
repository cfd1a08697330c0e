//! FBX document model and decoding.
//!
//! An FBX file is a tree of named nodes, each carrying a list of typed properties and an
//! optional list of child nodes. Both the binary and the ASCII encodings decode into the same
//! [Document] representation.

pub(crate) mod ascii;
pub(crate) mod binary;

/// Errors produced while decoding an FBX document.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("file is empty")]
    Empty,
    #[error("unrecognized file format: not a binary or ASCII FBX file")]
    Unrecognized,
    #[error("malformed binary FBX: {reason} at byte offset {offset}")]
    Binary { reason: String, offset: usize },
    #[error("malformed ASCII FBX: {reason} on line {line}")]
    Ascii { reason: String, line: usize },
}

/// How a [Document] was encoded on disk.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Encoding {
    Binary,
    Ascii,
}

/// A decoded FBX file.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct Document {
    /// Format version, e.g. `7400`. ASCII documents without a header report `0`.
    pub version: u32,
    pub encoding: Encoding,
    pub nodes: Vec<Node>,
}

impl Document {
    /// The first top-level node with the given name.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.name == name)
    }
}

/// A single node record.
#[derive(Default, Debug, Clone, PartialEq)]
#[must_use]
pub struct Node {
    pub name: String,
    pub properties: Vec<Property>,
    pub children: Vec<Node>,
}

impl Node {
    /// Create a new `Node` without children.
    pub fn new(name: impl Into<String>, properties: Vec<Property>) -> Self {
        Self {
            name: name.into(),
            properties,
            children: vec![],
        }
    }

    /// Add child nodes to this `Node`.
    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    /// The first child with the given name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|child| child.name == name)
    }

    /// Iterate the string properties of this node in order.
    pub fn strings(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().filter_map(Property::as_str)
    }

    /// Flatten the properties of this node into a list of numbers.
    ///
    /// Accepts either a single numeric array property or any number of numeric scalar
    /// properties. Returns `None` if any property is not numeric.
    #[must_use]
    pub fn numeric_values(&self) -> Option<Vec<f64>> {
        match self.properties.as_slice() {
            [array] if array.is_array() => array.to_f64_array(),
            properties => properties.iter().map(Property::as_f64).collect(),
        }
    }
}

/// A typed node property.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Raw(Vec<u8>),
    BoolArray(Vec<bool>),
    I32Array(Vec<i32>),
    I64Array(Vec<i64>),
    F32Array(Vec<f32>),
    F64Array(Vec<f64>),
}

impl Property {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::I16(value) => Some(value.into()),
            Self::I32(value) => Some(value.into()),
            Self::I64(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::I16(value) => Some(value.into()),
            Self::I32(value) => Some(value.into()),
            Self::I64(value) => Some(value as f64),
            Self::F32(value) => Some(value.into()),
            Self::F64(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            Self::BoolArray(_)
                | Self::I32Array(_)
                | Self::I64Array(_)
                | Self::F32Array(_)
                | Self::F64Array(_)
        )
    }

    /// Widen a numeric array property to `f64`. Bool arrays are not numeric.
    #[must_use]
    pub fn to_f64_array(&self) -> Option<Vec<f64>> {
        match self {
            Self::I32Array(values) => Some(values.iter().copied().map(f64::from).collect()),
            Self::I64Array(values) => Some(values.iter().map(|&value| value as f64).collect()),
            Self::F32Array(values) => Some(values.iter().copied().map(f64::from).collect()),
            Self::F64Array(values) => Some(values.clone()),
            _ => None,
        }
    }
}

/// Decode an FBX document from raw file contents, detecting the encoding.
pub fn parse(data: &[u8]) -> Result<Document, FormatError> {
    if data.is_empty() {
        return Err(FormatError::Empty);
    }
    if data.starts_with(binary::MAGIC) {
        return binary::parse(data);
    }
    // ASCII FBX never contains NUL. Older exporters write names and paths in a legacy code page,
    // so other invalid UTF-8 is replaced rather than rejected.
    if data.contains(&0) {
        return Err(FormatError::Unrecognized);
    }
    let text = String::from_utf8_lossy(data);
    ascii::parse(text.strip_prefix('\u{feff}').unwrap_or(&text))
}
