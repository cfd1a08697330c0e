//! Binary FBX decoding.
//!
//! Layout: a 27 byte header (magic, two reserved bytes, little-endian version) followed by a
//! list of node records terminated by a null record. Every record stores the absolute offset of
//! its end, so nesting is validated against the bytes actually consumed.

use super::{Document, Encoding, FormatError, Node, Property};
use flate2::read::ZlibDecoder;
use nom::{
    bytes::complete::{tag, take},
    combinator::map,
    error::{ErrorKind, ParseError},
    number::complete::{le_f32, le_f64, le_i16, le_i32, le_i64, le_u32, le_u64, le_u8},
    sequence::tuple,
    IResult,
};
use std::{borrow::Cow, io::Read, mem::size_of};

pub(crate) const MAGIC: &[u8] = b"Kaydara FBX Binary  \0";

/// From this version on, record header fields are 64 bits wide.
const WIDE_RECORDS_VERSION: u32 = 7500;
const MAX_DEPTH: usize = 64;
// Cap up-front allocation for compressed arrays, the declared length is untrusted.
const MAX_PREALLOCATION: usize = 1 << 24;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
enum Reason {
    #[error("unexpected end of data")]
    Truncated,
    #[error("invalid data ({0:?})")]
    Malformed(ErrorKind),
    #[error("node name is not valid UTF-8")]
    InvalidName,
    #[error("unknown property type code {0:#04x}")]
    UnknownPropertyType(u8),
    #[error("unknown array encoding {0}")]
    UnknownArrayEncoding(u32),
    #[error("failed to inflate array: {0}")]
    Inflate(String),
    #[error("array holds {actual} bytes, expected {expected}")]
    ArrayLength { expected: usize, actual: usize },
    #[error("property list is {actual} bytes, header declares {declared}")]
    PropertyListLength { declared: u64, actual: u64 },
    #[error("node ends at offset {actual}, header declares {declared}")]
    EndOffset { declared: u64, actual: u64 },
    #[error("nodes nested deeper than {0} levels")]
    TooDeep(usize),
}

#[derive(Debug, Clone, PartialEq)]
struct DecodeError<'a> {
    input: &'a [u8],
    reason: Reason,
}

impl<'a> ParseError<&'a [u8]> for DecodeError<'a> {
    fn from_error_kind(input: &'a [u8], kind: ErrorKind) -> Self {
        let reason = match kind {
            ErrorKind::Eof => Reason::Truncated,
            kind => Reason::Malformed(kind),
        };
        Self { input, reason }
    }

    fn append(_input: &'a [u8], _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

type PResult<'a, T> = IResult<&'a [u8], T, DecodeError<'a>>;

fn failure(input: &[u8], reason: Reason) -> nom::Err<DecodeError<'_>> {
    nom::Err::Failure(DecodeError { input, reason })
}

fn describe(data: &[u8], err: nom::Err<DecodeError<'_>>) -> FormatError {
    match err {
        nom::Err::Error(err) | nom::Err::Failure(err) => FormatError::Binary {
            reason: err.reason.to_string(),
            offset: data.len() - err.input.len(),
        },
        nom::Err::Incomplete(_) => FormatError::Binary {
            reason: Reason::Truncated.to_string(),
            offset: data.len(),
        },
    }
}

/// Decode a binary FBX document. `data` must start with [MAGIC].
pub(crate) fn parse(data: &[u8]) -> Result<Document, FormatError> {
    let (mut input, version) = header(data).map_err(|err| describe(data, err))?;
    let reader = Reader {
        len: data.len(),
        wide: version >= WIDE_RECORDS_VERSION,
    };

    let mut nodes = vec![];
    loop {
        if input.is_empty() {
            return Err(describe(data, failure(input, Reason::Truncated)));
        }
        let (rest, node) = reader.node(input, 0).map_err(|err| describe(data, err))?;
        input = rest;
        match node {
            Some(node) => nodes.push(node),
            // Anything past the top-level null record is footer data.
            None => break,
        }
    }
    tracing::trace!(
        "decoded {} top-level nodes from binary FBX {version}",
        nodes.len()
    );

    Ok(Document {
        version,
        encoding: Encoding::Binary,
        nodes,
    })
}

fn header(input: &[u8]) -> PResult<'_, u32> {
    let (input, _) = tag(MAGIC)(input)?;
    let (input, _reserved) = take(2usize)(input)?;
    le_u32(input)
}

#[derive(Debug, Copy, Clone)]
struct RecordHeader {
    end_offset: u64,
    num_properties: u64,
    property_list_len: u64,
    name_len: u8,
}

#[derive(Debug, Copy, Clone)]
struct Reader {
    len: usize,
    wide: bool,
}

impl Reader {
    /// Absolute file offset of the remaining `input`.
    fn offset(&self, input: &[u8]) -> u64 {
        (self.len - input.len()) as u64
    }

    fn record_header<'a>(&self, input: &'a [u8]) -> PResult<'a, RecordHeader> {
        if self.wide {
            map(
                tuple((le_u64, le_u64, le_u64, le_u8)),
                |(end_offset, num_properties, property_list_len, name_len): (u64, u64, u64, u8)| {
                    RecordHeader {
                        end_offset,
                        num_properties,
                        property_list_len,
                        name_len,
                    }
                },
            )(input)
        } else {
            map(
                tuple((le_u32, le_u32, le_u32, le_u8)),
                |(end_offset, num_properties, property_list_len, name_len): (u32, u32, u32, u8)| {
                    RecordHeader {
                        end_offset: u64::from(end_offset),
                        num_properties: u64::from(num_properties),
                        property_list_len: u64::from(property_list_len),
                        name_len,
                    }
                },
            )(input)
        }
    }

    /// Decode one node record, returning `None` for a null record.
    fn node<'a>(&self, input: &'a [u8], depth: usize) -> PResult<'a, Option<Node>> {
        let start = input;
        let (input, header) = self.record_header(input)?;
        if header.end_offset == 0 {
            return Ok((input, None));
        }
        if depth >= MAX_DEPTH {
            return Err(failure(start, Reason::TooDeep(MAX_DEPTH)));
        }

        let (input, name) = take(header.name_len)(input)?;
        let name = std::str::from_utf8(name)
            .map_err(|_| failure(start, Reason::InvalidName))?
            .to_owned();

        let properties_start = self.offset(input);
        let mut input = input;
        let mut properties = vec![];
        for _ in 0..header.num_properties {
            let (rest, value) = property(input)?;
            properties.push(value);
            input = rest;
        }
        let property_list_len = self.offset(input) - properties_start;
        if property_list_len != header.property_list_len {
            return Err(failure(
                start,
                Reason::PropertyListLength {
                    declared: header.property_list_len,
                    actual: property_list_len,
                },
            ));
        }

        let mut children = vec![];
        if self.offset(input) < header.end_offset {
            loop {
                let (rest, child) = self.node(input, depth + 1)?;
                input = rest;
                match child {
                    Some(child) => children.push(child),
                    None => break,
                }
            }
        }

        let end_offset = self.offset(input);
        if end_offset != header.end_offset {
            return Err(failure(
                start,
                Reason::EndOffset {
                    declared: header.end_offset,
                    actual: end_offset,
                },
            ));
        }

        Ok((
            input,
            Some(Node {
                name,
                properties,
                children,
            }),
        ))
    }
}

/// A `u32` length-prefixed byte string.
fn sized(input: &[u8]) -> PResult<'_, &[u8]> {
    let (input, len) = le_u32(input)?;
    take(len)(input)
}

fn property(input: &[u8]) -> PResult<'_, Property> {
    let start = input;
    let (input, code) = le_u8(input)?;
    match code {
        b'C' => map(le_u8, |value| Property::Bool(value != 0))(input),
        b'Y' => map(le_i16, Property::I16)(input),
        b'I' => map(le_i32, Property::I32)(input),
        b'L' => map(le_i64, Property::I64)(input),
        b'F' => map(le_f32, Property::F32)(input),
        b'D' => map(le_f64, Property::F64)(input),
        b'S' => map(sized, |bytes| {
            Property::String(String::from_utf8_lossy(bytes).into_owned())
        })(input),
        b'R' => map(sized, |bytes| Property::Raw(bytes.to_vec()))(input),
        b'b' => array(input, bool_element).map(|(i, values)| (i, Property::BoolArray(values))),
        b'i' => array(input, i32_element).map(|(i, values)| (i, Property::I32Array(values))),
        b'l' => array(input, i64_element).map(|(i, values)| (i, Property::I64Array(values))),
        b'f' => array(input, f32_element).map(|(i, values)| (i, Property::F32Array(values))),
        b'd' => array(input, f64_element).map(|(i, values)| (i, Property::F64Array(values))),
        code => Err(failure(start, Reason::UnknownPropertyType(code))),
    }
}

fn bool_element(input: &[u8]) -> IResult<&[u8], bool, ()> {
    map(le_u8, |value| value != 0)(input)
}

fn i32_element(input: &[u8]) -> IResult<&[u8], i32, ()> {
    le_i32(input)
}

fn i64_element(input: &[u8]) -> IResult<&[u8], i64, ()> {
    le_i64(input)
}

fn f32_element(input: &[u8]) -> IResult<&[u8], f32, ()> {
    le_f32(input)
}

fn f64_element(input: &[u8]) -> IResult<&[u8], f64, ()> {
    le_f64(input)
}

/// Decode an array property: element count, encoding and payload byte length, then the payload
/// (raw or zlib-compressed).
fn array<'a, T>(
    input: &'a [u8],
    mut element: impl FnMut(&[u8]) -> IResult<&[u8], T, ()>,
) -> PResult<'a, Vec<T>> {
    let start = input;
    let (input, (len, encoding, byte_len)) = tuple((le_u32, le_u32, le_u32))(input)?;
    let (input, payload) = take(byte_len)(input)?;

    let expected = (len as usize).saturating_mul(size_of::<T>());
    let decoded = match encoding {
        0 => Cow::Borrowed(payload),
        1 => Cow::Owned(
            inflate(payload, expected)
                .map_err(|err| failure(start, Reason::Inflate(err.to_string())))?,
        ),
        encoding => return Err(failure(start, Reason::UnknownArrayEncoding(encoding))),
    };
    let length_mismatch = || {
        failure(
            start,
            Reason::ArrayLength {
                expected,
                actual: decoded.len(),
            },
        )
    };
    if decoded.len() != expected {
        return Err(length_mismatch());
    }

    let values = decoded
        .chunks_exact(size_of::<T>())
        .map(|chunk| element(chunk).map(|(_, value)| value))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| length_mismatch())?;
    Ok((input, values))
}

fn inflate(payload: &[u8], expected: usize) -> std::io::Result<Vec<u8>> {
    let mut decoded = Vec::with_capacity(expected.min(MAX_PREALLOCATION));
    // One extra byte is enough to detect an oversized payload.
    ZlibDecoder::new(payload)
        .take(expected as u64 + 1)
        .read_to_end(&mut decoded)?;
    Ok(decoded)
}


#[cfg(test)]
mod tests {
    use super::*;

    const HEADER_LEN: usize = 27;

    fn nodes() -> Vec<Node> {
        vec![
            Node::new("FBXHeaderExtension", vec![])
                .with_children(vec![Node::new("FBXVersion", vec![Property::I32(7400)])]),
            Node::new("Objects", vec![]).with_children(vec![Node::new(
                "Geometry",
                vec![
                    Property::I64(1001),
                    Property::String("Triangle\u{0}\u{1}Geometry".into()),
                    Property::String("Mesh".into()),
                ],
            )
            .with_children(vec![
                Node::new(
                    "Vertices",
                    vec![Property::F64Array(vec![
                        0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0,
                    ])],
                ),
                Node::new("PolygonVertexIndex", vec![Property::I32Array(vec![0, 1, -3])]),
                Node::new(
                    "Flags",
                    vec![
                        Property::Bool(true),
                        Property::I16(-2),
                        Property::F32(0.25),
                        Property::Raw(vec![1, 2, 3]),
                        Property::BoolArray(vec![true, false]),
                        Property::I64Array(vec![i64::MAX]),
                        Property::F32Array(vec![1.5]),
                    ],
                ),
            ])]),
        ]
    }

    #[test]
    fn decodes_node_tree() {
        let expected = nodes();
        for version in [7400, 7500] {
            for compress in [false, true] {
                let bytes = encode::document(version, &expected, compress);
                let document = parse(&bytes).expect("valid binary document");
                assert_eq!(document.version, version);
                assert_eq!(document.encoding, Encoding::Binary);
                assert_eq!(document.nodes, expected, "version {version}, compress {compress}");
            }
        }
    }

    #[test]
    fn truncated_data() {
        let bytes = encode::document(7400, &nodes(), false);
        let err = parse(&bytes[..bytes.len() / 2]).expect_err("truncated document");
        assert!(
            matches!(&err, FormatError::Binary { reason, .. } if reason == "unexpected end of data"),
            "{err}"
        );

        let err = parse(&bytes[..HEADER_LEN - 3]).expect_err("truncated header");
        assert!(matches!(err, FormatError::Binary { .. }));
    }

    #[test]
    fn truncated_at_record_boundary() {
        let bytes = encode::document(7400, &nodes(), false);
        let first_end = u32::from_le_bytes([
            bytes[HEADER_LEN],
            bytes[HEADER_LEN + 1],
            bytes[HEADER_LEN + 2],
            bytes[HEADER_LEN + 3],
        ]) as usize;
        for len in [HEADER_LEN, first_end] {
            let err = parse(&bytes[..len]).expect_err("missing null record");
            assert_eq!(
                err,
                FormatError::Binary {
                    reason: "unexpected end of data".into(),
                    offset: len,
                }
            );
        }
    }

    #[test]
    fn unknown_property_type() {
        let node = Node::new("N", vec![Property::String("value".into())]);
        let mut bytes = encode::document(7400, &[node], false);
        // Header, 12 byte record fields, name length and a one byte name.
        let code_offset = HEADER_LEN + 12 + 1 + 1;
        assert_eq!(bytes[code_offset], b'S');
        bytes[code_offset] = b'Z';

        let err = parse(&bytes).expect_err("unknown property type");
        assert_eq!(
            err,
            FormatError::Binary {
                reason: "unknown property type code 0x5a".into(),
                offset: code_offset,
            }
        );
    }

    #[test]
    fn end_offset_mismatch() {
        let node = Node::new("N", vec![Property::I32(1)]);
        let mut bytes = encode::document(7400, &[node], false);
        let end_offset = u32::from_le_bytes([
            bytes[HEADER_LEN],
            bytes[HEADER_LEN + 1],
            bytes[HEADER_LEN + 2],
            bytes[HEADER_LEN + 3],
        ]);
        bytes[HEADER_LEN..HEADER_LEN + 4].copy_from_slice(&(end_offset + 1).to_le_bytes());

        let err = parse(&bytes).expect_err("bad end offset");
        assert!(err.to_string().contains("header declares"), "{err}");
        assert!(err.to_string().contains("byte offset 27"), "{err}");
    }

    #[test]
    fn nesting_limit() {
        let mut node = Node::new("Leaf", vec![Property::I32(0)]);
        for _ in 0..MAX_DEPTH {
            node = Node::new("Branch", vec![]).with_children(vec![node]);
        }
        let bytes = encode::document(7400, &[node], false);
        let err = parse(&bytes).expect_err("nesting too deep");
        assert!(err.to_string().contains("nested deeper than 64"), "{err}");
    }
}
