//! The IPP binary encoding (RFC 8010, the subset a printer answers with).
//!
//! An IPP message is an 8-byte header followed by attribute groups: a
//! one-octet group delimiter tag, then attributes encoded as
//! `value-tag(1) | name-length(2) | name | value-length(2) | value`,
//! closed by the end-of-attributes tag 0x03. Multi-valued attributes
//! repeat the record with a zero-length name (the continuation form),
//! except for the composite types (dateTime, octetString, resolution,
//! rangeOfInteger) whose single value is already a fixed aggregate.
//!
//! The attribute table itself is static, supplied by configuration; this
//! module knows how to lay it out on the wire and, just as importantly,
//! how many bytes that layout takes ([`attributes_size`] is exact, which
//! lets response buffers be sized up front).

use crate::buffer::Buffer;
use std::fmt;

// IPP operation ids (RFC 8011 section 4.4.15)
pub const VALIDATE_JOB: u16 = 0x0004;
pub const CREATE_JOB: u16 = 0x0005;
pub const SEND_DOCUMENT: u16 = 0x0006;
pub const GET_JOB_ATTRIBUTES: u16 = 0x0009;
pub const GET_PRINTER_ATTRIBUTES: u16 = 0x000B;

/// Status code reported in a response header for success.
pub const STATUS_OK: u16 = 0x0000;

/// Serialized sizes of the composite value types.
pub const DATE_TIME_SIZE: usize = 11;
pub const RESOLUTION_SIZE: usize = 9;
pub const RANGE_OF_INTEGER_SIZE: usize = 8;

/// Delimiter and value tags from RFC 8010 section 3.5.
///
/// Tags below 0x10 delimit attribute groups; tags from 0x10 up type
/// individual attribute values.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum IppTag {
    Operation = 0x01,
    Job = 0x02,
    End = 0x03,
    Printer = 0x04,
    UnsupportedGroup = 0x05,
    UnsupportedValue = 0x10,
    NoValue = 0x13,
    Integer = 0x21,
    Boolean = 0x22,
    Enum = 0x23,
    OctetString = 0x30,
    DateTime = 0x31,
    Resolution = 0x32,
    RangeOfInteger = 0x33,
    BegCollection = 0x34,
    EndCollection = 0x37,
    TextWithoutLanguage = 0x41,
    NameWithoutLanguage = 0x42,
    Keyword = 0x44,
    Uri = 0x45,
    Charset = 0x47,
    NaturalLanguage = 0x48,
    MimeMediaType = 0x49,
    MemberAttrName = 0x4A,
}

impl IppTag {
    /// Maps a configuration `type` name to its value tag.
    pub fn from_type_name(name: &str) -> Option<IppTag> {
        Some(match name {
            "unsupported" => IppTag::UnsupportedValue,
            "no-value" => IppTag::NoValue,
            "integer" => IppTag::Integer,
            "boolean" => IppTag::Boolean,
            "enum" => IppTag::Enum,
            "octetString" => IppTag::OctetString,
            "dateTime" => IppTag::DateTime,
            "resolution" => IppTag::Resolution,
            "rangeOfInteger" => IppTag::RangeOfInteger,
            "begCollection" => IppTag::BegCollection,
            "endCollection" => IppTag::EndCollection,
            "textWithoutLanguage" => IppTag::TextWithoutLanguage,
            "nameWithoutLanguage" => IppTag::NameWithoutLanguage,
            "keyword" => IppTag::Keyword,
            "uri" => IppTag::Uri,
            "charset" => IppTag::Charset,
            "naturalLanguage" => IppTag::NaturalLanguage,
            "mimeMediaType" => IppTag::MimeMediaType,
            "memberAttrName" => IppTag::MemberAttrName,
            _ => return None,
        })
    }
}

/// How a tag's values are laid out on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Encoding {
    Integer,
    Boolean,
    Text,
    OctetString,
    DateTime,
    Resolution,
    RangeOfInteger,
}

impl IppTag {
    fn encoding(self) -> Option<Encoding> {
        Some(match self {
            IppTag::Integer | IppTag::Enum => Encoding::Integer,
            IppTag::Boolean => Encoding::Boolean,
            IppTag::OctetString => Encoding::OctetString,
            IppTag::DateTime => Encoding::DateTime,
            IppTag::Resolution => Encoding::Resolution,
            IppTag::RangeOfInteger => Encoding::RangeOfInteger,
            IppTag::UnsupportedValue
            | IppTag::NoValue
            | IppTag::BegCollection
            | IppTag::EndCollection
            | IppTag::TextWithoutLanguage
            | IppTag::NameWithoutLanguage
            | IppTag::Keyword
            | IppTag::Uri
            | IppTag::Charset
            | IppTag::NaturalLanguage
            | IppTag::MimeMediaType
            | IppTag::MemberAttrName => Encoding::Text,
            // Group delimiters do not type values.
            IppTag::Operation
            | IppTag::Job
            | IppTag::End
            | IppTag::Printer
            | IppTag::UnsupportedGroup => return None,
        })
    }
}

/// An attribute value: a scalar or a homogeneous list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Int(i32),
    Bool(bool),
    Str(String),
    IntList(Vec<i32>),
    BoolList(Vec<bool>),
    StrList(Vec<String>),
    ByteList(Vec<u8>),
}

/// A typed, named attribute as loaded from configuration.
///
/// Construction checks that the value's shape matches the tag, so
/// serialization cannot fail later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IppAttribute {
    tag: IppTag,
    name: String,
    value: AttrValue,
}

#[derive(Debug)]
#[non_exhaustive]
pub enum AttributeError {
    /// The tag is a group delimiter, not a value type.
    NotAValueType(IppTag),
    /// The value's shape does not fit the tag.
    ValueShape {
        name: String,
        tag: IppTag,
        expected: &'static str,
    },
}

impl fmt::Display for AttributeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeError::NotAValueType(tag) => {
                write!(f, "{:?} is a group delimiter, not a value type", tag)
            }
            AttributeError::ValueShape {
                name,
                tag,
                expected,
            } => write!(f, "attribute {:?} of type {:?} needs {}", name, tag, expected),
        }
    }
}

impl std::error::Error for AttributeError {}

impl IppAttribute {
    pub fn new(tag: IppTag, name: &str, value: AttrValue) -> Result<Self, AttributeError> {
        let Some(encoding) = tag.encoding() else {
            return Err(AttributeError::NotAValueType(tag));
        };
        let shape_error = |expected| AttributeError::ValueShape {
            name: name.to_string(),
            tag,
            expected,
        };
        match (encoding, &value) {
            (Encoding::Integer, AttrValue::Int(_) | AttrValue::IntList(_)) => {}
            (Encoding::Integer, _) => return Err(shape_error("an integer or integer list")),
            (Encoding::Boolean, AttrValue::Bool(_) | AttrValue::BoolList(_)) => {}
            (Encoding::Boolean, _) => return Err(shape_error("a boolean or boolean list")),
            (Encoding::Text, AttrValue::Str(_) | AttrValue::StrList(_)) => {}
            (Encoding::Text, _) => return Err(shape_error("a string or string list")),
            (Encoding::OctetString, AttrValue::Str(_) | AttrValue::ByteList(_)) => {}
            (Encoding::OctetString, _) => return Err(shape_error("a string or byte list")),
            (Encoding::DateTime, AttrValue::ByteList(b)) if b.len() == DATE_TIME_SIZE => {}
            (Encoding::DateTime, _) => return Err(shape_error("a list of exactly 11 octets")),
            (Encoding::Resolution, AttrValue::IntList(l)) if l.len() == 3 => {}
            (Encoding::Resolution, _) => {
                return Err(shape_error("a list of exactly 3 integers"))
            }
            (Encoding::RangeOfInteger, AttrValue::IntList(l)) if l.len() == 2 => {}
            (Encoding::RangeOfInteger, _) => {
                return Err(shape_error("a list of exactly 2 integers"))
            }
        }
        Ok(Self {
            tag,
            name: name.to_string(),
            value,
        })
    }

    pub fn tag(&self) -> IppTag {
        self.tag
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &AttrValue {
        &self.value
    }

    /// Number of attribute records this attribute expands to: list
    /// entries for the plain list types, always one for the composites.
    fn records(&self) -> usize {
        match self.tag.encoding() {
            Some(Encoding::DateTime)
            | Some(Encoding::Resolution)
            | Some(Encoding::RangeOfInteger) => 1,
            Some(Encoding::OctetString) => 1,
            _ => match &self.value {
                AttrValue::IntList(l) => l.len(),
                AttrValue::BoolList(l) => l.len(),
                AttrValue::StrList(l) => l.len(),
                AttrValue::ByteList(l) => l.len(),
                _ => 1,
            },
        }
    }

    /// Exact serialized size of this attribute in bytes.
    fn size(&self) -> usize {
        // Each record carries a tag byte, a name length, and a value
        // length: 5 bytes of overhead. The name appears once.
        let base = 5 * self.records() + self.name.len();
        let payload = match (self.tag.encoding().unwrap(), &self.value) {
            (Encoding::Integer, AttrValue::Int(_)) => 4,
            (Encoding::Integer, AttrValue::IntList(l)) => 4 * l.len(),
            (Encoding::Boolean, AttrValue::Bool(_)) => 1,
            (Encoding::Boolean, AttrValue::BoolList(l)) => l.len(),
            (Encoding::Text, AttrValue::Str(s)) => s.len(),
            (Encoding::Text, AttrValue::StrList(l)) => l.iter().map(String::len).sum(),
            (Encoding::OctetString, AttrValue::Str(s)) => s.len(),
            (Encoding::OctetString, AttrValue::ByteList(b)) => b.len(),
            (Encoding::DateTime, _) => DATE_TIME_SIZE,
            (Encoding::Resolution, _) => RESOLUTION_SIZE,
            (Encoding::RangeOfInteger, _) => RANGE_OF_INTEGER_SIZE,
            _ => unreachable!("shape checked at construction"),
        };
        base + payload
    }

    fn add_to(&self, buf: &mut Buffer) {
        match (self.tag.encoding().unwrap(), &self.value) {
            (Encoding::Integer, AttrValue::Int(v)) => {
                add_int_record(self.tag, &self.name, true, *v, buf);
            }
            (Encoding::Integer, AttrValue::IntList(values)) => {
                for (i, v) in values.iter().enumerate() {
                    add_int_record(self.tag, &self.name, i == 0, *v, buf);
                }
            }
            (Encoding::Boolean, AttrValue::Bool(v)) => {
                add_bool_record(self.tag, &self.name, true, *v, buf);
            }
            (Encoding::Boolean, AttrValue::BoolList(values)) => {
                for (i, v) in values.iter().enumerate() {
                    add_bool_record(self.tag, &self.name, i == 0, *v, buf);
                }
            }
            (Encoding::Text, AttrValue::Str(v)) => {
                add_text_record(self.tag, &self.name, true, v, buf);
            }
            (Encoding::Text, AttrValue::StrList(values)) => {
                for (i, v) in values.iter().enumerate() {
                    add_text_record(self.tag, &self.name, i == 0, v, buf);
                }
            }
            (Encoding::OctetString, AttrValue::Str(v)) => {
                add_text_record(self.tag, &self.name, true, v, buf);
            }
            (Encoding::OctetString, AttrValue::ByteList(bytes)) => {
                buf.add_u8(self.tag as u8);
                add_name(&self.name, true, buf);
                buf.add_u16_be(bytes.len() as u16);
                buf.add_bytes(bytes);
            }
            (Encoding::DateTime, AttrValue::ByteList(bytes)) => {
                buf.add_u8(self.tag as u8);
                add_name(&self.name, true, buf);
                buf.add_u16_be(DATE_TIME_SIZE as u16);
                buf.add_bytes(bytes);
            }
            (Encoding::Resolution, AttrValue::IntList(values)) => {
                buf.add_u8(self.tag as u8);
                add_name(&self.name, true, buf);
                buf.add_u16_be(RESOLUTION_SIZE as u16);
                buf.add_i32_be(values[0]);
                buf.add_i32_be(values[1]);
                buf.add_u8(values[2] as u8);
            }
            (Encoding::RangeOfInteger, AttrValue::IntList(values)) => {
                buf.add_u8(self.tag as u8);
                add_name(&self.name, true, buf);
                buf.add_u16_be(RANGE_OF_INTEGER_SIZE as u16);
                buf.add_i32_be(values[0]);
                buf.add_i32_be(values[1]);
            }
            _ => unreachable!("shape checked at construction"),
        }
    }
}

/// Name length (big-endian) and, in the leading record of an attribute,
/// the name itself; continuation records carry a zero length.
fn add_name(name: &str, include_name: bool, buf: &mut Buffer) {
    if include_name {
        buf.add_u16_be(name.len() as u16);
        buf.add_bytes(name.as_bytes());
    } else {
        buf.add_u16_be(0);
    }
}

fn add_int_record(tag: IppTag, name: &str, include_name: bool, value: i32, buf: &mut Buffer) {
    buf.add_u8(tag as u8);
    add_name(name, include_name, buf);
    buf.add_u16_be(4);
    buf.add_i32_be(value);
}

fn add_bool_record(tag: IppTag, name: &str, include_name: bool, value: bool, buf: &mut Buffer) {
    buf.add_u8(tag as u8);
    add_name(name, include_name, buf);
    buf.add_u16_be(1);
    buf.add_u8(value as u8);
}

fn add_text_record(tag: IppTag, name: &str, include_name: bool, value: &str, buf: &mut Buffer) {
    buf.add_u8(tag as u8);
    add_name(name, include_name, buf);
    buf.add_u16_be(value.len() as u16);
    buf.add_bytes(value.as_bytes());
}

/// Appends a whole attribute group: the group delimiter tag followed by
/// every attribute in order.
pub fn add_attributes(group: IppTag, attributes: &[IppAttribute], buf: &mut Buffer) {
    buf.add_u8(group as u8);
    for attribute in attributes {
        attribute.add_to(buf);
    }
}

/// Appends the end-of-attributes delimiter.
pub fn add_end_of_attributes(buf: &mut Buffer) {
    buf.add_u8(IppTag::End as u8);
}

/// Exact number of bytes [`add_attributes`] will emit for `attributes`,
/// not counting the group delimiter itself.
pub fn attributes_size(attributes: &[IppAttribute]) -> usize {
    attributes.iter().map(IppAttribute::size).sum()
}

/// The 8-byte IPP message header. `operation_id` holds the operation in
/// a request and the status code in a response.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IppHeader {
    pub major: u8,
    pub minor: u8,
    pub operation_id: u16,
    pub request_id: i32,
}

pub const IPP_HEADER_SIZE: usize = 8;

impl IppHeader {
    pub fn serialize(&self, buf: &mut Buffer) {
        buf.add_u8(self.major);
        buf.add_u8(self.minor);
        buf.add_u16_be(self.operation_id);
        buf.add_i32_be(self.request_id);
    }

    /// Reads the leading 8 bytes of `message` as a header, leaving
    /// `message` untouched (the header bytes stay in place for the
    /// attribute strip that follows). Returns `None` if fewer than 8
    /// bytes are present.
    pub fn deserialize(message: &Buffer) -> Option<IppHeader> {
        if message.len() < IPP_HEADER_SIZE {
            return None;
        }
        let b = message.data();
        Some(IppHeader {
            major: b[0],
            minor: b[1],
            operation_id: u16::from_be_bytes([b[2], b[3]]),
            request_id: i32::from_be_bytes([b[4], b[5], b[6], b[7]]),
        })
    }
}

/// Strips the leading attribute section of a request body: walks group
/// delimiters and attribute records until the end-of-attributes tag and
/// erases everything up to and including it. The walk runs over the
/// whole buffer, message header included; header octets all sit in the
/// delimiter range for the requests a printer sees, so the header falls
/// away with the attribute section.
///
/// Returns false, leaving `body` untouched, when a record's declared
/// name or value length overruns the buffer or no end tag is found.
pub fn remove_attributes(body: &mut Buffer) -> bool {
    let end = {
        let bytes = body.data();
        let mut pos = 0;
        loop {
            if pos >= bytes.len() {
                return false;
            }
            let tag = bytes[pos];
            if tag == IppTag::End as u8 {
                break pos + 1;
            }
            if tag < 0x10 {
                // Group delimiter: a bare tag byte.
                pos += 1;
                continue;
            }
            // Attribute record: tag, name-length, name, value-length, value.
            if pos + 3 > bytes.len() {
                return false;
            }
            let name_len = u16::from_be_bytes([bytes[pos + 1], bytes[pos + 2]]) as usize;
            pos += 3 + name_len;
            if pos + 2 > bytes.len() {
                return false;
            }
            let value_len = u16::from_be_bytes([bytes[pos], bytes[pos + 1]]) as usize;
            pos += 2 + value_len;
            if pos > bytes.len() {
                return false;
            }
        }
    };
    body.erase(0, end);
    true
}

#[cfg(test)]
#[path = "tests/ipp.rs"]
mod tests;
