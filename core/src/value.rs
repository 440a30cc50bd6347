//! In-memory representation of parsed data elements.
//!
//! Scalar values are kept as the raw bytes read from the stream,
//! next to their value representation;
//! interpretation is deferred until one of the typed accessors is called.
//! Sequence values hold the nested items as lists of parsed elements.

use crate::header::{DataElementHeader, Header, Length, Tag, VR};
use crate::transfer_syntax::Endianness;
use byteordered::byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::borrow::Cow;

/// A single item of a sequence: an ordered list of data elements.
pub type Item = Vec<DataElement>;

/// The payload of a parsed data element.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// A primitive value, kept as the raw bytes from the stream.
    Primitive(Vec<u8>),
    /// A sequence of items, each item a nested list of data elements.
    Sequence(Vec<Item>),
}

impl DataValue {
    /// The number of encoded bytes (primitive values only).
    pub fn size(&self) -> Length {
        match self {
            DataValue::Primitive(data) => Length(data.len() as u32),
            DataValue::Sequence(_) => Length::UNDEFINED,
        }
    }
}

/// A parsed data element: header plus payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DataElement {
    /// the element header as read from the stream
    pub header: DataElementHeader,
    /// the element payload
    pub value: DataValue,
}

/// Strip the trailing padding which DICOM permits in string values:
/// spaces for text, plus a single NUL for UI and friends.
fn trim_padding(s: &str) -> &str {
    s.trim_end_matches(|c: char| c == '\0' || c == ' ')
}

impl Header for DataElement {
    fn tag(&self) -> Tag {
        self.header.tag
    }

    fn len(&self) -> Length {
        self.header.len
    }
}

impl DataElement {
    /// Create a data element from the given parts.
    pub fn new(header: DataElementHeader, value: DataValue) -> Self {
        DataElement { header, value }
    }

    /// Retrieve the element's value representation.
    pub fn vr(&self) -> VR {
        self.header.vr
    }

    /// Borrow the raw value bytes, if this is a primitive element.
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.value {
            DataValue::Primitive(data) => Some(data),
            DataValue::Sequence(_) => None,
        }
    }

    /// Borrow the sequence items, if this is a sequence element.
    pub fn items(&self) -> Option<&[Item]> {
        match &self.value {
            DataValue::Sequence(items) => Some(items),
            DataValue::Primitive(_) => None,
        }
    }

    /// Interpret the value as character data, with padding trimmed.
    /// Returns `None` for sequences and for VRs which do not hold text.
    pub fn to_text(&self) -> Option<Cow<str>> {
        if !self.vr().is_text() {
            return None;
        }
        let bytes = self.bytes()?;
        match String::from_utf8_lossy(bytes) {
            Cow::Borrowed(s) => Some(Cow::Borrowed(trim_padding(s))),
            Cow::Owned(s) => Some(Cow::Owned(trim_padding(&s).to_owned())),
        }
    }

    /// Interpret the value as a single integer.
    ///
    /// Binary integer VRs are read in the given byte order;
    /// numeric strings (IS, DS) are parsed from their first component.
    pub fn to_i64(&self, endianness: Endianness) -> Option<i64> {
        let bytes = self.bytes()?;
        match self.vr() {
            VR::US => read_all::<u16>(bytes, endianness).first().map(|&v| v as i64),
            VR::UL => read_all::<u32>(bytes, endianness).first().map(|&v| v as i64),
            VR::SS => read_all::<i16>(bytes, endianness).first().map(|&v| v as i64),
            VR::SL => read_all::<i32>(bytes, endianness).first().map(|&v| v as i64),
            vr if vr.is_text() => first_component(bytes)?.parse::<f64>().ok().map(|v| v as i64),
            _ => None,
        }
    }

    /// Interpret the value as a single floating point number.
    pub fn to_f64(&self, endianness: Endianness) -> Option<f64> {
        let bytes = self.bytes()?;
        match self.vr() {
            VR::FL => read_all::<f32>(bytes, endianness).first().map(|&v| v as f64),
            VR::FD => read_all::<f64>(bytes, endianness).first().copied(),
            vr if vr.is_text() => first_component(bytes)?.parse().ok(),
            _ => self.to_i64(endianness).map(|v| v as f64),
        }
    }

    /// Interpret the value as a list of floating point numbers.
    ///
    /// Multi-valued numeric strings are split at backslashes;
    /// binary numeric VRs yield one number per encoded element.
    pub fn to_multi_f64(&self, endianness: Endianness) -> Option<Vec<f64>> {
        let bytes = self.bytes()?;
        match self.vr() {
            VR::FL => Some(
                read_all::<f32>(bytes, endianness)
                    .into_iter()
                    .map(|v| v as f64)
                    .collect(),
            ),
            VR::FD => Some(read_all::<f64>(bytes, endianness)),
            VR::US => Some(
                read_all::<u16>(bytes, endianness)
                    .into_iter()
                    .map(|v| v as f64)
                    .collect(),
            ),
            VR::SS => Some(
                read_all::<i16>(bytes, endianness)
                    .into_iter()
                    .map(|v| v as f64)
                    .collect(),
            ),
            VR::UL => Some(
                read_all::<u32>(bytes, endianness)
                    .into_iter()
                    .map(|v| v as f64)
                    .collect(),
            ),
            VR::SL => Some(
                read_all::<i32>(bytes, endianness)
                    .into_iter()
                    .map(|v| v as f64)
                    .collect(),
            ),
            vr if vr.is_text() => {
                let text = String::from_utf8_lossy(bytes);
                let mut out = Vec::new();
                for part in trim_padding(&text).split('\\') {
                    out.push(part.trim().parse().ok()?);
                }
                Some(out)
            }
            _ => None,
        }
    }

    /// Render the value as a human readable string,
    /// as used by metadata queries and tag listings.
    pub fn to_display_string(&self, endianness: Endianness) -> Option<String> {
        match &self.value {
            DataValue::Sequence(items) => Some(format!("<sequence of {} items>", items.len())),
            DataValue::Primitive(bytes) => {
                if self.vr().is_text() {
                    return self.to_text().map(|s| s.into_owned());
                }
                match self.vr() {
                    VR::US | VR::SS | VR::UL | VR::SL | VR::FL | VR::FD => {
                        let values = self.to_multi_f64(endianness)?;
                        Some(
                            values
                                .iter()
                                .map(|v| {
                                    if v.fract() == 0.0 {
                                        format!("{}", *v as i64)
                                    } else {
                                        format!("{}", v)
                                    }
                                })
                                .collect::<Vec<_>>()
                                .join("\\"),
                        )
                    }
                    VR::AT if bytes.len() >= 4 => {
                        let g = read_one_u16(&bytes[0..2], endianness);
                        let e = read_one_u16(&bytes[2..4], endianness);
                        Some(Tag(g, e).to_string())
                    }
                    _ => Some(format!("<{} bytes>", bytes.len())),
                }
            }
        }
    }
}

fn read_one_u16(bytes: &[u8], endianness: Endianness) -> u16 {
    match endianness {
        Endianness::Little => LittleEndian::read_u16(bytes),
        Endianness::Big => BigEndian::read_u16(bytes),
    }
}

/// First backslash-separated component of a numeric string value, trimmed.
fn first_component(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    let first = trim_padding(&text).split('\\').next()?.trim();
    if first.is_empty() {
        None
    } else {
        Some(first.to_owned())
    }
}

/// A fixed-size numeric sample which can be read from a byte slice
/// in either byte order.
trait Scalar: Sized + Copy {
    const SIZE: usize;
    fn read(bytes: &[u8], endianness: Endianness) -> Self;
}

macro_rules! impl_scalar {
    ($t:ty, $size:expr, $read:ident) => {
        impl Scalar for $t {
            const SIZE: usize = $size;
            fn read(bytes: &[u8], endianness: Endianness) -> Self {
                match endianness {
                    Endianness::Little => LittleEndian::$read(bytes),
                    Endianness::Big => BigEndian::$read(bytes),
                }
            }
        }
    };
}

impl_scalar!(u16, 2, read_u16);
impl_scalar!(i16, 2, read_i16);
impl_scalar!(u32, 4, read_u32);
impl_scalar!(i32, 4, read_i32);
impl_scalar!(f32, 4, read_f32);
impl_scalar!(f64, 8, read_f64);

fn read_all<T: Scalar>(bytes: &[u8], endianness: Endianness) -> Vec<T> {
    bytes
        .chunks_exact(T::SIZE)
        .map(|chunk| T::read(chunk, endianness))
        .collect()
}
