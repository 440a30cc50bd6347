//! Data element parsing.
//!
//! [`DataSetParser`] reads one data element at a time from a byte slice,
//! following the value representation mode and byte order of the
//! file's transfer syntax.
//! Sequences and items are parsed recursively with an explicit depth
//! counter, which is the single source of truth for the nesting limit.
//!
//! Two length rules are enforced on every element before anything is
//! allocated: a declared length may never exceed the bytes remaining in
//! the enclosing container, and the undefined length marker is only
//! accepted where the standard allows it
//! (sequences, items and the pixel data element).

use crate::reader::BinaryReader;
use dicomite_core::dictionary::TagDictionary;
use dicomite_core::header::HeaderError;
use dicomite_core::{
    tags, DataElement, DataElementHeader, DataValue, Header, Item, Length, SequenceItemHeader,
    Tag, TransferSyntax, VR,
};
use snafu::{ensure, Backtrace, ResultExt, Snafu};
use tracing::warn;

/// An error found while parsing a data element.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The element header could not be read.
    #[snafu(display("Could not read element header at position {}", position))]
    ReadHeader {
        position: usize,
        #[snafu(backtrace)]
        source: crate::reader::Error,
    },

    /// The element value could not be read.
    #[snafu(display("Could not read value of element {} at position {}", tag, position))]
    ReadValue {
        tag: Tag,
        position: usize,
        #[snafu(backtrace)]
        source: crate::reader::Error,
    },

    /// The two bytes at the VR position do not form a value representation.
    #[snafu(display(
        "Invalid value representation {:?} for element {} at position {}",
        bytes,
        tag,
        position
    ))]
    InvalidVr {
        tag: Tag,
        bytes: [u8; 2],
        position: usize,
        backtrace: Backtrace,
    },

    /// A declared length exceeds the enclosing container.
    #[snafu(display(
        "Declared length {} of element {} at position {} exceeds the {} bytes left in its container",
        declared,
        tag,
        position,
        remaining
    ))]
    MaliciousLength {
        tag: Tag,
        declared: u32,
        remaining: usize,
        position: usize,
        backtrace: Backtrace,
    },

    /// The undefined length marker was used on an element
    /// which requires a defined length.
    #[snafu(display(
        "Undefined length not allowed for element {} at position {}",
        tag,
        position
    ))]
    UndefinedLength {
        tag: Tag,
        position: usize,
        backtrace: Backtrace,
    },

    /// Sequences are nested deeper than the configured limit.
    #[snafu(display(
        "Sequence nesting depth {} at position {} exceeds the configured limit",
        depth,
        position
    ))]
    SequenceTooDeep {
        depth: u32,
        position: usize,
        backtrace: Backtrace,
    },

    /// An item or delimiter element was malformed.
    #[snafu(display("Bad sequence item at position {}", position))]
    BadItemHeader {
        position: usize,
        source: HeaderError,
        backtrace: Backtrace,
    },

    /// A delimiter appeared where none was expected.
    #[snafu(display("Unexpected delimiter {} at position {}", tag, position))]
    UnexpectedDelimiter {
        tag: Tag,
        position: usize,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Limits and toggles for parsing a file.
///
/// The defaults are safe for untrusted input.
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Maximum sequence nesting depth.
    pub max_sequence_depth: u32,
    /// Maximum accepted value of the Rows attribute.
    pub max_rows: u32,
    /// Maximum accepted value of the Columns attribute.
    pub max_columns: u32,
    /// Maximum accepted number of pixels per frame (Rows times Columns).
    pub max_pixel_count: u64,
    /// Attempt an implicit VR parse from offset zero
    /// when the `DICM` magic code is missing.
    pub allow_missing_magic: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            max_sequence_depth: 16,
            max_rows: 16_384,
            max_columns: 16_384,
            max_pixel_count: 1 << 26,
            allow_missing_magic: false,
        }
    }
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum sequence nesting depth.
    pub fn max_sequence_depth(mut self, depth: u32) -> Self {
        self.max_sequence_depth = depth;
        self
    }

    /// Set the maximum accepted image dimensions.
    pub fn max_dimensions(mut self, rows: u32, columns: u32) -> Self {
        self.max_rows = rows;
        self.max_columns = columns;
        self
    }

    /// Set the maximum accepted number of pixels per frame.
    pub fn max_pixel_count(mut self, count: u64) -> Self {
        self.max_pixel_count = count;
        self
    }

    /// Tolerate a missing `DICM` magic code.
    pub fn allow_missing_magic(mut self, allow: bool) -> Self {
        self.allow_missing_magic = allow;
        self
    }
}

/// Offsets of the parts of an encapsulated pixel data element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PixelFragments {
    /// the frame offsets from the basic offset table,
    /// empty when the table itself is empty
    pub basic_offset_table: Vec<u32>,
    /// `(offset, length)` of each fragment after the offset table;
    /// offsets are absolute within the byte source
    pub fragments: Vec<(u64, u32)>,
}

/// A parser for one DICOM data set over a byte slice.
#[derive(Debug)]
pub struct DataSetParser<'a> {
    reader: BinaryReader<'a>,
    explicit_vr: bool,
    options: ParseOptions,
}

impl<'a> DataSetParser<'a> {
    /// Create a parser over the given bytes
    /// under the given transfer syntax parameters.
    pub fn new(data: &'a [u8], ts: &TransferSyntax, options: ParseOptions) -> Self {
        DataSetParser {
            reader: BinaryReader::new(data, ts.byte_order()),
            explicit_vr: ts.explicit_vr(),
            options,
        }
    }

    /// The current cursor position.
    pub fn position(&self) -> usize {
        self.reader.position()
    }

    /// The number of bytes left in the source.
    pub fn remaining(&self) -> usize {
        self.reader.remaining()
    }

    /// Whether the cursor is at the end of the source.
    pub fn is_at_end(&self) -> bool {
        self.reader.is_at_end()
    }

    /// Move the cursor to an absolute position.
    pub fn seek_to(&mut self, position: usize) -> Result<()> {
        let at = self.position();
        self.reader
            .seek_to(position)
            .context(ReadHeaderSnafu { position: at })
    }

    /// Parse one element header at the cursor.
    ///
    /// Elements of group `FFFE` (items and delimiters) never carry
    /// a VR and are returned with VR UN regardless of the VR mode.
    pub fn read_element_header(&mut self) -> Result<DataElementHeader> {
        let position = self.position();
        let tag = self.reader.read_tag().context(ReadHeaderSnafu { position })?;

        if tag.group() == 0xFFFE {
            let len = self.reader.read_u32().context(ReadHeaderSnafu { position })?;
            return Ok(DataElementHeader::new(tag, VR::UN, Length(len)));
        }

        if !self.explicit_vr {
            let len = self.reader.read_u32().context(ReadHeaderSnafu { position })?;
            return Ok(DataElementHeader::new(
                tag,
                TagDictionary::vr_of(tag),
                Length(len),
            ));
        }

        let vr_bytes = self.reader.take(2).context(ReadHeaderSnafu { position })?;
        let vr_bytes = [vr_bytes[0], vr_bytes[1]];
        let vr = match VR::from_binary(vr_bytes) {
            Some(vr) => vr,
            None => {
                ensure!(
                    vr_bytes.iter().all(u8::is_ascii_uppercase),
                    InvalidVrSnafu {
                        tag,
                        bytes: vr_bytes,
                        position,
                    }
                );
                warn!(
                    "unrecognized VR {:?} of element {} at position {}, reading as UN",
                    vr_bytes, tag, position
                );
                VR::UN
            }
        };

        let len = if vr.is_long_header() {
            // two reserved bytes, then a 32-bit length
            self.reader.skip(2).context(ReadHeaderSnafu { position })?;
            self.reader.read_u32().context(ReadHeaderSnafu { position })?
        } else {
            u32::from(self.reader.read_u16().context(ReadHeaderSnafu { position })?)
        };

        Ok(DataElementHeader::new(tag, vr, Length(len)))
    }

    /// Parse one complete element (header and value) at the cursor.
    pub fn read_element(&mut self) -> Result<DataElement> {
        let header = self.read_element_header()?;
        let value = self.read_value_of(&header)?;
        Ok(DataElement::new(header, value))
    }

    /// Parse the value of an element whose header was just read,
    /// descending into sequence items as needed.
    pub fn read_value_of(&mut self, header: &DataElementHeader) -> Result<DataValue> {
        self.read_value(header, 0, None)
    }

    /// `container_end` is the absolute end of the enclosing item,
    /// or `None` when the enclosing container is the whole source.
    fn read_value(
        &mut self,
        header: &DataElementHeader,
        depth: u32,
        container_end: Option<usize>,
    ) -> Result<DataValue> {
        let position = self.position();
        let tag = header.tag;
        let bound = container_end
            .map(|e| e.saturating_sub(position))
            .unwrap_or_else(|| self.remaining());

        if header.len.is_undefined() {
            // undefined lengths are the realm of sequences;
            // in implicit VR mode the dictionary cannot know better,
            // so UN with undefined length is read as a sequence as well
            ensure!(
                header.vr == VR::SQ || (header.vr == VR::UN && !self.explicit_vr),
                UndefinedLengthSnafu { tag, position }
            );
            return Ok(DataValue::Sequence(self.read_items(None, depth + 1)?));
        }

        let len = header.len.0 as usize;
        ensure!(
            len <= bound,
            MaliciousLengthSnafu {
                tag,
                declared: header.len.0,
                remaining: bound,
                position,
            }
        );

        if header.vr == VR::SQ {
            let end = self.position() + len;
            return Ok(DataValue::Sequence(self.read_items(Some(end), depth + 1)?));
        }

        let bytes = self
            .reader
            .take(len)
            .context(ReadValueSnafu { tag, position })?;
        Ok(DataValue::Primitive(bytes.to_vec()))
    }

    /// Parse the items of a sequence value.
    ///
    /// `end` is the absolute end of the sequence for a declared length,
    /// or `None` to read until a sequence delimiter.
    /// `depth` is the nesting depth of this sequence, starting at 1.
    fn read_items(&mut self, end: Option<usize>, depth: u32) -> Result<Vec<Item>> {
        ensure!(
            depth <= self.options.max_sequence_depth,
            SequenceTooDeepSnafu {
                depth,
                position: self.position(),
            }
        );

        let mut items = Vec::new();
        loop {
            if let Some(end) = end {
                if self.position() >= end {
                    break;
                }
            }

            match self.read_item_header()? {
                SequenceItemHeader::Item { len } => {
                    let item_end = match len.get() {
                        Some(len) => {
                            let position = self.position();
                            let bound = end
                                .map(|e| e - position)
                                .unwrap_or_else(|| self.remaining());
                            ensure!(
                                len as usize <= bound,
                                MaliciousLengthSnafu {
                                    tag: tags::ITEM,
                                    declared: len,
                                    remaining: bound,
                                    position,
                                }
                            );
                            Some(position + len as usize)
                        }
                        None => None,
                    };
                    items.push(self.read_item_elements(item_end, depth)?);
                }
                SequenceItemHeader::SequenceDelimiter => break,
                SequenceItemHeader::ItemDelimiter => {
                    return UnexpectedDelimiterSnafu {
                        tag: tags::ITEM_DELIMITATION_ITEM,
                        position: self.position(),
                    }
                    .fail();
                }
            }
        }
        Ok(items)
    }

    /// Parse the elements of one item,
    /// until its declared end or an item delimiter.
    fn read_item_elements(&mut self, end: Option<usize>, depth: u32) -> Result<Item> {
        let mut elements = Vec::new();
        loop {
            if let Some(end) = end {
                if self.position() >= end {
                    break;
                }
            }
            let header = self.read_element_header()?;
            if header.is_item_delimiter() {
                ensure!(
                    end.is_none(),
                    UnexpectedDelimiterSnafu {
                        tag: header.tag,
                        position: self.position(),
                    }
                );
                break;
            }
            ensure!(
                header.tag.group() != 0xFFFE,
                UnexpectedDelimiterSnafu {
                    tag: header.tag,
                    position: self.position(),
                }
            );
            let value = self.read_value(&header, depth, end)?;
            elements.push(DataElement::new(header, value));
        }
        Ok(elements)
    }

    /// Skip the value of an element with a defined length,
    /// after checking it against the remaining container bytes.
    /// This is how the pixel data body is passed over
    /// without being materialised.
    pub fn skip_value(&mut self, header: &DataElementHeader) -> Result<()> {
        let position = self.position();
        let len = match header.len.get() {
            Some(len) => len as usize,
            None => {
                return UndefinedLengthSnafu {
                    tag: header.tag,
                    position,
                }
                .fail()
            }
        };
        ensure!(
            len <= self.remaining(),
            MaliciousLengthSnafu {
                tag: header.tag,
                declared: header.len.0,
                remaining: self.remaining(),
                position,
            }
        );
        self.reader.skip(len).context(ReadValueSnafu {
            tag: header.tag,
            position,
        })
    }

    /// Parse a sequence item header at the cursor.
    pub fn read_item_header(&mut self) -> Result<SequenceItemHeader> {
        let position = self.position();
        let tag = self.reader.read_tag().context(ReadHeaderSnafu { position })?;
        let len = self.reader.read_u32().context(ReadHeaderSnafu { position })?;
        SequenceItemHeader::new(tag, Length(len)).context(BadItemHeaderSnafu { position })
    }

    /// Record the fragments of an encapsulated pixel data element
    /// whose header (with undefined length) was just read.
    ///
    /// The first item is the basic offset table; its content is read.
    /// Every following fragment is recorded as `(offset, length)`
    /// and skipped without materialising its bytes.
    pub fn read_pixel_fragments(&mut self) -> Result<PixelFragments> {
        let mut out = PixelFragments::default();
        let mut first = true;
        loop {
            let position = self.position();
            match self.read_item_header()? {
                SequenceItemHeader::Item { len } => {
                    let len = match len.get() {
                        Some(len) => len,
                        None => {
                            return UndefinedLengthSnafu {
                                tag: tags::ITEM,
                                position,
                            }
                            .fail()
                        }
                    };
                    ensure!(
                        len as usize <= self.remaining(),
                        MaliciousLengthSnafu {
                            tag: tags::ITEM,
                            declared: len,
                            remaining: self.remaining(),
                            position,
                        }
                    );
                    if first {
                        first = false;
                        // basic offset table: zero or more 32-bit frame offsets
                        let count = len as usize / 4;
                        for _ in 0..count {
                            let offset = self
                                .reader
                                .read_u32()
                                .context(ReadValueSnafu {
                                    tag: tags::ITEM,
                                    position,
                                })?;
                            out.basic_offset_table.push(offset);
                        }
                        self.reader
                            .skip(len as usize - count * 4)
                            .context(ReadValueSnafu {
                                tag: tags::ITEM,
                                position,
                            })?;
                    } else {
                        out.fragments.push((self.position() as u64, len));
                        self.reader.skip(len as usize).context(ReadValueSnafu {
                            tag: tags::ITEM,
                            position,
                        })?;
                    }
                }
                SequenceItemHeader::SequenceDelimiter => break,
                SequenceItemHeader::ItemDelimiter => {
                    return UnexpectedDelimiterSnafu {
                        tag: tags::ITEM_DELIMITATION_ITEM,
                        position,
                    }
                    .fail();
                }
            }
        }
        Ok(out)
    }
}
