//! Whole-file parsing.
//!
//! [`parse`] drives the preamble and file meta group readers,
//! derives the transfer syntax parameters,
//! and then parses data elements until the pixel data element,
//! whose offset and length are recorded without reading its body.

use crate::dataset::{DataSetParser, ParseOptions, PixelFragments};
use crate::meta::FileMetaTable;
use crate::source::ByteSource;
use dicomite_core::{
    tags, transfer_syntax, DataElement, DataElementHeader, Endianness, Length, Tag,
    TransferSyntax, VR,
};
use snafu::{ensure, Backtrace, ResultExt, Snafu};
use std::collections::HashMap;
use tracing::debug;

/// An error from parsing a DICOM file.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The preamble or file meta group was unreadable.
    #[snafu(display("Could not read file meta information"))]
    ReadMeta {
        #[snafu(backtrace)]
        source: crate::meta::Error,
    },

    /// The file declares a transfer syntax this library does not read.
    #[snafu(display("Unsupported transfer syntax `{}`", uid))]
    UnsupportedTransferSyntax { uid: String, backtrace: Backtrace },

    /// A data element of the main data set was malformed.
    #[snafu(display("Could not parse data set"))]
    ParseDataSet {
        #[snafu(backtrace)]
        source: crate::dataset::Error,
    },

    /// The image dimensions exceed the configured limits.
    #[snafu(display(
        "Image dimensions {} x {} exceed the configured limits",
        rows,
        columns
    ))]
    DimensionOutOfRange {
        rows: u64,
        columns: u64,
        backtrace: Backtrace,
    },

    /// The pixel data element uses an undefined length
    /// in a native (unencapsulated) transfer syntax.
    #[snafu(display(
        "Undefined pixel data length in native transfer syntax at position {}",
        position
    ))]
    UndefinedPixelDataLength { position: usize, backtrace: Backtrace },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Where the pixel data of a parsed file lives.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelDataInfo {
    /// byte offset of the element value within the source
    pub offset: u64,
    /// declared element length; undefined for encapsulated pixel data
    pub length: Length,
    /// the element's value representation
    pub vr: VR,
    /// fragment layout, for encapsulated pixel data only
    pub fragments: Option<PixelFragments>,
}

/// The outcome of parsing a DICOM file:
/// transfer syntax parameters, the main data set elements in order,
/// and the location of the pixel data.
#[derive(Debug)]
pub struct ParsedFile {
    /// the file meta information table
    pub meta: FileMetaTable,
    /// the resolved transfer syntax of the main data set
    pub transfer_syntax: &'static TransferSyntax,
    elements: Vec<DataElement>,
    index: HashMap<Tag, usize>,
    pixel_data: Option<PixelDataInfo>,
}

impl ParsedFile {
    /// The top-level data elements, in file order.
    pub fn elements(&self) -> &[DataElement] {
        &self.elements
    }

    /// Look up a top-level element by tag.
    pub fn element(&self, tag: Tag) -> Option<&DataElement> {
        self.index.get(&tag).map(|&at| &self.elements[at])
    }

    /// The byte order of binary values in the main data set.
    pub fn endianness(&self) -> Endianness {
        self.transfer_syntax.byte_order()
    }

    /// The recorded pixel data location, if the file has pixel data.
    pub fn pixel_data(&self) -> Option<&PixelDataInfo> {
        self.pixel_data.as_ref()
    }
}

/// Parse a complete DICOM file from the given byte source.
pub fn parse(source: &ByteSource, options: &ParseOptions) -> Result<ParsedFile> {
    let data = source.as_bytes();

    let (meta, dataset_start) = match FileMetaTable::read_from(data) {
        Ok(found) => found,
        Err(crate::meta::Error::NotDicom { .. }) if options.allow_missing_magic => {
            debug!("no DICM magic code, attempting a headerless implicit VR parse");
            (FileMetaTable::implicit_fallback(), 0)
        }
        Err(e) => return Err(e).context(ReadMetaSnafu),
    };

    let ts = transfer_syntax::from_uid(meta.transfer_syntax()).ok_or_else(|| {
        UnsupportedTransferSyntaxSnafu {
            uid: meta.transfer_syntax().to_owned(),
        }
        .build()
    })?;
    debug!(uid = ts.uid(), "transfer syntax resolved");

    let mut parser = DataSetParser::new(data, ts, *options);
    parser.seek_to(dataset_start).context(ParseDataSetSnafu)?;

    let mut elements = Vec::new();
    let mut index = HashMap::new();
    let mut pixel_data = None;

    while !parser.is_at_end() {
        let header = parser.read_element_header().context(ParseDataSetSnafu)?;

        if header.tag == tags::PIXEL_DATA {
            pixel_data = Some(read_pixel_data_info(&mut parser, &header, ts)?);
            break;
        }

        let value = parser.read_value_of(&header).context(ParseDataSetSnafu)?;
        let at = elements.len();
        elements.push(DataElement::new(header, value));
        index.insert(header.tag, at);
    }

    let parsed = ParsedFile {
        meta,
        transfer_syntax: ts,
        elements,
        index,
        pixel_data,
    };
    validate_dimensions(&parsed, options)?;
    Ok(parsed)
}

/// Record the pixel data location without materialising its body.
fn read_pixel_data_info(
    parser: &mut DataSetParser<'_>,
    header: &DataElementHeader,
    ts: &TransferSyntax,
) -> Result<PixelDataInfo> {
    let position = parser.position();

    if header.len.is_defined() {
        // native pixel data: check the length and skip the body
        parser.skip_value(header).context(ParseDataSetSnafu)?;
        return Ok(PixelDataInfo {
            offset: position as u64,
            length: header.len,
            vr: header.vr,
            fragments: None,
        });
    }

    // undefined length: only valid for encapsulated pixel data
    ensure!(
        !ts.is_native(),
        UndefinedPixelDataLengthSnafu { position }
    );
    let fragments = parser.read_pixel_fragments().context(ParseDataSetSnafu)?;
    Ok(PixelDataInfo {
        offset: position as u64,
        length: Length::UNDEFINED,
        vr: header.vr,
        fragments: Some(fragments),
    })
}

/// Check the declared image dimensions against the configured limits
/// before anything downstream trusts them.
fn validate_dimensions(parsed: &ParsedFile, options: &ParseOptions) -> Result<()> {
    let endianness = parsed.endianness();
    let rows = parsed
        .element(tags::ROWS)
        .and_then(|e| e.to_i64(endianness))
        .unwrap_or(0) as u64;
    let columns = parsed
        .element(tags::COLUMNS)
        .and_then(|e| e.to_i64(endianness))
        .unwrap_or(0) as u64;

    ensure!(
        rows <= u64::from(options.max_rows)
            && columns <= u64::from(options.max_columns)
            && rows * columns <= options.max_pixel_count,
        DimensionOutOfRangeSnafu { rows, columns }
    );
    Ok(())
}
