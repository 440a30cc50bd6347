//! A high-level, read-only API for DICOM files.
//!
//! The entry point is the [`Decoder`]:
//! it parses a file once at construction
//! and then serves any number of metadata queries
//! from any number of threads until dropped.
//! Pixel data is never read at construction;
//! the `dicomite-pixeldata` crate adds the typed pixel operations
//! on top of this type.
//!
//! # Examples
//!
//! ```no_run
//! use dicomite_core::tags;
//! use dicomite_object::Decoder;
//!
//! # fn run() -> Result<(), dicomite_object::Error> {
//! let decoder = Decoder::open("0001.dcm")?;
//!
//! let modality = decoder.info(tags::MODALITY);
//! let (columns, rows) = decoder.dimensions().unwrap_or((0, 0));
//! let status = decoder.validate();
//! # Ok(())
//! # }
//! ```
//!
//! Files larger than a configurable threshold are memory mapped
//! instead of read into memory; see [`OpenOptions`].

mod validation;

pub use validation::ValidationStatus;

use dicomite_core::{
    tags, DataElement, Endianness, PhotometricInterpretation, PixelRepresentation, Tag,
    TransferSyntax,
};
use dicomite_parser::dataset::ParseOptions;
use dicomite_parser::file::{parse, ParsedFile};
use dicomite_parser::meta::FileMetaTable;
use dicomite_parser::source::ByteSource;
use snafu::{ResultExt, Snafu};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;

/// An error from constructing a [`Decoder`].
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The file could not be opened or mapped.
    #[snafu(display("Could not open DICOM file"))]
    OpenSource {
        #[snafu(backtrace)]
        source: dicomite_parser::source::Error,
    },

    /// The file could not be parsed.
    #[snafu(display("Could not parse DICOM file"))]
    ParseFile {
        #[snafu(backtrace)]
        source: dicomite_parser::file::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Files at least this large are memory mapped by default.
const DEFAULT_MMAP_THRESHOLD: u64 = 10 * 1024 * 1024;

/// Options for opening a DICOM file.
#[derive(Debug, Clone, Copy)]
pub struct OpenOptions {
    parse: ParseOptions,
    mmap_threshold: u64,
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions {
            parse: ParseOptions::default(),
            mmap_threshold: DEFAULT_MMAP_THRESHOLD,
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the given data set parsing options.
    pub fn parse_options(mut self, options: ParseOptions) -> Self {
        self.parse = options;
        self
    }

    /// Memory map files of at least this many bytes
    /// instead of reading them into memory.
    pub fn mmap_threshold(mut self, threshold: u64) -> Self {
        self.mmap_threshold = threshold;
        self
    }

    /// Open and parse the file at the given path.
    pub fn open<P: AsRef<Path>>(self, path: P) -> Result<Decoder> {
        let path = path.as_ref();
        let file_len = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let source = if file_len >= self.mmap_threshold {
            ByteSource::map(path).context(OpenSourceSnafu)?
        } else {
            ByteSource::open(path).context(OpenSourceSnafu)?
        };
        Decoder::from_source(source, &self.parse)
    }

    /// Open and parse the given byte range of the file at `path`.
    pub fn open_range<P: AsRef<Path>>(self, path: P, offset: u64, length: u64) -> Result<Decoder> {
        let path = path.as_ref();
        let source = if length >= self.mmap_threshold {
            ByteSource::map_range(path, offset, length).context(OpenSourceSnafu)?
        } else {
            ByteSource::open_range(path, offset, length).context(OpenSourceSnafu)?
        };
        Decoder::from_source(source, &self.parse)
    }
}

/// Window center and width, from `(0028,1050)` and `(0028,1051)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSettings {
    pub center: f64,
    pub width: f64,
}

/// The linear rescale of stored values, from `(0028,1052)` and `(0028,1053)`.
/// Missing attributes yield the identity transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rescale {
    pub intercept: f64,
    pub slope: f64,
}

/// A parsed DICOM file and its metadata query API.
///
/// The decoder is logically read-only after construction.
/// Rendered attribute strings are cached behind a mutex,
/// so [`info`](Self::info) and friends can be called
/// from multiple threads concurrently.
#[derive(Debug)]
pub struct Decoder {
    source: ByteSource,
    parsed: ParsedFile,
    rendered: Mutex<HashMap<Tag, String>>,
}

impl Decoder {
    /// Open and parse the DICOM file at the given path
    /// with default options.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Decoder> {
        OpenOptions::new().open(path)
    }

    /// Open and parse the given byte range of a file,
    /// for containers which embed DICOM data at an offset.
    pub fn open_range<P: AsRef<Path>>(path: P, offset: u64, length: u64) -> Result<Decoder> {
        OpenOptions::new().open_range(path, offset, length)
    }

    /// Parse a DICOM file already held in memory.
    pub fn from_vec(data: Vec<u8>) -> Result<Decoder> {
        Decoder::from_source(ByteSource::from_vec(data), &ParseOptions::default())
    }

    fn from_source(source: ByteSource, options: &ParseOptions) -> Result<Decoder> {
        let parsed = parse(&source, options).context(ParseFileSnafu)?;
        Ok(Decoder {
            source,
            parsed,
            rendered: Mutex::new(HashMap::new()),
        })
    }

    /// The parsed file structure, including the pixel data location.
    pub fn parsed(&self) -> &ParsedFile {
        &self.parsed
    }

    /// The byte source backing this decoder.
    pub fn source(&self) -> &ByteSource {
        &self.source
    }

    /// The file meta information table.
    pub fn meta(&self) -> &FileMetaTable {
        &self.parsed.meta
    }

    /// The transfer syntax of the main data set.
    pub fn transfer_syntax(&self) -> &'static TransferSyntax {
        self.parsed.transfer_syntax
    }

    /// The byte order of binary values in the main data set.
    pub fn endianness(&self) -> Endianness {
        self.parsed.endianness()
    }

    /// Look up a top-level data element by tag.
    pub fn element(&self, tag: Tag) -> Option<&DataElement> {
        self.parsed.element(tag)
    }

    /// The value of the given attribute rendered as a string,
    /// or `None` if the attribute is absent.
    ///
    /// Rendered strings are cached; the cache is the only mutable
    /// state of the decoder and is guarded by a mutex.
    pub fn info(&self, tag: Tag) -> Option<String> {
        if let Some(hit) = self
            .rendered
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&tag)
        {
            return Some(hit.clone());
        }
        let text = self
            .element(tag)?
            .to_display_string(self.endianness())?;
        self.rendered
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(tag, text.clone());
        Some(text)
    }

    /// The value of the given attribute as an integer, if present.
    pub fn int(&self, tag: Tag) -> Option<i64> {
        self.element(tag)?.to_i64(self.endianness())
    }

    /// The value of the given attribute as a floating point number.
    pub fn float(&self, tag: Tag) -> Option<f64> {
        self.element(tag)?.to_f64(self.endianness())
    }

    /// Render every top-level attribute into a tag-ordered map.
    pub fn all_tags(&self) -> BTreeMap<Tag, String> {
        let endianness = self.endianness();
        self.parsed
            .elements()
            .iter()
            .filter_map(|e| {
                e.to_display_string(endianness)
                    .map(|text| (e.header.tag, text))
            })
            .collect()
    }

    /// The image size as `(columns, rows)`, when both attributes exist.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let columns = self.int(tags::COLUMNS)?;
        let rows = self.int(tags::ROWS)?;
        Some((columns as u32, rows as u32))
    }

    /// The physical pixel spacing as `(row_spacing, column_spacing)`
    /// in millimetres.
    pub fn pixel_spacing(&self) -> Option<(f64, f64)> {
        let values = self
            .element(tags::PIXEL_SPACING)?
            .to_multi_f64(self.endianness())?;
        match values.as_slice() {
            [row, column, ..] => Some((*row, *column)),
            _ => None,
        }
    }

    /// The presentation window, when the file declares one.
    /// Multi-valued windows yield their first entry.
    pub fn window_settings(&self) -> Option<WindowSettings> {
        let center = *self
            .element(tags::WINDOW_CENTER)?
            .to_multi_f64(self.endianness())?
            .first()?;
        let width = *self
            .element(tags::WINDOW_WIDTH)?
            .to_multi_f64(self.endianness())?
            .first()?;
        Some(WindowSettings { center, width })
    }

    /// The linear rescale of stored values,
    /// defaulting to the identity transform.
    pub fn rescale(&self) -> Rescale {
        Rescale {
            intercept: self.float(tags::RESCALE_INTERCEPT).unwrap_or(0.0),
            slope: self.float(tags::RESCALE_SLOPE).unwrap_or(1.0),
        }
    }

    /// Whether the pixel data is stored in a compressed transfer syntax.
    pub fn is_compressed(&self) -> bool {
        !self.parsed.transfer_syntax.is_native()
    }

    /// The number of frames, defaulting to 1.
    pub fn number_of_frames(&self) -> u32 {
        self.int(tags::NUMBER_OF_FRAMES)
            .filter(|&n| n > 0)
            .unwrap_or(1) as u32
    }

    /// The photometric interpretation, when declared.
    pub fn photometric_interpretation(&self) -> Option<PhotometricInterpretation> {
        self.element(tags::PHOTOMETRIC_INTERPRETATION)?
            .to_text()?
            .parse()
            .ok()
    }

    /// Whether stored samples are signed, defaulting to unsigned.
    pub fn pixel_representation(&self) -> PixelRepresentation {
        PixelRepresentation::from_value(self.int(tags::PIXEL_REPRESENTATION).unwrap_or(0))
    }

    /// The SamplesPerPixel attribute, defaulting to 1.
    pub fn samples_per_pixel(&self) -> u16 {
        self.int(tags::SAMPLES_PER_PIXEL).unwrap_or(1) as u16
    }

    /// The BitsAllocated attribute, when declared.
    pub fn bits_allocated(&self) -> Option<u16> {
        self.int(tags::BITS_ALLOCATED).map(|v| v as u16)
    }

    /// The BitsStored attribute, falling back to BitsAllocated.
    pub fn bits_stored(&self) -> Option<u16> {
        self.int(tags::BITS_STORED)
            .map(|v| v as u16)
            .or_else(|| self.bits_allocated())
    }

    /// Check the parsed file for soft issues.
    ///
    /// Unlike parsing, validation never fails:
    /// problems such as missing recommended attributes or
    /// inconsistent pixel metadata are reported as issue strings.
    pub fn validate(&self) -> ValidationStatus {
        validation::run(self)
    }
}
