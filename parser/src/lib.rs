//! Parsing of DICOM files and data sets.
//!
//! The crate is organised in layers, leaves first:
//!
//! - [`source`] abstracts random access byte input:
//!   an owned buffer or a read-only memory map of a file,
//!   both behind the same zero-copy [`slice`](source::ByteSource::slice)
//!   contract.
//! - [`reader`] provides endian-aware, bounds-checked reads of
//!   primitive values over a byte source at an explicit cursor.
//! - [`dataset`] parses data elements one at a time,
//!   descending into sequences and items with an explicit depth counter
//!   and enforcing length sanity against the enclosing container.
//! - [`meta`] reads the file preamble and the file meta group.
//! - [`file`] drives a whole-file parse up to the pixel data element,
//!   whose body is never materialised:
//!   only its offset and length are recorded.
//!
//! Parsing is strict: a file which violates the encoding rules or the
//! configured limits yields an error instead of a partial result.
//! Softer concerns, such as missing recommended attributes,
//! are left to the validation layer in `dicomite-object`.

pub mod dataset;
pub mod file;
pub mod meta;
pub mod reader;
pub mod source;

pub use dataset::ParseOptions;
pub use file::{ParsedFile, PixelDataInfo};
pub use meta::FileMetaTable;
pub use source::ByteSource;
