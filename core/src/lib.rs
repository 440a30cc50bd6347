//! Core data types for reading DICOM content.
//!
//! This crate hosts the vocabulary shared by the rest of the
//! `dicomite` workspace:
//! attribute tags ([`Tag`]), value representations ([`VR`]),
//! element headers and lengths ([`DataElementHeader`], [`Length`]),
//! parsed data elements with lazily interpreted values ([`DataElement`]),
//! the standard attribute dictionary ([`dictionary::TagDictionary`]),
//! and the table of supported transfer syntaxes
//! ([`transfer_syntax::from_uid`]).
//!
//! Reading files is done through the `dicomite-object` crate,
//! which builds on the parser in `dicomite-parser`.
pub mod attribute;
pub mod dictionary;
pub mod header;
pub mod tags;
pub mod transfer_syntax;
pub mod uids;
pub mod value;

pub use attribute::{PhotometricInterpretation, PixelRepresentation};
pub use header::{DataElementHeader, Header, Length, SequenceItemHeader, Tag, VR};
pub use transfer_syntax::{Codec, Endianness, TransferSyntax};
pub use value::{DataElement, DataValue, Item};
