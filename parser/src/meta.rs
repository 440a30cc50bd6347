//! Reading of the DICOM file preamble and file meta group.
//!
//! The file meta group (group `0002`) is always encoded in
//! Explicit VR Little Endian, regardless of the transfer syntax
//! of the main data set which it announces.

use crate::dataset::{DataSetParser, ParseOptions};
use dicomite_core::{tags, transfer_syntax, DataElement, Endianness, Header, Tag};
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};

const DICM_MAGIC_CODE: [u8; 4] = [b'D', b'I', b'C', b'M'];
const PREAMBLE_LENGTH: usize = 128;

/// An error from reading the file meta group.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The preamble is not followed by the `DICM` magic code.
    #[snafu(display("Invalid DICOM file (magic code check failed)"))]
    NotDicom { backtrace: Backtrace },

    /// A data element of the meta group could not be parsed.
    #[snafu(display("Could not parse file meta group"))]
    ParseMetaGroup {
        #[snafu(backtrace)]
        source: crate::dataset::Error,
    },

    /// The first element of the meta group must be
    /// the group length `(0002,0000)`.
    #[snafu(display("Unexpected data element {} in file meta group", tag))]
    UnexpectedTag { tag: Tag, backtrace: Backtrace },

    /// The mandatory transfer syntax UID element is missing.
    #[snafu(display("Missing transfer syntax UID in file meta group"))]
    MissingTransferSyntax { backtrace: Backtrace },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The relevant parts of the DICOM file meta information table.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetaTable {
    /// File Meta Information Group Length
    pub information_group_length: u32,
    /// File Meta Information Version
    pub information_version: Option<[u8; 2]>,
    /// Media Storage SOP Class UID
    pub media_storage_sop_class_uid: Option<String>,
    /// Media Storage SOP Instance UID
    pub media_storage_sop_instance_uid: Option<String>,
    /// Transfer Syntax UID
    pub transfer_syntax: String,
    /// Implementation Class UID
    pub implementation_class_uid: Option<String>,
    /// Implementation Version Name
    pub implementation_version_name: Option<String>,
    /// Source Application Entity Title
    pub source_application_entity_title: Option<String>,
}

fn trim_uid(uid: &str) -> &str {
    uid.trim_end_matches(|c: char| c.is_whitespace() || c == '\0')
}

impl FileMetaTable {
    /// A placeholder table for headerless files
    /// parsed in the forgiving mode:
    /// the main data set is assumed to be Implicit VR Little Endian.
    pub fn implicit_fallback() -> Self {
        FileMetaTable {
            information_group_length: 0,
            information_version: None,
            media_storage_sop_class_uid: None,
            media_storage_sop_instance_uid: None,
            transfer_syntax: transfer_syntax::IMPLICIT_VR_LITTLE_ENDIAN.uid().to_owned(),
            implementation_class_uid: None,
            implementation_version_name: None,
            source_application_entity_title: None,
        }
    }

    /// Getter for the transfer syntax UID,
    /// with trailing padding already excluded.
    pub fn transfer_syntax(&self) -> &str {
        trim_uid(&self.transfer_syntax)
    }

    /// Getter for the media storage SOP instance UID,
    /// with trailing padding already excluded.
    pub fn media_storage_sop_instance_uid(&self) -> Option<&str> {
        self.media_storage_sop_instance_uid.as_deref().map(trim_uid)
    }

    /// Check for the `DICM` magic code after the 128-byte preamble.
    pub fn check_magic_code(data: &[u8]) -> bool {
        data.len() >= PREAMBLE_LENGTH + 4
            && data[PREAMBLE_LENGTH..PREAMBLE_LENGTH + 4] == DICM_MAGIC_CODE
    }

    /// Read the file meta group from the start of a DICOM file.
    ///
    /// When the group length element `(0002,0000)` is present,
    /// it bounds the rest of the group;
    /// when absent, elements are read until the first tag
    /// outside group `0002`.
    ///
    /// On success, returns the table and the offset
    /// at which the main data set starts.
    pub fn read_from(data: &[u8]) -> Result<(Self, usize)> {
        ensure!(Self::check_magic_code(data), NotDicomSnafu);

        let mut parser = DataSetParser::new(
            data,
            &transfer_syntax::EXPLICIT_VR_LITTLE_ENDIAN,
            ParseOptions::default(),
        );
        parser
            .seek_to(PREAMBLE_LENGTH + 4)
            .context(ParseMetaGroupSnafu)?;

        let mut table = FileMetaTable {
            information_group_length: 0,
            information_version: None,
            media_storage_sop_class_uid: None,
            media_storage_sop_instance_uid: None,
            transfer_syntax: String::new(),
            implementation_class_uid: None,
            implementation_version_name: None,
            source_application_entity_title: None,
        };

        // known end of the group, once a group length element is seen
        let mut end: Option<usize> = None;

        loop {
            let position = parser.position();
            match end {
                Some(end) => {
                    if position >= end {
                        break;
                    }
                }
                None => {
                    // without a group length, the group ends at the first
                    // element of another group
                    if position + 2 > data.len() {
                        break;
                    }
                    let group = u16::from_le_bytes([data[position], data[position + 1]]);
                    if group != 0x0002 {
                        break;
                    }
                }
            }

            let element = parser.read_element().context(ParseMetaGroupSnafu)?;
            let tag = element.tag();
            ensure!(tag.group() == 0x0002, UnexpectedTagSnafu { tag });
            match tag {
                tags::FILE_META_INFORMATION_GROUP_LENGTH => {
                    let length = element.to_i64(Endianness::Little).context(
                        UnexpectedTagSnafu {
                            tag: tags::FILE_META_INFORMATION_GROUP_LENGTH,
                        },
                    )? as u32;
                    table.information_group_length = length;
                    end = Some(parser.position() + length as usize);
                }
                tags::FILE_META_INFORMATION_VERSION => {
                    if let Some(bytes) = element.bytes() {
                        if bytes.len() >= 2 {
                            table.information_version = Some([bytes[0], bytes[1]]);
                        }
                    }
                }
                tags::MEDIA_STORAGE_SOP_CLASS_UID => {
                    table.media_storage_sop_class_uid = text_of(&element);
                }
                tags::MEDIA_STORAGE_SOP_INSTANCE_UID => {
                    table.media_storage_sop_instance_uid = text_of(&element);
                }
                tags::TRANSFER_SYNTAX_UID => {
                    table.transfer_syntax = text_of(&element).unwrap_or_default();
                }
                tags::IMPLEMENTATION_CLASS_UID => {
                    table.implementation_class_uid = text_of(&element);
                }
                tags::IMPLEMENTATION_VERSION_NAME => {
                    table.implementation_version_name = text_of(&element);
                }
                tags::SOURCE_APPLICATION_ENTITY_TITLE => {
                    table.source_application_entity_title = text_of(&element);
                }
                // other meta elements are legal, just not retained
                _ => {}
            }
        }

        ensure!(!table.transfer_syntax.is_empty(), MissingTransferSyntaxSnafu);

        Ok((table, parser.position()))
    }
}

fn text_of(element: &DataElement) -> Option<String> {
    element.to_text().map(|s| s.into_owned())
}
