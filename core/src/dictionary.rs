//! The standard attribute dictionary.
//!
//! The dictionary maps an attribute tag to its canonical value
//! representation and alias.
//! It is consulted when parsing data sets in implicit VR transfer syntaxes,
//! where element headers do not name their VR,
//! and when rendering attribute names in validation reports.
//!
//! Besides plain entries, the table holds repeating attributes:
//! elements of the form `(ggxx,eeee)` (such as the overlay groups
//! and the retired variable pixel data groups)
//! and of the form `(gggg,eexx)`,
//! which are indexed with the `xx` portion zeroed
//! and matched by trimming the looked-up tag the same way.
//!
//! The index is built once on first use from the embedded table
//! and is never torn down.

use crate::header::{Tag, VR};
use crate::tags;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// A single record of the attribute dictionary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DictionaryEntry {
    /// the attribute tag; for repeating attributes,
    /// the repeating portion is zeroed
    pub tag: Tag,
    /// the canonical value representation
    pub vr: VR,
    /// the attribute keyword, as in the standard's registry
    pub alias: &'static str,
}

const fn entry(tag: Tag, vr: VR, alias: &'static str) -> DictionaryEntry {
    DictionaryEntry { tag, vr, alias }
}

/// The embedded dictionary table.
///
/// This covers the attributes which the reader resolves by name,
/// their common companions in general image modules,
/// and the file meta group.
static ENTRIES: &[DictionaryEntry] = &[
    entry(tags::FILE_META_INFORMATION_GROUP_LENGTH, VR::UL, "FileMetaInformationGroupLength"),
    entry(tags::FILE_META_INFORMATION_VERSION, VR::OB, "FileMetaInformationVersion"),
    entry(tags::MEDIA_STORAGE_SOP_CLASS_UID, VR::UI, "MediaStorageSOPClassUID"),
    entry(tags::MEDIA_STORAGE_SOP_INSTANCE_UID, VR::UI, "MediaStorageSOPInstanceUID"),
    entry(tags::TRANSFER_SYNTAX_UID, VR::UI, "TransferSyntaxUID"),
    entry(tags::IMPLEMENTATION_CLASS_UID, VR::UI, "ImplementationClassUID"),
    entry(tags::IMPLEMENTATION_VERSION_NAME, VR::SH, "ImplementationVersionName"),
    entry(tags::SOURCE_APPLICATION_ENTITY_TITLE, VR::AE, "SourceApplicationEntityTitle"),
    entry(tags::SPECIFIC_CHARACTER_SET, VR::CS, "SpecificCharacterSet"),
    entry(tags::IMAGE_TYPE, VR::CS, "ImageType"),
    entry(tags::SOP_CLASS_UID, VR::UI, "SOPClassUID"),
    entry(tags::SOP_INSTANCE_UID, VR::UI, "SOPInstanceUID"),
    entry(tags::STUDY_DATE, VR::DA, "StudyDate"),
    entry(tags::STUDY_TIME, VR::TM, "StudyTime"),
    entry(tags::ACCESSION_NUMBER, VR::SH, "AccessionNumber"),
    entry(tags::MODALITY, VR::CS, "Modality"),
    entry(tags::MANUFACTURER, VR::LO, "Manufacturer"),
    entry(tags::INSTITUTION_NAME, VR::LO, "InstitutionName"),
    entry(tags::REFERRING_PHYSICIAN_NAME, VR::PN, "ReferringPhysicianName"),
    entry(tags::STUDY_DESCRIPTION, VR::LO, "StudyDescription"),
    entry(tags::SERIES_DESCRIPTION, VR::LO, "SeriesDescription"),
    entry(tags::REFERENCED_IMAGE_SEQUENCE, VR::SQ, "ReferencedImageSequence"),
    entry(tags::SOURCE_IMAGE_SEQUENCE, VR::SQ, "SourceImageSequence"),
    entry(tags::PATIENT_NAME, VR::PN, "PatientName"),
    entry(tags::PATIENT_ID, VR::LO, "PatientID"),
    entry(tags::PATIENT_BIRTH_DATE, VR::DA, "PatientBirthDate"),
    entry(tags::PATIENT_SEX, VR::CS, "PatientSex"),
    entry(tags::SLICE_THICKNESS, VR::DS, "SliceThickness"),
    entry(tags::KVP, VR::DS, "KVP"),
    entry(tags::STUDY_INSTANCE_UID, VR::UI, "StudyInstanceUID"),
    entry(tags::SERIES_INSTANCE_UID, VR::UI, "SeriesInstanceUID"),
    entry(tags::STUDY_ID, VR::SH, "StudyID"),
    entry(tags::SERIES_NUMBER, VR::IS, "SeriesNumber"),
    entry(tags::INSTANCE_NUMBER, VR::IS, "InstanceNumber"),
    entry(tags::IMAGE_POSITION_PATIENT, VR::DS, "ImagePositionPatient"),
    entry(tags::IMAGE_ORIENTATION_PATIENT, VR::DS, "ImageOrientationPatient"),
    entry(tags::SLICE_LOCATION, VR::DS, "SliceLocation"),
    entry(tags::SAMPLES_PER_PIXEL, VR::US, "SamplesPerPixel"),
    entry(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "PhotometricInterpretation"),
    entry(tags::PLANAR_CONFIGURATION, VR::US, "PlanarConfiguration"),
    entry(tags::NUMBER_OF_FRAMES, VR::IS, "NumberOfFrames"),
    entry(tags::ROWS, VR::US, "Rows"),
    entry(tags::COLUMNS, VR::US, "Columns"),
    entry(tags::PIXEL_SPACING, VR::DS, "PixelSpacing"),
    entry(tags::BITS_ALLOCATED, VR::US, "BitsAllocated"),
    entry(tags::BITS_STORED, VR::US, "BitsStored"),
    entry(tags::HIGH_BIT, VR::US, "HighBit"),
    entry(tags::PIXEL_REPRESENTATION, VR::US, "PixelRepresentation"),
    entry(tags::WINDOW_CENTER, VR::DS, "WindowCenter"),
    entry(tags::WINDOW_WIDTH, VR::DS, "WindowWidth"),
    entry(tags::RESCALE_INTERCEPT, VR::DS, "RescaleIntercept"),
    entry(tags::RESCALE_SLOPE, VR::DS, "RescaleSlope"),
    entry(tags::RESCALE_TYPE, VR::LO, "RescaleType"),
    entry(tags::PIXEL_DATA, VR::OW, "PixelData"),
];

/// Repeating attributes of the form `(ggxx,eeee)`,
/// indexed with the `xx` portion of the group zeroed:
/// the overlay groups `6000-60FF`
/// and the retired variable pixel data groups `7F00-7FFF`.
static GROUP_REPEATING_ENTRIES: &[DictionaryEntry] = &[
    entry(tags::OVERLAY_ROWS, VR::US, "OverlayRows"),
    entry(tags::OVERLAY_COLUMNS, VR::US, "OverlayColumns"),
    entry(tags::OVERLAY_TYPE, VR::CS, "OverlayType"),
    entry(tags::OVERLAY_ORIGIN, VR::SS, "OverlayOrigin"),
    entry(tags::OVERLAY_BITS_ALLOCATED, VR::US, "OverlayBitsAllocated"),
    entry(tags::OVERLAY_BIT_POSITION, VR::US, "OverlayBitPosition"),
    entry(tags::OVERLAY_DATA, VR::OW, "OverlayData"),
    entry(tags::VARIABLE_PIXEL_DATA, VR::OW, "VariablePixelData"),
];

/// Repeating attributes of the form `(gggg,eexx)`,
/// indexed with the `xx` portion of the element zeroed.
static ELEMENT_REPEATING_ENTRIES: &[DictionaryEntry] = &[
    entry(tags::SOURCE_IMAGE_IDS, VR::CS, "SourceImageIDs"),
];

#[derive(Debug)]
struct Registry {
    /// mapping: tag → entry, with repeating tags zeroed
    by_tag: HashMap<Tag, &'static DictionaryEntry>,
    /// repeating tags of the form (ggxx,eeee), with the `xx` zeroed
    repeating_ggxx: HashSet<Tag>,
    /// repeating tags of the form (gggg,eexx), with the `xx` zeroed
    repeating_eexx: HashSet<Tag>,
}

static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut registry = Registry {
        by_tag: HashMap::with_capacity(
            ENTRIES.len() + GROUP_REPEATING_ENTRIES.len() + ELEMENT_REPEATING_ENTRIES.len(),
        ),
        repeating_ggxx: HashSet::with_capacity(GROUP_REPEATING_ENTRIES.len()),
        repeating_eexx: HashSet::with_capacity(ELEMENT_REPEATING_ENTRIES.len()),
    };
    for e in ENTRIES {
        registry.by_tag.insert(e.tag, e);
    }
    for e in GROUP_REPEATING_ENTRIES {
        registry.by_tag.insert(e.tag, e);
        registry.repeating_ggxx.insert(e.tag);
    }
    for e in ELEMENT_REPEATING_ENTRIES {
        registry.by_tag.insert(e.tag, e);
        registry.repeating_eexx.insert(e.tag);
    }
    registry
});

/// The process-wide attribute dictionary.
///
/// This is a unit type fronting a lazily initialised, immutable registry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TagDictionary;

impl TagDictionary {
    /// Retrieve the dictionary record for the given tag, if known.
    ///
    /// Exact entries win over repeating ones,
    /// so `(7FE0,0010)` resolves to PixelData
    /// even though it sits inside the variable pixel data group range.
    pub fn entry(tag: Tag) -> Option<&'static DictionaryEntry> {
        let registry = &*REGISTRY;
        registry.by_tag.get(&tag).copied().or_else(|| {
            // check tags repeating in different groups
            let group_trimmed = Tag(tag.0 & 0xFF00, tag.1);
            if registry.repeating_ggxx.contains(&group_trimmed) {
                return registry.by_tag.get(&group_trimmed).copied();
            }
            // check tags repeating in different elements
            let elem_trimmed = Tag(tag.0, tag.1 & 0xFF00);
            if registry.repeating_eexx.contains(&elem_trimmed) {
                return registry.by_tag.get(&elem_trimmed).copied();
            }
            None
        })
    }

    /// Retrieve the canonical value representation of the given tag,
    /// as used when parsing implicit VR data sets.
    ///
    /// Group length elements resolve to UL regardless of group;
    /// unknown tags resolve to UN.
    pub fn vr_of(tag: Tag) -> VR {
        if let Some(e) = Self::entry(tag) {
            return e.vr;
        }
        if tag.is_group_length() {
            return VR::UL;
        }
        VR::UN
    }

    /// Retrieve the keyword of the given tag, if known.
    pub fn alias_of(tag: Tag) -> Option<&'static str> {
        Self::entry(tag).map(|e| e.alias)
    }
}
