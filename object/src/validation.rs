//! Soft validation of parsed files.
//!
//! Validation runs after a successful parse and reports issues
//! which do not prevent reading the file:
//! missing recommended attributes, inconsistent pixel metadata,
//! or a pixel data length which does not match the declared geometry.

use crate::Decoder;
use dicomite_core::dictionary::TagDictionary;
use dicomite_core::{tags, Tag};
use tracing::debug;

/// The outcome of validating a parsed file.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationStatus {
    /// Whether no issues were found.
    pub is_valid: bool,
    /// Image width (columns), zero when not declared.
    pub width: u32,
    /// Image height (rows), zero when not declared.
    pub height: u32,
    /// Whether the file contains a pixel data element.
    pub has_pixels: bool,
    /// Whether the pixel data is stored compressed.
    pub is_compressed: bool,
    /// Human readable descriptions of every issue found.
    pub issues: Vec<String>,
}

/// Attributes which any image object is expected to carry.
const RECOMMENDED: [Tag; 5] = [
    tags::PATIENT_ID,
    tags::STUDY_INSTANCE_UID,
    tags::SERIES_INSTANCE_UID,
    tags::SOP_INSTANCE_UID,
    tags::MODALITY,
];

pub(crate) fn run(decoder: &Decoder) -> ValidationStatus {
    let mut issues = Vec::new();

    for tag in RECOMMENDED {
        if decoder.element(tag).is_none() {
            let name = TagDictionary::alias_of(tag).unwrap_or("attribute");
            issues.push(format!("Missing recommended attribute {} {}", tag, name));
        }
    }

    let (columns, rows) = decoder.dimensions().unwrap_or((0, 0));
    let has_pixels = decoder.parsed().pixel_data().is_some();

    if has_pixels {
        check_pixel_metadata(decoder, rows, columns, &mut issues);
    }

    for issue in &issues {
        debug!("validation issue: {}", issue);
    }

    ValidationStatus {
        is_valid: issues.is_empty(),
        width: columns,
        height: rows,
        has_pixels,
        is_compressed: decoder.is_compressed(),
        issues,
    }
}

fn check_pixel_metadata(decoder: &Decoder, rows: u32, columns: u32, issues: &mut Vec<String>) {
    if rows == 0 || columns == 0 {
        issues.push("Pixel data present but Rows or Columns missing".into());
        return;
    }

    let samples = u64::from(decoder.samples_per_pixel());
    if samples != 1 && samples != 3 {
        issues.push(format!("Unusual SamplesPerPixel {}", samples));
    }

    let bits_allocated = decoder.bits_allocated().unwrap_or(0);
    let bits_stored = decoder.bits_stored().unwrap_or(0);
    match bits_allocated {
        0 => issues.push("Missing BitsAllocated".into()),
        8 | 16 => {
            if bits_stored > bits_allocated {
                issues.push(format!(
                    "BitsStored {} exceeds BitsAllocated {}",
                    bits_stored, bits_allocated
                ));
            }
        }
        other => issues.push(format!("Unusual BitsAllocated {}", other)),
    }

    if samples == 3 {
        if bits_allocated != 8 {
            issues.push(format!(
                "Color image with BitsAllocated {} instead of 8",
                bits_allocated
            ));
        }
        if decoder.pixel_representation() == dicomite_core::PixelRepresentation::Signed {
            issues.push("Color image with signed pixel representation".into());
        }
    }

    if decoder.photometric_interpretation().is_none() {
        issues.push("Missing PhotometricInterpretation".into());
    }

    // for native pixel data the byte length is fully determined
    // by the declared geometry
    if let Some(info) = decoder.parsed().pixel_data() {
        if let Some(declared) = info.length.get() {
            if bits_allocated > 0 && !decoder.is_compressed() {
                let expected = u64::from(rows)
                    * u64::from(columns)
                    * samples
                    * u64::from(bits_allocated / 8)
                    * u64::from(decoder.number_of_frames());
                if expected != u64::from(declared) {
                    issues.push(format!(
                        "Pixel data length {} does not match geometry ({} expected)",
                        declared, expected
                    ));
                }
            }
        }
    }
}
