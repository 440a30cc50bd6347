//! Descriptors for the transfer syntaxes this library can read.
//!
//! A transfer syntax determines the byte order of binary values,
//! whether element headers carry an explicit value representation,
//! and how pixel data is compressed.
//! The set supported here is closed;
//! files declaring any other transfer syntax UID are rejected
//! when the file meta group is parsed.

use crate::uids;

pub use byteordered::Endianness;

/// The pixel data coding of a transfer syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Native (uncompressed) pixel data.
    None,
    /// JPEG Lossless, Non-Hierarchical (ITU-T T.81 Process 14),
    /// decoded by the built-in codec.
    JpegLossless,
    /// JPEG Baseline (Process 1), decoded by an external codec.
    JpegBaseline,
    /// JPEG 2000, decoded by an external codec.
    Jpeg2000,
}

/// A DICOM transfer syntax specifier.
#[derive(Debug, PartialEq)]
pub struct TransferSyntax {
    /// The unique identifier of the transfer syntax.
    uid: &'static str,
    /// The full name of the transfer syntax.
    name: &'static str,
    /// The byte order of binary values.
    byte_order: Endianness,
    /// Whether element headers carry an explicit value representation.
    explicit_vr: bool,
    /// The pixel data coding.
    codec: Codec,
}

impl TransferSyntax {
    const fn new(
        uid: &'static str,
        name: &'static str,
        byte_order: Endianness,
        explicit_vr: bool,
        codec: Codec,
    ) -> Self {
        TransferSyntax {
            uid,
            name,
            byte_order,
            explicit_vr,
            codec,
        }
    }

    /// The transfer syntax UID.
    pub fn uid(&self) -> &'static str {
        self.uid
    }

    /// The transfer syntax name, as in the standard's registry.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The byte order of binary values in the main data set.
    pub fn byte_order(&self) -> Endianness {
        self.byte_order
    }

    /// Whether element headers carry an explicit value representation.
    pub fn explicit_vr(&self) -> bool {
        self.explicit_vr
    }

    /// The pixel data coding.
    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Whether pixel data is stored natively (not encapsulated).
    pub fn is_native(&self) -> bool {
        self.codec == Codec::None
    }
}

/// Implicit VR Little Endian: the default transfer syntax.
pub const IMPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::new(
    uids::IMPLICIT_VR_LITTLE_ENDIAN,
    "Implicit VR Little Endian",
    Endianness::Little,
    false,
    Codec::None,
);

/// Explicit VR Little Endian.
pub const EXPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::new(
    uids::EXPLICIT_VR_LITTLE_ENDIAN,
    "Explicit VR Little Endian",
    Endianness::Little,
    true,
    Codec::None,
);

/// Explicit VR Big Endian (retired, but still found in archives).
pub const EXPLICIT_VR_BIG_ENDIAN: TransferSyntax = TransferSyntax::new(
    uids::EXPLICIT_VR_BIG_ENDIAN,
    "Explicit VR Big Endian",
    Endianness::Big,
    true,
    Codec::None,
);

/// JPEG Lossless, Non-Hierarchical (Process 14).
pub const JPEG_LOSSLESS: TransferSyntax = TransferSyntax::new(
    uids::JPEG_LOSSLESS,
    "JPEG Lossless, Non-Hierarchical (Process 14)",
    Endianness::Little,
    true,
    Codec::JpegLossless,
);

/// JPEG Lossless, Non-Hierarchical, First-Order Prediction
/// (Process 14, Selection Value 1).
pub const JPEG_LOSSLESS_SV1: TransferSyntax = TransferSyntax::new(
    uids::JPEG_LOSSLESS_SV1,
    "JPEG Lossless, Non-Hierarchical, First-Order Prediction",
    Endianness::Little,
    true,
    Codec::JpegLossless,
);

/// JPEG Baseline (Process 1).
pub const JPEG_BASELINE: TransferSyntax = TransferSyntax::new(
    uids::JPEG_BASELINE,
    "JPEG Baseline (Process 1)",
    Endianness::Little,
    true,
    Codec::JpegBaseline,
);

/// JPEG 2000 Image Compression (Lossless Only).
pub const JPEG_2000_LOSSLESS: TransferSyntax = TransferSyntax::new(
    uids::JPEG_2000_LOSSLESS,
    "JPEG 2000 Image Compression (Lossless Only)",
    Endianness::Little,
    true,
    Codec::Jpeg2000,
);

/// JPEG 2000 Image Compression.
pub const JPEG_2000: TransferSyntax = TransferSyntax::new(
    uids::JPEG_2000,
    "JPEG 2000 Image Compression",
    Endianness::Little,
    true,
    Codec::Jpeg2000,
);

static REGISTRY: [&TransferSyntax; 8] = [
    &IMPLICIT_VR_LITTLE_ENDIAN,
    &EXPLICIT_VR_LITTLE_ENDIAN,
    &EXPLICIT_VR_BIG_ENDIAN,
    &JPEG_LOSSLESS,
    &JPEG_LOSSLESS_SV1,
    &JPEG_BASELINE,
    &JPEG_2000_LOSSLESS,
    &JPEG_2000,
];

/// Retrieve the transfer syntax identified by the given UID,
/// tolerating trailing padding in the UID string.
/// Returns `None` for any UID outside the supported set.
pub fn from_uid(uid: &str) -> Option<&'static TransferSyntax> {
    let uid = uid.trim_end_matches(|c: char| c.is_whitespace() || c == '\0');
    REGISTRY.iter().find(|ts| ts.uid == uid).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_uid() {
        let ts = from_uid("1.2.840.10008.1.2.1").unwrap();
        assert_eq!(ts.name(), "Explicit VR Little Endian");
        assert!(ts.explicit_vr());
        assert_eq!(ts.byte_order(), Endianness::Little);
        assert!(ts.is_native());

        let ts = from_uid("1.2.840.10008.1.2\0").unwrap();
        assert!(!ts.explicit_vr());

        let ts = from_uid("1.2.840.10008.1.2.2").unwrap();
        assert_eq!(ts.byte_order(), Endianness::Big);

        let ts = from_uid("1.2.840.10008.1.2.4.70").unwrap();
        assert_eq!(ts.codec(), Codec::JpegLossless);

        assert!(from_uid("1.2.840.10008.1.2.4.100").is_none());
        assert!(from_uid("1.2.840.10008.1.2.5").is_none());
    }
}
