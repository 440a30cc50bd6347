//! Typed forms of the image pixel description attributes.

use std::fmt;
use std::str::FromStr;

/// The photometric interpretation of decoded pixel samples.
///
/// Parsed from the `(0028,0004)` attribute with padding trimmed.
/// Values outside the well known set are preserved in [`Other`](Self::Other).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotometricInterpretation {
    /// Single sample per pixel, minimum value is white.
    Monochrome1,
    /// Single sample per pixel, minimum value is black.
    Monochrome2,
    /// Single sample per pixel, indexing a color palette.
    PaletteColor,
    /// Three samples per pixel: red, green, blue.
    Rgb,
    /// Three samples per pixel: luminance and two chrominances, fully sampled.
    YbrFull,
    /// YBR with 4:2:2 chrominance subsampling.
    YbrFull422,
    /// YBR with 4:2:0 chrominance subsampling.
    YbrPartial420,
    /// YBR with irreversible color transformation (JPEG 2000).
    YbrIct,
    /// YBR with reversible color transformation (JPEG 2000).
    YbrRct,
    /// Any other photometric interpretation.
    Other(String),
}

impl PhotometricInterpretation {
    /// Check whether this is one of the monochrome interpretations.
    pub fn is_monochrome(&self) -> bool {
        matches!(
            self,
            PhotometricInterpretation::Monochrome1 | PhotometricInterpretation::Monochrome2
        )
    }

    /// The attribute value as written in the data set.
    pub fn as_str(&self) -> &str {
        use PhotometricInterpretation::*;
        match self {
            Monochrome1 => "MONOCHROME1",
            Monochrome2 => "MONOCHROME2",
            PaletteColor => "PALETTE COLOR",
            Rgb => "RGB",
            YbrFull => "YBR_FULL",
            YbrFull422 => "YBR_FULL_422",
            YbrPartial420 => "YBR_PARTIAL_420",
            YbrIct => "YBR_ICT",
            YbrRct => "YBR_RCT",
            Other(s) => s,
        }
    }
}

impl FromStr for PhotometricInterpretation {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use PhotometricInterpretation::*;
        Ok(match s.trim_end_matches(|c: char| c.is_whitespace() || c == '\0') {
            "MONOCHROME1" => Monochrome1,
            "MONOCHROME2" => Monochrome2,
            "PALETTE COLOR" => PaletteColor,
            "RGB" => Rgb,
            "YBR_FULL" => YbrFull,
            "YBR_FULL_422" => YbrFull422,
            "YBR_PARTIAL_420" => YbrPartial420,
            "YBR_ICT" => YbrIct,
            "YBR_RCT" => YbrRct,
            other => Other(other.to_owned()),
        })
    }
}

impl fmt::Display for PhotometricInterpretation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether stored pixel samples are unsigned or signed (two's complement),
/// as declared by the `(0028,0103)` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelRepresentation {
    /// Unsigned samples.
    Unsigned = 0,
    /// Signed samples in two's complement.
    Signed = 1,
}

impl PixelRepresentation {
    /// Interpret the attribute's integer value.
    /// Any non-zero value is taken as signed.
    pub fn from_value(value: i64) -> Self {
        if value == 0 {
            PixelRepresentation::Unsigned
        } else {
            PixelRepresentation::Signed
        }
    }
}
