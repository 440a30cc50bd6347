//! Sample conversions: widened samples to the caller's typed shape,
//! with the MONOCHROME1 inversion applied on the way.

use crate::ImageInfo;
use num_traits::NumCast;

/// Narrow widened samples to `u8`,
/// inverting MONOCHROME1 values over the stored-bits range.
pub(crate) fn to_u8(samples: Vec<u16>, info: &ImageInfo) -> Vec<u8> {
    let max = info.max_stored_value();
    let invert = info.needs_inversion();
    samples
        .into_iter()
        .map(|s| {
            let value = if invert { max.saturating_sub(s) } else { s };
            NumCast::from(value).unwrap_or(u8::MAX)
        })
        .collect()
}

/// Pass widened samples through as `u16`,
/// inverting MONOCHROME1 values over the stored-bits range.
pub(crate) fn to_u16(samples: Vec<u16>, info: &ImageInfo) -> Vec<u16> {
    if !info.needs_inversion() {
        return samples;
    }
    let max = info.max_stored_value();
    samples.into_iter().map(|s| max.saturating_sub(s)).collect()
}

/// Reinterpret widened samples as signed two's complement values,
/// sign-extending from the stored bit depth,
/// and inverting MONOCHROME1 values over the signed range.
pub(crate) fn to_i16(samples: Vec<u16>, info: &ImageInfo) -> Vec<i16> {
    let shift = 16 - info.bits_stored.min(16);
    let invert = info.needs_inversion();
    samples
        .into_iter()
        .map(|s| {
            let value = ((s << shift) as i16) >> shift;
            // for signed data the inversion over the stored range
            // degenerates to a reflection around -1/2
            if invert {
                -1 - value
            } else {
                value
            }
        })
        .collect()
}
