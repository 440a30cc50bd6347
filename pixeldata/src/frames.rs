//! Access to the stored pixel samples, frame by frame.
//!
//! Native pixel data is served directly from the byte source,
//! widened to `u16` in host byte order.
//! Encapsulated pixel data is assembled from its fragments
//! (frames located through the basic offset table)
//! and routed through the built-in JPEG Lossless decoder
//! or a bound [`ExternalDecoder`].

use crate::{
    codec_name, CorruptCompressedStreamSnafu, Error, FrameMismatchSnafu, ImageInfo,
    LengthMismatchSnafu, MissingOffsetTableSnafu, NoExternalCodecSnafu, NoPixelDataSnafu,
    OffsetTableMismatchSnafu, ReadPixelBytesSnafu, Result,
};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use dicomite_core::{Codec, Endianness};
use dicomite_jpeg::LosslessDecoder;
use dicomite_object::Decoder;
use dicomite_parser::dataset::PixelFragments;
use dicomite_parser::file::PixelDataInfo;
use snafu::{ensure, OptionExt, ResultExt};
use tracing::warn;

/// A codec callback for the transfer syntaxes
/// this library recognises but does not decode natively.
///
/// Implementations receive one complete compressed frame
/// (its fragments already concatenated)
/// and append the decoded native samples to `dst`
/// as little-endian bytes matching the image attributes.
pub trait ExternalDecoder: Send + Sync {
    fn decode_frame(
        &self,
        info: &ImageInfo,
        codec: Codec,
        data: &[u8],
        dst: &mut Vec<u8>,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

fn pixel_data_info(decoder: &Decoder) -> Result<&PixelDataInfo> {
    decoder.parsed().pixel_data().context(NoPixelDataSnafu)
}

/// Widen raw sample bytes to `u16` in host order.
fn widen(bytes: &[u8], bytes_per_sample: u64, endianness: Endianness) -> Vec<u16> {
    if bytes_per_sample == 2 {
        let mut out = vec![0u16; bytes.len() / 2];
        match endianness {
            Endianness::Little => LittleEndian::read_u16_into(bytes, &mut out),
            Endianness::Big => BigEndian::read_u16_into(bytes, &mut out),
        }
        out
    } else {
        bytes.iter().map(|&b| u16::from(b)).collect()
    }
}

/// Read a window of the native pixel data:
/// `first .. first + count` samples in file order.
fn native_window(
    decoder: &Decoder,
    info: &ImageInfo,
    first: usize,
    count: usize,
) -> Result<Vec<u16>> {
    let pd = pixel_data_info(decoder)?;
    let declared = u64::from(pd.length.get().unwrap_or(0));
    ensure!(
        declared == info.expected_byte_length(),
        LengthMismatchSnafu {
            expected: info.expected_byte_length(),
            actual: declared,
        }
    );

    let bps = info.bytes_per_sample() as usize;
    let bytes = decoder
        .source()
        .slice(pd.offset as usize + first * bps, count * bps)
        .context(ReadPixelBytesSnafu)?;
    Ok(widen(bytes, info.bytes_per_sample(), decoder.endianness()))
}

/// All samples of all frames, widened to `u16`.
pub(crate) fn all_samples(
    decoder: &Decoder,
    info: &ImageInfo,
    external: Option<&dyn ExternalDecoder>,
) -> Result<Vec<u16>> {
    if decoder.transfer_syntax().is_native() {
        return native_window(decoder, info, 0, info.total_samples() as usize);
    }
    let mut out = Vec::with_capacity(info.total_samples() as usize);
    for frame in 0..info.frames {
        out.extend(compressed_frame(decoder, info, external, frame)?);
    }
    Ok(out)
}

/// The samples of one frame, widened to `u16`.
pub(crate) fn frame_samples(
    decoder: &Decoder,
    info: &ImageInfo,
    external: Option<&dyn ExternalDecoder>,
    frame: u32,
) -> Result<Vec<u16>> {
    if decoder.transfer_syntax().is_native() {
        let per_frame = info.samples_per_frame() as usize;
        return native_window(decoder, info, frame as usize * per_frame, per_frame);
    }
    compressed_frame(decoder, info, external, frame)
}

/// Samples `first .. first + count` in frame order.
///
/// For native data only the needed byte window is touched;
/// for encapsulated data only the frames
/// which intersect the range are decoded.
pub(crate) fn range_samples(
    decoder: &Decoder,
    info: &ImageInfo,
    external: Option<&dyn ExternalDecoder>,
    first: usize,
    count: usize,
) -> Result<Vec<u16>> {
    if decoder.transfer_syntax().is_native() {
        return native_window(decoder, info, first, count);
    }
    if count == 0 {
        return Ok(Vec::new());
    }

    let per_frame = info.samples_per_frame() as usize;
    let first_frame = (first / per_frame) as u32;
    let last_frame = ((first + count - 1) / per_frame) as u32;

    let mut out = Vec::with_capacity(count);
    for frame in first_frame..=last_frame {
        let samples = compressed_frame(decoder, info, external, frame)?;
        let frame_start = frame as usize * per_frame;
        let from = first.saturating_sub(frame_start);
        let to = (first + count - frame_start).min(per_frame);
        out.extend_from_slice(&samples[from..to]);
    }
    Ok(out)
}

/// Decode one encapsulated frame into widened samples.
fn compressed_frame(
    decoder: &Decoder,
    info: &ImageInfo,
    external: Option<&dyn ExternalDecoder>,
    frame: u32,
) -> Result<Vec<u16>> {
    let pd = pixel_data_info(decoder)?;
    let fragments = pd.fragments.as_ref().context(NoPixelDataSnafu)?;
    let data = frame_bytes(decoder, fragments, info, frame)?;
    let codec = decoder.transfer_syntax().codec();

    match codec {
        Codec::JpegLossless => {
            let decoded = LosslessDecoder::new(&data)
                .decode()
                .context(CorruptCompressedStreamSnafu { frame })?;
            ensure!(
                decoded.width == info.columns as usize
                    && decoded.height == info.rows as usize,
                FrameMismatchSnafu {
                    frame,
                    reason: format!(
                        "{}x{} decoded, {}x{} declared",
                        decoded.width, decoded.height, info.columns, info.rows
                    ),
                }
            );
            ensure!(
                decoded.components == usize::from(info.samples_per_pixel),
                FrameMismatchSnafu {
                    frame,
                    reason: format!(
                        "{} component(s) decoded, {} declared",
                        decoded.components, info.samples_per_pixel
                    ),
                }
            );
            if u16::from(decoded.precision) != info.bits_stored {
                warn!(
                    "frame {} precision {} differs from BitsStored {}",
                    frame, decoded.precision, info.bits_stored
                );
            }
            Ok(decoded.samples)
        }
        Codec::JpegBaseline | Codec::Jpeg2000 => {
            let external = external.context(NoExternalCodecSnafu {
                name: codec_name(codec),
            })?;
            let mut dst = Vec::new();
            external
                .decode_frame(info, codec, &data, &mut dst)
                .map_err(|source| Error::ExternalCodec { frame, source })?;
            let expected = info.samples_per_frame() * info.bytes_per_sample();
            ensure!(
                dst.len() as u64 == expected,
                FrameMismatchSnafu {
                    frame,
                    reason: format!(
                        "{} bytes from external codec, {} expected",
                        dst.len(),
                        expected
                    ),
                }
            );
            Ok(widen(&dst, info.bytes_per_sample(), Endianness::Little))
        }
        Codec::None => unreachable!("native pixel data never reaches the codec dispatch"),
    }
}

/// Concatenate the fragments which belong to the given frame.
///
/// Frame boundaries come from the basic offset table:
/// each entry is the byte offset of the frame's first fragment item,
/// counted from right after the offset table item.
/// An empty table is accepted for single-frame objects only.
fn frame_bytes(
    decoder: &Decoder,
    fragments: &PixelFragments,
    info: &ImageInfo,
    frame: u32,
) -> Result<Vec<u8>> {
    let table = &fragments.basic_offset_table;

    let selected: Vec<(u64, u32)> = if table.is_empty() {
        ensure!(info.frames <= 1, MissingOffsetTableSnafu { frames: info.frames });
        fragments.fragments.clone()
    } else {
        ensure!(
            table.len() == info.frames as usize,
            OffsetTableMismatchSnafu {
                entries: table.len(),
                frames: info.frames,
            }
        );
        // item headers are 8 bytes; fragment offsets recorded by the
        // parser point at fragment content, the table points at headers
        let base = fragments.fragments.first().map(|&(o, _)| o - 8).unwrap_or(0);
        let start = u64::from(table[frame as usize]);
        let end = table
            .get(frame as usize + 1)
            .map(|&o| u64::from(o))
            .unwrap_or(u64::MAX);
        fragments
            .fragments
            .iter()
            .filter(|&&(offset, _)| {
                let relative = offset - 8 - base;
                relative >= start && relative < end
            })
            .copied()
            .collect()
    };

    ensure!(
        !selected.is_empty(),
        FrameMismatchSnafu {
            frame,
            reason: "no fragments for this frame".to_owned(),
        }
    );

    let mut data = Vec::with_capacity(selected.iter().map(|&(_, len)| len as usize).sum());
    for (offset, length) in selected {
        data.extend_from_slice(
            decoder
                .source()
                .slice(offset as usize, length as usize)
                .context(ReadPixelBytesSnafu)?,
        );
    }
    Ok(data)
}
