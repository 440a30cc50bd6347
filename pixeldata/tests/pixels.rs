//! End-to-end pixel reading tests:
//! native transfer syntaxes, encapsulated JPEG lossless,
//! range reads, inversion and the safety limits.

mod common;

use common::{
    gradient_file, gradient_samples, grayscale_image, sample_bytes, FileBuilder, LosslessEncoder,
};
use dicomite_core::{uids, Codec};
use dicomite_object::Decoder;
use dicomite_pixeldata::{
    DownsampledPixels, Error, ExternalDecoder, ImageInfo, PixelDecoder, PixelReader, ReadOptions,
};
use rstest::rstest;
use std::io::Write;

#[test]
fn u16_gradient_values() {
    let decoder = Decoder::from_vec(gradient_file(uids::EXPLICIT_VR_LITTLE_ENDIAN, 512, 512)).unwrap();
    let pixels = decoder.pixels_u16().unwrap();
    assert_eq!(pixels.len(), 512 * 512);
    assert_eq!(pixels[0], 0);
    assert_eq!(pixels[513], 2);
    assert_eq!(pixels[512 * 512 - 1], 1022);
}

#[rstest]
#[case::implicit(uids::IMPLICIT_VR_LITTLE_ENDIAN)]
#[case::big_endian(uids::EXPLICIT_VR_BIG_ENDIAN)]
fn other_native_syntaxes_decode_identically(#[case] ts_uid: &str) {
    let reference = Decoder::from_vec(gradient_file(uids::EXPLICIT_VR_LITTLE_ENDIAN, 64, 64))
        .unwrap()
        .pixels_u16()
        .unwrap();
    let pixels = Decoder::from_vec(gradient_file(ts_uid, 64, 64))
        .unwrap()
        .pixels_u16()
        .unwrap();
    assert_eq!(pixels, reference);
}

#[test]
fn range_reads_match_full_reads() {
    let decoder = Decoder::from_vec(gradient_file(uids::EXPLICIT_VR_LITTLE_ENDIAN, 64, 64)).unwrap();
    let full = decoder.pixels_u16().unwrap();

    assert_eq!(decoder.pixels_range_u16(0, 64).unwrap(), full[0..64]);
    assert_eq!(decoder.pixels_range_u16(100, 500).unwrap(), full[100..600]);
    assert_eq!(
        decoder.pixels_range_u16(64 * 64 - 1, 1).unwrap(),
        full[64 * 64 - 1..]
    );
    assert_eq!(decoder.pixels_range_u16(17, 0).unwrap(), []);

    let err = decoder.pixels_range_u16(64 * 64 - 1, 2).unwrap_err();
    assert!(matches!(err, Error::RangeOutOfBounds { .. }));
}

#[test]
fn monochrome1_is_returned_inverted() {
    let samples = gradient_samples(32, 32);
    let bytes = sample_bytes(&samples, false);
    let mono2 = grayscale_image(
        FileBuilder::new(uids::EXPLICIT_VR_LITTLE_ENDIAN),
        32,
        32,
        16,
        false,
        "MONOCHROME2",
    )
    .element_bytes(0x7FE0, 0x0010, "OW", &bytes)
    .build();
    let mono1 = grayscale_image(
        FileBuilder::new(uids::EXPLICIT_VR_LITTLE_ENDIAN),
        32,
        32,
        16,
        false,
        "MONOCHROME1",
    )
    .element_bytes(0x7FE0, 0x0010, "OW", &bytes)
    .build();

    let plain = Decoder::from_vec(mono2).unwrap().pixels_u16().unwrap();
    let inverted = Decoder::from_vec(mono1).unwrap().pixels_u16().unwrap();
    for (a, b) in plain.iter().zip(&inverted) {
        assert_eq!(u32::from(*a) + u32::from(*b), 0xFFFF);
    }
}

#[test]
fn eight_bit_and_signed_reads() {
    let bytes: Vec<u8> = (0u32..16 * 16).map(|i| (i & 0xFF) as u8).collect();
    let eight_bit = grayscale_image(
        FileBuilder::new(uids::EXPLICIT_VR_LITTLE_ENDIAN),
        16,
        16,
        8,
        false,
        "MONOCHROME2",
    )
    .element_bytes(0x7FE0, 0x0010, "OB", &bytes)
    .build();
    let decoder = Decoder::from_vec(eight_bit).unwrap();
    assert_eq!(decoder.pixels_u8().unwrap(), bytes);
    assert_eq!(decoder.pixels_range_u8(10, 4).unwrap(), bytes[10..14]);
    // an 8-bit file cannot produce 16-bit samples
    assert!(matches!(
        decoder.pixels_u16().unwrap_err(),
        Error::PixelFormatMismatch { .. }
    ));

    let values: Vec<i16> = (0..16i16 * 16).map(|i| i - 128).collect();
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    let signed = grayscale_image(
        FileBuilder::new(uids::EXPLICIT_VR_LITTLE_ENDIAN),
        16,
        16,
        16,
        true,
        "MONOCHROME2",
    )
    .element_bytes(0x7FE0, 0x0010, "OW", &bytes)
    .build();
    let decoder = Decoder::from_vec(signed).unwrap();
    assert_eq!(decoder.pixels_i16().unwrap(), values);
    assert!(matches!(
        decoder.pixels_u16().unwrap_err(),
        Error::PixelFormatMismatch { .. }
    ));
}

#[test]
fn rgb_reads() {
    let bytes: Vec<u8> = (0u32..8 * 8 * 3).map(|i| (i % 251) as u8).collect();
    let rgb = FileBuilder::new(uids::EXPLICIT_VR_LITTLE_ENDIAN)
        .element_str(0x0008, 0x0060, "CS", "OT")
        .element_u16s(0x0028, 0x0002, "US", &[3])
        .element_str(0x0028, 0x0004, "CS", "RGB")
        .element_u16s(0x0028, 0x0006, "US", &[0])
        .element_u16s(0x0028, 0x0010, "US", &[8])
        .element_u16s(0x0028, 0x0011, "US", &[8])
        .element_u16s(0x0028, 0x0100, "US", &[8])
        .element_u16s(0x0028, 0x0101, "US", &[8])
        .element_u16s(0x0028, 0x0102, "US", &[7])
        .element_u16s(0x0028, 0x0103, "US", &[0])
        .element_bytes(0x7FE0, 0x0010, "OB", &bytes)
        .build();
    let decoder = Decoder::from_vec(rgb).unwrap();
    assert_eq!(decoder.pixels_rgb().unwrap(), bytes);
    // a color image has no single grayscale plane
    assert!(matches!(
        decoder.pixels_u8().unwrap_err(),
        Error::PixelFormatMismatch { .. }
    ));

    let grayscale =
        Decoder::from_vec(gradient_file(uids::EXPLICIT_VR_LITTLE_ENDIAN, 8, 8)).unwrap();
    assert!(matches!(
        grayscale.pixels_rgb().unwrap_err(),
        Error::PixelFormatMismatch { .. }
    ));
}

#[test]
fn allocation_ceiling_fails_before_allocating() {
    let decoder = Decoder::from_vec(gradient_file(uids::EXPLICIT_VR_LITTLE_ENDIAN, 512, 512)).unwrap();
    let err = PixelReader::new(&decoder)
        .options(ReadOptions::new().max_allocation(1024))
        .pixels_u16()
        .unwrap_err();
    assert!(matches!(
        err,
        Error::PixelBufferTooLarge {
            required: 524_288,
            ceiling: 1024,
            ..
        }
    ));
}

#[test]
fn length_mismatch_is_rejected() {
    // geometry says 16x16 but only half the bytes are present
    let data = grayscale_image(
        FileBuilder::new(uids::EXPLICIT_VR_LITTLE_ENDIAN),
        16,
        16,
        16,
        false,
        "MONOCHROME2",
    )
    .element_bytes(0x7FE0, 0x0010, "OW", &[0u8; 16 * 16])
    .build();
    let decoder = Decoder::from_vec(data).unwrap();
    assert!(matches!(
        decoder.pixels_u16().unwrap_err(),
        Error::LengthMismatch { .. }
    ));
}

#[test]
fn files_without_pixel_data() {
    let data = FileBuilder::new(uids::EXPLICIT_VR_LITTLE_ENDIAN)
        .element_str(0x0008, 0x0060, "CS", "SR")
        .build();
    let decoder = Decoder::from_vec(data).unwrap();
    assert!(matches!(
        decoder.pixels_u16().unwrap_err(),
        Error::MissingAttribute { .. }
    ));
}

fn jpeg_lossless_file(rows: u16, columns: u16, samples: &[u16]) -> Vec<u8> {
    let stream = LosslessEncoder::encode(samples, columns, rows, 16);
    grayscale_image(
        FileBuilder::new(uids::JPEG_LOSSLESS_SV1),
        rows,
        columns,
        16,
        false,
        "MONOCHROME2",
    )
    .encapsulated_pixel_data(&[stream], true)
    .build()
}

#[test]
fn jpeg_lossless_round_trip() {
    let samples = gradient_samples(256, 256);
    let decoder = Decoder::from_vec(jpeg_lossless_file(256, 256, &samples)).unwrap();

    assert!(decoder.is_compressed());
    assert_eq!(decoder.transfer_syntax().codec(), Codec::JpegLossless);
    // bit-perfect reconstruction
    assert_eq!(decoder.pixels_u16().unwrap(), samples);
}

#[test]
fn jpeg_lossless_from_mapped_file_is_identical() {
    let samples = gradient_samples(128, 128);
    let data = jpeg_lossless_file(128, 128, &samples);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&data).unwrap();
    file.flush().unwrap();

    let in_memory = Decoder::from_vec(data).unwrap().pixels_u16().unwrap();
    let mapped = dicomite_object::OpenOptions::new()
        .mmap_threshold(1)
        .open(file.path())
        .unwrap()
        .pixels_u16()
        .unwrap();
    assert_eq!(in_memory, mapped);
    assert_eq!(in_memory, samples);
}

#[test]
fn multi_frame_jpeg_lossless_with_offset_table() {
    let frame0 = gradient_samples(32, 32);
    let frame1: Vec<u16> = frame0.iter().map(|&s| s + 1000).collect();
    let streams = vec![
        LosslessEncoder::encode(&frame0, 32, 32, 16),
        LosslessEncoder::encode(&frame1, 32, 32, 16),
    ];
    let data = grayscale_image(
        FileBuilder::new(uids::JPEG_LOSSLESS_SV1),
        32,
        32,
        16,
        false,
        "MONOCHROME2",
    )
    .element_str(0x0028, 0x0008, "IS", "2")
    .encapsulated_pixel_data(&streams, true)
    .build();
    let decoder = Decoder::from_vec(data).unwrap();

    let all = decoder.pixels_u16().unwrap();
    assert_eq!(all.len(), 2 * 32 * 32);
    assert_eq!(&all[..32 * 32], frame0.as_slice());
    assert_eq!(&all[32 * 32..], frame1.as_slice());

    // a range crossing the frame boundary
    let range = decoder.pixels_range_u16(32 * 32 - 2, 4).unwrap();
    assert_eq!(range[0..2], frame0[32 * 32 - 2..]);
    assert_eq!(range[2..4], frame1[0..2]);
}

#[test]
fn corrupt_jpeg_stream_is_reported() {
    let samples = gradient_samples(16, 16);
    let mut stream = LosslessEncoder::encode(&samples, 16, 16, 16);
    // destroy the SOF3 marker
    let at = stream.windows(2).position(|w| w == [0xFF, 0xC3]).unwrap();
    stream[at + 1] = 0xC0;
    let data = grayscale_image(
        FileBuilder::new(uids::JPEG_LOSSLESS_SV1),
        16,
        16,
        16,
        false,
        "MONOCHROME2",
    )
    .encapsulated_pixel_data(&[stream], true)
    .build();
    let decoder = Decoder::from_vec(data).unwrap();
    assert!(matches!(
        decoder.pixels_u16().unwrap_err(),
        Error::CorruptCompressedStream { frame: 0, .. }
    ));
}

/// An external codec stub which ignores its input
/// and produces a known ramp.
struct RampCodec;

impl ExternalDecoder for RampCodec {
    fn decode_frame(
        &self,
        info: &ImageInfo,
        _codec: Codec,
        _data: &[u8],
        dst: &mut Vec<u8>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        for i in 0..info.samples_per_frame() {
            dst.push((i & 0xFF) as u8);
        }
        Ok(())
    }
}

#[test]
fn external_codec_dispatch() {
    let data = grayscale_image(
        FileBuilder::new(uids::JPEG_BASELINE),
        16,
        16,
        8,
        false,
        "MONOCHROME2",
    )
    .encapsulated_pixel_data(&[vec![0xFF, 0xD8, 0xFF, 0xD9]], true)
    .build();
    let decoder = Decoder::from_vec(data).unwrap();

    // without a bound codec the read is refused
    assert!(matches!(
        decoder.pixels_u8().unwrap_err(),
        Error::NoExternalCodec { .. }
    ));

    let codec = RampCodec;
    let pixels = PixelReader::new(&decoder)
        .external_decoder(&codec)
        .pixels_u8()
        .unwrap();
    assert_eq!(pixels.len(), 16 * 16);
    assert_eq!(pixels[0], 0);
    assert_eq!(pixels[255], 255);
}

#[test]
fn downsampling_by_nearest_neighbour() {
    let decoder = Decoder::from_vec(gradient_file(uids::EXPLICIT_VR_LITTLE_ENDIAN, 32, 64)).unwrap();
    let down = decoder.downsampled(16).unwrap();
    // 64x32 decimated by 4
    assert_eq!((down.width, down.height), (16, 8));
    match down.pixels {
        DownsampledPixels::U16(pixels) => {
            assert_eq!(pixels.len(), 16 * 8);
            // picked samples are (4y + 4x) of the gradient
            assert_eq!(pixels[0], 0);
            assert_eq!(pixels[1], 4);
            assert_eq!(pixels[16], 4);
        }
        other => panic!("unexpected sample type: {:?}", other),
    }

    // small images come back unchanged
    let down = decoder.downsampled(64).unwrap();
    assert_eq!((down.width, down.height), (64, 32));
}
