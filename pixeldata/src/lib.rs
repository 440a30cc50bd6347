//! Typed pixel data reads on top of [`dicomite_object::Decoder`].
//!
//! The [`PixelDecoder`] extension trait adds the pixel operations
//! to the decoder: whole-image reads in the sample type matching
//! the file ([`pixels_u8`](PixelDecoder::pixels_u8),
//! [`pixels_u16`](PixelDecoder::pixels_u16),
//! [`pixels_i16`](PixelDecoder::pixels_i16),
//! [`pixels_rgb`](PixelDecoder::pixels_rgb)),
//! range reads which touch only the bytes they need,
//! and nearest-neighbour downsampling.
//!
//! ```no_run
//! use dicomite_object::Decoder;
//! use dicomite_pixeldata::PixelDecoder;
//!
//! # fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let decoder = Decoder::open("ct.dcm")?;
//! let pixels = decoder.pixels_u16()?;
//! # Ok(())
//! # }
//! ```
//!
//! For configured reads (allocation ceiling, an external codec
//! for JPEG Baseline or JPEG 2000), build a [`PixelReader`]:
//!
//! ```no_run
//! # use dicomite_object::Decoder;
//! use dicomite_pixeldata::{PixelReader, ReadOptions};
//!
//! # fn run(decoder: &Decoder) -> Result<(), dicomite_pixeldata::Error> {
//! let pixels = PixelReader::new(decoder)
//!     .options(ReadOptions::new().max_allocation(512 << 20))
//!     .pixels_u16()?;
//! # Ok(())
//! # }
//! ```
//!
//! All sample values are returned in host byte order,
//! and MONOCHROME1 images are inverted on the fly
//! so that callers always receive MONOCHROME2 semantics.
//! This is the only interpretation transform performed here;
//! windowing and rescaling are left to the caller.

mod convert;
mod frames;

use dicomite_core::{tags, Codec, PhotometricInterpretation, PixelRepresentation};
use dicomite_object::Decoder;
use snafu::{ensure, Backtrace, OptionExt, Snafu};

pub use frames::ExternalDecoder;

/// Error type for pixel data operations.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The file has no pixel data element.
    #[snafu(display("File has no pixel data"))]
    NoPixelData { backtrace: Backtrace },

    /// An attribute required for pixel interpretation is missing.
    #[snafu(display("Missing required attribute {}", name))]
    MissingAttribute {
        name: &'static str,
        backtrace: Backtrace,
    },

    /// The caller requested a typed shape the file cannot produce.
    #[snafu(display("Cannot read {} pixels: {}", requested, reason))]
    PixelFormatMismatch {
        requested: &'static str,
        reason: String,
        backtrace: Backtrace,
    },

    /// The decoded buffer would exceed the configured ceiling.
    #[snafu(display(
        "Pixel buffer of {} bytes exceeds the allocation ceiling of {}",
        required,
        ceiling
    ))]
    PixelBufferTooLarge {
        required: u64,
        ceiling: u64,
        backtrace: Backtrace,
    },

    /// A range read extends past the image.
    #[snafu(display(
        "Pixel range {}..{} out of bounds of {} samples",
        first,
        first + count,
        total
    ))]
    RangeOutOfBounds {
        first: usize,
        count: usize,
        total: usize,
        backtrace: Backtrace,
    },

    /// The native pixel data length does not match the image geometry.
    #[snafu(display(
        "Pixel data length {} does not match geometry ({} bytes expected)",
        actual,
        expected
    ))]
    LengthMismatch {
        expected: u64,
        actual: u64,
        backtrace: Backtrace,
    },

    /// The pixel bytes could not be read from the byte source.
    #[snafu(display("Could not read pixel bytes"))]
    ReadPixelBytes {
        #[snafu(backtrace)]
        source: dicomite_parser::source::Error,
    },

    /// The compressed pixel stream is malformed.
    #[snafu(display("Corrupt compressed stream in frame {}", frame))]
    CorruptCompressedStream {
        frame: u32,
        source: dicomite_jpeg::Error,
        backtrace: Backtrace,
    },

    /// A decoded frame disagrees with the image attributes.
    #[snafu(display("Decoded frame {} does not match the image attributes: {}", frame, reason))]
    FrameMismatch {
        frame: u32,
        reason: String,
        backtrace: Backtrace,
    },

    /// The basic offset table disagrees with the number of frames.
    #[snafu(display(
        "Basic offset table has {} entries for {} frames",
        entries,
        frames
    ))]
    OffsetTableMismatch {
        entries: usize,
        frames: u32,
        backtrace: Backtrace,
    },

    /// Multi-frame encapsulated pixel data without a basic offset table.
    #[snafu(display("Missing basic offset table for {} frames", frames))]
    MissingOffsetTable { frames: u32, backtrace: Backtrace },

    /// The transfer syntax needs an external codec and none is bound.
    #[snafu(display("No external codec bound for {}", name))]
    NoExternalCodec {
        name: &'static str,
        backtrace: Backtrace,
    },

    /// The bound external codec failed to decode a frame.
    #[snafu(display("External codec failed on frame {}", frame))]
    ExternalCodec {
        frame: u32,
        source: Box<dyn std::error::Error + Send + 'static>,
    },

    /// Planar (non-interleaved) color pixel data is not supported.
    #[snafu(display("Unsupported planar configuration {}", value))]
    UnsupportedPlanarConfiguration { value: u16, backtrace: Backtrace },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Options for pixel reading.
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    /// The ceiling for any single decoded pixel buffer, in bytes.
    pub max_allocation: u64,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            // 2 GiB
            max_allocation: 2 << 30,
        }
    }
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the allocation ceiling in bytes.
    pub fn max_allocation(mut self, bytes: u64) -> Self {
        self.max_allocation = bytes;
        self
    }
}

/// The image attributes which drive pixel interpretation,
/// gathered once per read from the decoder's metadata.
#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub rows: u32,
    pub columns: u32,
    pub samples_per_pixel: u16,
    pub bits_allocated: u16,
    pub bits_stored: u16,
    pub high_bit: u16,
    pub photometric: PhotometricInterpretation,
    pub representation: PixelRepresentation,
    pub frames: u32,
}

impl ImageInfo {
    /// Collect the image attributes from a decoder,
    /// failing on whatever a pixel read cannot do without.
    pub fn from_decoder(decoder: &Decoder) -> Result<Self> {
        let rows = decoder
            .int(tags::ROWS)
            .context(MissingAttributeSnafu { name: "Rows" })? as u32;
        let columns = decoder
            .int(tags::COLUMNS)
            .context(MissingAttributeSnafu { name: "Columns" })? as u32;
        let bits_allocated = decoder
            .bits_allocated()
            .context(MissingAttributeSnafu {
                name: "BitsAllocated",
            })?;
        let bits_stored = decoder.bits_stored().unwrap_or(bits_allocated);
        let high_bit = decoder
            .int(tags::HIGH_BIT)
            .map(|v| v as u16)
            .unwrap_or_else(|| bits_stored.saturating_sub(1));
        let photometric = decoder
            .photometric_interpretation()
            .unwrap_or(PhotometricInterpretation::Monochrome2);

        Ok(ImageInfo {
            rows,
            columns,
            samples_per_pixel: decoder.samples_per_pixel(),
            bits_allocated,
            bits_stored,
            high_bit,
            photometric,
            representation: decoder.pixel_representation(),
            frames: decoder.number_of_frames(),
        })
    }

    /// Samples per frame, including color components.
    pub fn samples_per_frame(&self) -> u64 {
        u64::from(self.rows) * u64::from(self.columns) * u64::from(self.samples_per_pixel)
    }

    /// Total number of samples across all frames.
    pub fn total_samples(&self) -> u64 {
        self.samples_per_frame() * u64::from(self.frames)
    }

    /// Total pixel positions (not counting color components).
    pub fn total_pixels(&self) -> u64 {
        u64::from(self.rows) * u64::from(self.columns) * u64::from(self.frames)
    }

    /// Bytes per stored sample.
    pub fn bytes_per_sample(&self) -> u64 {
        u64::from(self.bits_allocated / 8).max(1)
    }

    /// The expected native pixel data length in bytes.
    pub fn expected_byte_length(&self) -> u64 {
        self.total_samples() * self.bytes_per_sample()
    }

    /// The largest value expressible in the stored bits,
    /// used for the MONOCHROME1 inversion.
    pub fn max_stored_value(&self) -> u16 {
        (((1u32) << self.bits_stored) - 1) as u16
    }

    /// Whether samples must be inverted to reach MONOCHROME2 semantics.
    pub fn needs_inversion(&self) -> bool {
        self.photometric == PhotometricInterpretation::Monochrome1
    }
}

/// Downsampled pixels in the sample type matching the file.
#[derive(Debug, Clone, PartialEq)]
pub enum DownsampledPixels {
    U8(Vec<u8>),
    U16(Vec<u16>),
    I16(Vec<i16>),
    /// interleaved 8-bit RGB
    Rgb(Vec<u8>),
}

/// The result of a downsampled read: the new size and the pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Downsampled {
    pub width: u32,
    pub height: u32,
    pub pixels: DownsampledPixels,
}

/// A configured pixel reading session over a decoder.
///
/// All reads are purely functional over the parsed file
/// and its byte source; a reader may be used from several threads.
pub struct PixelReader<'a> {
    decoder: &'a Decoder,
    options: ReadOptions,
    external: Option<&'a dyn ExternalDecoder>,
}

impl<'a> PixelReader<'a> {
    /// Create a reader with default options and no external codec.
    pub fn new(decoder: &'a Decoder) -> Self {
        PixelReader {
            decoder,
            options: ReadOptions::default(),
            external: None,
        }
    }

    /// Use the given read options.
    pub fn options(mut self, options: ReadOptions) -> Self {
        self.options = options;
        self
    }

    /// Bind an external codec for the transfer syntaxes
    /// which this library does not decode natively
    /// (JPEG Baseline and JPEG 2000).
    pub fn external_decoder(mut self, external: &'a dyn ExternalDecoder) -> Self {
        self.external = Some(external);
        self
    }

    /// 8-bit grayscale samples of every frame.
    pub fn pixels_u8(&self) -> Result<Vec<u8>> {
        let info = self.grayscale_info("u8")?;
        self.check_8bit(&info, "u8")?;
        self.check_allocation(info.total_samples())?;
        let samples = self.all_samples(&info)?;
        Ok(convert::to_u8(samples, &info))
    }

    /// 16-bit unsigned grayscale samples of every frame.
    pub fn pixels_u16(&self) -> Result<Vec<u16>> {
        let info = self.grayscale_info("u16")?;
        self.check_16bit(&info, "u16", PixelRepresentation::Unsigned)?;
        self.check_allocation(info.total_samples() * 2)?;
        let samples = self.all_samples(&info)?;
        Ok(convert::to_u16(samples, &info))
    }

    /// 16-bit signed grayscale samples of every frame.
    pub fn pixels_i16(&self) -> Result<Vec<i16>> {
        let info = self.grayscale_info("i16")?;
        self.check_16bit(&info, "i16", PixelRepresentation::Signed)?;
        self.check_allocation(info.total_samples() * 2)?;
        let samples = self.all_samples(&info)?;
        Ok(convert::to_i16(samples, &info))
    }

    /// Interleaved 8-bit RGB samples of every frame.
    pub fn pixels_rgb(&self) -> Result<Vec<u8>> {
        let info = ImageInfo::from_decoder(self.decoder)?;
        ensure!(
            info.samples_per_pixel == 3,
            PixelFormatMismatchSnafu {
                requested: "rgb",
                reason: format!("file has {} sample(s) per pixel", info.samples_per_pixel),
            }
        );
        ensure!(
            info.bits_allocated == 8,
            PixelFormatMismatchSnafu {
                requested: "rgb",
                reason: format!("file stores {}-bit samples", info.bits_allocated),
            }
        );
        let planar = self.decoder.int(tags::PLANAR_CONFIGURATION).unwrap_or(0);
        ensure!(
            planar == 0,
            UnsupportedPlanarConfigurationSnafu {
                value: planar as u16,
            }
        );
        self.check_allocation(info.total_samples())?;
        let samples = self.all_samples(&info)?;
        Ok(convert::to_u8(samples, &info))
    }

    /// A subrange of [`pixels_u8`](Self::pixels_u8):
    /// samples `first .. first + count` in row-major frame order.
    pub fn pixels_range_u8(&self, first: usize, count: usize) -> Result<Vec<u8>> {
        let info = self.grayscale_info("u8")?;
        self.check_8bit(&info, "u8")?;
        let samples = self.range_samples(&info, first, count)?;
        Ok(convert::to_u8(samples, &info))
    }

    /// A subrange of [`pixels_u16`](Self::pixels_u16).
    pub fn pixels_range_u16(&self, first: usize, count: usize) -> Result<Vec<u16>> {
        let info = self.grayscale_info("u16")?;
        self.check_16bit(&info, "u16", PixelRepresentation::Unsigned)?;
        let samples = self.range_samples(&info, first, count)?;
        Ok(convert::to_u16(samples, &info))
    }

    /// A subrange of [`pixels_i16`](Self::pixels_i16).
    pub fn pixels_range_i16(&self, first: usize, count: usize) -> Result<Vec<i16>> {
        let info = self.grayscale_info("i16")?;
        self.check_16bit(&info, "i16", PixelRepresentation::Signed)?;
        let samples = self.range_samples(&info, first, count)?;
        Ok(convert::to_i16(samples, &info))
    }

    /// The first frame decimated by nearest-neighbour sampling
    /// so that neither output dimension exceeds `max_dim`.
    pub fn downsampled(&self, max_dim: u32) -> Result<Downsampled> {
        let info = ImageInfo::from_decoder(self.decoder)?;
        ensure!(
            max_dim > 0,
            PixelFormatMismatchSnafu {
                requested: "downsampled",
                reason: "maximum dimension must be positive".to_owned(),
            }
        );

        let largest = info.columns.max(info.rows);
        let step = ((largest + max_dim - 1) / max_dim).max(1);
        let width = (info.columns + step - 1) / step;
        let height = (info.rows + step - 1) / step;

        // only the first frame is decimated
        let frame = frames::frame_samples(self.decoder, &info, self.external, 0)?;
        let nc = usize::from(info.samples_per_pixel);
        let stride = info.columns as usize * nc;

        let mut picked: Vec<u16> =
            Vec::with_capacity(width as usize * height as usize * nc);
        for y in (0..info.rows as usize).step_by(step as usize) {
            for x in (0..info.columns as usize).step_by(step as usize) {
                for c in 0..nc {
                    picked.push(frame[y * stride + x * nc + c]);
                }
            }
        }

        let pixels = if info.samples_per_pixel == 3 {
            DownsampledPixels::Rgb(convert::to_u8(picked, &info))
        } else if info.bits_allocated <= 8 {
            DownsampledPixels::U8(convert::to_u8(picked, &info))
        } else if info.representation == PixelRepresentation::Signed {
            DownsampledPixels::I16(convert::to_i16(picked, &info))
        } else {
            DownsampledPixels::U16(convert::to_u16(picked, &info))
        };

        Ok(Downsampled {
            width,
            height,
            pixels,
        })
    }

    fn grayscale_info(&self, requested: &'static str) -> Result<ImageInfo> {
        let info = ImageInfo::from_decoder(self.decoder)?;
        ensure!(
            info.samples_per_pixel == 1,
            PixelFormatMismatchSnafu {
                requested,
                reason: format!("file has {} samples per pixel", info.samples_per_pixel),
            }
        );
        Ok(info)
    }

    fn check_8bit(&self, info: &ImageInfo, requested: &'static str) -> Result<()> {
        ensure!(
            info.bits_allocated <= 8,
            PixelFormatMismatchSnafu {
                requested,
                reason: format!("file stores {}-bit samples", info.bits_allocated),
            }
        );
        // 8-bit signed pixel representation is legal in the standard
        // but consistently rejected here
        ensure!(
            info.representation == PixelRepresentation::Unsigned,
            PixelFormatMismatchSnafu {
                requested,
                reason: "file stores signed samples".to_owned(),
            }
        );
        Ok(())
    }

    fn check_16bit(
        &self,
        info: &ImageInfo,
        requested: &'static str,
        representation: PixelRepresentation,
    ) -> Result<()> {
        ensure!(
            info.bits_allocated == 16,
            PixelFormatMismatchSnafu {
                requested,
                reason: format!("file stores {}-bit samples", info.bits_allocated),
            }
        );
        ensure!(
            info.representation == representation,
            PixelFormatMismatchSnafu {
                requested,
                reason: match representation {
                    PixelRepresentation::Unsigned => "file stores signed samples".to_owned(),
                    PixelRepresentation::Signed => "file stores unsigned samples".to_owned(),
                },
            }
        );
        Ok(())
    }

    /// Verify the allocation ceiling before any buffer is created.
    fn check_allocation(&self, required: u64) -> Result<()> {
        ensure!(
            required <= self.options.max_allocation,
            PixelBufferTooLargeSnafu {
                required,
                ceiling: self.options.max_allocation,
            }
        );
        Ok(())
    }

    /// All samples of all frames, widened to `u16`.
    fn all_samples(&self, info: &ImageInfo) -> Result<Vec<u16>> {
        frames::all_samples(self.decoder, info, self.external)
    }

    /// Samples `first .. first + count`, touching only the frames
    /// (and for native data, only the bytes) the range needs.
    fn range_samples(&self, info: &ImageInfo, first: usize, count: usize) -> Result<Vec<u16>> {
        let total = info.total_samples() as usize;
        ensure!(
            first.checked_add(count).is_some_and(|end| end <= total),
            RangeOutOfBoundsSnafu {
                first,
                count,
                total,
            }
        );
        self.check_allocation(count as u64 * info.bytes_per_sample())?;
        frames::range_samples(self.decoder, info, self.external, first, count)
    }
}

/// The typed pixel operations, available on any decoder,
/// with default options and no external codec.
pub trait PixelDecoder {
    /// 8-bit grayscale samples of every frame.
    fn pixels_u8(&self) -> Result<Vec<u8>>;
    /// 16-bit unsigned grayscale samples of every frame.
    fn pixels_u16(&self) -> Result<Vec<u16>>;
    /// 16-bit signed grayscale samples of every frame.
    fn pixels_i16(&self) -> Result<Vec<i16>>;
    /// Interleaved 8-bit RGB samples of every frame.
    fn pixels_rgb(&self) -> Result<Vec<u8>>;
    /// A subrange of [`pixels_u8`](Self::pixels_u8).
    fn pixels_range_u8(&self, first: usize, count: usize) -> Result<Vec<u8>>;
    /// A subrange of [`pixels_u16`](Self::pixels_u16).
    fn pixels_range_u16(&self, first: usize, count: usize) -> Result<Vec<u16>>;
    /// A subrange of [`pixels_i16`](Self::pixels_i16).
    fn pixels_range_i16(&self, first: usize, count: usize) -> Result<Vec<i16>>;
    /// The first frame decimated to at most `max_dim` in either dimension.
    fn downsampled(&self, max_dim: u32) -> Result<Downsampled>;
}

impl PixelDecoder for Decoder {
    fn pixels_u8(&self) -> Result<Vec<u8>> {
        PixelReader::new(self).pixels_u8()
    }

    fn pixels_u16(&self) -> Result<Vec<u16>> {
        PixelReader::new(self).pixels_u16()
    }

    fn pixels_i16(&self) -> Result<Vec<i16>> {
        PixelReader::new(self).pixels_i16()
    }

    fn pixels_rgb(&self) -> Result<Vec<u8>> {
        PixelReader::new(self).pixels_rgb()
    }

    fn pixels_range_u8(&self, first: usize, count: usize) -> Result<Vec<u8>> {
        PixelReader::new(self).pixels_range_u8(first, count)
    }

    fn pixels_range_u16(&self, first: usize, count: usize) -> Result<Vec<u16>> {
        PixelReader::new(self).pixels_range_u16(first, count)
    }

    fn pixels_range_i16(&self, first: usize, count: usize) -> Result<Vec<i16>> {
        PixelReader::new(self).pixels_range_i16(first, count)
    }

    fn downsampled(&self, max_dim: u32) -> Result<Downsampled> {
        PixelReader::new(self).downsampled(max_dim)
    }
}

/// The name of the codec a transfer syntax needs, for diagnostics.
pub(crate) fn codec_name(codec: Codec) -> &'static str {
    match codec {
        Codec::None => "native",
        Codec::JpegLossless => "JPEG Lossless",
        Codec::JpegBaseline => "JPEG Baseline",
        Codec::Jpeg2000 => "JPEG 2000",
    }
}
