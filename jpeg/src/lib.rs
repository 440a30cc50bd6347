//! Native decoder for JPEG Lossless, Non-Hierarchical (ITU-T T.81
//! Process 14), the lossless compression process used by DICOM
//! transfer syntaxes `1.2.840.10008.1.2.4.57` and `.70`.
//!
//! The decoder takes one complete compressed datastream
//! (`SOI` through `EOI`, with entropy byte stuffing still in place)
//! and produces the flat sample plane of the frame:
//!
//! ```
//! use dicomite_jpeg::LosslessDecoder;
//!
//! # fn run(datastream: &[u8]) -> Result<(), dicomite_jpeg::Error> {
//! let frame = LosslessDecoder::new(datastream).decode()?;
//! assert_eq!(frame.samples.len(), frame.width * frame.height * frame.components);
//! # Ok(())
//! # }
//! ```
//!
//! Sample precisions of 8 to 16 bits and frames of 1 or 3 components
//! are supported, with any of the seven predictor selection values.
//! Samples are returned widened to `u16`,
//! interleaved by component for 3-component frames.

mod bitread;
mod decoder;
mod huffman;
mod marker;

pub use decoder::{Frame, LosslessDecoder};
pub use error::{Error, Result};

pub mod error {
    //! Error types for the lossless decoder.

    use snafu::Snafu;

    /// An error found while decoding a compressed datastream.
    ///
    /// Every variant carries the byte offset into the datastream
    /// at which the problem was detected.
    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(crate)))]
    #[non_exhaustive]
    pub enum Error {
        /// The datastream does not begin with an SOI marker.
        #[snafu(display("Missing SOI marker at start of compressed stream"))]
        MissingStartOfImage,

        /// The datastream ended in the middle of a segment or code.
        #[snafu(display("Unexpected end of compressed stream at offset {}", offset))]
        UnexpectedEndOfStream { offset: usize },

        /// A marker appeared where it is not allowed.
        #[snafu(display("Unexpected marker {:#04X} at offset {}", marker, offset))]
        UnexpectedMarker { marker: u8, offset: usize },

        /// A start-of-frame marker other than SOF3 was found.
        #[snafu(display(
            "Unsupported JPEG process (marker {:#04X}) at offset {}",
            marker,
            offset
        ))]
        UnsupportedProcess { marker: u8, offset: usize },

        /// The declared sample precision cannot be decoded.
        #[snafu(display(
            "Sample precision {} out of range at offset {}",
            precision,
            offset
        ))]
        PrecisionOutOfRange { precision: u8, offset: usize },

        /// The frame declares a component count other than 1 or 3.
        #[snafu(display("Unsupported component count {} at offset {}", count, offset))]
        BadComponentCount { count: u8, offset: usize },

        /// The frame declares zero width or height.
        /// Deferred frame heights (via DNL) are not supported.
        #[snafu(display("Frame with zero dimensions at offset {}", offset))]
        ZeroFrameSize { offset: usize },

        /// The scan header names a component which the frame did not declare.
        #[snafu(display("Unknown scan component {} at offset {}", id, offset))]
        UnknownScanComponent { id: u8, offset: usize },

        /// A component declares horizontal or vertical sampling other than 1.
        #[snafu(display("Unsupported component sampling at offset {}", offset))]
        BadComponentSampling { offset: usize },

        /// A DHT segment defines more than 256 codes in one table.
        #[snafu(display("Huffman table overflow at offset {}", offset))]
        HuffmanTableOverflow { offset: usize },

        /// The scan references a Huffman table which was never defined.
        #[snafu(display(
            "Scan references undefined Huffman table {} at offset {}",
            id,
            offset
        ))]
        UndefinedHuffmanTable { id: u8, offset: usize },

        /// The scan header declares a predictor selection value
        /// outside 1 through 7.
        #[snafu(display(
            "Unsupported predictor selection {} at offset {}",
            selection,
            offset
        ))]
        BadPredictorSelection { selection: u8, offset: usize },

        /// The scan header declares a non-zero point transform.
        #[snafu(display("Unsupported point transform {} at offset {}", value, offset))]
        UnsupportedPointTransform { value: u8, offset: usize },

        /// The entropy-coded data holds a bit pattern
        /// which no defined code matches.
        #[snafu(display("Undecodable Huffman code at offset {}", offset))]
        UndecodableCode { offset: usize },

        /// The entropy-coded segment ended before all samples were decoded.
        #[snafu(display(
            "Entropy data ended after {} of {} samples (offset {})",
            decoded,
            expected,
            offset
        ))]
        IncompleteScan {
            decoded: usize,
            expected: usize,
            offset: usize,
        },

        /// No EOI marker follows the entropy-coded data.
        #[snafu(display("Missing EOI marker at offset {}", offset))]
        MissingEndOfImage { offset: usize },
    }

    pub type Result<T, E = Error> = std::result::Result<T, E>;
}
