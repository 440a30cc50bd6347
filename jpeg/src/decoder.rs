//! The lossless frame decoder: marker parsing, prediction
//! and the entropy decoding loop.

use crate::bitread::BitReader;
use crate::error::*;
use crate::huffman::HuffmanTable;
use crate::marker;
use snafu::ensure;

/// A fully decoded lossless frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// sample precision in bits (8 to 16)
    pub precision: u8,
    /// number of columns
    pub width: usize,
    /// number of rows
    pub height: usize,
    /// number of components (1 or 3)
    pub components: usize,
    /// decoded samples in row-major order,
    /// interleaved by component for 3-component frames
    pub samples: Vec<u16>,
}

#[derive(Debug)]
struct FrameHeader {
    precision: u8,
    width: usize,
    height: usize,
    /// component identifiers, in frame order
    component_ids: Vec<u8>,
}

#[derive(Debug)]
struct ScanHeader {
    /// Huffman table id per component, in frame order
    table_ids: Vec<u8>,
    /// predictor selection value (1 to 7)
    selection: u8,
}

/// A decoder for one JPEG Lossless (Process 14) datastream.
#[derive(Debug)]
pub struct LosslessDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    tables: [Option<HuffmanTable>; 4],
    frame: Option<FrameHeader>,
    restart_interval: usize,
}

impl<'a> LosslessDecoder<'a> {
    /// Create a decoder over the given compressed datastream.
    pub fn new(data: &'a [u8]) -> Self {
        LosslessDecoder {
            data,
            pos: 0,
            tables: [None, None, None, None],
            frame: None,
            restart_interval: 0,
        }
    }

    /// Decode the datastream into a frame of samples.
    pub fn decode(mut self) -> Result<Frame> {
        ensure!(
            self.data.len() >= 2
                && self.data[0] == marker::MARKER_START
                && self.data[1] == marker::SOI,
            MissingStartOfImageSnafu
        );
        self.pos = 2;

        let scan = loop {
            let (code, at) = self.next_marker()?;
            match code {
                marker::SOF3 => self.read_frame(at)?,
                code if marker::is_start_of_frame(code) => {
                    return UnsupportedProcessSnafu { marker: code, offset: at }.fail();
                }
                marker::DHT => self.read_huffman_tables()?,
                marker::DRI => self.read_restart_interval(at)?,
                marker::SOS => break self.read_scan_header(at)?,
                marker::EOI => {
                    return UnexpectedMarkerSnafu { marker: code, offset: at }.fail();
                }
                code if marker::is_standalone(code) => {
                    // stray TEM or restart marker before the scan; ignore
                }
                _ => self.skip_segment(at)?,
            }
        };

        let samples = self.decode_scan(&scan)?;
        self.expect_trailer()?;

        let frame = self.frame.take().expect("frame header was validated with the scan");
        Ok(Frame {
            precision: frame.precision,
            width: frame.width,
            height: frame.height,
            components: frame.component_ids.len(),
            samples,
        })
    }

    /// Advance to the next marker, skipping fill bytes,
    /// and return its code and the offset of its first byte.
    fn next_marker(&mut self) -> Result<(u8, usize)> {
        let mut p = self.pos;
        ensure!(
            p + 1 < self.data.len(),
            UnexpectedEndOfStreamSnafu { offset: self.data.len() }
        );
        ensure!(
            self.data[p] == marker::MARKER_START,
            UnexpectedMarkerSnafu { marker: self.data[p], offset: p }
        );
        // fill bytes: any number of extra 0xFF
        while p + 1 < self.data.len() && self.data[p + 1] == marker::MARKER_START {
            p += 1;
        }
        ensure!(
            p + 1 < self.data.len(),
            UnexpectedEndOfStreamSnafu { offset: self.data.len() }
        );
        let code = self.data[p + 1];
        ensure!(
            code != 0x00,
            UnexpectedMarkerSnafu { marker: code, offset: p }
        );
        self.pos = p + 2;
        Ok((code, p))
    }

    /// Read a marker segment's length field and return its body.
    fn read_segment(&mut self, at: usize) -> Result<&'a [u8]> {
        ensure!(
            self.pos + 2 <= self.data.len(),
            UnexpectedEndOfStreamSnafu { offset: self.data.len() }
        );
        let len = u16::from_be_bytes([self.data[self.pos], self.data[self.pos + 1]]) as usize;
        ensure!(
            len >= 2 && self.pos + len <= self.data.len(),
            UnexpectedMarkerSnafu { marker: self.data[at + 1], offset: at }
        );
        let body = &self.data[self.pos + 2..self.pos + len];
        self.pos += len;
        Ok(body)
    }

    fn skip_segment(&mut self, at: usize) -> Result<()> {
        self.read_segment(at)?;
        Ok(())
    }

    fn read_frame(&mut self, at: usize) -> Result<()> {
        let body = self.read_segment(at)?;
        ensure!(body.len() >= 6, UnexpectedMarkerSnafu { marker: marker::SOF3, offset: at });

        let precision = body[0];
        let height = u16::from_be_bytes([body[1], body[2]]) as usize;
        let width = u16::from_be_bytes([body[3], body[4]]) as usize;
        let count = body[5];

        ensure!(
            (8..=16).contains(&precision),
            PrecisionOutOfRangeSnafu { precision, offset: at }
        );
        ensure!(
            count == 1 || count == 3,
            BadComponentCountSnafu { count, offset: at }
        );
        ensure!(width > 0 && height > 0, ZeroFrameSizeSnafu { offset: at });
        ensure!(
            body.len() == 6 + count as usize * 3,
            UnexpectedMarkerSnafu { marker: marker::SOF3, offset: at }
        );

        let mut component_ids = Vec::with_capacity(count as usize);
        for spec in body[6..].chunks_exact(3) {
            // multi-component frames must not be subsampled
            if count > 1 {
                ensure!(spec[1] == 0x11, BadComponentSamplingSnafu { offset: at });
            }
            component_ids.push(spec[0]);
        }

        self.frame = Some(FrameHeader {
            precision,
            width,
            height,
            component_ids,
        });
        Ok(())
    }

    fn read_huffman_tables(&mut self) -> Result<()> {
        let at = self.pos - 2;
        let body = self.read_segment(at)?;
        let mut rest = body;
        while !rest.is_empty() {
            ensure!(
                rest.len() >= 17,
                UnexpectedMarkerSnafu { marker: marker::DHT, offset: at }
            );
            // table class (DC/AC) is irrelevant to the lossless process;
            // tables are stored by destination id alone
            let id = rest[0] & 0x0F;
            ensure!(id < 4, UndefinedHuffmanTableSnafu { id, offset: at });

            let mut bits = [0u8; 16];
            bits.copy_from_slice(&rest[1..17]);
            let total: usize = bits.iter().map(|&n| n as usize).sum();
            ensure!(
                rest.len() >= 17 + total,
                UnexpectedMarkerSnafu { marker: marker::DHT, offset: at }
            );
            let values = &rest[17..17 + total];
            self.tables[id as usize] = Some(HuffmanTable::from_dht(&bits, values, at)?);
            rest = &rest[17 + total..];
        }
        Ok(())
    }

    fn read_restart_interval(&mut self, at: usize) -> Result<()> {
        let body = self.read_segment(at)?;
        ensure!(
            body.len() == 2,
            UnexpectedMarkerSnafu { marker: marker::DRI, offset: at }
        );
        self.restart_interval = u16::from_be_bytes([body[0], body[1]]) as usize;
        Ok(())
    }

    fn read_scan_header(&mut self, at: usize) -> Result<ScanHeader> {
        ensure!(
            self.frame.is_some(),
            UnexpectedMarkerSnafu { marker: marker::SOS, offset: at }
        );
        let body = self.read_segment(at)?;
        let frame = self.frame.as_ref().expect("presence checked above");
        ensure!(
            !body.is_empty(),
            UnexpectedMarkerSnafu { marker: marker::SOS, offset: at }
        );

        let count = body[0] as usize;
        // only single-scan frames: the scan must cover every component
        ensure!(
            count == frame.component_ids.len() && body.len() == 1 + count * 2 + 3,
            UnsupportedProcessSnafu { marker: marker::SOS, offset: at }
        );

        let mut table_ids = vec![0u8; count];
        for pair in body[1..1 + count * 2].chunks_exact(2) {
            let id = pair[0];
            let table_id = pair[1] >> 4;
            let index = frame
                .component_ids
                .iter()
                .position(|&cid| cid == id)
                .ok_or(Error::UnknownScanComponent { id, offset: at })?;
            table_ids[index] = table_id;
        }

        let selection = body[1 + count * 2];
        let point_transform = body[3 + count * 2] & 0x0F;
        ensure!(
            (1..=7).contains(&selection),
            BadPredictorSelectionSnafu { selection, offset: at }
        );
        ensure!(
            point_transform == 0,
            UnsupportedPointTransformSnafu { value: point_transform, offset: at }
        );
        for &id in &table_ids {
            ensure!(
                self.tables[id as usize].is_some(),
                UndefinedHuffmanTableSnafu { id, offset: at }
            );
        }

        Ok(ScanHeader {
            table_ids,
            selection,
        })
    }

    /// The entropy decoding loop over all samples of the scan.
    fn decode_scan(&mut self, scan: &ScanHeader) -> Result<Vec<u16>> {
        let frame = self.frame.as_ref().expect("scan header required a frame");
        let width = frame.width;
        let height = frame.height;
        let ncomp = frame.component_ids.len();
        let precision = frame.precision;
        let mask = ((1u32 << precision) - 1) as i32;
        let default = 1i32 << (precision - 1);

        let tables: Vec<&HuffmanTable> = scan
            .table_ids
            .iter()
            .map(|&id| self.tables[id as usize].as_ref().expect("checked in scan header"))
            .collect();

        let expected = width * height * ncomp;
        let mut samples = vec![0u16; expected];
        let mut reader = BitReader::new(self.data, self.pos);

        let mut decoded = 0usize;
        // set while the next sample of each component must use
        // the default prediction, at the frame start and after restarts
        let mut resync = true;

        for y in 0..height {
            for x in 0..width {
                if self.restart_interval > 0 {
                    let mcu = y * width + x;
                    if mcu > 0 && mcu % self.restart_interval == 0 {
                        reader.sync_restart()?;
                        resync = true;
                    }
                }
                for c in 0..ncomp {
                    let s = tables[c].decode(&mut reader).map_err(|e| {
                        scan_interrupted(e, decoded, expected)
                    })?;
                    let diff = if s == 16 {
                        // Annex G: a category of 16 encodes the difference
                        // 32768 with no additional bits
                        32768
                    } else {
                        let raw = reader
                            .read_bits(s)
                            .map_err(|e| scan_interrupted(e, decoded, expected))?;
                        extend(raw, s)
                    };

                    let at = (y * width + x) * ncomp + c;
                    let prediction = if resync {
                        default
                    } else if y == 0 {
                        // first row: no row above, predict from the left
                        i32::from(samples[at - ncomp])
                    } else if x == 0 {
                        // first column: predict from the row above
                        i32::from(samples[at - width * ncomp])
                    } else {
                        let ra = i32::from(samples[at - ncomp]);
                        let rb = i32::from(samples[at - width * ncomp]);
                        let rc = i32::from(samples[at - width * ncomp - ncomp]);
                        predict(scan.selection, ra, rb, rc)
                    };

                    samples[at] = ((prediction + diff) & mask) as u16;
                    decoded += 1;
                }
                resync = false;
            }
        }

        self.pos = reader.segment_end();
        Ok(samples)
    }

    /// Consume what follows the entropy-coded data and check for EOI.
    fn expect_trailer(&mut self) -> Result<()> {
        loop {
            let (code, at) = match self.next_marker() {
                Ok(found) => found,
                Err(Error::UnexpectedEndOfStream { offset }) => {
                    return MissingEndOfImageSnafu { offset }.fail();
                }
                Err(e) => return Err(e),
            };
            match code {
                marker::EOI => return Ok(()),
                marker::DNL => self.skip_segment(at)?,
                code if marker::is_restart(code) => {}
                code => {
                    return UnexpectedMarkerSnafu { marker: code, offset: at }.fail();
                }
            }
        }
    }
}

/// Sign-extend `count` raw difference bits per ITU-T T.81 table H.2:
/// values with the high bit set are positive,
/// the rest map to the negative range.
fn extend(raw: u32, count: u8) -> i32 {
    if count == 0 {
        0
    } else if raw & (1 << (count - 1)) != 0 {
        raw as i32
    } else {
        raw as i32 - (1 << count) + 1
    }
}

/// The seven lossless predictor functions of ITU-T T.81 table H.1.
fn predict(selection: u8, ra: i32, rb: i32, rc: i32) -> i32 {
    match selection {
        1 => ra,
        2 => rb,
        3 => rc,
        4 => ra + rb - rc,
        5 => ra + ((rb - rc) >> 1),
        6 => rb + ((ra - rc) >> 1),
        7 => (ra + rb) >> 1,
        _ => unreachable!("selection validated in the scan header"),
    }
}

/// Rewrap an entropy decoding failure with scan progress information.
fn scan_interrupted(e: Error, decoded: usize, expected: usize) -> Error {
    match e {
        Error::UnexpectedEndOfStream { offset } => Error::IncompleteScan {
            decoded,
            expected,
            offset,
        },
        other => other,
    }
}
