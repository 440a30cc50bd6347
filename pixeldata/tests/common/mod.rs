//! Test support: synthetic DICOM files and a minimal
//! JPEG lossless encoder to exercise the decoding paths.

/// A little builder of DICOM Part 10 files for tests.
pub struct FileBuilder {
    ts_uid: String,
    explicit_vr: bool,
    big_endian: bool,
    body: Vec<u8>,
}

impl FileBuilder {
    pub fn new(ts_uid: &str) -> Self {
        FileBuilder {
            ts_uid: ts_uid.to_owned(),
            explicit_vr: ts_uid != "1.2.840.10008.1.2",
            big_endian: ts_uid == "1.2.840.10008.1.2.2",
            body: Vec::new(),
        }
    }

    fn push_u16(&mut self, value: u16) {
        if self.big_endian {
            self.body.extend(value.to_be_bytes());
        } else {
            self.body.extend(value.to_le_bytes());
        }
    }

    fn push_u32(&mut self, value: u32) {
        if self.big_endian {
            self.body.extend(value.to_be_bytes());
        } else {
            self.body.extend(value.to_le_bytes());
        }
    }

    fn push_header(&mut self, group: u16, elem: u16, vr: &str, len: u32) {
        self.push_u16(group);
        self.push_u16(elem);
        if self.explicit_vr && group != 0xFFFE {
            self.body.extend(vr.as_bytes());
            let long_header = matches!(
                vr,
                "OB" | "OD" | "OF" | "OL" | "OV" | "OW" | "SQ" | "UC" | "UR" | "UT" | "UN"
            );
            if long_header {
                self.body.extend([0u8, 0]);
                self.push_u32(len);
            } else {
                self.push_u16(len as u16);
            }
        } else {
            self.push_u32(len);
        }
    }

    pub fn element_str(mut self, group: u16, elem: u16, vr: &str, value: &str) -> Self {
        let mut bytes = value.as_bytes().to_vec();
        if bytes.len() % 2 == 1 {
            bytes.push(if vr == "UI" { 0 } else { b' ' });
        }
        self.push_header(group, elem, vr, bytes.len() as u32);
        self.body.extend(bytes);
        self
    }

    pub fn element_u16s(mut self, group: u16, elem: u16, vr: &str, values: &[u16]) -> Self {
        self.push_header(group, elem, vr, (values.len() * 2) as u32);
        for &value in values {
            self.push_u16(value);
        }
        self
    }

    pub fn element_bytes(mut self, group: u16, elem: u16, vr: &str, bytes: &[u8]) -> Self {
        self.push_header(group, elem, vr, bytes.len() as u32);
        self.body.extend(bytes);
        self
    }

    /// Append an encapsulated pixel data element:
    /// a basic offset table (optional) and one fragment per frame.
    pub fn encapsulated_pixel_data(mut self, frames: &[Vec<u8>], with_table: bool) -> Self {
        self.push_header(0x7FE0, 0x0010, "OB", 0xFFFF_FFFF);

        let padded: Vec<Vec<u8>> = frames
            .iter()
            .map(|f| {
                let mut f = f.clone();
                if f.len() % 2 == 1 {
                    f.push(0);
                }
                f
            })
            .collect();

        // basic offset table item
        self.push_u16(0xFFFE);
        self.push_u16(0xE000);
        if with_table {
            self.push_u32(4 * padded.len() as u32);
            let mut offset = 0u32;
            for frame in &padded {
                self.body.extend(offset.to_le_bytes());
                offset += 8 + frame.len() as u32;
            }
        } else {
            self.push_u32(0);
        }

        for frame in &padded {
            self.push_u16(0xFFFE);
            self.push_u16(0xE000);
            self.push_u32(frame.len() as u32);
            self.body.extend(frame);
        }

        // sequence delimiter
        self.push_u16(0xFFFE);
        self.push_u16(0xE0DD);
        self.push_u32(0);
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut meta = Vec::new();
        let uid = {
            let mut bytes = self.ts_uid.as_bytes().to_vec();
            if bytes.len() % 2 == 1 {
                bytes.push(0);
            }
            bytes
        };
        meta.extend(0x0002u16.to_le_bytes());
        meta.extend(0x0010u16.to_le_bytes());
        meta.extend(b"UI");
        meta.extend((uid.len() as u16).to_le_bytes());
        meta.extend(&uid);

        let mut out = vec![0u8; 128];
        out.extend(b"DICM");
        out.extend(0x0002u16.to_le_bytes());
        out.extend(0x0000u16.to_le_bytes());
        out.extend(b"UL");
        out.extend(4u16.to_le_bytes());
        out.extend((meta.len() as u32).to_le_bytes());
        out.extend(meta);
        out.extend(self.body);
        out
    }
}

/// The image description elements of a grayscale image.
pub fn grayscale_image(
    builder: FileBuilder,
    rows: u16,
    columns: u16,
    bits: u16,
    signed: bool,
    photometric: &str,
) -> FileBuilder {
    builder
        .element_str(0x0008, 0x0060, "CS", "CT")
        .element_u16s(0x0028, 0x0002, "US", &[1])
        .element_str(0x0028, 0x0004, "CS", photometric)
        .element_u16s(0x0028, 0x0010, "US", &[rows])
        .element_u16s(0x0028, 0x0011, "US", &[columns])
        .element_u16s(0x0028, 0x0100, "US", &[bits])
        .element_u16s(0x0028, 0x0101, "US", &[bits])
        .element_u16s(0x0028, 0x0102, "US", &[bits - 1])
        .element_u16s(0x0028, 0x0103, "US", &[u16::from(signed)])
}

/// Pixel samples of the reference test pattern:
/// `(row + column) & 0xFFFF` in row-major order.
pub fn gradient_samples(rows: u16, columns: u16) -> Vec<u16> {
    (0..u32::from(rows))
        .flat_map(|r| (0..u32::from(columns)).map(move |c| ((r + c) & 0xFFFF) as u16))
        .collect()
}

pub fn sample_bytes(samples: &[u16], big_endian: bool) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&s| {
            if big_endian {
                s.to_be_bytes()
            } else {
                s.to_le_bytes()
            }
        })
        .collect()
}

/// A complete uncompressed 16-bit grayscale file
/// holding the gradient pattern.
pub fn gradient_file(ts_uid: &str, rows: u16, columns: u16) -> Vec<u8> {
    let big_endian = ts_uid == "1.2.840.10008.1.2.2";
    let samples = gradient_samples(rows, columns);
    grayscale_image(FileBuilder::new(ts_uid), rows, columns, 16, false, "MONOCHROME2")
        .element_bytes(0x7FE0, 0x0010, "OW", &sample_bytes(&samples, big_endian))
        .build()
}

/// A minimal JPEG lossless (Process 14, selection value 1) encoder
/// for single-component frames, with byte stuffing.
pub struct LosslessEncoder {
    out: Vec<u8>,
    bit_buf: u32,
    bit_count: u8,
}

impl LosslessEncoder {
    const BITS: [u8; 16] = [0, 3, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1];
    const HUFFVAL: [u8; 17] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];

    /// Encode one frame as a complete SOI..EOI datastream.
    pub fn encode(samples: &[u16], width: u16, height: u16, precision: u8) -> Vec<u8> {
        let mut enc = LosslessEncoder {
            out: Vec::new(),
            bit_buf: 0,
            bit_count: 0,
        };
        enc.headers(precision, width, height);
        let w = width as usize;
        let mask = ((1u32 << precision) - 1) as i32;
        for y in 0..height as usize {
            for x in 0..w {
                let prediction = if x == 0 && y == 0 {
                    1 << (precision - 1)
                } else if y == 0 {
                    i32::from(samples[x - 1])
                } else if x == 0 {
                    i32::from(samples[(y - 1) * w])
                } else {
                    i32::from(samples[y * w + x - 1])
                };
                let mut diff = (i32::from(samples[y * w + x]) - prediction) & mask;
                if precision == 16 && diff == 32768 {
                    // kept positive: the one category-16 difference
                } else if diff > mask / 2 {
                    diff -= mask + 1;
                }
                enc.put_diff(diff);
            }
        }
        enc.finish()
    }

    fn headers(&mut self, precision: u8, width: u16, height: u16) {
        self.out.extend([0xFF, 0xD8]);
        self.out.extend([0xFF, 0xC3]);
        self.out.extend(11u16.to_be_bytes());
        self.out.push(precision);
        self.out.extend(height.to_be_bytes());
        self.out.extend(width.to_be_bytes());
        self.out.push(1);
        self.out.extend([1, 0x11, 0x00]);
        let lh = 2 + 1 + 16 + Self::HUFFVAL.len() as u16;
        self.out.extend([0xFF, 0xC4]);
        self.out.extend(lh.to_be_bytes());
        self.out.push(0x00);
        self.out.extend(Self::BITS);
        self.out.extend(Self::HUFFVAL);
        self.out.extend([0xFF, 0xDA]);
        self.out.extend(8u16.to_be_bytes());
        self.out.push(1);
        self.out.extend([1, 0x00]);
        self.out.extend([1, 0x00, 0x00]);
    }

    fn code_of(category: u8) -> (u32, u8) {
        match category {
            0..=2 => (u32::from(category), 2),
            c => ((1 << c) - 2, c),
        }
    }

    fn put_bits(&mut self, value: u32, count: u8) {
        for i in (0..count).rev() {
            self.bit_buf = (self.bit_buf << 1) | ((value >> i) & 1);
            self.bit_count += 1;
            if self.bit_count == 8 {
                let byte = self.bit_buf as u8;
                self.out.push(byte);
                if byte == 0xFF {
                    self.out.push(0x00);
                }
                self.bit_buf = 0;
                self.bit_count = 0;
            }
        }
    }

    fn put_diff(&mut self, diff: i32) {
        if diff == 32768 {
            let (code, len) = Self::code_of(16);
            self.put_bits(code, len);
            return;
        }
        let category = (32 - diff.unsigned_abs().leading_zeros()) as u8;
        let (code, len) = Self::code_of(category);
        self.put_bits(code, len);
        if category > 0 {
            let raw = if diff >= 0 {
                diff as u32
            } else {
                (diff + (1 << category) - 1) as u32
            };
            self.put_bits(raw, category);
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.bit_count > 0 {
            let pad = 8 - self.bit_count;
            let byte = ((self.bit_buf << pad) | ((1 << pad) - 1)) as u8;
            self.out.push(byte);
            if byte == 0xFF {
                self.out.push(0x00);
            }
        }
        self.out.extend([0xFF, 0xD9]);
        self.out
    }
}
