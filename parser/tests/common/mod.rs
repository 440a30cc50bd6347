//! Test support: building synthetic DICOM files in memory.

/// A little builder of DICOM Part 10 files for tests.
///
/// The meta group is always written in explicit VR little endian;
/// main data set elements follow the byte order and VR mode
/// derived from the transfer syntax UID.
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

    /// Append a text element, padded to even length.
    pub fn element_str(mut self, group: u16, elem: u16, vr: &str, value: &str) -> Self {
        let mut bytes = value.as_bytes().to_vec();
        if bytes.len() % 2 == 1 {
            bytes.push(if vr == "UI" { 0 } else { b' ' });
        }
        self.push_header(group, elem, vr, bytes.len() as u32);
        self.body.extend(bytes);
        self
    }

    /// Append a binary element of 16-bit values.
    pub fn element_u16s(mut self, group: u16, elem: u16, vr: &str, values: &[u16]) -> Self {
        self.push_header(group, elem, vr, (values.len() * 2) as u32);
        for &value in values {
            self.push_u16(value);
        }
        self
    }

    /// Append an element with a raw byte payload.
    pub fn element_bytes(mut self, group: u16, elem: u16, vr: &str, bytes: &[u8]) -> Self {
        self.push_header(group, elem, vr, bytes.len() as u32);
        self.body.extend(bytes);
        self
    }

    /// Append an element header with an arbitrary declared length
    /// and no value bytes. For malformed-file tests.
    pub fn element_header_only(mut self, group: u16, elem: u16, vr: &str, len: u32) -> Self {
        self.push_header(group, elem, vr, len);
        self
    }

    /// Append arbitrary bytes to the data set body.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.body.extend(bytes);
        self
    }

    /// Append `levels` sequence elements of undefined length,
    /// each wrapping one item holding the next level,
    /// with a single short element innermost.
    pub fn nested_sequences(mut self, levels: usize) -> Self {
        for _ in 0..levels {
            self.push_header(0x0008, 0x1140, "SQ", 0xFFFF_FFFF);
            self.push_u16(0xFFFE);
            self.push_u16(0xE000);
            self.push_u32(0xFFFF_FFFF);
        }
        self = self.element_str(0x0008, 0x0060, "CS", "OT");
        for _ in 0..levels {
            self.push_u16(0xFFFE);
            self.push_u16(0xE00D);
            self.push_u32(0);
            self.push_u16(0xFFFE);
            self.push_u16(0xE0DD);
            self.push_u32(0);
        }
        self
    }

    /// Assemble the Part 10 file: preamble, magic, meta group, data set.
    pub fn build(self) -> Vec<u8> {
        let mut meta = Vec::new();
        let uid = {
            let mut bytes = self.ts_uid.as_bytes().to_vec();
            if bytes.len() % 2 == 1 {
                bytes.push(0);
            }
            bytes
        };
        // (0002,0010) transfer syntax UID, explicit VR little endian
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

/// The standard image description elements of a 16-bit grayscale image.
pub fn grayscale_image(builder: FileBuilder, rows: u16, columns: u16) -> FileBuilder {
    builder
        .element_str(0x0008, 0x0060, "CS", "CT")
        .element_str(0x0010, 0x0010, "PN", "Doe^John")
        .element_u16s(0x0028, 0x0002, "US", &[1])
        .element_str(0x0028, 0x0004, "CS", "MONOCHROME2")
        .element_u16s(0x0028, 0x0010, "US", &[rows])
        .element_u16s(0x0028, 0x0011, "US", &[columns])
        .element_u16s(0x0028, 0x0100, "US", &[16])
        .element_u16s(0x0028, 0x0101, "US", &[16])
        .element_u16s(0x0028, 0x0102, "US", &[15])
        .element_u16s(0x0028, 0x0103, "US", &[0])
}

/// Pixel samples of the reference test pattern:
/// `(row + column) & 0xFFFF` in row-major order.
pub fn gradient_samples(rows: u16, columns: u16) -> Vec<u16> {
    (0..u32::from(rows))
        .flat_map(|r| (0..u32::from(columns)).map(move |c| ((r + c) & 0xFFFF) as u16))
        .collect()
}
