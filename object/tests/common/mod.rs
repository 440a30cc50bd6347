//! Test support: building synthetic DICOM files in memory.

/// A little builder of DICOM Part 10 files for tests.
/// The meta group is always explicit VR little endian;
/// data set elements follow the given transfer syntax.
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

/// A complete little 16-bit grayscale CT image
/// with identifying attributes and a gradient pixel pattern.
pub fn sample_ct(rows: u16, columns: u16) -> Vec<u8> {
    let pixels: Vec<u8> = (0..u32::from(rows))
        .flat_map(|r| (0..u32::from(columns)).map(move |c| ((r + c) & 0xFFFF) as u16))
        .flat_map(|s| s.to_le_bytes())
        .collect();

    FileBuilder::new("1.2.840.10008.1.2.1")
        .element_str(0x0008, 0x0018, "UI", "1.2.3.4.100")
        .element_str(0x0008, 0x0060, "CS", "CT")
        .element_str(0x0010, 0x0010, "PN", "Doe^John")
        .element_str(0x0010, 0x0020, "LO", "PAT001")
        .element_str(0x0018, 0x0050, "DS", "2.5")
        .element_str(0x0020, 0x000D, "UI", "1.2.3.4.1")
        .element_str(0x0020, 0x000E, "UI", "1.2.3.4.2")
        .element_u16s(0x0028, 0x0002, "US", &[1])
        .element_str(0x0028, 0x0004, "CS", "MONOCHROME2")
        .element_u16s(0x0028, 0x0010, "US", &[rows])
        .element_u16s(0x0028, 0x0011, "US", &[columns])
        .element_str(0x0028, 0x0030, "DS", "0.75\\0.5")
        .element_u16s(0x0028, 0x0100, "US", &[16])
        .element_u16s(0x0028, 0x0101, "US", &[12])
        .element_u16s(0x0028, 0x0102, "US", &[11])
        .element_u16s(0x0028, 0x0103, "US", &[0])
        .element_str(0x0028, 0x1050, "DS", "40")
        .element_str(0x0028, 0x1051, "DS", "400")
        .element_str(0x0028, 0x1052, "DS", "-1024")
        .element_str(0x0028, 0x1053, "DS", "1")
        .element_bytes(0x7FE0, 0x0010, "OW", &pixels)
        .build()
}
