//! Random access byte sources.
//!
//! A [`ByteSource`] is either an owned in-memory buffer
//! or a read-only memory map of a file.
//! Both variants expose the same zero-copy slicing contract,
//! so the layers above never branch on the storage class.
//! The operating system mapping is owned by the source
//! and released when the source is dropped,
//! on every exit path.

use memmap2::Mmap;
use snafu::{ensure, Backtrace, ResultExt, Snafu};
use std::fs::File;
use std::path::{Path, PathBuf};

/// An error from constructing or slicing a byte source.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The file could not be opened or read.
    #[snafu(display("Could not open file `{}`", path.display()))]
    OpenFile {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// The file could not be memory mapped.
    #[snafu(display("Could not map file `{}`", path.display()))]
    MapFile {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// The requested window does not fit in the file.
    #[snafu(display(
        "Range {}..{} does not fit in file of {} bytes",
        offset,
        offset + length,
        len
    ))]
    RangeOutOfFile {
        offset: u64,
        length: u64,
        len: u64,
        backtrace: Backtrace,
    },

    /// The requested slice falls outside the source.
    #[snafu(display(
        "Slice {}..{} out of bounds of source with {} bytes",
        offset,
        offset + length,
        len
    ))]
    OutOfBounds {
        offset: usize,
        length: usize,
        len: usize,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

enum Repr {
    /// an owned contiguous buffer
    Mem(Vec<u8>),
    /// a read-only mapping of a whole file,
    /// restricted to the given window
    Mapped {
        map: Mmap,
        offset: usize,
        length: usize,
    },
}

/// Random access bytes, from memory or from a mapped file.
pub struct ByteSource {
    repr: Repr,
}

impl std::fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.repr {
            Repr::Mem(data) => f.debug_struct("ByteSource::Mem").field("len", &data.len()).finish(),
            Repr::Mapped { offset, length, .. } => f
                .debug_struct("ByteSource::Mapped")
                .field("offset", offset)
                .field("len", length)
                .finish(),
        }
    }
}

impl ByteSource {
    /// Create a source over an owned buffer.
    pub fn from_vec(data: Vec<u8>) -> Self {
        ByteSource {
            repr: Repr::Mem(data),
        }
    }

    /// Read the whole file at `path` into memory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).context(OpenFileSnafu { path })?;
        Ok(ByteSource::from_vec(data))
    }

    /// Read the given byte range of the file at `path` into memory.
    pub fn open_range<P: AsRef<Path>>(path: P, offset: u64, length: u64) -> Result<Self> {
        use std::io::{Read, Seek, SeekFrom};

        let path = path.as_ref();
        let mut file = File::open(path).context(OpenFileSnafu { path })?;
        let file_len = file.metadata().context(OpenFileSnafu { path })?.len();
        ensure!(
            offset.checked_add(length).is_some_and(|end| end <= file_len),
            RangeOutOfFileSnafu {
                offset,
                length,
                len: file_len,
            }
        );
        file.seek(SeekFrom::Start(offset))
            .context(OpenFileSnafu { path })?;
        let mut data = vec![0; length as usize];
        file.read_exact(&mut data).context(OpenFileSnafu { path })?;
        Ok(ByteSource::from_vec(data))
    }

    /// Memory map the whole file at `path`, read-only.
    pub fn map<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).context(OpenFileSnafu { path })?;
        // safety: the mapping is read-only and the file is not mutated
        // through this process while the source is alive
        let map = unsafe { Mmap::map(&file) }.context(MapFileSnafu { path })?;
        let length = map.len();
        Ok(ByteSource {
            repr: Repr::Mapped {
                map,
                offset: 0,
                length,
            },
        })
    }

    /// Memory map the given byte range of the file at `path`.
    ///
    /// The whole file is mapped and the view restricted to the window,
    /// so the offset does not have to be page aligned;
    /// pages outside the window are simply never touched.
    pub fn map_range<P: AsRef<Path>>(path: P, offset: u64, length: u64) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).context(OpenFileSnafu { path })?;
        let file_len = file.metadata().context(OpenFileSnafu { path })?.len();
        ensure!(
            offset.checked_add(length).is_some_and(|end| end <= file_len),
            RangeOutOfFileSnafu {
                offset,
                length,
                len: file_len,
            }
        );
        // safety: as in `map`
        let map = unsafe { Mmap::map(&file) }.context(MapFileSnafu { path })?;
        Ok(ByteSource {
            repr: Repr::Mapped {
                map,
                offset: offset as usize,
                length: length as usize,
            },
        })
    }

    /// The number of accessible bytes.
    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Mem(data) => data.len(),
            Repr::Mapped { length, .. } => *length,
        }
    }

    /// Whether the source is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the whole source as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        match &self.repr {
            Repr::Mem(data) => data,
            Repr::Mapped {
                map,
                offset,
                length,
            } => &map[*offset..*offset + *length],
        }
    }

    /// Borrow a zero-copy view of the requested range.
    pub fn slice(&self, offset: usize, length: usize) -> Result<&[u8]> {
        let data = self.as_bytes();
        ensure!(
            offset
                .checked_add(length)
                .is_some_and(|end| end <= data.len()),
            OutOfBoundsSnafu {
                offset,
                length,
                len: data.len(),
            }
        );
        Ok(&data[offset..offset + length])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn slicing_in_memory() {
        let source = ByteSource::from_vec((0u8..32).collect());
        assert_eq!(source.len(), 32);
        assert_eq!(source.slice(4, 4).unwrap(), &[4, 5, 6, 7]);
        assert_eq!(source.slice(32, 0).unwrap(), &[] as &[u8]);
        assert!(source.slice(30, 4).is_err());
        assert!(source.slice(usize::MAX, 2).is_err());
    }

    #[test]
    fn mapped_and_in_memory_sources_agree() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..255).collect();
        file.write_all(&data).unwrap();
        file.flush().unwrap();

        let mapped = ByteSource::map(file.path()).unwrap();
        let in_memory = ByteSource::open(file.path()).unwrap();
        assert_eq!(mapped.as_bytes(), in_memory.as_bytes());
        assert_eq!(mapped.slice(10, 5).unwrap(), in_memory.slice(10, 5).unwrap());
    }

    #[test]
    fn mapped_ranges_restrict_the_view() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 100]).unwrap();
        file.write_all(&[7u8; 10]).unwrap();
        file.flush().unwrap();

        let source = ByteSource::map_range(file.path(), 100, 10).unwrap();
        assert_eq!(source.len(), 10);
        assert_eq!(source.as_bytes(), &[7u8; 10]);
        assert!(source.slice(5, 6).is_err());

        assert!(ByteSource::map_range(file.path(), 100, 20).is_err());
    }

    #[test]
    fn missing_file_fails_to_open() {
        let err = ByteSource::open("/no/such/file.dcm").unwrap_err();
        assert!(matches!(err, Error::OpenFile { .. }));
    }
}
