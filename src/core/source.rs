// Read-only byte sources.
//
// A `ByteSource` is either a memory-mapped file or owned bytes, presented as
// one contiguous read-only view. Row views and chunk slices borrow from it;
// the source must outlive everything derived from it.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::error::Result;

pub enum ByteSource {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl ByteSource {
    /// Memory-map a file. The mapping assumes the file is not truncated
    /// while the source is alive.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let map = unsafe { Mmap::map(&file)? };
        Ok(ByteSource::Mapped(map))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        ByteSource::Owned(bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ByteSource::Mapped(map) => map,
            ByteSource::Owned(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

impl From<Vec<u8>> for ByteSource {
    fn from(bytes: Vec<u8>) -> Self {
        ByteSource::Owned(bytes)
    }
}

impl From<String> for ByteSource {
    fn from(s: String) -> Self {
        ByteSource::Owned(s.into_bytes())
    }
}

impl AsRef<[u8]> for ByteSource {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_owned_source() {
        let src = ByteSource::from_bytes(b"a,b\n".to_vec());
        assert_eq!(src.as_bytes(), b"a,b\n");
        assert_eq!(src.len(), 4);
        assert!(!src.is_empty());
    }

    #[test]
    fn test_mapped_source() {
        let dir = std::env::temp_dir();
        let path = dir.join("turbocsv_source_test.csv");
        {
            let mut f = File::create(&path).unwrap();
            f.write_all(b"x,y\n1,2\n").unwrap();
        }
        let src = ByteSource::open(&path).unwrap();
        assert_eq!(src.as_bytes(), b"x,y\n1,2\n");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_open_missing_file_is_io_error() {
        let err = ByteSource::open("/definitely/not/here.csv");
        assert!(matches!(err, Err(crate::error::Error::Io { .. })));
    }
}
