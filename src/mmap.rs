use anyhow::{bail, Context, Result};

use memmap::{Mmap, MmapMut};

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// What a mapping is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

enum Mapping {
    ReadOnly(Mmap),
    ReadWrite(MmapMut),
}

impl Mapping {
    fn bytes(&self) -> &[u8] {
        match self {
            Mapping::ReadOnly(m) => m.as_ref(),
            Mapping::ReadWrite(m) => m.as_ref(),
        }
    }
}

/// A whole file mapped into memory, handing out byte ranges of it.
/// `get` and friends remember where the last request ended, so
/// consecutive records can be read with `get_next`. The mapping is
/// released when the value is dropped.
pub struct MappedFile {
    path: PathBuf,
    mapping: Mapping,
    cursor: usize,
}

impl MappedFile {
    pub fn open<P: AsRef<Path>>(path: P, access: Access) -> Result<Self> {
        let path = path.as_ref();

        let file = match access {
            Access::ReadOnly => File::open(path),
            Access::ReadWrite => {
                OpenOptions::new().read(true).write(true).open(path)
            }
        }
        .with_context(|| {
            format!("Couldn't open '{}' for mapping", path.display())
        })?;

        Self::map(path, &file, access)
    }

    /// Create (or truncate) `path` to `length` bytes and map it for
    /// writing.
    pub fn create<P: AsRef<Path>>(path: P, length: usize) -> Result<Self> {
        let path = path.as_ref();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_context(|| {
                format!("Couldn't create '{}' for mapping", path.display())
            })?;
        file.set_len(length as u64)?;

        Self::map(path, &file, Access::ReadWrite)
    }

    fn map(path: &Path, file: &File, access: Access) -> Result<Self> {
        let length = file.metadata()?.len();
        if length == 0 {
            bail!("Couldn't map '{}': file is empty", path.display());
        }

        let mapping = match access {
            Access::ReadOnly => Mapping::ReadOnly(unsafe { Mmap::map(file)? }),
            Access::ReadWrite => {
                Mapping::ReadWrite(unsafe { MmapMut::map_mut(file)? })
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            mapping,
            cursor: 0,
        })
    }

    pub fn access(&self) -> Access {
        match self.mapping {
            Mapping::ReadOnly(_) => Access::ReadOnly,
            Mapping::ReadWrite(_) => Access::ReadWrite,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.mapping.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Validates a request and moves the cursor past it. A length of
    /// 0 means everything from `offset` to the end of the file.
    fn claim(&mut self, offset: usize, length: usize) -> Result<(usize, usize)> {
        let file_len = self.len();
        let length = if length == 0 {
            file_len.saturating_sub(offset)
        } else {
            length
        };

        if offset.checked_add(length).map_or(true, |end| end > file_len) {
            bail!(
                "Requested {} bytes at position {} in file '{}', but only {} bytes in file",
                length,
                offset,
                self.path.display(),
                file_len
            );
        }

        self.cursor = offset + length;
        Ok((offset, offset + length))
    }

    pub fn get(&mut self, offset: usize, length: usize) -> Result<&[u8]> {
        let (start, end) = self.claim(offset, length)?;
        Ok(&self.mapping.bytes()[start..end])
    }

    pub fn get_next(&mut self, length: usize) -> Result<&[u8]> {
        self.get(self.cursor, length)
    }

    pub fn get_mut(&mut self, offset: usize, length: usize) -> Result<&mut [u8]> {
        if self.access() != Access::ReadWrite {
            bail!("'{}' is mapped read-only", self.path.display());
        }
        let (start, end) = self.claim(offset, length)?;
        match &mut self.mapping {
            Mapping::ReadWrite(m) => Ok(&mut m[start..end]),
            Mapping::ReadOnly(_) => {
                bail!("'{}' is mapped read-only", self.path.display())
            }
        }
    }

    pub fn get_next_mut(&mut self, length: usize) -> Result<&mut [u8]> {
        self.get_mut(self.cursor, length)
    }

    /// Writes modified pages back to the file.
    pub fn flush(&self) -> Result<()> {
        if let Mapping::ReadWrite(m) = &self.mapping {
            m.flush().with_context(|| {
                format!("Couldn't flush '{}'", self.path.display())
            })?;
        }
        Ok(())
    }
}

impl AsRef<[u8]> for MappedFile {
    fn as_ref(&self) -> &[u8] {
        self.mapping.bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(contents: &[u8]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapped.bin");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn cursor_follows_requests() {
        let (_dir, path) = scratch_file(b"0123456789");
        let mut mapped = MappedFile::open(&path, Access::ReadOnly).unwrap();

        assert_eq!(10, mapped.len());
        assert_eq!(b"234", mapped.get(2, 3).unwrap());
        assert_eq!(5, mapped.position());
        assert_eq!(b"56", mapped.get_next(2).unwrap());
        // zero length reads to the end
        assert_eq!(b"789", mapped.get_next(0).unwrap());
        assert_eq!(b"0123456789", mapped.get(0, 0).unwrap());
    }

    #[test]
    fn out_of_range_requests_fail() {
        let (_dir, path) = scratch_file(b"0123456789");
        let mut mapped = MappedFile::open(&path, Access::ReadOnly).unwrap();

        assert!(mapped.get(8, 3).is_err());
        assert!(mapped.get(11, 0).is_err());
        assert!(mapped.get(usize::MAX, 2).is_err());
        // failed requests leave the cursor alone
        assert_eq!(0, mapped.position());
    }

    #[test]
    fn read_only_mappings_refuse_writes() {
        let (_dir, path) = scratch_file(b"abcdef");
        let mut mapped = MappedFile::open(&path, Access::ReadOnly).unwrap();
        assert_eq!(Access::ReadOnly, mapped.access());
        assert!(mapped.get_mut(0, 2).is_err());
    }

    #[test]
    fn writes_reach_the_file() {
        let (_dir, path) = scratch_file(b"abcdef");
        {
            let mut mapped =
                MappedFile::open(&path, Access::ReadWrite).unwrap();
            mapped.get_mut(1, 2).unwrap().copy_from_slice(b"XY");
            mapped.get_next_mut(1).unwrap()[0] = b'Z';
            mapped.flush().unwrap();
        }
        assert_eq!(b"aXYZef".to_vec(), std::fs::read(&path).unwrap());
    }

    #[test]
    fn empty_files_are_not_mapped() {
        let (_dir, path) = scratch_file(b"");
        assert!(MappedFile::open(&path, Access::ReadOnly).is_err());
    }
}
