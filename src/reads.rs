use anyhow::{anyhow, bail, Context, Result};
use bytemuck::{Pod, Zeroable};

use crate::fragment::ReadId;
use crate::mmap::{Access, MappedFile};
use crate::parser::OverlapRecords;

/// Read metadata lookups. Ids outside the known range report a
/// length of 0.
pub trait ReadMetadata {
    fn num_reads(&self) -> u32;

    fn read_length(&self, id: ReadId) -> u32;

    fn library_iid(&self, id: ReadId) -> u32;

    /// Length of the overlap on read `a` implied by the hangs of an
    /// a-b overlap. Impossible geometry is reported and clamped to
    /// `[0, min(len(a), len(b))]`.
    fn overlap_length(
        &self,
        a_iid: ReadId,
        b_iid: ReadId,
        a_hang: i32,
        b_hang: i32,
    ) -> u32 {
        let alen = self.read_length(a_iid) as i64;
        let blen = self.read_length(b_iid) as i64;
        let a_hang = a_hang as i64;
        let b_hang = b_hang as i64;

        let (aovl, bovl) = if a_hang < 0 {
            //  b_hang < 0      ?     ----------  :     ----
            //                  ?  ----------     :  ----------
            if b_hang < 0 {
                (alen + b_hang, blen + a_hang)
            } else {
                (alen, blen + a_hang - b_hang)
            }
        } else {
            //  b_hang < 0      ?  ----------     :  ----------
            //                  ?     ----        :     ----------
            if b_hang < 0 {
                (alen - a_hang + b_hang, blen)
            } else {
                (alen - a_hang, blen - b_hang)
            }
        };

        if aovl <= 0 || bovl <= 0 || aovl > alen || bovl > blen {
            log::warn!(
                "bogus overlap found for A={} B={}: A len={} hang={} ovl={}, B len={} hang={} ovl={}",
                a_iid,
                b_iid,
                alen,
                a_hang,
                aovl,
                blen,
                b_hang,
                bovl
            );
        }

        aovl.max(0).min(alen.min(blen)) as u32
    }
}

/// Read lengths and library membership, indexed by read id. Index 0
/// is unused.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct ReadInfo {
    num_bases: u64,
    num_libraries: u32,
    lengths: Vec<u32>,
    libraries: Vec<u32>,
}

impl ReadInfo {
    pub fn new(num_reads: u32) -> Self {
        let size = num_reads as usize + 1;
        ReadInfo {
            num_bases: 0,
            num_libraries: 0,
            lengths: vec![0; size],
            libraries: vec![0; size],
        }
    }

    /// Reads 1..=n with the given lengths, all in library 0.
    pub fn from_lengths(lengths: &[u32]) -> Self {
        let mut info = ReadInfo::new(lengths.len() as u32);
        for (ix, len) in lengths.iter().enumerate() {
            info.set_read(ix as ReadId + 1, *len, 0);
        }
        info
    }

    pub fn from_records(records: &OverlapRecords) -> Self {
        let mut info = ReadInfo::new(records.max_read_id());
        for r in records.reads.iter() {
            info.set_read(r.id, r.length, r.library);
        }
        info
    }

    pub fn set_read(&mut self, id: ReadId, length: u32, library: u32) {
        let ix = id as usize;
        if self.lengths.len() <= ix {
            self.lengths.resize(ix + 1, 0);
            self.libraries.resize(ix + 1, 0);
        }
        self.num_bases -= self.lengths[ix] as u64;
        self.num_bases += length as u64;
        self.lengths[ix] = length;
        self.libraries[ix] = library;
        self.num_libraries = self.num_libraries.max(library.saturating_add(1));
    }

    pub fn num_bases(&self) -> u64 {
        self.num_bases
    }

    pub fn num_libraries(&self) -> u32 {
        self.num_libraries
    }

    pub fn memory_usage(&self) -> usize {
        std::mem::size_of::<u32>() * (self.lengths.len() + self.libraries.len())
    }
}

impl ReadMetadata for ReadInfo {
    fn num_reads(&self) -> u32 {
        self.lengths.len().saturating_sub(1) as u32
    }

    fn read_length(&self, id: ReadId) -> u32 {
        self.lengths.get(id as usize).copied().unwrap_or(0)
    }

    fn library_iid(&self, id: ReadId) -> u32 {
        self.libraries.get(id as usize).copied().unwrap_or(0)
    }
}

const STORE_MAGIC: [u8; 8] = *b"BOGREADS";

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct StoreHeader {
    magic: [u8; 8],
    num_reads: u32,
    num_libraries: u32,
    num_bases: u64,
}

const HEADER_SIZE: usize = std::mem::size_of::<StoreHeader>();

/// Binary read store: a header followed by the length array and the
/// library array, both `num_reads + 1` native-endian u32s.
impl ReadInfo {
    pub fn save_store<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let array_bytes = self.lengths.len() * std::mem::size_of::<u32>();
        let total = HEADER_SIZE + 2 * array_bytes;

        let mut mapped = MappedFile::create(path.as_ref(), total)?;

        let header = StoreHeader {
            magic: STORE_MAGIC,
            num_reads: self.num_reads(),
            num_libraries: self.num_libraries,
            num_bases: self.num_bases,
        };

        mapped
            .get_mut(0, HEADER_SIZE)?
            .copy_from_slice(bytemuck::bytes_of(&header));
        mapped
            .get_next_mut(array_bytes)?
            .copy_from_slice(bytemuck::cast_slice(&self.lengths[..]));
        mapped
            .get_next_mut(array_bytes)?
            .copy_from_slice(bytemuck::cast_slice(&self.libraries[..]));

        mapped.flush()?;
        Ok(())
    }

    pub fn load_store<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let mut mapped = MappedFile::open(path.as_ref(), Access::ReadOnly)?;

        let header: StoreHeader =
            *bytemuck::try_from_bytes(mapped.get(0, HEADER_SIZE)?).map_err(
                |e| anyhow!("Misaligned read store header: {:?}", e),
            )?;

        if header.magic != STORE_MAGIC {
            bail!("{} is not a read store", path.as_ref().display());
        }

        let count = header.num_reads as usize + 1;
        let array_bytes = count * std::mem::size_of::<u32>();

        let lengths: Vec<u32> = bytemuck::try_cast_slice::<u8, u32>(
            mapped.get_next(array_bytes).context("Truncated length array")?,
        )
        .map_err(|e| anyhow!("Misaligned length array: {:?}", e))?
        .to_vec();

        let libraries: Vec<u32> = bytemuck::try_cast_slice::<u8, u32>(
            mapped.get_next(array_bytes).context("Truncated library array")?,
        )
        .map_err(|e| anyhow!("Misaligned library array: {:?}", e))?
        .to_vec();

        log::debug!(
            "Loaded {} reads ({} bases) from {}",
            header.num_reads,
            header.num_bases,
            path.as_ref().display()
        );

        Ok(ReadInfo {
            num_bases: header.num_bases,
            num_libraries: header.num_libraries,
            lengths,
            libraries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_length_from_hangs() {
        let info = ReadInfo::from_lengths(&[1000, 1000, 300]);

        // dovetail, B hangs off the right end of A
        assert_eq!(200, info.overlap_length(1, 2, 800, 800));
        // B contained in A
        assert_eq!(300, info.overlap_length(1, 3, 200, -500));
        // A contained in B
        assert_eq!(1000, info.overlap_length(1, 2, -100, 100));
    }

    #[test]
    fn bogus_overlaps_are_clamped() {
        let info = ReadInfo::from_lengths(&[1000, 1000]);

        // hang longer than the read, no real overlap
        assert_eq!(0, info.overlap_length(1, 2, 1200, 1200));
        // unknown partner
        assert_eq!(0, info.overlap_length(1, 9, 100, 100));
    }

    #[test]
    fn metadata_lookup() {
        let mut info = ReadInfo::new(2);
        info.set_read(1, 500, 0);
        info.set_read(2, 700, 3);
        info.set_read(5, 100, 1);

        assert_eq!(5, info.num_reads());
        assert_eq!(700, info.read_length(2));
        assert_eq!(3, info.library_iid(2));
        assert_eq!(0, info.read_length(4));
        assert_eq!(0, info.read_length(99));
        assert_eq!(1300, info.num_bases());
        assert_eq!(4, info.num_libraries());

        info.set_read(2, 300, 3);
        assert_eq!(900, info.num_bases());
    }

    #[test]
    fn largest_library_id_saturates() {
        let mut info = ReadInfo::new(1);
        info.set_read(1, 100, u32::MAX);
        assert_eq!(u32::MAX, info.library_iid(1));
        assert_eq!(u32::MAX, info.num_libraries());
    }

    #[test]
    fn store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reads.store");

        let mut info = ReadInfo::from_lengths(&[1000, 1200, 300, 900]);
        info.set_read(3, 300, 2);

        info.save_store(&path).unwrap();
        let loaded = ReadInfo::load_store(&path).unwrap();

        assert_eq!(info, loaded);
        assert_eq!(300, loaded.read_length(3));
        assert_eq!(2, loaded.library_iid(3));
    }

    #[test]
    fn store_rejects_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not_a_store");
        std::fs::write(&path, vec![b'x'; 64]).unwrap();

        assert!(ReadInfo::load_store(&path).is_err());
    }
}
