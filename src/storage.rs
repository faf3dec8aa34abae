//! The sector I/O port this crate consumes, plus two small `Storage`
//! implementations (`RamDisk`, `FileBackedStorage`) used by tests, the
//! bundled CLI, and downstream integration tests.
//!
//! The SD controller driver, RAM-disk shim, or per-platform block
//! adaptor a real embedded caller plugs in here is deliberately out of
//! scope for this crate (see spec Non-goals) - this module only defines
//! the seam.

use core::fmt::Debug;

use generic_array::{ArrayLength, GenericArray};
use typenum::marker_traits::Unsigned;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum WriteError<T> {
    /// The requested LBA falls outside the device.
    OutOfRange { requested_lba: u32 },
    Other(T),
}

impl<T> From<T> for WriteError<T> {
    fn from(other: T) -> Self {
        WriteError::Other(other)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ReadError<T> {
    /// The requested LBA falls outside the device.
    OutOfRange { requested_lba: u32 },
    Other(T),
}

impl<T> From<T> for ReadError<T> {
    fn from(other: T) -> Self {
        ReadError::Other(other)
    }
}

/// Implementors provide synchronous, fixed-size-sector access to some
/// block device or a region (partition) of one.
///
/// There is deliberately no `erase`: every write this crate issues goes
/// through `write_sector` one sector at a time (see spec 5, "Ordering")
/// so a partially-written image is always diagnosable sector-by-sector.
pub trait Storage {
    #[allow(non_camel_case_types)]
    type SECTOR_SIZE: ArrayLength<u8> + Unsigned;

    type Err: Debug;

    /// Number of sectors addressable on this device (or partition).
    fn sector_count(&self) -> u32;

    fn read_sector(
        &mut self,
        lba: u32,
        buffer: &mut GenericArray<u8, Self::SECTOR_SIZE>,
    ) -> Result<(), ReadError<Self::Err>>;

    fn write_sector(
        &mut self,
        lba: u32,
        buffer: &GenericArray<u8, Self::SECTOR_SIZE>,
    ) -> Result<(), WriteError<Self::Err>>;

    /// Bulk write helper matching the external sector-I/O-port interface
    /// (`write_sectors(lba, count, buf)` in the spec); every call this
    /// crate's planners make goes through `write_sector` directly, but a
    /// caller's own port can expose this for symmetry with the spec.
    fn write_sectors(
        &mut self,
        lba: u32,
        buffers: &[GenericArray<u8, Self::SECTOR_SIZE>],
    ) -> Result<(), WriteError<Self::Err>> {
        for (i, buf) in buffers.iter().enumerate() {
            self.write_sector(lba + i as u32, buf)?;
        }
        Ok(())
    }

    fn sector_size(&self) -> u16 {
        Self::SECTOR_SIZE::to_u16()
    }
}

#[cfg(not(feature = "no_std"))]
pub use self::std_impls::{FileBackedStorage, RamDisk};

#[cfg(not(feature = "no_std"))]
mod std_impls {
    use super::*;

    use std::convert::Infallible;
    use std::fs::{File, OpenOptions};
    use std::io::{self, Read, Seek, SeekFrom, Write};
    use std::path::Path;

    use typenum::consts::U512;

    /// An all-in-memory `Storage`, used by unit and property tests.
    #[derive(Debug, Clone)]
    pub struct RamDisk {
        bytes: Vec<u8>,
        sector_count: u32,
    }

    impl RamDisk {
        pub fn new(sector_count: u32) -> Self {
            Self {
                bytes: vec![0u8; sector_count as usize * 512],
                sector_count,
            }
        }

        pub fn as_bytes(&self) -> &[u8] {
            &self.bytes
        }
    }

    impl Storage for RamDisk {
        type SECTOR_SIZE = U512;
        type Err = Infallible;

        fn sector_count(&self) -> u32 {
            self.sector_count
        }

        fn read_sector(
            &mut self,
            lba: u32,
            buffer: &mut GenericArray<u8, U512>,
        ) -> Result<(), ReadError<Infallible>> {
            if lba >= self.sector_count {
                return Err(ReadError::OutOfRange { requested_lba: lba });
            }
            let start = lba as usize * 512;
            buffer.as_mut_slice().copy_from_slice(&self.bytes[start..start + 512]);
            Ok(())
        }

        fn write_sector(
            &mut self,
            lba: u32,
            buffer: &GenericArray<u8, U512>,
        ) -> Result<(), WriteError<Infallible>> {
            if lba >= self.sector_count {
                return Err(WriteError::OutOfRange { requested_lba: lba });
            }
            let start = lba as usize * 512;
            self.bytes[start..start + 512].copy_from_slice(buffer.as_slice());
            Ok(())
        }
    }

    /// A `Storage` backed by a regular file or block device node, used by
    /// the bundled `fatfmt` CLI and by integration tests.
    #[derive(Debug)]
    pub struct FileBackedStorage {
        file: File,
        sector_count: u32,
    }

    impl FileBackedStorage {
        pub fn from_file(path: impl AsRef<Path>) -> io::Result<Self> {
            let file = OpenOptions::new().read(true).write(true).open(path)?;
            let len = file.metadata()?.len();
            Ok(Self {
                file,
                sector_count: (len / 512) as u32,
            })
        }

        pub fn from_file_with_explicit_size(path: impl AsRef<Path>, sector_count: u32) -> io::Result<Self> {
            let file = OpenOptions::new().read(true).write(true).open(path)?;
            Ok(Self { file, sector_count })
        }
    }

    impl Storage for FileBackedStorage {
        type SECTOR_SIZE = U512;
        type Err = io::Error;

        fn sector_count(&self) -> u32 {
            self.sector_count
        }

        fn read_sector(
            &mut self,
            lba: u32,
            buffer: &mut GenericArray<u8, U512>,
        ) -> Result<(), ReadError<io::Error>> {
            if lba >= self.sector_count {
                return Err(ReadError::OutOfRange { requested_lba: lba });
            }
            self.file
                .seek(SeekFrom::Start(lba as u64 * 512))
                .map_err(ReadError::Other)?;
            self.file.read_exact(buffer.as_mut_slice()).map_err(ReadError::Other)?;
            Ok(())
        }

        fn write_sector(
            &mut self,
            lba: u32,
            buffer: &GenericArray<u8, U512>,
        ) -> Result<(), WriteError<io::Error>> {
            if lba >= self.sector_count {
                return Err(WriteError::OutOfRange { requested_lba: lba });
            }
            self.file
                .seek(SeekFrom::Start(lba as u64 * 512))
                .map_err(WriteError::Other)?;
            self.file.write_all(buffer.as_slice()).map_err(WriteError::Other)?;
            Ok(())
        }
    }
}
