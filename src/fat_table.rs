//! FAT table initializer (spec 4.4).
//!
//! Writes both FAT copies sector-by-sector: sector 0 of each copy gets
//! the reserved sentinel entries, every other sector is zeroed. Nothing
//! here ever walks a cluster chain - allocation and cluster-chain
//! mutation are out of scope (see `spec.md` Non-goals).

use generic_array::{ArrayLength, GenericArray};
use log::trace;
use typenum::marker_traits::Unsigned;

use crate::error::FormatError;
use crate::geometry::{FatType, GeometryPlan};

fn render_fat_sector_0(buf: &mut [u8], fat_type: FatType) {
    for b in buf.iter_mut() {
        *b = 0;
    }
    match fat_type {
        FatType::Fat16 => {
            buf[0..2].copy_from_slice(&0xFFF8u16.to_le_bytes());
            buf[2..4].copy_from_slice(&0xFFFFu16.to_le_bytes());
        }
        FatType::Fat32 => {
            buf[0..4].copy_from_slice(&0x0FFF_FFF8u32.to_le_bytes());
            buf[4..8].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
            buf[8..12].copy_from_slice(&0x0FFF_FFFFu32.to_le_bytes());
        }
    }
}

/// Writes both FAT copies at `plan.fat_begin_lba()` and
/// `plan.fat_begin_lba() + plan.sectors_per_fat`, one sector per call to
/// `storage.write_sector`. Aborts on the first write failure, per spec
/// 4.4's "write failures abort immediately".
pub fn write_fat_tables<S, E>(
    storage: &mut impl crate::storage::Storage<SECTOR_SIZE = S, Err = E>,
    plan: &GeometryPlan,
) -> Result<(), FormatError<E>>
where
    S: ArrayLength<u8> + Unsigned,
    E: core::fmt::Debug,
{
    let mut sector_0: GenericArray<u8, S> = GenericArray::default();
    render_fat_sector_0(sector_0.as_mut_slice(), plan.fat_type);

    let zero: GenericArray<u8, S> = GenericArray::default();

    for copy in 0..2u32 {
        let begin = plan.fat_begin_lba() + copy * plan.sectors_per_fat;
        trace!("writing FAT copy {copy} at lba {begin}, {} sectors", plan.sectors_per_fat);

        storage
            .write_sector(begin, &sector_0)
            .map_err(|e| FormatError::from_write(begin, e))?;

        for i in 1..plan.sectors_per_fat {
            let lba = begin + i;
            storage.write_sector(lba, &zero).map_err(|e| FormatError::from_write(lba, e))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{plan, GeometryHints};
    use crate::storage::RamDisk;

    #[test]
    fn fat16_sentinels_and_zero_fill() {
        let geom = plan(131_072, 0, GeometryHints { prefer_fat16: true, small_clusters: false }, 512).unwrap();
        let mut disk = RamDisk::new(131_072);
        write_fat_tables(&mut disk, &geom).unwrap();

        let bytes = disk.as_bytes();
        let begin = geom.fat_begin_lba() as usize * 512;
        assert_eq!(&bytes[begin..begin + 2], &0xFFF8u16.to_le_bytes());
        assert_eq!(&bytes[begin + 2..begin + 4], &0xFFFFu16.to_le_bytes());
        assert!(bytes[begin + 4..begin + 512].iter().all(|&b| b == 0));

        let second_copy = begin + geom.sectors_per_fat as usize * 512;
        assert_eq!(&bytes[second_copy..second_copy + 2], &0xFFF8u16.to_le_bytes());
    }

    #[test]
    fn fat32_sentinels_terminate_root_cluster() {
        let geom = plan(2_097_152, 2048, GeometryHints { prefer_fat16: false, small_clusters: false }, 512).unwrap();
        let mut disk = RamDisk::new(2_097_152);
        write_fat_tables(&mut disk, &geom).unwrap();

        let bytes = disk.as_bytes();
        let begin = geom.fat_begin_lba() as usize * 512;
        assert_eq!(&bytes[begin..begin + 4], &0x0FFF_FFF8u32.to_le_bytes());
        assert_eq!(&bytes[begin + 4..begin + 8], &0xFFFF_FFFFu32.to_le_bytes());
        assert_eq!(&bytes[begin + 8..begin + 12], &0x0FFF_FFFFu32.to_le_bytes());
    }
}
