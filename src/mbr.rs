//! MBR / EBR writer (spec 4.7).
//!
//! Writes one partition-table sector at LBA 0 (primaries, plus an
//! extended entry if needed) and, when logicals are present, an EBR
//! chain inside the extended partition. GPT is explicitly out of scope
//! (see `spec.md` Non-goals).

use generic_array::{ArrayLength, GenericArray};
use log::debug;
use typenum::marker_traits::Unsigned;

use crate::config::{PARTITION_ACTIVE, PARTITION_ID_EXTENDED, PARTITION_ID_FAT32_LBA};
use crate::error::FormatError;
use crate::partition::PartitionPlan;

const OEM_HEADER: [u8; 3] = *b"\xEB\x3C\x90";
const PARTITION_TABLE_OFFSET: usize = 0x1BE;
const ENTRY_LEN: usize = 16;

/// One 16-byte MBR/EBR partition-table entry, per spec 4.7.
struct PartitionEntry {
    active: u8,
    id: u8,
    start_lba: u32,
    length: u32,
}

impl PartitionEntry {
    const EMPTY: PartitionEntry = PartitionEntry { active: 0, id: 0, start_lba: 0, length: 0 };

    fn write(&self, buf: &mut [u8]) {
        buf[0] = self.active;
        // CHS fields are placeholders; the LBA fields below are
        // authoritative for modern consumers, per spec 4.7.
        buf[1] = 1; // start_head
        buf[2] = 1; // start_sec_track
        buf[3] = 0; // start_cyl
        buf[4] = self.id;
        buf[5] = 0xFE; // end_head
        buf[6] = (self.length.min(0xFF)) as u8; // end_sec_track placeholder
        buf[7] = 0; // end_cyl
        buf[8..12].copy_from_slice(&self.start_lba.to_le_bytes());
        buf[12..16].copy_from_slice(&self.length.to_le_bytes());
    }
}

fn write_signature(buf: &mut [u8]) {
    let len = buf.len();
    buf[len - 2] = 0x55;
    buf[len - 1] = 0xAA;
}

fn zero_partition_table(buf: &mut [u8]) {
    for b in buf.iter_mut() {
        *b = 0;
    }
    buf[0..3].copy_from_slice(&OEM_HEADER);
}

/// One primary partition entry as read back from LBA 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionTableEntry {
    pub active: bool,
    pub id: u8,
    pub start_lba: u32,
    pub sector_count: u32,
}

/// The up-to-4 primary partitions read back from LBA 0. Logical
/// partitions inside an extended partition are not enumerated here -
/// `format` only ever targets a primary `partition_index`, matching the
/// way the teacher's `FatFs::mount` reads a single `PartitionEntry`
/// rather than walking an EBR chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionTable {
    entries: [PartitionTableEntry; 4],
    len: usize,
}

impl PartitionTable {
    pub fn get(&self, index: usize) -> Option<&PartitionTableEntry> {
        self.entries[..self.len].get(index)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Reads the 4 primary partition-table entries from LBA 0, per spec 4.7
/// ("four 16-byte partition-table entries at offset 0x1BE"). Stops at
/// the first entry with `id == 0` (empty slot).
pub fn read_partition_table<S, E>(
    storage: &mut impl crate::storage::Storage<SECTOR_SIZE = S, Err = E>,
) -> Result<PartitionTable, FormatError<E>>
where
    S: ArrayLength<u8> + Unsigned,
    E: core::fmt::Debug,
{
    let mut mbr: GenericArray<u8, S> = GenericArray::default();
    storage.read_sector(0, &mut mbr).map_err(|e| FormatError::from_read(0, e))?;

    let empty = PartitionTableEntry { active: false, id: 0, start_lba: 0, sector_count: 0 };
    let mut entries = [empty; 4];
    let mut len = 0;

    for (i, entry) in entries.iter_mut().enumerate() {
        let off = PARTITION_TABLE_OFFSET + i * ENTRY_LEN;
        let buf = mbr.as_slice();
        let id = buf[off + 4];
        if id == 0 {
            break;
        }
        *entry = PartitionTableEntry {
            active: buf[off] == PARTITION_ACTIVE,
            id,
            start_lba: u32::from_le_bytes(buf[off + 8..off + 12].try_into().unwrap()),
            sector_count: u32::from_le_bytes(buf[off + 12..off + 16].try_into().unwrap()),
        };
        len += 1;
    }

    Ok(PartitionTable { entries, len })
}

/// Every FAT partition entry this crate writes is active (`0x80`) and
/// typed `0x0B` (FAT32 LBA) - preserved as-is per DESIGN.md even though a
/// real multi-partition disk would normally mark only one partition
/// active; the spec does not give `format`/`partition` enough
/// information (which partition the caller intends to boot from) to do
/// otherwise, and "no retry, no heuristics" is the stated policy.
fn entry_for_slot(slot: &crate::partition::PartitionSlot) -> PartitionEntry {
    PartitionEntry {
        active: PARTITION_ACTIVE,
        id: PARTITION_ID_FAT32_LBA,
        start_lba: slot.start_lba,
        length: slot.sector_count,
    }
}

/// Writes the MBR (and, if `plan.needs_extended`, the EBR chain) for
/// `plan` to `storage`. `total_sectors` is the whole-disk sector count
/// (`T` in spec 4.6), needed for the extended partition's `length`.
pub fn write_partition_table<S, E>(
    storage: &mut impl crate::storage::Storage<SECTOR_SIZE = S, Err = E>,
    plan: &PartitionPlan,
    total_sectors: u32,
) -> Result<(), FormatError<E>>
where
    S: ArrayLength<u8> + Unsigned,
    E: core::fmt::Debug,
{
    let slots = plan.slots();
    let mut mbr: GenericArray<u8, S> = GenericArray::default();
    zero_partition_table(mbr.as_mut_slice());

    if !plan.needs_extended {
        debug!("writing primary-only MBR with {} entries", slots.len());
        for (i, slot) in slots.iter().enumerate().take(4) {
            let off = PARTITION_TABLE_OFFSET + i * ENTRY_LEN;
            entry_for_slot(slot).write(&mut mbr.as_mut_slice()[off..off + ENTRY_LEN]);
        }
        write_signature(mbr.as_mut_slice());
        return storage.write_sector(0, &mbr).map_err(|e| FormatError::from_write(0, e));
    }

    debug!(
        "writing extended MBR: {} primaries, {} logicals from lba {}",
        plan.primary_count,
        slots.len() - plan.primary_count,
        plan.extended_start_lba
    );

    for (i, slot) in slots[..plan.primary_count].iter().enumerate() {
        let off = PARTITION_TABLE_OFFSET + i * ENTRY_LEN;
        entry_for_slot(slot).write(&mut mbr.as_mut_slice()[off..off + ENTRY_LEN]);
    }
    let extended_entry = PartitionEntry {
        active: 0,
        id: PARTITION_ID_EXTENDED,
        start_lba: plan.extended_start_lba,
        length: total_sectors.saturating_sub(plan.extended_start_lba),
    };
    let ext_off = PARTITION_TABLE_OFFSET + plan.primary_count * ENTRY_LEN;
    extended_entry.write(&mut mbr.as_mut_slice()[ext_off..ext_off + ENTRY_LEN]);
    write_signature(mbr.as_mut_slice());
    storage.write_sector(0, &mbr).map_err(|e| FormatError::from_write(0, e))?;

    let logicals = &slots[plan.primary_count..];
    let mut ebr_lba = plan.extended_start_lba;

    for (i, slot) in logicals.iter().enumerate() {
        let mut ebr: GenericArray<u8, S> = GenericArray::default();
        zero_partition_table(ebr.as_mut_slice());

        let logical = PartitionEntry {
            active: PARTITION_ACTIVE,
            id: PARTITION_ID_FAT32_LBA,
            start_lba: plan.inter_space,
            length: slot.sector_count,
        };
        logical.write(&mut ebr.as_mut_slice()[PARTITION_TABLE_OFFSET..PARTITION_TABLE_OFFSET + ENTRY_LEN]);

        if let Some(next_slot) = logicals.get(i + 1) {
            let next_ebr_lba = ebr_lba + plan.inter_space + slot.sector_count;
            let link = PartitionEntry {
                active: 0,
                id: PARTITION_ID_EXTENDED,
                start_lba: next_ebr_lba - plan.extended_start_lba,
                length: next_slot.sector_count + plan.inter_space,
            };
            let link_off = PARTITION_TABLE_OFFSET + ENTRY_LEN;
            link.write(&mut ebr.as_mut_slice()[link_off..link_off + ENTRY_LEN]);
        }

        write_signature(ebr.as_mut_slice());
        storage.write_sector(ebr_lba, &ebr).map_err(|e| FormatError::from_write(ebr_lba, e))?;

        ebr_lba += plan.inter_space + slot.sector_count;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::INTER_PARTITION_GAP;
    use crate::partition::{plan_partitions, PartitionParams, SizeType};
    use crate::storage::RamDisk;

    #[test]
    fn primary_only_mbr_signature_and_entries() {
        let params = PartitionParams {
            sizes: [25, 25, 25, 25, 0, 0, 0, 0],
            size_type: SizeType::Percent,
            primary_count: 4,
            hidden_sectors: 0,
            total_sectors: 1_000_000,
            inter_space: INTER_PARTITION_GAP,
        };
        let plan = plan_partitions(&params).unwrap();
        let mut disk = RamDisk::new(1_000_000);
        write_partition_table(&mut disk, &plan, 1_000_000).unwrap();

        let bytes = disk.as_bytes();
        assert_eq!(&bytes[510..512], &[0x55, 0xAA]);
        for (i, slot) in plan.slots().iter().enumerate() {
            let off = PARTITION_TABLE_OFFSET + i * ENTRY_LEN;
            assert_eq!(bytes[off], PARTITION_ACTIVE);
            assert_eq!(bytes[off + 4], PARTITION_ID_FAT32_LBA);
            assert_eq!(u32::from_le_bytes(bytes[off + 8..off + 12].try_into().unwrap()), slot.start_lba);
            assert_eq!(u32::from_le_bytes(bytes[off + 12..off + 16].try_into().unwrap()), slot.sector_count);
        }
    }

    #[test]
    fn extended_mbr_has_extended_entry_and_ebr_chain() {
        let params = PartitionParams {
            sizes: [100_000, 100_000, 50_000, 50_000, 50_000, 50_000, 0, 0],
            size_type: SizeType::Sectors,
            primary_count: 3,
            hidden_sectors: 0,
            total_sectors: 1_000_000,
            inter_space: INTER_PARTITION_GAP,
        };
        let plan = plan_partitions(&params).unwrap();
        let mut disk = RamDisk::new(1_000_000);
        write_partition_table(&mut disk, &plan, 1_000_000).unwrap();

        let bytes = disk.as_bytes();
        let ext_off = PARTITION_TABLE_OFFSET + plan.primary_count * ENTRY_LEN;
        assert_eq!(bytes[ext_off + 4], PARTITION_ID_EXTENDED);
        let ext_start = u32::from_le_bytes(bytes[ext_off + 8..ext_off + 12].try_into().unwrap());
        assert_eq!(ext_start, plan.extended_start_lba);

        let first_ebr = ext_start as usize * 512;
        assert_eq!(&bytes[first_ebr + 510..first_ebr + 512], &[0x55, 0xAA]);
        let logical_off = first_ebr + PARTITION_TABLE_OFFSET;
        assert_eq!(bytes[logical_off + 4], PARTITION_ID_FAT32_LBA);
        assert_eq!(
            u32::from_le_bytes(bytes[logical_off + 8..logical_off + 12].try_into().unwrap()),
            plan.inter_space
        );

        let link_off = first_ebr + PARTITION_TABLE_OFFSET + ENTRY_LEN;
        assert_eq!(bytes[link_off + 4], PARTITION_ID_EXTENDED);
    }

    #[test]
    fn empty_entries_past_partition_count_stay_zeroed() {
        let params = PartitionParams {
            sizes: [1000, 0, 0, 0, 0, 0, 0, 0],
            size_type: SizeType::Sectors,
            primary_count: 1,
            hidden_sectors: 0,
            total_sectors: 1_000_000,
            inter_space: INTER_PARTITION_GAP,
        };
        let plan = plan_partitions(&params).unwrap();
        let mut disk = RamDisk::new(1_000_000);
        write_partition_table(&mut disk, &plan, 1_000_000).unwrap();

        let bytes = disk.as_bytes();
        let empty = PartitionEntry::EMPTY;
        let off = PARTITION_TABLE_OFFSET + 1 * ENTRY_LEN;
        assert_eq!(bytes[off], empty.active);
        assert_eq!(bytes[off + 4], empty.id);
    }
}
