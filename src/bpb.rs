//! BPB / backup boot sector / FSInfo sector writer.
//!
//! Byte offsets below follow the usual FAT boot sector field tables;
//! this module writes rather than parses them, since nothing here ever
//! needs to read a boot sector back for mounting (out of scope, see
//! `spec.md` Non-goals).

use generic_array::{ArrayLength, GenericArray};
use log::warn;
use typenum::marker_traits::Unsigned;

use crate::geometry::{FatType, GeometryPlan};

const OEM_HEADER: [u8; 11] = *b"\xEB\x00\x90FreeRTOS";

fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Writes the 11-byte volume label at `offset`, space-padding or
/// truncating the caller's label as needed. An oversized label is
/// silently truncated, matching the "not an error" note in spec 7.
fn put_label(buf: &mut [u8], offset: usize, label: &str) {
    let mut bytes = [b' '; 11];
    let src = label.as_bytes();
    let n = src.len().min(11);
    bytes[..n].copy_from_slice(&src[..n]);
    buf[offset..offset + 11].copy_from_slice(&bytes);
}

/// Fills one 512-and-up byte sector buffer with the common DOS 2.0/3.31
/// BPB fields shared by FAT16 and FAT32, per spec 4.3.
fn write_common(buf: &mut [u8], plan: &GeometryPlan) {
    for b in buf.iter_mut() {
        *b = 0;
    }

    buf[0..11].copy_from_slice(&OEM_HEADER);

    put_u16(buf, 0x00B, plan.sector_size);
    buf[0x00D] = plan.sectors_per_cluster;
    put_u16(buf, 0x00E, plan.reserved_sectors as u16);
    buf[0x010] = 2; // num_fats

    let root_entry_count = match plan.fat_type {
        FatType::Fat16 => (plan.fat16_root_sectors * plan.sector_size as u32 / 32) as u16,
        FatType::Fat32 => 0,
    };
    put_u16(buf, 0x011, root_entry_count);

    put_u16(buf, 0x013, 0); // total_sectors_16
    buf[0x015] = 0xF8; // media

    let sectors_per_fat_16 = match plan.fat_type {
        FatType::Fat16 => plan.sectors_per_fat as u16,
        FatType::Fat32 => 0,
    };
    put_u16(buf, 0x016, sectors_per_fat_16);

    put_u16(buf, 0x018, 63); // sectors_per_track
    put_u16(buf, 0x01A, 255); // num_heads
    put_u32(buf, 0x01C, plan.hidden_sectors);
    put_u32(buf, 0x020, plan.sector_count);
}

/// Writes the FAT16 or FAT32 type-specific tail (drive number through
/// the `0x55 0xAA` signature) starting at the fixed FAT16 offset
/// (`0x024`) or the FAT32 offset (`0x024` through the extended block),
/// per spec 4.3.
fn write_tail(buf: &mut [u8], plan: &GeometryPlan, volume_id: u32, volume_label: &str) {
    match plan.fat_type {
        FatType::Fat16 => {
            buf[0x024] = 0; // drive number
            buf[0x026] = 0x29; // boot signature
            put_u32(buf, 0x027, volume_id);
            put_label(buf, 0x02B, volume_label);
            buf[0x036..0x03E].copy_from_slice(FatType::Fat16.fs_type_label());
        }
        FatType::Fat32 => {
            put_u32(buf, 0x024, plan.sectors_per_fat);
            put_u16(buf, 0x028, 0); // extended flags
            put_u16(buf, 0x02A, 0); // filesystem version
            put_u32(buf, 0x02C, plan.fat32_root_cluster);
            put_u16(buf, 0x030, 1); // fsinfo_sector
            put_u16(buf, 0x032, 6); // backup_boot_sector
            buf[0x040] = 0; // drive number
            buf[0x042] = 0x29; // boot signature
            put_u32(buf, 0x043, volume_id);
            put_label(buf, 0x047, volume_label);
            buf[0x052..0x05A].copy_from_slice(FatType::Fat32.fs_type_label());
        }
    }

    let len = buf.len();
    buf[len - 2] = 0x55;
    buf[len - 1] = 0xAA;
}

/// Renders the boot sector (BPB + type-specific tail + signature) into
/// `buf`. `buf` must be exactly one sector long.
///
/// `volume_label` is honored for FAT32; FAT16 burns in a fixed label and
/// ignores the caller's value (preserved quirk, see DESIGN.md) - a
/// `warn` is logged once by [`crate::format`], not here, so this pure
/// function stays side-effect free beyond the buffer it's given.
pub fn render_boot_sector(buf: &mut [u8], plan: &GeometryPlan, volume_id: u32, volume_label: &str) {
    write_common(buf, plan);
    let label = match plan.fat_type {
        FatType::Fat16 => "NO NAME",
        FatType::Fat32 => volume_label,
    };
    write_tail(buf, plan, volume_id, label);
}

/// Renders the FSInfo sector per spec 4.3 (FAT32 only).
pub fn render_fsinfo(buf: &mut [u8], plan: &GeometryPlan) {
    for b in buf.iter_mut() {
        *b = 0;
    }
    put_u32(buf, 0, 0x4161_5252);
    put_u32(buf, 484, 0x6141_7272);
    put_u32(buf, 488, plan.usable_data_clusters);
    put_u32(buf, 492, 2);
    put_u32(buf, 508, 0xAA55_0000);
}

/// Sector-index plan for everything `render_boot_sector`/`render_fsinfo`
/// need to be written at, per spec 4.3's "emit at LBA H ... also emit an
/// identical copy at LBA H + 6" / "emitted at H + 1 and at H + 1 + 6".
pub struct BpbLayout {
    pub boot_sector_lba: u32,
    pub backup_boot_sector_lba: Option<u32>,
    pub fsinfo_lba: Option<u32>,
    pub backup_fsinfo_lba: Option<u32>,
}

impl BpbLayout {
    pub fn for_plan(plan: &GeometryPlan) -> Self {
        match plan.fat_type {
            FatType::Fat16 => Self {
                boot_sector_lba: plan.hidden_sectors,
                backup_boot_sector_lba: None,
                fsinfo_lba: None,
                backup_fsinfo_lba: None,
            },
            FatType::Fat32 => Self {
                boot_sector_lba: plan.hidden_sectors,
                backup_boot_sector_lba: Some(plan.hidden_sectors + 6),
                fsinfo_lba: Some(plan.hidden_sectors + 1),
                backup_fsinfo_lba: Some(plan.hidden_sectors + 1 + 6),
            },
        }
    }
}

/// Writes the boot sector(s) and, for FAT32, the FSInfo sector(s) to
/// `storage` using a stack-allocated sector buffer sized to `S`.
pub fn write_bpb<S, E>(
    storage: &mut impl crate::storage::Storage<SECTOR_SIZE = S, Err = E>,
    plan: &GeometryPlan,
    volume_id: u32,
    volume_label: &str,
) -> Result<(), crate::error::FormatError<E>>
where
    S: ArrayLength<u8> + Unsigned,
    E: core::fmt::Debug,
{
    if matches!(plan.fat_type, FatType::Fat16) && !volume_label.is_empty() {
        warn!("FAT16 ignores the caller-supplied volume label and burns in a fixed string");
    }

    let layout = BpbLayout::for_plan(plan);
    let mut boot: GenericArray<u8, S> = GenericArray::default();
    render_boot_sector(boot.as_mut_slice(), plan, volume_id, volume_label);

    storage
        .write_sector(layout.boot_sector_lba, &boot)
        .map_err(|e| crate::error::FormatError::from_write(layout.boot_sector_lba, e))?;

    if let Some(backup_lba) = layout.backup_boot_sector_lba {
        storage
            .write_sector(backup_lba, &boot)
            .map_err(|e| crate::error::FormatError::from_write(backup_lba, e))?;
    }

    if let Some(fsinfo_lba) = layout.fsinfo_lba {
        let mut fsinfo: GenericArray<u8, S> = GenericArray::default();
        render_fsinfo(fsinfo.as_mut_slice(), plan);
        storage
            .write_sector(fsinfo_lba, &fsinfo)
            .map_err(|e| crate::error::FormatError::from_write(fsinfo_lba, e))?;
        if let Some(backup_fsinfo_lba) = layout.backup_fsinfo_lba {
            storage
                .write_sector(backup_fsinfo_lba, &fsinfo)
                .map_err(|e| crate::error::FormatError::from_write(backup_fsinfo_lba, e))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{plan, GeometryHints};

    fn sample_plan(fat32: bool) -> GeometryPlan {
        if fat32 {
            plan(2_097_152, 2048, GeometryHints { prefer_fat16: false, small_clusters: false }, 512).unwrap()
        } else {
            plan(131_072, 0, GeometryHints { prefer_fat16: true, small_clusters: false }, 512).unwrap()
        }
    }

    #[test]
    fn boot_sector_signature_and_jump_header() {
        let plan = sample_plan(false);
        let mut buf = [0u8; 512];
        render_boot_sector(&mut buf, &plan, 0xDEAD_BEEF, "MY_DISK");
        assert_eq!(&buf[0..3], &[0xEB, 0x00, 0x90]);
        assert_eq!(&buf[510..512], &[0x55, 0xAA]);
        assert_eq!(buf[0x015], 0xF8);
    }

    #[test]
    fn fat16_label_is_hardcoded_not_caller_supplied() {
        let plan = sample_plan(false);
        let mut buf = [0u8; 512];
        render_boot_sector(&mut buf, &plan, 1, "CUSTOM_NAME");
        assert_eq!(&buf[0x02B..0x036], b"NO NAME    ");
    }

    #[test]
    fn fat32_label_is_caller_supplied() {
        let plan = sample_plan(true);
        let mut buf = [0u8; 512];
        render_boot_sector(&mut buf, &plan, 1, "MY_DISK");
        assert_eq!(&buf[0x047..0x052], b"MY_DISK    ");
        assert_eq!(&buf[0x052..0x05A], b"FAT32   ");
    }

    #[test]
    fn fat32_fields_and_backup_layout() {
        let plan = sample_plan(true);
        let mut buf = [0u8; 512];
        render_boot_sector(&mut buf, &plan, 1, "MY_DISK");
        assert_eq!(u32::from_le_bytes(buf[0x02C..0x030].try_into().unwrap()), 2);
        assert_eq!(u16::from_le_bytes(buf[0x030..0x032].try_into().unwrap()), 1);
        assert_eq!(u16::from_le_bytes(buf[0x032..0x034].try_into().unwrap()), 6);

        let layout = BpbLayout::for_plan(&plan);
        assert_eq!(layout.backup_boot_sector_lba, Some(plan.hidden_sectors + 6));
        assert_eq!(layout.fsinfo_lba, Some(plan.hidden_sectors + 1));
        assert_eq!(layout.backup_fsinfo_lba, Some(plan.hidden_sectors + 7));
    }

    #[test]
    fn fsinfo_signatures() {
        let plan = sample_plan(true);
        let mut buf = [0u8; 512];
        render_fsinfo(&mut buf, &plan);
        assert_eq!(u32::from_le_bytes(buf[0..4].try_into().unwrap()), 0x4161_5252);
        assert_eq!(u32::from_le_bytes(buf[484..488].try_into().unwrap()), 0x6141_7272);
        assert_eq!(u32::from_le_bytes(buf[488..492].try_into().unwrap()), plan.usable_data_clusters);
        assert_eq!(u32::from_le_bytes(buf[492..496].try_into().unwrap()), 2);
        assert_eq!(u32::from_le_bytes(buf[508..512].try_into().unwrap()), 0xAA55_0000);
    }

    #[test]
    fn oversized_label_is_truncated_not_rejected() {
        let plan = sample_plan(true);
        let mut buf = [0u8; 512];
        render_boot_sector(&mut buf, &plan, 1, "WAY_TOO_LONG_LABEL");
        assert_eq!(buf[0x047..0x052].len(), 11);
    }
}
