//! Compile-time knobs for the format/partition planners.
//!
//! These mirror the constants a caller would otherwise hardcode at the
//! call site; keeping them here means a downstream crate can audit (or,
//! by forking, adjust) the planner's legal ranges in one place.

/// Smallest cluster count a FAT16 volume may report (inclusive).
pub const MIN_CLUSTERS_FAT16: u32 = 4086;

/// Threshold used by the FAT16/FAT32 decision and by the "too large for
/// FAT16 regardless of preference" escape hatch. Note this does *not*
/// match the `65536` lower bound used by invariant (2) in the geometry
/// planner - both constants are carried as the source used them, see
/// `geometry::plan` and DESIGN.md.
pub const MIN_CLUSTERS_FAT32: u32 = 65525;

/// Sectors reserved for the FAT16 root directory region.
pub const FAT16_ROOT_SECTORS: u32 = 32;

/// Reserved-sector floor for FAT32 so the backup boot sector (offset 6)
/// and FSInfo sector (offset 1) both land inside the reserved area.
pub const FAT32_MIN_RESERVED_SECTORS: u32 = 7;

/// Reserved-sector count a freshly-initialized FAT32 volume starts with
/// before the optimizer (if it runs) inflates it.
pub const FAT32_DEFAULT_RESERVED_SECTORS: u32 = 32;

/// Reserved-sector count for FAT16.
pub const FAT16_RESERVED_SECTORS: u32 = 1;

/// Maximum number of partitions (primary + logical combined) a partition
/// table written by this crate describes. The spec's own worked example
/// (3 primaries + 3 logical, spec 8 scenario 5) needs room for 6, so this
/// is raised from the spec's suggested default of 4 - it says
/// implementations may raise it. Raise this (and nothing else) to support
/// more.
pub const MAX_PARTITIONS: usize = 8;

/// Default gap, in sectors, left between successive logical partitions
/// inside an extended partition.
pub const INTER_PARTITION_GAP: u32 = 2048;

/// Sector count threshold (512 MiB at 512 B/sector) above which the
/// FAT-location optimizer engages for FAT32 volumes.
pub const OPTIMIZER_MIN_SECTOR_COUNT: u32 = 0x0010_0000;

/// Hidden-sector ceiling below which the optimizer engages.
pub const OPTIMIZER_MAX_HIDDEN_SECTORS: u32 = 8192;

/// Target `hidden + reserved` the optimizer aligns to.
pub const OPTIMIZER_TARGET_RESERVED_BASE: u32 = 8192;

/// Alignment (in sectors) the optimizer aligns `cluster_begin_lba` to.
pub const OPTIMIZER_ALIGNMENT: u32 = 128;

/// Partition IDs written into MBR/EBR entries.
pub const PARTITION_ID_FAT32_LBA: u8 = 0x0B;
pub const PARTITION_ID_EXTENDED: u8 = 0x05;

pub const PARTITION_ACTIVE: u8 = 0x80;
pub const PARTITION_INACTIVE: u8 = 0x00;
