//! The geometry planner and FAT-location optimizer.
//!
//! This is the core combinatorial search described in spec 4.1/4.2: pick
//! a FAT type and cluster size that keep the usable-cluster count inside
//! the legal range for that type, then (for large FAT32 volumes) shift
//! the FAT start so the data region lands on a flash-erase-block-aligned
//! boundary.

use log::{debug, trace, warn};

use crate::config::*;
use crate::error::PlanError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FatType {
    Fat16,
    Fat32,
}

impl FatType {
    pub fn fs_type_label(self) -> &'static [u8; 8] {
        match self {
            FatType::Fat16 => b"FAT16   ",
            FatType::Fat32 => b"FAT32   ",
        }
    }
}

/// The planner's complete output: every quantity the BPB, FSInfo, FAT,
/// and root-directory writers need, plus `cluster_begin_lba` so callers
/// don't have to recompute it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryPlan {
    pub fat_type: FatType,
    pub sectors_per_cluster: u8,
    /// Total sector count of the volume (the `n` passed to [`plan`]), not
    /// recomputed from the other fields since invariant (5) only bounds
    /// the data region from above - it need not exactly fill `n`.
    pub sector_count: u32,
    pub hidden_sectors: u32,
    pub reserved_sectors: u32,
    pub fat16_root_sectors: u32,
    pub fat32_root_cluster: u32,
    pub sectors_per_fat: u32,
    pub usable_data_clusters: u32,
    pub cluster_begin_lba: u32,
    /// Sector size in bytes, carried through so downstream writers don't
    /// need a separate `Storage` handle just to learn it.
    pub sector_size: u16,
    /// Whether the FAT-location optimizer engaged.
    pub optimized: bool,
}

impl GeometryPlan {
    /// LBA of the first FAT copy.
    pub fn fat_begin_lba(&self) -> u32 {
        self.hidden_sectors + self.reserved_sectors
    }

    fn clusters_per_fat_sector(&self) -> u32 {
        clusters_per_fat_sector(self.fat_type, self.sector_size)
    }
}

fn clusters_per_fat_sector(fat_type: FatType, sector_size: u16) -> u32 {
    match fat_type {
        FatType::Fat16 => sector_size as u32 / 2,
        FatType::Fat32 => sector_size as u32 / 4,
    }
}

/// Hints a caller passes in to steer the cluster-size search (spec 4.1).
#[derive(Debug, Clone, Copy, Default)]
pub struct GeometryHints {
    pub prefer_fat16: bool,
    pub small_clusters: bool,
}

/// Chooses a FAT type per spec 4.1's decision rule.
fn choose_fat_type(n: u32, prefer_fat16: bool) -> FatType {
    let too_big_for_fat16 = n.saturating_sub(32) >= 64 * MIN_CLUSTERS_FAT32;
    let fat32_allowed_by_size = n.saturating_sub(32) >= 65536;

    if (!prefer_fat16 && fat32_allowed_by_size) || too_big_for_fat16 {
        FatType::Fat32
    } else {
        FatType::Fat16
    }
}

/// A single trial of the cluster-size search for a given `spc`.
struct Trial {
    sectors_per_fat: u32,
    usable_data_clusters: u32,
}

fn trial(
    fat_type: FatType,
    n: u32,
    hidden: u32,
    reserved: u32,
    fat16_root_sectors: u32,
    spc: u8,
    sector_size: u16,
) -> Trial {
    let clusters_per_fat_sector = clusters_per_fat_sector(fat_type, sector_size);
    let non_data = hidden + reserved + fat16_root_sectors;
    let usable_sectors = n.saturating_sub(non_data);

    let group = 2 + clusters_per_fat_sector * spc as u32;
    let sectors_per_fat = (usable_sectors + group - spc as u32 - 2) / group;

    let usable_data_clusters = core::cmp::min(
        usable_sectors.saturating_sub(2 * sectors_per_fat) / spc as u32,
        clusters_per_fat_sector * sectors_per_fat,
    );

    Trial { sectors_per_fat, usable_data_clusters }
}

fn invariant_holds(fat_type: FatType, usable_data_clusters: u32) -> bool {
    match fat_type {
        FatType::Fat16 => (MIN_CLUSTERS_FAT16..65536).contains(&usable_data_clusters),
        FatType::Fat32 => (65536..0x0FFF_FFEF).contains(&usable_data_clusters),
    }
}

/// Search directions per spec 4.1: grow from 1 when the caller wants
/// small clusters, otherwise shrink from the FAT-type's default max.
fn spc_search_sequence(fat_type: FatType, small_clusters: bool) -> impl Iterator<Item = u8> {
    let mut values: heapless_iter::Seq = if small_clusters {
        heapless_iter::Seq::doubling_from(1)
    } else {
        let start = match fat_type {
            FatType::Fat32 => 64,
            FatType::Fat16 => 32,
        };
        heapless_iter::Seq::halving_from(start)
    };
    core::iter::from_fn(move || values.next())
}

/// A tiny fixed-step iterator so we don't need `alloc` for a search over
/// at most 8 values.
mod heapless_iter {
    pub struct Seq {
        cur: Option<u8>,
        doubling: bool,
    }

    impl Seq {
        pub fn doubling_from(start: u8) -> Self {
            Self { cur: Some(start), doubling: true }
        }

        pub fn halving_from(start: u8) -> Self {
            Self { cur: Some(start), doubling: false }
        }

        pub fn next(&mut self) -> Option<u8> {
            let cur = self.cur?;
            self.cur = if self.doubling {
                if cur >= 32 { None } else { Some(cur * 2) }
            } else if cur <= 1 {
                None
            } else {
                Some(cur / 2)
            };
            Some(cur)
        }
    }
}

/// Runs the cluster-size search of spec 4.1 for a fixed `fat_type`.
fn search_cluster_size(
    fat_type: FatType,
    n: u32,
    hidden: u32,
    reserved: u32,
    fat16_root_sectors: u32,
    small_clusters: bool,
    sector_size: u16,
) -> Result<(u8, Trial), PlanError> {
    for spc in spc_search_sequence(fat_type, small_clusters) {
        let t = trial(fat_type, n, hidden, reserved, fat16_root_sectors, spc, sector_size);
        trace!(
            "fat-type={fat_type:?} spc={spc} sectors_per_fat={} usable_data_clusters={}",
            t.sectors_per_fat, t.usable_data_clusters
        );
        if invariant_holds(fat_type, t.usable_data_clusters) {
            return Ok((spc, t));
        }
    }

    Err(PlanError::NoClusterSize { fat_type, sector_count: n })
}

/// Plans FAT geometry for a volume of `n` sectors starting at hidden
/// sector `hidden`, per spec 4.1/4.2.
pub fn plan(n: u32, hidden: u32, hints: GeometryHints, sector_size: u16) -> Result<GeometryPlan, PlanError> {
    let fat_type = choose_fat_type(n, hints.prefer_fat16);

    let mut reserved_sectors = match fat_type {
        FatType::Fat32 => FAT32_DEFAULT_RESERVED_SECTORS,
        FatType::Fat16 => FAT16_RESERVED_SECTORS,
    };
    let fat16_root_sectors = match fat_type {
        FatType::Fat16 => FAT16_ROOT_SECTORS,
        FatType::Fat32 => 0,
    };
    let fat32_root_cluster = match fat_type {
        FatType::Fat32 => 2,
        FatType::Fat16 => 0,
    };

    let (spc, trial) = search_cluster_size(
        fat_type,
        n,
        hidden,
        reserved_sectors,
        fat16_root_sectors,
        hints.small_clusters,
        sector_size,
    )?;

    let mut sectors_per_fat = trial.sectors_per_fat;
    let mut usable_data_clusters = trial.usable_data_clusters;
    let mut optimized = false;

    if fat_type == FatType::Fat32
        && n >= OPTIMIZER_MIN_SECTOR_COUNT
        && hidden < OPTIMIZER_MAX_HIDDEN_SECTORS
    {
        optimize_fat_location(
            n,
            hidden,
            &mut reserved_sectors,
            fat16_root_sectors,
            sectors_per_fat,
            spc,
            &mut usable_data_clusters,
        );
        optimized = true;
    }

    let cluster_begin_lba = hidden + reserved_sectors + 2 * sectors_per_fat + fat16_root_sectors;

    debug!(
        "planned {fat_type:?}: spc={spc} reserved={reserved_sectors} sectors_per_fat={sectors_per_fat} \
         usable_data_clusters={usable_data_clusters} cluster_begin_lba={cluster_begin_lba} optimized={optimized}"
    );

    if fat_type == FatType::Fat32 && reserved_sectors < FAT32_MIN_RESERVED_SECTORS {
        // Cannot happen given FAT32_DEFAULT_RESERVED_SECTORS = 32, but spell
        // the invariant out rather than silently trusting the constant.
        warn!("FAT32 reserved_sectors {reserved_sectors} below the backup-boot-sector floor");
        return Err(PlanError::NoClusterSize { fat_type, sector_count: n });
    }

    Ok(GeometryPlan {
        fat_type,
        sectors_per_cluster: spc,
        sector_count: n,
        hidden_sectors: hidden,
        reserved_sectors,
        fat16_root_sectors,
        fat32_root_cluster,
        sectors_per_fat: trial.sectors_per_fat,
        usable_data_clusters,
        cluster_begin_lba,
        sector_size,
        optimized,
    })
}

/// The FAT-location optimizer of spec 4.2. Adjusts `reserved_sectors` in
/// place (never `sectors_per_fat`) and recomputes the usable cluster
/// count against the now-smaller data region.
fn optimize_fat_location(
    n: u32,
    hidden: u32,
    reserved_sectors: &mut u32,
    fat16_root_sectors: u32,
    sectors_per_fat: u32,
    spc: u8,
    usable_data_clusters: &mut u32,
) {
    *reserved_sectors = OPTIMIZER_TARGET_RESERVED_BASE - hidden;

    let slack = (hidden + *reserved_sectors + fat16_root_sectors + 2 * sectors_per_fat) % OPTIMIZER_ALIGNMENT;
    if slack != 0 {
        *reserved_sectors += OPTIMIZER_ALIGNMENT - slack;
    }

    let non_data = hidden + *reserved_sectors + fat16_root_sectors;
    let usable_data_sectors = n.saturating_sub(non_data + 2 * sectors_per_fat);
    *usable_data_clusters = usable_data_sectors / spc as u32;
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn small_ram_disk_fails() {
        // Scenario 1: 10,240 sectors, FAT16 preferred, default (large)
        // cluster search - no legal spc satisfies the FAT16 invariant.
        let err = plan(10_240, 0, GeometryHints { prefer_fat16: true, small_clusters: false }, 512).unwrap_err();
        assert!(matches!(err, PlanError::NoClusterSize { fat_type: FatType::Fat16, .. }));
    }

    #[test]
    fn sixty_four_mib_fat16() {
        let plan = plan(131_072, 0, GeometryHints { prefer_fat16: true, small_clusters: false }, 512).unwrap();
        assert_eq!(plan.fat_type, FatType::Fat16);
        assert!((MIN_CLUSTERS_FAT16..65536).contains(&plan.usable_data_clusters));
    }

    #[test]
    fn one_gib_fat32_optimizes() {
        let plan = plan(2_097_152, 2048, GeometryHints { prefer_fat16: false, small_clusters: false }, 512).unwrap();
        assert_eq!(plan.fat_type, FatType::Fat32);
        assert!(plan.optimized);
        assert_eq!(plan.hidden_sectors + plan.reserved_sectors, OPTIMIZER_TARGET_RESERVED_BASE);
        assert_eq!(plan.cluster_begin_lba % OPTIMIZER_ALIGNMENT, 0);
        assert!(plan.usable_data_clusters >= 65536);
    }

    #[test]
    fn invariants_hold_for_a_spread_of_sizes() {
        for n in [20_000u32, 40_000, 131_072, 500_000, 2_097_152, 8_000_000] {
            for prefer_fat16 in [true, false] {
                for small_clusters in [true, false] {
                    let hints = GeometryHints { prefer_fat16, small_clusters };
                    if let Ok(plan) = plan(n, 0, hints, 512) {
                        assert!(plan.sectors_per_cluster.is_power_of_two());
                        assert!((1..=128).contains(&plan.sectors_per_cluster));
                        assert!(invariant_holds(plan.fat_type, plan.usable_data_clusters));
                        let clusters_per_fat_sector = plan.clusters_per_fat_sector();
                        assert!(2 * plan.sectors_per_fat * clusters_per_fat_sector >= plan.usable_data_clusters);
                        let end = plan.hidden_sectors
                            + plan.reserved_sectors
                            + 2 * plan.sectors_per_fat
                            + plan.fat16_root_sectors
                            + plan.usable_data_clusters * plan.sectors_per_cluster as u32;
                        assert!(end <= plan.hidden_sectors + n);
                        if plan.fat_type == FatType::Fat32 {
                            assert!(plan.reserved_sectors >= FAT32_MIN_RESERVED_SECTORS);
                        }
                        if plan.optimized {
                            assert_eq!(plan.cluster_begin_lba % OPTIMIZER_ALIGNMENT, 0);
                        }
                    }
                }
            }
        }
    }

    proptest::proptest! {
        /// Whenever `plan` succeeds, its `GeometryPlan` must satisfy the
        /// invariants `spec.md` §3 states for invariant (1)-(5): a
        /// power-of-two cluster size in range, the FAT-type cluster-count
        /// window, enough FAT capacity to address every usable cluster,
        /// and a data region that fits inside the volume.
        #[test]
        fn planned_geometry_always_satisfies_its_invariants(
            n in 16_384u32..16_000_000,
            hidden in 0u32..4096,
            prefer_fat16 in proptest::bool::ANY,
            small_clusters in proptest::bool::ANY,
        ) {
            let hints = GeometryHints { prefer_fat16, small_clusters };
            if let Ok(plan) = plan(n, hidden, hints, 512) {
                prop_assert!(plan.sectors_per_cluster.is_power_of_two());
                prop_assert!((1..=128).contains(&plan.sectors_per_cluster));
                prop_assert!(invariant_holds(plan.fat_type, plan.usable_data_clusters));

                let clusters_per_fat_sector = plan.clusters_per_fat_sector();
                prop_assert!(2 * plan.sectors_per_fat * clusters_per_fat_sector >= plan.usable_data_clusters);

                let end = plan.hidden_sectors
                    + plan.reserved_sectors
                    + 2 * plan.sectors_per_fat
                    + plan.fat16_root_sectors
                    + plan.usable_data_clusters * plan.sectors_per_cluster as u32;
                prop_assert!(end <= plan.hidden_sectors + n);

                if plan.fat_type == FatType::Fat32 {
                    prop_assert!(plan.reserved_sectors >= FAT32_MIN_RESERVED_SECTORS);
                }
                if plan.optimized {
                    prop_assert_eq!(plan.cluster_begin_lba % OPTIMIZER_ALIGNMENT, 0);
                }
            }
        }
    }
}
