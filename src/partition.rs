//! Partition planner (spec 4.6).
//!
//! Turns caller-supplied sizes (sectors, percent, or quota) into a list
//! of `(start_lba, sector_count)` pairs plus whether an extended
//! partition is required. The MBR/EBR writer (`crate::mbr`) turns this
//! plan into bytes; this module is pure arithmetic, same split as
//! `crate::geometry` / `crate::bpb`.

use log::debug;

use crate::config::{INTER_PARTITION_GAP, MAX_PARTITIONS};
use crate::error::PlanError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeType {
    Sectors,
    Percent,
    Quota,
}

/// Input to the partition planner, matching `PartitionParams` from spec 6.
#[derive(Debug, Clone, Copy)]
pub struct PartitionParams {
    pub sizes: [u32; MAX_PARTITIONS],
    pub size_type: SizeType,
    pub primary_count: u8,
    pub hidden_sectors: u32,
    pub total_sectors: u32,
    pub inter_space: u32,
}

impl Default for PartitionParams {
    fn default() -> Self {
        Self {
            sizes: [0; MAX_PARTITIONS],
            size_type: SizeType::Sectors,
            primary_count: 0,
            hidden_sectors: 0,
            total_sectors: 0,
            inter_space: INTER_PARTITION_GAP,
        }
    }
}

/// A planned partition's size and (for primaries) authoritative start.
///
/// For a primary partition `start_lba` is where the MBR/EBR writer
/// places it, full stop. For a logical partition it is only a
/// sequential placement hint used to validate everything fits; the
/// MBR/EBR writer (`crate::mbr`) computes the authoritative EBR-chain
/// LBAs itself from `sector_count` and the inter-partition gap, per the
/// *relative*-offset rule in spec 4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionSlot {
    pub start_lba: u32,
    pub sector_count: u32,
}

/// The planner's output: the slots in partition-table order plus whether
/// an extended partition is needed to hold slots beyond `primary_count`.
///
/// Backed by a fixed `[PartitionSlot; MAX_PARTITIONS]` rather than a
/// heap-allocated `Vec` - `MAX_PARTITIONS` is small and fixed at compile
/// time, so there's nothing a growable collection buys here that isn't
/// already available on the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionPlan {
    slots: [PartitionSlot; MAX_PARTITIONS],
    len: usize,
    pub primary_count: usize,
    pub needs_extended: bool,
    pub extended_start_lba: u32,
    pub inter_space: u32,
}

impl PartitionPlan {
    pub fn slots(&self) -> &[PartitionSlot] {
        &self.slots[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Plans partition placement per spec 4.6.
pub fn plan_partitions(params: &PartitionParams) -> Result<PartitionPlan, PlanError> {
    // "any trailing zeros ignored" - sizes are expected packed contiguously
    // from index 0, so the nonzero count is just the position of the
    // first zero (or MAX_PARTITIONS if there isn't one).
    let k = params.sizes.iter().position(|&s| s == 0).unwrap_or(MAX_PARTITIONS);

    let max_primary = if k > 4 { 3 } else { k.max(1) };
    let primary_count = (params.primary_count as usize).min(max_primary);

    let needs_extended = k > primary_count;
    let hidden_floor = if needs_extended { 4096 } else { 1 };
    let hidden = params.hidden_sectors.max(hidden_floor);

    let reserved = if needs_extended { params.inter_space * (k - primary_count) as u32 } else { 0 };
    let available = params.total_sectors.saturating_sub(hidden).saturating_sub(reserved);

    // k == 0: synthesize a single partition covering everything. Spec 4.6
    // says "size = T if Sectors, else 100%", but the Sectors validation
    // just below checks against `available` (= T - H - R), not T, so a
    // literal size-T synthesis would always overshoot by exactly H
    // sectors whenever a nonzero hidden-sector floor applies. Synthesizing
    // against `available` instead keeps "covering everything" meaningful;
    // recorded as a judgment call in DESIGN.md.
    let mut synthesized = [0u32; MAX_PARTITIONS];
    let (k, sizes): (usize, &[u32]) = if k == 0 {
        synthesized[0] = match params.size_type {
            SizeType::Sectors => available,
            SizeType::Percent | SizeType::Quota => 100,
        };
        (1, &synthesized[..1])
    } else {
        (k, &params.sizes[..k])
    };

    let divisor: u64 = match params.size_type {
        SizeType::Sectors => {
            let sum: u64 = sizes.iter().map(|&s| s as u64).sum();
            if sum > available as u64 {
                return Err(PlanError::PartitionsExceedAvailable);
            }
            1 // each size_i is used as-is below, divisor unused
        }
        SizeType::Percent => {
            let sum: u64 = sizes.iter().map(|&s| s as u64).sum();
            if sum > 100 {
                return Err(PlanError::PercentOverflow);
            }
            100
        }
        SizeType::Quota => sizes.iter().map(|&s| s as u64).sum().max(1),
    };

    debug!(
        "partition plan: k={k} primary_count={primary_count} needs_extended={needs_extended} \
         hidden={hidden} available={available} size_type={:?}",
        params.size_type
    );

    let mut slots = [PartitionSlot { start_lba: 0, sector_count: 0 }; MAX_PARTITIONS];
    let mut running_lba = hidden;
    let mut remaining = available;
    let mut extended_start_lba = 0;

    for (i, &size) in sizes.iter().enumerate() {
        let size_i: u32 = match params.size_type {
            SizeType::Sectors => size,
            SizeType::Percent | SizeType::Quota => ((size as u64 * available as u64) / divisor) as u32,
        };
        let size_i = size_i.min(remaining);

        if needs_extended && i == primary_count {
            extended_start_lba = running_lba;
            running_lba += params.inter_space;
        }

        slots[i] = PartitionSlot { start_lba: running_lba, sector_count: size_i };
        running_lba += size_i;
        remaining = remaining.saturating_sub(size_i);
    }

    Ok(PartitionPlan { slots, len: k, primary_count, needs_extended, extended_start_lba, inter_space: params.inter_space })
}
