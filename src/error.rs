//! Error taxonomy for the format and partition planners.
//!
//! Mirrors the error-surfacing style of the [`Storage`](crate::storage)
//! trait's own `WriteError`/`ReadError` (wrap the caller's error type,
//! don't swallow it) but collects everything the planner itself can go
//! wrong with into one enum so callers match on a single type.

use thiserror::Error;

use crate::geometry::FatType;

/// Why the geometry or partition planner refused to produce a plan.
///
/// Kept separate from [`FormatError`] because planning never touches
/// storage and so never needs to know about the caller's I/O error type.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanError {
    /// No cluster size satisfies the cluster-count invariants for the
    /// requested FAT type at this sector count.
    #[error("no sectors-per-cluster value satisfies the {fat_type:?} cluster-count invariants for {sector_count} sectors")]
    NoClusterSize { fat_type: FatType, sector_count: u32 },

    /// Partition sizes (sectors, percent, or quota) exceed the space
    /// available after hidden sectors and inter-partition gaps.
    #[error("requested partition sizes exceed the sectors available on the device")]
    PartitionsExceedAvailable,

    /// `Percent` sizes summed to more than 100.
    #[error("partition size percentages sum to more than 100")]
    PercentOverflow,
}

/// Top level error type returned by [`crate::format`] and
/// [`crate::partition`].
///
/// Generic over `E`, the storage port's own read/write error type, so
/// that an I/O failure surfaces unchanged (per the spec: "the error
/// surfaces unchanged with the offending LBA recoverable for logging").
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError<E: core::fmt::Debug> {
    /// The requested partition index is >= the count discovered on the disk.
    #[error("partition index {requested} is out of range (disk has {available} partition(s))")]
    InvalidPartitionNumber { requested: usize, available: usize },

    /// No legal geometry or partition layout exists for the given inputs.
    #[error(transparent)]
    BadMemorySize(#[from] PlanError),

    /// The (caller-supplied or internal) sector buffer could not be obtained.
    #[error("sector buffer allocation failed")]
    OutOfMemory,

    /// The underlying sector I/O port failed on a specific LBA; the error
    /// surfaces unchanged, per spec 7.
    #[error("I/O error at LBA {lba}: {source:?}")]
    Io { lba: u32, source: E },

    /// A read or write targeted an LBA the storage port rejected as out
    /// of range - distinct from `Io` since no `E` is ever constructed for
    /// this case (see [`crate::storage::WriteError::OutOfRange`]).
    #[error("LBA {requested_lba} is out of range for this device")]
    OutOfRange { requested_lba: u32 },

    /// A fatal argument error (e.g. an out-of-range size type). Note that
    /// an oversized volume label is *not* an error - it is silently
    /// truncated, per spec.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

impl<E: core::fmt::Debug> FormatError<E> {
    /// Maps a failed `write_sector(lba, ..)` call's error onto
    /// `FormatError`, keeping `lba` for the `Io` case (the storage port's
    /// own `OutOfRange` already carries the LBA it rejected).
    pub(crate) fn from_write(lba: u32, e: crate::storage::WriteError<E>) -> Self {
        match e {
            crate::storage::WriteError::Other(source) => FormatError::Io { lba, source },
            crate::storage::WriteError::OutOfRange { requested_lba } => FormatError::OutOfRange { requested_lba },
        }
    }

    /// Same as [`Self::from_write`] for a failed `read_sector(lba, ..)` call.
    pub(crate) fn from_read(lba: u32, e: crate::storage::ReadError<E>) -> Self {
        match e {
            crate::storage::ReadError::Other(source) => FormatError::Io { lba, source },
            crate::storage::ReadError::OutOfRange { requested_lba } => FormatError::OutOfRange { requested_lba },
        }
    }
}
