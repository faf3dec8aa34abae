//! CLI front end for the `format`/`partition` library calls: partitions
//! a disk image or block device and/or lays down a FAT16/FAT32 volume on
//! one of its partitions.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::error;

use fs::storage::FileBackedStorage;
use fs::{Disk, PartitionParams, SizeType, Storage};

#[derive(Parser)]
#[command(name = "fatfmt", about = "Partition and FAT-format a block device")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write an MBR (and, if needed, an EBR chain) to a device.
    Partition {
        /// Path to the image file or block device.
        device: String,
        /// Partition sizes in sectors; a single 0 means "one partition
        /// covering everything".
        #[arg(long, value_delimiter = ',', default_value = "0")]
        sizes: Vec<u32>,
        /// How many of `sizes` are primary partitions (rest go into an
        /// extended partition).
        #[arg(long, default_value_t = 1)]
        primary_count: u8,
        /// Sectors to leave unallocated at the start of the device.
        #[arg(long, default_value_t = 0)]
        hidden_sectors: u32,
        /// Total sector count; defaults to the device's own size.
        #[arg(long)]
        total_sectors: Option<u32>,
    },
    /// Write a FAT16/FAT32 volume to one partition of a device.
    Format {
        /// Path to the image file or block device.
        device: String,
        /// Which partition-table entry to format.
        #[arg(long, default_value_t = 0)]
        partition_index: usize,
        /// Force FAT16 where both types would otherwise be legal.
        #[arg(long)]
        prefer_fat16: bool,
        /// Bias the cluster-size search toward smaller clusters.
        #[arg(long)]
        small_clusters: bool,
        /// Up to 11 characters; longer labels are truncated.
        #[arg(long, default_value = "NO NAME")]
        volume_label: String,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Partition { device, sizes, primary_count, hidden_sectors, total_sectors } => {
            run_partition(&device, &sizes, primary_count, hidden_sectors, total_sectors)
        }
        Command::Format { device, partition_index, prefer_fat16, small_clusters, volume_label } => {
            run_format(&device, partition_index, prefer_fat16, small_clusters, &volume_label)
        }
    };

    if let Err(e) = result {
        error!("{e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run_partition(
    device: &str,
    sizes: &[u32],
    primary_count: u8,
    hidden_sectors: u32,
    total_sectors: Option<u32>,
) -> Result<(), String> {
    let storage = FileBackedStorage::from_file(device).map_err(|e| format!("opening {device}: {e}"))?;
    let total_sectors = total_sectors.unwrap_or_else(|| storage.sector_count());
    let mut disk = Disk::new(storage);

    let mut params = PartitionParams { size_type: SizeType::Sectors, primary_count, hidden_sectors, total_sectors, ..Default::default() };
    for (slot, &size) in params.sizes.iter_mut().zip(sizes) {
        *slot = size;
    }

    let plan = fs::partition(&mut disk, params).map_err(|e| format!("partitioning {device}: {e}"))?;
    println!("wrote {} partition(s){}", plan.len(), if plan.needs_extended { " (extended)" } else { "" });
    Ok(())
}

fn run_format(
    device: &str,
    partition_index: usize,
    prefer_fat16: bool,
    small_clusters: bool,
    volume_label: &str,
) -> Result<(), String> {
    let storage = FileBackedStorage::from_file(device).map_err(|e| format!("opening {device}: {e}"))?;
    let mut disk = Disk::new(storage);

    let geom = fs::format(&mut disk, partition_index, prefer_fat16, small_clusters, volume_label)
        .map_err(|e| format!("formatting {device}: {e}"))?;
    println!(
        "wrote {:?} volume: {} usable clusters, {} sectors/cluster",
        geom.fat_type, geom.usable_data_clusters, geom.sectors_per_cluster
    );
    Ok(())
}
