//! Unmounts partitions of a block device before it is read or written.
use crate::error::{BackupError, Result};
use crate::host::{MountEntry, MountEnumerator, Unmounter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Parses a `/proc/mounts` style table.
///
/// Lines that do not have at least three fields are skipped. Fields are
/// unescaped (`\040` → space) because the kernel escapes whitespace in paths.
pub fn parse_mounts(table: &str) -> Vec<MountEntry> {
    table
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let device = fields.next()?;
            let mount_point = fields.next()?;
            let fs_type = fields.next()?;
            Some(MountEntry {
                device: PathBuf::from(unescape_mount_field(device)),
                mount_point: PathBuf::from(unescape_mount_field(mount_point)),
                fs_type: fs_type.to_string(),
            })
        })
        .collect()
}

fn unescape_mount_field(value: &str) -> String {
    let mut output = Vec::with_capacity(value.len());
    let bytes = value.as_bytes();
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] == b'\\'
            && index + 3 < bytes.len()
            && bytes[index + 1..index + 4].iter().all(u8::is_ascii_digit)
        {
            let octal = &value[index + 1..index + 4];
            if let Ok(byte) = u8::from_str_radix(octal, 8) {
                output.push(byte);
                index += 4;
                continue;
            }
        }
        output.push(bytes[index]);
        index += 1;
    }

    String::from_utf8_lossy(&output).into_owned()
}

/// Whether `partition` is `device` itself or one of its partitions.
///
/// `/dev/sda` owns `/dev/sda1`, and `/dev/nvme0n1` owns `/dev/nvme0n1p2`.
/// Unrelated devices that merely share a prefix, like `/dev/sdaa1`, are not
/// owned.
pub fn belongs_to(partition: &Path, device: &Path) -> bool {
    let (Some(partition), Some(device)) = (partition.to_str(), device.to_str()) else {
        return partition == device;
    };
    let Some(suffix) = partition.strip_prefix(device) else {
        return false;
    };
    if suffix.is_empty() {
        return true;
    }

    let digits = if device.ends_with(|c: char| c.is_ascii_digit()) {
        match suffix.strip_prefix('p') {
            Some(digits) => digits,
            None => return false,
        }
    } else {
        suffix
    };

    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Mounted entries that belong to `device`, in mount-table order.
pub fn mounted_partitions(mounts: &[MountEntry], device: &Path) -> Vec<MountEntry> {
    mounts
        .iter()
        .filter(|entry| belongs_to(&entry.device, device))
        .cloned()
        .collect()
}

/// Unmounts every mounted partition of `device`.
///
/// Entries are released newest first so nested mounts go before their
/// parents. The first failure aborts; nothing is retried or forced. Returns
/// the entries that were unmounted.
pub fn unmount_device(
    device: &Path,
    enumerator: &dyn MountEnumerator,
    unmounter: &dyn Unmounter,
) -> Result<Vec<MountEntry>> {
    let mounts = enumerator.mounts().map_err(|source| BackupError::Query {
        what: "mounted partitions",
        path: device.to_path_buf(),
        source,
    })?;

    let partitions = mounted_partitions(&mounts, device);
    if partitions.is_empty() {
        debug!("No mounted partitions on {}", device.display());
        return Ok(partitions);
    }

    for entry in partitions.iter().rev() {
        info!(
            "Unmounting {} from {}",
            entry.device.display(),
            entry.mount_point.display()
        );
        unmounter
            .unmount(&entry.mount_point)
            .map_err(|source| BackupError::Unmount {
                partition: entry.device.clone(),
                mount_point: entry.mount_point.clone(),
                source,
            })?;
    }

    Ok(partitions)
}
