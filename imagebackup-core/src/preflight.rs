//! Checks that must all pass before anything is unmounted or written.
//!
//! Every check fails fast with a specific [`BackupError`]. The order matters:
//! privilege first, then existence, then content and capacity, and the
//! overwrite prompt last. The user is never asked about a run that would
//! fail anyway.
use crate::config::Settings;
use crate::device::{Destination, Source, ValidatedJob};
use crate::error::{BackupError, Result};
use crate::host::{Host, PathKind};
use crate::job::BackupJob;
use chrono::NaiveDate;
use std::path::Path;
use tracing::{info, warn};

/// Runs every check for `job` and measures its source and destination.
///
/// `today` names the output image in disk→folder mode.
pub fn validate(
    job: &BackupJob,
    host: &Host<'_>,
    settings: &Settings,
    today: NaiveDate,
) -> Result<ValidatedJob> {
    require_root(host)?;

    let (source, destination) = match job {
        BackupJob::DiskToDisk {
            source,
            destination,
        } => {
            require_block_device(host, source)?;
            require_block_device(host, destination)?;
            if source == destination {
                return Err(BackupError::SameDevice(source.clone()));
            }

            let source = Source::Disk {
                path: source.clone(),
                size: device_size(host, source)?,
            };
            let destination = Destination::Disk {
                path: destination.clone(),
                size: device_size(host, destination)?,
            };
            require_fits_disk(&source, &destination)?;
            (source, destination)
        }
        BackupJob::DiskToFolder { source, folder } => {
            require_block_device(host, source)?;
            if host.paths.kind(folder) != PathKind::Directory {
                return Err(BackupError::MissingDirectory(folder.clone()));
            }

            let source = Source::Disk {
                path: source.clone(),
                size: device_size(host, source)?,
            };
            let available = host
                .free_space
                .available_space(folder)
                .map_err(|e| query_error("free space", folder, e))?;
            if source.size() > available {
                return Err(BackupError::InsufficientHostSpace {
                    folder: folder.clone(),
                    required: source.size(),
                    available,
                });
            }
            info!(
                "Host disk space is enough: {} bytes needed, {} bytes available",
                source.size(),
                available
            );

            let image = settings.image_path(folder, today);
            confirm_overwrite(host, &image)?;

            let destination = Destination::Folder {
                path: folder.clone(),
                available,
                image,
            };
            (source, destination)
        }
        BackupJob::ImageToDisk { image, destination } => {
            if host.paths.kind(image) != PathKind::File {
                return Err(BackupError::MissingImage(image.clone()));
            }
            require_block_device(host, destination)?;

            let is_image = host
                .sniffer
                .is_boot_sector_image(image)
                .map_err(|e| query_error("file type", image, e))?;
            if !is_image {
                return Err(BackupError::InvalidImage(image.clone()));
            }
            info!("{} is a valid disk image", image.display());

            let source = Source::Image {
                path: image.clone(),
                size: host
                    .file_sizes
                    .file_size(image)
                    .map_err(|e| query_error("size", image, e))?,
            };
            let destination = Destination::Disk {
                path: destination.clone(),
                size: device_size(host, destination)?,
            };
            require_fits_disk(&source, &destination)?;
            (source, destination)
        }
    };

    Ok(ValidatedJob::new(job.clone(), source, destination))
}

fn require_root(host: &Host<'_>) -> Result<()> {
    if host.privileges.is_superuser() {
        Ok(())
    } else {
        Err(BackupError::NotRoot)
    }
}

fn require_block_device(host: &Host<'_>, path: &Path) -> Result<()> {
    if host.paths.kind(path) == PathKind::BlockDevice {
        Ok(())
    } else {
        Err(BackupError::MissingBlockDevice(path.to_path_buf()))
    }
}

fn device_size(host: &Host<'_>, device: &Path) -> Result<u64> {
    host.device_sizes
        .device_size(device)
        .map_err(|e| query_error("size", device, e))
}

fn query_error(what: &'static str, path: &Path, source: std::io::Error) -> BackupError {
    BackupError::Query {
        what,
        path: path.to_path_buf(),
        source,
    }
}

fn require_fits_disk(source: &Source, destination: &Destination) -> Result<()> {
    if source.size() > destination.capacity() {
        return Err(BackupError::DestinationTooSmall {
            destination: destination.target().to_path_buf(),
            required: source.size(),
            available: destination.capacity(),
        });
    }
    info!(
        "Destination disk is large enough: {} bytes needed, {} bytes available",
        source.size(),
        destination.capacity()
    );
    Ok(())
}

fn confirm_overwrite(host: &Host<'_>, image: &Path) -> Result<()> {
    if host.paths.kind(image) == PathKind::Missing {
        return Ok(());
    }

    warn!("{} already exists", image.display());
    let prompt = format!("Overwrite {}?", image.display());
    if host.prompt.confirm(&prompt).map_err(BackupError::Prompt)? {
        Ok(())
    } else {
        warn!("Not overwriting {}", image.display());
        Err(BackupError::Declined("overwrite"))
    }
}
