use crate::job::BackupJob;
use std::fmt;
use std::path::{Path, PathBuf};

/// Where the bytes of a backup come from.
///
/// Both variants carry the size measured during preflight. Clone progress
/// and capacity checks rely on it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// A raw block device, e.g. `/dev/sda`.
    Disk { path: PathBuf, size: u64 },
    /// A regular file already verified to hold a boot-sector disk image.
    Image { path: PathBuf, size: u64 },
}

impl Source {
    pub fn path(&self) -> &Path {
        match self {
            Source::Disk { path, .. } | Source::Image { path, .. } => path,
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            Source::Disk { size, .. } | Source::Image { size, .. } => *size,
        }
    }
}

/// Where the bytes of a backup go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    /// A raw block device and its byte size.
    Disk { path: PathBuf, size: u64 },
    /// A directory on a mounted filesystem. The image is written to `image`.
    Folder {
        path: PathBuf,
        available: u64,
        image: PathBuf,
    },
}

impl Destination {
    /// The path the copy writes to: the device itself, or the image file
    /// inside the folder.
    pub fn target(&self) -> &Path {
        match self {
            Destination::Disk { path, .. } => path,
            Destination::Folder { image, .. } => image,
        }
    }

    /// Bytes that can be written before the destination is full.
    pub fn capacity(&self) -> u64 {
        match self {
            Destination::Disk { size, .. } => *size,
            Destination::Folder { available, .. } => *available,
        }
    }
}

/// A job that passed every preflight check.
///
/// Only [`crate::preflight::validate`] builds this type, so the mount guard
/// and clone executor can never run on an unchecked job.
#[derive(Clone, Debug)]
pub struct ValidatedJob {
    job: BackupJob,
    source: Source,
    destination: Destination,
}

impl ValidatedJob {
    pub(crate) fn new(job: BackupJob, source: Source, destination: Destination) -> Self {
        Self {
            job,
            source,
            destination,
        }
    }

    pub fn job(&self) -> &BackupJob {
        &self.job
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }
}

impl fmt::Display for ValidatedJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:.1} GB) -> {}",
            self.source.path().display(),
            self.source.size() as f64 / (1024.0 * 1024.0 * 1024.0),
            self.destination.target().display(),
        )
    }
}
