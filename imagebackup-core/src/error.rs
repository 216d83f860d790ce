use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Coarse classification used by front-ends to decide how to report a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed or incomplete arguments. Usage help should be shown.
    Usage,
    /// A check failed before anything was touched.
    Precondition,
    /// The user answered "no" to a confirmation prompt.
    Declined,
    /// Unmounting, copying or syncing failed.
    Operational,
}

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("no supported combination of options given (use -s/-d, -s/-f or -i/-d)")]
    NoMode,

    #[error("ambiguous options: {0} cannot be combined with {1}")]
    Ambiguous(&'static str, &'static str),

    #[error("this program must be run as root")]
    NotRoot,

    #[error("{} is not a block device or does not exist", .0.display())]
    MissingBlockDevice(PathBuf),

    #[error("{} is not a directory or does not exist", .0.display())]
    MissingDirectory(PathBuf),

    #[error("image file {} does not exist", .0.display())]
    MissingImage(PathBuf),

    #[error("invalid image: {} is not a DOS/MBR boot sector disk image", .0.display())]
    InvalidImage(PathBuf),

    #[error("source and destination are the same device: {}", .0.display())]
    SameDevice(PathBuf),

    #[error(
        "Destination disk {} is too small: source needs {required} bytes, destination has {available} bytes",
        destination.display()
    )]
    DestinationTooSmall {
        destination: PathBuf,
        required: u64,
        available: u64,
    },

    #[error(
        "Host disk space is not enough: {} has {available} bytes free, source needs {required} bytes",
        folder.display()
    )]
    InsufficientHostSpace {
        folder: PathBuf,
        required: u64,
        available: u64,
    },

    #[error("could not query {what} of {}: {source}", path.display())]
    Query {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0} cancelled by user")]
    Declined(&'static str),

    #[error("confirmation prompt failed: {0}")]
    Prompt(#[source] io::Error),

    #[error("failed to unmount {} ({}): {source}", partition.display(), mount_point.display())]
    Unmount {
        partition: PathBuf,
        mount_point: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to copy {} to {}: {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to sync buffered writes to disk: {0}")]
    Sync(#[source] io::Error),
}

impl BackupError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NoMode | Self::Ambiguous(..) => ErrorClass::Usage,
            Self::NotRoot
            | Self::MissingBlockDevice(_)
            | Self::MissingDirectory(_)
            | Self::MissingImage(_)
            | Self::InvalidImage(_)
            | Self::SameDevice(_)
            | Self::DestinationTooSmall { .. }
            | Self::InsufficientHostSpace { .. }
            | Self::Query { .. } => ErrorClass::Precondition,
            Self::Declined(_) => ErrorClass::Declined,
            Self::Prompt(_) | Self::Unmount { .. } | Self::Copy { .. } | Self::Sync(_) => {
                ErrorClass::Operational
            }
        }
    }

    /// Every failure ends the process with status 1.
    pub fn exit_code(&self) -> u8 {
        1
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;
