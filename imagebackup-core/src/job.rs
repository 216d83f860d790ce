//! Resolves the requested backup mode from the recognized options.
use crate::error::{BackupError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

/// The four recognized named options, each either present or absent.
#[derive(Clone, Debug, Default)]
pub struct BackupArgs {
    pub source: Option<PathBuf>,
    pub destination: Option<PathBuf>,
    pub folder: Option<PathBuf>,
    pub image: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    DiskToDisk,
    DiskToFolder,
    ImageToDisk,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::DiskToDisk => "disk to disk",
            Mode::DiskToFolder => "disk to folder",
            Mode::ImageToDisk => "image to disk",
        })
    }
}

/// A resolved backup request. Built once from the arguments and never changed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackupJob {
    DiskToDisk {
        source: PathBuf,
        destination: PathBuf,
    },
    DiskToFolder {
        source: PathBuf,
        folder: PathBuf,
    },
    ImageToDisk {
        image: PathBuf,
        destination: PathBuf,
    },
}

impl BackupJob {
    /// Selects exactly one mode from `args`.
    ///
    /// A pairing must be complete, and no option outside the pairing may be
    /// present. Anything else is rejected rather than defaulted.
    pub fn resolve(args: BackupArgs) -> Result<Self> {
        let job = match args {
            BackupArgs {
                source: Some(source),
                destination: Some(destination),
                folder,
                image,
            } => {
                reject_extra("-s/-d", &[("-f", folder.is_some()), ("-i", image.is_some())])?;
                BackupJob::DiskToDisk {
                    source,
                    destination,
                }
            }
            BackupArgs {
                source: Some(source),
                destination: None,
                folder: Some(folder),
                image,
            } => {
                reject_extra("-s/-f", &[("-i", image.is_some())])?;
                BackupJob::DiskToFolder { source, folder }
            }
            BackupArgs {
                source: None,
                destination: Some(destination),
                folder,
                image: Some(image),
            } => {
                reject_extra("-i/-d", &[("-f", folder.is_some())])?;
                BackupJob::ImageToDisk { image, destination }
            }
            _ => return Err(BackupError::NoMode),
        };

        job.echo();
        Ok(job)
    }

    pub fn mode(&self) -> Mode {
        match self {
            BackupJob::DiskToDisk { .. } => Mode::DiskToDisk,
            BackupJob::DiskToFolder { .. } => Mode::DiskToFolder,
            BackupJob::ImageToDisk { .. } => Mode::ImageToDisk,
        }
    }

    /// The path data is read from: a block device or an image file.
    pub fn source_path(&self) -> &Path {
        match self {
            BackupJob::DiskToDisk { source, .. } | BackupJob::DiskToFolder { source, .. } => source,
            BackupJob::ImageToDisk { image, .. } => image,
        }
    }

    /// Block devices that must have no mounted partitions before copying.
    pub fn guarded_devices(&self) -> Vec<&Path> {
        match self {
            BackupJob::DiskToDisk {
                source,
                destination,
            } => vec![source.as_path(), destination.as_path()],
            BackupJob::DiskToFolder { source, .. } => vec![source.as_path()],
            BackupJob::ImageToDisk { destination, .. } => vec![destination.as_path()],
        }
    }

    fn echo(&self) {
        info!("Mode: {}", self.mode());
        match self {
            BackupJob::DiskToDisk {
                source,
                destination,
            } => {
                info!("Source disk: {}", source.display());
                info!("Destination disk: {}", destination.display());
            }
            BackupJob::DiskToFolder { source, folder } => {
                info!("Source disk: {}", source.display());
                info!("Destination folder: {}", folder.display());
            }
            BackupJob::ImageToDisk { image, destination } => {
                info!("Image file: {}", image.display());
                info!("Destination disk: {}", destination.display());
            }
        }
    }
}

fn reject_extra(pairing: &'static str, extras: &[(&'static str, bool)]) -> Result<()> {
    match extras.iter().find(|(_, present)| *present) {
        Some((flag, _)) => Err(BackupError::Ambiguous(*flag, pairing)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: Option<&str>, d: Option<&str>, f: Option<&str>, i: Option<&str>) -> BackupArgs {
        BackupArgs {
            source: s.map(PathBuf::from),
            destination: d.map(PathBuf::from),
            folder: f.map(PathBuf::from),
            image: i.map(PathBuf::from),
        }
    }

    #[test]
    fn resolves_disk_to_disk() {
        let job = BackupJob::resolve(args(Some("/dev/sda"), Some("/dev/sdb"), None, None)).unwrap();
        assert_eq!(job.mode(), Mode::DiskToDisk);
        assert_eq!(
            job.guarded_devices(),
            vec![Path::new("/dev/sda"), Path::new("/dev/sdb")]
        );
    }

    #[test]
    fn resolves_disk_to_folder() {
        let job = BackupJob::resolve(args(Some("/dev/sda"), None, Some("/mnt/backup"), None)).unwrap();
        assert_eq!(
            job,
            BackupJob::DiskToFolder {
                source: "/dev/sda".into(),
                folder: "/mnt/backup".into(),
            }
        );
        assert_eq!(job.guarded_devices(), vec![Path::new("/dev/sda")]);
    }

    #[test]
    fn resolves_image_to_disk() {
        let job = BackupJob::resolve(args(None, Some("/dev/sdb"), None, Some("disk.img"))).unwrap();
        assert_eq!(job.mode(), Mode::ImageToDisk);
        assert_eq!(job.source_path(), Path::new("disk.img"));
        assert_eq!(job.guarded_devices(), vec![Path::new("/dev/sdb")]);
    }

    #[test]
    fn incomplete_pairings_are_rejected() {
        let cases = [
            args(None, None, None, None),
            args(Some("/dev/sda"), None, None, None),
            args(None, Some("/dev/sdb"), None, None),
            args(None, None, Some("/mnt"), Some("disk.img")),
            args(None, None, None, Some("disk.img")),
        ];
        for case in cases {
            assert!(matches!(BackupJob::resolve(case), Err(BackupError::NoMode)));
        }
    }

    #[test]
    fn extra_options_are_ambiguous() {
        let err =
            BackupJob::resolve(args(Some("/dev/sda"), Some("/dev/sdb"), Some("/mnt"), None)).unwrap_err();
        assert!(matches!(err, BackupError::Ambiguous("-f", "-s/-d")));

        let err =
            BackupJob::resolve(args(Some("/dev/sda"), None, Some("/mnt"), Some("x.img"))).unwrap_err();
        assert!(matches!(err, BackupError::Ambiguous("-i", "-s/-f")));

        let err = BackupJob::resolve(args(Some("/dev/sda"), Some("/dev/sdb"), None, Some("x.img")))
            .unwrap_err();
        assert!(matches!(err, BackupError::Ambiguous("-i", "-s/-d")));
    }
}
