//! Narrow interfaces to everything outside the process.
//!
//! Each check and action in the pipeline talks to the system through one of
//! these traits. [`crate::platform::LinuxHost`] implements all of them with
//! real system calls. Tests substitute in-memory fakes, so no real block
//! device is ever needed to exercise the checks.
use std::io;
use std::path::{Path, PathBuf};

/// What a path refers to on the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathKind {
    BlockDevice,
    Directory,
    File,
    Other,
    Missing,
}

/// A single line of the live mount table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MountEntry {
    /// The mounted device, e.g. `/dev/sda1`.
    pub device: PathBuf,
    pub mount_point: PathBuf,
    pub fs_type: String,
}

/// Outcome of a bulk copy that ran to completion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CopyStats {
    /// Bytes of output produced, including zero-filled blocks.
    pub bytes: u64,
    /// Blocks that could not be read and were replaced by zeros.
    pub zero_filled_blocks: u64,
    /// Blocks that could not be written and were skipped.
    pub skipped_blocks: u64,
}

impl CopyStats {
    pub fn is_clean(&self) -> bool {
        self.zero_filled_blocks == 0 && self.skipped_blocks == 0
    }
}

pub trait PrivilegeCheck {
    /// `true` when the process runs with superuser privileges.
    fn is_superuser(&self) -> bool;
}

pub trait PathProbe {
    fn kind(&self, path: &Path) -> PathKind;
}

pub trait DeviceSizeQuery {
    fn device_size(&self, device: &Path) -> io::Result<u64>;
}

pub trait FileSizeQuery {
    fn file_size(&self, file: &Path) -> io::Result<u64>;
}

pub trait FreeSpaceQuery {
    /// Bytes available to this process on the filesystem holding `dir`.
    fn available_space(&self, dir: &Path) -> io::Result<u64>;
}

pub trait FileTypeSniffer {
    /// Inspects content, never the extension.
    fn is_boot_sector_image(&self, file: &Path) -> io::Result<bool>;
}

pub trait MountEnumerator {
    fn mounts(&self) -> io::Result<Vec<MountEntry>>;
}

pub trait Unmounter {
    fn unmount(&self, mount_point: &Path) -> io::Result<()>;
}

pub trait BulkCopier {
    /// Copies `len` bytes from `from` to `to`.
    ///
    /// Unreadable blocks become zeros and unwritable blocks are skipped, so
    /// output offsets always match source offsets. `on_progress` receives the
    /// running byte total. An error means the copy as a whole failed.
    fn copy(
        &self,
        from: &Path,
        to: &Path,
        len: u64,
        on_progress: &mut dyn FnMut(u64),
    ) -> io::Result<CopyStats>;

    /// Flushes all buffered writes on the host to stable storage.
    fn sync(&self) -> io::Result<()>;
}

pub trait Confirm {
    /// Asks `prompt` and returns `true` only for an explicit affirmative answer.
    fn confirm(&self, prompt: &str) -> io::Result<bool>;
}

/// One implementation of every host interface, borrowed for a single run.
#[derive(Clone, Copy)]
pub struct Host<'a> {
    pub privileges: &'a dyn PrivilegeCheck,
    pub paths: &'a dyn PathProbe,
    pub device_sizes: &'a dyn DeviceSizeQuery,
    pub file_sizes: &'a dyn FileSizeQuery,
    pub free_space: &'a dyn FreeSpaceQuery,
    pub sniffer: &'a dyn FileTypeSniffer,
    pub mounts: &'a dyn MountEnumerator,
    pub unmounter: &'a dyn Unmounter,
    pub copier: &'a dyn BulkCopier,
    pub prompt: &'a dyn Confirm,
}

impl<'a> Host<'a> {
    /// Borrows every interface from a single value that implements them all.
    pub fn from_single<T>(host: &'a T, prompt: &'a dyn Confirm) -> Self
    where
        T: PrivilegeCheck
            + PathProbe
            + DeviceSizeQuery
            + FileSizeQuery
            + FreeSpaceQuery
            + FileTypeSniffer
            + MountEnumerator
            + Unmounter
            + BulkCopier,
    {
        Self {
            privileges: host,
            paths: host,
            device_sizes: host,
            file_sizes: host,
            free_space: host,
            sniffer: host,
            mounts: host,
            unmounter: host,
            copier: host,
            prompt,
        }
    }
}
