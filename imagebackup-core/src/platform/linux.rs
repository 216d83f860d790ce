use crate::config::Settings;
use crate::copy::BlockCopier;
use crate::host::{
    BulkCopier, CopyStats, DeviceSizeQuery, FileSizeQuery, FileTypeSniffer, FreeSpaceQuery,
    MountEntry, MountEnumerator, PathKind, PathProbe, PrivilegeCheck, Unmounter,
};
use crate::mount::parse_mounts;
use nix::ioctl_read;
use nix::sys::statvfs::statvfs;
use std::fs::{self, File};
use std::io::{self, Read};
use std::os::unix::fs::FileTypeExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

ioctl_read!(blkgetsize64, 0x12, 114, u64);

/// Length of the boot sector inspected by the image sniffer.
const BOOT_SECTOR_LEN: usize = 512;
/// `0x55 0xAA` at the end of the first sector marks a DOS/MBR boot sector.
const BOOT_SIGNATURE: [u8; 2] = [0x55, 0xAA];

/// Returns `true` if `sector` ends with the DOS/MBR boot signature.
pub fn has_boot_signature(sector: &[u8]) -> bool {
    sector.len() >= BOOT_SECTOR_LEN && sector[BOOT_SECTOR_LEN - 2..BOOT_SECTOR_LEN] == BOOT_SIGNATURE
}

/// Talks to the running Linux kernel for every host interface.
#[derive(Clone, Debug)]
pub struct LinuxHost {
    mounts_path: PathBuf,
    copier: BlockCopier,
}

impl LinuxHost {
    pub fn new(settings: &Settings) -> Self {
        Self {
            mounts_path: settings.mounts_path.clone(),
            copier: BlockCopier::new(settings.block_size),
        }
    }
}

impl Default for LinuxHost {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}

impl PrivilegeCheck for LinuxHost {
    fn is_superuser(&self) -> bool {
        nix::unistd::Uid::effective().is_root()
    }
}

impl PathProbe for LinuxHost {
    fn kind(&self, path: &Path) -> PathKind {
        match fs::metadata(path) {
            Ok(meta) if meta.file_type().is_block_device() => PathKind::BlockDevice,
            Ok(meta) if meta.is_dir() => PathKind::Directory,
            Ok(meta) if meta.is_file() => PathKind::File,
            Ok(_) => PathKind::Other,
            Err(_) => PathKind::Missing,
        }
    }
}

impl DeviceSizeQuery for LinuxHost {
    fn device_size(&self, device: &Path) -> io::Result<u64> {
        let file = File::open(device)?;
        let mut size_bytes: u64 = 0;
        // SAFETY: BLKGETSIZE64 writes a single u64 into `size_bytes`, and
        // `file` keeps the descriptor open for the duration of the call.
        unsafe {
            blkgetsize64(file.as_raw_fd(), &mut size_bytes).map_err(io::Error::from)?;
        }
        Ok(size_bytes)
    }
}

impl FileSizeQuery for LinuxHost {
    fn file_size(&self, file: &Path) -> io::Result<u64> {
        Ok(fs::metadata(file)?.len())
    }
}

impl FreeSpaceQuery for LinuxHost {
    /// Asks the filesystem that actually holds `dir`, so nested and virtual
    /// mounts (tmpfs included) report their own free space.
    fn available_space(&self, dir: &Path) -> io::Result<u64> {
        let stats = statvfs(dir).map_err(io::Error::from)?;
        Ok(u64::from(stats.blocks_available()).saturating_mul(u64::from(stats.fragment_size())))
    }
}

impl FileTypeSniffer for LinuxHost {
    fn is_boot_sector_image(&self, file: &Path) -> io::Result<bool> {
        let mut sector = Vec::with_capacity(BOOT_SECTOR_LEN);
        File::open(file)?
            .take(BOOT_SECTOR_LEN as u64)
            .read_to_end(&mut sector)?;
        Ok(has_boot_signature(&sector))
    }
}

impl MountEnumerator for LinuxHost {
    fn mounts(&self) -> io::Result<Vec<MountEntry>> {
        Ok(parse_mounts(&fs::read_to_string(&self.mounts_path)?))
    }
}

impl Unmounter for LinuxHost {
    fn unmount(&self, mount_point: &Path) -> io::Result<()> {
        nix::mount::umount(mount_point).map_err(io::Error::from)
    }
}

impl BulkCopier for LinuxHost {
    fn copy(
        &self,
        from: &Path,
        to: &Path,
        len: u64,
        on_progress: &mut dyn FnMut(u64),
    ) -> io::Result<CopyStats> {
        self.copier.copy_path(from, to, len, on_progress)
    }

    fn sync(&self) -> io::Result<()> {
        nix::unistd::sync();
        Ok(())
    }
}
