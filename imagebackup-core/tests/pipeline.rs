//! End-to-end pipeline tests against an in-memory host.
//!
//! `FakeHost` stands in for the kernel: it knows which paths exist, how big
//! they are and what is mounted. It records every unmount, copy, sync and
//! prompt in order, so the tests can check what ran and in which order.

use chrono::NaiveDate;
use imagebackup_core::backup::{Backup, Stage};
use imagebackup_core::config::Settings;
use imagebackup_core::host::{
    BulkCopier, Confirm, CopyStats, DeviceSizeQuery, FileSizeQuery, FileTypeSniffer,
    FreeSpaceQuery, Host, MountEntry, MountEnumerator, PathKind, PathProbe, PrivilegeCheck,
    Unmounter,
};
use imagebackup_core::job::BackupArgs;
use imagebackup_core::{BackupError, ErrorClass};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Prompt(String),
    Unmount(PathBuf),
    Copy { from: PathBuf, to: PathBuf, len: u64 },
    Sync,
}

#[derive(Default)]
struct FakeHost {
    root: bool,
    kinds: HashMap<PathBuf, PathKind>,
    sizes: HashMap<PathBuf, u64>,
    free: HashMap<PathBuf, u64>,
    boot_images: HashSet<PathBuf>,
    mounts: Vec<MountEntry>,
    busy: HashSet<PathBuf>,
    copy_fails: bool,
    answers: RefCell<VecDeque<bool>>,
    events: RefCell<Vec<Event>>,
}

impl FakeHost {
    fn new() -> Self {
        Self {
            root: true,
            ..Default::default()
        }
    }

    fn disk(mut self, path: &str, size: u64) -> Self {
        self.kinds.insert(path.into(), PathKind::BlockDevice);
        self.sizes.insert(path.into(), size);
        self
    }

    fn folder(mut self, path: &str, free: u64) -> Self {
        self.kinds.insert(path.into(), PathKind::Directory);
        self.free.insert(path.into(), free);
        self
    }

    fn file(mut self, path: &str, size: u64, boot_sector: bool) -> Self {
        self.kinds.insert(path.into(), PathKind::File);
        self.sizes.insert(path.into(), size);
        if boot_sector {
            self.boot_images.insert(path.into());
        }
        self
    }

    fn mounted(mut self, device: &str, mount_point: &str) -> Self {
        self.mounts.push(MountEntry {
            device: device.into(),
            mount_point: mount_point.into(),
            fs_type: "ext4".into(),
        });
        self
    }

    fn answers(self, answers: &[bool]) -> Self {
        self.answers.borrow_mut().extend(answers.iter().copied());
        self
    }

    fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    fn copied(&self) -> bool {
        self.events()
            .iter()
            .any(|e| matches!(e, Event::Copy { .. }))
    }

    fn unmounts(&self) -> Vec<PathBuf> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Unmount(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    fn prompts(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Prompt(_)))
            .count()
    }
}

fn missing(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, path.display().to_string())
}

impl PrivilegeCheck for FakeHost {
    fn is_superuser(&self) -> bool {
        self.root
    }
}

impl PathProbe for FakeHost {
    fn kind(&self, path: &Path) -> PathKind {
        self.kinds.get(path).copied().unwrap_or(PathKind::Missing)
    }
}

impl DeviceSizeQuery for FakeHost {
    fn device_size(&self, device: &Path) -> io::Result<u64> {
        self.sizes.get(device).copied().ok_or_else(|| missing(device))
    }
}

impl FileSizeQuery for FakeHost {
    fn file_size(&self, file: &Path) -> io::Result<u64> {
        self.sizes.get(file).copied().ok_or_else(|| missing(file))
    }
}

impl FreeSpaceQuery for FakeHost {
    fn available_space(&self, dir: &Path) -> io::Result<u64> {
        self.free.get(dir).copied().ok_or_else(|| missing(dir))
    }
}

impl FileTypeSniffer for FakeHost {
    fn is_boot_sector_image(&self, file: &Path) -> io::Result<bool> {
        Ok(self.boot_images.contains(file))
    }
}

impl MountEnumerator for FakeHost {
    fn mounts(&self) -> io::Result<Vec<MountEntry>> {
        Ok(self.mounts.clone())
    }
}

impl Unmounter for FakeHost {
    fn unmount(&self, mount_point: &Path) -> io::Result<()> {
        self.events
            .borrow_mut()
            .push(Event::Unmount(mount_point.to_path_buf()));
        if self.busy.contains(mount_point) {
            return Err(io::Error::new(io::ErrorKind::ResourceBusy, "target is busy"));
        }
        Ok(())
    }
}

impl BulkCopier for FakeHost {
    fn copy(
        &self,
        from: &Path,
        to: &Path,
        len: u64,
        on_progress: &mut dyn FnMut(u64),
    ) -> io::Result<CopyStats> {
        self.events.borrow_mut().push(Event::Copy {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            len,
        });
        if self.copy_fails {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "open failed"));
        }
        on_progress(len / 2);
        on_progress(len);
        Ok(CopyStats {
            bytes: len,
            ..Default::default()
        })
    }

    fn sync(&self) -> io::Result<()> {
        self.events.borrow_mut().push(Event::Sync);
        Ok(())
    }
}

impl Confirm for FakeHost {
    fn confirm(&self, prompt: &str) -> io::Result<bool> {
        self.events
            .borrow_mut()
            .push(Event::Prompt(prompt.to_string()));
        Ok(self.answers.borrow_mut().pop_front().unwrap_or(false))
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

fn args(s: Option<&str>, d: Option<&str>, f: Option<&str>, i: Option<&str>) -> BackupArgs {
    BackupArgs {
        source: s.map(PathBuf::from),
        destination: d.map(PathBuf::from),
        folder: f.map(PathBuf::from),
        image: i.map(PathBuf::from),
    }
}

struct Outcome {
    result: Result<imagebackup_core::clone::CloneReport, BackupError>,
    stage: Stage,
    failed_at: Option<Stage>,
    progress: Vec<u64>,
}

fn run(fake: &FakeHost, args: BackupArgs) -> Outcome {
    let host = Host::from_single(fake, fake);
    let mut backup = Backup::new(host, Settings::default());
    let mut progress = Vec::new();
    let mut total = None;
    let result = backup.run(args, today(), |len| total = Some(len), |b| progress.push(b));
    if result.is_ok() {
        assert_eq!(total, progress.last().copied());
    }
    Outcome {
        result,
        stage: backup.stage(),
        failed_at: backup.failed_at(),
        progress,
    }
}

const GB: u64 = 1_000_000_000;

#[test]
fn disk_to_disk_runs_every_stage_in_order() {
    let fake = FakeHost::new()
        .disk("/dev/sda", 8 * GB)
        .disk("/dev/sdb", 16 * GB)
        .mounted("/dev/sda1", "/media/a")
        .mounted("/dev/sdb2", "/media/b")
        .answers(&[true]);

    let outcome = run(&fake, args(Some("/dev/sda"), Some("/dev/sdb"), None, None));

    let report = outcome.result.unwrap();
    assert_eq!(report.destination, PathBuf::from("/dev/sdb"));
    assert_eq!(report.stats.bytes, 8 * GB);
    assert_eq!(outcome.stage, Stage::Done);
    assert_eq!(outcome.progress, vec![4 * GB, 8 * GB]);

    let events = fake.events();
    assert_eq!(events.len(), 5);
    assert_eq!(events[0], Event::Unmount("/media/a".into()));
    assert_eq!(events[1], Event::Unmount("/media/b".into()));
    assert!(matches!(events[2], Event::Prompt(_)));
    assert_eq!(
        events[3],
        Event::Copy {
            from: "/dev/sda".into(),
            to: "/dev/sdb".into(),
            len: 8 * GB,
        }
    );
    assert_eq!(events[4], Event::Sync);
}

#[test]
fn missing_source_disk_is_named() {
    let fake = FakeHost::new();

    let outcome = run(&fake, args(Some("/dev/sda"), Some("/dev/sdb"), None, None));

    let err = outcome.result.unwrap_err();
    assert!(matches!(err, BackupError::MissingBlockDevice(ref p) if p == Path::new("/dev/sda")));
    assert!(err.to_string().contains("/dev/sda"));
    assert_eq!(err.class(), ErrorClass::Precondition);
    assert_eq!(outcome.stage, Stage::Failed);
    assert_eq!(outcome.failed_at, Some(Stage::ModeResolved));
    assert!(fake.events().is_empty());
}

#[test]
fn non_root_fails_before_any_other_check() {
    let mut fake = FakeHost::new().disk("/dev/sda", GB).disk("/dev/sdb", GB);
    fake.root = false;

    let outcome = run(&fake, args(Some("/dev/sda"), Some("/dev/sdb"), None, None));

    assert!(matches!(outcome.result, Err(BackupError::NotRoot)));
    assert!(fake.events().is_empty());
}

#[test]
fn unresolvable_arguments_are_a_usage_error() {
    let fake = FakeHost::new().disk("/dev/sda", GB);

    let outcome = run(&fake, args(Some("/dev/sda"), None, None, None));

    let err = outcome.result.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Usage);
    assert_eq!(outcome.failed_at, Some(Stage::Start));
    assert!(fake.events().is_empty());
}

#[test]
fn larger_source_disk_aborts_before_copy() {
    let fake = FakeHost::new()
        .disk("/dev/sda", 16 * GB)
        .disk("/dev/sdb", 8 * GB)
        .mounted("/dev/sdb1", "/media/b")
        .answers(&[true]);

    let outcome = run(&fake, args(Some("/dev/sda"), Some("/dev/sdb"), None, None));

    assert!(matches!(
        outcome.result,
        Err(BackupError::DestinationTooSmall {
            required,
            available,
            ..
        }) if required == 16 * GB && available == 8 * GB
    ));
    assert!(fake.events().is_empty());
}

#[test]
fn equal_sizes_are_allowed() {
    let fake = FakeHost::new()
        .disk("/dev/sda", 8 * GB)
        .disk("/dev/sdb", 8 * GB)
        .answers(&[true]);

    let outcome = run(&fake, args(Some("/dev/sda"), Some("/dev/sdb"), None, None));

    assert!(outcome.result.is_ok());
}

#[test]
fn same_device_is_rejected() {
    let fake = FakeHost::new().disk("/dev/sda", 8 * GB).answers(&[true]);

    let outcome = run(&fake, args(Some("/dev/sda"), Some("/dev/sda"), None, None));

    assert!(matches!(outcome.result, Err(BackupError::SameDevice(_))));
    assert!(!fake.copied());
}

#[test]
fn insufficient_host_space_aborts_before_unmount() {
    let fake = FakeHost::new()
        .disk("/dev/sda", 8 * GB)
        .folder("/mnt/backup", 5 * GB)
        .mounted("/dev/sda1", "/media/a")
        .answers(&[true, true]);

    let outcome = run(&fake, args(Some("/dev/sda"), None, Some("/mnt/backup"), None));

    let err = outcome.result.unwrap_err();
    assert!(err.to_string().starts_with("Host disk space is not enough"));
    assert!(fake.events().is_empty());
}

#[test]
fn disk_to_folder_writes_dated_image() {
    let fake = FakeHost::new()
        .disk("/dev/sda", 8 * GB)
        .folder("/mnt/backup", 9 * GB)
        .mounted("/dev/sda1", "/media/a")
        .answers(&[true]);

    let outcome = run(&fake, args(Some("/dev/sda"), None, Some("/mnt/backup"), None));

    let report = outcome.result.unwrap();
    assert_eq!(report.destination, PathBuf::from("/mnt/backup/image-191026.img"));
    assert_eq!(fake.unmounts(), vec![PathBuf::from("/media/a")]);
    assert_eq!(fake.prompts(), 1);
    assert_eq!(fake.events().last(), Some(&Event::Sync));
}

#[test]
fn declined_overwrite_writes_nothing() {
    let fake = FakeHost::new()
        .disk("/dev/sda", 8 * GB)
        .folder("/mnt/backup", 9 * GB)
        .file("/mnt/backup/image-191026.img", GB, true)
        .mounted("/dev/sda1", "/media/a")
        .answers(&[false, true]);

    let outcome = run(&fake, args(Some("/dev/sda"), None, Some("/mnt/backup"), None));

    let err = outcome.result.unwrap_err();
    assert!(matches!(err, BackupError::Declined("overwrite")));
    assert_eq!(err.class(), ErrorClass::Declined);
    assert_eq!(fake.prompts(), 1);
    assert!(fake.unmounts().is_empty());
    assert!(!fake.copied());
}

#[test]
fn confirmed_overwrite_asks_again_before_copy() {
    let fake = FakeHost::new()
        .disk("/dev/sda", 8 * GB)
        .folder("/mnt/backup", 9 * GB)
        .file("/mnt/backup/image-191026.img", GB, true)
        .answers(&[true, true]);

    let outcome = run(&fake, args(Some("/dev/sda"), None, Some("/mnt/backup"), None));

    assert!(outcome.result.is_ok());
    assert_eq!(fake.prompts(), 2);
}

#[test]
fn declined_final_confirmation_stops_after_unmount() {
    let fake = FakeHost::new()
        .disk("/dev/sda", 8 * GB)
        .disk("/dev/sdb", 8 * GB)
        .mounted("/dev/sdb1", "/media/b")
        .answers(&[false]);

    let outcome = run(&fake, args(Some("/dev/sda"), Some("/dev/sdb"), None, None));

    assert!(matches!(outcome.result, Err(BackupError::Declined("backup"))));
    assert_eq!(outcome.failed_at, Some(Stage::Unmounted));
    assert!(!fake.copied());
}

#[test]
fn image_without_boot_signature_is_invalid() {
    let fake = FakeHost::new()
        .file("backup.img", GB, false)
        .disk("/dev/sdb", 8 * GB)
        .answers(&[true]);

    let outcome = run(&fake, args(None, Some("/dev/sdb"), None, Some("backup.img")));

    let err = outcome.result.unwrap_err();
    assert!(matches!(err, BackupError::InvalidImage(_)));
    assert!(err.to_string().starts_with("invalid image"));
    assert!(!fake.copied());
}

#[test]
fn missing_image_is_reported() {
    let fake = FakeHost::new().disk("/dev/sdb", 8 * GB);

    let outcome = run(&fake, args(None, Some("/dev/sdb"), None, Some("backup.img")));

    assert!(matches!(outcome.result, Err(BackupError::MissingImage(_))));
}

#[test]
fn image_larger_than_disk_aborts() {
    let fake = FakeHost::new()
        .file("backup.img", 9 * GB, true)
        .disk("/dev/sdb", 8 * GB)
        .answers(&[true]);

    let outcome = run(&fake, args(None, Some("/dev/sdb"), None, Some("backup.img")));

    assert!(matches!(outcome.result, Err(BackupError::DestinationTooSmall { .. })));
    assert!(!fake.copied());
}

#[test]
fn image_to_disk_unmounts_destination_only() {
    let fake = FakeHost::new()
        .file("backup.img", 4 * GB, true)
        .disk("/dev/sdb", 8 * GB)
        .mounted("/dev/sda1", "/")
        .mounted("/dev/sdb1", "/media/b1")
        .mounted("/dev/sdb2", "/media/b2")
        .answers(&[true]);

    let outcome = run(&fake, args(None, Some("/dev/sdb"), None, Some("backup.img")));

    assert!(outcome.result.is_ok());
    assert_eq!(
        fake.unmounts(),
        vec![PathBuf::from("/media/b2"), PathBuf::from("/media/b1")]
    );
}

#[test]
fn failed_unmount_prevents_copy() {
    let mut fake = FakeHost::new()
        .disk("/dev/sda", 8 * GB)
        .disk("/dev/sdb", 8 * GB)
        .mounted("/dev/sda1", "/media/a")
        .answers(&[true]);
    fake.busy.insert("/media/a".into());

    let outcome = run(&fake, args(Some("/dev/sda"), Some("/dev/sdb"), None, None));

    let err = outcome.result.unwrap_err();
    assert!(matches!(err, BackupError::Unmount { .. }));
    assert_eq!(err.class(), ErrorClass::Operational);
    assert_eq!(outcome.failed_at, Some(Stage::Validated));
    assert_eq!(fake.prompts(), 0);
    assert!(!fake.copied());
}

#[test]
fn failed_copy_skips_sync() {
    let mut fake = FakeHost::new()
        .disk("/dev/sda", 8 * GB)
        .disk("/dev/sdb", 8 * GB)
        .answers(&[true]);
    fake.copy_fails = true;

    let outcome = run(&fake, args(Some("/dev/sda"), Some("/dev/sdb"), None, None));

    assert!(matches!(outcome.result, Err(BackupError::Copy { .. })));
    assert_eq!(outcome.failed_at, Some(Stage::Copying));
    assert!(!fake.events().contains(&Event::Sync));
}
