//! The core, UI-agnostic library for the `imagebackup` disk cloning utility.
//!
//! `imagebackup-core` runs one backup per call in one of three modes: disk to
//! disk, disk to an image file in a folder, or image file to disk. The copy is
//! destructive and cannot be undone, so most of the library is checks that
//! fail fast before anything is written.
//!
//! The library is structured into several key modules:
//! - [`job`]: Resolves the requested mode from the recognized options.
//! - [`preflight`]: Privilege, existence, image-format, capacity and overwrite checks.
//! - [`mount`]: Unmounts any partition of a device the job touches.
//! - [`mod@clone`]: The final confirmation and the bulk copy followed by a sync.
//! - [`backup`]: Drives the stages above in order.
//! - [`host`]: The narrow traits through which all of the above reach the system.
//! - [`platform`]: The Linux implementation of those traits.
//!
//! The primary entry point is [`backup::Backup::run`]. Like the rest of the
//! library, it reports progress via callbacks, so the calling application can
//! display progress in any way it chooses.
//!
//! ## Example: Capturing a Disk Image
//!
//! ```rust,no_run
//! use imagebackup_core::backup::Backup;
//! use imagebackup_core::config::Settings;
//! use imagebackup_core::host::{Confirm, Host};
//! use imagebackup_core::job::BackupArgs;
//! use imagebackup_core::platform::LinuxHost;
//! use std::io;
//!
//! struct AlwaysYes;
//!
//! impl Confirm for AlwaysYes {
//!     fn confirm(&self, _prompt: &str) -> io::Result<bool> {
//!         Ok(true)
//!     }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::default();
//!     let linux = LinuxHost::new(&settings);
//!     let host = Host::from_single(&linux, &AlwaysYes);
//!
//!     let args = BackupArgs {
//!         source: Some("/dev/sdb".into()),
//!         folder: Some("/mnt/backup".into()),
//!         ..Default::default()
//!     };
//!
//!     let today = chrono::Local::now().date_naive();
//!     let report = Backup::new(host, settings).run(
//!         args,
//!         today,
//!         |total| println!("copying {total} bytes"),
//!         |done| println!("{done} bytes copied"),
//!     )?;
//!
//!     println!("Wrote {}", report.destination.display());
//!     Ok(())
//! }
//! ```

pub mod backup;
pub mod clone;
pub mod config;
pub mod copy;
pub mod device;
pub mod error;
pub mod host;
pub mod job;
pub mod mount;
pub mod platform;
pub mod preflight;

pub use error::{BackupError, ErrorClass};
