//! Contains the final confirmation gate and the bulk copy itself.
use crate::device::{Destination, ValidatedJob};
use crate::error::{BackupError, Result};
use crate::host::{CopyStats, Host};
use std::path::PathBuf;
use tracing::{info, warn};

/// Summary of a completed clone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloneReport {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub stats: CopyStats,
}

/// Asks the user for the final go-ahead.
///
/// This gate is separate from the overwrite prompt in preflight and is the
/// last point where the run can stop without writing anything.
pub fn confirm(job: &ValidatedJob, host: &Host<'_>) -> Result<()> {
    let target = job.destination().target();
    if matches!(job.destination(), Destination::Disk { .. }) {
        warn!("All data on {} will be destroyed", target.display());
    }

    let prompt = format!(
        "Copy {} to {}? Are you sure?",
        job.source().path().display(),
        target.display()
    );
    if host.prompt.confirm(&prompt).map_err(BackupError::Prompt)? {
        Ok(())
    } else {
        warn!("Backup aborted, nothing was written");
        Err(BackupError::Declined("backup"))
    }
}

/// Copies the source of `job` onto its destination, then syncs.
///
/// Progress is reported through callbacks like the rest of the library:
/// `on_copy_start` gets the total byte count once, and `on_progress` gets
/// the running total after each block.
///
/// # Errors
///
/// Returns [`BackupError::Copy`] when the copy cannot start or cannot reach
/// the end, when the destination fills up, or when no block could be written.
/// Isolated unreadable or unwritable blocks are not errors here; they show up
/// in [`CopyStats`]. Returns [`BackupError::Sync`] when the final flush fails.
pub fn run<F>(
    job: &ValidatedJob,
    host: &Host<'_>,
    on_copy_start: impl FnOnce(u64),
    mut on_progress: F,
) -> Result<CloneReport>
where
    F: FnMut(u64),
{
    let from = job.source().path();
    let to = job.destination().target();
    let len = job.source().size();

    info!("Copying {} bytes from {} to {}", len, from.display(), to.display());
    on_copy_start(len);

    let stats = host
        .copier
        .copy(from, to, len, &mut on_progress)
        .map_err(|source| BackupError::Copy {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        })?;

    info!("Syncing buffered writes to disk");
    host.copier.sync().map_err(BackupError::Sync)?;

    if !stats.is_clean() {
        warn!(
            "Copy finished with {} zero-filled and {} skipped blocks",
            stats.zero_filled_blocks, stats.skipped_blocks
        );
    }

    Ok(CloneReport {
        source: from.to_path_buf(),
        destination: to.to_path_buf(),
        stats,
    })
}
