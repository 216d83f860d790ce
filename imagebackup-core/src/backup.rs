//! Drives one backup from arguments to a synced copy.
use crate::clone::{self, CloneReport};
use crate::config::Settings;
use crate::device::ValidatedJob;
use crate::error::Result;
use crate::host::Host;
use crate::job::{BackupArgs, BackupJob};
use crate::{mount, preflight};
use chrono::NaiveDate;
use std::fmt;
use tracing::{debug, info};

/// Progress of a single invocation.
///
/// Stages only move forward. Any error moves the run to `Failed`, which is
/// final; nothing is retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Start,
    ModeResolved,
    Validated,
    Unmounted,
    Confirmed,
    Copying,
    Synced,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::ModeResolved => "mode resolved",
            Stage::Validated => "validated",
            Stage::Unmounted => "unmounted",
            Stage::Confirmed => "confirmed",
            Stage::Copying => "copying",
            Stage::Synced => "synced",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One backup invocation.
pub struct Backup<'h> {
    host: Host<'h>,
    settings: Settings,
    stage: Stage,
    failed_at: Option<Stage>,
}

impl<'h> Backup<'h> {
    pub fn new(host: Host<'h>, settings: Settings) -> Self {
        Self {
            host,
            settings,
            stage: Stage::Start,
            failed_at: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The last stage reached before the run failed, if it did.
    pub fn failed_at(&self) -> Option<Stage> {
        self.failed_at
    }

    /// Resolves, validates, unmounts, confirms, copies and syncs.
    ///
    /// When this returns, the stage is either `Done` or `Failed`.
    pub fn run<F>(
        &mut self,
        args: BackupArgs,
        today: NaiveDate,
        on_copy_start: impl FnOnce(u64),
        on_progress: F,
    ) -> Result<CloneReport>
    where
        F: FnMut(u64),
    {
        let result = self.run_stages(args, today, on_copy_start, on_progress);
        if let Err(e) = &result {
            debug!("Backup failed during stage '{}': {e}", self.stage);
            self.failed_at = Some(self.stage);
            self.stage = Stage::Failed;
        }
        result
    }

    fn run_stages<F>(
        &mut self,
        args: BackupArgs,
        today: NaiveDate,
        on_copy_start: impl FnOnce(u64),
        on_progress: F,
    ) -> Result<CloneReport>
    where
        F: FnMut(u64),
    {
        let job = BackupJob::resolve(args)?;
        self.advance(Stage::ModeResolved);

        let validated = preflight::validate(&job, &self.host, &self.settings, today)?;
        info!("All checks passed: {validated}");
        self.advance(Stage::Validated);

        self.unmount(&validated)?;
        self.advance(Stage::Unmounted);

        clone::confirm(&validated, &self.host)?;
        self.advance(Stage::Confirmed);

        self.advance(Stage::Copying);
        let report = clone::run(&validated, &self.host, on_copy_start, on_progress)?;
        self.advance(Stage::Synced);

        self.advance(Stage::Done);
        Ok(report)
    }

    fn unmount(&self, validated: &ValidatedJob) -> Result<()> {
        for device in validated.job().guarded_devices() {
            mount::unmount_device(device, self.host.mounts, self.host.unmounter)?;
        }
        Ok(())
    }

    fn advance(&mut self, next: Stage) {
        debug!("Stage: {} -> {}", self.stage, next);
        self.stage = next;
    }
}
