mod logging;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use console::style;
use dialoguer::{Input, theme::ColorfulTheme};
use imagebackup_core::backup::Backup;
use imagebackup_core::clone::CloneReport;
use imagebackup_core::config::Settings;
use imagebackup_core::host::{Confirm, Host};
use imagebackup_core::job::BackupArgs;
use imagebackup_core::platform::LinuxHost;
use imagebackup_core::{BackupError, ErrorClass};
use indicatif::{ProgressBar, ProgressStyle};
use logging::LogThrottle;
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};

/// Every non-help invocation is exactly two flag/value pairs.
const REQUIRED_TOKENS: usize = 4;

#[derive(Parser, Debug)]
#[command(name = "imagebackup")]
#[command(
    about = "Clone a disk to a disk, capture a disk to an image, or restore an image to a disk",
    override_usage = "imagebackup -s <SOURCE_DISK> -d <DESTINATION_DISK>\n       \
                      imagebackup -s <SOURCE_DISK> -f <FOLDER>\n       \
                      imagebackup -i <IMAGE> -d <DESTINATION_DISK>\n       \
                      imagebackup -h"
)]
struct Cli {
    /// Source block device to read from
    #[arg(short = 's', value_name = "SOURCE_DISK")]
    source: Option<PathBuf>,

    /// Destination block device to overwrite
    #[arg(short = 'd', value_name = "DESTINATION_DISK")]
    destination: Option<PathBuf>,

    /// Folder to write a dated image-DDMMYY.img into
    #[arg(short = 'f', value_name = "FOLDER")]
    folder: Option<PathBuf>,

    /// Disk image to restore
    #[arg(short = 'i', value_name = "IMAGE")]
    image: Option<PathBuf>,
}

impl From<Cli> for BackupArgs {
    fn from(cli: Cli) -> Self {
        BackupArgs {
            source: cli.source,
            destination: cli.destination,
            folder: cli.folder,
            image: cli.image,
        }
    }
}

/// What the command line asked for.
#[derive(Debug)]
enum Invocation {
    Run(Cli),
    /// `-h`; clap has already rendered the text.
    Info(clap::Error),
    /// Anything malformed. Usage is printed and the process exits 1.
    Usage(String),
}

fn parse_invocation<I, T>(argv: I) -> Invocation
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let argv: Vec<OsString> = argv.into_iter().map(Into::into).collect();
    let given = argv.len().saturating_sub(1);

    match Cli::try_parse_from(argv.iter()) {
        Err(e) if e.kind() == ErrorKind::DisplayHelp => Invocation::Info(e),
        Err(e) => Invocation::Usage(clap_reason(&e)),
        Ok(_) if given != REQUIRED_TOKENS => Invocation::Usage(format!(
            "expected {REQUIRED_TOKENS} arguments, got {given}"
        )),
        Ok(cli) => Invocation::Run(cli),
    }
}

/// First line of clap's rendered error, e.g. `unexpected argument '-x' found`.
fn clap_reason(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let line = rendered.lines().next().unwrap_or_default();
    line.strip_prefix("error: ").unwrap_or(line).trim().to_string()
}

fn print_usage() {
    eprintln!("{}", Cli::command().render_help());
}

/// Confirmation prompt on the controlling terminal.
struct TerminalPrompt<'a> {
    settings: &'a Settings,
}

impl Confirm for TerminalPrompt<'_> {
    fn confirm(&self, prompt: &str) -> io::Result<bool> {
        let answer: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("{prompt} [y/N]"))
            .allow_empty(true)
            .interact_text()
            .map_err(io::Error::from)?;

        Ok(self.settings.is_affirmative(&answer))
    }
}

/// The closing line; a copy with damaged blocks is never called a success.
fn completion_message(report: &CloneReport) -> String {
    let stats = &report.stats;
    if stats.is_clean() {
        format!(
            "\n✨ Successfully copied {} to {} ({} bytes).",
            style(report.source.display()).cyan(),
            style(report.destination.display()).cyan(),
            stats.bytes,
        )
    } else {
        format!(
            "\n{} Copied {} to {} ({} bytes) with {} zero-filled and {} skipped blocks.",
            style("⚠").yellow(),
            style(report.source.display()).cyan(),
            style(report.destination.display()).cyan(),
            stats.bytes,
            stats.zero_filled_blocks,
            stats.skipped_blocks,
        )
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::default();
    let linux = LinuxHost::new(&settings);
    let prompt = TerminalPrompt {
        settings: &settings,
    };
    let host = Host::from_single(&linux, &prompt);

    let interactive = io::stderr().is_terminal();
    let copy_pb = if interactive {
        ProgressBar::new(0)
    } else {
        ProgressBar::hidden()
    };
    let bar_style = ProgressStyle::default_bar()
        .template(
            "{prefix:12} [{elapsed_precise}] [{bar:40.green/black}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
        )?
        .progress_chars("■ ");
    let throttle = LogThrottle::new(Duration::from_secs(5));

    let on_copy_start = |len| {
        copy_pb.set_length(len);
        copy_pb.set_prefix("Copying");
        copy_pb.set_style(bar_style.clone());
    };
    let on_progress = |bytes| {
        copy_pb.set_position(bytes);
        if !interactive && throttle.should_log() {
            info!("{} of {} bytes copied", bytes, copy_pb.length().unwrap_or(0));
        }
    };

    let today = chrono::Local::now().date_naive();
    let mut backup = Backup::new(host, settings.clone());
    match backup.run(cli.into(), today, on_copy_start, on_progress) {
        Ok(report) => {
            copy_pb.finish_with_message("Copy complete.");
            println!("{}", completion_message(&report));
            Ok(())
        }
        Err(e) => {
            copy_pb.finish_and_clear();
            Err(e.into())
        }
    }
}

/// Logs `err` with the prefix for its class and picks the exit status.
fn report(err: &anyhow::Error) -> ExitCode {
    let Some(backup_err) = err.downcast_ref::<BackupError>() else {
        error!("{err:#}");
        return ExitCode::FAILURE;
    };

    match backup_err.class() {
        ErrorClass::Usage => {
            error!("{backup_err}");
            print_usage();
        }
        ErrorClass::Declined => warn!("{backup_err}"),
        ErrorClass::Precondition | ErrorClass::Operational => error!("{backup_err}"),
    }
    ExitCode::from(backup_err.exit_code())
}

fn main() -> ExitCode {
    logging::init();

    match parse_invocation(std::env::args_os()) {
        Invocation::Info(e) => {
            e.print().ok();
            ExitCode::SUCCESS
        }
        Invocation::Usage(reason) => {
            error!("{reason}");
            print_usage();
            ExitCode::FAILURE
        }
        Invocation::Run(cli) => match run(cli) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => report(&e),
        },
    }
}
