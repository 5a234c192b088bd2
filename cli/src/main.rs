//! BackUP - Command-line front end for the backup engine.
//!
//! Runs backups once (`run`), previews them (`plan`), shows when a schedule
//! fires next (`next-run`) and acts as the timer-driven caller for recurring
//! backups (`schedule`).

mod config;
mod display;
mod logger;

use chrono::{Local, NaiveDateTime, NaiveTime, Weekday};
use clap::{Args, Parser, Subcommand, ValueEnum};
use config::BackupConfig;
use display::{follow_run, CliProgress};
use engine::{
    collect_sources, estimate_job_bytes, format_next_run, naming, next_run, start_run,
    CancelToken, CopyOptions, CopyOutcome, JobSpec, RecurrencePolicy,
};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

/// Longest single sleep while waiting for the next scheduled run
const SCHEDULE_TICK: Duration = Duration::from_secs(60);

/// BackUP - back up folders and files without overwriting anything
#[derive(Parser, Debug)]
#[command(name = "backup")]
#[command(version = "0.1.0")]
#[command(about = "Back up folders and files without overwriting earlier copies")]
struct Cli {
    /// More output (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Less output (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    quiet: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a backup now
    Run(RunArgs),
    /// Show what a backup would copy, without writing anything
    Plan(SourceArgs),
    /// Print when a recurring backup would next run
    NextRun(NextRunArgs),
    /// Run the jobs in a job file on their schedule
    Schedule(ScheduleArgs),
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Folder to back up (repeatable)
    #[arg(long = "folder", value_name = "PATH")]
    folders: Vec<PathBuf>,

    /// File to back up (repeatable)
    #[arg(long = "file", value_name = "PATH")]
    files: Vec<PathBuf>,

    /// Destination folder
    #[arg(long, value_name = "PATH")]
    dst: Option<PathBuf>,

    /// JSON job file with one or more jobs, instead of --folder/--file/--dst
    #[arg(long, value_name = "FILE", conflicts_with_all = ["folders", "files", "dst"])]
    jobs: Option<PathBuf>,

    /// Copy folder contents directly into the destination
    #[arg(long)]
    expand: bool,

    /// Resolve name collisions with _(N) instead of a timestamp
    #[arg(long)]
    numeric_suffix: bool,

    /// Do not wrap the backup in a "Backup <dd-mm-yyyy>" folder
    #[arg(long)]
    no_dated_folder: bool,
}

impl SourceArgs {
    fn copy_options(&self) -> CopyOptions {
        CopyOptions {
            expand_folder_contents: self.expand,
            timestamp_naming: !self.numeric_suffix,
            wrap_in_dated_subfolder: !self.no_dated_folder,
        }
    }

    /// Build fresh job specs from the job file or the inline flags.
    fn job_specs(&self) -> Result<Vec<JobSpec>, String> {
        if let Some(path) = &self.jobs {
            return Ok(BackupConfig::load(path)?.job_specs());
        }

        let dst = self
            .dst
            .clone()
            .ok_or_else(|| "Missing --dst (or use --jobs FILE)".to_string())?;
        if self.folders.is_empty() && self.files.is_empty() {
            return Err("Select at least one --folder or --file".to_string());
        }

        for path in self.folders.iter().chain(&self.files) {
            if !path.exists() {
                warn!("Source does not exist and will be skipped: {}", path.display());
            }
        }

        Ok(vec![JobSpec {
            name: None,
            source_folders: self.folders.clone(),
            source_files: self.files.clone(),
            destination_root: dst,
            options: self.copy_options(),
        }])
    }
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    sources: SourceArgs,

    /// Cancel the backup if it runs longer than this many seconds
    #[arg(long, value_name = "SECS")]
    time_limit: Option<u64>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Every {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Args, Debug)]
struct NextRunArgs {
    /// Recurrence period
    #[arg(long, value_enum)]
    every: Every,

    /// Day of the week for weekly backups (mon, tue, ...)
    #[arg(long, value_parser = parse_weekday)]
    weekday: Option<Weekday>,

    /// Day of the month for monthly backups (1-31)
    #[arg(long, value_name = "DAY")]
    day: Option<u32>,

    /// Time of day
    #[arg(long, value_name = "HH:MM[:SS]", value_parser = parse_time)]
    at: NaiveTime,

    /// Compute from this local time instead of now
    #[arg(long, value_name = "YYYY-MM-DD HH:MM:SS", value_parser = parse_datetime)]
    now: Option<NaiveDateTime>,
}

impl NextRunArgs {
    fn policy(&self) -> Result<RecurrencePolicy, String> {
        match self.every {
            Every::Daily => Ok(RecurrencePolicy::daily(self.at)),
            Every::Weekly => {
                let weekday = self
                    .weekday
                    .ok_or_else(|| "Weekly schedules need --weekday".to_string())?;
                Ok(RecurrencePolicy::weekly(weekday, self.at))
            }
            Every::Monthly => {
                let day = self
                    .day
                    .ok_or_else(|| "Monthly schedules need --day".to_string())?;
                RecurrencePolicy::monthly(day, self.at).map_err(|e| e.to_string())
            }
        }
    }
}

#[derive(Args, Debug)]
struct ScheduleArgs {
    /// JSON job file; must contain a "schedule" section
    #[arg(long, value_name = "FILE")]
    jobs: PathBuf,

    /// Exit after the first scheduled run
    #[arg(long)]
    once: bool,
}

fn parse_weekday(s: &str) -> Result<Weekday, String> {
    s.parse::<Weekday>()
        .map_err(|_| format!("Invalid weekday '{}'. Use mon, tue, wed, thu, fri, sat or sun", s))
}

fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|_| format!("Invalid time '{}'. Use HH:MM or HH:MM:SS", s))
}

fn parse_datetime(s: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map_err(|_| format!("Invalid date-time '{}'. Use YYYY-MM-DD HH:MM:SS", s))
}

/// How a command that ran a backup ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    Done,
    Cancelled,
}

/// Parse arguments, then dispatch the subcommand
fn main() {
    let cli = Cli::parse();
    logger::init(cli.verbose, cli.quiet);

    let exit_code = match run_cli(&cli) {
        Ok(Completion::Done) => 0,
        Ok(Completion::Cancelled) => 130,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            2
        }
    };

    std::process::exit(exit_code);
}

/// Main CLI logic - separated for testability
fn run_cli(cli: &Cli) -> Result<Completion, String> {
    match &cli.command {
        Command::Run(args) => run_backup(args),
        Command::Plan(args) => {
            print!("{}", plan_backup(args)?);
            Ok(Completion::Done)
        }
        Command::NextRun(args) => {
            let now = args.now.unwrap_or_else(|| Local::now().naive_local());
            let next = next_run(&args.policy()?, now);
            println!("{}", format_next_run(next));
            Ok(Completion::Done)
        }
        Command::Schedule(args) => run_schedule(args),
    }
}

fn completion_of(outcome: CopyOutcome) -> Result<Completion, String> {
    match outcome {
        CopyOutcome::Success { .. } => Ok(Completion::Done),
        CopyOutcome::Cancelled => Ok(Completion::Cancelled),
        CopyOutcome::Failure { reason } => Err(reason),
    }
}

fn run_backup(args: &RunArgs) -> Result<Completion, String> {
    let specs = args.sources.job_specs()?;
    let handle = start_run(specs);
    info!("Backup {} started", handle.id());

    let outcome = follow_run(handle, args.time_limit.map(Duration::from_secs));
    completion_of(outcome)
}

/// Describe where every source file would land, without touching anything.
fn plan_backup(args: &SourceArgs) -> Result<String, String> {
    let specs = args.job_specs()?;
    let today = Local::now().date_naive();
    let mut report = String::new();
    let mut grand_total = 0u64;

    for spec in &specs {
        let root = if spec.options.wrap_in_dated_subfolder {
            spec.destination_root.join(naming::dated_folder_name(today))
        } else {
            spec.destination_root.clone()
        };

        report.push_str(&format!("Job '{}':\n", spec.label()));
        let entries = collect_sources(
            &spec.source_folders,
            &spec.source_files,
            spec.options.expand_folder_contents,
        );
        for entry in entries {
            report.push_str(&format!(
                "  {} -> {}\n",
                entry.path.display(),
                root.join(entry.destination_relative()).display()
            ));
        }

        let total = estimate_job_bytes(spec, &CancelToken::new());
        grand_total += total;
        report.push_str(&format!("  Total: {}\n", CliProgress::format_bytes(total)));
    }

    if specs.len() > 1 {
        report.push_str(&format!("All jobs: {}\n", CliProgress::format_bytes(grand_total)));
    }
    Ok(report)
}

/// Read the job file fresh and return its schedule with new job specs.
fn load_scheduled_jobs(path: &Path) -> Result<(RecurrencePolicy, Vec<JobSpec>), String> {
    let config = BackupConfig::load(path)?;
    let policy = config
        .schedule
        .ok_or_else(|| format!("{} has no \"schedule\" section", path.display()))?;
    Ok((policy, config.job_specs()))
}

/// Wait for each scheduled instant and run the configured jobs.
///
/// The job file is read again at every scheduled instant. If it cannot be
/// loaded then, that run is skipped and the previous schedule is kept.
fn run_schedule(args: &ScheduleArgs) -> Result<Completion, String> {
    let (mut policy, _) = load_scheduled_jobs(&args.jobs)?;
    info!("Scheduled backups: {}", policy);

    loop {
        let next = next_run(&policy, Local::now().naive_local());
        info!("Next backup: {}", format_next_run(next));

        while Local::now().naive_local() < next {
            let remaining = (next - Local::now().naive_local())
                .to_std()
                .unwrap_or(Duration::ZERO);
            thread::sleep(remaining.min(SCHEDULE_TICK));
        }

        let specs = match load_scheduled_jobs(&args.jobs) {
            Ok((updated, specs)) => {
                if updated != policy {
                    info!("Schedule changed: {}", updated);
                    policy = updated;
                }
                specs
            }
            Err(e) if args.once => return Err(e),
            Err(e) => {
                warn!("Skipping scheduled backup: {}", e);
                continue;
            }
        };

        let handle = start_run(specs);
        info!("Scheduled backup {} started", handle.id());
        let outcome = follow_run(handle, None);

        if args.once {
            return completion_of(outcome);
        }
        if let CopyOutcome::Failure { reason } = outcome {
            warn!("Scheduled backup failed: {}", reason);
        }
    }
}
