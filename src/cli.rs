use anyhow::{Context, Result};
use clap::{ArgAction, CommandFactory, Parser};
use log::{info, warn};
use nix::sys::signal::Signal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use crate::config::types::{
    ParamountError, RunConfig, DEFAULT_BARRIER_TIMEOUT, DEFAULT_EXPORTS_FILE, DEFAULT_MOUNT_TIMEOUT,
    DEFAULT_THREADS, RUN_TAG,
};
use crate::exec::{MountOps, SystemOps};
use crate::exports::ExportTableWriter;
use crate::kernel::signal::{self, SignalBlockGuard};
use crate::orchestrator::{self, RunOutcome};
use crate::safety::{CleanupController, CleanupReport, ScopedWorkspace};

#[derive(Parser, Debug)]
#[command(
    name = "paramount",
    version,
    about = "Provision many concurrent loopback NFS mounts against the local server",
    disable_help_flag = true
)]
pub struct Cli {
    /// produce help message
    #[arg(short = 'h', long = "help", action = ArgAction::SetTrue)]
    help: bool,
    /// preserve temporary files and directories
    #[arg(short, long)]
    preserve: bool,
    /// the number of concurrent commands to issue
    #[arg(short, long, default_value_t = DEFAULT_THREADS)]
    threads: usize,
    /// show verbose output
    #[arg(short, long)]
    verbose: bool,
    /// export table to write (read by `exportfs -ra`)
    #[arg(long, value_name = "PATH", default_value = DEFAULT_EXPORTS_FILE)]
    exports_file: PathBuf,
    /// give up on a single mount after this many seconds
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_MOUNT_TIMEOUT.as_secs())]
    mount_timeout: u64,
    /// give up waiting for all mounters to start after this many seconds
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_BARRIER_TIMEOUT.as_secs())]
    barrier_timeout: u64,
}

/// What the command line asked for
#[derive(Debug)]
pub enum Invocation {
    Help(String),
    Run(RunConfig),
}

impl Cli {
    pub fn into_config(self) -> RunConfig {
        RunConfig {
            threads: self.threads,
            verbose: self.verbose,
            preserve_temp: self.preserve,
            exports_file: self.exports_file,
            mount_timeout: Duration::from_secs(self.mount_timeout),
            barrier_timeout: Duration::from_secs(self.barrier_timeout),
        }
    }
}

pub fn help_text() -> String {
    Cli::command().render_help().to_string()
}

/// Parse arguments (including argv[0])
pub fn parse_args<I, T>(args: I) -> std::result::Result<Invocation, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = Cli::try_parse_from(args)?;
    if cli.help {
        return Ok(Invocation::Help(help_text()));
    }
    Ok(Invocation::Run(cli.into_config()))
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "paramount=debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();
}

/// Binary entry point
pub fn run() -> ExitCode {
    let config = match parse_args(std::env::args_os()) {
        Ok(Invocation::Run(config)) => config,
        // Help exits non-zero on purpose.
        Ok(Invocation::Help(text)) => {
            println!("{}", text);
            return ExitCode::FAILURE;
        }
        Err(e) => e.exit(),
    };

    init_logging(config.verbose);

    match execute(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Signal-watcher teardown: stops provisioning, waits for in-flight mounts, then
/// runs the cleanup sequence. The caller decides how the process ends.
pub fn on_shutdown(cleanup: &CleanupController, sig: Signal) -> CleanupReport {
    warn!("Received {}, stopping provisioning", sig);
    let report = cleanup.run();
    report.log();
    report
}

fn execute(config: &RunConfig) -> Result<()> {
    config.validate()?;

    // Block before any thread exists so every thread inherits the mask.
    let _signals = SignalBlockGuard::block().context("installing signal mask")?;

    let ops: Arc<dyn MountOps> = Arc::new(SystemOps::discover()?);
    let workspace = ScopedWorkspace::new(RUN_TAG, config.preserve_temp)?;
    let exports = ExportTableWriter::new(&config.exports_file, RUN_TAG);
    let cleanup = Arc::new(
        CleanupController::new(Arc::clone(&ops), exports, workspace)
            .with_drain_timeout(config.settle_timeout()),
    );

    let on_signal = Arc::clone(&cleanup);
    let watcher = signal::spawn_watcher(move |sig| {
        on_shutdown(&on_signal, sig);
        std::process::exit(signal::exit_status_for(sig));
    })?;

    let RunOutcome { result, cleanup: teardown } = orchestrator::dispatch(config, &ops, &cleanup);
    if !teardown.is_clean() {
        warn!("{} cleanup steps failed", teardown.errors.len());
    }

    // Only the watcher's teardown closes the gate early; let it set the exit status.
    if let Err(ParamountError::Interrupted(_)) = &result {
        let _ = watcher.join();
    }

    let summary = result?;
    if summary.mounts.failed > 0 {
        eprintln!("Got {} mount failures", summary.mounts.failed);
    }
    info!(
        "Run complete: {} threads, {} mounted, {} failed, {} verified, workspace {}{}",
        summary.threads,
        summary.mounts.succeeded(),
        summary.mounts.failed,
        summary.verified.checked,
        summary.workspace.display(),
        if config.preserve_temp { " (preserved)" } else { "" }
    );
    Ok(())
}
