// Console Controller - drives the ScanService from a terminal
//
// This module contains:
// - Command: parsed form of one line of user input
// - EventRenderer: turns ScanEvents into the lines the user sees
// - ProgressRenderer: live progress and job transitions from StateChanges
// - ConsoleController: interactive loop (stdin commands + scan events) and
//   the one-shot mode used by `--start/--end`

use crate::models::{JobState, ScanError, ScanEvent, ScanRange, ScanSettings};
use crate::services::{JobHandle, ScanService};
use crate::state::StateChange;
use anyhow::{Context, Result};
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc::UnboundedReceiver;

/// Line printed whenever the scanner returns to idle
pub const READY_LINE: &str = "Ready. Enter a range to scan.";

const HELP_TEXT: &str = "\
Commands:
  start [START END]  scan START..=END for primes (defaults from config)
  pause              pause the running scan
  resume             resume a paused scan
  p                  pause or resume
  cancel             cancel the running or paused scan
  status             show the scan state and progress
  help               show this help
  quit               cancel any scan and exit";

/// One line of console input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start a scan; `None` uses the configured defaults
    Start(Option<(String, String)>),
    Pause,
    Resume,
    PauseOrResume,
    Cancel,
    Status,
    Help,
    Quit,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("No command entered")]
    Empty,

    #[error("Unknown command {0:?}; type `help` for the list")]
    Unknown(String),

    #[error("`start` takes either no arguments or both START and END")]
    StartArguments,

    #[error("`{0}` takes no arguments")]
    UnexpectedArguments(&'static str),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Err(CommandError::Empty);
        };
        let args: Vec<&str> = words.collect();

        let command = match name.to_ascii_lowercase().as_str() {
            "start" | "s" => {
                return match args.as_slice() {
                    [] => Ok(Command::Start(None)),
                    [start, end] => Ok(Command::Start(Some((
                        (*start).to_string(),
                        (*end).to_string(),
                    )))),
                    _ => Err(CommandError::StartArguments),
                };
            }
            "pause" => Command::Pause,
            "resume" => Command::Resume,
            "p" => Command::PauseOrResume,
            "cancel" | "c" => Command::Cancel,
            "status" => Command::Status,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            _ => return Err(CommandError::Unknown(name.to_string())),
        };

        if !args.is_empty() {
            return Err(CommandError::UnexpectedArguments(command.name()));
        }
        Ok(command)
    }
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Start(_) => "start",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::PauseOrResume => "p",
            Command::Cancel => "cancel",
            Command::Status => "status",
            Command::Help => "help",
            Command::Quit => "quit",
        }
    }
}

/// Writes scan events as console lines
///
/// Primes are printed one per line. A completed scan that found nothing
/// prints `None.`.
pub struct EventRenderer<W: Write> {
    out: W,
    primes_in_job: u64,
}

impl<W: Write> EventRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            primes_in_job: 0,
        }
    }

    pub fn render(&mut self, event: &ScanEvent) -> io::Result<()> {
        match event {
            ScanEvent::PrimeFound(prime) => {
                self.primes_in_job += 1;
                writeln!(self.out, "{prime}")?;
            }
            ScanEvent::ScanCompleted => {
                if self.primes_in_job == 0 {
                    writeln!(self.out, "None.")?;
                }
            }
            ScanEvent::ScanReset => {
                self.primes_in_job = 0;
                writeln!(self.out, "{READY_LINE}")?;
            }
            ScanEvent::InvalidInput(message) => {
                writeln!(self.out, "Invalid Number! {message}")?;
            }
        }
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Writes live progress and job transitions from [`StateChange`]s
///
/// A progress line is written each time the last prime crosses another tenth
/// of the range. The console sends these to stderr so stdout carries only
/// scan results.
pub struct ProgressRenderer<W: Write> {
    out: W,
    range: Option<ScanRange>,
    primes_found: u64,
    reported_tenths: u32,
}

impl<W: Write> ProgressRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            range: None,
            primes_found: 0,
            reported_tenths: 0,
        }
    }

    pub fn render(&mut self, change: &StateChange) -> io::Result<()> {
        match change {
            StateChange::RangeChanged { range } => {
                self.range = Some(*range);
                self.primes_found = 0;
                self.reported_tenths = 0;
                return Ok(());
            }
            StateChange::ProgressUpdated {
                primes_found,
                last_prime,
            } => {
                self.primes_found = *primes_found;
                let (Some(range), Some(prime)) = (self.range, *last_prime) else {
                    return Ok(());
                };

                // 100% is announced by the completion line
                let tenths = (range.percent_of(prime) / 10.0).floor() as u32;
                if tenths <= self.reported_tenths || tenths >= 10 {
                    return Ok(());
                }
                self.reported_tenths = tenths;
                writeln!(
                    self.out,
                    "Progress: {}% ({} primes, last {})",
                    tenths * 10,
                    primes_found,
                    prime
                )?;
            }
            StateChange::ResumePositionRecorded { resume_at } => {
                let percent = self
                    .range
                    .map(|range| range.percent_of(*resume_at))
                    .unwrap_or(0.0);
                writeln!(self.out, "Paused before {resume_at} ({percent:.1}%)")?;
            }
            StateChange::JobStateChanged {
                to: JobState::Completed,
                ..
            } => writeln!(self.out, "Finished: {} primes found.", self.primes_found)?,
            StateChange::JobStateChanged {
                to: JobState::Cancelled,
                ..
            } => writeln!(self.out, "Cancelled after {} primes.", self.primes_found)?,
            _ => return Ok(()),
        }
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Feed one broadcast receive result into `progress`
///
/// Returns `false` once the channel has closed.
fn follow_progress<W: Write>(
    received: Result<StateChange, RecvError>,
    progress: &mut ProgressRenderer<W>,
) -> io::Result<bool> {
    match received {
        Ok(change) => {
            tracing::trace!("State change received: {:?}", change);
            progress.render(&change)?;
            Ok(true)
        }
        Err(RecvError::Lagged(skipped)) => {
            tracing::debug!("Progress display skipped {} state changes", skipped);
            Ok(true)
        }
        Err(RecvError::Closed) => Ok(false),
    }
}

/// Whether the interactive loop keeps reading commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Console collaborator for [`ScanService`]
///
/// # Example
/// ```ignore
/// let (sink, events) = ChannelSink::channel();
/// let service = Arc::new(ScanService::new(Arc::new(sink), runtime.handle().clone()));
/// let controller = ConsoleController::new(service, settings);
///
/// runtime.block_on(controller.run_interactive(events))?;
/// ```
pub struct ConsoleController {
    service: Arc<ScanService>,
    settings: ScanSettings,
}

impl ConsoleController {
    pub fn new(service: Arc<ScanService>, settings: ScanSettings) -> Self {
        Self { service, settings }
    }

    pub fn service(&self) -> &Arc<ScanService> {
        &self.service
    }

    /// Read commands from stdin and render scan events until `quit` or EOF
    ///
    /// Ctrl-C cancels an active scan; when nothing is running it quits.
    pub async fn run_interactive(&self, mut events: UnboundedReceiver<ScanEvent>) -> Result<()> {
        let mut renderer = EventRenderer::new(io::stdout());
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let (mut changes, mut progress, mut watching) = self.watch_progress();

        {
            let mut out = io::stdout();
            writeln!(out, "PrimeScan {} - type `help` for commands", crate::VERSION)?;
            writeln!(out, "{READY_LINE}")?;
        }

        tracing::info!("Interactive console started");

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line.context("Failed to read from stdin")? else {
                        tracing::info!("stdin closed");
                        break;
                    };
                    if line.trim().is_empty() {
                        continue;
                    }

                    let mut out = io::stdout();
                    let flow = match line.parse::<Command>() {
                        Ok(command) => self.handle_command(command, &mut out)?,
                        Err(e) => {
                            writeln!(out, "{e}")?;
                            Flow::Continue
                        }
                    };
                    if flow == Flow::Quit {
                        break;
                    }
                }
                Some(event) = events.recv() => {
                    renderer.render(&event)?;
                }
                change = changes.recv(), if watching => {
                    watching = follow_progress(change, &mut progress)?;
                }
                signal = tokio::signal::ctrl_c() => {
                    signal.context("Failed to listen for Ctrl-C")?;
                    if self.service.is_active() {
                        tracing::info!("Ctrl-C received, cancelling the active scan");
                        self.report(
                            self.service.cancel().map(|()| "Cancelling..."),
                            &mut io::stdout(),
                        )?;
                    } else {
                        tracing::info!("Ctrl-C received while idle, exiting");
                        break;
                    }
                }
            }
        }

        self.shutdown(&mut events, &mut renderer).await?;
        Ok(())
    }

    /// Scan one range, printing results, and return the job's terminal state
    ///
    /// Ctrl-C cancels the scan.
    pub async fn run_once(
        &self,
        start_text: &str,
        end_text: &str,
        mut events: UnboundedReceiver<ScanEvent>,
    ) -> Result<JobState> {
        let mut renderer = EventRenderer::new(io::stdout());
        let (mut changes, mut progress, mut watching) = self.watch_progress();

        let job = match self.service.start_scan(start_text, end_text) {
            Ok(job) => job,
            Err(e) => {
                // start_scan already queued the InvalidInput event
                while let Ok(event) = events.try_recv() {
                    renderer.render(&event)?;
                }
                return Err(e).context("Scan did not start");
            }
        };

        let mut cancel_requested = false;
        loop {
            tokio::select! {
                Some(event) = events.recv() => {
                    renderer.render(&event)?;
                    if event == ScanEvent::ScanReset {
                        break;
                    }
                }
                change = changes.recv(), if watching => {
                    watching = follow_progress(change, &mut progress)?;
                }
                signal = tokio::signal::ctrl_c(), if !cancel_requested => {
                    signal.context("Failed to listen for Ctrl-C")?;
                    tracing::info!("Ctrl-C received, cancelling scan job {}", job.id());
                    cancel_requested = true;
                    if let Err(e) = job.cancel() {
                        tracing::debug!("Cancel after Ctrl-C: {}", e);
                    }
                }
                else => break,
            }
        }

        Ok(job.wait().await)
    }

    /// Execute one command, writing feedback to `out`
    pub fn handle_command<W: Write>(&self, command: Command, out: &mut W) -> Result<Flow> {
        tracing::debug!("Console command: {:?}", command);

        match command {
            Command::Start(texts) => {
                let (start, end) = texts.unwrap_or_else(|| {
                    (
                        self.settings.default_start.clone(),
                        self.settings.default_end.clone(),
                    )
                });
                match self.service.start_scan(&start, &end) {
                    Ok(job) => writeln!(out, "Scanning {} (job {})", job.range(), job.id())?,
                    // Rendered from the InvalidInput event
                    Err(ScanError::InvalidRange(_)) => {}
                    Err(e) => writeln!(out, "{e}")?,
                }
            }
            Command::Pause => {
                let result = self.with_job("pause", JobHandle::pause);
                self.report(result.map(|()| "Paused."), out)?;
            }
            Command::Resume => {
                let result = self.with_job("resume", JobHandle::resume);
                self.report(result.map(|()| "Resumed."), out)?;
            }
            Command::PauseOrResume => {
                let result = self.service.pause_or_resume().map(|state| match state {
                    JobState::Paused => "Paused.",
                    _ => "Resumed.",
                });
                self.report(result, out)?;
            }
            Command::Cancel => {
                let result = self.service.cancel().map(|()| "Cancelling...");
                self.report(result, out)?;
            }
            Command::Status => self.write_status(out)?,
            Command::Help => writeln!(out, "{HELP_TEXT}")?,
            Command::Quit => return Ok(Flow::Quit),
        }

        Ok(Flow::Continue)
    }

    /// Write the job state, tally and progress through the range
    pub fn write_status<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let state = self.service.state().snapshot();

        match state.range {
            Some(range) if state.job_state != JobState::Idle => {
                writeln!(out, "State: {} (job {}, range {})", state.job_state, state.job_id, range)?;
            }
            Some(range) => {
                writeln!(out, "State: idle (last job {}, range {})", state.job_id, range)?;
            }
            None => writeln!(out, "State: idle (no scan started yet)")?,
        }

        let last_prime = state
            .last_prime
            .map(|p| p.to_string())
            .unwrap_or_else(|| "none".to_string());
        writeln!(out, "Primes found: {}, last prime: {}", state.primes_found, last_prime)?;

        if let Some(percent) = state.progress_percent() {
            writeln!(out, "Progress: {percent:.1}%")?;
        }
        Ok(())
    }

    fn watch_progress(
        &self,
    ) -> (
        broadcast::Receiver<StateChange>,
        ProgressRenderer<io::Stderr>,
        bool,
    ) {
        (
            self.service.state().subscribe(),
            ProgressRenderer::new(io::stderr()),
            true,
        )
    }

    fn with_job(
        &self,
        command: &'static str,
        action: fn(&JobHandle) -> Result<(), ScanError>,
    ) -> Result<(), ScanError> {
        match self.service.current_job() {
            Some(job) => action(&job),
            None => Err(ScanError::InvalidTransition {
                command,
                state: JobState::Idle,
            }),
        }
    }

    fn report<W: Write>(&self, result: Result<&str, ScanError>, out: &mut W) -> io::Result<()> {
        match result {
            Ok(message) => writeln!(out, "{message}"),
            Err(e) => {
                tracing::debug!("Command rejected: {}", e);
                writeln!(out, "{e}")
            }
        }
    }

    /// Cancel an active scan and render whatever it still emits
    async fn shutdown<W: Write>(
        &self,
        events: &mut UnboundedReceiver<ScanEvent>,
        renderer: &mut EventRenderer<W>,
    ) -> Result<()> {
        if let Some(job) = self.service.current_job() {
            let mut reset_pending = self
                .service
                .state()
                .read(|s| s.job_id == job.id() && s.is_busy());

            if job.state().is_active() {
                tracing::info!("Cancelling scan job {} before exit", job.id());
                match job.cancel() {
                    Ok(()) => reset_pending = true,
                    Err(e) => tracing::debug!("Cancel on exit: {}", e),
                }
            }

            // ScanReset is queued before wait() returns
            if reset_pending {
                job.wait().await;
            }
        }

        while let Ok(event) = events.try_recv() {
            renderer.render(&event)?;
        }
        Ok(())
    }
}
