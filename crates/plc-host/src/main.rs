//! CLI host harness for the ladder-logic scan engine.
//!
//! Boots a controller from an optional program file and a file-backed
//! RUN/STOP flag, then drives the single-threaded cooperative loop: scan
//! ticks every 10 ms, throttled snapshots to stdout as JSON lines, logs to
//! stderr.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use plc_core::{Controller, ProgramDocument, Snapshot, Status, StatusStore, StoreError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP_TEXT: &str = "Usage: plc-host [<program.json>] [--state <file>] \
[--duration-ms <n>] [--run | --stop | --reset] [--help]";

const DEFAULT_DURATION_MS: u64 = 1000;
const POLL_SLEEP: Duration = Duration::from_millis(1);

#[derive(Debug, PartialEq, Eq)]
struct CliArgs {
    program: Option<PathBuf>,
    state: Option<PathBuf>,
    duration_ms: u64,
    command: Option<StartupCommand>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartupCommand {
    Run,
    Stop,
    Reset,
}

#[derive(Debug)]
enum ParseResult {
    Args(CliArgs),
    Help,
}

fn parse_args(mut args: impl Iterator<Item = OsString>) -> Result<ParseResult, String> {
    let mut program: Option<PathBuf> = None;
    let mut state: Option<PathBuf> = None;
    let mut duration_ms = DEFAULT_DURATION_MS;
    let mut command: Option<StartupCommand> = None;

    while let Some(arg) = args.next() {
        if arg == "--help" {
            return Ok(ParseResult::Help);
        }

        if arg == "--run" {
            command = Some(StartupCommand::Run);
            continue;
        }
        if arg == "--stop" {
            command = Some(StartupCommand::Stop);
            continue;
        }
        if arg == "--reset" {
            command = Some(StartupCommand::Reset);
            continue;
        }

        if arg == "--state" {
            let value = args
                .next()
                .ok_or_else(|| String::from("missing value for --state"))?;
            state = Some(PathBuf::from(value));
            continue;
        }

        if arg == "--duration-ms" {
            let value = args
                .next()
                .ok_or_else(|| String::from("missing value for --duration-ms"))?;
            duration_ms = value
                .to_string_lossy()
                .parse()
                .map_err(|_| format!("invalid value for --duration-ms: {}", value.to_string_lossy()))?;
            continue;
        }

        if arg.to_string_lossy().starts_with('-') {
            return Err(format!("unknown option: {}", arg.to_string_lossy()));
        }

        if program.is_some() {
            return Err(String::from("multiple program paths provided"));
        }
        program = Some(PathBuf::from(arg));
    }

    Ok(ParseResult::Args(CliArgs {
        program,
        state,
        duration_ms,
        command,
    }))
}

/// RUN/STOP flag persisted as a single integer in a text file.
#[derive(Debug)]
struct FileStatusStore {
    path: PathBuf,
}

impl FileStatusStore {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl StatusStore for FileStatusStore {
    fn load(&mut self) -> Result<Option<Status>, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        let trimmed = text.trim();
        let code: i64 = trimmed
            .parse()
            .map_err(|_| StoreError::Corrupt(trimmed.to_string()))?;
        Status::from_persist_code(code)
            .map(Some)
            .ok_or(StoreError::UnknownValue(code))
    }

    fn save(&mut self, status: Status) -> Result<(), StoreError> {
        let Some(code) = status.persist_code() else {
            return Ok(());
        };
        fs::write(&self.path, format!("{code}\n"))?;
        Ok(())
    }
}

enum ProgramLoad {
    Absent,
    Loaded(ProgramDocument),
    Malformed,
    Unreadable(String),
}

fn read_program(path: Option<&Path>) -> ProgramLoad {
    let Some(path) = path else {
        return ProgramLoad::Absent;
    };
    match fs::read_to_string(path) {
        Ok(text) => match serde_json::from_str(&text) {
            Ok(document) => ProgramLoad::Loaded(document),
            Err(error) => {
                tracing::error!(path = %path.display(), %error, "program document is malformed");
                ProgramLoad::Malformed
            }
        },
        Err(error) => {
            tracing::error!(path = %path.display(), %error, "program file is unreadable");
            ProgramLoad::Unreadable(format!("program load failed: {error}"))
        }
    }
}

fn emit(out: &mut impl Write, snapshot: &Snapshot) -> Result<(), String> {
    let line =
        serde_json::to_string(snapshot).map_err(|error| format!("snapshot encoding failed: {error}"))?;
    writeln!(out, "{line}").map_err(|error| format!("snapshot write failed: {error}"))
}

fn run_host(args: &CliArgs) -> Result<(), String> {
    let mut store: Box<dyn StatusStore> = match &args.state {
        Some(path) => Box::new(FileStatusStore::new(path.clone())),
        None => Box::new(plc_core::MemoryStatusStore::new()),
    };

    let mut controller = Controller::new();
    let load = read_program(args.program.as_deref());
    controller.boot(
        store.as_mut(),
        match &load {
            ProgramLoad::Loaded(document) => Some(document),
            _ => None,
        },
    );
    match load {
        ProgramLoad::Malformed => controller.halt(),
        ProgramLoad::Unreadable(message) => controller.enter_error(message),
        ProgramLoad::Absent | ProgramLoad::Loaded(_) => {}
    }

    match args.command {
        Some(StartupCommand::Run) => controller.run(store.as_mut()),
        Some(StartupCommand::Stop) => controller.stop(store.as_mut()),
        Some(StartupCommand::Reset) => controller.reset(),
        None => {}
    }

    let mut stdout = io::stdout().lock();
    let started = Instant::now();
    loop {
        let now_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        if now_ms >= args.duration_ms {
            break;
        }
        controller.tick(now_ms);
        if let Some(snapshot) = controller.maybe_snapshot(now_ms) {
            emit(&mut stdout, &snapshot)?;
        }
        thread::sleep(POLL_SLEEP);
    }

    let last = controller.snapshot(args.duration_ms);
    emit(&mut stdout, &last)
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plc_host=info,plc_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = match parse_args(env::args_os().skip(1)) {
        Ok(ParseResult::Help) => {
            println!("{HELP_TEXT}");
            return ExitCode::SUCCESS;
        }
        Ok(ParseResult::Args(args)) => args,
        Err(message) => {
            eprintln!("error: {message}");
            eprintln!("{HELP_TEXT}");
            return ExitCode::from(2);
        }
    };

    match run_host(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}
