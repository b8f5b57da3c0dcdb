//! `clipshelf` command line entry point.
//!
//! # Responsibility
//! - Parse arguments and environment into `ArchiveConfig` and
//!   `PlaybackOptions`.
//! - Map each subcommand onto one `Commander` operation.
//! - Print results to stdout and failures to stderr with a non-zero exit.

use clap::{Args, Parser, Subcommand};
use clipshelf_core::config::{DEFAULT_ARCHIVE_DIR, DEFAULT_DB_FILE};
use clipshelf_core::{
    default_log_level, init_archive, init_logging, ArchiveConfig, ArchiveError, Commander,
    DeviceBackend, ImportMode, LoggingError, NoopCache, PlaybackError, PlaybackOptions,
    SqliteSoundRepository,
};
use log::error;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

type ArchiveCommander = Commander<SqliteSoundRepository, NoopCache, DeviceBackend>;

#[derive(Debug, Parser)]
#[command(name = "clipshelf", version, about = "Personal archive of named audio clips")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Directory holding the archived clip files
    #[arg(long, global = true, env = "CLIPSHELF_ARCHIVE_DIR", default_value = DEFAULT_ARCHIVE_DIR)]
    archive_dir: PathBuf,

    /// SQLite metadata database
    #[arg(long = "db", global = true, env = "CLIPSHELF_DB", default_value = DEFAULT_DB_FILE)]
    db_path: PathBuf,

    /// What `add` does with files outside the archive (copy|move)
    #[arg(long, global = true, env = "CLIPSHELF_IMPORT_MODE", default_value_t = ImportMode::Copy)]
    import_mode: ImportMode,

    /// Write rotating log files to this directory
    #[arg(long, global = true, env = "CLIPSHELF_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// trace|debug|info|warn|error
    #[arg(long, global = true, env = "CLIPSHELF_LOG_LEVEL")]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the archive directory and metadata database
    Init,
    /// Play audio clips
    Play(PlayArgs),
    /// Add a file to the archive
    Add {
        /// File to add
        filename: PathBuf,
        /// Name of the sound (defaults to the file stem)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Remove a sound and its file
    Remove {
        name: String,
    },
    /// Show sounds in the archive
    List {
        /// Only sounds carrying any of these tags
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        /// Print JSON instead of one line per sound
        #[arg(long)]
        json: bool,
    },
    /// Rename a sound
    Rename {
        name: String,
        new_name: String,
    },
    /// Add tags to a sound
    Tag {
        name: String,
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Remove tags from a sound
    Untag {
        name: String,
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Show every tag in use
    Tags,
    /// Remove all sounds that no longer have a file
    Clean,
    /// Show available output devices
    Devices,
}

#[derive(Debug, Args)]
struct PlayArgs {
    /// Play all sounds simultaneously
    #[arg(short, long)]
    parallel: bool,

    /// Playback speed multiplier (default: 1.0)
    #[arg(short, long)]
    speed: Option<f32>,

    /// Play the sounds in reverse
    #[arg(short, long)]
    reverse: bool,

    /// Playback volume multiplier (default: 1.0)
    #[arg(short, long)]
    volume: Option<f32>,

    /// Output device name (default: host default device)
    #[arg(long, env = "CLIPSHELF_DEVICE")]
    device: Option<String>,

    /// Names of sounds to play
    #[arg(required = true)]
    names: Vec<String>,
}

impl PlayArgs {
    fn options(&self) -> PlaybackOptions {
        PlaybackOptions::from_overrides(self.speed, self.volume, self.reverse)
    }
}

#[derive(Debug)]
enum CliError {
    Archive(ArchiveError),
    Playback(PlaybackError),
    Logging(LoggingError),
    Output(String),
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Archive(err) => write!(f, "{err}"),
            Self::Playback(err) => write!(f, "{err}"),
            Self::Logging(err) => write!(f, "logging: {err}"),
            Self::Output(message) => f.write_str(message),
        }
    }
}

impl Error for CliError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Archive(err) => Some(err),
            Self::Playback(err) => Some(err),
            Self::Logging(err) => Some(err),
            Self::Output(_) => None,
        }
    }
}

impl From<ArchiveError> for CliError {
    fn from(value: ArchiveError) -> Self {
        Self::Archive(value)
    }
}

impl From<PlaybackError> for CliError {
    fn from(value: PlaybackError) -> Self {
        Self::Playback(value)
    }
}

impl From<LoggingError> for CliError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_command module=cli status=error error={err}");
            eprintln!("error: {err}");
            if matches!(err, CliError::Archive(ArchiveError::StoreUnavailable { .. })) {
                eprintln!("hint: run `clipshelf init` to create the archive");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let Cli { global, command } = cli;
    if let Some(log_dir) = global.log_dir.as_deref() {
        let level = global
            .log_level
            .clone()
            .unwrap_or_else(|| default_log_level().to_string());
        init_logging(&level, absolute_path(log_dir)?)?;
    }
    let config = ArchiveConfig::new(&global.archive_dir, &global.db_path)
        .with_import_mode(global.import_mode);

    match command {
        Command::Init => {
            init_archive(&config)?;
            println!(
                "initialized archive at {} (database {})",
                config.archive_dir.display(),
                config.db_path.display()
            );
        }
        Command::Devices => {
            for device in DeviceBackend::list_devices()? {
                println!("{device}");
            }
        }
        Command::Play(args) => {
            let backend = match args.device.as_deref() {
                Some(name) => DeviceBackend::with_device(name),
                None => DeviceBackend::new(),
            };
            let commander = Commander::open(&config, NoopCache, backend)?;
            if args.parallel {
                commander.play_parallel(&args.names, args.options())?;
            } else {
                commander.play_sequence(&args.names, args.options())?;
            }
        }
        command => run_archive_command(&open_commander(&config)?, command)?,
    }
    Ok(())
}

fn run_archive_command(commander: &ArchiveCommander, command: Command) -> Result<(), CliError> {
    match command {
        Command::Add { filename, name } => {
            let sound = commander.add_sound(&filename, name.as_deref())?;
            println!("added {sound}");
        }
        Command::Remove { name } => {
            commander.remove_sound(&name)?;
            println!("removed {name}");
        }
        Command::List { tags, json } => {
            let sounds = if tags.is_empty() {
                commander.get_sounds()?
            } else {
                commander.get_by_tags(&tags)?
            };
            if json {
                let rendered = serde_json::to_string_pretty(&sounds)
                    .map_err(|err| CliError::Output(format!("failed to render JSON: {err}")))?;
                println!("{rendered}");
            } else {
                for sound in &sounds {
                    println!("{sound}");
                }
            }
        }
        Command::Rename { name, new_name } => {
            commander.rename(&name, &new_name)?;
            println!("renamed {name} -> {new_name}");
        }
        Command::Tag { name, tags } => {
            for tag in &tags {
                commander.add_tag(&name, tag)?;
            }
        }
        Command::Untag { name, tags } => {
            for tag in &tags {
                commander.remove_tag(&name, tag)?;
            }
        }
        Command::Tags => {
            for tag in commander.list_tags()? {
                println!("{tag}");
            }
        }
        Command::Clean => {
            let removed = commander.clean()?;
            for sound in &removed {
                println!("removed orphan {}", sound.name);
            }
            println!("{} orphan record(s) removed", removed.len());
        }
        Command::Init | Command::Play(_) | Command::Devices => {}
    }
    Ok(())
}

fn open_commander(config: &ArchiveConfig) -> Result<ArchiveCommander, CliError> {
    Ok(Commander::open(config, NoopCache, DeviceBackend::new())?)
}

fn absolute_path(path: &Path) -> Result<PathBuf, CliError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir()
        .map_err(|err| CliError::Output(format!("failed to read working directory: {err}")))?;
    Ok(cwd.join(path))
}
