//! Earcheck CLI: terminal hearing screening test

mod report_view;
mod simulate;
mod tui;

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use earcheck::audio::open_default_output;
use earcheck::report::Report;
use earcheck_app::app::{ControllerOptions, Hooks, LogCollaborator};
use earcheck_app::data::{ProgressStore, Settings};
use earcheck_app::error::AppError;

use simulate::{Profile, VirtualListener};

#[derive(Parser)]
#[command(name = "earcheck", about = "Pure-tone hearing screening in the terminal", version)]
struct Cli {
    /// Settings file (defaults to the config directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Take the test (default)
    Run {
        /// Write logs to this file while the test is on screen
        #[arg(long)]
        log_file: Option<PathBuf>,
        /// Do not save or offer to resume progress
        #[arg(long)]
        no_save: bool,
    },
    /// Run a whole session against a virtual listener
    Simulate {
        /// Left ear thresholds in dB HL, one per frequency or one for all
        #[arg(long, default_value = "10")]
        left: Profile,
        /// Right ear thresholds in dB HL, one per frequency or one for all
        #[arg(long, default_value = "10")]
        right: Profile,
        /// Answer "heard" to silent catch trials
        #[arg(long)]
        guess: bool,
        /// Seed for the catch-trial placement
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect or discard saved progress
    Progress {
        #[command(subcommand)]
        action: ProgressAction,
    },
}

#[derive(Subcommand)]
enum ProgressAction {
    /// Print the saved record as JSON
    Show,
    /// Delete the saved record
    Clear,
}

fn init_logging(log_file: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log_file {
        Some(path) => builder
            .with_ansi(false)
            .with_writer(Mutex::new(File::create(path)?))
            .init(),
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn load_settings(path: Option<&Path>) -> Result<Settings, AppError> {
    let settings = match path {
        Some(p) => Settings::load_from(p)?,
        None => Settings::load()?,
    };
    settings.validate()?;
    Ok(settings)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Run {
        log_file: None,
        no_save: false,
    });

    match command {
        Command::Run { log_file, no_save } => {
            // The TUI owns the terminal; log only when there is a file to log to
            if let Some(path) = &log_file {
                init_logging(Some(path))?;
            }
            let settings = load_settings(cli.settings.as_deref())?;
            let store = if no_save {
                None
            } else {
                Some(ProgressStore::open_default()?)
            };
            tui::run(ControllerOptions {
                settings,
                store,
                output: open_default_output,
                hooks: Hooks::new().with(Arc::new(LogCollaborator)),
            })
        }
        Command::Simulate {
            left,
            right,
            guess,
            seed,
            json,
        } => {
            init_logging(None)?;
            let settings = load_settings(cli.settings.as_deref())?;
            let listener = VirtualListener::new(&settings, left, right, guess)?;
            let outcome = simulate::run(&settings, &listener, seed)?;
            let report = Report::from_outcome(&outcome);
            if json {
                println!("{}", report.to_json()?);
            } else {
                for line in report_view::report_lines(&report) {
                    println!("{}", line);
                }
            }
            Ok(())
        }
        Command::Progress { action } => {
            init_logging(None)?;
            let store = ProgressStore::open_default()?;
            match action {
                ProgressAction::Show => {
                    let saved = store.load().ok_or_else(|| {
                        AppError::NotFound(format!("no saved progress at {:?}", store.path()))
                    })?;
                    println!("{}", serde_json::to_string_pretty(&saved)?);
                }
                ProgressAction::Clear => {
                    store.clear()?;
                    println!("Saved progress cleared");
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn default_build_plays_through_audio_device() {
        assert!(cfg!(feature = "playback"));
    }
}
