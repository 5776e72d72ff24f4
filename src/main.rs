use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use kiln::config::store::YamlStore;
use kiln::config::Config;
use kiln::mods::{
    AllowAll, Blacklist, CommandRegistries, DispatchOutcome, Dispatcher, DylibLoader, EventBus,
    LifecycleManager, ModEvent, ShellKind,
};

/// Kiln - A moddable terminal shell host
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start all mods and open an interactive shell
    Run {
        /// Disable mod loading/unloading for this session
        #[arg(long)]
        safe_mode: bool,
    },
    /// Copy a unit file (and its manual directory) into the mods directory
    Install {
        /// Path to the unit file
        unit: PathBuf,
    },
    /// Stop and remove an installed unit
    Uninstall {
        /// Unit file name inside the mods directory
        unit_file: String,
    },
    /// Manage the unit blacklist
    Blacklist {
        #[command(subcommand)]
        action: BlacklistAction,
    },
}

#[derive(Subcommand, Debug)]
enum BlacklistAction {
    /// Exclude a unit path from automatic loading
    Add { path: PathBuf },
    /// Allow a previously blacklisted unit path again
    Remove { path: PathBuf },
    /// Print the current blacklist
    List,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Log to stderr so messages never mix into shell output
    let log_level = if args.debug {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global default subscriber")?;

    let config = if let Some(config_path) = &args.config {
        Config::load_from_file(config_path)?
    } else {
        Config::load_default()?
    };

    match args.command {
        Command::Run { safe_mode } => run(&config, safe_mode),
        Command::Install { unit } => {
            let host = build_host(&config, false)?;
            host.manager.install(&unit)
        }
        Command::Uninstall { unit_file } => {
            let host = build_host(&config, false)?;
            host.manager.uninstall(&unit_file)
        }
        Command::Blacklist { action } => {
            let blacklist = open_blacklist(&config)?;
            match action {
                BlacklistAction::Add { path } => blacklist.add(&path),
                BlacklistAction::Remove { path } => blacklist.remove(&path),
                BlacklistAction::List => {
                    for entry in blacklist.entries() {
                        println!("{entry}");
                    }
                    Ok(())
                }
            }
        }
    }
}

struct Host {
    manager: LifecycleManager,
    commands: Arc<CommandRegistries>,
    events: Arc<EventBus>,
}

fn open_blacklist(config: &Config) -> Result<Blacklist> {
    let store = Arc::new(YamlStore::open(config.store_path()?)?);
    Ok(Blacklist::new(store))
}

fn build_host(config: &Config, safe_mode: bool) -> Result<Host> {
    let blacklist = open_blacklist(config)?;

    let mut builtins = HashMap::new();
    builtins.insert(ShellKind::Main, config.shells.main_builtins.clone());
    builtins.insert(ShellKind::Ftp, config.shells.ftp_builtins.clone());
    builtins.insert(ShellKind::Mail, config.shells.mail_builtins.clone());
    let commands = Arc::new(CommandRegistries::new(builtins));

    let events = Arc::new(EventBus::new());
    events.subscribe(Box::new(|event| match event {
        ModEvent::UnitFinalizationFailed { unit, reason }
        | ModEvent::UnitParseError { unit, reason } => {
            eprintln!("kiln: mod '{unit}': {reason}");
        }
        other => debug!("Lifecycle event: {other:?}"),
    }));

    let manager = LifecycleManager::new(
        config.mods_dir()?,
        safe_mode || config.mods.safe_mode,
        Box::new(DylibLoader::new()),
        commands.clone(),
        blacklist,
        events.clone(),
    );

    Ok(Host {
        manager,
        commands,
        events,
    })
}

fn run(config: &Config, safe_mode: bool) -> Result<()> {
    let host = build_host(config, safe_mode)?;
    host.manager.start_all()?;

    let dispatcher = Dispatcher::new(
        host.commands.clone(),
        host.manager.parts(),
        Arc::new(AllowAll),
        host.events.clone(),
    );

    let mut editor = DefaultEditor::new().context("Failed to create line editor")?;
    loop {
        match editor.readline("kiln> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);
                if line == "exit" {
                    break;
                }
                match dispatcher.execute(line, ShellKind::Main) {
                    DispatchOutcome::NotFound => {
                        // Not a mod command; the shell execution engine
                        // (external to this crate) would take over here
                        println!("kiln: command not found: {line}");
                    }
                    DispatchOutcome::Denied => {
                        println!("kiln: permission denied");
                    }
                    DispatchOutcome::Completed(code) if code != 0 => {
                        debug!("Command exited with code {code}");
                    }
                    DispatchOutcome::Completed(_) => {}
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("kiln: input error: {e}");
                break;
            }
        }
    }

    host.manager.stop_all();
    Ok(())
}
