//! dosfs CLI - Inspect DOS drive mounts from the command line.
//!
//! Usage:
//!   dosfs --config <mounts.json> <command>
//!
//! Examples:
//!   dosfs -c mounts.json drives                  # List mounted drives
//!   dosfs -c mounts.json tree C                  # Every file on C:
//!   dosfs -c mounts.json cat "C:\Games\Keen.txt" # Print a file (long names work)
//!   dosfs -c mounts.json resolve GAME.EXE        # Show the 8.3 path a name resolves to
//!   dosfs -c mounts.json cycle A --times 2       # Swap A: to its third disk
//!   dosfs -c mounts.json state                   # Dump the drive save state

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dosfs_core::{Drive, DriveSystem, MountConfig};

/// DOS drive inspector
#[derive(Parser, Debug)]
#[command(name = "dosfs")]
#[command(about = "Mount DOS drives from a configuration and inspect them")]
struct Args {
    /// Mount configuration (JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List mounted drives
    Drives,

    /// List every file and directory of a drive
    Tree {
        letter: char,
        /// Directory to start from
        #[arg(default_value = "")]
        root: String,
    },

    /// Print a file to stdout
    Cat {
        path: String,
        /// Refuse files larger than this many bytes
        #[arg(long, default_value_t = 16 * 1024 * 1024)]
        max_size: u64,
    },

    /// Show where a path resolves to
    Resolve {
        path: String,
        /// Ask for write access
        #[arg(short, long)]
        write: bool,
    },

    /// Switch a drive to its next disk
    Cycle {
        letter: char,
        #[arg(long, default_value_t = 1)]
        times: usize,
    },

    /// Dump the drive save state
    State,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_drives(system: &DriveSystem) -> Result<(), Box<dyn std::error::Error>> {
    for letter in system.mounted_letters() {
        let drive = system.drive_at(letter)?;
        let drive = drive.borrow();
        let disks = system.disk_set(letter)?;
        let swap = if disks.len() > 1 {
            format!(" [disk {} of {}]", disks.current_index() + 1, disks.len())
        } else {
            String::new()
        };
        println!(
            "{letter}: {:<10} {:<24} \\{}{swap}",
            drive.label(),
            drive.info(),
            system.curdir(letter)?
        );
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = MountConfig::from_path(&args.config)?;
    tracing::debug!(
        config = %args.config.display(),
        drives = config.drives.len(),
        "loaded mount configuration"
    );
    let base_dir = args
        .config
        .parent()
        .map(PathBuf::from)
        .unwrap_or_default();
    let mut system = DriveSystem::from_config(&config, &base_dir)?;

    match args.command {
        Command::Drives => print_drives(&system)?,
        Command::Tree { letter, root } => {
            system.walk(letter, &root, |entry| {
                if entry.is_dir {
                    println!("{}\\", entry.path);
                } else {
                    println!("{:<64} {:>10}", entry.path, entry.size);
                }
            })?;
        }
        Command::Cat { path, max_size } => {
            let opened = system.find_and_open(&path, None, false)?;
            match system.read_and_close(opened.handle, max_size)? {
                Some(content) => std::io::stdout().write_all(&content)?,
                None => {
                    eprintln!(
                        "{}: {} bytes, larger than {max_size}",
                        opened.resolved_path, opened.size
                    );
                    return Err("file too large".into());
                }
            }
        }
        Command::Resolve { path, write } => {
            let opened = system.find_and_open(&path, None, write)?;
            println!(
                "{} ({} bytes, {})",
                opened.resolved_path,
                opened.size,
                if opened.writable { "read/write" } else { "read-only" }
            );
            system.close_file(opened.handle)?;
        }
        Command::Cycle { letter, times } => {
            for _ in 0..times {
                system.cycle_disks(letter, true)?;
            }
            print_drives(&system)?;
        }
        Command::State => {
            let data = system.save_state()?;
            println!("{} bytes (at most {})", data.len(), system.state_max_size()?);
            for chunk in data.chunks(16) {
                let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02X}")).collect();
                println!("{}", hex.join(" "));
            }
        }
    }

    system.teardown();
    Ok(())
}
