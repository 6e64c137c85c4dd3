//! lakelog CLI
//!
//! Commits and inspects table logs in a local directory, using a journaled
//! exclusion table under `<root>/.lakelog`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use bytes::Bytes;
use clap::{Parser, Subcommand};
use lakelog::exclusion::{ExclusionTable, JournalExclusionTable};
use lakelog::object_store::{LocalObjectStore, ObjectStore};
use lakelog::{LakeError, LogStoreCoordinator, Resolution, ThroughputHints};
use tracing_subscriber::{fmt, EnvFilter};

/// lakelog
#[derive(Parser, Debug)]
#[command(name = "lakelog")]
#[command(about = "Exactly-once commits for object-store table logs")]
#[command(version)]
struct Args {
    /// Root directory acting as the object store
    #[arg(short, long, default_value = "./lakelog_data")]
    root: PathBuf,

    /// Exclusion table name
    #[arg(short, long, default_value = "delta_log")]
    table_name: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the exclusion table if it does not exist
    Init {
        #[arg(long, default_value = "5")]
        rcu: u64,

        #[arg(long, default_value = "5")]
        wcu: u64,
    },

    /// Commit a payload file as a log version
    Commit {
        /// Log root, relative to the store root
        #[arg(short, long)]
        log: String,

        #[arg(short, long)]
        version: u64,

        /// File holding the payload
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Resolve one version (repairing it if needed)
    Resolve {
        #[arg(short, long)]
        log: String,

        #[arg(short, long)]
        version: u64,

        /// Print the payload instead of a summary
        #[arg(long)]
        print: bool,
    },

    /// List committed versions from a starting point
    List {
        #[arg(short, long)]
        log: String,

        #[arg(short, long, default_value = "0")]
        from: u64,
    },

    /// Print the latest committed version
    Latest {
        #[arg(short, long)]
        log: String,
    },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,lakelog=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(code) => code,
        Err(e @ LakeError::RaceLost { .. }) => {
            println!("{}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> lakelog::Result<ExitCode> {
    let store: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::open(&args.root)?);
    let table: Arc<dyn ExclusionTable> = Arc::new(JournalExclusionTable::open(
        &args.root.join(".lakelog"),
        args.table_name.as_str(),
    ));
    let coordinator = LogStoreCoordinator::new(store, table);

    match args.command {
        Commands::Init { rcu, wcu } => {
            let status = coordinator.ensure_table_exists(&ThroughputHints {
                read_capacity_units: rcu,
                write_capacity_units: wcu,
            })?;
            println!("{}: {:?}", args.table_name, status);
        }

        Commands::Commit { log, version, file } => {
            let payload = Bytes::from(std::fs::read(&file)?);
            coordinator
                .write_entry(&log, version, payload)?
                .written(&log, version)?;
            println!("committed {log} version {version}");
        }

        Commands::Resolve { log, version, print } => {
            match coordinator.resolve_version(&log, version)? {
                Resolution::Committed(entry) if print => {
                    println!("{}", String::from_utf8_lossy(&entry.payload));
                }
                Resolution::Committed(entry) => {
                    println!(
                        "{} committed: {} ({} bytes, commit_time={:?})",
                        entry.version,
                        entry.path,
                        entry.payload.len(),
                        entry.commit_time
                    );
                }
                Resolution::NotCommitted => {
                    println!("{version} not committed");
                    return Ok(ExitCode::from(3));
                }
            }
        }

        Commands::List { log, from } => {
            for entry in coordinator.list_from(&log, from) {
                let entry = entry?;
                println!("{}\t{}\t{} bytes", entry.version, entry.path, entry.payload.len());
            }
        }

        Commands::Latest { log } => match coordinator.latest_version(&log)? {
            Some(version) => println!("{version}"),
            None => {
                println!("no versions");
                return Ok(ExitCode::from(3));
            }
        },
    }

    Ok(ExitCode::SUCCESS)
}
