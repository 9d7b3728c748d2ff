use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use sim::hardware::{BusPorts, CheckpointSignals, HardwareModel};
use sim::state::snapshot;
use sim::{DeviceId, FileSearch, Session, SimConfig, StateCoordinator};

/// Memory harness for the Taito F2 hardware model.
#[derive(Parser, Debug)]
#[command(name = "f2sim", version, about)]
struct Cli {
    /// JSON configuration; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory or .zip to search for ROM images, in order. Added after
    /// the ones in the config.
    #[arg(short = 's', long = "search-path")]
    search_paths: Vec<PathBuf>,

    /// Also write the log to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the ROM layout and report what was found.
    Layout,
    /// List the snapshot files in the working directory.
    Snapshots,
    /// Print the blocks of a snapshot file.
    Inspect { file: PathBuf },
    /// Load the ROM layout and write a raw image of one memory.
    Dump {
        #[arg(long)]
        device: DeviceId,
        #[arg(long, value_parser = parse_number, default_value = "0")]
        offset: usize,
        /// Defaults to the whole device.
        #[arg(long, value_parser = parse_number)]
        len: Option<usize>,
        #[arg(short, long)]
        out: PathBuf,
    },
}

/// Stands in for the model when only the memories are needed. Its ports
/// stay idle, so clocking it never touches memory.
#[derive(Default)]
struct Detached {
    ports: BusPorts,
    checkpoint: CheckpointSignals,
}

impl HardwareModel for Detached {
    fn set_clock(&mut self, _high: bool) {}

    fn set_reset(&mut self, _active: bool) {}

    fn eval(&mut self) {}

    fn ports(&self) -> &BusPorts {
        &self.ports
    }

    fn ports_mut(&mut self) -> &mut BusPorts {
        &mut self.ports
    }

    fn checkpoint(&self) -> &CheckpointSignals {
        &self.checkpoint
    }

    fn checkpoint_mut(&mut self) -> &mut CheckpointSignals {
        &mut self.checkpoint
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref());

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(log_file: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let name = path.file_name().unwrap_or(path.as_os_str());
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}

fn run(cli: Cli) -> sim::Result<()> {
    let config = match &cli.config {
        Some(path) => SimConfig::from_json_file(path)?,
        None => SimConfig::default(),
    };

    match cli.command {
        Command::Layout => {
            let session = load_session(&config, &cli.search_paths);
            for device in [DeviceId::Sdram, DeviceId::Ddr] {
                let storage = session.storage(device);
                let used = storage.as_bytes().iter().filter(|b| **b != 0).count();
                println!(
                    "{device}: capacity 0x{:X}, {used} non-zero bytes",
                    storage.capacity()
                );
            }
        }
        Command::Snapshots => {
            for name in StateCoordinator::from_config(&config).list_snapshots()? {
                println!("{name}");
            }
        }
        Command::Inspect { file } => {
            let bytes = std::fs::read(&file)?;
            let blocks = snapshot::decode(&bytes)?;
            println!(
                "{}: version {}, {} blocks",
                file.display(),
                snapshot::SNAPSHOT_VERSION,
                blocks.len()
            );
            for (index, block) in blocks.iter().enumerate() {
                let label = match index {
                    0 => "model".to_string(),
                    n => config.snapshot_regions.get(n - 1).map_or_else(
                        || "unknown region".to_string(),
                        |r| format!("{} @ 0x{:X}", r.device, r.offset),
                    ),
                };
                println!("  [{index}] {label}: {} bytes", block.len());
            }
        }
        Command::Dump {
            device,
            offset,
            len,
            out,
        } => {
            let session = load_session(&config, &cli.search_paths);
            let storage = session.storage(device);
            let len = len.unwrap_or_else(|| storage.capacity().saturating_sub(offset));
            storage.dump(&out, offset, len)?;
        }
    }

    Ok(())
}

fn load_session(config: &SimConfig, extra_paths: &[PathBuf]) -> Session<Detached> {
    let mut search = FileSearch::new();
    for path in config.search_paths.iter().chain(extra_paths) {
        if let Err(e) = search.add_search_path(path) {
            tracing::warn!("{e}");
        }
    }

    let mut session = Session::new(Detached::default(), config);
    let loaded = session.load_layout(&mut search, &config.roms);
    tracing::info!("Loaded {loaded} of {} ROM images", config.roms.len());
    session
}

fn parse_number(s: &str) -> Result<usize, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(&hex.replace('_', ""), 16),
        None => s.replace('_', "").parse(),
    };
    parsed.map_err(|e| format!("invalid number '{s}': {e}"))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn numbers() {
        assert_eq!(parse_number("0x4_0000"), Ok(0x4_0000));
        assert_eq!(parse_number("0X10"), Ok(16));
        assert_eq!(parse_number("4096"), Ok(4096));
        assert!(parse_number("0xZZ").is_err());
        assert!(parse_number("").is_err());
    }

    #[test]
    fn cli_parses_dump() {
        let cli = Cli::try_parse_from([
            "f2sim",
            "-s",
            "roms",
            "-s",
            "roms/finalb.zip",
            "dump",
            "--device",
            "ddr",
            "--offset",
            "0x100",
            "-o",
            "ddr.bin",
        ])
        .unwrap();

        assert_eq!(cli.search_paths.len(), 2);
        match cli.command {
            Command::Dump {
                device, offset, len, ..
            } => {
                assert_eq!(device, DeviceId::Ddr);
                assert_eq!(offset, 0x100);
                assert_eq!(len, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn detached_session_loads_layout() {
        let config = SimConfig {
            sdram_size: 0x1000,
            ddr_size: 0x1000,
            ..SimConfig::default()
        };
        let mut session = load_session(&config, &[]);
        session.tick(4);
        assert_eq!(session.ticks(), 4);
        assert!(session.storage(DeviceId::Sdram).as_bytes().iter().all(|b| *b == 0));
    }
}
