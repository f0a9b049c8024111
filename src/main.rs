mod analysis;
mod manager;

use crate::manager::Manager;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use gossip_sim::Config;
use std::path::PathBuf;

/// Simulate rumor spreading on a toroidal grid with a social-network overlay.
///
/// A simulation directory holds a `config.toml`, one `run-NNNN` directory per
/// run and the aggregated `results.msgpack`.
#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    /// Simulation directory
    #[arg(long)]
    sim_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Write a preset config.toml into the simulation directory
    Init {
        #[arg(long, value_enum, default_value_t = Preset::Default)]
        preset: Preset,
    },

    /// Run gossip simulations, each in a new run directory
    Create {
        /// Number of runs to perform
        #[arg(long, default_value_t = 1)]
        runs: usize,

        /// Base seed, overriding the one in config.toml
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Aggregate spreading statistics over every run
    Analyze,

    /// Remove runs and results, keeping config.toml
    Clean,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Preset {
    /// 20x20 grid, 15 steps
    Small,
    /// 100x100 grid, 30 steps
    Default,
    /// 150x150 grid, 50 steps
    Large,
}

impl Preset {
    fn config(self) -> Config {
        match self {
            Preset::Small => Config::small_test(),
            Preset::Default => Config::default(),
            Preset::Large => Config::large(),
        }
    }
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    if let Command::Init { preset } = args.command {
        return Manager::init_sim(&args.sim_dir, &preset.config()).context("failed to init sim");
    }

    let mut mgr = Manager::new(&args.sim_dir).context("failed to construct mgr")?;

    match args.command {
        Command::Init { .. } => {}
        Command::Create { runs, seed } => {
            if let Some(seed) = seed {
                mgr.set_base_seed(seed);
            }
            for _ in 0..runs {
                mgr.create_run()?;
            }
        }
        Command::Analyze => mgr.analyze_sim()?,
        Command::Clean => mgr.clean_sim()?,
    }

    Ok(())
}
