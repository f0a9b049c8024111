use crate::analysis::{Analyzer, RunRecord};
use anyhow::{Context, Result, bail};
use gossip_sim::{Config, GossipModel, network::SocialNetworkBuilder};
use glob::glob;
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rmp_serde::encode;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    /// Write `cfg` as the configuration of a new simulation directory.
    pub fn init_sim<P: AsRef<Path>>(sim_dir: P, cfg: &Config) -> Result<()> {
        let sim_dir = sim_dir.as_ref();
        fs::create_dir_all(sim_dir).with_context(|| format!("failed to create {sim_dir:?}"))?;

        let file = sim_dir.join("config.toml");
        if file.exists() {
            bail!("{file:?} already exists");
        }
        cfg.to_file(&file).context("failed to write cfg")?;
        log::info!("wrote {file:?}");

        Ok(())
    }

    /// Seed runs from `seed` instead of the configured one.
    pub fn set_base_seed(&mut self, seed: u64) {
        log::info!("overriding base seed with {seed}");
        self.cfg.run.seed = Some(seed);
    }

    /// Run one simulation to completion in a new run directory.
    pub fn create_run(&self) -> Result<()> {
        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;

        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let seed = match self.cfg.run.seed {
            Some(seed) => seed.wrapping_add(run_idx as u64),
            None => ChaCha12Rng::try_from_os_rng()?.random(),
        };
        log::info!("using seed {seed}");

        let mut model =
            GossipModel::from_seed(self.cfg.clone(), seed).context("failed to construct model")?;

        let network = SocialNetworkBuilder::network_statistics(model.agents());
        let structure = SocialNetworkBuilder::network_structure(model.agents());
        log::info!("{network:#?}");
        log::info!("{structure:#?}");
        let net_cfg = &self.cfg.network;
        if network.avg_connections < net_cfg.min_social_connections as f64
            || network.avg_connections > net_cfg.max_social_connections as f64
        {
            log::warn!(
                "average connections {:.2} outside of {}..={}",
                network.avg_connections,
                net_cfg.min_social_connections,
                net_cfg.max_social_connections
            );
        }

        while model.is_running() {
            model.step();
            let summary = model.summary();
            log::info!(
                "step {:04}: counts {:?}, informed {:06.2}%",
                summary.step,
                summary.counts,
                summary.informed_percentage
            );
        }

        let record = RunRecord {
            seed,
            summary: model.summary(),
            network,
            structure,
            metrics: model.metrics().series().to_vec(),
        };

        let file = self.record_file(run_idx);
        let file = File::create(&file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &record).context("failed to serialize record")?;
        writer.flush().context("failed to flush writer stream")?;

        Ok(())
    }

    /// Aggregate the records of every run.
    pub fn analyze_sim(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        let mut analyzer = Analyzer::new();
        for run_idx in 0..n_runs {
            analyzer
                .add_file(self.record_file(run_idx))
                .context("failed to add file")?;
        }

        analyzer
            .save_results(self.results_file())
            .context("failed to save results")?;

        Ok(())
    }

    /// Remove every run directory and the aggregated results.
    pub fn clean_sim(&self) -> Result<()> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        for run_dir in glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
        {
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }

        let results_file = self.results_file();
        if results_file.exists() {
            fs::remove_file(&results_file)
                .with_context(|| format!("failed to remove {results_file:?}"))?;
            log::info!("removed {results_file:?}");
        }

        Ok(())
    }

    fn count_run_dirs(&self) -> Result<usize> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let count = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .count();
        Ok(count)
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn record_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("metrics.msgpack")
    }

    fn results_file(&self) -> PathBuf {
        self.sim_dir.join("results.msgpack")
    }
}
