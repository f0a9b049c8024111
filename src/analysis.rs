use anyhow::{Context, Result};
use gossip_sim::{
    BeliefState, MetricsSample, SimulationSummary,
    network::{NetworkStatistics, NetworkStructure},
    stats::{Accumulator, AccumulatorReport},
};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Everything written to disk for a single run.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunRecord {
    pub seed: u64,
    pub summary: SimulationSummary,
    pub network: NetworkStatistics,
    pub structure: NetworkStructure,
    pub metrics: Vec<MetricsSample>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ObsReport {
    pub name: String,
    pub values: Vec<AccumulatorReport>,
}

/// Observable accumulated over runs.
pub trait Obs {
    fn update(&mut self, record: &RunRecord);
    fn report(&self) -> ObsReport;
}

/// One scalar extracted from every run.
pub struct RunScalar {
    name: &'static str,
    extract: fn(&RunRecord) -> f64,
    acc: Accumulator,
}

impl RunScalar {
    pub fn new(name: &'static str, extract: fn(&RunRecord) -> f64) -> Self {
        Self {
            name,
            extract,
            acc: Accumulator::new(),
        }
    }
}

impl Obs for RunScalar {
    fn update(&mut self, record: &RunRecord) {
        self.acc.add((self.extract)(record));
    }

    fn report(&self) -> ObsReport {
        ObsReport {
            name: self.name.to_string(),
            values: vec![self.acc.report()],
        }
    }
}

/// Fraction of informed agents at every step, across runs.
///
/// Runs that stopped early keep contributing their final value.
pub struct InformedCurve {
    curves: Vec<Vec<f64>>,
}

impl InformedCurve {
    pub fn new() -> Self {
        Self { curves: Vec::new() }
    }
}

impl Obs for InformedCurve {
    fn update(&mut self, record: &RunRecord) {
        let curve: Vec<f64> = record
            .metrics
            .iter()
            .map(MetricsSample::informed_fraction)
            .collect();
        self.curves.push(curve);
    }

    fn report(&self) -> ObsReport {
        let n_steps = self.curves.iter().map(Vec::len).max().unwrap_or(0);
        let mut acc_vec: Vec<Accumulator> = Vec::new();
        acc_vec.resize_with(n_steps, Accumulator::new);
        for curve in &self.curves {
            let Some(&last) = curve.last() else {
                continue;
            };
            for (i_step, acc) in acc_vec.iter_mut().enumerate() {
                acc.add(curve.get(i_step).copied().unwrap_or(last));
            }
        }

        ObsReport {
            name: "informed_fraction".to_string(),
            values: acc_vec.iter().map(Accumulator::report).collect(),
        }
    }
}

fn peak_spreading(record: &RunRecord) -> f64 {
    record
        .metrics
        .iter()
        .map(|s| s.count(BeliefState::Spreading))
        .max()
        .unwrap_or(0) as f64
}

fn peak_step(record: &RunRecord) -> f64 {
    let peak = peak_spreading(record) as usize;
    record
        .metrics
        .iter()
        .find(|s| s.count(BeliefState::Spreading) == peak)
        .map_or(0, |s| s.step) as f64
}

fn final_reach(record: &RunRecord) -> f64 {
    record
        .metrics
        .last()
        .map_or(0.0, MetricsSample::informed_fraction)
}

fn duration(record: &RunRecord) -> f64 {
    record.summary.step as f64
}

pub struct Analyzer {
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new() -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(RunScalar::new("peak_spreading", peak_spreading)),
            Box::new(RunScalar::new("peak_step", peak_step)),
            Box::new(RunScalar::new("final_reach", final_reach)),
            Box::new(RunScalar::new("duration", duration)),
            Box::new(RunScalar::new("avg_connections", |r| r.network.avg_connections)),
            Box::new(RunScalar::new("clustering_coefficient", |r| {
                r.structure.clustering_coefficient
            })),
            Box::new(InformedCurve::new()),
        ];
        Self { obs_ptr_vec }
    }

    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);

        let record: RunRecord = decode::from_read(&mut reader).context("failed to read record")?;
        for obs in &mut self.obs_ptr_vec {
            obs.update(&record);
        }
        Ok(())
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        let reports: Vec<_> = self.obs_ptr_vec.iter().map(|obs| obs.report()).collect();
        for report in reports.iter().filter(|r| r.values.len() == 1) {
            log::info!("{}: {:?}", report.name, report.values[0]);
        }

        encode::write(&mut writer, &reports).context("failed to serialize results")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(series: &[[usize; 4]]) -> RunRecord {
        let metrics: Vec<_> = series
            .iter()
            .enumerate()
            .map(|(step, &counts)| MetricsSample { step, counts })
            .collect();
        let last = *metrics.last().expect("series should not be empty");
        RunRecord {
            seed: 0,
            summary: SimulationSummary {
                step: last.step,
                total_agents: last.total(),
                counts: last.counts,
                informed_percentage: 100.0 * last.informed_fraction(),
                is_running: false,
            },
            network: NetworkStatistics {
                total_agents: last.total(),
                avg_connections: 6.0,
                min_connections: 6,
                max_connections: 6,
                std_connections: 0.0,
            },
            structure: NetworkStructure {
                num_nodes: last.total(),
                num_edges: 0,
                density: 0.0,
                num_components: 1,
                largest_component_size: last.total(),
                is_connected: true,
                average_path_length: Some(2.5),
                diameter: Some(4),
                clustering_coefficient: 0.0,
            },
            metrics,
        }
    }

    #[test]
    fn scalars_describe_the_epidemic() {
        let rec = record(&[[9, 1, 0, 0], [5, 4, 1, 0], [2, 3, 5, 0], [2, 0, 8, 0]]);
        assert_eq!(peak_spreading(&rec), 4.0);
        assert_eq!(peak_step(&rec), 1.0);
        assert!((final_reach(&rec) - 0.8).abs() < 1e-12);
        assert_eq!(duration(&rec), 3.0);
    }

    #[test]
    fn curve_pads_short_runs_with_their_final_value() {
        let mut curve = InformedCurve::new();
        curve.update(&record(&[[9, 1, 0, 0], [8, 0, 2, 0]]));
        curve.update(&record(&[[9, 1, 0, 0], [6, 4, 0, 0], [4, 0, 6, 0]]));

        let report = curve.report();
        assert_eq!(report.values.len(), 3);
        assert!((report.values[2].mean - 0.4).abs() < 1e-12);
        assert_eq!(report.values[2].n_vals, 2);
        assert!((report.values[0].mean - 0.1).abs() < 1e-12);

        // A longer run added later pads the earlier ones too.
        curve.update(&record(&[[9, 1, 0, 0], [9, 1, 0, 0], [9, 1, 0, 0], [0, 0, 10, 0]]));
        let report = curve.report();
        assert_eq!(report.values.len(), 4);
        assert_eq!(report.values[3].n_vals, 3);
        assert!((report.values[3].mean - 0.6).abs() < 1e-12);
    }
}
