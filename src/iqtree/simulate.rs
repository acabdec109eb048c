use anyhow::bail;
use log::info;
use rand::Rng;
use serde::Deserialize;

use crate::alignment::Alignment;
use crate::distribution::IndelDistribution;
use crate::engine::{Engine, SimulateArgs};
use crate::errors::{ParseIqTreeError, ValidationError};
use crate::model::{LieModel, Model};
use crate::tree::Tree;
use crate::Result;

/// Lie-Markov models the simulator cannot run.
pub const UNSUPPORTED_LIE_MODELS: [LieModel; 7] = [
    LieModel::Lie1_1,
    LieModel::Lie3_3a,
    LieModel::Lie4_4a,
    LieModel::Lie6_7a,
    LieModel::Lie9_20a,
    LieModel::Lie9_20b,
    LieModel::Lie12_12,
];

#[derive(Clone, Debug, PartialEq)]
pub struct SimulateOptions {
    /// Sites to simulate. Indels may make the result longer.
    pub length: i32,
    /// Drawn at random when absent.
    pub seed: Option<i32>,
    pub insertion_rate: f64,
    pub deletion_rate: f64,
    pub insertion_size_distribution: IndelDistribution,
    pub deletion_size_distribution: IndelDistribution,
    pub root_seq: Option<String>,
    pub num_threads: Option<i32>,
}

impl Default for SimulateOptions {
    fn default() -> Self {
        Self {
            length: 1000,
            seed: None,
            insertion_rate: 0.0,
            deletion_rate: 0.0,
            insertion_size_distribution: IndelDistribution::default(),
            deletion_size_distribution: IndelDistribution::default(),
            root_seq: None,
            num_threads: None,
        }
    }
}

#[derive(Deserialize)]
struct SimulationReport {
    alignment: String,
}

pub(crate) fn make_rand_seed() -> i32 {
    rand::thread_rng().gen_range(1..=i32::MAX)
}

/// Simulates an alignment along `tree` with AliSim.
pub fn simulate_alignment(
    engine: &Engine,
    tree: &Tree,
    model: &Model,
    options: &SimulateOptions,
) -> Result<Alignment> {
    if let Some(lie) = model.substitution.lie_model() {
        if UNSUPPORTED_LIE_MODELS.contains(&lie) {
            bail!(ValidationError::new(format!(
                "Lie Model {} is unsupported.",
                lie
            )));
        }
    }
    let seed = options.seed.unwrap_or_else(make_rand_seed);
    info!("Simulating {} sites under {} with seed {}.", options.length, model, seed);
    let trees = [tree.to_newick()];
    let model = model.to_string();
    let insertion = options.insertion_size_distribution.to_string();
    let deletion = options.deletion_size_distribution.to_string();
    let report = engine.simulate_alignment(&SimulateArgs {
        trees: &trees,
        model: &model,
        seed,
        partition_info: "",
        partition_type: "",
        length: options.length,
        insertion_rate: options.insertion_rate,
        deletion_rate: options.deletion_rate,
        root_seq: options.root_seq.as_deref().unwrap_or_default(),
        num_threads: options.num_threads.unwrap_or(1),
        insertion_size_distribution: &insertion,
        deletion_size_distribution: &deletion,
    })?;
    let report: SimulationReport = match serde_yaml::from_str(&report) {
        Ok(report) => report,
        Err(e) => bail!(ParseIqTreeError::new(format!(
            "IQ-TREE simulation output unreadable: {}",
            e
        ))),
    };
    Alignment::from_fasta_str(&report.alignment)
}
