//! Phylogenetic operations on host types, each backed by one or more engine
//! calls.
use std::fmt::{self, Display};
use std::str::FromStr;

use anyhow::bail;
use log::info;
use nalgebra::DMatrix;

use crate::alignment::Alignment;
use crate::engine::Engine;
use crate::errors::ValidationError;
use crate::model::Model;
use crate::tree::{from_newick_string, Tree};
use crate::Result;

mod distances;
mod model_finder;
mod simulate;
mod tree_yaml;

pub use distances::DistanceMatrix;
pub use model_finder::{ModelFinderResult, ModelResultValue};
pub use simulate::{simulate_alignment, SimulateOptions, UNSUPPORTED_LIE_MODELS};
pub use tree_yaml::{EdgeParams, FittedTree, ModelFit};

/// Setting under which the engine generates random trees.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(non_camel_case_types, clippy::upper_case_acronyms)]
pub enum TreeGenMode {
    YULE_HARDING,
    UNIFORM,
    CATERPILLAR,
    BALANCED,
    BIRTH_DEATH,
    STAR_TREE,
}

impl TreeGenMode {
    pub const ALL: [TreeGenMode; 6] = [
        TreeGenMode::YULE_HARDING,
        TreeGenMode::UNIFORM,
        TreeGenMode::CATERPILLAR,
        TreeGenMode::BALANCED,
        TreeGenMode::BIRTH_DEATH,
        TreeGenMode::STAR_TREE,
    ];
}

impl Display for TreeGenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeGenMode::YULE_HARDING => write!(f, "YULE_HARDING"),
            TreeGenMode::UNIFORM => write!(f, "UNIFORM"),
            TreeGenMode::CATERPILLAR => write!(f, "CATERPILLAR"),
            TreeGenMode::BALANCED => write!(f, "BALANCED"),
            TreeGenMode::BIRTH_DEATH => write!(f, "BIRTH_DEATH"),
            TreeGenMode::STAR_TREE => write!(f, "STAR_TREE"),
        }
    }
}

impl FromStr for TreeGenMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mode = s.to_uppercase().replace('-', "_");
        match TreeGenMode::ALL.iter().find(|m| m.to_string() == mode) {
            Some(mode) => Ok(*mode),
            None => bail!(ValidationError::new(format!(
                "Unknown tree generation mode '{}'",
                s
            ))),
        }
    }
}

/// Tree search settings. Absent values take the engine defaults: seed 0,
/// no bootstrap, one thread.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TreeSearchOptions {
    pub seed: Option<i32>,
    /// At least 1000 replicates are needed for ultrafast bootstrap.
    pub bootstrap_replicates: Option<i32>,
    pub num_threads: Option<i32>,
}

/// Reconstructs a maximum likelihood tree for `aln`.
pub fn build_tree(
    engine: &Engine,
    aln: &Alignment,
    model: &Model,
    options: &TreeSearchOptions,
) -> Result<FittedTree> {
    info!("Building tree for {} sequences under {}.", aln.len(), model);
    let report = engine.build_tree(
        aln.names(),
        aln.seqs(),
        &model.to_string(),
        options.seed.unwrap_or(0),
        options.bootstrap_replicates.unwrap_or(0),
        options.num_threads.unwrap_or(1),
    )?;
    tree_yaml::parse_tree_report(&report, aln.names(), model)
}

/// Fits branch lengths and likelihood on a fixed topology. With `bl_fixed`
/// the given branch lengths are kept and only the likelihood is evaluated.
pub fn fit_tree(
    engine: &Engine,
    aln: &Alignment,
    tree: &Tree,
    model: &Model,
    num_threads: Option<i32>,
    bl_fixed: bool,
) -> Result<FittedTree> {
    let report = engine.fit_tree(
        aln.names(),
        aln.seqs(),
        &model.to_string(),
        &tree.to_newick(),
        bl_fixed,
        0,
        num_threads.unwrap_or(1),
    )?;
    tree_yaml::parse_tree_report(&report, aln.names(), model)
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelFinderOptions {
    pub model_set: Vec<String>,
    pub freq_set: Vec<String>,
    pub rate_set: Vec<String>,
    pub seed: Option<i32>,
    pub num_threads: Option<i32>,
}

/// Finds the models of best fit for `aln`. Empty sets leave the search
/// space to the engine.
pub fn model_finder(
    engine: &Engine,
    aln: &Alignment,
    options: &ModelFinderOptions,
) -> Result<ModelFinderResult> {
    let report = engine.model_finder(
        aln.names(),
        aln.seqs(),
        options.seed.unwrap_or(0),
        &options.model_set.join(","),
        &options.freq_set.join(","),
        &options.rate_set.join(","),
        options.num_threads.unwrap_or(1),
    )?;
    ModelFinderResult::from_yaml(&report)
}

/// Pairwise JC distances. Without `num_threads` the engine picks the
/// thread count.
pub fn jc_distances(
    engine: &Engine,
    aln: &Alignment,
    num_threads: Option<i32>,
) -> Result<DistanceMatrix> {
    let distances = engine.jc_distances(aln.names(), aln.seqs(), num_threads.unwrap_or(0))?;
    DistanceMatrix::from_row_major(aln.names().to_vec(), &distances)
}

/// Neighbour joining tree. Negative branch lengths are set to zero unless
/// `allow_negative`.
pub fn nj_tree(engine: &Engine, distances: &DistanceMatrix, allow_negative: bool) -> Result<Tree> {
    if distances.has_nan() {
        bail!(ValidationError::new(
            "The pairwise distance matrix cannot contain NaN values."
        ));
    }
    let newick = engine.nj_tree(distances.names(), &distances.to_row_major())?;
    let mut tree: Tree = newick.parse()?;
    if !allow_negative {
        tree.clamp_negative_branch_lengths();
    }
    Ok(tree)
}

/// Consensus of `trees`. A clade is kept when it appears in at least
/// `min_support` of the trees: 0.5 gives the majority-rule tree, 1.0 the
/// strict consensus.
pub fn consensus_tree(engine: &Engine, trees: &[Tree], min_support: f64) -> Result<Tree> {
    if !(0.0..=1.0).contains(&min_support) {
        bail!(ValidationError::new(format!(
            "Only min support values in the range 0 <= value < 1 are supported, got {}",
            min_support
        )));
    }
    if let Some((first, rest)) = trees.split_first() {
        if !rest.iter().all(|tree| tree.same_taxa_set(first)) {
            bail!(ValidationError::new("Trees must be on same taxa set."));
        }
    }
    let newicks: Vec<String> = trees.iter().map(Tree::to_newick).collect();
    engine.consensus_tree(&newicks, min_support)?.parse()
}

pub fn random_tree(
    engine: &Engine,
    num_taxa: i32,
    mode: TreeGenMode,
    seed: Option<i32>,
) -> Result<Tree> {
    let newick = engine.random_tree(num_taxa, &mode.to_string(), 1, seed.unwrap_or(0))?;
    newick.trim().parse()
}

pub fn random_trees(
    engine: &Engine,
    num_trees: i32,
    num_taxa: i32,
    mode: TreeGenMode,
    seed: Option<i32>,
) -> Result<Vec<Tree>> {
    let newicks = engine.random_tree(num_taxa, &mode.to_string(), num_trees, seed.unwrap_or(0))?;
    from_newick_string(&newicks)
}

/// Pairwise Robinson-Foulds distances.
pub fn robinson_foulds(engine: &Engine, trees: &[Tree]) -> Result<DMatrix<f64>> {
    let newicks: Vec<String> = trees.iter().map(Tree::to_newick).collect();
    let mut distances = DMatrix::zeros(trees.len(), trees.len());
    for i in 1..trees.len() {
        for j in 0..i {
            let rf = f64::from(engine.robinson_fould(&newicks[i], &newicks[j])?);
            distances[(i, j)] = rf;
            distances[(j, i)] = rf;
        }
    }
    Ok(distances)
}
