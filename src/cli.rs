use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;

use piqtree::distribution::IndelDistribution;
use piqtree::iqtree::TreeGenMode;
use piqtree::model::{Model, ModelFamily};
use piqtree::EngineConfig;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub(super) struct Cli {
    /// IQ-TREE engine library, overrides the PIQTREE_ENGINE environment variable
    #[arg(short, long, global = true, value_name = "LIBRARY")]
    pub(super) library: Option<PathBuf>,

    /// Run engine calls in the working directory and keep the files they write
    #[arg(long, global = true)]
    pub(super) keep_files: bool,

    /// Let the engine print its log to the console during calls
    #[arg(long, global = true)]
    pub(super) show_engine_output: bool,

    /// More log output, repeat for trace level
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub(super) verbose: u8,

    #[command(subcommand)]
    pub(super) command: Commands,
}

impl Cli {
    pub(super) fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    pub(super) fn engine_config(&self) -> EngineConfig {
        EngineConfig::new(self.library.clone())
            .scratch_dirs(!self.keep_files)
            .silence_output(!self.show_engine_output)
    }
}

#[derive(Subcommand)]
pub(super) enum Commands {
    /// Prints the engine version
    Version,

    /// Lists the available substitution models
    Models {
        /// all, dna or protein
        #[arg(default_value = "all")]
        family: ModelFamily,
    },

    /// Lists the available state frequency types
    FreqTypes,

    /// Lists the available rate heterogeneity types
    RateTypes,

    /// Pairwise Robinson-Foulds distances between the trees in a newick file
    Rf {
        #[arg(value_name = "TREE_FILE")]
        tree_file: PathBuf,
    },

    /// Generates random trees
    RandomTree {
        /// Number of taxa per tree
        #[arg(short = 'n', long)]
        num_taxa: i32,

        /// Generation mode, e.g. YULE_HARDING or BALANCED
        #[arg(short, long, default_value = "YULE_HARDING")]
        mode: TreeGenMode,

        #[arg(short = 't', long, default_value_t = 1)]
        num_trees: i32,

        #[arg(short, long)]
        seed: Option<i32>,
    },

    /// Reconstructs a maximum likelihood tree
    Build {
        /// Sequence file in fasta format
        #[arg(short = 'i', long, value_name = "SEQ_FILE")]
        seq_file: PathBuf,

        /// IQ-TREE model string, e.g. GTR+F+G4
        #[arg(short, long)]
        model: Model,

        #[arg(short, long)]
        seed: Option<i32>,

        /// Bootstrap replicates, at least 1000 to enable
        #[arg(short, long)]
        bootstrap: Option<i32>,

        #[arg(short = 'T', long)]
        threads: Option<i32>,

        /// Output tree file, newick is printed when absent
        #[arg(short, long, value_name = "OUT_TREE")]
        output: Option<PathBuf>,
    },

    /// Fits branch lengths to a fixed topology
    Fit {
        #[arg(short = 'i', long, value_name = "SEQ_FILE")]
        seq_file: PathBuf,

        #[arg(short, long, value_name = "TREE_FILE")]
        tree_file: PathBuf,

        #[arg(short, long)]
        model: Model,

        /// Keep the input branch lengths and only evaluate the likelihood
        #[arg(long)]
        bl_fixed: bool,

        #[arg(short = 'T', long)]
        threads: Option<i32>,

        #[arg(short, long, value_name = "OUT_TREE")]
        output: Option<PathBuf>,
    },

    /// Finds the best fitting models with ModelFinder
    ModelFinder {
        #[arg(short = 'i', long, value_name = "SEQ_FILE")]
        seq_file: PathBuf,

        #[arg(long, value_delimiter = ',')]
        model_set: Vec<String>,

        #[arg(long, value_delimiter = ',')]
        freq_set: Vec<String>,

        #[arg(long, value_delimiter = ',')]
        rate_set: Vec<String>,

        #[arg(short, long)]
        seed: Option<i32>,

        #[arg(short = 'T', long)]
        threads: Option<i32>,
    },

    /// Pairwise JC distances
    JcDistances {
        #[arg(short = 'i', long, value_name = "SEQ_FILE")]
        seq_file: PathBuf,

        #[arg(short = 'T', long)]
        threads: Option<i32>,
    },

    /// Neighbour joining tree from JC distances
    Nj {
        #[arg(short = 'i', long, value_name = "SEQ_FILE")]
        seq_file: PathBuf,

        #[arg(long)]
        allow_negative: bool,

        #[arg(short = 'T', long)]
        threads: Option<i32>,

        #[arg(short, long, value_name = "OUT_TREE")]
        output: Option<PathBuf>,
    },

    /// Consensus of the trees in a newick file
    Consensus {
        #[arg(value_name = "TREE_FILE")]
        tree_file: PathBuf,

        /// Proportion of trees a clade must appear in
        #[arg(short = 'c', long, default_value_t = 0.5)]
        min_support: f64,

        #[arg(short, long, value_name = "OUT_TREE")]
        output: Option<PathBuf>,
    },

    /// Simulates an alignment along a tree with AliSim
    Simulate {
        #[arg(short, long, value_name = "TREE_FILE")]
        tree_file: PathBuf,

        #[arg(short, long)]
        model: Model,

        #[arg(long, default_value_t = 1000)]
        length: i32,

        #[arg(short, long)]
        seed: Option<i32>,

        #[arg(long, default_value_t = 0.0)]
        insertion_rate: f64,

        #[arg(long, default_value_t = 0.0)]
        deletion_rate: f64,

        #[arg(long, default_value = "POW{1.7/100}")]
        insertion_size: IndelDistribution,

        #[arg(long, default_value = "POW{1.7/100}")]
        deletion_size: IndelDistribution,

        #[arg(long)]
        root_seq: Option<String>,

        #[arg(short = 'T', long)]
        threads: Option<i32>,

        /// Output fasta file, printed when absent
        #[arg(short, long, value_name = "OUT_FASTA")]
        output: Option<PathBuf>,
    },
}
