use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Error};
use clap::Parser;
use ftail::Ftail;
use itertools::Itertools;
use log::{debug, info};

use piqtree::alignment::Alignment;
use piqtree::iqtree::{self, FittedTree, ModelFinderOptions, SimulateOptions, TreeSearchOptions};
use piqtree::model::{available_freq_types, available_models, available_rate_types};
use piqtree::tree::{from_newick_string, Tree};
use piqtree::Engine;

mod cli;
use crate::cli::{Cli, Commands};

type Result<T> = std::result::Result<T, Error>;

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            bail!("Unable to parse command line arguments: \n {}", error)
        }
    };
    Ftail::new()
        .console(cli.log_level())
        .init()
        .map_err(|e| anyhow!("Unable to set up logging: {:?}", e))?;
    info!("Successfully parsed the command line parameters");

    let config = cli.engine_config();
    let engine = || -> Result<Engine> {
        info!("{}", config);
        Engine::load(&config)
    };

    match cli.command {
        Commands::Version => println!("{}", engine()?.version()?),
        Commands::Models { family } => {
            for option in available_models(family) {
                println!(
                    "{}\t{}\t{}",
                    option.model_type, option.abbreviation, option.description
                );
            }
        }
        Commands::FreqTypes => {
            for (freq, description) in available_freq_types() {
                println!("{}\t{}", freq, description);
            }
        }
        Commands::RateTypes => {
            for (rate, description) in available_rate_types() {
                println!("{}\t{}", if rate.is_empty() { "-" } else { rate.as_str() }, description);
            }
        }
        Commands::Rf { tree_file } => {
            let trees = read_trees(&tree_file)?;
            let distances = iqtree::robinson_foulds(&engine()?, &trees)?;
            for row in distances.row_iter() {
                println!("{}", row.iter().join("\t"));
            }
        }
        Commands::RandomTree {
            num_taxa,
            mode,
            num_trees,
            seed,
        } => {
            for tree in iqtree::random_trees(&engine()?, num_trees, num_taxa, mode, seed)? {
                println!("{}", tree);
            }
        }
        Commands::Build {
            seq_file,
            model,
            seed,
            bootstrap,
            threads,
            output,
        } => {
            let aln = Alignment::read_fasta(&seq_file)?;
            let options = TreeSearchOptions {
                seed,
                bootstrap_replicates: bootstrap,
                num_threads: threads,
            };
            let fitted = iqtree::build_tree(&engine()?, &aln, &model, &options)?;
            report_fitted_tree(&fitted, output)?;
        }
        Commands::Fit {
            seq_file,
            tree_file,
            model,
            bl_fixed,
            threads,
            output,
        } => {
            let aln = Alignment::read_fasta(&seq_file)?;
            let tree: Tree = fs::read_to_string(&tree_file)?.parse()?;
            let fitted = iqtree::fit_tree(&engine()?, &aln, &tree, &model, threads, bl_fixed)?;
            report_fitted_tree(&fitted, output)?;
        }
        Commands::ModelFinder {
            seq_file,
            model_set,
            freq_set,
            rate_set,
            seed,
            threads,
        } => {
            let aln = Alignment::read_fasta(&seq_file)?;
            let options = ModelFinderOptions {
                model_set,
                freq_set,
                rate_set,
                seed,
                num_threads: threads,
            };
            let result = iqtree::model_finder(&engine()?, &aln, &options)?;
            print!("{}", result.to_yaml()?);
        }
        Commands::JcDistances { seq_file, threads } => {
            let aln = Alignment::read_fasta(&seq_file)?;
            let distances = iqtree::jc_distances(&engine()?, &aln, threads)?;
            for (name, row) in distances.names().iter().zip(distances.matrix().row_iter()) {
                println!("{}\t{}", name, row.iter().join("\t"));
            }
        }
        Commands::Nj {
            seq_file,
            allow_negative,
            threads,
            output,
        } => {
            let aln = Alignment::read_fasta(&seq_file)?;
            let engine = engine()?;
            let distances = iqtree::jc_distances(&engine, &aln, threads)?;
            let tree = iqtree::nj_tree(&engine, &distances, allow_negative)?;
            write_tree(&tree, output)?;
        }
        Commands::Consensus {
            tree_file,
            min_support,
            output,
        } => {
            let trees = read_trees(&tree_file)?;
            let tree = iqtree::consensus_tree(&engine()?, &trees, min_support)?;
            write_tree(&tree, output)?;
        }
        Commands::Simulate {
            tree_file,
            model,
            length,
            seed,
            insertion_rate,
            deletion_rate,
            insertion_size,
            deletion_size,
            root_seq,
            threads,
            output,
        } => {
            let tree: Tree = fs::read_to_string(&tree_file)?.parse()?;
            let options = SimulateOptions {
                length,
                seed,
                insertion_rate,
                deletion_rate,
                insertion_size_distribution: insertion_size,
                deletion_size_distribution: deletion_size,
                root_seq,
                num_threads: threads,
            };
            let aln = iqtree::simulate_alignment(&engine()?, &tree, &model, &options)?;
            match output {
                Some(path) => {
                    info!("Putting simulated alignment in {}", path.display());
                    aln.write_fasta(&path)?;
                }
                None => print!("{}", aln.to_fasta_string()?),
            }
        }
    }
    Ok(())
}

fn read_trees(path: &Path) -> Result<Vec<Tree>> {
    info!("Reading trees from {}.", path.display());
    from_newick_string(&fs::read_to_string(path)?)
}

fn write_tree(tree: &Tree, output: Option<PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            info!("Putting resulting tree in {}", path.display());
            fs::write(path, format!("{}\n", tree))?;
        }
        None => println!("{}", tree),
    }
    Ok(())
}

fn report_fitted_tree(fitted: &FittedTree, output: Option<PathBuf>) -> Result<()> {
    info!("Final log likelihood: {}", fitted.lnl);
    debug!("Model fit: {:?}", fitted.model_fit);
    if let Some((name, params)) = &fitted.rate_params {
        debug!("{}: {:?}", name, params);
    }
    write_tree(&fitted.tree, output)
}
