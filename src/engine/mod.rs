//! The boundary adapter around one loaded engine.
//!
//! Every typed entry point builds its input views first, then takes the
//! process-wide engine lock, invokes the engine and converts the returned
//! envelope before the lock is released. Engines share the lock because they
//! share the working directory, the output streams and, for one library path,
//! the engine's globals.
use std::os::raw::c_int;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use anyhow::bail;
use lazy_static::lazy_static;
use log::{debug, info, warn};

use crate::envelope::{Envelope, Payload};
use crate::errors::ValidationError;
use crate::ffi::{c_text, DoubleArrayView, EngineApi, Releasers, StringArrayView};
use crate::Result;

mod config;
mod loader;
mod scratch;
mod silence;

pub use config::{EngineConfig, DEFAULT_LIBRARY_NAME, ENGINE_ENV_VAR};
use loader::NativeLibrary;
use scratch::ScratchDir;
use silence::SilencedOutput;

/// Arguments of an alignment simulation call, in engine order.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulateArgs<'a> {
    pub trees: &'a [String],
    pub model: &'a str,
    pub seed: i32,
    pub partition_info: &'a str,
    pub partition_type: &'a str,
    pub length: i32,
    pub insertion_rate: f64,
    pub deletion_rate: f64,
    pub root_seq: &'a str,
    pub num_threads: i32,
    pub insertion_size_distribution: &'a str,
    pub deletion_size_distribution: &'a str,
}

lazy_static! {
    static ref GLOBAL_ENGINE: RwLock<Option<Arc<Engine>>> = RwLock::new(None);
    static ref ENGINE_CALLS: Mutex<()> = Mutex::new(());
}

/// Exclusive use of the engine's process-wide state. Held for every engine
/// call, whichever `Engine` makes it.
pub(crate) fn exclusive_engine_use() -> MutexGuard<'static, ()> {
    ENGINE_CALLS.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A loaded engine and how its calls are run.
pub struct Engine {
    api: EngineApi,
    library: Option<NativeLibrary>,
    scratch_dirs: bool,
    silence_output: bool,
}

impl Engine {
    /// Loads the engine library named by the configuration and resolves all
    /// of its entry points.
    pub fn load(config: &EngineConfig) -> Result<Self> {
        let library = NativeLibrary::load(&config.resolve_library())?;
        let api = library.resolve_api()?;
        info!("Engine loaded from {}", library.path().display());
        Ok(Self {
            api,
            library: Some(library),
            scratch_dirs: config.scratch_dirs,
            silence_output: config.silence_output,
        })
    }

    /// Wraps a function table that is already linked into the process.
    ///
    /// # Safety
    /// Every function in `api` must implement the engine ABI and stay valid
    /// for the lifetime of the returned engine.
    pub unsafe fn from_api(api: EngineApi) -> Self {
        let config = EngineConfig::default();
        Self {
            api,
            library: None,
            scratch_dirs: config.scratch_dirs,
            silence_output: config.silence_output,
        }
    }

    pub fn with_scratch_dirs(mut self, enabled: bool) -> Self {
        self.scratch_dirs = enabled;
        self
    }

    pub fn with_silenced_output(mut self, enabled: bool) -> Self {
        self.silence_output = enabled;
        self
    }

    pub fn library_path(&self) -> Option<&Path> {
        self.library.as_ref().map(NativeLibrary::path)
    }

    fn call<P: Payload>(
        &self,
        name: &'static str,
        writes_files: bool,
        invoke: impl FnOnce(&EngineApi, Releasers) -> Envelope<P>,
    ) -> Result<P::Host> {
        let _exclusive = exclusive_engine_use();
        debug!("Calling engine entry point {}", name);
        let envelope = {
            let _scratch = if writes_files && self.scratch_dirs {
                Some(ScratchDir::enter(name)?)
            } else {
                None
            };
            let _silenced = if self.silence_output {
                Some(SilencedOutput::enter()?)
            } else {
                None
            };
            invoke(&self.api, self.api.releasers())
        };
        if envelope.is_error() {
            warn!("Engine entry point {} reported an error", name);
        }
        envelope.into_host()
    }

    pub fn version(&self) -> Result<String> {
        self.call("version", false, |api, releasers| unsafe {
            (api.version)().into_envelope(releasers)
        })
    }

    /// Robinson-Foulds distance between two Newick trees.
    pub fn robinson_fould(&self, tree1: &str, tree2: &str) -> Result<i32> {
        let tree1 = c_text("tree1", tree1)?;
        let tree2 = c_text("tree2", tree2)?;
        self.call("robinson_fould", false, |api, releasers| unsafe {
            (api.robinson_fould)(tree1.as_ptr(), tree2.as_ptr()).into_envelope(releasers)
        })
    }

    /// Newick trees separated by newlines.
    pub fn random_tree(
        &self,
        num_taxa: i32,
        tree_gen_mode: &str,
        num_trees: i32,
        seed: i32,
    ) -> Result<String> {
        let mode = c_text("tree_gen_mode", tree_gen_mode)?;
        self.call("random_tree", false, |api, releasers| unsafe {
            (api.random_tree)(num_taxa, mode.as_ptr(), num_trees, seed).into_envelope(releasers)
        })
    }

    /// Tree search with topology estimation. Returns the engine's YAML report.
    pub fn build_tree<S: AsRef<str>>(
        &self,
        names: &[S],
        seqs: &[S],
        model: &str,
        seed: i32,
        bootstrap_replicates: i32,
        num_threads: i32,
    ) -> Result<String> {
        let names = StringArrayView::new("names", names)?;
        let seqs = StringArrayView::new("seqs", seqs)?;
        let model = c_text("model", model)?;
        self.call("build_tree", true, |api, releasers| unsafe {
            (api.build_tree)(
                names.as_ptr(),
                seqs.as_ptr(),
                model.as_ptr(),
                seed,
                bootstrap_replicates,
                num_threads,
            )
            .into_envelope(releasers)
        })
    }

    /// Branch length fitting on a fixed topology. Returns the engine's YAML
    /// report.
    #[allow(clippy::too_many_arguments)]
    pub fn fit_tree<S: AsRef<str>>(
        &self,
        names: &[S],
        seqs: &[S],
        model: &str,
        newick: &str,
        bl_fixed: bool,
        seed: i32,
        num_threads: i32,
    ) -> Result<String> {
        let names = StringArrayView::new("names", names)?;
        let seqs = StringArrayView::new("seqs", seqs)?;
        let model = c_text("model", model)?;
        let newick = c_text("newick", newick)?;
        self.call("fit_tree", true, |api, releasers| unsafe {
            (api.fit_tree)(
                names.as_ptr(),
                seqs.as_ptr(),
                model.as_ptr(),
                newick.as_ptr(),
                c_int::from(bl_fixed),
                seed,
                num_threads,
            )
            .into_envelope(releasers)
        })
    }

    /// Best-model search. Sets are comma separated, empty for the engine's
    /// default search space.
    #[allow(clippy::too_many_arguments)]
    pub fn model_finder<S: AsRef<str>>(
        &self,
        names: &[S],
        seqs: &[S],
        seed: i32,
        model_set: &str,
        freq_set: &str,
        rate_set: &str,
        num_threads: i32,
    ) -> Result<String> {
        let names = StringArrayView::new("names", names)?;
        let seqs = StringArrayView::new("seqs", seqs)?;
        let model_set = c_text("model_set", model_set)?;
        let freq_set = c_text("freq_set", freq_set)?;
        let rate_set = c_text("rate_set", rate_set)?;
        self.call("modelfinder", true, |api, releasers| unsafe {
            (api.modelfinder)(
                names.as_ptr(),
                seqs.as_ptr(),
                seed,
                model_set.as_ptr(),
                freq_set.as_ptr(),
                rate_set.as_ptr(),
                num_threads,
            )
            .into_envelope(releasers)
        })
    }

    /// Pairwise JC distances, row-major `n x n`.
    pub fn jc_distances<S: AsRef<str>>(
        &self,
        names: &[S],
        seqs: &[S],
        num_threads: i32,
    ) -> Result<Vec<f64>> {
        let names = StringArrayView::new("names", names)?;
        let seqs = StringArrayView::new("seqs", seqs)?;
        self.call("build_distmatrix", true, |api, releasers| unsafe {
            (api.build_distmatrix)(names.as_ptr(), seqs.as_ptr(), num_threads)
                .into_envelope(releasers)
        })
    }

    /// Neighbour-joining tree from a flattened distance matrix. Values are
    /// passed through unchecked, the engine reports invalid entries.
    pub fn nj_tree<S: AsRef<str>>(&self, names: &[S], distances: &[f64]) -> Result<String> {
        if distances.len() != names.len() * names.len() {
            bail!(ValidationError::new(format!(
                "Expected {} distances for {} names, got {}",
                names.len() * names.len(),
                names.len(),
                distances.len()
            )));
        }
        let names = StringArrayView::new("names", names)?;
        let distances = DoubleArrayView::new(distances);
        self.call("build_njtree", true, |api, releasers| unsafe {
            (api.build_njtree)(names.as_ptr(), distances.as_ptr()).into_envelope(releasers)
        })
    }

    pub fn consensus_tree<S: AsRef<str>>(&self, trees: &[S], min_support: f64) -> Result<String> {
        let trees = StringArrayView::new("trees", trees)?;
        self.call("consensus_tree", true, |api, releasers| unsafe {
            (api.consensus_tree)(trees.as_ptr(), min_support).into_envelope(releasers)
        })
    }

    /// Alignment simulation. Returns the engine's YAML report.
    pub fn simulate_alignment(&self, args: &SimulateArgs) -> Result<String> {
        let trees = StringArrayView::new("trees", args.trees)?;
        let model = c_text("model", args.model)?;
        let partition_info = c_text("partition_info", args.partition_info)?;
        let partition_type = c_text("partition_type", args.partition_type)?;
        let root_seq = c_text("root_seq", args.root_seq)?;
        let insertion = c_text(
            "insertion_size_distribution",
            args.insertion_size_distribution,
        )?;
        let deletion = c_text(
            "deletion_size_distribution",
            args.deletion_size_distribution,
        )?;
        self.call("simulate_alignment", true, |api, releasers| unsafe {
            (api.simulate_alignment)(
                trees.as_ptr(),
                model.as_ptr(),
                args.seed,
                partition_info.as_ptr(),
                partition_type.as_ptr(),
                args.length,
                args.insertion_rate,
                args.deletion_rate,
                root_seq.as_ptr(),
                args.num_threads,
                insertion.as_ptr(),
                deletion.as_ptr(),
            )
            .into_envelope(releasers)
        })
    }
}

/// Installs the process-wide engine. Fails if one is already installed.
pub fn install(engine: Engine) -> Result<Arc<Engine>> {
    let mut global = GLOBAL_ENGINE
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    if global.is_some() {
        bail!(ValidationError::new("An engine is already installed"));
    }
    let engine = Arc::new(engine);
    *global = Some(Arc::clone(&engine));
    Ok(engine)
}

/// The process-wide engine, loaded with the default configuration on first
/// use.
pub fn global() -> Result<Arc<Engine>> {
    if let Some(engine) = GLOBAL_ENGINE
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
    {
        return Ok(Arc::clone(engine));
    }
    let mut global = GLOBAL_ENGINE
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    match global.as_ref() {
        Some(engine) => Ok(Arc::clone(engine)),
        None => {
            let engine = Arc::new(Engine::load(&EngineConfig::default())?);
            *global = Some(Arc::clone(&engine));
            Ok(engine)
        }
    }
}

#[cfg(test)]
pub(crate) mod test_engine;
