//! An in-process engine implementing the C ABI for tests.
//!
//! Every buffer handed out is recorded in a per-thread ledger so tests can
//! check that each one comes back exactly once.
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::env;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_double, c_int};
use std::ptr::{null_mut, slice_from_raw_parts_mut};
use std::slice;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use hashbrown::{HashMap, HashSet};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::engine::Engine;
use crate::ffi::{
    DoubleArray, DoubleArrayResult, EngineApi, IntegerResult, Releasers, StringArray,
    StringResult,
};
use crate::tree::Tree;

pub(crate) const TEST_VERSION: &str = "2.3.6.lib";

#[derive(Default)]
pub(crate) struct Ledger {
    live: HashSet<usize>,
    array_lengths: HashMap<usize, usize>,
    pub(crate) allocated: usize,
    pub(crate) released: usize,
    pub(crate) unknown_releases: usize,
    pub(crate) calls: usize,
}

impl Ledger {
    pub(crate) fn live(&self) -> usize {
        self.live.len()
    }
}

thread_local! {
    static LEDGER: RefCell<Ledger> = RefCell::new(Ledger::default());
}

pub(crate) fn reset_ledger() {
    LEDGER.with(|ledger| *ledger.borrow_mut() = Ledger::default());
}

pub(crate) fn ledger<T>(f: impl FnOnce(&Ledger) -> T) -> T {
    LEDGER.with(|ledger| f(&ledger.borrow()))
}

/// Asserts that every buffer handed out on this thread came back exactly once.
pub(crate) fn assert_balanced() {
    ledger(|l| {
        assert_eq!(l.live(), 0, "engine buffers still live");
        assert_eq!(l.allocated, l.released);
        assert_eq!(l.unknown_releases, 0, "released unknown or freed buffer");
    });
}

fn count_call() {
    LEDGER.with(|ledger| ledger.borrow_mut().calls += 1);
}

pub(crate) fn alloc_string(text: &str) -> *mut c_char {
    let ptr = CString::new(text).unwrap().into_raw();
    LEDGER.with(|ledger| {
        let mut ledger = ledger.borrow_mut();
        ledger.allocated += 1;
        ledger.live.insert(ptr as usize);
    });
    ptr
}

pub(crate) fn alloc_doubles(values: Vec<f64>) -> (*mut f64, usize) {
    let len = values.len();
    if len == 0 {
        return (null_mut(), 0);
    }
    let ptr = Box::into_raw(values.into_boxed_slice()) as *mut f64;
    LEDGER.with(|ledger| {
        let mut ledger = ledger.borrow_mut();
        ledger.allocated += 1;
        ledger.live.insert(ptr as usize);
        ledger.array_lengths.insert(ptr as usize, len);
    });
    (ptr, len)
}

fn take_live(ptr: usize) -> bool {
    LEDGER.with(|ledger| {
        let mut ledger = ledger.borrow_mut();
        if ledger.live.remove(&ptr) {
            ledger.released += 1;
            true
        } else {
            ledger.unknown_releases += 1;
            false
        }
    })
}

pub(crate) unsafe extern "C" fn free_string(ptr: *mut c_char) {
    if !ptr.is_null() && take_live(ptr as usize) {
        drop(CString::from_raw(ptr));
    }
}

pub(crate) unsafe extern "C" fn free_double_array(ptr: *mut c_double) {
    if ptr.is_null() || !take_live(ptr as usize) {
        return;
    }
    let len = LEDGER.with(|ledger| ledger.borrow_mut().array_lengths.remove(&(ptr as usize)));
    if let Some(len) = len {
        drop(Box::from_raw(slice_from_raw_parts_mut(ptr, len)));
    }
}

pub(crate) fn releasers() -> Releasers {
    Releasers {
        free_string,
        free_double_array,
    }
}

pub(crate) fn string_ok(text: &str) -> StringResult {
    StringResult {
        value: alloc_string(text),
        error: null_mut(),
    }
}

pub(crate) fn string_err(message: &str) -> StringResult {
    StringResult {
        value: null_mut(),
        error: alloc_string(message),
    }
}

fn integer_ok(value: c_int) -> IntegerResult {
    IntegerResult {
        value,
        error: null_mut(),
    }
}

fn integer_err(message: &str) -> IntegerResult {
    IntegerResult {
        value: 0,
        error: alloc_string(message),
    }
}

unsafe fn read_text(ptr: *const c_char) -> String {
    CStr::from_ptr(ptr).to_string_lossy().into_owned()
}

unsafe fn read_strings(array: *const StringArray) -> Vec<String> {
    let array = &*array;
    slice::from_raw_parts(array.strings, array.length)
        .iter()
        .map(|&s| read_text(s))
        .collect()
}

unsafe fn read_doubles(array: *const DoubleArray) -> Vec<f64> {
    let array = &*array;
    slice::from_raw_parts(array.doubles, array.length).to_vec()
}

fn caterpillar<S: AsRef<str>>(labels: &[S], blen: f64) -> String {
    fn nest<S: AsRef<str>>(labels: &[S], blen: f64) -> String {
        match labels {
            [only] => format!("{}:{}", only.as_ref(), blen),
            [first, rest @ ..] => format!("({}:{},{}):{}", first.as_ref(), blen, nest(rest, blen), blen),
            [] => String::new(),
        }
    }
    match labels {
        [a, b, rest @ ..] if !rest.is_empty() => format!(
            "({}:{},{}:{},{});",
            a.as_ref(),
            blen,
            b.as_ref(),
            blen,
            nest(rest, blen)
        ),
        _ => format!("({});", nest(labels, blen)),
    }
}

fn check_model(model: &str) -> Result<(), String> {
    for component in model.split('+').skip(1) {
        if let Some(rest) = component.strip_prefix(['G', 'R']) {
            let digits = rest.split('{').next().unwrap_or_default();
            if !digits.is_empty() && digits.parse::<i32>().map_or(true, |k| k <= 0) {
                return Err(format!(
                    "Wrong number of rate categories for model component {}",
                    component
                ));
            }
        }
    }
    Ok(())
}

fn check_alignment(names: &[String], seqs: &[String]) -> Result<(), String> {
    if names.len() != seqs.len() {
        return Err(format!(
            "Number of names ({}) does not match number of sequences ({})",
            names.len(),
            seqs.len()
        ));
    }
    if names.len() < 3 {
        return Err("The alignment must contain at least 3 sequences".to_string());
    }
    Ok(())
}

fn model_section(model: &str) -> String {
    let submodel = model.split('+').next().unwrap_or_default();
    let bare = submodel
        .strip_prefix("RY")
        .or_else(|| submodel.strip_prefix("WS"))
        .or_else(|| submodel.strip_prefix("MK"))
        .unwrap_or(submodel);
    let base = bare.split('{').next().unwrap_or_default();
    if base.starts_with(|c: char| c.is_ascii_digit()) {
        let parameters = if base == "1.1" {
            String::new()
        } else {
            "  model_parameters: \"0.3, 0.2\"\n".to_string()
        };
        format!(
            "ModelLieMarkov{}:\n  state_freq: \"0.25, 0.25, 0.25, 0.25\"\n{}",
            submodel, parameters
        )
    } else if base == "UNREST" {
        "ModelUnrest:\n  state_freq: \"0.2, 0.3, 0.3, 0.2\"\n  rates: \"1.1, 2.1, 0.5, 0.9, 1.2, 2.2, 1.9, 0.6, 1.0, 0.4, 2.3, 1.3\"\n".to_string()
    } else {
        "ModelDNA:\n  rates: \"1.5, 4.25, 0.75, 1.25, 3.5, 1\"\n  state_freq: \"0.3, 0.2, 0.2, 0.3\"\n".to_string()
    }
}

fn tree_report(newick: &str, model: &str) -> String {
    let mut report = format!(
        "PhyloTree:\n  newick: \"{newick}\"\nCandidateSet:\n  0: \"-1520.25 (0:0.5,1:0.5,2:0.5);\"\n  1: \"-1234.5 {newick}\"\n",
    );
    report.push_str(&model_section(model));
    if model.contains("+G") {
        report.push_str("RateGamma:\n  categories: 4\n  shape: 0.75\n");
    }
    report
}

unsafe extern "C" fn version() -> StringResult {
    count_call();
    string_ok(TEST_VERSION)
}

static GUARD_IN_CALL: AtomicBool = AtomicBool::new(false);
pub(crate) static GUARD_OVERLAPS: AtomicUsize = AtomicUsize::new(0);
pub(crate) static CWD_SHIFTS: AtomicUsize = AtomicUsize::new(0);

/// Runs `body` as engine-global work, counting every other call that enters
/// while it is in progress.
fn engine_global_section<T>(body: impl FnOnce() -> T) -> T {
    if GUARD_IN_CALL.swap(true, Ordering::SeqCst) {
        GUARD_OVERLAPS.fetch_add(1, Ordering::SeqCst);
    }
    thread::sleep(Duration::from_millis(1));
    let result = body();
    GUARD_IN_CALL.store(false, Ordering::SeqCst);
    result
}

/// Version query that notices when two calls overlap.
pub(crate) unsafe extern "C" fn guarded_version() -> StringResult {
    engine_global_section(|| string_ok(TEST_VERSION))
}

/// Consensus that notices the working directory changing while it runs.
pub(crate) unsafe extern "C" fn cwd_checking_consensus_tree(
    trees: *const StringArray,
    min_support: c_double,
) -> StringResult {
    engine_global_section(|| {
        let entered = env::current_dir().ok();
        thread::sleep(Duration::from_millis(1));
        if env::current_dir().ok() != entered {
            CWD_SHIFTS.fetch_add(1, Ordering::SeqCst);
        }
        consensus_tree(trees, min_support)
    })
}

/// Device and inode behind a file descriptor.
#[cfg(unix)]
pub(crate) fn fd_identity(fd: c_int) -> (u64, u64) {
    let mut stat: libc::stat = unsafe { std::mem::zeroed() };
    assert_eq!(unsafe { libc::fstat(fd, &mut stat) }, 0);
    (stat.st_dev as u64, stat.st_ino as u64)
}

/// Fails with a message telling whether stdout and stderr pointed at the
/// null device during the call.
#[cfg(unix)]
pub(crate) unsafe extern "C" fn console_reporting_version() -> StringResult {
    count_call();
    let null = std::fs::File::open("/dev/null").unwrap();
    let null = fd_identity(std::os::fd::AsRawFd::as_raw_fd(&null));
    let silenced = fd_identity(libc::STDOUT_FILENO) == null
        && fd_identity(libc::STDERR_FILENO) == null;
    string_err(if silenced {
        "Console silenced"
    } else {
        "Console visible"
    })
}

unsafe extern "C" fn robinson_fould(tree1: *const c_char, tree2: *const c_char) -> IntegerResult {
    count_call();
    let (tree1, tree2) = (read_text(tree1), read_text(tree2));
    if !tree1.trim_end().ends_with(';') || !tree2.trim_end().ends_with(';') {
        return integer_err("Tree is not in Newick format: missing ';'");
    }
    integer_ok(if tree1 == tree2 { 0 } else { 2 })
}

unsafe extern "C" fn random_tree(
    num_taxa: c_int,
    tree_gen_mode: *const c_char,
    num_trees: c_int,
    rand_seed: c_int,
) -> StringResult {
    count_call();
    let mode = read_text(tree_gen_mode);
    if !matches!(
        mode.as_str(),
        "YULE_HARDING" | "UNIFORM" | "CATERPILLAR" | "BALANCED" | "BIRTH_DEATH" | "STAR_TREE"
    ) {
        return string_err(&format!("Unknown tree generation mode: {}", mode));
    }
    if num_taxa < 3 {
        return string_err("Number of taxa must be at least 3");
    }
    let labels: Vec<String> = (1..=num_taxa).map(|i| format!("T{}", i)).collect();
    let trees: Vec<String> = (0..num_trees)
        .map(|i| caterpillar(&labels, 0.1 * f64::from(1 + (rand_seed + i).rem_euclid(5))))
        .collect();
    string_ok(&(trees.join("\n") + "\n"))
}

unsafe extern "C" fn build_tree(
    names: *const StringArray,
    seqs: *const StringArray,
    model: *const c_char,
    _rand_seed: c_int,
    _bootstrap_replicates: c_int,
    _num_threads: c_int,
) -> StringResult {
    count_call();
    let (names, seqs, model) = (read_strings(names), read_strings(seqs), read_text(model));
    if let Err(e) = check_alignment(&names, &seqs).and_then(|_| check_model(&model)) {
        return string_err(&e);
    }
    let labels: Vec<String> = (0..names.len()).map(|i| i.to_string()).collect();
    string_ok(&tree_report(&caterpillar(&labels, 0.125), &model))
}

unsafe extern "C" fn fit_tree(
    names: *const StringArray,
    seqs: *const StringArray,
    model: *const c_char,
    intree: *const c_char,
    bl_fixed: c_int,
    _rand_seed: c_int,
    _num_threads: c_int,
) -> StringResult {
    count_call();
    let (names, seqs, model) = (read_strings(names), read_strings(seqs), read_text(model));
    if let Err(e) = check_alignment(&names, &seqs).and_then(|_| check_model(&model)) {
        return string_err(&e);
    }
    let mut tree = match read_text(intree).parse::<Tree>() {
        Ok(tree) => tree,
        Err(e) => return string_err(&format!("Could not read input tree: {}", e)),
    };
    let renamed = tree.map_leaf_ids(|id| match names.iter().position(|n| n == id) {
        Some(i) => Ok(i.to_string()),
        None => anyhow::bail!("Taxon {} is not in the alignment", id),
    });
    if let Err(e) = renamed {
        return string_err(&e.to_string());
    }
    if bl_fixed == 0 {
        tree.set_branch_lengths(0.25);
    }
    string_ok(&tree_report(&tree.to_newick(), &model))
}

unsafe extern "C" fn modelfinder(
    names: *const StringArray,
    seqs: *const StringArray,
    _rand_seed: c_int,
    _model_set: *const c_char,
    _freq_set: *const c_char,
    _rate_set: *const c_char,
    _num_threads: c_int,
) -> StringResult {
    count_call();
    if let Err(e) = check_alignment(&read_strings(names), &read_strings(seqs)) {
        return string_err(&e);
    }
    string_ok(concat!(
        "best_model_AIC: GTR+F+I+G4\n",
        "best_model_AICc: GTR+F+I+G4\n",
        "best_model_BIC: HKY+F+G4\n",
        "initTree: \"(0:0.1,1:0.1,2:0.1);\"\n",
        "JC: \"-2345.5 5 0.71\"\n",
        "HKY+F+G4: \"-2200.25 10 0.93\"\n",
        "GTR+F+I+G4: \"-2190.75 15 0.95\"\n",
    ))
}

unsafe extern "C" fn build_distmatrix(
    names: *const StringArray,
    seqs: *const StringArray,
    _num_threads: c_int,
) -> DoubleArrayResult {
    count_call();
    let (names, seqs) = (read_strings(names), read_strings(seqs));
    if names.len() != seqs.len() {
        return DoubleArrayResult {
            value: null_mut(),
            length: 0,
            error: alloc_string("Number of names does not match number of sequences"),
        };
    }
    let mut distances = Vec::with_capacity(seqs.len() * seqs.len());
    for a in &seqs {
        for b in &seqs {
            let differences = a.bytes().zip(b.bytes()).filter(|(x, y)| x != y).count();
            distances.push(differences as f64 / a.len().max(1) as f64);
        }
    }
    let (value, length) = alloc_doubles(distances);
    DoubleArrayResult {
        value,
        length,
        error: null_mut(),
    }
}

unsafe extern "C" fn build_njtree(
    names: *const StringArray,
    distances: *const DoubleArray,
) -> StringResult {
    count_call();
    let (names, distances) = (read_strings(names), read_doubles(distances));
    let n = names.len();
    if n < 3 || distances.len() != n * n {
        return string_err("Distance matrix does not match the number of taxa");
    }
    if let Some(pos) = distances.iter().position(|d| !d.is_finite()) {
        return string_err(&format!(
            "Distance matrix contains invalid value {} at row {} column {}",
            distances[pos],
            pos / n,
            pos % n
        ));
    }
    let tips: Vec<String> = (0..n)
        .map(|i| format!("{}:{}", names[i], distances[i * n + (i + 1) % n] / 2.0 - 0.05))
        .collect();
    string_ok(&format!("({});", tips.join(",")))
}

unsafe extern "C" fn consensus_tree(trees: *const StringArray, min_support: c_double) -> StringResult {
    count_call();
    if !(0.0..=1.0).contains(&min_support) {
        return string_err(&format!("Invalid minimum support {}", min_support));
    }
    match read_strings(trees).first() {
        Some(tree) => string_ok(tree),
        None => string_err("No input trees"),
    }
}

unsafe extern "C" fn simulate_alignment(
    trees: *const StringArray,
    subst_model: *const c_char,
    rand_seed: c_int,
    _partition_info: *const c_char,
    _partition_type: *const c_char,
    seq_length: c_int,
    _insertion_rate: c_double,
    _deletion_rate: c_double,
    root_seq: *const c_char,
    _num_threads: c_int,
    _insertion_size_distribution: *const c_char,
    _deletion_size_distribution: *const c_char,
) -> StringResult {
    count_call();
    let model = read_text(subst_model);
    if let Err(e) = check_model(&model) {
        return string_err(&e);
    }
    if seq_length <= 0 {
        return string_err("Sequence length must be positive");
    }
    let tree = match read_strings(trees).first().map(|t| t.parse::<Tree>()) {
        Some(Ok(tree)) => tree,
        _ => return string_err("Could not read input tree"),
    };
    let root_seq = read_text(root_seq);
    let mut rng = StdRng::seed_from_u64(rand_seed as u64);
    let mut fasta = String::new();
    for name in tree.leaf_ids() {
        let seq: String = if root_seq.is_empty() {
            (0..seq_length)
                .map(|_| ['A', 'C', 'G', 'T'][rng.gen_range(0..4)])
                .collect()
        } else {
            root_seq.clone()
        };
        fasta.push_str(&format!(">{}\n{}\n", name, seq));
    }
    let report = BTreeMap::from([("alignment", fasta)]);
    string_ok(&serde_yaml::to_string(&report).unwrap())
}

pub(crate) fn test_api() -> EngineApi {
    EngineApi {
        version,
        robinson_fould,
        random_tree,
        build_tree,
        fit_tree,
        modelfinder,
        build_distmatrix,
        build_njtree,
        consensus_tree,
        simulate_alignment,
        free_string,
        free_double_array,
    }
}

/// Engine backed by the in-process test functions, without scratch
/// directories or output redirection.
pub(crate) fn test_engine() -> Engine {
    // safety: every function in the table implements the engine ABI
    unsafe { Engine::from_api(test_api()) }
        .with_scratch_dirs(false)
        .with_silenced_output(false)
}
