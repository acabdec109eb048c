//! C ABI of the IQ-TREE library.
//!
//! Arrays are passed by pointer to a descriptor, text as NUL-terminated
//! strings. Every entry point returns one of three envelopes whose heap
//! pointers belong to the caller and must be handed back to `free_string` or
//! `free_double_array` exactly once.
use std::os::raw::{c_char, c_double, c_int};

mod views;

pub use views::{c_text, DoubleArrayView, StringArrayView};

#[repr(C)]
#[derive(Debug)]
pub struct StringArray {
    pub length: usize,
    pub strings: *const *const c_char,
}

#[repr(C)]
#[derive(Debug)]
pub struct DoubleArray {
    pub length: usize,
    pub doubles: *const c_double,
}

#[repr(C)]
#[derive(Debug)]
pub struct StringResult {
    pub value: *mut c_char,
    pub error: *mut c_char,
}

#[repr(C)]
#[derive(Debug)]
pub struct IntegerResult {
    pub value: c_int,
    pub error: *mut c_char,
}

#[repr(C)]
#[derive(Debug)]
pub struct DoubleArrayResult {
    pub value: *mut c_double,
    pub length: usize,
    pub error: *mut c_char,
}

pub type VersionFn = unsafe extern "C" fn() -> StringResult;

pub type RobinsonFouldFn =
    unsafe extern "C" fn(tree1: *const c_char, tree2: *const c_char) -> IntegerResult;

pub type RandomTreeFn = unsafe extern "C" fn(
    num_taxa: c_int,
    tree_gen_mode: *const c_char,
    num_trees: c_int,
    rand_seed: c_int,
) -> StringResult;

pub type BuildTreeFn = unsafe extern "C" fn(
    names: *const StringArray,
    seqs: *const StringArray,
    model: *const c_char,
    rand_seed: c_int,
    bootstrap_replicates: c_int,
    num_threads: c_int,
) -> StringResult;

pub type FitTreeFn = unsafe extern "C" fn(
    names: *const StringArray,
    seqs: *const StringArray,
    model: *const c_char,
    intree: *const c_char,
    bl_fixed: c_int,
    rand_seed: c_int,
    num_threads: c_int,
) -> StringResult;

pub type ModelFinderFn = unsafe extern "C" fn(
    names: *const StringArray,
    seqs: *const StringArray,
    rand_seed: c_int,
    model_set: *const c_char,
    freq_set: *const c_char,
    rate_set: *const c_char,
    num_threads: c_int,
) -> StringResult;

pub type BuildDistMatrixFn = unsafe extern "C" fn(
    names: *const StringArray,
    seqs: *const StringArray,
    num_threads: c_int,
) -> DoubleArrayResult;

pub type BuildNjTreeFn =
    unsafe extern "C" fn(names: *const StringArray, distances: *const DoubleArray) -> StringResult;

pub type ConsensusTreeFn =
    unsafe extern "C" fn(trees: *const StringArray, min_support: c_double) -> StringResult;

pub type SimulateAlignmentFn = unsafe extern "C" fn(
    trees: *const StringArray,
    subst_model: *const c_char,
    rand_seed: c_int,
    partition_info: *const c_char,
    partition_type: *const c_char,
    seq_length: c_int,
    insertion_rate: c_double,
    deletion_rate: c_double,
    root_seq: *const c_char,
    num_threads: c_int,
    insertion_size_distribution: *const c_char,
    deletion_size_distribution: *const c_char,
) -> StringResult;

pub type FreeStringFn = unsafe extern "C" fn(ptr: *mut c_char);

pub type FreeDoubleArrayFn = unsafe extern "C" fn(ptr: *mut c_double);

/// Function table of one loaded engine.
#[derive(Clone, Copy)]
pub struct EngineApi {
    pub version: VersionFn,
    pub robinson_fould: RobinsonFouldFn,
    pub random_tree: RandomTreeFn,
    pub build_tree: BuildTreeFn,
    pub fit_tree: FitTreeFn,
    pub modelfinder: ModelFinderFn,
    pub build_distmatrix: BuildDistMatrixFn,
    pub build_njtree: BuildNjTreeFn,
    pub consensus_tree: ConsensusTreeFn,
    pub simulate_alignment: SimulateAlignmentFn,
    pub free_string: FreeStringFn,
    pub free_double_array: FreeDoubleArrayFn,
}

/// The pair of release functions an envelope needs to drop its buffers.
#[derive(Clone, Copy)]
pub struct Releasers {
    pub free_string: FreeStringFn,
    pub free_double_array: FreeDoubleArrayFn,
}

impl EngineApi {
    pub fn releasers(&self) -> Releasers {
        Releasers {
            free_string: self.free_string,
            free_double_array: self.free_double_array,
        }
    }
}
