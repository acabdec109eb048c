//! Dynamic access to the engine by entry-point name.
//!
//! Arguments arrive as [`HostValue`]s and are converted with one typed
//! conversion per declared kind before anything reaches the engine.
use std::fmt;
use std::os::raw::c_int;
use std::str::FromStr;

use anyhow::bail;
use log::debug;

use crate::engine::{Engine, SimulateArgs};
use crate::errors::ValidationError;
use crate::Result;

/// A value handed over by a host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<HostValue>),
    /// Numeric array with its shape, data in row-major order.
    Array { shape: Vec<usize>, data: Vec<f64> },
}

impl HostValue {
    pub fn kind(&self) -> &'static str {
        match self {
            HostValue::None => "none",
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::Float(_) => "float",
            HostValue::Text(_) => "text",
            HostValue::List(_) => "list",
            HostValue::Array { .. } => "array",
        }
    }

    pub fn as_text(&self, arg: &str) -> Result<&str> {
        match self {
            HostValue::Text(text) => Ok(text),
            other => bail!(mismatch(arg, "text", other)),
        }
    }

    /// Every element must be text.
    pub fn as_text_seq(&self, arg: &str) -> Result<Vec<&str>> {
        let HostValue::List(items) = self else {
            bail!(mismatch(arg, "sequence of text", self));
        };
        items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                HostValue::Text(text) => Ok(text.as_str()),
                other => bail!(ValidationError::new(format!(
                    "Element {} of argument '{}' must be text, got {}",
                    i,
                    arg,
                    other.kind()
                ))),
            })
            .collect()
    }

    pub fn as_int(&self, arg: &str) -> Result<i64> {
        match self {
            HostValue::Int(value) => Ok(*value),
            other => bail!(mismatch(arg, "int", other)),
        }
    }

    /// Integers are accepted and widened.
    pub fn as_float(&self, arg: &str) -> Result<f64> {
        match self {
            HostValue::Float(value) => Ok(*value),
            HostValue::Int(value) => Ok(*value as f64),
            other => bail!(mismatch(arg, "float", other)),
        }
    }

    pub fn as_bool(&self, arg: &str) -> Result<bool> {
        match self {
            HostValue::Bool(value) => Ok(*value),
            other => bail!(mismatch(arg, "bool", other)),
        }
    }

    /// One-dimensional numeric data, from a rank 1 array or a list of numbers.
    pub fn as_float_vec(&self, arg: &str) -> Result<Vec<f64>> {
        match self {
            HostValue::Array { shape, data } => {
                if shape.len() != 1 {
                    bail!(ValidationError::new(format!(
                        "Argument '{}' must be a one-dimensional array, got rank {}",
                        arg,
                        shape.len()
                    )));
                }
                if shape[0] != data.len() {
                    bail!(ValidationError::new(format!(
                        "Argument '{}' has shape [{}] but holds {} values",
                        arg,
                        shape[0],
                        data.len()
                    )));
                }
                Ok(data.clone())
            }
            HostValue::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    item.as_float(arg).map_err(|_| {
                        anyhow::Error::from(ValidationError::new(format!(
                            "Element {} of argument '{}' must be a number, got {}",
                            i,
                            arg,
                            item.kind()
                        )))
                    })
                })
                .collect(),
            other => bail!(mismatch(arg, "numeric array", other)),
        }
    }
}

fn mismatch(arg: &str, expected: &str, got: &HostValue) -> ValidationError {
    ValidationError::new(format!(
        "Argument '{}' must be {}, got {}",
        arg,
        expected,
        got.kind()
    ))
}

fn c_int_arg(arg: &str, value: &HostValue) -> Result<c_int> {
    let value = value.as_int(arg)?;
    match c_int::try_from(value) {
        Ok(value) => Ok(value),
        Err(_) => bail!(ValidationError::new(format!(
            "Argument '{}' is out of range: {}",
            arg, value
        ))),
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::Text(value.to_string())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        HostValue::Text(value)
    }
}

impl From<i64> for HostValue {
    fn from(value: i64) -> Self {
        HostValue::Int(value)
    }
}

impl From<i32> for HostValue {
    fn from(value: i32) -> Self {
        HostValue::Int(i64::from(value))
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        HostValue::Float(value)
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Bool(value)
    }
}

impl From<Vec<f64>> for HostValue {
    fn from(data: Vec<f64>) -> Self {
        HostValue::Array {
            shape: vec![data.len()],
            data,
        }
    }
}

impl<S: Into<HostValue>> FromIterator<S> for HostValue {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        HostValue::List(iter.into_iter().map(Into::into).collect())
    }
}

/// Argument shapes an entry point can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Text,
    TextSeq,
    Int,
    Float,
    Bool,
    FloatVec,
}

/// The engine operations reachable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    BuildTree,
    FitTree,
    ModelFinder,
    JcDistances,
    NjTree,
    ConsensusTree,
    SimulateAlignment,
    RobinsonFould,
    RandomTree,
    Version,
}

use ArgKind::{Bool, Float, FloatVec, Int, Text, TextSeq};

impl EntryPoint {
    pub const ALL: [EntryPoint; 10] = [
        EntryPoint::BuildTree,
        EntryPoint::FitTree,
        EntryPoint::ModelFinder,
        EntryPoint::JcDistances,
        EntryPoint::NjTree,
        EntryPoint::ConsensusTree,
        EntryPoint::SimulateAlignment,
        EntryPoint::RobinsonFould,
        EntryPoint::RandomTree,
        EntryPoint::Version,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EntryPoint::BuildTree => "iq_build_tree",
            EntryPoint::FitTree => "iq_fit_tree",
            EntryPoint::ModelFinder => "iq_model_finder",
            EntryPoint::JcDistances => "iq_jc_distances",
            EntryPoint::NjTree => "iq_nj_tree",
            EntryPoint::ConsensusTree => "iq_consensus_tree",
            EntryPoint::SimulateAlignment => "iq_simulate_alignment",
            EntryPoint::RobinsonFould => "iq_robinson_fould",
            EntryPoint::RandomTree => "iq_random_tree",
            EntryPoint::Version => "iq_version",
        }
    }

    /// Declared arguments, in call order.
    pub fn args(self) -> &'static [(&'static str, ArgKind)] {
        match self {
            EntryPoint::BuildTree => &[
                ("names", TextSeq),
                ("seqs", TextSeq),
                ("model", Text),
                ("rand_seed", Int),
                ("bootstrap_replicates", Int),
                ("num_threads", Int),
            ],
            EntryPoint::FitTree => &[
                ("names", TextSeq),
                ("seqs", TextSeq),
                ("model", Text),
                ("newick", Text),
                ("bl_fixed", Bool),
                ("rand_seed", Int),
                ("num_threads", Int),
            ],
            EntryPoint::ModelFinder => &[
                ("names", TextSeq),
                ("seqs", TextSeq),
                ("rand_seed", Int),
                ("model_set", Text),
                ("freq_set", Text),
                ("rate_set", Text),
                ("num_threads", Int),
            ],
            EntryPoint::JcDistances => &[
                ("names", TextSeq),
                ("seqs", TextSeq),
                ("num_threads", Int),
            ],
            EntryPoint::NjTree => &[("names", TextSeq), ("distances", FloatVec)],
            EntryPoint::ConsensusTree => &[("trees", TextSeq), ("min_support", Float)],
            EntryPoint::SimulateAlignment => &[
                ("trees", TextSeq),
                ("model", Text),
                ("rand_seed", Int),
                ("partition_info", Text),
                ("partition_type", Text),
                ("length", Int),
                ("insertion_rate", Float),
                ("deletion_rate", Float),
                ("root_seq", Text),
                ("num_threads", Int),
                ("insertion_size_distribution", Text),
                ("deletion_size_distribution", Text),
            ],
            EntryPoint::RobinsonFould => &[("tree1", Text), ("tree2", Text)],
            EntryPoint::RandomTree => &[
                ("num_taxa", Int),
                ("tree_gen_mode", Text),
                ("num_trees", Int),
                ("rand_seed", Int),
            ],
            EntryPoint::Version => &[],
        }
    }

    /// Checks arity and the kind of every argument without calling the
    /// engine.
    pub fn check_args(self, args: &[HostValue]) -> Result<()> {
        let declared = self.args();
        if args.len() != declared.len() {
            bail!(ValidationError::new(format!(
                "{} takes {} arguments, got {}",
                self.name(),
                declared.len(),
                args.len()
            )));
        }
        for ((name, kind), value) in declared.iter().zip(args) {
            match kind {
                Text => value.as_text(name).map(|_| ())?,
                TextSeq => value.as_text_seq(name).map(|_| ())?,
                Int => c_int_arg(name, value).map(|_| ())?,
                Float => value.as_float(name).map(|_| ())?,
                Bool => value.as_bool(name).map(|_| ())?,
                FloatVec => value.as_float_vec(name).map(|_| ())?,
            }
        }
        Ok(())
    }

    /// Converts the arguments and calls the engine.
    pub fn invoke(self, engine: &Engine, args: &[HostValue]) -> Result<HostValue> {
        self.check_args(args)?;
        debug!("Dispatching {}", self.name());
        let text = |i: usize| args[i].as_text(self.args()[i].0);
        let texts = |i: usize| args[i].as_text_seq(self.args()[i].0);
        let int = |i: usize| c_int_arg(self.args()[i].0, &args[i]);
        let float = |i: usize| args[i].as_float(self.args()[i].0);
        Ok(match self {
            EntryPoint::BuildTree => engine
                .build_tree(&texts(0)?, &texts(1)?, text(2)?, int(3)?, int(4)?, int(5)?)?
                .into(),
            EntryPoint::FitTree => engine
                .fit_tree(
                    &texts(0)?,
                    &texts(1)?,
                    text(2)?,
                    text(3)?,
                    args[4].as_bool("bl_fixed")?,
                    int(5)?,
                    int(6)?,
                )?
                .into(),
            EntryPoint::ModelFinder => engine
                .model_finder(
                    &texts(0)?,
                    &texts(1)?,
                    int(2)?,
                    text(3)?,
                    text(4)?,
                    text(5)?,
                    int(6)?,
                )?
                .into(),
            EntryPoint::JcDistances => engine.jc_distances(&texts(0)?, &texts(1)?, int(2)?)?.into(),
            EntryPoint::NjTree => engine
                .nj_tree(&texts(0)?, &args[1].as_float_vec("distances")?)?
                .into(),
            EntryPoint::ConsensusTree => engine.consensus_tree(&texts(0)?, float(1)?)?.into(),
            EntryPoint::SimulateAlignment => {
                let trees: Vec<String> = texts(0)?.into_iter().map(String::from).collect();
                engine
                    .simulate_alignment(&SimulateArgs {
                        trees: &trees,
                        model: text(1)?,
                        seed: int(2)?,
                        partition_info: text(3)?,
                        partition_type: text(4)?,
                        length: int(5)?,
                        insertion_rate: float(6)?,
                        deletion_rate: float(7)?,
                        root_seq: text(8)?,
                        num_threads: int(9)?,
                        insertion_size_distribution: text(10)?,
                        deletion_size_distribution: text(11)?,
                    })?
                    .into()
            }
            EntryPoint::RobinsonFould => {
                HostValue::Int(i64::from(engine.robinson_fould(text(0)?, text(1)?)?))
            }
            EntryPoint::RandomTree => engine
                .random_tree(int(0)?, text(1)?, int(2)?, int(3)?)?
                .into(),
            EntryPoint::Version => engine.version()?.into(),
        })
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for EntryPoint {
    type Err = anyhow::Error;

    fn from_str(name: &str) -> Result<Self> {
        match EntryPoint::ALL.iter().find(|e| e.name() == name) {
            Some(entry) => Ok(*entry),
            None => bail!(ValidationError::new(format!(
                "Unknown entry point '{}'",
                name
            ))),
        }
    }
}

/// Looks up an entry point by name and calls it.
///
/// # Example
/// ```no_run
/// use piqtree::host::{invoke, HostValue};
/// let engine = piqtree::engine::global().unwrap();
/// let version = invoke(&engine, "iq_version", &[]).unwrap();
/// assert_eq!(version.kind(), "text");
/// let rf = invoke(
///     &engine,
///     "iq_robinson_fould",
///     &["(a,b,(c,d));".into(), "(a,c,(b,d));".into()],
/// )
/// .unwrap();
/// assert_eq!(rf, HostValue::Int(2));
/// ```
pub fn invoke(engine: &Engine, name: &str, args: &[HostValue]) -> Result<HostValue> {
    name.parse::<EntryPoint>()?.invoke(engine, args)
}
