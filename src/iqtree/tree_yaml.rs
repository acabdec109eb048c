use std::collections::BTreeMap;

use anyhow::bail;
use log::debug;
use serde_yaml::{Mapping, Value};

use crate::errors::ParseIqTreeError;
use crate::model::{DnaModel, Model};
use crate::tree::{NodeIdx, Tree};
use crate::Result;

pub(crate) const MOTIF_PARS: [&str; 4] = ["A", "C", "G", "T"];
pub(crate) const RATE_PARS: [&str; 6] = ["A/C", "A/G", "A/T", "C/G", "C/T", "G/T"];
pub(crate) const RATE_PARS_UNREST: [&str; 12] = [
    "A/C", "A/G", "A/T", "C/A", "C/G", "C/T", "G/A", "G/C", "G/T", "T/A", "T/C", "T/G",
];

/// Fitted substitution model parameters reported with a tree.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelFit {
    Dna {
        mprobs: BTreeMap<String, f64>,
        rates: BTreeMap<String, f64>,
    },
    Unrest {
        mprobs: BTreeMap<String, f64>,
        rates: BTreeMap<String, f64>,
    },
    LieMarkov {
        /// Section name as written by IQ-TREE, e.g. `ModelLieMarkovRY3.3b`.
        name: String,
        mprobs: BTreeMap<String, f64>,
        model_parameters: Option<Vec<f64>>,
    },
}

impl ModelFit {
    pub fn mprobs(&self) -> &BTreeMap<String, f64> {
        match self {
            ModelFit::Dna { mprobs, .. }
            | ModelFit::Unrest { mprobs, .. }
            | ModelFit::LieMarkov { mprobs, .. } => mprobs,
        }
    }
}

/// Parameters attached to a single edge.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EdgeParams {
    pub mprobs: BTreeMap<String, f64>,
    pub rates: BTreeMap<String, f64>,
}

/// A tree returned by a tree search or branch length fit.
#[derive(Clone, Debug, PartialEq)]
pub struct FittedTree {
    pub tree: Tree,
    pub lnl: f64,
    pub model_fit: Option<ModelFit>,
    /// The first `Rate*` section, kept as written.
    pub rate_params: Option<(String, Value)>,
    edge_params: Option<EdgeParams>,
}

impl FittedTree {
    /// Parameters of the edge above `idx`. The root carries state
    /// frequencies only. `None` when the model has no per-edge parameters.
    pub fn edge_params(&self, idx: &NodeIdx) -> Option<EdgeParams> {
        let params = self.edge_params.as_ref()?;
        if *idx == self.tree.root {
            Some(EdgeParams {
                mprobs: params.mprobs.clone(),
                rates: BTreeMap::new(),
            })
        } else {
            Some(params.clone())
        }
    }
}

fn malformed(what: &str) -> ParseIqTreeError {
    ParseIqTreeError::new(format!("IQ-TREE output malformated, {}.", what))
}

fn parse_values(text: &str) -> Result<Vec<f64>> {
    text.split(',')
        .map(|v| match v.trim().parse::<f64>() {
            Ok(value) => Ok(value),
            Err(_) => bail!(ParseIqTreeError::new(format!(
                "IQ-TREE output malformated, '{}' is not a number.",
                v.trim()
            ))),
        })
        .collect()
}

fn named_values(labels: &[&str], text: &str) -> Result<BTreeMap<String, f64>> {
    let values = parse_values(text)?;
    if values.len() != labels.len() {
        bail!(ParseIqTreeError::new(format!(
            "IQ-TREE output malformated, expected {} values, got {}.",
            labels.len(),
            values.len()
        )));
    }
    Ok(labels
        .iter()
        .map(|l| l.to_string())
        .zip(values)
        .collect())
}

fn text_field<'a>(section: &'a Value, key: &str) -> Option<&'a str> {
    section.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn state_freqs(section: &Value) -> Result<BTreeMap<String, f64>> {
    match text_field(section, "state_freq") {
        Some(freqs) => named_values(&MOTIF_PARS, freqs),
        None => bail!(malformed("motif parameters not found")),
    }
}

fn rates(section: &Value, labels: &[&str]) -> Result<BTreeMap<String, f64>> {
    match text_field(section, "rates") {
        Some(rates) => named_values(labels, rates),
        None => bail!(malformed("rate parameters not found")),
    }
}

fn parse_model_fit(report: &Mapping) -> Result<Option<ModelFit>> {
    if let Some(section) = report.get("ModelDNA") {
        return Ok(Some(ModelFit::Dna {
            mprobs: state_freqs(section)?,
            rates: rates(section, &RATE_PARS)?,
        }));
    }
    if let Some(section) = report.get("ModelUnrest") {
        return Ok(Some(ModelFit::Unrest {
            mprobs: state_freqs(section)?,
            rates: rates(section, &RATE_PARS_UNREST)?,
        }));
    }
    let lie = report
        .iter()
        .find_map(|(k, v)| k.as_str().filter(|k| k.starts_with("ModelLieMarkov")).map(|k| (k, v)));
    let Some((name, section)) = lie else {
        return Ok(None);
    };
    let model_parameters = match section.get("model_parameters") {
        None => None,
        Some(Value::String(text)) => Some(parse_values(text)?),
        Some(Value::Number(n)) => n.as_f64().map(|v| vec![v]),
        Some(_) => bail!(malformed("Lie-Markov model parameters unreadable")),
    };
    Ok(Some(ModelFit::LieMarkov {
        name: name.to_string(),
        mprobs: state_freqs(section)?,
        model_parameters,
    }))
}

/// Global rate parameters renamed for the fitted model and applied to every
/// edge.
fn edge_params_for(model: &Model, fit: &ModelFit) -> Option<EdgeParams> {
    let (mprobs, rates) = match fit {
        ModelFit::Dna { mprobs, rates } | ModelFit::Unrest { mprobs, rates } => (mprobs, rates),
        ModelFit::LieMarkov { .. } => return None,
    };
    let rate = |key: &str| rates.get(key).copied().unwrap_or_default();
    let rates = match model.substitution.dna_model() {
        Some(DnaModel::JC | DnaModel::F81) => BTreeMap::new(),
        Some(DnaModel::K80 | DnaModel::HKY) => BTreeMap::from([("kappa".to_string(), rate("A/G"))]),
        Some(DnaModel::TN) => BTreeMap::from([
            ("kappa_r".to_string(), rate("A/G")),
            ("kappa_y".to_string(), rate("C/T")),
        ]),
        Some(DnaModel::GTR) => {
            let mut rates = rates.clone();
            rates.remove("G/T");
            rates
        }
        _ => rates.clone(),
    };
    Some(EdgeParams {
        mprobs: mprobs.clone(),
        rates,
    })
}

/// Reads the YAML report of a tree search. Tips named by sequence index are
/// renamed with `names`.
pub(crate) fn parse_tree_report<S: AsRef<str>>(
    report: &str,
    names: &[S],
    model: &Model,
) -> Result<FittedTree> {
    let report: Mapping = match serde_yaml::from_str(report) {
        Ok(report) => report,
        Err(e) => bail!(ParseIqTreeError::new(format!(
            "IQ-TREE output is not valid YAML: {}",
            e
        ))),
    };
    let Some(newick) = report
        .get("PhyloTree")
        .and_then(|t| t.get("newick"))
        .and_then(Value::as_str)
    else {
        bail!(malformed("tree not found"));
    };
    let mut tree: Tree = newick.parse()?;

    let mut lnl = None;
    if let Some(Value::Mapping(candidates)) = report.get("CandidateSet") {
        for candidate in candidates.values().filter_map(Value::as_str) {
            let Some((likelihood, candidate_newick)) = candidate.split_once(' ') else {
                continue;
            };
            if candidate_newick.parse::<Tree>()?.tree_equal(&tree) {
                lnl = likelihood.parse::<f64>().ok();
                break;
            }
        }
    }
    let Some(lnl) = lnl else {
        bail!(malformed("likelihood not found"));
    };
    debug!("Matched tree to candidate with lnL {}", lnl);

    let model_fit = parse_model_fit(&report)?;
    let rate_params = report.iter().find_map(|(k, v)| {
        k.as_str()
            .filter(|k| k.starts_with("Rate"))
            .map(|k| (k.to_string(), v.clone()))
    });
    tree.rename_leaves(names)?;
    let edge_params = model_fit.as_ref().and_then(|fit| edge_params_for(model, fit));
    Ok(FittedTree {
        tree,
        lnl,
        model_fit,
        rate_params,
        edge_params,
    })
}
