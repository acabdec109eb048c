use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::str::FromStr;

use anyhow::bail;
use serde_yaml::{Mapping, Value};

use crate::errors::ParseIqTreeError;
use crate::model::{make_model, Model};
use crate::Result;

/// Fit statistics of one candidate model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelResultValue {
    pub lnl: f64,
    /// Number of free parameters.
    pub nfp: i64,
    pub tree_length: f64,
}

impl FromStr for ModelResultValue {
    type Err = anyhow::Error;

    /// Reads `"<lnL> <nfp> <tree_length>"`.
    fn from_str(val: &str) -> Result<Self> {
        let error = || ParseIqTreeError::new(format!("Error parsing string '{}'", val));
        let fields: Vec<&str> = val.split_whitespace().collect();
        let [lnl, nfp, tree_length] = fields.as_slice() else {
            bail!(error());
        };
        match (
            lnl.parse::<f64>(),
            nfp.parse::<i64>(),
            tree_length.parse::<f64>(),
        ) {
            (Ok(lnl), Ok(nfp), Ok(tree_length)) => Ok(Self {
                lnl,
                nfp,
                tree_length,
            }),
            _ => bail!(error()),
        }
    }
}

impl Display for ModelResultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.lnl, self.nfp, self.tree_length)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelFinderResult {
    pub best_aic: Model,
    pub best_aicc: Model,
    pub best_bic: Model,
    /// Statistics keyed by IQ-TREE model string.
    pub model_stats: BTreeMap<String, ModelResultValue>,
}

const BEST_KEYS: [&str; 3] = ["best_model_AIC", "best_model_AICc", "best_model_BIC"];

impl ModelFinderResult {
    /// Reads the ModelFinder YAML report.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let raw: Mapping = match serde_yaml::from_str(text) {
            Ok(raw) => raw,
            Err(e) => bail!(ParseIqTreeError::new(format!(
                "IQ-TREE output is not valid YAML: {}",
                e
            ))),
        };
        let mut model_stats: BTreeMap<String, ModelResultValue> = BTreeMap::new();
        for (key, val) in &raw {
            let (Some(key), Value::String(val)) = (key.as_str(), val) else {
                continue;
            };
            if key.starts_with("best_") || key.starts_with("initTree") {
                continue;
            }
            model_stats.insert(key.to_string(), val.parse::<ModelResultValue>()?);
        }
        let best = |key: &str| -> Result<Model> {
            match raw.get(key).and_then(Value::as_str) {
                Some(model) => make_model(model),
                None => bail!(ParseIqTreeError::new(format!(
                    "IQ-TREE output malformated, {} not found.",
                    key
                ))),
            }
        };
        let result = Self {
            best_aic: best(BEST_KEYS[0])?,
            best_aicc: best(BEST_KEYS[1])?,
            best_bic: best(BEST_KEYS[2])?,
            model_stats,
        };
        for model in [&result.best_aic, &result.best_aicc, &result.best_bic] {
            if !result.model_stats.contains_key(&model.to_string()) {
                bail!(ParseIqTreeError::new(format!(
                    "IQ-TREE output malformated, statistics for {} not found.",
                    model
                )));
            }
        }
        Ok(result)
    }

    pub fn stats(&self, model: &Model) -> Option<&ModelResultValue> {
        self.model_stats.get(&model.to_string())
    }

    /// Writes the result back in the layout it was read from.
    pub fn to_yaml(&self) -> Result<String> {
        let mut raw: BTreeMap<String, String> = self
            .model_stats
            .iter()
            .map(|(model, stats)| (model.clone(), stats.to_string()))
            .collect();
        for (key, model) in BEST_KEYS
            .iter()
            .zip([&self.best_aic, &self.best_aicc, &self.best_bic])
        {
            raw.insert(key.to_string(), model.to_string());
        }
        Ok(serde_yaml::to_string(&raw)?)
    }
}
