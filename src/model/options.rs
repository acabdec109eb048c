use std::fmt::{self, Display};
use std::str::FromStr;

use anyhow::bail;

use crate::errors::ValidationError;
use crate::model::{FreqType, ModelType, RateType, SubstitutionModel};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelFamily {
    All,
    Dna,
    Protein,
}

impl FromStr for ModelFamily {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(ModelFamily::All),
            "dna" => Ok(ModelFamily::Dna),
            "protein" => Ok(ModelFamily::Protein),
            _ => bail!(ValidationError::new(format!(
                "Unknown model family '{}', expected all, dna or protein",
                s
            ))),
        }
    }
}

impl Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelFamily::All => write!(f, "all"),
            ModelFamily::Dna => write!(f, "dna"),
            ModelFamily::Protein => write!(f, "protein"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModelOption {
    pub model_type: ModelType,
    pub abbreviation: String,
    pub description: String,
}

/// One row per substitution model in the family.
pub fn available_models(family: ModelFamily) -> Vec<ModelOption> {
    let (dna, protein) = match family {
        ModelFamily::All => (true, true),
        ModelFamily::Dna => (true, false),
        ModelFamily::Protein => (false, true),
    };
    SubstitutionModel::available(dna, protein)
        .into_iter()
        .map(|model| ModelOption {
            model_type: model.model_type(),
            abbreviation: model.to_string(),
            description: model.description(),
        })
        .collect()
}

pub fn available_freq_types() -> Vec<(String, &'static str)> {
    FreqType::NAMED
        .iter()
        .map(|freq| (freq.to_string(), freq.description()))
        .collect()
}

pub fn available_rate_types() -> Vec<(String, &'static str)> {
    RateType::base_types()
        .iter()
        .map(|rate| (rate.to_string(), rate.description()))
        .collect()
}
