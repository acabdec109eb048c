//! IQ-TREE model strings: a substitution model optionally followed by a
//! state frequency type and a rate heterogeneity type, joined with `+`.
use std::fmt::{self, Display};
use std::str::FromStr;

use anyhow::bail;

use crate::errors::ValidationError;
use crate::Result;

mod freq_type;
mod options;
mod rate_type;
mod substitution;

pub use freq_type::FreqType;
pub use options::{
    available_freq_types, available_models, available_rate_types, ModelFamily, ModelOption,
};
pub use rate_type::{InvariableSites, RateModel, RateType};
pub use substitution::{AaModel, DnaModel, LieModel, LiePairing, ModelType, SubstitutionModel};

use rate_type::parse_invariable_sites;

#[derive(Clone, Debug, PartialEq)]
pub struct Model {
    pub substitution: SubstitutionModel,
    pub freq_type: Option<FreqType>,
    pub rate_type: Option<RateType>,
}

impl Model {
    pub fn new(substitution: impl Into<SubstitutionModel>) -> Self {
        Self {
            substitution: substitution.into(),
            freq_type: None,
            rate_type: None,
        }
    }

    pub fn with_freq_type(mut self, freq_type: FreqType) -> Self {
        self.freq_type = Some(freq_type);
        self
    }

    pub fn with_rate_type(mut self, rate_type: RateType) -> Self {
        self.rate_type = Some(rate_type);
        self
    }

    pub fn model_type(&self) -> ModelType {
        self.substitution.model_type()
    }

    pub fn rate_model(&self) -> Option<&RateModel> {
        self.rate_type.as_ref().and_then(|r| r.rate_model.as_ref())
    }

    pub fn invariable_sites(&self) -> bool {
        self.rate_type
            .as_ref()
            .is_some_and(RateType::has_invariable_sites)
    }

    pub fn proportion_invariable_sites(&self) -> Option<f64> {
        self.rate_type.as_ref().and_then(RateType::proportion_invariable)
    }
}

impl From<SubstitutionModel> for Model {
    fn from(substitution: SubstitutionModel) -> Self {
        Model::new(substitution)
    }
}

/// Parses an IQ-TREE model string such as `GTR+FO+I{0.2}+G8{0.5}`.
///
/// # Example
/// ```
/// use piqtree::model::make_model;
/// let model = make_model("HKY+F+G4").unwrap();
/// assert_eq!(model.rate_model().unwrap().categories(), Some(4));
/// assert_eq!(model.to_string(), "HKY+F+G4");
/// ```
pub fn make_model(model: &str) -> Result<Model> {
    let (substitution, components) = match model.split_once('+') {
        Some((substitution, components)) => (substitution, Some(components)),
        None => (model, None),
    };
    let mut result = Model::new(SubstitutionModel::parse(substitution)?);
    let Some(components) = components else {
        return Ok(result);
    };

    let duplicate = |what: &str| {
        ValidationError::new(format!("Model '{}' contains multiple {}.", model, what))
    };
    let mut invariable_sites = None;
    let mut rate_model = None;
    for component in components.split('+') {
        if component.starts_with('F') {
            if result.freq_type.is_some() {
                bail!(duplicate("base frequency specifications"));
            }
            result.freq_type = Some(FreqType::parse(component)?);
        } else if component.starts_with('I') {
            if invariable_sites.is_some() {
                bail!(duplicate("specifications for invariable sites"));
            }
            invariable_sites = Some(parse_invariable_sites(component)?);
        } else if component.starts_with(['G', 'R']) {
            if rate_model.is_some() {
                bail!(duplicate("rate heterogeneity specifications"));
            }
            rate_model = Some(RateModel::parse(component)?);
        } else {
            bail!(ValidationError::new(format!(
                "Model '{}' contains unexpected component.",
                model
            )));
        }
    }
    if invariable_sites.is_some() || rate_model.is_some() {
        result.rate_type = Some(RateType::new(
            invariable_sites.unwrap_or(InvariableSites::Absent),
            rate_model,
        )?);
    }
    Ok(result)
}

impl FromStr for Model {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        make_model(s)
    }
}

impl Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.substitution)?;
        if let Some(freq_type) = &self.freq_type {
            write!(f, "+{}", freq_type)?;
        }
        if let Some(rate_type) = self.rate_type.map(|r| r.to_string()) {
            if !rate_type.is_empty() {
                write!(f, "+{}", rate_type)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage, coverage(off))]
mod tests;
