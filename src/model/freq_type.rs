use std::fmt::{self, Display};

use anyhow::bail;

use crate::errors::ValidationError;
use crate::model::substitution::{format_floats, parse_floats};
use crate::Result;

/// Base frequency component of a model.
#[derive(Clone, Debug, PartialEq)]
#[allow(clippy::upper_case_acronyms)]
pub enum FreqType {
    F,
    FO,
    FQ,
    /// User supplied frequencies, one per state.
    Custom(Vec<f64>),
}

impl FreqType {
    pub const NAMED: [FreqType; 3] = [FreqType::F, FreqType::FO, FreqType::FQ];

    pub fn description(&self) -> &'static str {
        match self {
            FreqType::F => "Empirical state frequency observed from the data.",
            FreqType::FO => "State frequency optimized by maximum-likelihood from the data. Note that this is with letter-O and not digit-0.",
            FreqType::FQ => "Equal state frequency.",
            FreqType::Custom(_) => "User specified state frequencies.",
        }
    }

    /// Parses one `+`-separated component, e.g. `FO` or `F{0.1,0.2,0.3,0.4}`.
    pub fn parse(component: &str) -> Result<Self> {
        match component {
            "F" => return Ok(FreqType::F),
            "FO" => return Ok(FreqType::FO),
            "FQ" => return Ok(FreqType::FQ),
            _ => {}
        }
        let Some(values) = component
            .strip_prefix("F{")
            .and_then(|rest| rest.strip_suffix('}'))
        else {
            bail!(ValidationError::new(format!(
                "Unknown state frequency type: '{}'",
                component
            )));
        };
        let freqs = parse_floats(values).map_err(|_| {
            ValidationError::new(format!("Unable to parse state frequencies '{}'", component))
        })?;
        if freqs.len() != 4 && freqs.len() != 20 {
            bail!(ValidationError::new(format!(
                "Custom state frequencies must have 4 or 20 values, got {}",
                freqs.len()
            )));
        }
        Ok(FreqType::Custom(freqs))
    }
}

impl Display for FreqType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FreqType::F => write!(f, "F"),
            FreqType::FO => write!(f, "FO"),
            FreqType::FQ => write!(f, "FQ"),
            FreqType::Custom(freqs) => write!(f, "F{{{}}}", format_floats(freqs)),
        }
    }
}
