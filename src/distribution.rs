//! Indel size distributions understood by the alignment simulator.
use std::fmt::{self, Display};
use std::str::FromStr;

use anyhow::bail;

use crate::errors::ValidationError;
use crate::Result;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum IndelDistribution {
    Zipfian { exponent: f64, max_size: u32 },
    Geometric { mean: f64 },
    NegativeBinomial { mean: f64, variance: f64 },
    Lavalette { a: f64, max_size: u32 },
}

impl Default for IndelDistribution {
    fn default() -> Self {
        IndelDistribution::Zipfian {
            exponent: 1.7,
            max_size: 100,
        }
    }
}

impl Display for IndelDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndelDistribution::Zipfian { exponent, max_size } => {
                write!(f, "POW{{{}/{}}}", exponent, max_size)
            }
            IndelDistribution::Geometric { mean } => write!(f, "GEO{{{}}}", mean),
            IndelDistribution::NegativeBinomial { mean, variance } => {
                write!(f, "NB{{{}/{}}}", mean, variance)
            }
            IndelDistribution::Lavalette { a, max_size } => write!(f, "LAV{{{}/{}}}", a, max_size),
        }
    }
}

impl FromStr for IndelDistribution {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ValidationError::new(format!("Invalid indel size distribution '{}'", s));
        let Some((kind, params)) = s
            .strip_suffix('}')
            .and_then(|rest| rest.split_once('{'))
        else {
            bail!(invalid());
        };
        let params: Vec<&str> = params.split('/').map(str::trim).collect();
        let float = |i: usize| params[i].parse::<f64>().map_err(|_| invalid());
        let size = |i: usize| params[i].parse::<u32>().map_err(|_| invalid());
        match (kind, params.len()) {
            ("POW", 2) => Ok(IndelDistribution::Zipfian {
                exponent: float(0)?,
                max_size: size(1)?,
            }),
            ("GEO", 1) => Ok(IndelDistribution::Geometric { mean: float(0)? }),
            ("NB", 2) => Ok(IndelDistribution::NegativeBinomial {
                mean: float(0)?,
                variance: float(1)?,
            }),
            ("LAV", 2) => Ok(IndelDistribution::Lavalette {
                a: float(0)?,
                max_size: size(1)?,
            }),
            _ => bail!(invalid()),
        }
    }
}
