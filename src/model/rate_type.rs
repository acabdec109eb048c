use std::fmt::{self, Display};

use anyhow::bail;

use crate::errors::ValidationError;
use crate::Result;

/// Rate heterogeneity across sites.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RateModel {
    /// Discrete Gamma (Yang, 1994). Category count and shape are left to the
    /// engine when absent.
    Gamma {
        categories: Option<i32>,
        alpha: Option<f64>,
    },
    /// FreeRate (Yang, 1995; Soubrier et al., 2012).
    FreeRate { categories: Option<i32> },
}

impl RateModel {
    pub fn gamma() -> Self {
        RateModel::Gamma {
            categories: None,
            alpha: None,
        }
    }

    pub fn free_rate() -> Self {
        RateModel::FreeRate { categories: None }
    }

    pub fn categories(&self) -> Option<i32> {
        match self {
            RateModel::Gamma { categories, .. } | RateModel::FreeRate { categories } => *categories,
        }
    }

    /// Parses `G`, `G8`, `G4{0.5}`, `R` or `R6`. Category counts are not
    /// range checked here.
    pub fn parse(component: &str) -> Result<Self> {
        let (kind, rest) = match component.chars().next() {
            Some(kind @ ('G' | 'R')) => (kind, &component[1..]),
            _ => bail!(ValidationError::new(format!(
                "Unexpected value for rate model '{}'",
                component
            ))),
        };
        let (count, params) = match rest.find('{') {
            Some(start) => (&rest[..start], Some(&rest[start..])),
            None => (rest, None),
        };
        let categories = if count.is_empty() {
            None
        } else {
            Some(count.parse::<i32>().map_err(|_| {
                ValidationError::new(format!(
                    "Invalid specification for rate categories '{}'",
                    component
                ))
            })?)
        };
        match (kind, params) {
            ('R', None) => Ok(RateModel::FreeRate { categories }),
            ('R', Some(_)) => bail!(ValidationError::new(format!(
                "FreeRate model does not take parameters, got '{}'",
                component
            ))),
            (_, None) => Ok(RateModel::Gamma {
                categories,
                alpha: None,
            }),
            (_, Some(params)) => {
                let Some(alpha) = params.strip_prefix('{').and_then(|p| p.strip_suffix('}')) else {
                    bail!(ValidationError::new(format!(
                        "Missing end bracket for parameterisation '{}'",
                        component
                    )));
                };
                let alpha = alpha.trim().parse::<f64>().map_err(|_| {
                    ValidationError::new(format!(
                        "Parameterisation of Discrete Gamma Model is not a number '{}'",
                        component
                    ))
                })?;
                Ok(RateModel::Gamma {
                    categories,
                    alpha: Some(alpha),
                })
            }
        }
    }
}

impl Display for RateModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (kind, categories) = match self {
            RateModel::Gamma { categories, .. } => ('G', categories),
            RateModel::FreeRate { categories } => ('R', categories),
        };
        write!(f, "{}", kind)?;
        if let Some(categories) = categories {
            write!(f, "{}", categories)?;
        }
        if let RateModel::Gamma {
            alpha: Some(alpha), ..
        } = self
        {
            write!(f, "{{{}}}", alpha)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InvariableSites {
    Absent,
    Estimated,
    Proportion(f64),
}

/// Invariable sites together with an optional rate model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RateType {
    pub invariable_sites: InvariableSites,
    pub rate_model: Option<RateModel>,
}

impl RateType {
    pub fn new(invariable_sites: InvariableSites, rate_model: Option<RateModel>) -> Result<Self> {
        if let InvariableSites::Proportion(p) = invariable_sites {
            if !(0.0..1.0).contains(&p) {
                bail!(ValidationError::new(
                    "The proportion of invariable sites must be in the range [0,1)"
                ));
            }
        }
        Ok(Self {
            invariable_sites,
            rate_model,
        })
    }

    pub fn has_invariable_sites(&self) -> bool {
        self.invariable_sites != InvariableSites::Absent
    }

    pub fn proportion_invariable(&self) -> Option<f64> {
        match self.invariable_sites {
            InvariableSites::Proportion(p) => Some(p),
            _ => None,
        }
    }

    /// The six base rate types offered to users.
    pub fn base_types() -> [RateType; 6] {
        let make = |invariable: bool, rate_model| RateType {
            invariable_sites: if invariable {
                InvariableSites::Estimated
            } else {
                InvariableSites::Absent
            },
            rate_model,
        };
        [
            make(false, None),
            make(true, None),
            make(false, Some(RateModel::gamma())),
            make(true, Some(RateModel::gamma())),
            make(false, Some(RateModel::free_rate())),
            make(true, Some(RateModel::free_rate())),
        ]
    }

    /// Description of the rate type, ignoring category counts and fixed
    /// parameters.
    pub fn description(&self) -> &'static str {
        match (self.has_invariable_sites(), &self.rate_model) {
            (false, None) => "no invariable sites, no rate heterogeneity model.",
            (true, None) => "allowing for a proportion of invariable sites.",
            (false, Some(RateModel::Gamma { .. })) => "discrete Gamma model (Yang, 1994) with default 4 rate categories. The number of categories can be changed with e.g. +G8.",
            (true, Some(RateModel::Gamma { .. })) => "invariable site plus discrete Gamma model (Gu et al., 1995).",
            (false, Some(RateModel::FreeRate { .. })) => "FreeRate model (Yang, 1995; Soubrier et al., 2012) that generalizes the +G model by relaxing the assumption of Gamma-distributed rates. The number of categories can be specified with e.g. +R6 (default 4 categories if not specified). The FreeRate model typically fits data better than the +G model and is recommended for analysis of large data sets.",
            (true, Some(RateModel::FreeRate { .. })) => "invariable site plus FreeRate model.",
        }
    }
}

impl Display for RateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.invariable_sites {
            InvariableSites::Absent => {}
            InvariableSites::Estimated => write!(f, "I")?,
            InvariableSites::Proportion(p) => write!(f, "I{{{}}}", p)?,
        }
        if let Some(rate_model) = &self.rate_model {
            if self.has_invariable_sites() {
                write!(f, "+")?;
            }
            write!(f, "{}", rate_model)?;
        }
        Ok(())
    }
}

/// Parses an `I` or `I{p}` component.
pub(crate) fn parse_invariable_sites(component: &str) -> Result<InvariableSites> {
    let remainder = &component[1..];
    if remainder.is_empty() {
        return Ok(InvariableSites::Estimated);
    }
    let Some(number) = remainder.strip_prefix('{').and_then(|r| r.strip_suffix('}')) else {
        bail!(ValidationError::new(format!(
            "Invalid specification for proportion of invariable sites, got '{}'.",
            component
        )));
    };
    match number.trim().parse::<f64>() {
        Ok(p) => Ok(InvariableSites::Proportion(p)),
        Err(_) => bail!(ValidationError::new(format!(
            "Failed to read proportion of invariable sites, got '{}'",
            component
        ))),
    }
}
