use std::fmt::{self, Display};

use anyhow::bail;
use itertools::Itertools;

use crate::errors::ValidationError;
use crate::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModelType {
    Nucleotide,
    Protein,
}

impl Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelType::Nucleotide => write!(f, "nucleotide"),
            ModelType::Protein => write!(f, "protein"),
        }
    }
}

macro_rules! model_table {
    ($(#[$doc:meta])* $name:ident { $($variant:ident => $code:literal, $desc:literal;)+ }) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[allow(non_camel_case_types, clippy::upper_case_acronyms)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            /// IQ-TREE name of the model.
            pub fn code(&self) -> &'static str {
                match self {
                    $($name::$variant => $code,)+
                }
            }

            pub fn description(&self) -> &'static str {
                match self {
                    $($name::$variant => $desc,)+
                }
            }

            pub fn from_code(code: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|m| m.code() == code)
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.code())
            }
        }
    };
}

model_table!(
    /// Standard nucleotide substitution models.
    DnaModel {
        JC => "JC", "Equal substitution rates and equal base frequencies (Jukes and Cantor, 1969).";
        JC69 => "JC69", "Equal substitution rates and equal base frequencies (Jukes and Cantor, 1969).";
        F81 => "F81", "Equal rates but unequal base freq. (Felsenstein, 1981).";
        K80 => "K80", "Unequal transition/transversion rates and equal base freq. (Kimura, 1980).";
        K2P => "K2P", "Unequal transition/transversion rates and equal base freq. (Kimura, 1980).";
        HKY => "HKY", "Unequal transition/transversion rates and unequal base freq. (Hasegawa, Kishino and Yano, 1985).";
        HKY85 => "HKY85", "Unequal transition/transversion rates and unequal base freq. (Hasegawa, Kishino and Yano, 1985).";
        TN => "TN", "Like HKY but unequal purine/pyrimidine rates (Tamura and Nei, 1993).";
        TN93 => "TN93", "Like HKY but unequal purine/pyrimidine rates (Tamura and Nei, 1993).";
        TNe => "TNe", "Like TN but equal base freq.";
        K81 => "K81", "Three substitution types model and equal base freq. (Kimura, 1981).";
        K3P => "K3P", "Three substitution types model and equal base freq. (Kimura, 1981).";
        K81u => "K81u", "Like K81 but unequal base freq.";
        TPM2 => "TPM2", "AC=AT, AG=CT, CG=GT and equal base freq.";
        TPM2u => "TPM2u", "Like TPM2 but unequal base freq.";
        TPM3 => "TPM3", "AC=CG, AG=CT, AT=GT and equal base freq.";
        TPM3u => "TPM3u", "Like TPM3 but unequal base freq.";
        TIM => "TIM", "Transition model, AC=GT, AT=CG and unequal base freq.";
        TIMe => "TIMe", "Like TIM but equal base freq.";
        TIM2 => "TIM2", "AC=AT, CG=GT and unequal base freq.";
        TIM2e => "TIM2e", "Like TIM2 but equal base freq.";
        TIM3 => "TIM3", "AC=CG, AT=GT and unequal base freq.";
        TIM3e => "TIM3e", "Like TIM3 but equal base freq.";
        TVM => "TVM", "Transversion model, AG=CT and unequal base freq.";
        TVMe => "TVMe", "Like TVM but equal base freq.";
        SYM => "SYM", "Symmetric model with unequal rates but equal base freq. (Zharkikh, 1994).";
        GTR => "GTR", "General time reversible model with unequal rates and unequal base freq. (Tavare, 1986).";
        STRSYM => "STRSYM", "Strand-symmetric model (Bielawski and Gold, 2002).";
        UNREST => "UNREST", "Unrestricted model.";
    }
);

model_table!(
    /// Lie-Markov nucleotide models.
    LieModel {
        Lie1_1 => "1.1", "Reversible model. Equal base frequencies. equiv. to JC";
        Lie2_2b => "2.2b", "Reversible model. Equal base frequencies. equiv. to K2P";
        Lie3_3a => "3.3a", "Reversible model. Equal base frequencies. equiv. to K3P";
        Lie3_3b => "3.3b", "Non-reversible model. Equal base frequencies.";
        Lie3_3c => "3.3c", "Reversible model. Equal base frequencies. equiv. to TNe";
        Lie3_4 => "3.4", "Reversible model. f(A)=f(G) and f(C)=f(T).";
        Lie4_4a => "4.4a", "Reversible model. Unconstrained base frequencies. equiv. to F81";
        Lie4_4b => "4.4b", "Reversible model. f(A)=f(G) and f(C)=f(T).";
        Lie4_5a => "4.5a", "Non-reversible model. f(A)=f(G) and f(C)=f(T).";
        Lie4_5b => "4.5b", "Non-reversible model. f(A)=f(G) and f(C)=f(T).";
        Lie5_6a => "5.6a", "Non-reversible model. Equal base frequencies.";
        Lie5_6b => "5.6b", "Non-reversible model. Unconstrained base frequencies.";
        Lie5_7a => "5.7a", "Non-reversible model. f(A)+f(G)=0.5=f(C)+f(T).";
        Lie5_7b => "5.7b", "Non-reversible model. Equal base frequencies.";
        Lie5_7c => "5.7c", "Non-reversible model. Equal base frequencies.";
        Lie5_11a => "5.11a", "Non-reversible model. f(A)+f(G)=0.5=f(C)+f(T).";
        Lie5_11b => "5.11b", "Non-reversible model. Equal base frequencies.";
        Lie5_11c => "5.11c", "Non-reversible model. Equal base frequencies.";
        Lie5_16 => "5.16", "Non-reversible model. f(A)=f(G) and f(C)=f(T).";
        Lie6_6 => "6.6", "Non-reversible model. f(A)=f(G) and f(C)=f(T). equiv. to STRSYM for strand-symmetric model (Bielawski and Gold, 2002)";
        Lie6_7a => "6.7a", "Non-reversible model. Unconstrained base frequencies. F81+K3P";
        Lie6_7b => "6.7b", "Non-reversible model. Unconstrained base frequencies.";
        Lie6_8a => "6.8a", "Non-reversible model. Unconstrained base frequencies.";
        Lie6_8b => "6.8b", "Non-reversible model. f(A)=f(G) and f(C)=f(T).";
        Lie6_17a => "6.17a", "Non-reversible model. f(A)=f(G) and f(C)=f(T).";
        Lie6_17b => "6.17b", "Non-reversible model. f(A)=f(G) and f(C)=f(T).";
        Lie8_8 => "8.8", "Non-reversible model. Unconstrained base frequencies.";
        Lie8_10a => "8.10a", "Non-reversible model. Unconstrained base frequencies.";
        Lie8_10b => "8.10b", "Non-reversible model. f(A)=f(G) and f(C)=f(T).";
        Lie8_16 => "8.16", "Non-reversible model. Unconstrained base frequencies.";
        Lie8_17 => "8.17", "Non-reversible model. Unconstrained base frequencies.";
        Lie8_18 => "8.18", "Non-reversible model. Unconstrained base frequencies.";
        Lie9_20a => "9.20a", "Non-reversible model. f(A)+f(G)=0.5=f(C)+f(T).";
        Lie9_20b => "9.20b", "Non-reversible model. Equal base frequencies. Doubly stochastic";
        Lie10_12 => "10.12", "Non-reversible model. Unconstrained base frequencies.";
        Lie10_34 => "10.34", "Non-reversible model. Unconstrained base frequencies.";
        Lie12_12 => "12.12", "Non-reversible model. Unconstrained base frequencies. equiv. to UNREST (unrestricted model)";
    }
);

model_table!(
    /// Pairing prefix of a Lie-Markov model.
    LiePairing {
        RY => "RY", "purine-pyrimidine pairing (default).";
        WS => "WS", "weak-strong pairing.";
        MK => "MK", "aMino-Keto pairing";
    }
);

model_table!(
    /// Empirical amino-acid models.
    AaModel {
        Blosum62 => "Blosum62", "BLOcks SUbstitution Matrix (Henikoff and Henikoff, 1992). Note that BLOSUM62 is not recommended for phylogenetic analysis as it was designed mainly for sequence alignments.";
        CpREV => "cpREV", "chloroplast matrix (Adachi et al., 2000).";
        Dayhoff => "Dayhoff", "General matrix (Dayhoff et al., 1978).";
        DCMut => "DCMut", "Revised Dayhoff matrix (Kosiol and Goldman, 2005).";
        EAL => "EAL", "General matrix. To be used with profile mixture models (for eg. EAL+C60) for reconstructing relationships between eukaryotes and Archaea (Banos et al., 2024).";
        ELM => "ELM", "General matrix. To be used with profile mixture models (for eg. ELM+C60) for phylogenetic analysis of proteins encoded by nuclear genomes of eukaryotes (Banos et al., 2024).";
        FLAVI => "FLAVI", "Flavivirus (Le and Vinh, 2020).";
        FLU => "FLU", "Influenza virus (Dang et al., 2010).";
        GTR20 => "GTR20", "General time reversible models with 190 rate parameters.";
        HIVb => "HIVb", "HIV between-patient matrix HIV-Bm (Nickle et al., 2007).";
        HIVw => "HIVw", "HIV within-patient matrix HIV-Wm (Nickle et al., 2007).";
        JTT => "JTT", "General matrix (Jones et al., 1992).";
        JTTDCMut => "JTTDCMut", "Revised JTT matrix (Kosiol and Goldman, 2005).";
        LG => "LG", "General matrix (Le and Gascuel, 2008).";
        MtART => "mtART", "Mitochondrial Arthropoda (Abascal et al., 2007).";
        MtMAM => "mtMAM", "Mitochondrial Mammalia (Yang et al., 1998).";
        MtREV => "mtREV", "Mitochondrial Vertebrate (Adachi and Hasegawa, 1996).";
        MtZOA => "mtZOA", "Mitochondrial Metazoa (Animals) (Rota-Stabelli et al., 2009).";
        MtMet => "mtMet", "Mitochondrial Metazoa (Vinh et al., 2017).";
        MtVer => "mtVer", "Mitochondrial Vertebrate (Vinh et al., 2017).";
        MtInv => "mtInv", "Mitochondrial Inverterbrate (Vinh et al., 2017).";
        NQBird => "NQ.bird", "Non-reversible Q matrix (Dang et al., 2022) estimated for birds (Jarvis et al., 2015).";
        NQInsect => "NQ.insect", "Non-reversible Q matrix (Dang et al., 2022) estimated for insects (Misof et al., 2014).";
        NQMammal => "NQ.mammal", "Non-reversible Q matrix (Dang et al., 2022) estimated for mammals (Wu et al., 2018).";
        NQPfam => "NQ.pfam", "General non-reversible Q matrix (Dang et al., 2022) estimated from Pfam version 31 database (El-Gebali et al., 2018).";
        NQPlant => "NQ.plant", "Non-reversible Q matrix (Dang et al., 2022) estimated for plants (Ran et al., 2018).";
        NQYeast => "NQ.yeast", "Non-reversible Q matrix (Dang et al., 2022) estimated for yeasts (Shen et al., 2018).";
        Poisson => "Poisson", "Equal amino-acid exchange rates and frequencies.";
        PMB => "PMB", "Probability Matrix from Blocks, revised BLOSUM matrix (Veerassamy et al., 2004).";
        QBird => "Q.bird", "Q matrix (Minh et al., 2021) estimated for birds (Jarvis et al., 2015).";
        QInsect => "Q.insect", "Q matrix (Minh et al., 2021) estimated for insects (Misof et al., 2014).";
        QMammal => "Q.mammal", "Q matrix (Minh et al., 2021) estimated for mammals (Wu et al., 2018).";
        QPfam => "Q.pfam", "General Q matrix (Minh et al., 2021) estimated from Pfam version 31 database (El-Gebali et al., 2018).";
        QPlant => "Q.plant", "Q matrix (Minh et al., 2021) estimated for plants (Ran et al., 2018).";
        QYeast => "Q.yeast", "Q matrix (Minh et al., 2021) estimated for yeasts (Shen et al., 2018).";
        RtREV => "rtREV", "Retrovirus (Dimmic et al., 2002).";
        VT => "VT", "General 'Variable Time' matrix (Mueller and Vingron, 2000).";
        WAG => "WAG", "General matrix (Whelan and Goldman, 2001).";
    }
);

/// A substitution model with its optional fixed parameters.
#[derive(Clone, Debug, PartialEq)]
pub enum SubstitutionModel {
    Dna {
        model: DnaModel,
        params: Option<Vec<f64>>,
    },
    Lie {
        model: LieModel,
        pairing: Option<LiePairing>,
        params: Option<Vec<f64>>,
    },
    Aa(AaModel),
}

impl From<DnaModel> for SubstitutionModel {
    fn from(model: DnaModel) -> Self {
        SubstitutionModel::Dna {
            model,
            params: None,
        }
    }
}

impl From<LieModel> for SubstitutionModel {
    fn from(model: LieModel) -> Self {
        SubstitutionModel::Lie {
            model,
            pairing: None,
            params: None,
        }
    }
}

impl From<AaModel> for SubstitutionModel {
    fn from(model: AaModel) -> Self {
        SubstitutionModel::Aa(model)
    }
}

impl SubstitutionModel {
    pub fn model_type(&self) -> ModelType {
        match self {
            SubstitutionModel::Aa(_) => ModelType::Protein,
            _ => ModelType::Nucleotide,
        }
    }

    pub fn description(&self) -> String {
        match self {
            SubstitutionModel::Dna { model, .. } => model.description().to_string(),
            SubstitutionModel::Lie {
                model,
                pairing: Some(pairing),
                ..
            } => format!("{} Pairing: {}", model.description(), pairing.description()),
            SubstitutionModel::Lie { model, .. } => model.description().to_string(),
            SubstitutionModel::Aa(model) => model.description().to_string(),
        }
    }

    pub fn lie_model(&self) -> Option<LieModel> {
        match self {
            SubstitutionModel::Lie { model, .. } => Some(*model),
            _ => None,
        }
    }

    pub fn dna_model(&self) -> Option<DnaModel> {
        match self {
            SubstitutionModel::Dna { model, .. } => Some(*model),
            _ => None,
        }
    }

    /// Every model in the given families, Lie-Markov models once per pairing
    /// prefix.
    pub fn available(dna: bool, protein: bool) -> Vec<SubstitutionModel> {
        let mut models = Vec::new();
        if dna {
            models.extend(DnaModel::ALL.iter().map(|&m| m.into()));
            for pairing in [None, Some(LiePairing::RY), Some(LiePairing::WS), Some(LiePairing::MK)] {
                models.extend(LieModel::ALL.iter().map(|&model| SubstitutionModel::Lie {
                    model,
                    pairing,
                    params: None,
                }));
            }
        }
        if protein {
            models.extend(AaModel::ALL.iter().map(|&m| m.into()));
        }
        models
    }

    /// Parses an IQ-TREE substitution model name such as `GTR`,
    /// `HKY{2.5}`, `RY3.3b` or `Q.pfam`.
    pub fn parse(name: &str) -> Result<Self> {
        if name.is_empty() {
            bail!(ValidationError::new("Unknown substitution model: ''"));
        }
        if let Some(model) = AaModel::from_code(name) {
            return Ok(model.into());
        }
        let (base, params) = split_parameters(name)?;
        if let Some(model) = DnaModel::from_code(base) {
            return Ok(SubstitutionModel::Dna { model, params });
        }
        let pairing = base.get(..2).and_then(LiePairing::from_code);
        let lie_code = if pairing.is_some() { &base[2..] } else { base };
        if let Some(model) = LieModel::from_code(lie_code) {
            return Ok(SubstitutionModel::Lie {
                model,
                pairing,
                params,
            });
        }
        bail!(ValidationError::new(format!(
            "Unknown substitution model: '{}'",
            name
        )))
    }
}

fn split_parameters(name: &str) -> Result<(&str, Option<Vec<f64>>)> {
    let Some(start) = name.find('{') else {
        return Ok((name, None));
    };
    if !name.ends_with('}') {
        bail!(ValidationError::new(format!(
            "Missing closing bracket for parameterisation of '{}'",
            name
        )));
    }
    let params = parse_floats(&name[start + 1..name.len() - 1]).map_err(|_| {
        ValidationError::new(format!("Unable to parse parameters of model '{}'", name))
    })?;
    Ok((&name[..start], Some(params)))
}

pub(crate) fn parse_floats(text: &str) -> std::result::Result<Vec<f64>, std::num::ParseFloatError> {
    text.split(',').map(|v| v.trim().parse::<f64>()).collect()
}

pub(crate) fn format_floats(values: &[f64]) -> String {
    values.iter().join(",")
}

impl Display for SubstitutionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = |params: &Option<Vec<f64>>| match params {
            Some(values) if !values.is_empty() => format!("{{{}}}", format_floats(values)),
            _ => String::new(),
        };
        match self {
            SubstitutionModel::Dna { model, params: p } => write!(f, "{}{}", model, params(p)),
            SubstitutionModel::Lie {
                model,
                pairing,
                params: p,
            } => {
                if let Some(pairing) = pairing {
                    write!(f, "{}", pairing)?;
                }
                write!(f, "{}{}", model, params(p))
            }
            SubstitutionModel::Aa(model) => write!(f, "{}", model),
        }
    }
}
