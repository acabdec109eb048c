use assert_matches::assert_matches;
use rstest::rstest;

use crate::downcast_error;
use crate::errors::ValidationError;
use crate::model::{
    available_freq_types, available_models, available_rate_types, make_model, AaModel, DnaModel,
    FreqType, InvariableSites, LieModel, LiePairing, Model, ModelFamily, ModelType, RateModel,
    RateType, SubstitutionModel,
};

#[rstest]
#[case::plain("GTR")]
#[case::freq("HKY+FO")]
#[case::invariable("JC+I")]
#[case::proportion("K80+I{0.25}")]
#[case::gamma("GTR+F+I+G4")]
#[case::gamma_alpha("TN+G8{0.5}")]
#[case::free_rate("SYM+FQ+R6")]
#[case::custom_freqs("GTR+F{0.1,0.2,0.3,0.4}+R")]
#[case::dna_params("HKY{2.5}+F")]
#[case::lie("RY3.3b+I+G")]
#[case::lie_params("WS6.6{0.5,0.2}")]
#[case::protein("Q.pfam+G4")]
fn model_string_round_trip(#[case] model: &str) {
    assert_eq!(make_model(model).unwrap().to_string(), model);
}

#[test]
fn components_parsed() {
    let model = make_model("GTR+FO+I{0.2}+G8{0.5}").unwrap();
    assert_eq!(model.substitution, DnaModel::GTR.into());
    assert_eq!(model.freq_type, Some(FreqType::FO));
    assert!(model.invariable_sites());
    assert_eq!(model.proportion_invariable_sites(), Some(0.2));
    assert_eq!(
        model.rate_model(),
        Some(&RateModel::Gamma {
            categories: Some(8),
            alpha: Some(0.5)
        })
    );
    assert_eq!(model.model_type(), ModelType::Nucleotide);
}

#[test]
fn invariable_sites_after_rate_model() {
    let model: Model = "HKY+G4+I".parse().unwrap();
    assert_eq!(model.to_string(), "HKY+I+G4");
}

#[test]
fn negative_categories_left_to_engine() {
    let model = make_model("GTR+G-4").unwrap();
    assert_eq!(model.rate_model().unwrap().categories(), Some(-4));
    let model = make_model("GTR+R0").unwrap();
    assert_eq!(model.rate_model().unwrap().categories(), Some(0));
}

#[rstest]
#[case::two_freqs("GTR+F+FO", "Model 'GTR+F+FO' contains multiple base frequency specifications.")]
#[case::two_invariable("GTR+I+I{0.1}", "Model 'GTR+I+I{0.1}' contains multiple specifications for invariable sites.")]
#[case::two_rates("GTR+G+R", "Model 'GTR+G+R' contains multiple rate heterogeneity specifications.")]
#[case::unexpected("GTR+X", "Model 'GTR+X' contains unexpected component.")]
#[case::unknown_model("XYZ", "Unknown substitution model: 'XYZ'")]
#[case::empty("", "Unknown substitution model: ''")]
#[case::proportion_range("GTR+I{1.5}", "The proportion of invariable sites must be in the range [0,1)")]
#[case::bad_categories("GTR+Gx", "Invalid specification for rate categories 'Gx'")]
#[case::bad_freqs("GTR+F{0.5,0.5}", "Custom state frequencies must have 4 or 20 values, got 2")]
fn invalid_models(#[case] model: &str, #[case] message: &str) {
    let result = make_model(model);
    assert_eq!(downcast_error::<ValidationError>(&result).message(), message);
}

#[test]
fn substitution_lookup_order() {
    assert_eq!(
        SubstitutionModel::parse("LG").unwrap(),
        SubstitutionModel::Aa(AaModel::LG)
    );
    assert_matches!(
        SubstitutionModel::parse("MK12.12").unwrap(),
        SubstitutionModel::Lie {
            model: LieModel::Lie12_12,
            pairing: Some(LiePairing::MK),
            params: None
        }
    );
    assert_matches!(
        SubstitutionModel::parse("GTR{1,2,3,4,5}").unwrap(),
        SubstitutionModel::Dna { model: DnaModel::GTR, params: Some(ref p) } if p.len() == 5
    );
}

#[test]
fn lie_description_mentions_pairing() {
    let model = SubstitutionModel::parse("WS3.3b").unwrap();
    assert!(model
        .description()
        .ends_with("Pairing: weak-strong pairing."));
    assert_eq!(model.lie_model(), Some(LieModel::Lie3_3b));
}

#[test]
fn model_tables() {
    let lie_rows = LieModel::ALL.len() * 4;
    assert_eq!(
        available_models(ModelFamily::Dna).len(),
        DnaModel::ALL.len() + lie_rows
    );
    let protein = available_models(ModelFamily::Protein);
    assert_eq!(protein.len(), AaModel::ALL.len());
    assert!(protein.iter().all(|m| m.model_type == ModelType::Protein));
    assert_eq!(
        available_models(ModelFamily::All).len(),
        DnaModel::ALL.len() + lie_rows + AaModel::ALL.len()
    );
    assert!(available_models(ModelFamily::Dna)
        .iter()
        .any(|m| m.abbreviation == "RY10.34"));
}

#[test]
fn option_tables() {
    let freqs = available_freq_types();
    assert_eq!(
        freqs.iter().map(|(f, _)| f.as_str()).collect::<Vec<_>>(),
        vec!["F", "FO", "FQ"]
    );
    let rates = available_rate_types();
    assert_eq!(
        rates.iter().map(|(r, _)| r.as_str()).collect::<Vec<_>>(),
        vec!["", "I", "G", "I+G", "R", "I+R"]
    );
    assert!(rates[3].1.contains("Gu et al., 1995"));
}

#[test]
fn built_model_renders() {
    let rate = RateType::new(InvariableSites::Proportion(0.1), Some(RateModel::free_rate())).unwrap();
    let model = Model::new(AaModel::WAG)
        .with_freq_type(FreqType::F)
        .with_rate_type(rate);
    assert_eq!(model.to_string(), "WAG+F+I{0.1}+R");
    assert_eq!(model.model_type(), ModelType::Protein);
}

#[test]
fn family_parsed() {
    assert_eq!("DNA".parse::<ModelFamily>().unwrap(), ModelFamily::Dna);
    assert!("rna".parse::<ModelFamily>().is_err());
}
