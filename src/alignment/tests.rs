use rstest::rstest;
use tempfile::tempdir;

use crate::alignment::Alignment;
use crate::downcast_error;
use crate::errors::ValidationError;

fn primates() -> Alignment {
    Alignment::new(
        ["human", "chimp", "gorilla"],
        ["ACGT-A", "ACGTTA", "ACCTTA"],
    )
    .unwrap()
}

#[test]
fn accessors() {
    let aln = primates();
    assert_eq!(aln.len(), 3);
    assert_eq!(aln.names(), ["human", "chimp", "gorilla"]);
    assert_eq!(aln.seqs()[2], "ACCTTA");
    assert_eq!(aln.seq_len(), 6);
    assert_eq!(aln.get("chimp"), Some("ACGTTA"));
    assert_eq!(aln.get("bonobo"), None);
}

#[rstest]
#[case::count(vec!["a", "b"], vec!["AC"], "Got 2 names for 1 sequences")]
#[case::duplicate(vec!["a", "a"], vec!["AC", "AG"], "Duplicate sequence name 'a'")]
#[case::duplicate_apart(vec!["a", "b", "c", "b"], vec!["AC", "AG", "AT", "AA"], "Duplicate sequence name 'b'")]
#[case::ragged(vec!["a", "b"], vec!["AC", "ACG"], "Sequence 'b' has length 3, expected 2")]
fn rejected(#[case] names: Vec<&str>, #[case] seqs: Vec<&str>, #[case] message: &str) {
    let result = Alignment::new(names, seqs);
    assert_eq!(downcast_error::<ValidationError>(&result).message(), message);
}

#[test]
fn fasta_file_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("primates.fasta");
    let aln = primates();
    aln.write_fasta(&path).unwrap();
    assert_eq!(Alignment::read_fasta(&path).unwrap(), aln);
}

#[test]
fn wrapped_fasta_text() {
    let aln = Alignment::from_fasta_str(">t1\nACGT\nAC\n>t2\nTTGA\nCC\n").unwrap();
    assert_eq!(aln.names(), ["t1", "t2"]);
    assert_eq!(aln.seqs(), ["ACGTAC", "TTGACC"]);
}

#[test]
fn fasta_text_written() {
    let text = primates().to_fasta_string().unwrap();
    assert!(text.starts_with(">human\nACGT-A\n>chimp\n"));
}

#[test]
fn invalid_characters() {
    let result = Alignment::from_fasta_str(">t1\nAC#T\n");
    assert!(downcast_error::<ValidationError>(&result)
        .message()
        .contains("'t1'"));
}
