//! Named, equal-length sequences exchanged with the engine.
use std::path::Path;

use anyhow::bail;
use bio::alphabets;
use bio::io::fasta;
use itertools::Itertools;
use log::info;

use crate::errors::{ParseIqTreeError, ValidationError};
use crate::Result;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alignment {
    names: Vec<String>,
    seqs: Vec<String>,
}

impl Alignment {
    /// Names must be unique and all sequences the same length.
    pub fn new<N: Into<String>, S: Into<String>>(
        names: impl IntoIterator<Item = N>,
        seqs: impl IntoIterator<Item = S>,
    ) -> Result<Self> {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let seqs: Vec<String> = seqs.into_iter().map(Into::into).collect();
        if names.len() != seqs.len() {
            bail!(ValidationError::new(format!(
                "Got {} names for {} sequences",
                names.len(),
                seqs.len()
            )));
        }
        if let Some(name) = names.iter().duplicates().next() {
            bail!(ValidationError::new(format!(
                "Duplicate sequence name '{}'",
                name
            )));
        }
        if let Some(first) = seqs.first() {
            if let Some(i) = seqs.iter().position(|s| s.len() != first.len()) {
                bail!(ValidationError::new(format!(
                    "Sequence '{}' has length {}, expected {}",
                    names[i],
                    seqs[i].len(),
                    first.len()
                )));
            }
        }
        Ok(Self { names, seqs })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn seqs(&self) -> &[String] {
        &self.seqs
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.seqs[i].as_str())
    }

    /// Number of sequences.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn seq_len(&self) -> usize {
        self.seqs.first().map_or(0, String::len)
    }

    pub fn from_records(records: &[fasta::Record]) -> Result<Self> {
        let mut alphabet = alphabets::protein::iupac_alphabet();
        alphabet.insert(b'-');
        let mut names = Vec::with_capacity(records.len());
        let mut seqs = Vec::with_capacity(records.len());
        for rec in records {
            if let Err(e) = rec.check() {
                bail!(ValidationError::new(e));
            }
            if !alphabet.is_word(rec.seq()) {
                bail!(ValidationError::new(format!(
                    "Sequence '{}' is not a valid genetic sequence",
                    rec.id()
                )));
            }
            names.push(match rec.desc() {
                Some(desc) => format!("{} {}", rec.id(), desc),
                None => rec.id().to_string(),
            });
            seqs.push(String::from_utf8_lossy(rec.seq()).into_owned());
        }
        Alignment::new(names, seqs)
    }

    pub fn to_records(&self) -> Vec<fasta::Record> {
        self.names
            .iter()
            .zip(&self.seqs)
            .map(|(name, seq)| fasta::Record::with_attrs(name, None, seq.as_bytes()))
            .collect()
    }

    pub fn read_fasta(path: &Path) -> Result<Self> {
        info!("Reading sequences from {}.", path.display());
        let reader = fasta::Reader::from_file(path)?;
        let mut records = Vec::new();
        for result in reader.records() {
            records.push(result?);
        }
        Alignment::from_records(&records)
    }

    pub fn write_fasta(&self, path: &Path) -> Result<()> {
        let mut writer = fasta::Writer::to_file(path)?;
        for rec in self.to_records() {
            writer.write_record(&rec)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Reads FASTA text produced by the engine.
    pub fn from_fasta_str(text: &str) -> Result<Self> {
        let reader = fasta::Reader::new(text.as_bytes());
        let mut records = Vec::new();
        for result in reader.records() {
            match result {
                Ok(rec) => records.push(rec),
                Err(e) => bail!(ParseIqTreeError::new(format!(
                    "Unable to read alignment produced by IQ-TREE: {}",
                    e
                ))),
            }
        }
        Alignment::from_records(&records)
    }

    pub fn to_fasta_string(&self) -> Result<String> {
        let mut buffer = Vec::new();
        {
            let mut writer = fasta::Writer::new(&mut buffer);
            for rec in self.to_records() {
                writer.write_record(&rec)?;
            }
            writer.flush()?;
        }
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
#[cfg_attr(coverage, coverage(off))]
mod tests;
