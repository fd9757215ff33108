use crate::errors::{PepSeekError, Result};
use crate::models::{PeptideSet, PresenceVector, RowIndex};
use regex::{RegexSet, RegexSetBuilder};
use serde::{Deserialize, Serialize};

/// How a worker tests peptides against one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// `str::contains` per peptide, skipping peptides already found.
    #[default]
    Naive,
    /// One regex set of escaped literals, built once per worker.
    RegexSet,
}

const REGEX_SET_SIZE_LIMIT: usize = 1 << 30;

#[derive(Debug)]
pub enum PeptideMatcher {
    Naive(PeptideSet),
    RegexSet(RegexSet),
}

impl PeptideMatcher {
    pub fn build(strategy: MatchStrategy, peptides: &PeptideSet) -> Result<Self> {
        match strategy {
            MatchStrategy::Naive => Ok(Self::Naive(peptides.clone())),
            MatchStrategy::RegexSet => {
                let patterns = peptides.iter().map(|(_, p)| regex::escape(p));
                let set = RegexSetBuilder::new(patterns)
                    .size_limit(REGEX_SET_SIZE_LIMIT)
                    .dfa_size_limit(REGEX_SET_SIZE_LIMIT)
                    .build()
                    .map_err(|e| {
                        PepSeekError::Config(format!("could not build peptide regex set: {}", e))
                    })?;
                Ok(Self::RegexSet(set))
            }
        }
    }

    /// Marks every peptide contained in `residues`.
    pub fn mark_matches(&self, residues: &str, presence: &mut PresenceVector) {
        match self {
            PeptideMatcher::Naive(peptides) => {
                for (i, peptide) in peptides.iter() {
                    if !presence.is_found(i) && residues.contains(peptide) {
                        presence.mark_found(i);
                    }
                }
            }
            PeptideMatcher::RegexSet(set) => {
                for i in set.matches(residues).into_iter() {
                    presence.mark_found(RowIndex(i));
                }
            }
        }
    }
}
