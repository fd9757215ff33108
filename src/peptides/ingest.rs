use crate::errors::{PepSeekError, Result};
use crate::models::{PeptideSet, RowIndex};
use csv::{ReaderBuilder, StringRecord};
use log::*;
use regex::Regex;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Instant;

pub const DEFAULT_PEPTIDE_COLUMN: &str = "Peptide";

const AMINO_ACIDS: &str = "ACDEFGHIKLMNPQRSTVWY";

fn annotation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\([^()]*\)").expect("annotation pattern is valid"))
}

/// Strips modification annotations and flank separators from a search-engine peptide.
///
/// Example:
/// ```
/// use pepseek::peptides::ingest::clean_peptide;
/// assert_eq!(clean_peptide("K.PEP(+15.99)TIDE.R"), "KPEPTIDER");
/// assert_eq!(clean_peptide(" PEPT(+79.97)IDE "), "PEPTIDE");
/// ```
pub fn clean_peptide(raw: &str) -> String {
    let no_annotations = annotation_pattern().replace_all(raw, "");
    no_annotations.replace('.', "").trim().to_string()
}

/// The query table: the header, every surviving row, and its peptides.
///
/// Rows are unique on the cleaned peptide column, first occurrence kept,
/// so row `i` here is row `i` of the [`PeptideSet`].
#[derive(Debug, Clone)]
pub struct PeptideTable {
    headers: StringRecord,
    rows: Vec<StringRecord>,
    peptides: PeptideSet,
}

impl PeptideTable {
    pub fn from_csv_path<P: AsRef<Path>>(path: P, column: &str) -> Result<Self> {
        let path = path.as_ref();
        let start = Instant::now();
        let reader = ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|e| PepSeekError::Ingest {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        let table = Self::from_csv_reader(reader, column).map_err(|e| match e {
            PepSeekError::Ingest { reason, .. } => PepSeekError::Ingest {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })?;
        info!(
            "Read {} unique peptides from {:?} in {:?}",
            table.len(),
            path,
            start.elapsed()
        );
        Ok(table)
    }

    pub fn from_csv_reader<R: Read>(mut reader: csv::Reader<R>, column: &str) -> Result<Self> {
        let headers = reader.headers()?.clone();
        let peptide_column = headers
            .iter()
            .position(|h| h.trim() == column)
            .ok_or_else(|| PepSeekError::Ingest {
                path: Default::default(),
                reason: format!("no '{}' column in header {:?}", column, headers),
            })?;

        let mut seen = HashSet::new();
        let mut rows = Vec::new();
        let mut duplicates = 0;
        for record in reader.records() {
            let record = record?;
            let raw = record.get(peptide_column).unwrap_or_default();
            let peptide = clean_peptide(raw);
            if !seen.insert(peptide.clone()) {
                duplicates += 1;
                continue;
            }
            if let Some(bad) = peptide.chars().find(|c| !AMINO_ACIDS.contains(*c)) {
                warn!("Peptide {:?} contains non amino acid residue {:?}", peptide, bad);
            }
            let cleaned: StringRecord = record
                .iter()
                .enumerate()
                .map(|(i, field)| {
                    if i == peptide_column {
                        peptide.as_str()
                    } else {
                        field
                    }
                })
                .collect();
            rows.push(cleaned);
        }
        debug!("Dropped {} duplicate peptide rows", duplicates);

        let peptides = PeptideSet::new(
            rows.iter()
                .map(|r| r.get(peptide_column).unwrap_or_default()),
        );
        Ok(Self {
            headers,
            rows,
            peptides,
        })
    }

    pub fn headers(&self) -> &StringRecord {
        &self.headers
    }

    pub fn row(&self, index: RowIndex) -> Option<&StringRecord> {
        self.rows.get(index.0)
    }

    pub fn peptide_set(&self) -> &PeptideSet {
        &self.peptides
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
