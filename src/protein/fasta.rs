use super::models::{SequenceRecord, SequenceRecordBuilder};
use crate::errors::{DataSourceError, DataSourceErrorKind};
use log::*;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub type RecordResult = std::result::Result<SequenceRecord, DataSourceError>;
pub type RecordIter<'a> = Box<dyn Iterator<Item = RecordResult> + Send + 'a>;

/// Something every worker can open on its own, from the first record.
///
/// No cursor is shared between calls to [`SequenceSource::open`]; each call
/// restarts the stream.
pub trait SequenceSource: Send + Sync {
    fn open(&self) -> std::result::Result<RecordIter<'_>, DataSourceError>;

    fn describe(&self) -> String;
}

/// Lazy FASTA parser over any buffered reader.
///
/// Ordinals are assigned in stream order starting at 1. Records without
/// residues are still yielded so ordinals line up between readers.
/// Whitespace inside sequence lines is dropped and text before the first
/// header is skipped.
pub struct FastaReader<R: BufRead> {
    reader: R,
    source_name: String,
    line: String,
    line_number: usize,
    next_ordinal: u64,
    pending: Option<SequenceRecordBuilder>,
    finished: bool,
}

impl<R: BufRead> FastaReader<R> {
    pub fn new(reader: R, source_name: impl Into<String>) -> Self {
        Self {
            reader,
            source_name: source_name.into(),
            line: String::new(),
            line_number: 0,
            next_ordinal: 1,
            pending: None,
            finished: false,
        }
    }

    fn fail(&mut self, kind: DataSourceErrorKind) -> Option<RecordResult> {
        self.finished = true;
        Some(Err(DataSourceError::new(self.source_name.clone(), kind)))
    }
}

impl<R: BufRead> Iterator for FastaReader<R> {
    type Item = RecordResult;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        loop {
            self.line.clear();
            let read = match self.reader.read_line(&mut self.line) {
                Ok(n) => n,
                Err(e) => return self.fail(DataSourceErrorKind::Read(e)),
            };
            if read == 0 {
                self.finished = true;
                return self.pending.take().map(|b| Ok(b.build()));
            }
            self.line_number += 1;

            let line = self.line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(header) = line.strip_prefix('>') {
                let builder =
                    SequenceRecordBuilder::new(self.next_ordinal).with_header(header.trim());
                self.next_ordinal += 1;
                if let Some(done) = self.pending.replace(builder) {
                    return Some(Ok(done.build()));
                }
                continue;
            }
            match self.pending.take() {
                Some(mut builder) => {
                    for chunk in line.split_whitespace() {
                        builder = builder.append_sequence(chunk);
                    }
                    self.pending = Some(builder);
                }
                None => {
                    warn!(
                        "{}: skipping line {} before the first '>' header",
                        self.source_name, self.line_number
                    );
                }
            }
        }
    }
}

/// A FASTA file on disk, reopened for every reader.
#[derive(Debug, Clone)]
pub struct FastaFileSource {
    path: PathBuf,
}

impl FastaFileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SequenceSource for FastaFileSource {
    fn open(&self) -> std::result::Result<RecordIter<'_>, DataSourceError> {
        let file = File::open(&self.path)
            .map_err(|e| DataSourceError::new(self.describe(), DataSourceErrorKind::Open(e)))?;
        debug!("Opened {:?}", self.path);
        Ok(Box::new(FastaReader::new(BufReader::new(file), self.describe())))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Records already held in memory; every `open` walks the same slice.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    name: String,
    records: Arc<[SequenceRecord]>,
}

impl InMemorySource {
    /// Renumbers the records 1..=n in the given order.
    pub fn new(name: &str, records: Vec<SequenceRecord>) -> Self {
        let records: Vec<SequenceRecord> = records
            .into_iter()
            .enumerate()
            .map(|(i, mut r)| {
                r.ordinal = i as u64 + 1;
                r
            })
            .collect();
        Self {
            name: name.to_string(),
            records: records.into(),
        }
    }

    /// Convenience for plain residue strings, ids are `seq1`, `seq2`, ...
    pub fn from_sequences<S: AsRef<str>>(name: &str, sequences: &[S]) -> Self {
        let records = sequences
            .iter()
            .enumerate()
            .map(|(i, s)| {
                SequenceRecord::new(i as u64 + 1, &format!("seq{}", i + 1), s.as_ref())
            })
            .collect();
        Self::new(name, records)
    }

    /// Parses a whole FASTA string up front.
    pub fn from_fasta(name: &str, fasta: &str) -> std::result::Result<Self, DataSourceError> {
        let records = FastaReader::new(fasta.as_bytes(), name)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self::new(name, records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl SequenceSource for InMemorySource {
    fn open(&self) -> std::result::Result<RecordIter<'_>, DataSourceError> {
        Ok(Box::new(
            self.records
                .iter()
                .cloned()
                .map(Ok::<SequenceRecord, DataSourceError>),
        ))
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

// Tests ...
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(fasta: &str) -> Vec<SequenceRecord> {
        FastaReader::new(fasta.as_bytes(), "test")
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_fasta_parsing() {
        let dummy_fasta_string = r#">mysupercoolprotein
PEPTIDEPINK
PEPTIDEPINKPEPTIDEPINK
PEPTIDEPINK

> mysupercoolprotein2 with a description
PEPTIDEPLNK
PEPTIDEPLNK

"#;
        let records = parse(dummy_fasta_string);
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].sequence.as_ref(),
            "PEPTIDEPINKPEPTIDEPINKPEPTIDEPINKPEPTIDEPINK"
        );
        assert_eq!(records[1].sequence.as_ref(), "PEPTIDEPLNKPEPTIDEPLNK");
        assert_eq!(records[0].id, "mysupercoolprotein");
        assert_eq!(records[1].id, "mysupercoolprotein2");
        assert_eq!(records[1].description, "with a description");
        assert_eq!(records[0].ordinal, 1);
        assert_eq!(records[1].ordinal, 2);
    }

    #[test]
    fn test_empty_records_keep_their_ordinal() {
        let records = parse(">a\n>b\nAAA\n>c\n");
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].sequence.as_ref(), "");
        assert_eq!(records[1].ordinal, 2);
        assert_eq!(records[2].id, "c");
    }

    #[test]
    fn test_text_before_first_header_is_skipped() {
        let records = parse(";comment line\nstray text\n>a\nPEPTIDE\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ordinal, 1);
        assert_eq!(records[0].sequence.as_ref(), "PEPTIDE");
    }

    #[test]
    fn test_inner_whitespace_dropped_from_residues() {
        let records = parse(">a\nPEPT IDE\r\nPI\tNK \n");
        assert_eq!(records[0].sequence.as_ref(), "PEPTIDEPINK");

        let source = InMemorySource::from_fasta("mem", ">a\nPEPT IDE\n").unwrap();
        let seq: Vec<String> = source
            .open()
            .unwrap()
            .map(|r| r.unwrap().sequence.to_string())
            .collect();
        assert_eq!(seq, vec!["PEPTIDE"]);
    }

    #[test]
    fn test_file_source_reopens_from_start() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, ">one\nAAAA\n>two\nCCCC\n").unwrap();
        let source = FastaFileSource::new(file.path());
        let first: Vec<u64> = source.open().unwrap().map(|r| r.unwrap().ordinal).collect();
        let second: Vec<u64> = source.open().unwrap().map(|r| r.unwrap().ordinal).collect();
        assert_eq!(first, vec![1, 2]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_file_is_open_error() {
        let source = FastaFileSource::new("/definitely/not/here.fasta");
        let opened = source.open();
        match opened {
            Err(DataSourceError {
                kind: DataSourceErrorKind::Open(_),
                ..
            }) => {}
            Err(other) => panic!("Expected open error, got {:?}", other),
            Ok(_) => panic!("Expected open error, got a reader"),
        };
    }

    #[test]
    fn test_in_memory_from_fasta() {
        let source = InMemorySource::from_fasta("mem", ">x\nAAA\n>y\nBBB\n").unwrap();
        assert_eq!(source.len(), 2);
        let ids: Vec<String> = source.open().unwrap().map(|r| r.unwrap().id).collect();
        assert_eq!(ids, vec!["x", "y"]);
    }
}
