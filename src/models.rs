use crate::errors::{PepSeekError, Result};
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Stable 0-based position of a peptide inside a [`PeptideSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RowIndex(pub usize);

impl fmt::Display for RowIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The ordered, de-duplicated query peptides of one run.
///
/// Row indices follow first-seen order and never change once the set is built.
/// The `index_space` fingerprint is derived from the contents, so every
/// presence vector can be checked against the set it was computed for.
#[derive(Debug, Clone)]
pub struct PeptideSet {
    peptides: Arc<[Arc<str>]>,
    index_space: u64,
}

impl PeptideSet {
    /// Builds the set keeping the first occurrence of every peptide.
    pub fn new<I, S>(peptides: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let peptides: Vec<Arc<str>> = peptides
            .into_iter()
            .filter_map(|p| {
                let p = p.as_ref();
                if seen.insert(p.to_string()) {
                    Some(Arc::from(p))
                } else {
                    None
                }
            })
            .collect();

        let mut hasher = DefaultHasher::new();
        peptides.len().hash(&mut hasher);
        for p in peptides.iter() {
            p.hash(&mut hasher);
        }

        Self {
            peptides: peptides.into(),
            index_space: hasher.finish(),
        }
    }

    pub fn len(&self) -> usize {
        self.peptides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peptides.is_empty()
    }

    pub fn get(&self, index: RowIndex) -> Option<&str> {
        self.peptides.get(index.0).map(|p| p.as_ref())
    }

    pub fn index_space(&self) -> u64 {
        self.index_space
    }

    pub fn iter(&self) -> impl Iterator<Item = (RowIndex, &str)> {
        self.peptides
            .iter()
            .enumerate()
            .map(|(i, p)| (RowIndex(i), p.as_ref()))
    }
}

/// One worker's unit of work: stripe `worker_index` out of `worker_count`.
///
/// Both numbers are 1-based, `1 <= worker_index <= worker_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PartitionTask {
    worker_index: usize,
    worker_count: usize,
}

impl PartitionTask {
    pub fn new(worker_index: usize, worker_count: usize) -> Result<Self> {
        if worker_count == 0 {
            return Err(PepSeekError::Config(
                "worker count must be at least 1".to_string(),
            ));
        }
        if worker_index == 0 || worker_index > worker_count {
            return Err(PepSeekError::Config(format!(
                "worker index {} outside 1..={}",
                worker_index, worker_count
            )));
        }
        Ok(Self {
            worker_index,
            worker_count,
        })
    }

    /// All tasks of a run with `worker_count` workers, in worker order.
    pub fn all(worker_count: usize) -> Result<Vec<Self>> {
        (1..=worker_count.max(1))
            .map(|k| Self::new(k, worker_count))
            .collect()
    }

    pub fn worker_index(&self) -> usize {
        self.worker_index
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }
}

impl fmt::Display for PartitionTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker {}/{}", self.worker_index, self.worker_count)
    }
}

/// Per-worker "found in my partition" flags, one per peptide row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceVector {
    task: PartitionTask,
    index_space: u64,
    flags: Vec<bool>,
    found: usize,
}

impl PresenceVector {
    /// All-absent vector sized for `peptides`.
    pub fn new(task: PartitionTask, peptides: &PeptideSet) -> Self {
        Self {
            task,
            index_space: peptides.index_space(),
            flags: vec![false; peptides.len()],
            found: 0,
        }
    }

    /// Assembles a vector from raw flags. The reducer validates the shape.
    pub fn from_flags(task: PartitionTask, index_space: u64, flags: Vec<bool>) -> Self {
        let found = flags.iter().filter(|&&x| x).count();
        Self {
            task,
            index_space,
            flags,
            found,
        }
    }

    pub fn task(&self) -> PartitionTask {
        self.task
    }

    pub fn index_space(&self) -> u64 {
        self.index_space
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn is_found(&self, index: RowIndex) -> bool {
        self.flags.get(index.0).copied().unwrap_or(false)
    }

    pub fn mark_found(&mut self, index: RowIndex) {
        if !std::mem::replace(&mut self.flags[index.0], true) {
            self.found += 1;
        }
    }

    pub fn found_count(&self) -> usize {
        self.found
    }

    pub fn all_found(&self) -> bool {
        self.found == self.flags.len()
    }

    pub fn flags(&self) -> &[bool] {
        &self.flags
    }
}

/// OR of all workers' presence vectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalPresence {
    index_space: u64,
    flags: Vec<bool>,
}

impl GlobalPresence {
    pub(crate) fn new(index_space: u64, flags: Vec<bool>) -> Self {
        Self { index_space, flags }
    }

    pub fn index_space(&self) -> u64 {
        self.index_space
    }

    pub fn flags(&self) -> &[bool] {
        &self.flags
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Rows with no match anywhere, ascending.
    pub fn unknown_indices(&self) -> Vec<RowIndex> {
        self.flags
            .iter()
            .enumerate()
            .filter(|(_, &found)| !found)
            .map(|(i, _)| RowIndex(i))
            .collect()
    }

    pub fn known_count(&self) -> usize {
        self.flags.iter().filter(|&&x| x).count()
    }

    pub fn unknown_count(&self) -> usize {
        self.flags.len() - self.known_count()
    }

    /// Resolves the unknown rows to their peptide strings.
    pub fn unknown_peptides<'a>(&self, peptides: &'a PeptideSet) -> Vec<&'a str> {
        self.unknown_indices()
            .into_iter()
            .filter_map(|i| peptides.get(i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peptide_set_dedup_keeps_first_seen_order() {
        let set = PeptideSet::new(["PEPTIDE", "AAA", "PEPTIDE", "BBB", "AAA"]);
        assert_eq!(set.len(), 3);
        let got: Vec<&str> = set.iter().map(|(_, p)| p).collect();
        assert_eq!(got, vec!["PEPTIDE", "AAA", "BBB"]);
        assert_eq!(set.get(RowIndex(2)), Some("BBB"));
        assert_eq!(set.get(RowIndex(3)), None);
    }

    #[test]
    fn test_index_space_depends_on_order() {
        let a = PeptideSet::new(["AAA", "BBB"]);
        let b = PeptideSet::new(["BBB", "AAA"]);
        let c = PeptideSet::new(["AAA", "BBB"]);
        assert_ne!(a.index_space(), b.index_space());
        assert_eq!(a.index_space(), c.index_space());
    }

    #[test]
    fn test_partition_task_bounds() {
        assert!(PartitionTask::new(1, 1).is_ok());
        assert!(PartitionTask::new(4, 4).is_ok());
        assert!(PartitionTask::new(0, 4).is_err());
        assert!(PartitionTask::new(5, 4).is_err());
        assert!(PartitionTask::new(1, 0).is_err());
        let all = PartitionTask::all(3).unwrap();
        let idx: Vec<usize> = all.iter().map(|t| t.worker_index()).collect();
        assert_eq!(idx, vec![1, 2, 3]);
    }

    #[test]
    fn test_global_unknowns_ascending() {
        let global = GlobalPresence::new(0, vec![true, false, true, false, false]);
        assert_eq!(
            global.unknown_indices(),
            vec![RowIndex(1), RowIndex(3), RowIndex(4)]
        );
        assert_eq!(global.known_count(), 2);
        assert_eq!(global.unknown_count(), 3);
    }
}
