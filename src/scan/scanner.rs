use super::matcher::{MatchStrategy, PeptideMatcher};
use crate::errors::{PepSeekError, Result};
use crate::models::{PartitionTask, PeptideSet, PresenceVector};
use crate::protein::fasta::SequenceSource;
use indicatif::ProgressBar;
use log::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

const PROGRESS_EVERY: u64 = 4096;

/// Shared stop flag, checked between records.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Unit of work handed to the orchestrator's pool.
///
/// Implemented by [`PartitionScanner`]; the orchestrator only needs
/// something that turns a task into a presence vector.
pub trait PartitionWorker: Send + Sync {
    fn scan(
        &self,
        task: PartitionTask,
        cancel: &CancelToken,
        progress: &ProgressBar,
    ) -> Result<PresenceVector>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanStats {
    pub records_read: u64,
    pub records_tested: u64,
}

/// Streams the whole source and tests only the records of one stripe.
pub struct PartitionScanner<S: SequenceSource> {
    source: S,
    peptides: PeptideSet,
    strategy: MatchStrategy,
}

impl<S: SequenceSource> PartitionScanner<S> {
    pub fn new(source: S, peptides: PeptideSet, strategy: MatchStrategy) -> Self {
        Self {
            source,
            peptides,
            strategy,
        }
    }

    /// Scans with no progress reporting.
    pub fn scan_partition(
        &self,
        task: PartitionTask,
        cancel: &CancelToken,
    ) -> Result<PresenceVector> {
        self.scan_with_stats(task, cancel, &ProgressBar::hidden())
            .map(|(presence, _)| presence)
    }

    pub fn scan_with_stats(
        &self,
        task: PartitionTask,
        cancel: &CancelToken,
        progress: &ProgressBar,
    ) -> Result<(PresenceVector, ScanStats)> {
        let start = Instant::now();
        let matcher = PeptideMatcher::build(self.strategy, &self.peptides)?;
        let records = self
            .source
            .open()
            .map_err(|e| PepSeekError::DataSource(e.in_partition(task)))?;

        let mut presence = PresenceVector::new(task, &self.peptides);
        let mut stats = ScanStats::default();
        // Stream order defines the ordinal, not whatever the source reports.
        let mut ordinal: u64 = 0;

        for record in records {
            if cancel.is_cancelled() {
                debug!("{} cancelled after {} records", task, stats.records_read);
                return Err(PepSeekError::Cancelled);
            }
            let record = record.map_err(|e| PepSeekError::DataSource(e.in_partition(task)))?;
            ordinal += 1;
            stats.records_read += 1;
            if stats.records_read % PROGRESS_EVERY == 0 {
                progress.set_position(stats.records_read);
            }

            if !task.owns(ordinal) || presence.all_found() {
                continue;
            }
            stats.records_tested += 1;
            matcher.mark_matches(&record.sequence, &mut presence);
        }

        progress.set_position(stats.records_read);
        info!(
            "{} read {} records, tested {}, found {}/{} peptides in {:?}",
            task,
            stats.records_read,
            stats.records_tested,
            presence.found_count(),
            presence.len(),
            start.elapsed()
        );
        Ok((presence, stats))
    }
}

impl<S: SequenceSource> PartitionWorker for PartitionScanner<S> {
    fn scan(
        &self,
        task: PartitionTask,
        cancel: &CancelToken,
        progress: &ProgressBar,
    ) -> Result<PresenceVector> {
        self.scan_with_stats(task, cancel, progress)
            .map(|(presence, _)| presence)
    }
}
