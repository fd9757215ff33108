use super::reduction::PresenceReducer;
use super::scanner::{CancelToken, PartitionWorker};
use crate::errors::{DataSourceError, DataSourceErrorKind, PepSeekError, Result};
use crate::models::{GlobalPresence, PartitionTask, PeptideSet, PresenceVector};
use crossbeam_channel::RecvTimeoutError;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::*;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

type WorkerOutcome = std::thread::Result<Result<PresenceVector>>;

/// Scatter/gather driver: one pool task per partition, one fan-in channel.
#[derive(Debug, Clone)]
pub struct ScanOrchestrator {
    worker_count: usize,
    timeout: Option<Duration>,
    progress: bool,
}

impl ScanOrchestrator {
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count,
            timeout: None,
            progress: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    fn progress_bars(&self, tasks: &[PartitionTask]) -> (MultiProgress, Vec<ProgressBar>) {
        let target = if self.progress {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        let multi = MultiProgress::with_draw_target(target);
        let style = ProgressStyle::with_template("{spinner} {prefix}: {pos} records [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        let bars = tasks
            .iter()
            .map(|task| {
                let bar = multi.add(ProgressBar::new_spinner());
                bar.set_style(style.clone());
                bar.set_prefix(task.to_string());
                if self.progress {
                    bar.enable_steady_tick(Duration::from_millis(200));
                }
                bar
            })
            .collect();
        (multi, bars)
    }

    /// Runs every partition and reduces the results.
    ///
    /// The first worker failure cancels the others and is returned as is.
    /// A crashed or cancelled worker yields [`PepSeekError::PartialResult`], an expired
    /// timeout a [`DataSourceErrorKind::TimedOut`] error.
    pub fn run<W>(&self, worker: Arc<W>, peptides: &PeptideSet) -> Result<GlobalPresence>
    where
        W: PartitionWorker + 'static,
    {
        let start = Instant::now();
        let tasks = PartitionTask::all(self.worker_count)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.worker_count)
            .thread_name(|i| format!("pepseek-scan-{}", i + 1))
            .build()
            .map_err(|e| PepSeekError::Config(format!("could not build worker pool: {}", e)))?;
        info!(
            "Scanning {} peptides with {} workers",
            peptides.len(),
            self.worker_count
        );

        let (sender, receiver) =
            crossbeam_channel::bounded::<(PartitionTask, WorkerOutcome)>(self.worker_count);
        let cancel = CancelToken::new();
        let (_multi, bars) = self.progress_bars(&tasks);

        for (task, bar) in tasks.into_iter().zip(bars) {
            let worker = Arc::clone(&worker);
            let sender = sender.clone();
            let cancel = cancel.clone();
            pool.spawn(move || {
                debug!("{} started", task);
                let outcome = catch_unwind(AssertUnwindSafe(|| worker.scan(task, &cancel, &bar)));
                bar.finish();
                // The receiver is gone once the run has already failed.
                let _ = sender.send((task, outcome));
            });
        }
        drop(sender);

        let deadline = self.timeout.map(|t| start + t);
        let mut reducer = PresenceReducer::new(peptides, self.worker_count);

        while reducer.received_count() < self.worker_count {
            let received = match deadline {
                Some(deadline) => receiver.recv_deadline(deadline),
                None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok((task, Ok(Ok(presence)))) => {
                    debug!(
                        "{} returned {}/{} found",
                        task,
                        presence.found_count(),
                        presence.len()
                    );
                    if let Err(e) = reducer.fold(presence) {
                        cancel.cancel();
                        return Err(e);
                    }
                }
                Ok((task, Ok(Err(e)))) if e.is_cancellation() => {
                    // Stopped without a result; its partition is missing.
                    warn!("{} stopped before finishing", task);
                    cancel.cancel();
                    return Err(self.partial_result(&reducer));
                }
                Ok((task, Ok(Err(e)))) => {
                    error!("{} failed: {}", task, e);
                    cancel.cancel();
                    return Err(e);
                }
                Ok((task, Err(_panic))) => {
                    error!("{} crashed, aborting the run", task);
                    cancel.cancel();
                    return Err(self.partial_result(&reducer));
                }
                Err(RecvTimeoutError::Timeout) => {
                    cancel.cancel();
                    let pending = reducer.missing_workers();
                    error!("Timed out waiting for workers {:?}", pending);
                    return Err(DataSourceError::new(
                        "worker pool",
                        DataSourceErrorKind::TimedOut {
                            waited: start.elapsed(),
                            pending,
                        },
                    )
                    .into());
                }
                Err(RecvTimeoutError::Disconnected) => {
                    cancel.cancel();
                    return Err(self.partial_result(&reducer));
                }
            }
        }

        let global = reducer.finish()?;
        info!(
            "Scan finished in {:?}: {} known, {} unknown",
            start.elapsed(),
            global.known_count(),
            global.unknown_count()
        );
        Ok(global)
    }

    fn partial_result(&self, reducer: &PresenceReducer) -> PepSeekError {
        PepSeekError::PartialResult {
            expected: self.worker_count,
            received: reducer.received_count(),
            missing: reducer.missing_workers(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protein::fasta::{FastaFileSource, InMemorySource};
    use crate::scan::matcher::MatchStrategy;
    use crate::scan::scanner::PartitionScanner;

    fn in_memory_scanner(
        sequences: &[&str],
        peptides: &PeptideSet,
    ) -> Arc<PartitionScanner<InMemorySource>> {
        Arc::new(PartitionScanner::new(
            InMemorySource::from_sequences("mem", sequences),
            peptides.clone(),
            MatchStrategy::Naive,
        ))
    }

    /// Deterministic pseudo-random residues from a linear congruential generator.
    fn synthetic_database(n_records: usize, seed: u64) -> Vec<String> {
        const ALPHABET: &[u8] = b"ACDEFGHIKLMNPQRSTVWY";
        let mut state = seed;
        (0..n_records)
            .map(|i| {
                let len = 20 + (i * 7) % 60;
                (0..len)
                    .map(|_| {
                        state = state
                            .wrapping_mul(6364136223846793005)
                            .wrapping_add(1442695040888963407);
                        ALPHABET[((state >> 33) % ALPHABET.len() as u64) as usize] as char
                    })
                    .collect()
            })
            .collect()
    }

    struct CrashingWorker {
        inner: PartitionScanner<InMemorySource>,
        crash_on: usize,
    }

    impl PartitionWorker for CrashingWorker {
        fn scan(
            &self,
            task: PartitionTask,
            cancel: &CancelToken,
            progress: &ProgressBar,
        ) -> Result<PresenceVector> {
            if task.worker_index() == self.crash_on {
                panic!("simulated crash in {}", task);
            }
            self.inner.scan(task, cancel, progress)
        }
    }

    struct StalledWorker;

    impl PartitionWorker for StalledWorker {
        fn scan(
            &self,
            task: PartitionTask,
            cancel: &CancelToken,
            _progress: &ProgressBar,
        ) -> Result<PresenceVector> {
            while !cancel.is_cancelled() {
                std::thread::sleep(Duration::from_millis(5));
            }
            debug!("{} stopping", task);
            Err(PepSeekError::Cancelled)
        }
    }

    /// Gives up on one partition as if it had been cancelled from outside.
    struct QuittingWorker {
        inner: PartitionScanner<InMemorySource>,
        quit_on: usize,
    }

    impl PartitionWorker for QuittingWorker {
        fn scan(
            &self,
            task: PartitionTask,
            cancel: &CancelToken,
            progress: &ProgressBar,
        ) -> Result<PresenceVector> {
            if task.worker_index() == self.quit_on {
                return Err(PepSeekError::Cancelled);
            }
            self.inner.scan(task, cancel, progress)
        }
    }

    #[test]
    fn test_scenario_a() {
        let peptides = PeptideSet::new(["AAA", "BBB", "CCC"]);
        let scanner = in_memory_scanner(&["XXAAAYY"], &peptides);
        for w in [1, 2, 4] {
            let global = ScanOrchestrator::new(w).run(scanner.clone(), &peptides).unwrap();
            assert_eq!(global.flags(), &[true, false, false], "W={}", w);
            assert_eq!(global.unknown_peptides(&peptides), vec!["BBB", "CCC"]);
        }
    }

    #[test]
    fn test_scenario_b() {
        let peptides = PeptideSet::new(["PEP"]);
        let scanner = in_memory_scanner(&["AAAA", "CCCC", "DDDD", "PEEP", "EPPE"], &peptides);
        let global = ScanOrchestrator::new(4).run(scanner, &peptides).unwrap();
        assert_eq!(global.flags(), &[false]);
        assert_eq!(global.unknown_peptides(&peptides), vec!["PEP"]);
    }

    #[test]
    fn test_worker_count_does_not_change_unknowns() {
        let database = synthetic_database(97, 42);
        let records: Vec<&str> = database.iter().map(|s| s.as_str()).collect();
        // Half the peptides are cut from the database, half are invented.
        let mut queries: Vec<String> = database
            .iter()
            .step_by(5)
            .map(|s| s[3..9].to_string())
            .collect();
        queries.extend(synthetic_database(20, 7).into_iter().map(|s| s[..8].to_string()));
        let peptides = PeptideSet::new(&queries);
        let scanner = in_memory_scanner(&records, &peptides);

        let reference = ScanOrchestrator::new(1).run(scanner.clone(), &peptides).unwrap();
        assert!(reference.known_count() >= 15);
        for w in [2, 3, 4, 7, 16] {
            let got = ScanOrchestrator::new(w).run(scanner.clone(), &peptides).unwrap();
            assert_eq!(
                got.unknown_indices(),
                reference.unknown_indices(),
                "W={} disagrees with W=1",
                w
            );
        }
        // Re-running with the same settings is stable.
        let again = ScanOrchestrator::new(4).run(scanner, &peptides).unwrap();
        assert_eq!(again, reference);
    }

    #[test]
    fn test_regex_strategy_matches_naive_end_to_end() {
        let database = synthetic_database(40, 3);
        let records: Vec<&str> = database.iter().map(|s| s.as_str()).collect();
        let queries: Vec<String> = database.iter().map(|s| s[5..11].to_string()).collect();
        let peptides = PeptideSet::new(queries.iter().chain(["WWWWWWWW".to_string()].iter()));

        let naive = in_memory_scanner(&records, &peptides);
        let regex = Arc::new(PartitionScanner::new(
            InMemorySource::from_sequences("mem", &records[..]),
            peptides.clone(),
            MatchStrategy::RegexSet,
        ));
        let a = ScanOrchestrator::new(3).run(naive, &peptides).unwrap();
        let b = ScanOrchestrator::new(3).run(regex, &peptides).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.unknown_peptides(&peptides), vec!["WWWWWWWW"]);
    }

    #[test]
    fn test_missing_database_aborts_run() {
        let peptides = PeptideSet::new(["PEP"]);
        let scanner = Arc::new(PartitionScanner::new(
            FastaFileSource::new("/no/such/db.fasta"),
            peptides.clone(),
            MatchStrategy::Naive,
        ));
        let res = ScanOrchestrator::new(4).run(scanner, &peptides);
        assert!(
            matches!(res, Err(PepSeekError::DataSource(_))),
            "Expected data source error, got {:?}",
            res
        );
    }

    #[test]
    fn test_crashed_worker_is_partial_result() {
        let peptides = PeptideSet::new(["AAA", "CCC"]);
        let worker = Arc::new(CrashingWorker {
            inner: PartitionScanner::new(
                InMemorySource::from_sequences("mem", &["AAA", "BBB", "CCC", "DDD", "EEE"]),
                peptides.clone(),
                MatchStrategy::Naive,
            ),
            crash_on: 3,
        });
        match ScanOrchestrator::new(4).run(worker, &peptides) {
            Err(PepSeekError::PartialResult {
                expected, missing, ..
            }) => {
                assert_eq!(expected, 4);
                assert!(missing.contains(&3), "Crashed worker not reported: {:?}", missing);
            }
            other => panic!("Expected partial result error, got {:?}", other),
        }
    }

    #[test]
    fn test_cancelled_worker_is_partial_result() {
        let peptides = PeptideSet::new(["AAA"]);
        let worker = Arc::new(QuittingWorker {
            inner: PartitionScanner::new(
                InMemorySource::from_sequences("mem", &["AAA", "BBB", "CCC"]),
                peptides.clone(),
                MatchStrategy::Naive,
            ),
            quit_on: 2,
        });
        match ScanOrchestrator::new(3).run(worker, &peptides) {
            Err(PepSeekError::PartialResult { missing, .. }) => {
                assert!(missing.contains(&2), "Cancelled worker not reported: {:?}", missing);
            }
            other => panic!("Expected partial result error, got {:?}", other),
        }
    }

    #[test]
    fn test_stalled_worker_times_out() {
        let peptides = PeptideSet::new(["AAA"]);
        let res = ScanOrchestrator::new(2)
            .with_timeout(Some(Duration::from_millis(50)))
            .run(Arc::new(StalledWorker), &peptides);
        match res {
            Err(PepSeekError::DataSource(DataSourceError {
                kind: DataSourceErrorKind::TimedOut { pending, .. },
                ..
            })) => assert_eq!(pending, vec![1, 2]),
            other => panic!("Expected timeout, got {:?}", other),
        }
    }
}
