use crate::config::ScanConfig;
use crate::errors::Result;
use crate::peptides::ingest::PeptideTable;
use crate::peptides::writer::{unknown_report_path, write_unknown_peptides};
use crate::protein::fasta::FastaFileSource;
use crate::scan::orchestrator::ScanOrchestrator;
use crate::scan::scanner::{PartitionScanner, PartitionWorker};
use log::info;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub peptides: usize,
    pub known: usize,
    pub unknown: usize,
    pub workers: usize,
    pub report_path: PathBuf,
}

/// Ingest, scan, reduce and write the unknown-peptide report.
///
/// The report is only written after every partition has been reduced.
pub fn run(config: &ScanConfig) -> Result<RunSummary> {
    config.validate()?;
    let table = PeptideTable::from_csv_path(&config.peptides, &config.peptide_column)?;
    let scanner = Arc::new(PartitionScanner::new(
        FastaFileSource::new(&config.database),
        table.peptide_set().clone(),
        config.strategy,
    ));
    run_with_worker(config, &table, scanner)
}

/// Scans an already ingested table with any partition worker, then writes
/// the report. Nothing is written when the scan fails.
pub fn run_with_worker<W>(
    config: &ScanConfig,
    table: &PeptideTable,
    worker: Arc<W>,
) -> Result<RunSummary>
where
    W: PartitionWorker + 'static,
{
    let start = Instant::now();
    let workers = config.worker_count();
    let peptides = table.peptide_set();

    let global = ScanOrchestrator::new(workers)
        .with_timeout(config.worker_timeout())
        .with_progress(config.progress)
        .run(worker, peptides)?;

    std::fs::create_dir_all(&config.output_dir)?;
    let report_path = unknown_report_path(&config.output_dir, &config.prefix);
    write_unknown_peptides(table, &global, &report_path)?;

    let summary = RunSummary {
        peptides: peptides.len(),
        known: global.known_count(),
        unknown: global.unknown_count(),
        workers,
        report_path,
    };
    info!("Run finished in {:?}", start.elapsed());
    Ok(summary)
}
