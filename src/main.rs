use clap::Parser;
use log::{error, info};
use pepseek::scan::MatchStrategy;
use pepseek::{PepSeekError, ScanConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

/// Checks which peptides of a PEAKS protein-peptide csv can be found in a
/// protein sequence database and writes the unknown ones to a separate file.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Peptide csv file (needs a peptide column)
    #[arg(short = 'c', long = "csv")]
    csv: Option<PathBuf>,

    /// Protein database in fasta format
    #[arg(short = 'd', long)]
    database: Option<PathBuf>,

    /// Prefix of the output file
    #[arg(short = 'p', long)]
    prefix: Option<String>,

    /// Directory the report is written to
    #[arg(short = 'o', long)]
    output_dir: Option<PathBuf>,

    /// Number of workers, defaults to the number of cpus
    #[arg(short = 'w', long)]
    workers: Option<usize>,

    /// Name of the peptide column
    #[arg(long)]
    column: Option<String>,

    /// Containment test run on each record, naive unless configured
    #[arg(long, value_enum)]
    strategy: Option<MatchStrategy>,

    /// Abort if the scan takes longer than this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Show per-worker progress spinners
    #[arg(long)]
    progress: bool,

    /// JSON config file, flags given on the command line take precedence
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Result<ScanConfig, PepSeekError> {
        let mut config = match &self.config {
            Some(path) => ScanConfig::from_json_file(path)?,
            None => ScanConfig::default(),
        };
        if let Some(csv) = self.csv {
            config.peptides = csv;
        }
        if let Some(database) = self.database {
            config.database = database;
        }
        if let Some(prefix) = self.prefix {
            config.prefix = prefix;
        }
        if let Some(output_dir) = self.output_dir {
            config.output_dir = output_dir;
        }
        if let Some(column) = self.column {
            config.peptide_column = column;
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if self.workers.is_some() {
            config.workers = self.workers;
        }
        if self.timeout.is_some() {
            config.worker_timeout_secs = self.timeout;
        }
        config.progress |= self.progress;
        Ok(config)
    }
}

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("{}", std::env::args().collect::<Vec<_>>().join(" "));

    let start = Instant::now();
    let result = Cli::parse()
        .into_config()
        .and_then(|config| pepseek::run(&config));

    match result {
        Ok(summary) => {
            match serde_json::to_string(&summary) {
                Ok(json) => info!("{}", json),
                Err(e) => error!("Could not serialize run summary: {}", e),
            }
            info!("Finished in {:?}", start.elapsed());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("pepseek: {}", e);
            ExitCode::from(2)
        }
    }
}
