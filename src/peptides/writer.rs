use super::ingest::PeptideTable;
use crate::errors::{PepSeekError, Result};
use crate::models::GlobalPresence;
use csv::Writer;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// `<output_dir>/<prefix>_unknown_peptides.csv`
pub fn unknown_report_path<P: AsRef<Path>>(output_dir: P, prefix: &str) -> PathBuf {
    output_dir
        .as_ref()
        .join(format!("{}_unknown_peptides.csv", prefix))
}

/// Writes the header and every unknown row, in ascending row order.
///
/// Rows go to a temporary sibling first and are renamed into place once
/// complete, so a failure never leaves a partial report behind.
pub fn write_unknown_peptides<P: AsRef<Path>>(
    table: &PeptideTable,
    global: &GlobalPresence,
    out_path: P,
) -> Result<usize> {
    let start = Instant::now();
    let out_path = out_path.as_ref();
    if global.len() != table.len() || global.index_space() != table.peptide_set().index_space() {
        return Err(PepSeekError::ShapeMismatch {
            what: "global presence vector",
            expected: table.len(),
            found: global.len(),
        });
    }

    let mut tmp_name = out_path.as_os_str().to_owned();
    tmp_name.push(".partial");
    let tmp_path = PathBuf::from(tmp_name);

    let written = write_rows(table, global, &tmp_path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        e
    })?;
    std::fs::rename(&tmp_path, out_path)?;

    log::info!(
        "Writing {} unknown peptides took {:?} -> {:?}",
        written,
        start.elapsed(),
        out_path
    );
    Ok(written)
}

fn write_rows(table: &PeptideTable, global: &GlobalPresence, path: &Path) -> Result<usize> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(table.headers())?;

    let mut written = 0;
    for index in global.unknown_indices() {
        if let Some(row) = table.row(index) {
            writer.write_record(row)?;
            written += 1;
        }
    }
    writer.flush()?;
    Ok(written)
}
