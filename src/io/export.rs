//! Export per-record appraisals to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or by a
//! downstream re-pricing step.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::AppError;
use crate::report::Appraisal;

/// Write per-record appraisals to a CSV file.
pub fn write_appraisals_csv(path: &Path, appraisals: &[Appraisal]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_appraisals(file, appraisals)
}

fn write_appraisals<W: Write>(out: W, appraisals: &[Appraisal]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_writer(out);

    writer
        .write_record(["name", "observed", "predicted", "residual"])
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for a in appraisals {
        writer
            .write_record([
                a.record.name().to_string(),
                format!("{:.4}", a.observed()),
                format!("{:.4}", a.predicted),
                format!("{:.4}", a.residual),
            ])
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}
