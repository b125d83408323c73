use std::path::Path;

use anyhow::{Context, Result};

use crate::evaluate::PrRecord;

/// Write all records as CSV with a header row. Column order is fixed by the
/// `PrRecord` field order.
pub fn write_csv(path: &Path, records: &[PrRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create output file at {}", path.display()))?;

    for record in records {
        writer
            .serialize(record)
            .with_context(|| format!("Failed to write record for {}", record.repo))?;
    }
    writer.flush().context("Failed to flush output file")?;

    Ok(())
}
