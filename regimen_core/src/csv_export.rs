//! CSV export of day plans.
//!
//! One row per day with columns `date, block, events, morning, any, evening`.
//! Item cells hold ` | `-separated labels; items without a timing hint go to
//! the `any` column.

use crate::{join_labels, DayPlan, Result};
use std::io::Write;
use std::path::Path;

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    date: String,
    block: String,
    events: String,
    morning: String,
    any: String,
    evening: String,
}

impl From<&DayPlan> for CsvRow {
    fn from(plan: &DayPlan) -> Self {
        let buckets = plan.buckets();
        CsvRow {
            date: plan.day.to_string(),
            block: plan.block_id.clone(),
            events: plan.events.join(","),
            morning: join_labels(&buckets.morning),
            any: join_labels(&buckets.any),
            evening: join_labels(&buckets.evening),
        }
    }
}

fn write_rows<W: Write>(writer: &mut csv::Writer<W>, plans: &[DayPlan]) -> Result<()> {
    for plan in plans {
        writer.serialize(CsvRow::from(plan))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write plans as CSV (with header) to any writer
pub fn write_csv<W: Write>(plans: &[DayPlan], writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    write_rows(&mut writer, plans)
}

/// Export plans to a CSV file, replacing any existing file
///
/// Returns the number of rows written.
pub fn export_csv(plans: &[DayPlan], path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::File::create(path)?;
    let mut writer = csv::Writer::from_writer(file);
    write_rows(&mut writer, plans)?;

    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;

    tracing::info!("Wrote {} days to {:?}", plans.len(), path);
    Ok(plans.len())
}
