use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::{PublishRecord, Result};

/// Date-keyed store of sentiment records: a headered CSV file with one row
/// per publication date, rewritten wholesale on every change.
///
/// The store stays small (one row per calendar day of operation), so
/// read-modify-write over the whole file is the whole persistence story.
/// Writes go through a sibling temp file followed by a rename, which keeps
/// the previous file intact if anything fails mid-write. Single writer
/// assumed; concurrent runs against the same path are not supported.
pub struct CsvLedger {
    path: PathBuf,
}

impl CsvLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up the record for a publication date, if any.
    pub fn find(&self, date: NaiveDate) -> Result<Option<PublishRecord>> {
        let rows = self.read_all()?;
        Ok(rows.into_iter().find(|r| r.publish_date == date))
    }

    /// Insert the record, or replace the existing row with the same
    /// publication date. Running the pipeline twice for one date leaves
    /// exactly one row.
    pub fn upsert(&self, record: &PublishRecord) -> Result<()> {
        let mut rows = self.read_all()?;

        match rows.iter_mut().find(|r| r.publish_date == record.publish_date) {
            Some(existing) => {
                debug!("Replacing ledger row for {}", record.publish_date);
                *existing = record.clone();
            }
            None => {
                debug!("Appending ledger row for {}", record.publish_date);
                rows.push(record.clone());
            }
        }

        self.rewrite(&rows)?;
        info!(
            "Ledger now holds {} record(s); latest for {}: {}",
            rows.len(),
            record.publish_date,
            record.sentiment
        );
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<PublishRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut rows = Vec::new();
        for result in reader.deserialize() {
            rows.push(result?);
        }
        Ok(rows)
    }

    /// Rewrite the backing file through a same-directory temp file and an
    /// atomic rename. The prior file is only replaced once the new
    /// contents are fully flushed.
    fn rewrite(&self, rows: &[PublishRecord]) -> Result<()> {
        let tmp = self.path.with_extension("csv.tmp");

        if let Err(e) = self.write_rows(&tmp, rows) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }

        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn write_rows(&self, path: &Path, rows: &[PublishRecord]) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}
