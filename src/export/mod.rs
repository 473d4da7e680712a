//! Parquet export adapter
//!
//! Snapshots the full cache into a single-table Parquet file: columns
//! `vin, make, model, model_year, body_class`, one row per cached VIN in
//! store order. Always a full overwrite of the fixed output path, never an
//! append; zero cached records produce a valid empty table. Default writer
//! properties and no embedded timestamps keep re-exports of an unchanged
//! cache byte-identical.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use tracing::info;

use crate::errors::ExportError;
use crate::models::VinRecord;

#[derive(Clone)]
pub struct ParquetExporter {
    output_path: PathBuf,
}

impl ParquetExporter {
    pub fn new<P: Into<PathBuf>>(output_path: P) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Write a snapshot of `records` to the fixed output path, truncating
    /// any prior export. Returns the path written.
    pub fn write_snapshot(&self, records: &[VinRecord]) -> Result<PathBuf, ExportError> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("vin", DataType::Utf8, false),
            Field::new("make", DataType::Utf8, false),
            Field::new("model", DataType::Utf8, false),
            Field::new("model_year", DataType::Utf8, false),
            Field::new("body_class", DataType::Utf8, false),
        ]));

        let column = |f: fn(&VinRecord) -> &str| -> ArrayRef {
            Arc::new(StringArray::from_iter_values(records.iter().map(f)))
        };
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                column(|r| &r.vin),
                column(|r| &r.make),
                column(|r| &r.model),
                column(|r| &r.model_year),
                column(|r| &r.body_class),
            ],
        )?;

        let file = File::create(&self.output_path)?;
        let mut writer = ArrowWriter::try_new(file, schema, None)?;
        writer.write(&batch)?;
        writer.close()?;

        info!(
            "Exported {} cached VIN record(s) to {}",
            records.len(),
            self.output_path.display()
        );
        Ok(self.output_path.clone())
    }
}
