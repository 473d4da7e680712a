use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::info;

use super::Database;
use crate::models::{VinRecord, VinRecordCreateRequest};

// Helper function to parse datetime from either RFC3339 or SQLite format
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    // Try RFC3339 first
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (YYYY-MM-DD HH:MM:SS)
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.and_utc());
    }
    Err(anyhow::anyhow!("Failed to parse datetime: {}", s))
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<VinRecord> {
    let created_at = row.get::<String, _>("created_at");

    Ok(VinRecord {
        id: row.get("id"),
        vin: row.get("vin"),
        make: row.get("make"),
        model: row.get("model"),
        model_year: row.get("model_year"),
        body_class: row.get("body_class"),
        created_at: parse_datetime(&created_at)?,
    })
}

impl Database {
    /// Existence check: the record for `vin` if one is cached. Read-only.
    pub async fn get_vin_record(&self, vin: &str) -> Result<Option<VinRecord>> {
        let row = sqlx::query(
            "SELECT id, vin, make, model, model_year, body_class, created_at
             FROM vin_records WHERE vin = ?",
        )
        .bind(vin)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(record_from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Insert a freshly decoded record.
    ///
    /// The `UNIQUE` constraint on `vin` rejects a concurrent duplicate in the
    /// write itself; callers losing that race see a unique-violation
    /// `sqlx::Error` inside the returned error chain.
    pub async fn create_vin_record(&self, request: &VinRecordCreateRequest) -> Result<VinRecord> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO vin_records (vin, make, model, model_year, body_class, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&request.vin)
        .bind(&request.make)
        .bind(&request.model)
        .bind(&request.model_year)
        .bind(&request.body_class)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        info!("Entry for VIN {} was cached", request.vin);

        Ok(VinRecord {
            id: result.last_insert_rowid(),
            vin: request.vin.clone(),
            make: request.make.clone(),
            model: request.model.clone(),
            model_year: request.model_year.clone(),
            body_class: request.body_class.clone(),
            created_at: now,
        })
    }

    /// Remove the record for `vin` if present; reports whether a deletion
    /// occurred.
    pub async fn delete_vin_record(&self, vin: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM vin_records WHERE vin = ?")
            .bind(vin)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Every cached record, in insertion order.
    pub async fn list_vin_records(&self) -> Result<Vec<VinRecord>> {
        let rows = sqlx::query(
            "SELECT id, vin, make, model, model_year, body_class, created_at
             FROM vin_records ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::new();
        for row in rows {
            records.push(record_from_row(&row)?);
        }

        Ok(records)
    }
}
