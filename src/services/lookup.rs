//! Lookup orchestrator
//!
//! Cache-first VIN resolution: a hit is served straight from the store, a
//! miss goes out through the decoder client and the result is persisted
//! before being returned. The orchestrator holds no state between requests.

use std::sync::Arc;

use tracing::{info, warn};

use crate::database::Database;
use crate::decoder::VinDecoder;
use crate::errors::{AppError, AppResult};
use crate::models::{VinRecord, VinRecordCreateRequest};

/// Outcome of a successful lookup. `was_cached` distinguishes a store hit
/// from a fresh decode-then-cache pass.
#[derive(Debug, Clone)]
pub struct LookupResult {
    pub record: VinRecord,
    pub was_cached: bool,
}

#[derive(Clone)]
pub struct LookupService {
    database: Database,
    decoder: Arc<dyn VinDecoder>,
}

fn is_unique_violation(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db_error)) => db_error.is_unique_violation(),
        _ => false,
    }
}

impl LookupService {
    pub fn new(database: Database, decoder: Arc<dyn VinDecoder>) -> Self {
        Self { database, decoder }
    }

    /// Resolve `vin` against the cache, decoding and persisting on a miss.
    ///
    /// A concurrent lookup of the same uncached VIN can win the insert race;
    /// the `UNIQUE` constraint fails the second writer, which recovers by
    /// re-reading the now-present row instead of surfacing the conflict.
    pub async fn lookup(&self, vin: &str) -> AppResult<LookupResult> {
        if let Some(record) = self.database.get_vin_record(vin).await? {
            info!("Cache hit for VIN {}", vin);
            return Ok(LookupResult {
                record,
                was_cached: true,
            });
        }

        info!("Cache miss for VIN {}, querying decoder", vin);
        let vehicle = self.decoder.decode(vin).await?;

        let decoded_vin = vehicle.vin.unwrap_or_default();
        if decoded_vin.trim().is_empty() {
            warn!("Decoder answered without a usable VIN value for {}", vin);
            return Err(AppError::undecodable(vin));
        }

        let request = VinRecordCreateRequest {
            vin: decoded_vin,
            make: vehicle.make.unwrap_or_default(),
            model: vehicle.model.unwrap_or_default(),
            model_year: vehicle.model_year.unwrap_or_default(),
            body_class: vehicle.body_class.unwrap_or_default(),
        };

        match self.database.create_vin_record(&request).await {
            Ok(record) => Ok(LookupResult {
                record,
                was_cached: false,
            }),
            Err(e) if is_unique_violation(&e) => {
                // Lost the insert race; the surviving row is served as a hit.
                warn!("Concurrent insert for VIN {}, re-reading cached row", vin);
                let record = self.database.get_vin_record(vin).await?.ok_or_else(|| {
                    AppError::Internal(anyhow::anyhow!(
                        "record for VIN {vin} vanished after unique violation"
                    ))
                })?;
                Ok(LookupResult {
                    record,
                    was_cached: true,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove `vin` from the cache if present; never triggers a decode.
    pub async fn remove(&self, vin: &str) -> AppResult<bool> {
        let deleted = self.database.delete_vin_record(vin).await?;
        if deleted {
            info!("Removed cached entry for VIN {}", vin);
        }
        Ok(deleted)
    }
}
