use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A cached VIN decode result.
///
/// `vin` is the natural key (at most one record per VIN, enforced by the
/// store); `id` is the store-assigned surrogate key. Decoded attributes are
/// empty strings when the upstream provided no value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct VinRecord {
    pub id: i64,
    pub vin: String,
    pub make: String,
    pub model: String,
    pub model_year: String,
    pub body_class: String,
    pub created_at: DateTime<Utc>,
}

/// Insert input for the cache store. All five decoded fields are required;
/// callers default absent upstream attributes to empty strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VinRecordCreateRequest {
    pub vin: String,
    pub make: String,
    pub model: String,
    pub model_year: String,
    pub body_class: String,
}

/// Wire shape of a successful `/lookup/` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupResponse {
    pub vin: String,
    pub make: String,
    pub model: String,
    pub model_year: String,
    pub body_class: String,
    /// `true` when served from the store without a fresh decode.
    pub cached: bool,
}

impl LookupResponse {
    pub fn from_record(record: VinRecord, cached: bool) -> Self {
        Self {
            vin: record.vin,
            make: record.make,
            model: record.model,
            model_year: record.model_year,
            body_class: record.body_class,
            cached,
        }
    }
}

/// Wire shape of a `/remove/` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveResponse {
    pub vin: String,
    pub cache_delete_success: bool,
}
