//! Decoder client for the NHTSA vPIC vehicle API
//!
//! Issues a single synchronous lookup per VIN and parses the flat
//! `DecodeVinValues` payload. Every upstream field is treated as optional;
//! a missing `Results` list is a first-class failure, not a parse panic.
//! No retries, no backoff.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::config::DecoderConfig;
use crate::errors::{AppError, AppResult};

/// Seam between the lookup orchestrator and the decoding service, so tests
/// can substitute stub decoders.
#[async_trait]
pub trait VinDecoder: Send + Sync {
    async fn decode(&self, vin: &str) -> AppResult<DecodedVehicle>;
}

/// The attributes of interest from a decode, all optional: the upstream may
/// omit or blank any of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedVehicle {
    pub vin: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub model_year: Option<String>,
    pub body_class: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VpicResponse {
    #[serde(rename = "Results")]
    results: Option<Vec<VpicResult>>,
    #[serde(rename = "Message", alias = "message", default)]
    message: String,
}

/// One entry of the flat `DecodeVinValues` result list. Unknown attributes
/// are ignored; the handful we cache are pulled out by name.
#[derive(Debug, Deserialize)]
struct VpicResult {
    #[serde(rename = "VIN")]
    vin: Option<String>,
    #[serde(rename = "Make")]
    make: Option<String>,
    #[serde(rename = "Model")]
    model: Option<String>,
    #[serde(rename = "ModelYear")]
    model_year: Option<String>,
    #[serde(rename = "BodyClass")]
    body_class: Option<String>,
}

fn vehicle_from_payload(payload: VpicResponse, vin: &str) -> AppResult<DecodedVehicle> {
    let Some(first) = payload.results.unwrap_or_default().into_iter().next() else {
        warn!(
            "vPIC returned no results for VIN {}. Response message is: {}",
            vin, payload.message
        );
        return Err(AppError::undecodable(vin));
    };

    Ok(DecodedVehicle {
        vin: first.vin,
        make: first.make,
        model: first.model,
        model_year: first.model_year,
        body_class: first.body_class,
    })
}

/// vPIC decoder client
pub struct VpicClient {
    client: Client,
    base_url: String,
}

impl VpicClient {
    pub fn new(config: &DecoderConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent("VIN-Cache/1.0")
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl VinDecoder for VpicClient {
    async fn decode(&self, vin: &str) -> AppResult<DecodedVehicle> {
        let url = format!("{}/DecodeVinValues/{}?format=json", self.base_url, vin);
        debug!("Decoding VIN {} via {}", vin, url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            error!("Unable to get response from vPIC API: {}", e);
            AppError::upstream(format!("request failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            error!("vPIC API returned status {} for VIN {}", status, vin);
            return Err(AppError::upstream(format!("unexpected status {status}")));
        }

        let payload: VpicResponse = response.json().await.map_err(|e| {
            error!("Unable to parse vPIC response for VIN {}: {}", vin, e);
            AppError::upstream(format!("invalid response body: {e}"))
        })?;

        vehicle_from_payload(payload, vin)
    }
}
