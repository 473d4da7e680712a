use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use async_trait::async_trait;
use vin_cache::{
    config::DatabaseConfig,
    database::Database,
    decoder::{DecodedVehicle, VinDecoder},
    errors::{AppError, AppResult},
    export::ParquetExporter,
    services::LookupService,
    web::{AppState, WebServer},
};

/// Stub decoder backed by a fixed VIN table; unknown VINs are undecodable.
struct StubDecoder {
    vehicles: HashMap<String, DecodedVehicle>,
    calls: AtomicUsize,
}

impl StubDecoder {
    fn with_freightliner() -> Self {
        let mut vehicles = HashMap::new();
        vehicles.insert(
            "4V4NC9EJXEN171694".to_string(),
            DecodedVehicle {
                vin: Some("4V4NC9EJXEN171694".to_string()),
                make: Some("Freightliner".to_string()),
                model: Some("Cascadia".to_string()),
                model_year: Some("2014".to_string()),
                body_class: Some("Truck-Tractor".to_string()),
            },
        );
        vehicles.insert(
            "1XP5DB9X7YN526158".to_string(),
            DecodedVehicle {
                vin: Some("1XP5DB9X7YN526158".to_string()),
                make: Some("Peterbilt".to_string()),
                model: Some("379".to_string()),
                model_year: Some("2000".to_string()),
                body_class: Some("Truck-Tractor".to_string()),
            },
        );
        Self {
            vehicles,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VinDecoder for StubDecoder {
    async fn decode(&self, vin: &str) -> AppResult<DecodedVehicle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.vehicles.get(vin) {
            Some(vehicle) => Ok(vehicle.clone()),
            None => Err(AppError::undecodable(vin)),
        }
    }
}

/// Decoder that always fails at the transport level.
struct UnreachableDecoder;

#[async_trait]
impl VinDecoder for UnreachableDecoder {
    async fn decode(&self, _vin: &str) -> AppResult<DecodedVehicle> {
        Err(AppError::upstream("connection refused"))
    }
}

struct TestApp {
    app: Router,
    decoder: Arc<StubDecoder>,
    database: Database,
    // Holds the scratch database and export directory alive.
    _dir: TempDir,
}

async fn test_app_with(decoder: Arc<dyn VinDecoder>, dir: TempDir) -> (Router, Database, TempDir) {
    let db_path = dir.path().join("vin-cache.db");
    let config = DatabaseConfig {
        url: format!("sqlite://{}", db_path.display()),
        max_connections: Some(5),
    };
    let database = Database::new(&config).await.unwrap();

    let lookup = LookupService::new(database.clone(), decoder);
    let exporter = ParquetExporter::new(dir.path().join("export_vin_cache.parquet"));
    let app = WebServer::create_router(AppState {
        database: database.clone(),
        lookup,
        exporter,
    });
    (app, database, dir)
}

async fn test_app() -> TestApp {
    let decoder = Arc::new(StubDecoder::with_freightliner());
    let dir = tempfile::tempdir().unwrap();
    let (app, database, dir) = test_app_with(decoder.clone(), dir).await;

    // One-time setup op, driven the way an operator would.
    let (status, _) = send_request(&app, Method::GET, "/create_table").await;
    assert_eq!(status, StatusCode::OK);

    TestApp {
        app,
        decoder,
        database,
        _dir: dir,
    }
}

// Helper function to send requests to the app
async fn send_request(app: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let (status, body) = send_raw(app, method, uri).await;
    let json: Value = if body.is_empty() {
        json!({})
    } else {
        serde_json::from_slice(&body).unwrap_or(json!({}))
    };
    (status, json)
}

async fn send_raw(app: &Router, method: Method, uri: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

fn read_exported_vins(parquet_bytes: Vec<u8>) -> Vec<(String, String)> {
    use arrow::array::StringArray;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    let reader = ParquetRecordBatchReaderBuilder::try_new(bytes::Bytes::from(parquet_bytes))
        .unwrap()
        .build()
        .unwrap();

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch.unwrap();
        let vins = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        let makes = batch
            .column(1)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        for i in 0..batch.num_rows() {
            rows.push((vins.value(i).to_string(), makes.value(i).to_string()));
        }
    }
    rows
}

#[tokio::test]
async fn lookup_miss_then_hit_scenario() {
    let test = test_app().await;

    let (status, first) = send_request(
        &test.app,
        Method::GET,
        "/lookup/?vin=4V4NC9EJXEN171694",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        first,
        json!({
            "vin": "4V4NC9EJXEN171694",
            "make": "Freightliner",
            "model": "Cascadia",
            "model_year": "2014",
            "body_class": "Truck-Tractor",
            "cached": false
        })
    );

    let (status, second) = send_request(
        &test.app,
        Method::GET,
        "/lookup/?vin=4V4NC9EJXEN171694",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["cached"], json!(true));
    assert_eq!(second["make"], first["make"]);
    assert_eq!(second["model_year"], first["model_year"]);

    // The second lookup was served from the store without a fresh decode.
    assert_eq!(test.decoder.calls(), 1);
}

#[tokio::test]
async fn lowercase_vin_hits_the_same_cache_entry() {
    let test = test_app().await;

    let (status, _) = send_request(
        &test.app,
        Method::GET,
        "/lookup/?vin=4V4NC9EJXEN171694",
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, response) = send_request(
        &test.app,
        Method::GET,
        "/lookup/?vin=4v4nc9ejxen171694",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["cached"], json!(true));
    assert_eq!(test.decoder.calls(), 1);
}

#[tokio::test]
async fn boundary_rejects_wrong_length_vins_with_no_side_effects() {
    let test = test_app().await;

    // 16 and 18 characters.
    for uri in [
        "/lookup/?vin=4V4NC9EJXEN17169",
        "/lookup/?vin=4V4NC9EJXEN1716944",
        "/remove/?vin=4V4NC9EJXEN17169",
    ] {
        let (status, response) = send_request(&test.app, Method::GET, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "uri {uri}");
        assert!(response["error"].as_str().unwrap().contains("17"));
    }

    // No upstream call, no cached row.
    assert_eq!(test.decoder.calls(), 0);
    assert!(test.database.list_vin_records().await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_vin_parameter_is_a_bad_request() {
    let test = test_app().await;

    let (status, _) = send_request(&test.app, Method::GET, "/lookup/").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(test.decoder.calls(), 0);
}

#[tokio::test]
async fn unknown_vin_is_not_found() {
    let test = test_app().await;

    let (status, response) = send_request(
        &test.app,
        Method::GET,
        "/lookup/?vin=1FUJGLDR1CSBF4960",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(response["error"].as_str().unwrap().contains("1FUJGLDR1CSBF4960"));
    assert!(test.database.list_vin_records().await.unwrap().is_empty());
}

#[tokio::test]
async fn upstream_failure_is_a_bad_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let (app, database, _dir) = test_app_with(Arc::new(UnreachableDecoder), dir).await;
    let (status, _) = send_request(&app, Method::GET, "/create_table").await;
    assert_eq!(status, StatusCode::OK);

    let (status, response) = send_request(&app, Method::GET, "/lookup/?vin=4V4NC9EJXEN171694").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(response["error"].as_str().unwrap().contains("Upstream"));
    assert!(database.list_vin_records().await.unwrap().is_empty());
}

#[tokio::test]
async fn remove_of_an_unseen_vin_reports_false_and_decodes_nothing() {
    let test = test_app().await;

    let (status, response) = send_request(
        &test.app,
        Method::GET,
        "/remove/?vin=1XP5DB9X7YN526158",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        response,
        json!({"vin": "1XP5DB9X7YN526158", "cache_delete_success": false})
    );
    assert_eq!(test.decoder.calls(), 0);
    assert!(test.database.list_vin_records().await.unwrap().is_empty());
}

#[tokio::test]
async fn remove_deletes_a_previously_cached_vin() {
    let test = test_app().await;

    send_request(&test.app, Method::GET, "/lookup/?vin=4V4NC9EJXEN171694").await;

    let (status, response) = send_request(
        &test.app,
        Method::GET,
        "/remove/?vin=4V4NC9EJXEN171694",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["cache_delete_success"], json!(true));

    // The next lookup misses again and re-decodes.
    let (_, relookup) = send_request(
        &test.app,
        Method::GET,
        "/lookup/?vin=4V4NC9EJXEN171694",
    )
    .await;
    assert_eq!(relookup["cached"], json!(false));
    assert_eq!(test.decoder.calls(), 2);
}

#[tokio::test]
async fn export_round_trips_cached_records_in_insertion_order() {
    let test = test_app().await;

    send_request(&test.app, Method::GET, "/lookup/?vin=4V4NC9EJXEN171694").await;
    send_request(&test.app, Method::GET, "/lookup/?vin=1XP5DB9X7YN526158").await;

    let request = Request::builder()
        .method(Method::GET)
        .uri("/export/")
        .body(Body::empty())
        .unwrap();
    let response = test.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"export_vin_cache.parquet\""
    );

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let rows = read_exported_vins(body.to_vec());
    assert_eq!(
        rows,
        vec![
            (
                "4V4NC9EJXEN171694".to_string(),
                "Freightliner".to_string()
            ),
            ("1XP5DB9X7YN526158".to_string(), "Peterbilt".to_string()),
        ]
    );
}

#[tokio::test]
async fn export_is_byte_identical_without_intervening_mutation() {
    let test = test_app().await;
    send_request(&test.app, Method::GET, "/lookup/?vin=4V4NC9EJXEN171694").await;

    let (status, first) = send_raw(&test.app, Method::GET, "/export/").await;
    assert_eq!(status, StatusCode::OK);
    let (status, second) = send_raw(&test.app, Method::GET, "/export/").await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(first, second);
}

#[tokio::test]
async fn export_of_an_empty_cache_is_a_valid_empty_table() {
    let test = test_app().await;

    let (status, body) = send_raw(&test.app, Method::GET, "/export/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(read_exported_vins(body).is_empty());
}

#[tokio::test]
async fn create_table_is_a_one_time_operation() {
    // test_app() already called /create_table once.
    let test = test_app().await;

    let (status, _) = send_request(&test.app, Method::GET, "/create_table").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn lookup_before_table_setup_is_a_server_error_not_a_crash() {
    let dir = tempfile::tempdir().unwrap();
    let decoder = Arc::new(StubDecoder::with_freightliner());
    let (app, _database, _dir) = test_app_with(decoder, dir).await;

    let (status, _) = send_request(&app, Method::GET, "/lookup/?vin=4V4NC9EJXEN171694").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn health_reports_store_connectivity() {
    let test = test_app().await;

    let (status, response) = send_request(&test.app, Method::GET, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["status"], "healthy");
    assert!(response.get("timestamp").is_some());
}
