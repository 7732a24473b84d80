//! SQLite catalog store tests
//!
//! Field saves, image persistence (downloaded from wiremock) and the outcome
//! history, all against a temporary data directory.

use std::collections::BTreeMap;
use std::io::Cursor;

use canopy::enrichment::{CatalogStore, EnrichedFields, EnrichmentOutcome, EnrichmentRequest};
use canopy::http::{RetryPolicy, RetryingClient};
use canopy::storage::{ImageFiles, SqliteCatalogStore};
use canopy_common::{FieldKey, ImageRef, RequestId, RunId, SourceId};
use canopy_db::pool::{get_conn, init_pool};
use canopy_db::queries::{images, plants};
use chrono::Utc;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct TestStore {
    store: SqliteCatalogStore,
    files: ImageFiles,
    _dir: TempDir,
}

fn test_store() -> TestStore {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_pool(dir.path().join("catalog.sqlite").to_str().unwrap()).unwrap();
    let files = ImageFiles::new(dir.path().join("images")).with_thumbnail_width(50);
    let client = RetryingClient::new(RetryPolicy {
        max_retries: 0,
        ..RetryPolicy::default()
    })
    .unwrap();
    TestStore {
        store: SqliteCatalogStore::new(pool, files.clone(), client),
        files,
        _dir: dir,
    }
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([20, 120, 40]));
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn enriched(description: &str) -> EnrichedFields {
    EnrichedFields {
        translated_name: Some("Fiddle-leaf fig".to_string()),
        fields: BTreeMap::from([
            (FieldKey::Description, json!(description)),
            (FieldKey::Watering, json!("weekly")),
        ]),
    }
}

#[tokio::test]
async fn import_then_save_marks_entry_enriched() {
    let t = test_store();
    let request = EnrichmentRequest::new("ficus", "Ficus lyrata");

    assert!(t.store.import(request.id.clone(), request.name.clone()).await.unwrap());
    assert!(!t.store.import(request.id.clone(), request.name.clone()).await.unwrap());
    assert_eq!(t.store.pending_requests().await.unwrap(), vec![request.clone()]);

    t.store
        .save_fields(&request, &enriched("Large glossy leaves"))
        .await
        .unwrap();

    assert!(t.store.pending_requests().await.unwrap().is_empty());
    let conn = get_conn(t.store.pool()).unwrap();
    let plant = plants::get_plant(&conn, &request.id).unwrap().unwrap();
    assert_eq!(plant.translated_name.as_deref(), Some("Fiddle-leaf fig"));
    assert_eq!(plant.fields[&FieldKey::Description], json!("Large glossy leaves"));
    assert!(plant.enriched_at.is_some());
}

#[tokio::test]
async fn saving_again_replaces_fields() {
    let t = test_store();
    let request = EnrichmentRequest::new("pilea", "Pilea");

    t.store.save_fields(&request, &enriched("first")).await.unwrap();
    t.store.save_fields(&request, &enriched("second")).await.unwrap();

    let conn = get_conn(t.store.pool()).unwrap();
    let plant = plants::get_plant(&conn, &request.id).unwrap().unwrap();
    assert_eq!(plant.fields[&FieldKey::Description], json!("second"));
}

#[tokio::test]
async fn persist_image_downloads_and_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/leaf.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png(200, 100)))
        .mount(&server)
        .await;

    let t = test_store();
    let request = EnrichmentRequest::new("ficus", "Ficus lyrata");
    t.store.save_fields(&request, &enriched("x")).await.unwrap();

    let mut image = ImageRef::new(format!("{}/leaf.png", server.uri()), SourceId::new("wiki"));
    image.license = Some("CC0".to_string());
    t.store.persist_image(&request, &image).await.unwrap();
    // Same bytes again: same row.
    t.store.persist_image(&request, &image).await.unwrap();

    let conn = get_conn(t.store.pool()).unwrap();
    let stored = images::get_images_for_plant(&conn, &request.id).unwrap();
    assert_eq!(stored.len(), 1);
    let row = &stored[0];
    assert_eq!((row.width, row.height), (200, 100));
    assert_eq!(row.source, SourceId::new("wiki"));
    assert_eq!(row.license.as_deref(), Some("CC0"));
    assert_eq!(row.hash.len(), 16);
    assert!(t.files.resolve(&row.path).exists());
    assert!(t.files.resolve(row.thumbnail_path.as_deref().unwrap()).exists());
}

#[tokio::test]
async fn failed_downloads_store_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let t = test_store();
    let request = EnrichmentRequest::new("ivy", "Hedera helix");
    t.store.save_fields(&request, &enriched("x")).await.unwrap();

    for url in ["gone.jpg", "page.html"] {
        let image = ImageRef::new(format!("{}/{url}", server.uri()), SourceId::new("wiki"));
        assert!(t.store.persist_image(&request, &image).await.is_err(), "{url}");
    }

    let conn = get_conn(t.store.pool()).unwrap();
    assert!(images::get_images_for_plant(&conn, &request.id).unwrap().is_empty());
}

#[tokio::test]
async fn oversized_images_are_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png(64, 64)))
        .mount(&server)
        .await;

    let t = test_store();
    let store = t.store.clone().with_max_image_bytes(16);
    let request = EnrichmentRequest::new("moss", "Moss");
    store.save_fields(&request, &enriched("x")).await.unwrap();

    let image = ImageRef::new(format!("{}/big.png", server.uri()), SourceId::new("wiki"));
    let err = store.persist_image(&request, &image).await.unwrap_err();
    assert!(format!("{err:#}").contains("limit"), "{err:#}");
}

#[tokio::test]
async fn outcome_history_round_trip() {
    let t = test_store();
    let run_id = RunId::new();
    let outcome = |id: &str, success: bool, cancelled: bool| EnrichmentOutcome {
        request_id: RequestId::new(id),
        name: id.to_uppercase(),
        success,
        cancelled,
        error: (!success).then(|| (if cancelled { "cancelled" } else { "boom" }).to_string()),
        duration_ms: 12,
        images_uploaded: 2,
        images_failed: 1,
        finished_at: Utc::now(),
    };

    t.store
        .record_outcomes(
            run_id,
            &[
                outcome("a", true, false),
                outcome("b", false, false),
                outcome("c", false, true),
            ],
        )
        .await
        .unwrap();

    let history = t.store.history(2).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].name, "B");
    assert_eq!(history[0].error.as_deref(), Some("boom"));
    assert_eq!(history[1].name, "C");
    assert!(history[1].cancelled);
    assert!(history.iter().all(|r| r.run_id == run_id));

    assert_eq!(t.store.clear_history().await.unwrap(), 3);
    assert!(t.store.history(10).await.unwrap().is_empty());
}
