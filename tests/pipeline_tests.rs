//! End-to-end pipeline runs against a scripted marketplace
mod common;

use common::*;
use tempfile::TempDir;

use price_tracker_lib::application::store_reader;
use price_tracker_lib::application::{PipelineError, RunOptions, RunWarning};
use price_tracker_lib::domain::product::{CanonicalProductRecord, ProductStub};
use price_tracker_lib::domain::price::RawPrice;
use price_tracker_lib::infrastructure::blob_store::Slot;

fn records(pipeline: &price_tracker_lib::Pipeline) -> Vec<CanonicalProductRecord> {
    store_reader::load_records(pipeline.store(), BASE).unwrap()
}

fn record<'a>(records: &'a [CanonicalProductRecord], id: &str) -> &'a CanonicalProductRecord {
    records.iter().find(|r| r.id == id).unwrap()
}

#[tokio::test]
async fn full_run_writes_catalog_and_snapshot() {
    let dir = TempDir::new().unwrap();
    let site = shop();
    let pipeline = pipeline(test_config(dir.path()), &site);

    let report = pipeline.run(&RunOptions::default()).await.unwrap();

    assert_eq!(report.pages_scanned, 2);
    assert_eq!(report.stubs_acquired, 3);
    assert_eq!(report.products_processed, 3);
    assert_eq!(report.records_written, 3);
    assert!(report.finished_at.is_some());
    // No cookies configured is not a run warning.
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);

    let catalog = store_reader::load_catalog(pipeline.store()).unwrap().unwrap();
    let names: Vec<&str> = catalog.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["Blue Mug", "Red Mug", "Green Mug"]);

    let stored = records(&pipeline);
    assert_eq!(stored.len(), 3);

    let blue = record(&stored, "1");
    assert_eq!(blue.own_price, Some(100.0));
    assert_eq!(blue.url, product_url("blue-mug", "1"));
    assert_eq!(blue.image_url, "https://cdn.example.com/1.jpg");
    let sellers: Vec<&str> = blue.competitors.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(sellers, ["S1", "S2"]);
    assert_eq!(blue.competitors[0].canonical_price(), Some(90.0));

    assert_eq!(record(&stored, "2").own_price, Some(1250.5));
    assert!(record(&stored, "3").competitors.is_empty());
    assert!(stored.iter().all(|r| r.collected_at == Some(report.started_at)));

    let log = site.log();
    assert_eq!(log.launches, 1);
    assert_eq!(log.closes, 1);
    assert_eq!(log.visited[0], LISTING_URL);
    assert_eq!(log.visited[1], listing_page_url(2));
}

#[tokio::test]
async fn fetch_only_stops_after_the_catalog() {
    let dir = TempDir::new().unwrap();
    let site = shop();
    let pipeline = pipeline(test_config(dir.path()), &site);

    let options = RunOptions {
        fetch_only: true,
        ..RunOptions::default()
    };
    let report = pipeline.run(&options).await.unwrap();

    assert_eq!(report.stubs_acquired, 3);
    assert_eq!(report.products_processed, 0);
    assert!(pipeline.store().read_slot(Slot::CompetitorSnapshot).unwrap().is_none());
    assert!(pipeline.store().read_slot(Slot::Catalog).unwrap().is_some());
    assert_eq!(site.visited(), [LISTING_URL.to_string(), listing_page_url(2)]);
    assert_eq!(site.log().closes, 1);
}

#[tokio::test]
async fn process_only_reads_the_saved_catalog() {
    let dir = TempDir::new().unwrap();
    let site = shop();
    let pipeline = pipeline(test_config(dir.path()), &site);

    let saved = vec![ProductStub {
        id: None,
        name: "Blue Mug".to_string(),
        url: "/acme/blue-mug-p-1".to_string(),
        own_price: RawPrice::text("99,90 TL"),
        image_url: String::new(),
    }];
    pipeline.store().write_slot(Slot::Catalog, &saved).unwrap();

    let options = RunOptions {
        process_only: true,
        ..RunOptions::default()
    };
    let report = pipeline.run(&options).await.unwrap();

    assert_eq!(report.pages_scanned, 0);
    assert_eq!(report.records_written, 1);
    assert_eq!(site.visited(), [product_url("blue-mug", "1")]);

    let stored = records(&pipeline);
    assert_eq!(stored[0].id, "1");
    assert_eq!(stored[0].own_price, Some(99.9));
}

#[tokio::test]
async fn process_only_without_catalog_is_fatal() {
    let dir = TempDir::new().unwrap();
    let site = shop();
    let pipeline = pipeline(test_config(dir.path()), &site);

    let options = RunOptions {
        process_only: true,
        ..RunOptions::default()
    };
    let err = pipeline.run(&options).await.unwrap_err();

    assert!(matches!(err, PipelineError::CatalogUnavailable(_)));
    assert_eq!(site.log().launches, 0);
}

#[tokio::test]
async fn launch_failure_is_fatal() {
    let dir = TempDir::new().unwrap();
    let site = shop().unlaunchable();
    let pipeline = pipeline(test_config(dir.path()), &site);

    let err = pipeline.run(&RunOptions::default()).await.unwrap_err();

    assert!(matches!(err, PipelineError::DriverLaunch(_)));
    assert!(pipeline.store().read_slot(Slot::Catalog).unwrap().is_none());
}

#[tokio::test]
async fn session_is_closed_when_the_store_fails() {
    let dir = TempDir::new().unwrap();
    let blocked = dir.path().join("blocked");
    std::fs::write(&blocked, "not a directory").unwrap();
    let site = shop();
    let pipeline = pipeline(test_config(&blocked), &site);

    let err = pipeline.run(&RunOptions::default()).await.unwrap_err();

    assert!(matches!(err, PipelineError::Store(_)));
    assert_eq!(site.log().launches, 1);
    assert_eq!(site.log().closes, 1);
}

#[tokio::test]
async fn malformed_state_degrades_and_keeps_a_diagnostic() {
    let dir = TempDir::new().unwrap();
    let site = ScriptedSite::new()
        .page(LISTING_URL, listing(Some(1), &[card("blue-mug", "1", "Blue Mug", "100 TL")]))
        .page(
            &product_url("blue-mug", "1"),
            "<script>window.__PRODUCT_DETAIL_APP_INITIAL_STATE__ = {product: broken};</script>",
        );
    let pipeline = pipeline(test_config(dir.path()), &site);

    let report = pipeline.run(&RunOptions::default()).await.unwrap();

    assert_eq!(report.degraded, 1);
    assert!(matches!(
        &report.warnings[..],
        [RunWarning::ExtractionDegraded { identifier, .. }] if identifier == "1"
    ));

    let stored = records(&pipeline);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].own_price, Some(100.0));
    assert!(stored[0].competitors.is_empty());

    let diagnostic = dir.path().join("diagnostics").join("state_1.txt");
    assert_eq!(std::fs::read_to_string(diagnostic).unwrap(), "{product: broken}");
}

#[tokio::test]
async fn live_state_is_preferred_over_markup() {
    let dir = TempDir::new().unwrap();
    let url = product_url("blue-mug", "1");
    let site = ScriptedSite::new()
        .page(LISTING_URL, listing(Some(1), &[card("blue-mug", "1", "Blue Mug", "100 TL")]))
        .page(&url, "<html><body>rendered by script</body></html>")
        .live_state(&url, state(&[("Live Seller", "80 TL")]));
    let pipeline = pipeline(test_config(dir.path()), &site);

    let report = pipeline.run(&RunOptions::default()).await.unwrap();

    assert_eq!(report.degraded, 0);
    let stored = records(&pipeline);
    assert_eq!(stored[0].competitors[0].name, "Live Seller");
}

#[tokio::test]
async fn missing_state_degrades_to_catalog_data() {
    let dir = TempDir::new().unwrap();
    let site = ScriptedSite::new()
        .page(LISTING_URL, listing(Some(1), &[card("blue-mug", "1", "Blue Mug", "100 TL")]))
        .page(&product_url("blue-mug", "1"), "<html><body>no state here</body></html>");
    let pipeline = pipeline(test_config(dir.path()), &site);

    let report = pipeline.run(&RunOptions::default()).await.unwrap();

    assert_eq!(report.degraded, 1);
    assert!(matches!(
        &report.warnings[..],
        [RunWarning::ExtractionDegraded { identifier, reason }]
            if identifier == "1" && reason.contains("not found")
    ));

    let stored = records(&pipeline);
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].name, "Blue Mug");
    assert_eq!(stored[0].own_price, Some(100.0));
    assert_eq!(stored[0].image_url, "https://cdn.example.com/1.jpg");
    assert!(stored[0].competitors.is_empty());
    assert!(!dir.path().join("diagnostics").join("state_1.txt").exists());
}

#[tokio::test]
async fn blank_card_price_is_read_from_the_state() {
    let dir = TempDir::new().unwrap();
    let state = serde_json::json!({
        "product": {
            "name": "Blue Mug Deluxe",
            "price": { "discountedPrice": { "text": "149,90 TL" } },
            "otherMerchants": []
        }
    });
    let site = ScriptedSite::new()
        .page(LISTING_URL, listing(Some(1), &[card("blue-mug", "1", "Blue Mug", "")]))
        .page(&product_url("blue-mug", "1"), detail_page_with_state(&state));
    let pipeline = pipeline(test_config(dir.path()), &site);

    let report = pipeline.run(&RunOptions::default()).await.unwrap();

    assert_eq!(report.degraded, 0);
    let catalog = store_reader::load_catalog(pipeline.store()).unwrap().unwrap();
    assert!(catalog[0].own_price.is_blank());

    let stored = records(&pipeline);
    assert_eq!(stored[0].own_price, Some(149.9));
    // The card name is kept when present.
    assert_eq!(stored[0].name, "Blue Mug");
}

#[tokio::test]
async fn empty_stub_name_is_read_from_the_state() {
    let dir = TempDir::new().unwrap();
    let named_state = serde_json::json!({
        "product": {
            "name": "  Blue Mug  ",
            "price": { "discountedPrice": { "text": "149,90 TL" } }
        }
    });
    let ignored_state = serde_json::json!({
        "product": {
            "name": "Renamed Mug",
            "price": { "discountedPrice": { "text": "1 TL" } }
        }
    });
    let site = ScriptedSite::new()
        .page(&product_url("blue-mug", "1"), detail_page_with_state(&named_state))
        .page(&product_url("red-mug", "2"), detail_page_with_state(&ignored_state));
    let pipeline = pipeline(test_config(dir.path()), &site);

    let saved = vec![
        ProductStub {
            id: None,
            name: String::new(),
            url: "/acme/blue-mug-p-1".to_string(),
            own_price: RawPrice::default(),
            image_url: String::new(),
        },
        ProductStub {
            id: None,
            name: "Red Mug".to_string(),
            url: "/acme/red-mug-p-2".to_string(),
            own_price: RawPrice::text("1.250,50 TL"),
            image_url: String::new(),
        },
    ];
    pipeline.store().write_slot(Slot::Catalog, &saved).unwrap();

    let options = RunOptions {
        process_only: true,
        ..RunOptions::default()
    };
    let report = pipeline.run(&options).await.unwrap();
    assert_eq!(report.records_written, 2);

    let stored = records(&pipeline);
    let blue = record(&stored, "1");
    assert_eq!(blue.name, "Blue Mug");
    assert_eq!(blue.own_price, Some(149.9));

    let red = record(&stored, "2");
    assert_eq!(red.name, "Red Mug");
    assert_eq!(red.own_price, Some(1250.5));
}

#[tokio::test]
async fn failed_product_is_dropped_by_default() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    pipeline(config.clone(), &shop()).run(&RunOptions::default()).await.unwrap();

    let flaky = shop().failing(&product_url("red-mug", "2"), 503);
    let second = pipeline(config, &flaky);
    let report = second.run(&RunOptions::default()).await.unwrap();

    assert_eq!(report.fetch_failures, 1);
    assert_eq!(report.carried_forward, 0);
    assert!(report.warnings.iter().any(
        |w| matches!(w, RunWarning::FetchFailure { target, .. } if target == "2")
    ));

    let ids: Vec<String> = records(&second).into_iter().map(|r| r.id).collect();
    assert_eq!(ids, ["1", "3"]);
}

#[tokio::test]
async fn failed_product_is_carried_forward_when_enabled() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.merge.carry_forward_on_fetch_failure = true;

    let first = pipeline(config.clone(), &shop())
        .run(&RunOptions::default())
        .await
        .unwrap();

    let flaky = shop().failing(&product_url("red-mug", "2"), 503);
    let second = pipeline(config, &flaky);
    let report = second.run(&RunOptions::default()).await.unwrap();

    assert_eq!(report.carried_forward, 1);
    assert_eq!(report.records_written, 3);

    let stored = records(&second);
    assert_eq!(record(&stored, "2").collected_at, Some(first.started_at));
    assert_eq!(record(&stored, "1").collected_at, Some(report.started_at));
}

#[tokio::test]
async fn empty_later_page_keeps_earlier_products() {
    let dir = TempDir::new().unwrap();
    let site = shop().page(&listing_page_url(2), listing(Some(30), &[]));
    let pipeline = pipeline(test_config(dir.path()), &site);

    let report = pipeline.run(&RunOptions::default()).await.unwrap();

    assert_eq!(report.stubs_acquired, 2);
    assert!(report
        .warnings
        .iter()
        .any(|w| matches!(w, RunWarning::ZeroResultsWarning { page: 2 })));
    assert_eq!(records(&pipeline).len(), 2);
}

#[tokio::test]
async fn missing_result_count_scans_a_single_page() {
    let dir = TempDir::new().unwrap();
    let site = shop().page(LISTING_URL, listing(None, &[card("blue-mug", "1", "Blue Mug", "100 TL")]));
    let pipeline = pipeline(test_config(dir.path()), &site);

    let report = pipeline.run(&RunOptions::default()).await.unwrap();

    assert_eq!(report.pages_scanned, 1);
    assert!(matches!(
        report.warnings.first(),
        Some(RunWarning::AcquisitionWarning { page: Some(1), .. })
    ));
    assert!(!site.visited().contains(&listing_page_url(2)));
}

#[tokio::test]
async fn page_and_product_limits_are_applied() {
    let dir = TempDir::new().unwrap();
    let site = shop();
    let pipeline = pipeline(test_config(dir.path()), &site);

    let options = RunOptions {
        page_limit: Some(1),
        limit: Some(1),
        ..RunOptions::default()
    };
    let report = pipeline.run(&options).await.unwrap();

    assert_eq!(report.pages_scanned, 1);
    assert_eq!(report.stubs_acquired, 2);
    assert_eq!(report.products_processed, 1);
    assert_eq!(records(&pipeline).len(), 1);
}

#[tokio::test]
async fn zero_limits_mean_no_limit() {
    let dir = TempDir::new().unwrap();
    let site = shop();
    let pipeline = pipeline(test_config(dir.path()), &site);

    let options = RunOptions {
        page_limit: Some(0),
        limit: Some(0),
        ..RunOptions::default()
    };
    let report = pipeline.run(&options).await.unwrap();

    assert_eq!(report.pages_scanned, 2);
    assert_eq!(report.products_processed, 3);
    assert_eq!(records(&pipeline).len(), 3);
}

#[tokio::test]
async fn configured_cookies_are_installed_before_acquisition() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    config.marketplace.cookies = "session=abc; ; country=TR".to_string();
    let site = shop().page(BASE, "<html></html>");
    let pipeline = pipeline(config, &site);

    pipeline.run(&RunOptions::default()).await.unwrap();

    let log = site.log();
    assert_eq!(log.visited[0], BASE);
    assert_eq!(log.visited[1], LISTING_URL);
    assert_eq!(
        log.cookies,
        [
            ("session".to_string(), "abc".to_string(), ".trendyol.com".to_string()),
            ("country".to_string(), "TR".to_string(), ".trendyol.com".to_string()),
        ]
    );
}

#[tokio::test]
async fn unreachable_listing_leaves_the_store_untouched() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    pipeline(config.clone(), &shop()).run(&RunOptions::default()).await.unwrap();

    let down = shop().failing(LISTING_URL, 503);
    let second = pipeline(config, &down);
    let report = second.run(&RunOptions::default()).await.unwrap();

    assert_eq!(report.stubs_acquired, 0);
    assert!(matches!(report.warnings[..], [RunWarning::FetchFailure { .. }]));
    assert_eq!(records(&second).len(), 3);
    assert_eq!(store_reader::load_catalog(second.store()).unwrap().unwrap().len(), 3);
}
