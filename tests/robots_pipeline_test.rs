//! Integration coverage for the Request Pipeline's cache/robots composition,
//! run without a real browser (`IrisConfig::for_tests()` puts the browser
//! pool in testing mode, where a launch failure just reports "not
//! connected" instead of failing the test process).

use iris_fetch::config::IrisConfig;
use iris_fetch::error::FetchErrorType;
use iris_fetch::types::FetchRequest;
use iris_fetch::{build_pipeline, cache::make_cache_key};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request_for(url: &str) -> FetchRequest {
    FetchRequest {
        url: url.to_string(),
        wait_for_selector: None,
        wait_strategy: Default::default(),
        wait_after_load_ms: None,
        extract_text: true,
        extract_links: false,
        extract_metadata: true,
        screenshot: false,
        timeout_ms: None,
        cache: true,
        headers: None,
    }
}

#[tokio::test]
async fn robots_disallow_blocks_fetch_before_browser_is_touched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /\n"))
        .mount(&server)
        .await;

    let config = IrisConfig::for_tests();
    let pipeline = build_pipeline(config).await.expect("pipeline builds even without a real browser");

    let blocked_url = format!("{}/private", server.uri());
    let response = pipeline.fetch(&request_for(&blocked_url)).await;

    let error = response.error.expect("robots.txt disallow should produce an error response");
    assert_eq!(error.error_type, FetchErrorType::BlockedByRobotsTxt);
    assert!(!error.retryable);
}

#[tokio::test]
async fn robots_allow_falls_through_to_the_browser_layer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /\n"))
        .mount(&server)
        .await;

    let config = IrisConfig::for_tests();
    let pipeline = build_pipeline(config).await.expect("pipeline builds even without a real browser");

    let allowed_url = format!("{}/ok", server.uri());
    let response = pipeline.fetch(&request_for(&allowed_url)).await;

    // No real browser is running in testing mode, so the request still fails,
    // but it must fail at the pool-acquire step, never at robots.
    let error = response.error.expect("no browser means the fetch still errors");
    assert_ne!(error.error_type, FetchErrorType::BlockedByRobotsTxt);
}

#[tokio::test]
async fn cache_without_redis_degrades_to_a_no_op_rather_than_erroring() {
    let config = IrisConfig::for_tests();
    let pipeline = build_pipeline(config).await.expect("pipeline builds even without a real browser");

    let url = "https://example.com/cached-page";
    let key = make_cache_key(
        url,
        &[
            ("extract_text", json!(true)),
            ("extract_links", json!(false)),
            ("extract_metadata", json!(true)),
            ("screenshot", json!(false)),
        ],
    );

    let mut cached_response = iris_fetch::types::FetchResponse::default();
    cached_response.url = url.to_string();
    cached_response.status_code = 200;
    pipeline.cache.set(&key, &cached_response, None).await;

    // No REDIS_URL configured in test settings: set() is a no-op, so the
    // following get() must still miss rather than panicking or erroring.
    assert!(pipeline.cache.get(&key).await.is_none());
    assert!(!pipeline.cache.is_connected());
}

#[tokio::test]
async fn malformed_url_is_rejected_before_any_downstream_work() {
    let config = IrisConfig::for_tests();
    let pipeline = build_pipeline(config).await.expect("pipeline builds even without a real browser");

    let response = pipeline.fetch(&request_for("not a url at all")).await;
    let error = response.error.expect("malformed URL must produce a structured error, never a panic");
    assert_eq!(error.error_type, FetchErrorType::InvalidUrl);
    assert!(!error.retryable);
    assert_eq!(response.status_code, 0);
}
