//! HTTP-surface contracts: cache transparency headers, problem responses,
//! and the bulk partial-failure envelope.

use axum::Router;
use axum::body::Body;
use http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;
use trackgw::UpstreamError;
use trackgw::test_support::TestGateway;

async fn send(router: Router, request: Request<Body>) -> (StatusCode, http::HeaderMap, Value) {
    let response = router.oneshot(request).await.unwrap();
    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (parts.status, parts.headers, value)
}

async fn get(router: Router, uri: &str) -> (StatusCode, http::HeaderMap, Value) {
    send(
        router,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}

async fn post_json(router: Router, uri: &str, body: &Value) -> (StatusCode, http::HeaderMap, Value) {
    send(
        router,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

#[tokio::test]
async fn fetch_carries_cache_headers() {
    let t = TestGateway::builder().build();

    let (status, headers, _) = get(t.router(), "/tracker/v1/fetch/issues.get?id=123").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("x-cache").unwrap(), "MISS");
    assert_eq!(headers.get("x-cache-ttl").unwrap(), "60");

    let (status, headers, _) = get(t.router(), "/tracker/v1/fetch/issues.get?id=123").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("x-cache").unwrap(), "HIT");
}

#[tokio::test]
async fn bypass_header_forces_fresh_read_and_refreshes() {
    let t = TestGateway::builder().build();
    t.handler.respond("/rest/v2/issues/9", json!({"rev": 1}));
    get(t.router(), "/tracker/v1/fetch/issues.get?id=9").await;

    t.handler.respond("/rest/v2/issues/9", json!({"rev": 2}));
    let (_, headers, body) = send(
        t.router(),
        Request::builder()
            .uri("/tracker/v1/fetch/issues.get?id=9")
            .header("x-cache-bypass", "true")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(headers.get("x-cache").unwrap(), "BYPASS");
    assert_eq!(body["rev"], 2);

    // The immediately following plain read is a HIT with the fresh value.
    let (_, headers, body) = get(t.router(), "/tracker/v1/fetch/issues.get?id=9").await;
    assert_eq!(headers.get("x-cache").unwrap(), "HIT");
    assert_eq!(body["rev"], 2);
}

#[tokio::test]
async fn unknown_endpoint_is_a_problem_404() {
    let t = TestGateway::builder().build();
    let (status, headers, body) = get(t.router(), "/tracker/v1/fetch/issues.nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        headers.get(header::CONTENT_TYPE).unwrap(),
        "application/problem+json"
    );
    assert_eq!(body["type"], "trackgw:error:unknown-endpoint");
    assert_eq!(body["instance"], "/tracker/v1/fetch/issues.nope");
}

#[tokio::test]
async fn missing_parameter_is_a_problem_400_naming_it() {
    let t = TestGateway::builder().build();
    let (status, _, body) = get(t.router(), "/tracker/v1/fetch/issues.get").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "trackgw:error:missing-parameter");
    assert!(body["detail"].as_str().unwrap().contains("'id'"));
}

#[tokio::test]
async fn upstream_not_found_passes_through_as_404() {
    let t = TestGateway::builder().build();
    t.handler.fail(
        "/rest/v2/issues/404",
        UpstreamError::NotFound {
            detail: "gone".into(),
        },
    );
    let (status, _, body) = get(t.router(), "/tracker/v1/fetch/issues.get?id=404").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["type"], "trackgw:error:upstream-not-found");
}

#[tokio::test]
async fn mutate_returns_the_upstream_result() {
    let t = TestGateway::builder().build();
    t.handler
        .respond("/rest/v2/issues/5/status", json!({"id": "5", "state": "closed"}));
    let (status, _, body) = post_json(
        t.router(),
        "/tracker/v1/mutate/issues.set_status?id=5",
        &json!({"state": "closed"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "closed");
}

// Partial failure is a 200 with successes and failures in two separate
// ordered lists.
#[tokio::test]
async fn bulk_partial_failure_is_a_structured_200() {
    let t = TestGateway::builder().build();
    t.handler.fail(
        "/issues/missing/",
        UpstreamError::NotFound {
            detail: "issue 'missing' does not exist".into(),
        },
    );

    let (status, _, body) = post_json(
        t.router(),
        "/tracker/v1/issues/bulk",
        &json!({
            "operations": [
                {"target_id": "1", "op": "status", "data": {"state": "closed"}},
                {"target_id": "missing", "op": "status", "data": {"state": "closed"}},
                {"target_id": "3", "op": "tag", "data": {"tags": ["p1"]}},
            ]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["succeeded"], 2);
    assert_eq!(body["failed"], 1);
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
    assert_eq!(body["results"][0]["target_id"], "1");
    assert_eq!(body["results"][1]["target_id"], "3");
    assert_eq!(body["errors"].as_array().unwrap().len(), 1);
    assert_eq!(body["errors"][0]["target_id"], "missing");
    assert!(
        body["errors"][0]["error"]
            .as_str()
            .unwrap()
            .contains("does not exist")
    );
}

#[tokio::test]
async fn empty_bulk_request_is_rejected() {
    let t = TestGateway::builder().build();
    let (status, _, body) =
        post_json(t.router(), "/tracker/v1/issues/bulk", &json!({"operations": []})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "trackgw:error:validation");
}

#[tokio::test]
async fn malformed_bulk_operation_is_rejected_by_the_schema() {
    let t = TestGateway::builder().build();
    let (status, _, _) = post_json(
        t.router(),
        "/tracker/v1/issues/bulk",
        &json!({"operations": [{"target_id": "1", "op": "archive"}]}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn undeclared_query_params_are_ignored() {
    let t = TestGateway::builder().build();
    let (status, _, _) = get(
        t.router(),
        "/tracker/v1/fetch/issues.get?id=123&debug=1",
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let calls = t.handler.calls();
    assert_eq!(calls[0].path, "/rest/v2/issues/123");
}
