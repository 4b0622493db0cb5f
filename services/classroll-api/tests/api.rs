//! End-to-end tests of the classroll-api router

use axum::{
    http::{header, HeaderName, HeaderValue, StatusCode},
    Extension,
};
use axum_test::TestServer;
use classroll::{config::RateLimitConfig, prelude::*};
use classroll_api::{router, AppState};
use serde_json::{json, Value as JsonValue};

const ROOT: &str = "http://localhost:5000";
const REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const CLIENT_ID: HeaderName = HeaderName::from_static("x-client-id");

fn server_with_limit(limit: u32) -> TestServer {
    let config = RateLimitConfig {
        enabled: true,
        limit,
        period_secs: 15,
    };
    let pipeline = Pipeline::new(config, Some(RateLimiter::in_memory()));
    let app = router(AppState::new(10), &pipeline)
        .unwrap()
        .layer(Extension(PublicUrl::parse(ROOT).unwrap()));
    TestServer::new(app).unwrap()
}

fn server() -> TestServer {
    server_with_limit(1000)
}

/// Path part of an absolute URL the service handed out
fn path_of(url: &str) -> &str {
    url.strip_prefix(ROOT).unwrap()
}

async fn create(server: &TestServer, path: &str, body: JsonValue) -> String {
    let response = server.post(path).json(&body).await;
    response.assert_status(StatusCode::CREATED);
    response
        .header(header::LOCATION)
        .to_str()
        .unwrap()
        .to_string()
}

async fn seed_students(server: &TestServer) {
    for name in ["susan", "john", "sam", "Sara", "bob"] {
        create(server, "/v1/students/", json!({ "name": name })).await;
    }
}

#[tokio::test]
async fn test_catalog() {
    let server = server();

    let response = server.get("/").await;
    response.assert_status_ok();
    assert!(response.maybe_header(header::ETAG).is_some());
    assert_eq!(
        response.json::<JsonValue>(),
        json!({
            "versions": {
                "v1": {
                    "students_url": "http://localhost:5000/v1/students/",
                    "classes_url": "http://localhost:5000/v1/classes/",
                    "registrations_url": "http://localhost:5000/v1/registrations/"
                }
            }
        })
    );
}

#[tokio::test]
async fn test_create_and_fetch_student() {
    let server = server();

    let response = server.post("/v1/students/").json(&json!({"name": "susan"})).await;
    response.assert_status(StatusCode::CREATED);
    assert_eq!(response.json::<JsonValue>(), json!({}));
    let location = response.header(header::LOCATION);
    assert_eq!(location, "http://localhost:5000/v1/students/1");

    let response = server.get("/v1/students/1").await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<JsonValue>(),
        json!({
            "self_url": "http://localhost:5000/v1/students/1",
            "name": "susan",
            "registrations_url": "http://localhost:5000/v1/students/1/registrations/"
        })
    );
}

#[tokio::test]
async fn test_invalid_bodies_are_bad_requests() {
    let server = server();

    let response = server.post("/v1/students/").json(&json!({"nom": "susan"})).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<JsonValue>(),
        json!({"status": 400, "error": "bad request", "message": "Invalid student: missing name"})
    );

    let response = server.post("/v1/classes/").text("name=algebra").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<JsonValue>()["message"], "invalid request");
}

#[tokio::test]
async fn test_collection_links_round_trip() {
    let server = server();
    seed_students(&server).await;

    let first = server.get("/v1/students/?sort=id,desc&per_page=2").await;
    first.assert_status_ok();
    let first = first.json::<JsonValue>();
    assert_eq!(
        first["students"],
        json!([
            "http://localhost:5000/v1/students/5",
            "http://localhost:5000/v1/students/4"
        ])
    );
    assert_eq!(first["meta"]["total"], 5);
    assert_eq!(first["meta"]["pages"], 3);
    assert_eq!(first["meta"]["prev_url"], JsonValue::Null);

    let next_url = first["meta"]["next_url"].as_str().unwrap();
    assert!(next_url.contains("sort=id%2Cdesc"));
    let second = server.get(path_of(next_url)).await.json::<JsonValue>();
    assert_eq!(second["meta"]["page"], 2);
    assert_eq!(
        second["students"],
        json!([
            "http://localhost:5000/v1/students/3",
            "http://localhost:5000/v1/students/2"
        ])
    );

    let prev_url = second["meta"]["prev_url"].as_str().unwrap();
    let back = server.get(path_of(prev_url)).await.json::<JsonValue>();
    assert_eq!(back["students"], first["students"]);

    let last_url = first["meta"]["last_url"].as_str().unwrap();
    let last = server.get(path_of(last_url)).await.json::<JsonValue>();
    assert_eq!(last["students"], json!(["http://localhost:5000/v1/students/1"]));
    assert_eq!(last["meta"]["next_url"], JsonValue::Null);
}

#[tokio::test]
async fn test_collection_filter_and_expand() {
    let server = server();
    seed_students(&server).await;

    let response = server
        .get("/v1/students/?filter=name,like,s%25&sort=name&expand=1")
        .await
        .json::<JsonValue>();
    let names: Vec<_> = response["students"]
        .as_array()
        .unwrap()
        .iter()
        .map(|student| student["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Sara", "sam", "susan"]);
    assert_eq!(response["meta"]["total"], 3);

    // malformed clauses are ignored
    let response = server
        .get("/v1/students/?filter=id,gt,abc;nickname,eq,x")
        .await
        .json::<JsonValue>();
    assert_eq!(response["meta"]["total"], 5);
}

#[tokio::test]
async fn test_conditional_requests() {
    let server = server();
    create(&server, "/v1/classes/", json!({"name": "algebra"})).await;

    let response = server.get("/v1/classes/1").await;
    response.assert_status_ok();
    let etag = response.header(header::ETAG);
    assert_eq!(response.header(header::CACHE_CONTROL), "max-age=86400");

    let response = server
        .get("/v1/classes/1")
        .add_header(header::IF_NONE_MATCH, etag.clone())
        .await;
    response.assert_status(StatusCode::NOT_MODIFIED);
    assert_eq!(response.header(header::ETAG), etag);
    assert!(response.text().is_empty());

    let response = server
        .get("/v1/classes/1")
        .add_header(header::IF_MATCH, HeaderValue::from_static("\"stale\""))
        .await;
    response.assert_status(StatusCode::PRECONDITION_FAILED);
    assert_eq!(
        response.json::<JsonValue>(),
        json!({"status": 412, "error": "precondition failed"})
    );

    server
        .put("/v1/classes/1")
        .json(&json!({"name": "geometry"}))
        .await
        .assert_status_ok();

    let response = server
        .get("/v1/classes/1")
        .add_header(header::IF_NONE_MATCH, etag.clone())
        .await;
    response.assert_status_ok();
    assert_ne!(response.header(header::ETAG), etag);
    assert_eq!(response.json::<JsonValue>()["name"], "geometry");
}

#[tokio::test]
async fn test_rate_limit_per_operation_and_client() {
    let server = server_with_limit(5);
    let alice = HeaderValue::from_static("alice");

    for remaining in ["4", "3", "2", "1", "0"] {
        let response = server
            .get("/v1/students/")
            .add_header(CLIENT_ID, alice.clone())
            .await;
        response.assert_status_ok();
        assert_eq!(response.header(REMAINING), remaining);
        assert_eq!(response.header(LIMIT), "5");
    }

    let response = server
        .get("/v1/students/")
        .add_header(CLIENT_ID, alice.clone())
        .await;
    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.header(REMAINING), "0");
    assert_eq!(
        response.json::<JsonValue>(),
        json!({
            "status": 429,
            "error": "too many requests",
            "message": "You have exceeded your request rate"
        })
    );

    // other clients and other operations have their own windows
    let response = server
        .get("/v1/students/")
        .add_header(CLIENT_ID, HeaderValue::from_static("bob"))
        .await;
    response.assert_status_ok();
    assert_eq!(response.header(REMAINING), "4");

    let response = server.get("/v1/classes/").add_header(CLIENT_ID, alice).await;
    response.assert_status_ok();
    assert_eq!(response.header(REMAINING), "4");

    // the catalog is not rate limited
    let response = server.get("/").await;
    response.assert_status_ok();
    assert!(response.maybe_header(REMAINING).is_none());
}

#[tokio::test]
async fn test_registrations_and_cascade() {
    let server = server();
    let student = create(&server, "/v1/students/", json!({"name": "susan"})).await;
    let algebra = create(&server, "/v1/classes/", json!({"name": "algebra"})).await;
    let biology = create(&server, "/v1/classes/", json!({"name": "biology"})).await;

    let location = create(
        &server,
        "/v1/registrations/",
        json!({"student_url": student, "class_url": algebra}),
    )
    .await;
    assert_eq!(location, "http://localhost:5000/v1/registrations/1/1");

    let registration = server.get(path_of(&location)).await.json::<JsonValue>();
    assert_eq!(registration["student_url"], "http://localhost:5000/v1/students/1");
    assert_eq!(registration["class_url"], "http://localhost:5000/v1/classes/1");
    assert!(registration["timestamp"].as_str().unwrap().ends_with('Z'));

    create(
        &server,
        "/v1/students/1/registrations/",
        json!({"class_url": biology}),
    )
    .await;

    let response = server
        .post("/v1/registrations/")
        .json(&json!({"student_url": student, "class_url": "http://localhost:5000/v1/classes/9"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<JsonValue>()["message"], "Invalid class URL");

    let mine = server
        .get("/v1/students/1/registrations/")
        .await
        .json::<JsonValue>();
    assert_eq!(mine["meta"]["total"], 2);

    server.delete("/v1/classes/1").await.assert_status_ok();
    server
        .get(path_of(&location))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let all = server.get("/v1/registrations/").await.json::<JsonValue>();
    assert_eq!(
        all["registrations"],
        json!(["http://localhost:5000/v1/registrations/1/2"])
    );
}

#[tokio::test]
async fn test_nested_registrations_are_scoped() {
    let server = server();
    seed_students(&server).await;
    let algebra = create(&server, "/v1/classes/", json!({"name": "algebra"})).await;
    let biology = create(&server, "/v1/classes/", json!({"name": "biology"})).await;
    for (student, class) in [(1, &algebra), (2, &biology), (3, &algebra)] {
        create(
            &server,
            "/v1/registrations/",
            json!({"student_url": format!("{ROOT}/v1/students/{student}"), "class_url": class}),
        )
        .await;
    }

    let response = server
        .get("/v1/classes/1/registrations/?sort=student_id,desc")
        .await
        .json::<JsonValue>();
    assert_eq!(
        response["registrations"],
        json!([
            "http://localhost:5000/v1/registrations/3/1",
            "http://localhost:5000/v1/registrations/1/1"
        ])
    );

    // the request's own filters narrow further; they cannot widen the scope
    let response = server
        .get("/v1/classes/1/registrations/?filter=class_id,eq,2")
        .await
        .json::<JsonValue>();
    assert_eq!(response["meta"]["total"], 0);

    server
        .get("/v1/classes/9/registrations/")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_repeated_query_parameters() {
    let server = server();
    seed_students(&server).await;

    let response = server
        .get("/v1/students/?per_page=2&per_page=1&page=2&page=3")
        .await;
    response.assert_status_ok();
    let body = response.json::<JsonValue>();
    assert_eq!(body["meta"]["page"], 2);
    assert_eq!(body["meta"]["per_page"], 2);
    assert_eq!(
        body["students"],
        json!([
            "http://localhost:5000/v1/students/3",
            "http://localhost:5000/v1/students/4"
        ])
    );
}

#[tokio::test]
async fn test_unknown_routes_and_methods() {
    let server = server();

    let response = server.get("/v2/students/").await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(
        response.json::<JsonValue>(),
        json!({"status": 404, "error": "not found", "message": "item not found"})
    );

    server
        .get("/v1/students/abc")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .get("/v1/students/7")
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let response = server.delete("/v1/students/").await;
    response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        response.json::<JsonValue>(),
        json!({"status": 405, "error": "method not allowed"})
    );
}
