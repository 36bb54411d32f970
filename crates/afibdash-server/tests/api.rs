//! End-to-end API tests.
//!
//! The router runs in-process against an in-memory SQLite store. Turnstile
//! and the chat-completions API are replaced by small axum servers bound to
//! ephemeral local ports.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tower::ServiceExt;

use afibdash_core::{AppConfig, StoreBackend};
use afibdash_server::{build_router, AppState};
use afibdash_store::{NewClinicalPicture, SqliteStore, Store};
use afibdash_summarize::SummaryConfig;

const TURNSTILE_SECRET: &str = "turnstile-secret";
const CRON_SECRET: &str = "cron-secret";

// ---------------------------------------------------------------
// Harness
// ---------------------------------------------------------------

async fn spawn_upstream(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Siteverify stand-in accepting only `good-token` with the right secret.
async fn spawn_turnstile() -> String {
    let router = Router::new().route(
        "/siteverify",
        post(|body: String| async move {
            let ok = body.contains(&format!("secret={TURNSTILE_SECRET}"))
                && body.contains("response=good-token");
            Json(json!({ "success": ok }))
        }),
    );
    format!("{}/siteverify", spawn_upstream(router).await)
}

type Recorded = Arc<Mutex<Vec<Value>>>;

/// Chat-completions stand-in replying with `content` and recording requests.
async fn spawn_model(status: StatusCode, content: Option<&'static str>) -> (String, Recorded) {
    let seen: Recorded = Arc::new(Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let router = Router::new().route(
        "/v1/chat/completions",
        post(move |Json(body): Json<Value>| {
            let recorder = recorder.clone();
            async move {
                recorder.lock().push(body);
                (
                    status,
                    Json(json!({
                        "choices": [{ "message": { "role": "assistant", "content": content } }]
                    })),
                )
            }
        }),
    );
    (format!("{}/v1", spawn_upstream(router).await), seen)
}

fn app_config(verify_url: String) -> AppConfig {
    AppConfig {
        port: 0,
        development: false,
        store: StoreBackend::Sqlite { path: None },
        turnstile_secret: Some(TURNSTILE_SECRET.into()),
        turnstile_verify_url: verify_url,
        summary_secret: Some(CRON_SECRET.into()),
        summary_interval: None,
    }
}

fn summary_config(vars: &[(&str, &str)]) -> SummaryConfig {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    SummaryConfig::from_vars(|key| map.get(key).cloned())
}

/// Summary settings pointing at a chat-completions stand-in.
fn model_config(base_url: &str) -> SummaryConfig {
    summary_config(&[("OPENAI_API_KEY", "sk-test"), ("OPENAI_BASE_URL", base_url)])
}

fn build(config: AppConfig, summary: SummaryConfig) -> (Router, Arc<AppState>) {
    let store = Store::Sqlite(SqliteStore::open_in_memory().unwrap());
    let state = Arc::new(AppState::new(config, summary, store));
    (build_router(state.clone()), state)
}

fn default_app() -> (Router, Arc<AppState>) {
    build(
        app_config("http://127.0.0.1:9/siteverify".into()),
        summary_config(&[]),
    )
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    post_raw(uri, body.to_string())
}

fn post_raw(uri: &str, body: impl Into<String>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.into()))
        .unwrap()
}

fn from_ip(mut request: Request<Body>, ip: &str) -> Request<Body> {
    request
        .headers_mut()
        .insert("x-forwarded-for", ip.parse().unwrap());
    request
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

async fn create_element(app: &Router, name: &str, type_id: i64) {
    let (status, _, body) = send(
        app,
        post_json("/api/disease-element", &json!({ "name": name, "typeId": type_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

fn valid_share() -> Value {
    json!({
        "diagnosis": "Paroxysmal AFib",
        "description": "Episodes usually start late at night after a long day.",
        "diagnosisYear": 2019,
        "acknowledged": true,
        "captchaToken": "good-token",
    })
}

async fn seed_pictures(state: &AppState, count: usize) {
    for i in 0..count {
        state
            .store
            .insert_clinical_picture(&NewClinicalPicture {
                diagnosis: format!("Persistent AFib {i}"),
                description: "Started after a stressful week, mostly at rest in the evening."
                    .into(),
                diagnosis_year: Some(2020),
            })
            .await
            .unwrap();
    }
}

// ---------------------------------------------------------------
// Catalog and survey
// ---------------------------------------------------------------

#[tokio::test]
async fn test_health_reports_backend() {
    let (app, _) = default_app();
    let (status, _, body) = send(&app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "sqlite");
}

#[tokio::test]
async fn test_file_backed_store_opens() {
    let dir = tempfile::tempdir().unwrap();
    let backend = StoreBackend::Sqlite {
        path: Some(dir.path().join("data").join("afibdash.db")),
    };
    let store = Store::open(&backend).unwrap();
    let mut config = app_config(String::new());
    config.store = backend;
    let app = build_router(Arc::new(AppState::new(config, summary_config(&[]), store)));

    create_element(&app, "Coffee", 1).await;
    let (_, _, body) = send(&app, get("/api/disease-element/answers/count")).await;
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn test_categories_catalog() {
    let (app, _) = default_app();
    let (status, _, body) = send(&app, get("/api/categories")).await;
    assert_eq!(status, StatusCode::OK);
    let categories = body["categories"].as_array().unwrap();
    let slugs: Vec<&str> = categories.iter().map(|c| c["slug"].as_str().unwrap()).collect();
    assert_eq!(slugs, vec!["triggers", "symptoms", "supplements"]);
    assert_eq!(categories[1]["typeId"], 2);
    assert_eq!(categories[2]["fallbackCards"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_survey_cards_fall_back_when_empty() {
    let (app, _) = default_app();
    let (status, _, body) = send(&app, get("/api/disease-element?category=triggers")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fallback"], true);
    assert_eq!(body["cards"].as_array().unwrap().len(), 5);
    assert!(body["cards"][0].get("id").is_none());

    create_element(&app, "  Red wine ", 1).await;
    let (_, _, body) = send(&app, get("/api/disease-element?typeId=1")).await;
    assert_eq!(body["fallback"], false);
    assert_eq!(body["cards"][0]["title"], "Red wine");
    assert!(body["cards"][0]["id"].is_number());

    let (status, _, body) = send(&app, get("/api/disease-element?category=vitamins")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unknown category.");
}

// ---------------------------------------------------------------
// Element submissions
// ---------------------------------------------------------------

#[tokio::test]
async fn test_create_element_adds_default_yes_vote() {
    let (app, _) = default_app();
    let (status, _, body) = send(
        &app,
        post_json(
            "/api/disease-element",
            &json!({ "name": "Dehydration", "description": " Long runs ", "typeId": "1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));

    let (_, _, body) = send(&app, get("/api/disease-element/stats?typeId=1")).await;
    let stats = body["stats"].as_array().unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0]["name"], "Dehydration");
    assert_eq!(stats[0]["description"], "Long runs");
    assert_eq!(stats[0]["yes"], 1);
    assert_eq!(stats[0]["no"], 0);
    assert_eq!(stats[0]["diff"], 1);
}

#[tokio::test]
async fn test_create_element_rejections() {
    let (app, _) = default_app();

    let cases = [
        (json!({ "name": "   ", "typeId": 1 }), "Name is required."),
        (
            json!({ "name": "See heartforum.org", "typeId": 1 }),
            "Please remove personal contact info or links (emails, phone numbers, handles, URLs).",
        ),
        (json!({ "name": "Coffee", "typeId": 4 }), "Unknown category for this submission."),
    ];
    for (payload, message) in cases {
        let (status, _, body) = send(&app, post_json("/api/disease-element", &payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], message);
    }

    let (status, _, body) = send(&app, post_raw("/api/disease-element", "{oops")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid request body.");
}

#[tokio::test]
async fn test_create_element_rate_limited_per_ip() {
    let (app, _) = default_app();
    for _ in 0..12 {
        let (status, _, _) =
            send(&app, from_ip(post_raw("/api/disease-element", "{oops"), "203.0.113.5")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    let (status, headers, body) =
        send(&app, from_ip(post_raw("/api/disease-element", "{oops"), "203.0.113.5")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "Too many requests. Please wait and try again.");
    let retry_after: u64 = headers[header::RETRY_AFTER].to_str().unwrap().parse().unwrap();
    assert!((1..=600).contains(&retry_after));

    let (status, _, _) =
        send(&app, from_ip(post_raw("/api/disease-element", "{oops"), "198.51.100.1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------
// Votes
// ---------------------------------------------------------------

#[tokio::test]
async fn test_answers_update_cached_stats() {
    let (app, _) = default_app();
    create_element(&app, "Palpitations", 2).await;

    // Prime the stats cache.
    let (_, _, body) = send(&app, get("/api/disease-element/stats?category=symptoms")).await;
    let id = body["stats"][0]["id"].as_i64().unwrap();
    assert_eq!(body["stats"][0]["no"], 0);

    let (status, _, body) = send(
        &app,
        post_json(
            "/api/disease-element/answers",
            &json!({ "answers": [
                { "elementId": id, "answer": false },
                { "elementId": id, "answer": true },
                { "elementId": 9999, "answer": true },
                { "elementId": "x", "answer": true },
            ]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "saved": 1 }));

    let (_, _, body) = send(&app, get("/api/disease-element/stats?category=symptoms")).await;
    assert_eq!(body["stats"][0]["yes"], 1);
    assert_eq!(body["stats"][0]["no"], 1);
    assert_eq!(body["stats"][0]["diff"], 0);

    let (_, _, body) = send(&app, get("/api/disease-element/answers/count")).await;
    assert_eq!(body["count"], 2);
    let (_, _, body) = send(&app, get("/api/disease-element/answers/count?typeId=2")).await;
    assert_eq!(body["count"], 2);
    let (_, _, body) = send(&app, get("/api/disease-element/answers/count?typeId=3")).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_answers_rejections() {
    let (app, _) = default_app();

    let (status, _, body) =
        send(&app, post_json("/api/disease-element/answers", &json!({ "answers": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No answers provided.");

    let (status, _, body) = send(
        &app,
        post_json(
            "/api/disease-element/answers",
            &json!({ "answers": [{ "elementId": 42, "answer": true }] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No valid answers provided.");
}

#[tokio::test]
async fn test_answers_rate_limit_counts_parsed_requests_only() {
    let (app, _) = default_app();
    let ip = "192.0.2.44";

    // Unparsable bodies are rejected before the limiter sees them.
    for _ in 0..20 {
        let request = from_ip(post_raw("/api/disease-element/answers", "nope"), ip);
        let (status, _, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
    for _ in 0..12 {
        let (status, _, body) =
            send(&app, from_ip(post_json("/api/disease-element/answers", &json!({})), ip)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No answers provided.");
    }
    let (status, _, _) =
        send(&app, from_ip(post_json("/api/disease-element/answers", &json!({})), ip)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

// ---------------------------------------------------------------
// Clinical pictures
// ---------------------------------------------------------------

#[tokio::test]
async fn test_share_requires_verified_captcha() {
    let verify_url = spawn_turnstile().await;
    let (app, _) = build(app_config(verify_url), summary_config(&[]));

    let mut payload = valid_share();
    payload["captchaToken"] = json!("  ");
    let (status, _, body) = send(&app, post_json("/api/clinical-picture", &payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Captcha is required.");

    payload["captchaToken"] = json!("forged");
    let (status, _, body) = send(&app, post_json("/api/clinical-picture", &payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Captcha validation failed.");

    let mut payload = valid_share();
    payload["acknowledged"] = json!(false);
    let (status, _, body) = send(&app, post_json("/api/clinical-picture", &payload)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Please confirm this is a self-reported AFib diagnosis before submitting."
    );
}

#[tokio::test]
async fn test_share_without_secret_is_rejected() {
    let verify_url = spawn_turnstile().await;
    let mut config = app_config(verify_url);
    config.turnstile_secret = None;
    let (app, _) = build(config, summary_config(&[]));

    let (status, _, body) = send(&app, post_json("/api/clinical-picture", &valid_share())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Captcha validation failed.");
}

#[tokio::test]
async fn test_share_appears_in_feed() {
    let verify_url = spawn_turnstile().await;
    let (app, _) = build(app_config(verify_url), summary_config(&[]));

    // Prime the feed cache.
    let (_, _, body) = send(&app, get("/api/clinical-picture")).await;
    assert_eq!(body["totalCount"], 0);

    let (status, _, body) = send(&app, post_json("/api/clinical-picture", &valid_share())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body, json!({ "success": true }));

    let (_, _, body) = send(&app, get("/api/clinical-picture")).await;
    assert_eq!(body["totalCount"], 1);
    let record = &body["records"][0];
    assert_eq!(record["diagnosis"], "Paroxysmal AFib");
    assert_eq!(record["diagnosis_year"], 2019);
    assert!(record["created_at"].is_string());
}

#[tokio::test]
async fn test_share_rate_limit_is_six_per_window() {
    let (app, _) = default_app();
    for _ in 0..6 {
        let request = from_ip(post_json("/api/clinical-picture", &json!({})), "203.0.113.9");
        let (status, _, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
    let (status, _, _) =
        send(&app, from_ip(post_json("/api/clinical-picture", &json!({})), "203.0.113.9")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

// ---------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------

fn cron(mut request: Request<Body>) -> Request<Body> {
    request
        .headers_mut()
        .insert(header::AUTHORIZATION, format!("Bearer {CRON_SECRET}").parse().unwrap());
    request
}

#[tokio::test]
async fn test_summarize_guards() {
    let (app, _) = default_app();

    let (status, _, body) = send(&app, get("/api/clinical-picture/summarize")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"], "Method not allowed");

    let (status, _, body) = send(&app, post_raw("/api/clinical-picture/summarize", "")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    let (status, _, body) = send(&app, cron(post_raw("/api/clinical-picture/summarize", ""))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "OPENAI_API_KEY is missing.");

    let mut config = app_config(String::new());
    config.summary_secret = None;
    let (app, _) = build(config, summary_config(&[]));
    let (status, _, body) = send(&app, cron(post_raw("/api/clinical-picture/summarize", ""))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Server misconfigured");
}

#[tokio::test]
async fn test_summarize_without_rows() {
    let (model_url, seen) = spawn_model(StatusCode::OK, Some("{}")).await;
    let (app, _) = build(
        app_config(String::new()),
        model_config(&model_url),
    );
    let (status, _, body) = send(&app, cron(post_raw("/api/clinical-picture/summarize", ""))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No clinical pictures available to summarize.");
    assert!(seen.lock().is_empty());
}

#[tokio::test]
async fn test_summarize_stores_digest_and_refreshes_view() {
    let reply = r#"{
        "summary": "Most shares describe evening episodes. Some mention www.example.com forums.",
        "onset_setting": "At rest in the evening",
        "cofactor": "Stress",
        "insights": [
            "Evening onset is common",
            " ",
            "Stress is often mentioned",
            "Sleep loss noted",
            "Extra"
        ]
    }"#;
    let (model_url, seen) = spawn_model(StatusCode::OK, Some(reply)).await;
    let (app, state) = build(
        app_config(String::new()),
        model_config(&model_url),
    );
    seed_pictures(&state, 3).await;

    // Prime the summary cache with the empty view.
    let (_, _, body) = send(&app, get("/api/clinical-picture/summary")).await;
    assert_eq!(body["headline"], "AI summary");
    assert_eq!(body["narrative"], "No AI summary available yet.");
    assert_eq!(body["stats"], json!([]));

    let (status, _, body) = send(&app, cron(post_raw("/api/clinical-picture/summarize", ""))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body, json!({ "ok": true, "source_rows": 3, "sampled_rows": 3 }));

    let requests = seen.lock().clone();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request["model"], "gpt-4.1");
    assert_eq!(request["temperature"], 0.2);
    assert_eq!(request["response_format"]["type"], "json_object");
    let user = request["messages"][1]["content"].as_str().unwrap();
    assert!(user.starts_with("Total submissions (pre-count): 3\n"));
    assert!(user.contains("Sampled entries provided: 3"));

    let (_, _, body) = send(&app, get("/api/clinical-picture/summary")).await;
    assert_eq!(body["headline"], "AI summary from 3 clinical picture shares");
    assert_eq!(
        body["narrative"],
        "Most shares describe evening episodes. Some mention [redacted link] forums."
    );
    assert_eq!(
        body["highlights"],
        json!(["Evening onset is common", "Stress is often mentioned", "Sleep loss noted"])
    );
    assert_eq!(body["stats"][1]["value"], "At rest in the evening");
    assert_eq!(body["stats"][2]["value"], "Stress");
    assert!(body["updateNote"].as_str().unwrap().starts_with("Updates every 24 hours"));
}

#[tokio::test]
async fn test_summarize_reports_bad_model_replies() {
    let cases = [
        (StatusCode::OK, Some("not json"), "Failed to parse summary content."),
        (StatusCode::OK, Some(r#"{"summary": "x"}"#), "Invalid summary content."),
        (StatusCode::OK, None, "No summary generated."),
        (StatusCode::BAD_GATEWAY, Some("{}"), "Unable to generate summary right now."),
    ];

    for (status, content, message) in cases {
        let (model_url, _) = spawn_model(status, content).await;
        let (app, state) = build(
            app_config(String::new()),
            model_config(&model_url),
        );
        seed_pictures(&state, 1).await;

        let (code, _, body) =
            send(&app, cron(post_raw("/api/clinical-picture/summarize", ""))).await;
        assert_eq!(code, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], message);
        assert!(state.store.latest_summary().await.unwrap().is_none());
    }
}

#[tokio::test]
async fn test_summarize_open_in_development() {
    let (model_url, _) = spawn_model(
        StatusCode::OK,
        Some(r#"{"summary":"s","onset_setting":"o","cofactor":"c","insights":["i"]}"#),
    )
    .await;
    let mut config = app_config(String::new());
    config.development = true;
    config.summary_secret = None;
    let (app, state) = build(
        config,
        model_config(&model_url),
    );
    seed_pictures(&state, 2).await;

    let (status, _, body) = send(&app, post_raw("/api/clinical-picture/summarize", "")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source_rows"], 2);
}
