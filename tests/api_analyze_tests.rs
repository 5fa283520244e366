//! Issue 分析 API 集成测试

use axum::http::StatusCode;
use serde_json::json;

mod common;
use common::{
    create_test_app, create_test_config, get_request, json_request, send, spawn_github, spawn_llm,
    with_app, MockGitHub, MockLlm,
};

const SPEC: &str = "1. Problem: add() returns None\n2. Fix: return a + b in calc.py";

#[tokio::test]
async fn test_missing_issue_url() {
    let app = create_test_app(create_test_config("http://127.0.0.1:9", "http://127.0.0.1:9"));

    let (status, _, json) = send(app, json_request("/analyze", &json!({}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "issue_url is required (link to the issue)");
    assert!(json["request_id"].is_string());
}

#[tokio::test]
async fn test_empty_body_is_treated_as_empty_request() {
    let app = create_test_app(create_test_config("http://127.0.0.1:9", "http://127.0.0.1:9"));
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/analyze")
        .body(axum::body::Body::empty())
        .unwrap();

    let (status, _, json) = send(app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "issue_url is required (link to the issue)");
}

#[tokio::test]
async fn test_invalid_json_body() {
    let app = create_test_app(create_test_config("http://127.0.0.1:9", "http://127.0.0.1:9"));
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/analyze")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();

    let (status, _, json) = send(app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_non_github_url() {
    let app = create_test_app(create_test_config("http://127.0.0.1:9", "http://127.0.0.1:9"));

    let (status, _, json) = send(
        app,
        json_request("/analyze", &json!({ "issue_url": "https://gitlab.com/a/b/issues/1" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().starts_with("URL parse error:"));
}

#[tokio::test]
async fn test_issue_url_without_number() {
    let app = create_test_app(create_test_config("http://127.0.0.1:9", "http://127.0.0.1:9"));

    let (status, _, json) = send(
        app,
        get_request("/analyze?issue_url=https://github.com/octo/calc"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "issue_url must contain an issue number");
}

#[tokio::test]
async fn test_analyze_with_personal_token() {
    let github = MockGitHub::new();
    let llm = MockLlm::with_answers(&[SPEC]);
    let config = create_test_config(&spawn_github(github.clone()).await, &spawn_llm(llm.clone()).await);
    let app = create_test_app(config);

    let (status, _, json) = send(
        app,
        json_request(
            "/analyze",
            &json!({
                "repo_url": "https://github.com/octo/calc",
                "issue_url": "https://github.com/octo/calc/issues/7"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{}", json);
    assert_eq!(json["success"], true);
    assert_eq!(json["repository"]["name"], "calc");
    assert_eq!(json["repository"]["full_name"], "octo/calc");
    assert_eq!(json["repository"]["url"], "https://github.com/octo/calc");
    assert_eq!(json["issue"]["number"], 7);
    assert_eq!(json["issue"]["title"], "add() returns None");
    assert_eq!(json["issue"]["author"], "alice");
    assert_eq!(json["issue"]["state"], "open");
    assert_eq!(json["technical_spec"], SPEC);
    assert_eq!(json["message"], "Issue #7 \"add() returns None\" analyzed successfully");

    let issue_calls = github.find("GET", "/repos/octo/calc/issues/7");
    assert_eq!(issue_calls.len(), 1);
    assert_eq!(issue_calls[0].auth.as_deref(), Some("token personal-token"));

    let prompts = llm.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("add() returns None"));
    assert!(prompts[0].contains("octo/calc"));
}

#[tokio::test]
async fn test_analyze_get_with_query() {
    let github = MockGitHub::new();
    let llm = MockLlm::with_answers(&[SPEC]);
    let config = create_test_config(&spawn_github(github.clone()).await, &spawn_llm(llm).await);
    let app = create_test_app(config);

    let (status, _, json) = send(
        app,
        get_request("/analyze?issue_url=https%3A%2F%2Fgithub.com%2Focto%2Fcalc%2Fissues%2F7"),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{}", json);
    assert_eq!(json["issue"]["number"], 7);
    assert_eq!(json["technical_spec"], SPEC);
}

#[tokio::test]
async fn test_llm_failure_keeps_issue_data() {
    let github = MockGitHub::new();
    // 没有预设答案，模型返回 500
    let llm = MockLlm::with_answers(&[]);
    let config = create_test_config(&spawn_github(github).await, &spawn_llm(llm).await);
    let app = create_test_app(config);

    let (status, _, json) = send(
        app,
        json_request("/analyze", &json!({ "issue_url": "https://github.com/octo/calc/issues/7" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert!(json["technical_spec"].is_null());
    assert_eq!(json["issue"]["title"], "add() returns None");
}

#[tokio::test]
async fn test_missing_issue_is_server_error() {
    let github = MockGitHub::new();
    let config = create_test_config(
        &spawn_github(github).await,
        &spawn_llm(MockLlm::with_answers(&[])).await,
    );
    let app = create_test_app(config);

    let (status, _, json) = send(
        app,
        json_request("/analyze", &json!({ "issue_url": "https://github.com/octo/calc/issues/404" })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
    let error = json["error"].as_str().unwrap();
    assert!(error.starts_with("failed to get issue: 404"), "{}", error);
}

#[tokio::test]
async fn test_no_credentials() {
    let mut config = create_test_config("http://127.0.0.1:9", "http://127.0.0.1:9");
    config.github.token = None;
    let app = create_test_app(config);

    let (status, _, json) = send(
        app,
        json_request("/analyze", &json!({ "issue_url": "https://github.com/octo/calc/issues/7" })),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json["error"],
        "either GITHUB_INSTALLATION_ID or GITHUB_TOKEN is required"
    );
}

#[tokio::test]
async fn test_explicit_installation_id_as_string() {
    let github = MockGitHub::new();
    let llm = MockLlm::with_answers(&[SPEC]);
    let config = with_app(create_test_config(
        &spawn_github(github.clone()).await,
        &spawn_llm(llm).await,
    ));
    let app = create_test_app(config);

    let (status, _, json) = send(
        app,
        json_request(
            "/analyze",
            &json!({
                "issue_url": "https://github.com/octo/calc/issues/7",
                "installation_id": "2"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{}", json);
    assert_eq!(github.find("POST", "/app/installations/2/access_tokens").len(), 1);
    // 显式 id 不触发安装查找
    assert!(github.find("GET", "/app/installations").is_empty());

    let issue_calls = github.find("GET", "/repos/octo/calc/issues/7");
    assert_eq!(issue_calls[0].auth.as_deref(), Some("token inst-token-2"));
}

#[tokio::test]
async fn test_invalid_installation_id() {
    let app = create_test_app(create_test_config("http://127.0.0.1:9", "http://127.0.0.1:9"));

    let (status, _, json) = send(
        app,
        json_request(
            "/analyze",
            &json!({
                "issue_url": "https://github.com/octo/calc/issues/7",
                "installation_id": "abc"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "installation_id must be a number: abc");
}
