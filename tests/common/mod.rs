//! 测试公共模块
//! 配置构造、模拟 GitHub / LLM 服务和请求辅助函数
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{HeaderMap, Method, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use http_body_util::BodyExt;
use issue_agent::{
    config::{AppConfig, GitHubConfig, LlmConfig, LoggingConfig, ServerConfig},
    middleware::AppState,
    routes,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::Secret;
use serde::Deserialize;
use serde_json::{json, Value};
use tower::ServiceExt;

pub const APP_PRIVATE_KEY: &str = include_str!("../fixtures/app_key.pem");
pub const APP_PUBLIC_KEY: &str = include_str!("../fixtures/app_key.pub.pem");
pub const APP_ID: &str = "4242";
pub const PERSONAL_TOKEN: &str = "personal-token";
pub const LLM_KEY: &str = "sk-test";

/// 创建测试配置
pub fn create_test_config(github_url: &str, llm_url: &str) -> AppConfig {
    AppConfig {
        server: ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            graceful_shutdown_timeout_secs: 5,
            body_limit_bytes: 1024 * 1024,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        },
        github: GitHubConfig {
            api_url: github_url.to_string(),
            web_url: "https://github.com".to_string(),
            app_id: None,
            private_key: None,
            private_key_path: None,
            installation_id: None,
            token: Some(Secret::new(PERSONAL_TOKEN.to_string())),
            webhook_secret: None,
            http_timeout_secs: 5,
            structure_max_depth: 2,
        },
        llm: LlmConfig {
            api_key: Some(Secret::new(LLM_KEY.to_string())),
            base_url: Some(llm_url.to_string()),
            model: Some("test-model".to_string()),
            use_deepseek: false,
            use_openrouter: false,
            openrouter_http_referer: None,
            temperature: 0.0,
            timeout_secs: 5,
        },
    }
}

/// Config authenticating as the GitHub App instead of a personal token.
pub fn with_app(mut config: AppConfig) -> AppConfig {
    config.github.app_id = Some(APP_ID.to_string());
    config.github.private_key = Some(Secret::new(APP_PRIVATE_KEY.to_string()));
    config.github.token = None;
    config
}

pub fn create_test_app(config: AppConfig) -> Router {
    let state = AppState::from_config(config).expect("app state");
    routes::create_router(Arc::new(state))
}

/// Serves `router` on an ephemeral port and returns its base URL.
pub async fn spawn_mock(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock");
    let addr = listener.local_addr().expect("mock addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("mock server");
    });
    format!("http://{}", addr)
}

pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).to_string())
        })
    };
    (status, headers, json)
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn json_request(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// ===== 模拟 LLM =====

#[derive(Default)]
pub struct MockLlm {
    answers: Mutex<VecDeque<String>>,
    pub prompts: Mutex<Vec<String>>,
}

impl MockLlm {
    pub fn with_answers(answers: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

pub async fn spawn_llm(llm: Arc<MockLlm>) -> String {
    let router = Router::new()
        .route("/chat/completions", post(chat_completions))
        .with_state(llm);
    spawn_mock(router).await
}

async fn chat_completions(
    State(llm): State<Arc<MockLlm>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let auth = headers.get("authorization").and_then(|v| v.to_str().ok());
    if auth != Some(&format!("Bearer {}", LLM_KEY)) {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }

    let user_prompt = body["messages"][1]["content"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    llm.prompts.lock().unwrap().push(user_prompt);

    match llm.answers.lock().unwrap().pop_front() {
        Some(answer) => Json(json!({
            "id": "chatcmpl-1",
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": answer } }]
        }))
        .into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "no scripted answer").into_response(),
    }
}

// ===== 模拟 GitHub =====

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub auth: Option<String>,
    pub body: Value,
}

/// How `POST /pulls` answers
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PullBehavior {
    /// 201 with PR #12
    Create,
    /// 422; an open PR with this number exists for the branch
    ExistingOpen(u64),
    /// 422; only a closed PR with this number exists for the branch
    ExistingClosed(u64),
    /// 422; the head branch is deleted before the answer
    BranchDeleted,
    /// 422; no PR can be found for the branch
    Unfindable,
}

pub struct MockGitHub {
    pub requests: Mutex<Vec<RecordedRequest>>,
    pub branches: Mutex<HashSet<String>>,
    pub files: Mutex<HashMap<String, String>>,
    /// Installation whose token can read the repository
    pub accessible_installation: u64,
    pub pulls: PullBehavior,
}

impl MockGitHub {
    pub fn new() -> Arc<Self> {
        Self::build(HashMap::new(), PullBehavior::Create)
    }

    pub fn with_files(files: &[(&str, &str)]) -> Arc<Self> {
        Self::build(
            files
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
            PullBehavior::Create,
        )
    }

    pub fn build(files: HashMap<String, String>, pulls: PullBehavior) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            branches: Mutex::new(HashSet::from(["main".to_string()])),
            files: Mutex::new(files),
            accessible_installation: 2,
            pulls,
        })
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn find(&self, method: &str, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    fn record(&self, method: &Method, uri: &Uri, headers: &HeaderMap, body: &Bytes) -> Option<String> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.requests.lock().unwrap().push(RecordedRequest {
            method: method.to_string(),
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            auth: auth.clone(),
            body: serde_json::from_slice(body).unwrap_or(Value::Null),
        });
        auth
    }

    fn token_allowed(&self, auth: Option<&str>) -> bool {
        let inst = format!("token inst-token-{}", self.accessible_installation);
        let personal = format!("token {}", PERSONAL_TOKEN);
        matches!(auth, Some(a) if a == inst || a == personal)
    }
}

pub async fn spawn_github(mock: Arc<MockGitHub>) -> String {
    let router = Router::new()
        .route("/app/installations", get(list_installations))
        .route("/app/installations/{id}/access_tokens", post(access_token))
        .route("/repos/{owner}/{repo}", get(get_repo))
        .route("/repos/{owner}/{repo}/issues/{number}", get(get_issue))
        .route("/repos/{owner}/{repo}/issues/{number}/comments", post(create_comment))
        .route("/repos/{owner}/{repo}/contents", get(list_root))
        .route(
            "/repos/{owner}/{repo}/contents/{*path}",
            get(get_contents).put(put_contents),
        )
        .route("/repos/{owner}/{repo}/git/ref/heads/{*branch}", get(get_ref))
        .route("/repos/{owner}/{repo}/git/refs", post(create_ref))
        .route("/repos/{owner}/{repo}/pulls", get(list_pulls).post(create_pull))
        .with_state(mock);
    spawn_mock(router).await
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "message": "Not Found" }))).into_response()
}

#[derive(Deserialize)]
struct AppClaims {
    iss: String,
}

fn app_jwt_valid(auth: Option<&str>) -> bool {
    let Some(token) = auth.and_then(|a| a.strip_prefix("Bearer ")) else {
        return false;
    };
    let key = DecodingKey::from_rsa_pem(APP_PUBLIC_KEY.as_bytes()).unwrap();
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_required_spec_claims(&["exp", "iat", "iss"]);
    matches!(decode::<AppClaims>(token, &key, &validation), Ok(data) if data.claims.iss == APP_ID)
}

async fn list_installations(
    State(mock): State<Arc<MockGitHub>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let auth = mock.record(&method, &uri, &headers, &body);
    if !app_jwt_valid(auth.as_deref()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!([{ "id": 1 }, { "id": mock.accessible_installation }])).into_response()
}

async fn access_token(
    State(mock): State<Arc<MockGitHub>>,
    Path(id): Path<u64>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let auth = mock.record(&method, &uri, &headers, &body);
    if !app_jwt_valid(auth.as_deref()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    (
        StatusCode::CREATED,
        Json(json!({ "token": format!("inst-token-{}", id), "expires_at": "2030-01-01T00:00:00Z" })),
    )
        .into_response()
}

async fn get_repo(
    State(mock): State<Arc<MockGitHub>>,
    Path((owner, repo)): Path<(String, String)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let auth = mock.record(&method, &uri, &headers, &body);
    if !mock.token_allowed(auth.as_deref()) || repo == "missing" {
        return not_found();
    }
    Json(json!({
        "name": repo,
        "full_name": format!("{}/{}", owner, repo),
        "description": "A tiny calculator",
        "html_url": format!("https://github.com/{}/{}", owner, repo),
        "language": "Python",
        "stargazers_count": 3,
        "forks_count": 1,
        "default_branch": "main"
    }))
    .into_response()
}

async fn get_issue(
    State(mock): State<Arc<MockGitHub>>,
    Path((owner, repo, number)): Path<(String, String, u64)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let auth = mock.record(&method, &uri, &headers, &body);
    if !mock.token_allowed(auth.as_deref()) || number != 7 {
        return not_found();
    }
    Json(json!({
        "number": number,
        "title": "add() returns None",
        "body": "Calling add(1, 2) returns None instead of 3.",
        "state": "open",
        "html_url": format!("https://github.com/{}/{}/issues/{}", owner, repo, number),
        "created_at": "2024-03-01T10:00:00Z",
        "updated_at": "2024-03-02T10:00:00Z",
        "user": { "login": "alice" }
    }))
    .into_response()
}

async fn create_comment(
    State(mock): State<Arc<MockGitHub>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    mock.record(&method, &uri, &headers, &body);
    (StatusCode::CREATED, Json(json!({ "id": 99 }))).into_response()
}

/// Listing of the directory `prefix` (empty for the root).
fn listing(files: &HashMap<String, String>, prefix: &str) -> Vec<Value> {
    let mut dirs = HashSet::new();
    let mut entries = Vec::new();
    let mut paths: Vec<&String> = files.keys().collect();
    paths.sort();

    for path in paths {
        let Some(rest) = path.strip_prefix(prefix) else {
            continue;
        };
        match rest.split_once('/') {
            Some((dir, _)) => {
                let full = format!("{}{}", prefix, dir);
                if dirs.insert(full.clone()) {
                    entries.push(json!({ "path": full, "type": "dir", "size": 0 }));
                }
            }
            None => entries.push(json!({
                "path": path,
                "type": "file",
                "size": files[path].len()
            })),
        }
    }
    entries
}

async fn list_root(
    State(mock): State<Arc<MockGitHub>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    mock.record(&method, &uri, &headers, &body);
    let files = mock.files.lock().unwrap();
    Json(listing(&files, "")).into_response()
}

/// Base64 wrapped at 60 columns, the way the contents API returns it.
fn wrapped_base64(content: &str) -> String {
    let encoded = STANDARD.encode(content.as_bytes());
    encoded
        .as_bytes()
        .chunks(60)
        .map(|c| String::from_utf8_lossy(c).to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

async fn get_contents(
    State(mock): State<Arc<MockGitHub>>,
    Path((_owner, _repo, path)): Path<(String, String, String)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    mock.record(&method, &uri, &headers, &body);
    let files = mock.files.lock().unwrap();

    if let Some(content) = files.get(&path) {
        return Json(json!({
            "type": "file",
            "path": path,
            "sha": format!("sha-{}", path),
            "encoding": "base64",
            "content": wrapped_base64(content)
        }))
        .into_response();
    }

    let entries = listing(&files, &format!("{}/", path));
    if entries.is_empty() {
        not_found()
    } else {
        Json(entries).into_response()
    }
}

async fn put_contents(
    State(mock): State<Arc<MockGitHub>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    mock.record(&method, &uri, &headers, &body);
    (StatusCode::CREATED, Json(json!({ "content": {}, "commit": { "sha": "c0ffee" } }))).into_response()
}

async fn get_ref(
    State(mock): State<Arc<MockGitHub>>,
    Path((_owner, _repo, branch)): Path<(String, String, String)>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    mock.record(&method, &uri, &headers, &body);
    if mock.branches.lock().unwrap().contains(&branch) {
        Json(json!({
            "ref": format!("refs/heads/{}", branch),
            "object": { "sha": format!("sha-{}", branch), "type": "commit" }
        }))
        .into_response()
    } else {
        not_found()
    }
}

async fn create_ref(
    State(mock): State<Arc<MockGitHub>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    mock.record(&method, &uri, &headers, &body);
    let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let branch = payload["ref"]
        .as_str()
        .and_then(|r| r.strip_prefix("refs/heads/"))
        .unwrap_or_default()
        .to_string();

    if mock.branches.lock().unwrap().insert(branch) {
        (StatusCode::CREATED, Json(payload)).into_response()
    } else {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "message": "Reference already exists" })),
        )
            .into_response()
    }
}

#[derive(Deserialize)]
struct PullsQuery {
    state: Option<String>,
}

async fn list_pulls(
    State(mock): State<Arc<MockGitHub>>,
    Query(query): Query<PullsQuery>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    mock.record(&method, &uri, &headers, &body);
    let found = match (mock.pulls, query.state.as_deref()) {
        (PullBehavior::ExistingOpen(number), Some("open") | Some("all")) => Some((number, "open")),
        (PullBehavior::ExistingClosed(number), Some("all")) => Some((number, "closed")),
        _ => None,
    };
    match found {
        Some((number, state)) => Json(json!([{
            "number": number,
            "html_url": format!("https://github.com/octo/calc/pull/{}", number),
            "state": state
        }]))
        .into_response(),
        None => Json(json!([])).into_response(),
    }
}

async fn create_pull(
    State(mock): State<Arc<MockGitHub>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    mock.record(&method, &uri, &headers, &body);
    if mock.pulls == PullBehavior::Create {
        return (
            StatusCode::CREATED,
            Json(json!({ "number": 12, "html_url": "https://github.com/octo/calc/pull/12" })),
        )
            .into_response();
    }

    if mock.pulls == PullBehavior::BranchDeleted {
        let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        if let Some(head) = payload["head"].as_str() {
            mock.branches.lock().unwrap().remove(head);
        }
    }
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "message": "Validation Failed" })),
    )
        .into_response()
}

pub fn decode_base64(content: &str) -> String {
    String::from_utf8(STANDARD.decode(content).unwrap()).unwrap()
}
