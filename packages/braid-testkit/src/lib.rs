//! Hermetic test plumbing: temp-dir stores, stub remote endpoints, and
//! fixtures. Unlike a real deployment, everything here lives in-process.

use std::{
	future::IntoFuture,
	sync::{
		Arc, Mutex,
		atomic::{AtomicU16, AtomicUsize, Ordering},
	},
};

use axum::{
	Json, Router,
	extract::State,
	http::StatusCode,
	routing::{get, post},
};
use serde_json::Value;
use tempfile::TempDir;
use tokio::{net::TcpListener, sync::oneshot};

use braid_config::Cache;
use braid_domain::{result::SearchResult, ttl};
use braid_storage::db::{PageStore, WorkerStore};

pub fn temp_dir() -> TempDir {
	TempDir::new().expect("Failed to create temp dir.")
}

pub async fn open_page_store(dir: &TempDir) -> PageStore {
	PageStore::open(&dir.path().join("page.db"), &Cache::default())
		.await
		.expect("Failed to open page store.")
}

pub async fn open_worker_store(dir: &TempDir) -> WorkerStore {
	WorkerStore::open(&dir.path().join("worker.db")).await.expect("Failed to open worker store.")
}

/// A full config pointing every remote surface at the given stub URLs,
/// with polling compressed so backoff-heavy paths stay fast under test.
pub fn test_config(
	dir: &TempDir,
	store_url: &str,
	llm_url: &str,
	ingress_url: &str,
	webhook_url: &str,
) -> braid_config::Config {
	braid_config::Config {
		service: braid_config::Service { log_level: "info".to_string() },
		storage: braid_config::Storage {
			page_path: dir.path().join("page.db"),
			worker_path: dir.path().join("worker.db"),
		},
		store: braid_config::Store { url: store_url.to_string(), key: "test-key".to_string() },
		llm: braid_config::Llm { url: llm_url.to_string(), timeout_ms: 2_000 },
		similarity: braid_config::Similarity {
			ingress_url: ingress_url.to_string(),
			api_key: "test-key".to_string(),
			timeout_ms: 2_000,
			poll_base_ms: 5,
			poll_max_attempts: 5,
		},
		sync: braid_config::SyncConfig {
			webhook_url: webhook_url.to_string(),
			replay_interval_secs: None,
		},
		cache: Cache::default(),
	}
}

pub fn sample_result(id: &str) -> SearchResult {
	SearchResult {
		id: id.to_string(),
		root_id: id.to_string(),
		parent_id: None,
		follow_up_query: None,
		title: "GraphQL".to_string(),
		content: "Use persisted queries [1].\n\nSources:\n1. https://example.com".to_string(),
		sources: Vec::new(),
		confidence: 95.0,
		category: "Engineering".to_string(),
		timestamp: ttl::now_ms(),
		replies: Vec::new(),
		is_cached: false,
	}
}

async fn serve(app: Router) -> (String, oneshot::Sender<()>) {
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind stub server.");
	let addr = listener.local_addr().expect("Failed to read stub server address.");
	let (tx, rx) = oneshot::channel();
	let server = axum::serve(listener, app).with_graceful_shutdown(async move {
		let _ = rx.await;
	});

	tokio::spawn(async move {
		let _ = server.into_future().await;
	});

	(format!("http://{addr}"), tx)
}

#[derive(Clone)]
struct WebhookState {
	status: Arc<AtomicU16>,
	received: Arc<Mutex<Vec<Value>>>,
}

/// A stand-in for the remote orchestrator webhook. `status` controls the
/// response code; every accepted body lands in `received`.
pub struct WebhookServer {
	pub url: String,
	pub status: Arc<AtomicU16>,
	pub received: Arc<Mutex<Vec<Value>>>,
	_shutdown: oneshot::Sender<()>,
}
impl WebhookServer {
	pub fn set_status(&self, status: u16) {
		self.status.store(status, Ordering::SeqCst);
	}

	pub fn received_payloads(&self) -> Vec<Value> {
		self.received.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}

pub async fn start_webhook_server() -> WebhookServer {
	let status = Arc::new(AtomicU16::new(200));
	let received = Arc::new(Mutex::new(Vec::new()));
	let state = WebhookState { status: status.clone(), received: received.clone() };
	let app = Router::new().route("/", post(webhook_handler)).with_state(state);
	let (url, shutdown) = serve(app).await;

	WebhookServer { url, status, received, _shutdown: shutdown }
}

async fn webhook_handler(State(state): State<WebhookState>, Json(body): Json<Value>) -> StatusCode {
	let status = state.status.load(Ordering::SeqCst);

	if (200..300).contains(&status) {
		state.received.lock().unwrap_or_else(|err| err.into_inner()).push(body);
	}

	StatusCode::from_u16(status).unwrap_or(StatusCode::OK)
}

#[derive(Clone)]
struct LlmState {
	content: Arc<Mutex<String>>,
	requests: Arc<Mutex<Vec<Value>>>,
	calls: Arc<AtomicUsize>,
	status: Arc<AtomicU16>,
}

/// A stand-in for the LLM edge function. Answers every query with the
/// configured content wrapped in one result.
pub struct LlmServer {
	pub url: String,
	pub content: Arc<Mutex<String>>,
	pub requests: Arc<Mutex<Vec<Value>>>,
	pub calls: Arc<AtomicUsize>,
	pub status: Arc<AtomicU16>,
	_shutdown: oneshot::Sender<()>,
}
impl LlmServer {
	pub fn set_content(&self, content: &str) {
		*self.content.lock().unwrap_or_else(|err| err.into_inner()) = content.to_string();
	}

	pub fn set_status(&self, status: u16) {
		self.status.store(status, Ordering::SeqCst);
	}

	pub fn call_count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn requests(&self) -> Vec<Value> {
		self.requests.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}

pub async fn start_llm_server(content: &str) -> LlmServer {
	let content = Arc::new(Mutex::new(content.to_string()));
	let requests = Arc::new(Mutex::new(Vec::new()));
	let calls = Arc::new(AtomicUsize::new(0));
	let status = Arc::new(AtomicU16::new(200));
	let state = LlmState {
		content: content.clone(),
		requests: requests.clone(),
		calls: calls.clone(),
		status: status.clone(),
	};
	let app = Router::new().route("/", post(llm_handler)).with_state(state);
	let (url, shutdown) = serve(app).await;

	LlmServer { url, content, requests, calls, status, _shutdown: shutdown }
}

async fn llm_handler(
	State(state): State<LlmState>,
	Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
	state.calls.fetch_add(1, Ordering::SeqCst);
	state.requests.lock().unwrap_or_else(|err| err.into_inner()).push(body);

	let status = StatusCode::from_u16(state.status.load(Ordering::SeqCst)).unwrap_or(StatusCode::OK);
	let content = state.content.lock().unwrap_or_else(|err| err.into_inner()).clone();
	let mut result = sample_result("llm-answer");

	result.content = content;

	(status, Json(serde_json::json!({ "results": [result] })))
}

#[derive(Clone)]
struct SimilarityState {
	ingress_calls: Arc<AtomicUsize>,
	ingress_status: Arc<AtomicU16>,
	poll_calls: Arc<AtomicUsize>,
	empty_polls: Arc<AtomicUsize>,
	rows: Arc<Mutex<Vec<Value>>>,
	join_rows: Arc<Mutex<Vec<Value>>>,
}

/// One server standing in for both the similarity ingress and the remote
/// result store's REST surface. The first `empty_polls` store polls return
/// nothing, then `rows` appear.
pub struct SimilarityServer {
	pub url: String,
	pub ingress_url: String,
	pub ingress_calls: Arc<AtomicUsize>,
	pub ingress_status: Arc<AtomicU16>,
	pub poll_calls: Arc<AtomicUsize>,
	pub empty_polls: Arc<AtomicUsize>,
	pub rows: Arc<Mutex<Vec<Value>>>,
	pub join_rows: Arc<Mutex<Vec<Value>>>,
	_shutdown: oneshot::Sender<()>,
}
impl SimilarityServer {
	pub fn set_rows(&self, rows: Vec<Value>, join_rows: Vec<Value>, empty_polls: usize) {
		*self.rows.lock().unwrap_or_else(|err| err.into_inner()) = rows;
		*self.join_rows.lock().unwrap_or_else(|err| err.into_inner()) = join_rows;
		self.empty_polls.store(empty_polls, Ordering::SeqCst);
	}

	pub fn poll_count(&self) -> usize {
		self.poll_calls.load(Ordering::SeqCst)
	}

	pub fn ingress_count(&self) -> usize {
		self.ingress_calls.load(Ordering::SeqCst)
	}
}

pub async fn start_similarity_server() -> SimilarityServer {
	let state = SimilarityState {
		ingress_calls: Arc::new(AtomicUsize::new(0)),
		ingress_status: Arc::new(AtomicU16::new(200)),
		poll_calls: Arc::new(AtomicUsize::new(0)),
		empty_polls: Arc::new(AtomicUsize::new(usize::MAX)),
		rows: Arc::new(Mutex::new(Vec::new())),
		join_rows: Arc::new(Mutex::new(Vec::new())),
	};
	let app = Router::new()
		.route("/ingress", post(ingress_handler))
		.route("/rest/v1/cachedQueryResults", get(poll_handler))
		.route("/rest/v1/cache", get(join_handler))
		.with_state(state.clone());
	let (url, shutdown) = serve(app).await;

	SimilarityServer {
		ingress_url: format!("{url}/ingress"),
		url,
		ingress_calls: state.ingress_calls,
		ingress_status: state.ingress_status,
		poll_calls: state.poll_calls,
		empty_polls: state.empty_polls,
		rows: state.rows,
		join_rows: state.join_rows,
		_shutdown: shutdown,
	}
}

async fn ingress_handler(State(state): State<SimilarityState>, Json(_): Json<Value>) -> StatusCode {
	state.ingress_calls.fetch_add(1, Ordering::SeqCst);

	StatusCode::from_u16(state.ingress_status.load(Ordering::SeqCst)).unwrap_or(StatusCode::OK)
}

async fn poll_handler(State(state): State<SimilarityState>) -> Json<Value> {
	let call = state.poll_calls.fetch_add(1, Ordering::SeqCst);

	if call < state.empty_polls.load(Ordering::SeqCst) {
		return Json(serde_json::json!([]));
	}

	let rows = state.rows.lock().unwrap_or_else(|err| err.into_inner()).clone();

	Json(Value::Array(rows))
}

async fn join_handler(State(state): State<SimilarityState>) -> Json<Value> {
	let rows = state.join_rows.lock().unwrap_or_else(|err| err.into_inner()).clone();

	Json(Value::Array(rows))
}
