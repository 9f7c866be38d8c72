use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub store: Store,
	pub llm: Llm,
	pub similarity: Similarity,
	pub sync: SyncConfig,
	#[serde(default)]
	pub cache: Cache,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

/// Paths of the two private stores. The page and the worker never open each
/// other's file.
#[derive(Debug, Deserialize)]
pub struct Storage {
	pub page_path: PathBuf,
	pub worker_path: PathBuf,
}

/// The remote similarity/result store (an opaque REST surface).
#[derive(Debug, Deserialize)]
pub struct Store {
	pub url: String,
	pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct Llm {
	pub url: String,
	#[serde(default = "default_llm_timeout_ms")]
	pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Similarity {
	pub ingress_url: String,
	pub api_key: String,
	#[serde(default = "default_ingress_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default = "default_poll_base_ms")]
	pub poll_base_ms: u64,
	#[serde(default = "default_poll_max_attempts")]
	pub poll_max_attempts: u32,
}

#[derive(Debug, Deserialize)]
pub struct SyncConfig {
	pub webhook_url: String,
	/// Optional hint enabling periodic queue replay while the worker is
	/// alive. Absent on platforms without background sync; the push path
	/// still covers the common case.
	pub replay_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Cache {
	pub ttl_hours: i64,
	pub history_limit: u32,
	pub retention_hours: i64,
}
impl Default for Cache {
	fn default() -> Self {
		Self { ttl_hours: 24, history_limit: 50, retention_hours: 24 }
	}
}

fn default_llm_timeout_ms() -> u64 {
	60_000
}

fn default_ingress_timeout_ms() -> u64 {
	10_000
}

fn default_poll_base_ms() -> u64 {
	1_000
}

fn default_poll_max_attempts() -> u32 {
	5
}
