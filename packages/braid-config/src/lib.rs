mod types;

use std::{fs, path::Path};

use color_eyre::eyre;

pub use types::{Cache, Config, Llm, Service, Similarity, Storage, Store, SyncConfig};

pub fn load(path: &Path) -> color_eyre::Result<Config> {
	let raw = fs::read_to_string(path)?;
	let mut cfg: Config = toml::from_str(&raw)?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

// Remote URLs are joined with fixed paths later; a trailing slash would
// produce `//` in every request.
fn normalize(cfg: &mut Config) {
	for url in [
		&mut cfg.store.url,
		&mut cfg.llm.url,
		&mut cfg.similarity.ingress_url,
		&mut cfg.sync.webhook_url,
	] {
		while url.ends_with('/') {
			url.pop();
		}
	}
}

pub fn validate(cfg: &Config) -> color_eyre::Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(eyre::eyre!("service.log_level must be non-empty."));
	}
	if cfg.storage.page_path.as_os_str().is_empty() {
		return Err(eyre::eyre!("storage.page_path must be non-empty."));
	}
	if cfg.storage.worker_path.as_os_str().is_empty() {
		return Err(eyre::eyre!("storage.worker_path must be non-empty."));
	}
	if cfg.storage.page_path == cfg.storage.worker_path {
		return Err(eyre::eyre!("storage.page_path and storage.worker_path must differ."));
	}

	for (label, url) in [
		("store.url", &cfg.store.url),
		("llm.url", &cfg.llm.url),
		("similarity.ingress_url", &cfg.similarity.ingress_url),
		("sync.webhook_url", &cfg.sync.webhook_url),
	] {
		if !url.starts_with("http://") && !url.starts_with("https://") {
			return Err(eyre::eyre!("{label} must be an http(s) URL."));
		}
	}

	if cfg.store.key.trim().is_empty() {
		return Err(eyre::eyre!("store.key must be non-empty."));
	}
	if cfg.similarity.api_key.trim().is_empty() {
		return Err(eyre::eyre!("similarity.api_key must be non-empty."));
	}
	if cfg.llm.timeout_ms == 0 {
		return Err(eyre::eyre!("llm.timeout_ms must be greater than zero."));
	}
	if cfg.similarity.poll_base_ms == 0 {
		return Err(eyre::eyre!("similarity.poll_base_ms must be greater than zero."));
	}
	if cfg.similarity.poll_max_attempts == 0 {
		return Err(eyre::eyre!("similarity.poll_max_attempts must be greater than zero."));
	}
	if let Some(interval) = cfg.sync.replay_interval_secs
		&& interval == 0
	{
		return Err(eyre::eyre!("sync.replay_interval_secs must be greater than zero when set."));
	}
	if cfg.cache.ttl_hours <= 0 {
		return Err(eyre::eyre!("cache.ttl_hours must be greater than zero."));
	}
	if cfg.cache.history_limit == 0 {
		return Err(eyre::eyre!("cache.history_limit must be greater than zero."));
	}
	if cfg.cache.retention_hours <= 0 {
		return Err(eyre::eyre!("cache.retention_hours must be greater than zero."));
	}

	Ok(())
}
