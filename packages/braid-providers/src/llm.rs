use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use braid_domain::result::SearchResult;

use crate::Result;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LlmRequest<'a> {
	query: &'a str,
	system_prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct LlmResponse {
	results: Vec<SearchResult>,
}

/// One round trip to the LLM edge function. The configured timeout is the
/// call's hard deadline; the edge function is otherwise opaque.
pub async fn complete(
	cfg: &braid_config::Llm,
	query: &str,
	system_prompt: &str,
) -> Result<Vec<SearchResult>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let res = client.post(&cfg.url).json(&LlmRequest { query, system_prompt }).send().await?;
	let parsed: LlmResponse = res.error_for_status()?.json().await?;

	Ok(parsed.results)
}
