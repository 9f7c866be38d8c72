use serde::{Deserialize, Serialize};

use crate::{result::SearchResult, sync::SyncSubmission};

/// Messages the page posts to the worker context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
	Ping,
	ClientReady,
	SyncData { payload: SyncSubmission },
	CacheNewEntry { results: Vec<SearchResult> },
}

/// Messages the worker posts back to page clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
	Pong,
	SyncSuccess,
	SyncReceived,
}
