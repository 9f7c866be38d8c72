pub mod llm;
pub mod similarity;
pub mod store;

mod error;

pub use error::{Error, Result};

use reqwest::header::{AUTHORIZATION, HeaderMap};

/// Headers for the remote result store's REST surface: the key doubles as
/// the `apikey` header and the bearer token.
pub fn store_headers(key: &str) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert("apikey", key.parse()?);
	headers.insert(AUTHORIZATION, format!("Bearer {key}").parse()?);

	Ok(headers)
}
