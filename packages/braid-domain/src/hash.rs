use std::{
	collections::hash_map::DefaultHasher,
	fmt::Write,
	hash::{Hash, Hasher},
};

use sha2::{Digest, Sha512};

/// Stable, non-cryptographic digest used for local root cache keys. Only
/// consistency matters here; collisions merely alias a cache slot.
pub fn hash_query(query: &str) -> String {
	let mut hasher = DefaultHasher::new();

	Hash::hash(query, &mut hasher);

	format!("{:x}", hasher.finish())
}

/// Local store key for the root of a thread started by `query`.
pub fn root_key(query: &str) -> String {
	format!("root-{}", hash_query(query))
}

/// Content identifier for the remote similarity store. Not a secret.
pub fn sha512_hex(input: &str) -> String {
	let digest = Sha512::digest(input.as_bytes());
	let mut out = String::with_capacity(digest.len() * 2);

	for byte in digest {
		let _ = write!(out, "{byte:02x}");
	}

	out
}
