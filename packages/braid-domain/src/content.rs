const SOURCES_MARKER: &str = "Sources:";

/// Splits an LLM answer on the literal `Sources:` marker. Everything before
/// the marker is the answer body; every non-empty line after it becomes one
/// citation. Answers without the marker keep their full body and no sources.
pub fn split_sources(raw: &str) -> (String, Vec<String>) {
	match raw.split_once(SOURCES_MARKER) {
		Some((body, tail)) => {
			let sources = tail
				.lines()
				.map(str::trim)
				.filter(|line| !line.is_empty())
				.map(ToString::to_string)
				.collect();

			(body.trim_end().to_string(), sources)
		},
		None => (raw.to_string(), Vec::new()),
	}
}
