pub const PARENT_CONTEXT_CHARS: usize = 200;

pub const INITIAL_PROMPT: &str = "You are an AI search assistant. Answer the user's query with a \
	concise, well-structured markdown summary. Cite your evidence with numbered references like \
	[1] in the body, and end the answer with a 'Sources:' section listing one citation per line.";

/// Follow-up queries carry the opening of the parent answer so the model
/// stays on the same thread of conversation.
pub fn follow_up_prompt(parent_content: &str) -> String {
	let context: String = parent_content.chars().take(PARENT_CONTEXT_CHARS).collect();

	format!(
		"You are an AI search assistant answering a follow-up question. The previous answer \
		began: \"{context}\". Stay consistent with that context. Cite your evidence with \
		numbered references like [1] in the body, and end the answer with a 'Sources:' section \
		listing one citation per line."
	)
}
