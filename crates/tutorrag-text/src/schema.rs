use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, FAST, STORED};
use tantivy::tokenizer::{PreTokenizedString, Token};

pub const ORDINAL_FIELD: &str = "ordinal";
pub const TOKENS_FIELD: &str = "tokens";

pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	let _ordinal_field = schema_builder.add_u64_field(ORDINAL_FIELD, STORED | FAST);
	let tokens_indexing = TextFieldIndexing::default().set_tokenizer("raw").set_index_option(IndexRecordOption::WithFreqs);
	let _tokens_field = schema_builder.add_text_field(TOKENS_FIELD, TextOptions::default().set_indexing_options(tokens_indexing));
	schema_builder.build()
}

/// Lowercase, whitespace-split. No stemming, no stop words.
pub fn tokenize(text: &str) -> Vec<String> {
	text.to_lowercase().split_whitespace().map(str::to_string).collect()
}

pub fn pre_tokenized(tokens: &[String]) -> PreTokenizedString {
	let mut offset = 0;
	let tokens = tokens.iter().enumerate().map(|(position, text)| {
		let token = Token { offset_from: offset, offset_to: offset + text.len(), position, text: text.clone(), position_length: 1 };
		offset += text.len() + 1;
		token
	}).collect();
	PreTokenizedString { text: String::new(), tokens }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tokenize_lowercases_and_keeps_punctuation() {
		assert_eq!(tokenize("Cats  are\tMammals."), vec!["cats", "are", "mammals."]);
		assert!(tokenize("   ").is_empty());
	}

	#[test]
	fn pre_tokenized_positions_follow_order() {
		let pts = pre_tokenized(&tokenize("a bb ccc"));
		let positions: Vec<usize> = pts.tokens.iter().map(|t| t.position).collect();
		assert_eq!(positions, vec![0, 1, 2]);
		assert_eq!(pts.tokens[2].offset_from, 5);
	}
}
