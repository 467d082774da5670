use anyhow::Result;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

use tutorrag_core::types::{SearchHit, SourceKind};

use crate::schema::{build_schema, pre_tokenized, tokenize, ORDINAL_FIELD, TOKENS_FIELD};

const WRITER_MEMORY_BUDGET: usize = 50_000_000;

/// In-RAM BM25 index over a tokenized corpus. Hits carry the corpus position
/// of the matching document.
pub struct TantivySparseIndex {
	reader: IndexReader,
	ordinal_field: Field,
	tokens_field: Field,
	tokenized: Vec<Vec<String>>,
}

impl TantivySparseIndex {
	pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Result<Self> {
		Self::build(texts.iter().map(|t| tokenize(t.as_ref())).collect())
	}

	/// Indexes one pre-tokenized document per corpus position.
	pub fn build(tokenized: Vec<Vec<String>>) -> Result<Self> {
		let schema = build_schema();
		let ordinal_field = schema.get_field(ORDINAL_FIELD)?;
		let tokens_field = schema.get_field(TOKENS_FIELD)?;
		let index = Index::create_in_ram(schema);
		let mut writer: IndexWriter = index.writer_with_num_threads(1, WRITER_MEMORY_BUDGET)?;
		for (ordinal, tokens) in tokenized.iter().enumerate() {
			let mut doc = TantivyDocument::default();
			doc.add_u64(ordinal_field, ordinal as u64);
			doc.add_pre_tokenized_text(tokens_field, pre_tokenized(tokens));
			writer.add_document(doc)?;
		}
		writer.commit()?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		tracing::info!(docs = tokenized.len(), "sparse index built");
		Ok(Self { reader, ordinal_field, tokens_field, tokenized })
	}

	pub fn len(&self) -> usize { self.tokenized.len() }

	pub fn is_empty(&self) -> bool { self.tokenized.is_empty() }

	/// The tokenized corpus this index was built from, in corpus order.
	pub fn tokenized(&self) -> &[Vec<String>] { &self.tokenized }

	pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
		self.search_tokens(&tokenize(query), k)
	}

	/// Top-`k` documents with a strictly positive score, best first.
	pub fn search_tokens(&self, tokens: &[String], k: usize) -> Result<Vec<SearchHit>> {
		if k == 0 || tokens.is_empty() || self.tokenized.is_empty() { return Ok(vec![]); }
		let clauses: Vec<(Occur, Box<dyn Query>)> = tokens.iter().map(|t| {
			let term = Term::from_field_text(self.tokens_field, t);
			(Occur::Should, Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs)) as Box<dyn Query>)
		}).collect();
		let query = BooleanQuery::new(clauses);
		let searcher = self.reader.searcher();
		let top_docs = searcher.search(&query, &TopDocs::with_limit(k.min(self.tokenized.len())))?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			if score <= 0.0 { continue; }
			let doc: TantivyDocument = searcher.doc(addr)?;
			let Some(ordinal) = doc.get_first(self.ordinal_field).and_then(|v| v.as_u64()) else { continue };
			hits.push(SearchHit { position: ordinal as usize, score, source: SourceKind::Text });
		}
		Ok(hits)
	}
}
