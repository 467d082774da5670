use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::types::Document;

const SENTENCE_BOUNDARY: &str = ". ";
const PAGE_BREAK: char = '\x0c';
const SOURCE_EXTENSIONS: [&str; 3] = ["txt", "md", "pdf"];
const PDF_EXTRACTOR: &str = "pdftotext";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Upper bound on chunk length, in characters.
    pub max_chars: usize,
    /// Trailing sentences of a closed chunk that seed the next one.
    pub overlap_sentences: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { max_chars: 512, overlap_sentences: 3 }
    }
}

#[derive(Debug)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
    /// Poppler's `pdftotext`, resolved through `PATH` unless overridden.
    pdftotext: PathBuf,
}

impl Default for DataProcessor {
    fn default() -> Self { Self::with_config(ChunkingConfig::default()) }
}

impl DataProcessor {
    pub fn new() -> Self { Self::default() }

    pub fn with_config(chunking_config: ChunkingConfig) -> Self {
        Self { chunking_config, pdftotext: PathBuf::from(PDF_EXTRACTOR) }
    }

    pub fn with_pdftotext(mut self, tool: impl Into<PathBuf>) -> Self {
        self.pdftotext = tool.into();
        self
    }

    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<Document>> {
        let files = self.list_source_files(data_dir);
        if files.is_empty() {
            tracing::warn!(dir = %data_dir.display(), "no .txt, .md or .pdf files found");
            return Ok(vec![]);
        }
        let mut all_chunks = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            tracing::info!(file = %file_path.display(), "processing file {}/{}", file_index + 1, files.len());
            all_chunks.extend(self.process_file(file_path)?);
        }
        tracing::info!(files = files.len(), chunks = all_chunks.len(), "processed source directory");
        Ok(all_chunks)
    }

    /// Chunks one file. PDFs are chunked per page; other text containing
    /// form-feed page breaks is treated as paginated too.
    pub fn process_file(&self, file_path: &Path) -> Result<Vec<Document>> {
        let source = file_path.to_string_lossy().to_string();
        let file_type = file_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("txt")
            .to_ascii_lowercase();
        if file_type == "pdf" {
            let Some(pages) = self.extract_pdf_pages(file_path)? else { return Ok(vec![]) };
            return Ok(self.chunk_pages(&pages, &source, &file_type));
        }
        let content = self.read_file_content(file_path)?;
        if content.contains(PAGE_BREAK) {
            let pages: Vec<&str> = content.split(PAGE_BREAK).collect();
            return Ok(self.chunk_pages(&pages, &source, &file_type));
        }
        Ok(self.chunk_source(&content, &source, None, 0, &file_type))
    }

    /// Chunks per-page text. `chunk_index` keeps counting across pages.
    pub fn chunk_pages<S: AsRef<str>>(&self, pages: &[S], source: &str, file_type: &str) -> Vec<Document> {
        let page_count = pages.len();
        let mut documents = Vec::new();
        for (page_num, page) in pages.iter().enumerate() {
            let page_text = page.as_ref();
            if page_text.trim().is_empty() { continue; }
            let page_docs = self.chunk_source(page_text, source, Some(page_num as u32 + 1), documents.len(), file_type);
            documents.extend(page_docs.into_iter().map(|d| d.with_metadata("page_count", page_count)));
        }
        documents
    }

    /// Chunks `content` into documents numbered from `first_index`.
    pub fn chunk_source(&self, content: &str, source: &str, page: Option<u32>, first_index: usize, file_type: &str) -> Vec<Document> {
        self.chunk_text(content)
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| {
                let size = chunk.chars().count();
                Document::new(chunk, source, page, first_index + i)
                    .with_metadata("file_type", file_type)
                    .with_metadata("chunk_size", size)
            })
            .collect()
    }

    /// Greedy sentence packing with a fixed sentence overlap between neighbours.
    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        let max_chars = self.chunking_config.max_chars;
        let overlap = self.chunking_config.overlap_sentences;
        let mut chunks = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_size = 0usize;

        for sentence in split_sentences(text) {
            let sentence_size = sentence.chars().count();
            if current_size + sentence_size > max_chars && !current.is_empty() {
                chunks.push(current.join(" "));
                let keep_from = current.len().saturating_sub(overlap);
                current = current.split_off(keep_from);
                current.push(sentence);
                current_size = current.iter().map(|s| s.chars().count()).sum::<usize>() + current.len() - 1;
            } else {
                current_size += sentence_size;
                current.push(sentence);
            }
        }
        if !current.is_empty() {
            chunks.push(current.join(" "));
        }
        chunks.retain(|c| !c.trim().is_empty());
        chunks
    }

    /// Page texts of a PDF via `pdftotext`. `Ok(None)` when the tool is not installed.
    pub fn extract_pdf_pages(&self, file_path: &Path) -> Result<Option<Vec<String>>> {
        let output = match Command::new(&self.pdftotext).args(["-enc", "UTF-8"]).arg(file_path).arg("-").output() {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(tool = %self.pdftotext.display(), file = %file_path.display(), "pdftotext not installed (is poppler installed?), skipping PDF");
                return Ok(None);
            }
            Err(e) => return Err(anyhow!("failed to run {}: {}", self.pdftotext.display(), e)),
        };
        if !output.status.success() {
            bail!("pdftotext failed on {}: {}", file_path.display(), String::from_utf8_lossy(&output.stderr).trim());
        }
        let text = String::from_utf8_lossy(&output.stdout);
        let mut pages: Vec<String> = text.split(PAGE_BREAK).map(str::to_string).collect();
        // Every page, the last included, ends with a form feed.
        if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) { pages.pop(); }
        tracing::debug!(file = %file_path.display(), pages = pages.len(), "extracted PDF text");
        Ok(Some(pages))
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
        }
    }

    fn list_source_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            let ext = path.extension().and_then(|s| s.to_str()).map(str::to_ascii_lowercase);
            if ext.is_some_and(|e| SOURCE_EXTENSIONS.contains(&e.as_str())) { files.push(path.to_path_buf()); }
        }
        files.sort(); files
    }
}

/// Splits on `". "` after folding newlines; the consumed period is restored.
pub fn split_sentences(text: &str) -> Vec<String> {
    let flattened = text.replace(['\r', '\n'], " ");
    flattened
        .split(SENTENCE_BOUNDARY)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| if s.ends_with('.') { s.to_string() } else { format!("{s}.") })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_restores_periods() {
        let s = split_sentences("One. Two\nlines. Three.");
        assert_eq!(s, vec!["One.", "Two lines.", "Three."]);
    }

    #[test]
    fn overlap_reseeds_with_last_three_sentences() {
        let p = DataProcessor::with_config(ChunkingConfig { max_chars: 20, overlap_sentences: 3 });
        // Sizes sum sentence lengths only, so six 3-char sentences fit in 20.
        let chunks = p.chunk_text("Aa. Bb. Cc. Dd. Ee. Ff. Gg.");
        assert_eq!(chunks, vec!["Aa. Bb. Cc. Dd. Ee. Ff.", "Dd. Ee. Ff. Gg."]);
    }
}
