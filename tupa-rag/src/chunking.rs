//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`ParagraphChunker`], which
//! greedily packs paragraphs into size-bounded chunks and carries the last
//! few words of each chunk into the next one.

use crate::document::DocumentChunk;
use crate::error::{RagError, Result};

/// Paragraph separator in normalized text.
const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// A strategy for splitting source text into chunks.
///
/// Implementations are pure: the same text and source always produce the
/// same chunks with the same IDs.
pub trait Chunker: Send + Sync {
    /// Split `text` from `source` into chunks.
    ///
    /// Returns an empty `Vec` if the text has no content.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] if the chunker cannot process the input.
    fn chunk(&self, text: &str, source: &str) -> Result<Vec<DocumentChunk>>;
}

/// Packs paragraphs into chunks of at most `chunk_size` characters.
///
/// When the next paragraph does not fit, the current chunk is closed and the
/// next one starts with the last `overlap_words` words of the closed chunk.
/// A paragraph longer than `chunk_size` is never split; it becomes an
/// oversized chunk on its own.
///
/// Chunk IDs are `{source}_chunk_{index}` with indices starting at 0.
///
/// # Example
///
/// ```rust,ignore
/// use tupa_rag::ParagraphChunker;
///
/// let chunker = ParagraphChunker::new(500, 50);
/// let chunks = chunker.chunk(&text, "tupa_2024")?;
/// ```
#[derive(Debug, Clone)]
pub struct ParagraphChunker {
    chunk_size: usize,
    overlap_words: usize,
    document_type: String,
}

impl ParagraphChunker {
    /// Create a new `ParagraphChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - maximum number of characters per chunk
    /// * `overlap_words` - number of trailing words repeated at the start of the next chunk
    pub fn new(chunk_size: usize, overlap_words: usize) -> Self {
        Self { chunk_size, overlap_words, document_type: "tupa".to_string() }
    }

    /// Set the `document_type` recorded on produced chunks.
    pub fn with_document_type(mut self, document_type: impl Into<String>) -> Self {
        self.document_type = document_type.into();
        self
    }

    /// The last `overlap_words` words of `text`, joined by single spaces.
    fn overlap_seed(&self, text: &str) -> String {
        let words: Vec<&str> = text.split_whitespace().collect();
        let start = words.len().saturating_sub(self.overlap_words);
        words[start..].join(" ")
    }
}

impl Chunker for ParagraphChunker {
    fn chunk(&self, text: &str, source: &str) -> Result<Vec<DocumentChunk>> {
        if self.chunk_size == 0 {
            return Err(RagError::InvalidInput("chunk_size must be greater than zero".into()));
        }
        if source.trim().is_empty() {
            return Err(RagError::InvalidInput("source must not be empty".into()));
        }

        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;

        let emit = |text: &str, chunks: &mut Vec<DocumentChunk>| {
            let index = chunks.len();
            chunks.push(DocumentChunk::new(source, index, text.trim(), &self.document_type));
        };

        for paragraph in text.split(PARAGRAPH_SEPARATOR) {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }
            let paragraph_len = paragraph.chars().count();

            if current.is_empty() {
                current.push_str(paragraph);
                current_len = paragraph_len;
                continue;
            }

            let appended_len = current_len + PARAGRAPH_SEPARATOR.len() + paragraph_len;
            if appended_len <= self.chunk_size {
                current.push_str(PARAGRAPH_SEPARATOR);
                current.push_str(paragraph);
                current_len = appended_len;
                continue;
            }

            emit(&current, &mut chunks);

            let seed =
                if self.overlap_words > 0 { self.overlap_seed(&current) } else { String::new() };
            current =
                if seed.is_empty() { paragraph.to_string() } else { format!("{seed} {paragraph}") };
            current_len = current.chars().count();
        }

        if !current.trim().is_empty() {
            emit(&current, &mut chunks);
        }

        tracing::debug!(source, chunk_count = chunks.len(), "chunked document");
        Ok(chunks)
    }
}
