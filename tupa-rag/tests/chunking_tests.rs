//! Property tests for paragraph chunking and text normalization.

use proptest::prelude::*;
use tupa_rag::{Chunker, ParagraphChunker, TextNormalizer};

/// A paragraph of lowercase words separated by single spaces.
fn arb_paragraph() -> impl Strategy<Value = String> {
    proptest::collection::vec("[a-zñáéíóú]{1,12}", 1..30).prop_map(|words| words.join(" "))
}

fn arb_paragraphs() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec(arb_paragraph(), 1..15)
}

/// *For any* paragraph sequence, every paragraph appears intact in some
/// chunk, chunk IDs are sequential, and chunking is deterministic.
mod prop_paragraph_preservation {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn paragraphs_survive_chunking(
            paragraphs in arb_paragraphs(),
            chunk_size in 20usize..400,
            overlap in 0usize..8,
        ) {
            let text = paragraphs.join("\n\n");
            let chunker = ParagraphChunker::new(chunk_size, overlap);
            let chunks = chunker.chunk(&text, "tupa").unwrap();

            prop_assert!(!chunks.is_empty());
            for paragraph in &paragraphs {
                prop_assert!(
                    chunks.iter().any(|c| c.text.contains(paragraph.as_str())),
                    "paragraph lost: {paragraph:?}"
                );
            }
            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert_eq!(&chunk.id, &format!("tupa_chunk_{i}"));
                prop_assert_eq!(chunk.metadata.chunk_id, i);
                prop_assert_eq!(chunk.text.trim(), chunk.text.as_str());
            }
            prop_assert_eq!(chunker.chunk(&text, "tupa").unwrap(), chunks);
        }
    }
}

/// *For any* input without overlap, a chunk exceeds `chunk_size` only when it
/// is a single oversized paragraph, and the chunks rebuild the input.
mod prop_size_bound {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn chunks_respect_size_unless_single_paragraph(
            paragraphs in arb_paragraphs(),
            chunk_size in 20usize..400,
        ) {
            let text = paragraphs.join("\n\n");
            let chunks = ParagraphChunker::new(chunk_size, 0).chunk(&text, "tupa").unwrap();

            for chunk in &chunks {
                let single_paragraph = !chunk.text.contains("\n\n");
                prop_assert!(
                    chunk.text.chars().count() <= chunk_size || single_paragraph,
                    "chunk of {} chars over limit {chunk_size}",
                    chunk.text.chars().count()
                );
            }

            let rebuilt: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
            prop_assert_eq!(rebuilt.join("\n\n"), text);
        }
    }
}

/// The last `n` words of `text`, joined by single spaces.
fn last_words(text: &str, n: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    words[words.len().saturating_sub(n)..].join(" ")
}

/// *For any* input with word overlap, each chunk after the first starts with
/// the last `overlap` words of its predecessor, stripping that seed rebuilds
/// the input, and only the seed may push a chunk past `chunk_size`.
mod prop_overlap_reconstruction {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn stripping_seeds_rebuilds_the_input(
            paragraphs in arb_paragraphs(),
            chunk_size in 20usize..400,
            overlap in 1usize..8,
        ) {
            let text = paragraphs.join("\n\n");
            let chunks = ParagraphChunker::new(chunk_size, overlap).chunk(&text, "tupa").unwrap();

            let mut remainders = Vec::with_capacity(chunks.len());
            for (i, chunk) in chunks.iter().enumerate() {
                let (remainder, budget) = if i == 0 {
                    (chunk.text.as_str(), 0)
                } else {
                    let seed = format!("{} ", last_words(&chunks[i - 1].text, overlap));
                    prop_assert!(
                        chunk.text.starts_with(&seed),
                        "chunk {i} {:?} does not start with seed {seed:?}",
                        chunk.text
                    );
                    (&chunk.text[seed.len()..], seed.chars().count())
                };

                let single_paragraph = !remainder.contains("\n\n");
                prop_assert!(
                    chunk.text.chars().count() <= chunk_size + budget || single_paragraph,
                    "chunk {i} of {} chars over limit {chunk_size} + {budget}",
                    chunk.text.chars().count()
                );
                remainders.push(remainder);
            }

            prop_assert_eq!(remainders.join("\n\n"), text);
        }
    }
}

#[test]
fn normalized_document_chunks_on_paragraph_breaks() {
    let raw = "GOBIERNO REGIONAL CUSCO\r\n\
               Pág. 1\r\n\
               \r\n\
               Licencia de funcionamiento:   requisitos y plazos.\r\n\
               \r\n\
               \r\n\
               Horario de atención de 8:00 a 16:00 horas.\0\r\n";

    let cleaned = TextNormalizer::default().clean(raw);
    assert_eq!(
        cleaned,
        "GOBIERNO REGIONAL CUSCO\n\n\
         Licencia de funcionamiento: requisitos y plazos.\n\n\
         Horario de atención de 8:00 a 16:00 horas."
    );

    let chunks = ParagraphChunker::new(60, 2).chunk(&cleaned, "tupa_2024").unwrap();
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[1].text, "REGIONAL CUSCO Licencia de funcionamiento: requisitos y plazos.");
    assert!(chunks[2].text.starts_with("y plazos. Horario"));
}
