//! Cleanup of extracted document text before chunking.
//!
//! Text coming out of PDF extraction carries page headers, footers, stray
//! NUL bytes and irregular spacing. [`TextNormalizer`] removes that noise
//! while keeping blank-line paragraph boundaries intact for the chunker.

use std::sync::LazyLock;

use regex::Regex;

static HORIZONTAL_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\S\n]+").expect("static regex is valid"));

/// Normalizes raw extracted text.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    min_line_chars: usize,
}

impl TextNormalizer {
    /// Create a normalizer dropping lines shorter than `min_line_chars`.
    pub fn new(min_line_chars: usize) -> Self {
        Self { min_line_chars }
    }

    /// Clean `text`.
    ///
    /// - NUL bytes are removed and carriage returns become newlines
    /// - runs of spaces and tabs collapse to a single space
    /// - lines are trimmed; non-blank lines shorter than `min_line_chars`
    ///   characters are dropped
    /// - consecutive blank lines collapse into one paragraph break
    pub fn clean(&self, text: &str) -> String {
        let text = text.replace('\0', "").replace("\r\n", "\n").replace('\r', "\n");
        let text = HORIZONTAL_WS.replace_all(&text, " ");

        let mut out = String::with_capacity(text.len());
        let mut pending_break = false;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                pending_break = !out.is_empty();
                continue;
            }
            if line.chars().count() < self.min_line_chars {
                continue;
            }
            if !out.is_empty() {
                out.push_str(if pending_break { "\n\n" } else { "\n" });
            }
            out.push_str(line);
            pending_break = false;
        }
        out
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_spacing_and_strips_nul() {
        let cleaned = TextNormalizer::new(0).clean("Licencia\0  de   funcionamiento\t\tvigente");
        assert_eq!(cleaned, "Licencia de funcionamiento vigente");
    }

    #[test]
    fn drops_short_header_lines() {
        let raw = "Página 3\nRequisitos para la licencia de obra\n12\n";
        assert_eq!(TextNormalizer::default().clean(raw), "Requisitos para la licencia de obra");
    }

    #[test]
    fn keeps_single_paragraph_break_between_blocks() {
        let raw = "Primer párrafo del documento\n\n\n\n   \nSegundo párrafo del documento";
        assert_eq!(
            TextNormalizer::default().clean(raw),
            "Primer párrafo del documento\n\nSegundo párrafo del documento"
        );
    }

    #[test]
    fn line_length_counts_characters_not_bytes() {
        // Nine characters, more than nine bytes.
        let raw = "ñáéíóúñáé";
        assert_eq!(TextNormalizer::new(10).clean(raw), "");
        assert_eq!(TextNormalizer::new(9).clean(raw), raw);
    }

    #[test]
    fn dropped_lines_do_not_leave_paragraph_breaks_at_the_start() {
        let raw = "\n\nPág 1\n\nContenido relevante del trámite";
        assert_eq!(TextNormalizer::default().clean(raw), "Contenido relevante del trámite");
    }
}
