//! Cross-reference markers.
//!
//! Article text links to other topics with `[[Term]]`. A marker opens with
//! `[[`, closes with the first following `]]`, may not contain another `[[`,
//! and must have non-blank inner text. Scanning is safe on partial text: an
//! unterminated marker at the end of a still-streaming article is skipped.

use std::collections::HashSet;
use std::ops::Range;

use crate::normalize;

const OPEN: &str = "[[";
const CLOSE: &str = "]]";

/// A single marker found in article text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference<'a> {
    /// Inner text with surrounding whitespace trimmed.
    pub term: &'a str,
    /// Byte range of the whole marker, delimiters included.
    pub span: Range<usize>,
}

/// Iterator over every well-formed marker in a text, in order of appearance.
#[derive(Debug, Clone)]
pub struct ReferenceScanner<'a> {
    text: &'a str,
    position: usize,
}

impl<'a> ReferenceScanner<'a> {
    /// Create a scanner over `text`.
    pub fn new(text: &'a str) -> Self {
        Self { text, position: 0 }
    }
}

impl<'a> Iterator for ReferenceScanner<'a> {
    type Item = Reference<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let rest = self.text.get(self.position..)?;
            let open = self.position + rest.find(OPEN)?;
            let inner_start = open + OPEN.len();
            let inner_rest = &self.text[inner_start..];

            let Some(close_offset) = inner_rest.find(CLOSE) else {
                self.position = self.text.len();
                return None;
            };

            // A nested opener restarts the marker at the inner `[[`.
            if let Some(reopen) = inner_rest[..close_offset].find(OPEN) {
                self.position = inner_start + reopen;
                continue;
            }

            let close = inner_start + close_offset;
            self.position = close + CLOSE.len();

            let term = self.text[inner_start..close].trim();
            if term.is_empty() {
                continue;
            }

            return Some(Reference {
                term,
                span: open..self.position,
            });
        }
    }
}

/// Extract the distinct referenced terms from article text.
///
/// Terms keep their first-seen spelling and order; later spellings of the
/// same topic (differing only in case, spacing or punctuation) are dropped.
pub fn extract_references(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    ReferenceScanner::new(text)
        .filter(|reference| {
            let id = normalize(reference.term);
            !id.is_empty() && seen.insert(id)
        })
        .map(|reference| reference.term.to_string())
        .collect()
}
