//! Topic identity - maps human-readable terms onto stable node identifiers.
//!
//! Normalization lowercases the term, treats every run of whitespace or
//! punctuation as a single separator and trims separators from both ends, so
//! `"Machine Learning"`, `"machine   learning"` and `"Machine-Learning!"` all
//! resolve to `machine-learning`.

use crate::{NodeId, TopicError};

const SEPARATOR: char = '-';

/// Normalize a term into its node identifier.
///
/// Total over all strings; a term without any alphanumeric character
/// normalizes to the empty id, which [`validate_term`] rejects.
pub fn normalize(term: &str) -> NodeId {
    let mut slug = String::with_capacity(term.len());
    let mut pending_separator = false;

    for ch in term.chars() {
        if ch.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push(SEPARATOR);
            }
            pending_separator = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_separator = true;
        }
    }

    NodeId(slug)
}

/// Validate a user-supplied term and return it trimmed together with its id.
pub fn validate_term(term: &str) -> Result<(&str, NodeId), TopicError> {
    let trimmed = term.trim();
    let id = normalize(trimmed);
    if id.is_empty() {
        return Err(TopicError::InvalidInput {
            term: term.to_string(),
        });
    }
    Ok((trimmed, id))
}
