//! A cheap character-level pre-filter for user input.
//!
//! Passing validation does not mean the input is a well-formed expression
//! (`"x+++x"` and `"(("` are both accepted here), it just means every
//! character is one the parser knows about. The parser is the authority on
//! syntax.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Digits, `x`, the arithmetic operators, parentheses, whitespace, and the
    /// `log10` and `sqrt` function names.
    static ref ALLOWED: Regex =
        Regex::new(r"^(?:[0-9x+\-*/^()\s]|log10|sqrt)+$").unwrap();

    /// A run of allowed tokens, used to find the first character that isn't.
    static ref ALLOWED_RUN: Regex =
        Regex::new(r"(?:[0-9x+\-*/^()\s]|log10|sqrt)+").unwrap();
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please enter both functions.")]
    Empty,
    #[error(
        "Invalid characters in function. Only +, -, *, /, ^, log10(), sqrt() \
         are allowed (found {character:?} at index {index})."
    )]
    InvalidCharacter { character: char, index: usize },
}

/// Check a single function, returning it with surrounding whitespace
/// removed.
pub fn validate(src: &str) -> Result<&str, ValidationError> {
    let trimmed = src.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }

    if ALLOWED.is_match(trimmed) {
        return Ok(trimmed);
    }

    let leading_whitespace = src.len() - src.trim_start().len();
    let index = first_invalid_character(trimmed);
    let character = trimmed[index..].chars().next().unwrap_or_default();

    Err(ValidationError::InvalidCharacter {
        character,
        index: leading_whitespace + index,
    })
}

/// Check both functions. Blank input is reported before bad characters, even
/// when the bad characters are in the first function.
pub fn validate_pair<'a>(
    first: &'a str,
    second: &'a str,
) -> Result<(&'a str, &'a str), ValidationError> {
    if first.trim().is_empty() || second.trim().is_empty() {
        return Err(ValidationError::Empty);
    }

    Ok((validate(first)?, validate(second)?))
}

fn first_invalid_character(src: &str) -> usize {
    let mut cursor = 0;

    for run in ALLOWED_RUN.find_iter(src) {
        if run.start() != cursor {
            return cursor;
        }
        cursor = run.end();
    }

    cursor
}
