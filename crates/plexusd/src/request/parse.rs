//! Request text parsing.
//!
//! Two forms are understood, with case-insensitive keywords:
//!
//! ```text
//! SET name=value[, name=value ...]
//! SHOW name
//! ```
//!
//! Values may be wrapped in double quotes to include spaces or commas.
//! Parsing records byte spans so the request keeps a single copy of its text.

use std::ops::Range;

use super::errors::ParseError;
use crate::set::{Assignment, AssignmentQueue};

/// Parsed request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedRequest {
    /// Ordered assignments.
    Set(AssignmentQueue),
    /// Span of the property name to read back.
    Show(Range<usize>),
}

/// Parses request text into spans.
///
/// # Errors
///
/// Returns a [`ParseError`] describing the first problem found.
pub fn parse(text: &str) -> Result<ParsedRequest, ParseError> {
    let body = trim_span(text, 0..text.len());
    let rest = text.get(body.clone()).unwrap_or_default();
    if rest.is_empty() {
        return Err(ParseError::Empty);
    }
    let keyword_len = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let keyword = rest.get(..keyword_len).unwrap_or_default();
    let arguments = trim_span(text, body.start + keyword_len..body.end);

    if keyword.eq_ignore_ascii_case("set") {
        if arguments.is_empty() {
            return Err(ParseError::EmptySet);
        }
        parse_assignments(text, arguments).map(ParsedRequest::Set)
    } else if keyword.eq_ignore_ascii_case("show") {
        if arguments.is_empty() {
            return Err(ParseError::MissingName);
        }
        let name = slice(text, &arguments);
        if !is_property_name(name) {
            return Err(ParseError::InvalidName {
                name: name.to_owned(),
            });
        }
        Ok(ParsedRequest::Show(arguments))
    } else {
        Err(ParseError::UnknownKeyword {
            keyword: keyword.to_owned(),
        })
    }
}

fn parse_assignments(text: &str, span: Range<usize>) -> Result<AssignmentQueue, ParseError> {
    let mut queue = AssignmentQueue::new();
    let mut segment_start = span.start;
    let mut in_quotes = false;
    for (offset, ch) in slice(text, &span).char_indices() {
        let index = span.start + offset;
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                queue.push(parse_assignment(text, segment_start..index)?);
                segment_start = index + 1;
            }
            _ => {}
        }
    }
    if in_quotes {
        return Err(ParseError::UnbalancedQuote);
    }
    queue.push(parse_assignment(text, segment_start..span.end)?);
    Ok(queue)
}

fn parse_assignment(text: &str, segment: Range<usize>) -> Result<Assignment, ParseError> {
    let raw = slice(text, &segment);
    let Some(equals) = raw.find('=') else {
        return Err(ParseError::MissingEquals {
            assignment: raw.trim().to_owned(),
        });
    };
    let name = trim_span(text, segment.start..segment.start + equals);
    let name_text = slice(text, &name);
    if !is_property_name(name_text) {
        return Err(ParseError::InvalidName {
            name: name_text.to_owned(),
        });
    }

    let value = trim_span(text, segment.start + equals + 1..segment.end);
    let value_text = slice(text, &value);
    if value_text.len() >= 2 && value_text.starts_with('"') && value_text.ends_with('"') {
        let inner = value.start + 1..value.end - 1;
        if slice(text, &inner).contains('"') {
            return Err(ParseError::UnbalancedQuote);
        }
        return Ok(Assignment::new(name, inner));
    }
    if value_text.contains('"') {
        return Err(ParseError::UnbalancedQuote);
    }
    if value_text.is_empty() {
        return Err(ParseError::EmptyValue {
            name: name_text.to_owned(),
        });
    }
    Ok(Assignment::new(name, value))
}

fn is_property_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_')
}

fn slice<'t>(text: &'t str, span: &Range<usize>) -> &'t str {
    text.get(span.clone()).unwrap_or_default()
}

fn trim_span(text: &str, span: Range<usize>) -> Range<usize> {
    let raw = slice(text, &span);
    let leading = raw.len() - raw.trim_start().len();
    let trailing = raw.len() - raw.trim_end().len();
    let start = span.start + leading;
    let end = (span.end - trailing).max(start);
    start..end
}
