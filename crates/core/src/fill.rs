//! Placeholder substitution for template texts.
//!
//! A placeholder is `{ident}` where `ident` starts with an ASCII letter and
//! continues with letters, digits, or underscores. Any `{` that does not form
//! such a token is literal text. Filling is one left-to-right pass over the
//! parsed segments; substituted values are inserted verbatim and never
//! rescanned, so a value containing `{other}` cannot trigger a second
//! expansion.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::catalog::Template;
use crate::errors::DomainError;

/// Caller-supplied field values keyed by placeholder name.
pub type FieldValues = HashMap<String, String>;

/// A template text with every placeholder substituted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilledResponse {
    pub template_id: String,
    pub text: String,
    /// Value-map keys referenced by neither of the template's texts and not
    /// required. Sorted. A warning surface, never a failure.
    pub unknown_fields: Vec<String>,
}

#[derive(Debug, PartialEq)]
enum Segment<'a> {
    Literal(&'a str),
    Token(&'a str),
}

/// Fills the template's standard response text.
pub fn fill_standard(
    template: &Template,
    field_values: &FieldValues,
) -> Result<FilledResponse, DomainError> {
    fill_text(template, &template.standard, field_values)
}

/// Fills the template's prompt text. Same contract as [`fill_standard`].
pub fn fill_prompt(
    template: &Template,
    field_values: &FieldValues,
) -> Result<FilledResponse, DomainError> {
    fill_text(template, &template.prompt, field_values)
}

/// Placeholder names referenced by `text`, first occurrence order, deduplicated.
pub fn referenced_fields(text: &str) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();
    for segment in parse_segments(text) {
        if let Segment::Token(name) = segment {
            if !fields.iter().any(|seen| seen == name) {
                fields.push(name.to_string());
            }
        }
    }
    fields
}

/// Value-map keys that neither template text references and the required list
/// does not name. Sorted for stable reporting.
pub fn unknown_fields(template: &Template, field_values: &FieldValues) -> Vec<String> {
    let mut referenced: HashSet<&str> = HashSet::new();
    for text in [template.standard.as_str(), template.prompt.as_str()] {
        for segment in parse_segments(text) {
            if let Segment::Token(name) = segment {
                referenced.insert(name);
            }
        }
    }

    let mut unknown: Vec<String> = field_values
        .keys()
        .filter(|key| {
            !referenced.contains(key.as_str())
                && !template.required_fields.iter().any(|field| field == *key)
        })
        .cloned()
        .collect();
    unknown.sort();
    unknown
}

fn fill_text(
    template: &Template,
    text: &str,
    field_values: &FieldValues,
) -> Result<FilledResponse, DomainError> {
    // Every missing required field, in declaration order, before any
    // substitution happens.
    let missing: Vec<String> = template
        .required_fields
        .iter()
        .filter(|field| !field_values.contains_key(field.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(DomainError::MissingFields {
            template_id: template.id.clone(),
            fields: missing,
        });
    }

    let mut filled = String::with_capacity(text.len());
    let mut unresolved: Vec<String> = Vec::new();
    for segment in parse_segments(text) {
        match segment {
            Segment::Literal(literal) => filled.push_str(literal),
            Segment::Token(name) => match field_values.get(name) {
                Some(value) => filled.push_str(value),
                None => {
                    if !unresolved.iter().any(|seen| seen == name) {
                        unresolved.push(name.to_string());
                    }
                }
            },
        }
    }

    // With the required fields all present, an unresolved token can only be a
    // placeholder the catalog never accounted for.
    if !unresolved.is_empty() {
        return Err(DomainError::TemplateIntegrity {
            template_id: template.id.clone(),
            placeholders: unresolved,
        });
    }

    Ok(FilledResponse {
        template_id: template.id.clone(),
        text: filled,
        unknown_fields: unknown_fields(template, field_values),
    })
}

fn parse_segments(text: &str) -> Vec<Segment<'_>> {
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut cursor = 0;

    while cursor < bytes.len() {
        if bytes[cursor] == b'{' {
            if let Some(end) = token_end(bytes, cursor + 1) {
                if literal_start < cursor {
                    segments.push(Segment::Literal(&text[literal_start..cursor]));
                }
                segments.push(Segment::Token(&text[cursor + 1..end]));
                cursor = end + 1;
                literal_start = cursor;
                continue;
            }
        }
        cursor += 1;
    }

    if literal_start < text.len() {
        segments.push(Segment::Literal(&text[literal_start..]));
    }
    segments
}

/// Index of the closing brace when `bytes[start..]` opens a well-formed
/// identifier, `None` when the braces are literal text.
fn token_end(bytes: &[u8], start: usize) -> Option<usize> {
    if !bytes.get(start)?.is_ascii_alphabetic() {
        return None;
    }
    let mut index = start + 1;
    while index < bytes.len() {
        match bytes[index] {
            b'}' => return Some(index),
            ch if ch.is_ascii_alphanumeric() || ch == b'_' => index += 1,
            _ => return None,
        }
    }
    None
}
