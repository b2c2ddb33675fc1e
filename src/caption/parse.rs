//! Title/description extraction from free-form model output and from
//! stored sidecar records.

use thiserror::Error;

use super::Caption;

pub const TITLE_MARKER: &str = "**Title:**";
pub const DESCRIPTION_MARKER: &str = "**Description:**";

const TITLE_KEY: &str = "Title:";
const DESCRIPTION_KEY: &str = "Description:";

/// Text lacked one or both fields. `partial` holds what was found, with
/// fallback values filled in for the rest.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("caption text missing {}", missing_fields(.missing_title, .missing_description))]
pub struct ParseError {
    pub partial: Caption,
    pub missing_title: bool,
    pub missing_description: bool,
}

impl ParseError {
    pub fn into_fallback(self) -> Caption {
        self.partial
    }
}

fn missing_fields(title: &bool, description: &bool) -> &'static str {
    match (*title, *description) {
        (true, true) => "title and description",
        (true, false) => "title",
        _ => "description",
    }
}

/// Pull the `**Title:**` and `**Description:**` lines out of model output.
///
/// The first line carrying each marker wins; every other line is ignored.
pub fn parse_caption_text(text: &str) -> Result<Caption, ParseError> {
    scan(text, TITLE_MARKER, DESCRIPTION_MARKER)
}

/// [`parse_caption_text`], substituting fallback values for missing fields.
pub fn parse_caption_or_fallback(text: &str) -> Caption {
    parse_caption_text(text).unwrap_or_else(ParseError::into_fallback)
}

/// Encode a caption as its two-line sidecar record.
pub fn encode_record(caption: &Caption) -> String {
    format!(
        "{TITLE_KEY} {}\n{DESCRIPTION_KEY} {}",
        single_line(&caption.title),
        single_line(&caption.description)
    )
}

/// Decode a sidecar record by key; line order does not matter.
pub fn decode_record(text: &str) -> Result<Caption, ParseError> {
    scan(text, TITLE_KEY, DESCRIPTION_KEY)
}

fn scan(text: &str, title_key: &str, description_key: &str) -> Result<Caption, ParseError> {
    let mut title = None;
    let mut description = None;

    for line in text.lines() {
        let line = line.trim_start();
        if title.is_none() {
            if let Some(rest) = field_value(line, title_key) {
                title = Some(rest);
                continue;
            }
        }
        if description.is_none() {
            if let Some(rest) = field_value(line, description_key) {
                description = Some(rest);
            }
        }
    }

    match (title, description) {
        (Some(title), Some(description)) => Ok(Caption { title, description }),
        (title, description) => Err(ParseError {
            missing_title: title.is_none(),
            missing_description: description.is_none(),
            partial: Caption {
                title: title.unwrap_or_else(|| Caption::FALLBACK_TITLE.to_string()),
                description: description
                    .unwrap_or_else(|| Caption::FALLBACK_DESCRIPTION.to_string()),
            },
        }),
    }
}

/// Value after `key`, if the line starts with it and the value is non-empty.
fn field_value(line: &str, key: &str) -> Option<String> {
    let value = line.strip_prefix(key)?.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Line breaks become spaces so a record stays two lines; other whitespace is kept.
fn single_line(value: &str) -> String {
    value.replace("\r\n", " ").replace(['\r', '\n'], " ")
}
