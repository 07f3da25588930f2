//! Content normalization: raw backend documents → canonical [`Post`] records.
//!
//! The raw shape mirrors what the content service returns for a `post`
//! document. Every raw field is optional at the serde level; whether an
//! absent field is tolerated is decided here by [`Strictness`], not by the
//! JSON parser.
//!
//! ## Publication Date
//!
//! `first_publication_date` is formatted as `dd <mon> yyyy` with Brazilian
//! Portuguese month abbreviations, in the configured time zone:
//!
//! ```text
//! 2021-03-05T12:00:00Z     →  05 mar 2021
//! 2021-08-19T15:30:00+0000 →  19 ago 2021
//! (absent)                 →  None
//! ```

use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, Locale};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::richtext::RichText;

const DATE_FORMAT: &str = "%d %b %Y";
const DATE_LOCALE: Locale = Locale::pt_BR;

#[derive(Error, Debug, PartialEq)]
pub enum NormalizeError {
    #[error("missing required field: {0}")]
    MissingField(String),
    #[error("invalid publication date: {0}")]
    InvalidDate(String),
    #[error("duplicate section heading: {0}")]
    DuplicateHeading(String),
}

/// How absent or malformed raw fields are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Absent fields become empty values; a bad date becomes `None`.
    #[default]
    Lenient,
    /// Absent fields, bad dates and duplicate headings are errors.
    Strict,
}

#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    pub strictness: Strictness,
    pub timezone: Tz,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            strictness: Strictness::Lenient,
            timezone: chrono_tz::America::Sao_Paulo,
        }
    }
}

// ============================================================================
// Raw document (wire shape)
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub first_publication_date: Option<String>,
    #[serde(default)]
    pub data: RawPostData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPostData {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub banner: Option<RawImage>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub content: Option<Vec<RawSection>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawImage {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSection {
    #[serde(default)]
    pub heading: Option<String>,
    #[serde(default)]
    pub body: Option<RichText>,
}

// ============================================================================
// Canonical post
// ============================================================================

/// A post reduced to the fields the page renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub publication_date: Option<String>,
    pub title: String,
    pub banner_url: String,
    pub author: String,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    pub body: RichText,
}

/// Normalize a raw document into a [`Post`].
pub fn normalize(raw: &RawDocument, options: &NormalizeOptions) -> Result<Post, NormalizeError> {
    let strict = options.strictness == Strictness::Strict;
    let data = &raw.data;

    let publication_date = match raw.first_publication_date.as_deref() {
        None => None,
        Some(value) => match format_publication_date(value, options.timezone) {
            Some(formatted) => Some(formatted),
            None if strict => return Err(NormalizeError::InvalidDate(value.to_string())),
            None => {
                warn!(date = value, uid = ?raw.uid, "unparseable publication date, omitting");
                None
            }
        },
    };

    let title = required(data.title.as_ref(), "data.title", strict)?;
    let author = required(data.author.as_ref(), "data.author", strict)?;
    let banner_url = required(
        data.banner.as_ref().and_then(|b| b.url.as_ref()),
        "data.banner.url",
        strict,
    )?;

    let raw_sections = match &data.content {
        Some(content) => content.as_slice(),
        None if strict => return Err(NormalizeError::MissingField("data.content".into())),
        None => &[],
    };

    let mut sections = Vec::with_capacity(raw_sections.len());
    let mut seen = HashSet::new();
    for (idx, raw_section) in raw_sections.iter().enumerate() {
        let heading = required(
            raw_section.heading.as_ref(),
            &format!("data.content[{idx}].heading"),
            strict,
        )?;
        if strict && !seen.insert(heading.clone()) {
            return Err(NormalizeError::DuplicateHeading(heading));
        }
        sections.push(Section {
            heading,
            body: raw_section.body.clone().unwrap_or_default(),
        });
    }

    Ok(Post {
        publication_date,
        title,
        banner_url,
        author,
        sections,
    })
}

fn required(value: Option<&String>, path: &str, strict: bool) -> Result<String, NormalizeError> {
    match value {
        Some(v) => Ok(v.clone()),
        None if strict => Err(NormalizeError::MissingField(path.to_string())),
        None => Ok(String::new()),
    }
}

/// Format a backend timestamp as `dd <mon> yyyy` (pt-BR) in `timezone`.
///
/// Returns `None` if the timestamp cannot be parsed.
pub fn format_publication_date(value: &str, timezone: Tz) -> Option<String> {
    let parsed = parse_timestamp(value)?;
    Some(
        parsed
            .with_timezone(&timezone)
            .format_localized(DATE_FORMAT, DATE_LOCALE)
            .to_string(),
    )
}

/// Accepts RFC 3339 as well as the `+0000` offset form the backend emits.
fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z"))
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .ok()
}

/// Headings that appear more than once, in first-duplicate order.
pub fn duplicate_headings(post: &Post) -> Vec<&str> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for section in &post.sections {
        if !seen.insert(section.heading.as_str()) && !duplicates.contains(&section.heading.as_str())
        {
            duplicates.push(section.heading.as_str());
        }
    }
    duplicates
}
