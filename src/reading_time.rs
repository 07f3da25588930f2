//! Reading-time estimation.
//!
//! Words are collected section by section: first the heading, then the body
//! rendered to plain text with every run of newlines collapsed into a single
//! space. The estimate is `ceil(words / words_per_minute)`.
//!
//! [`ReadingTimeState`] holds the estimate for one page view. It starts at
//! zero and is recomputed only when the sections it observes actually change.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::post::Section;

pub const DEFAULT_WORDS_PER_MINUTE: u32 = 200;

/// How text is cut into words.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordSplitting {
    /// Split on any whitespace; empty tokens are not words.
    #[default]
    Whitespace,
    /// Split on single spaces and count empty tokens too (legacy counting:
    /// `"a  b"` is three words, an empty heading is one).
    Literal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadingOptions {
    pub splitting: WordSplitting,
    pub words_per_minute: u32,
}

impl Default for ReadingOptions {
    fn default() -> Self {
        Self {
            splitting: WordSplitting::Whitespace,
            words_per_minute: DEFAULT_WORDS_PER_MINUTE,
        }
    }
}

/// Total words across all section headings and bodies.
pub fn count_words(sections: &[Section], splitting: WordSplitting) -> usize {
    sections
        .iter()
        .map(|section| {
            let body = collapse_newlines(&section.body.as_text(" "));
            split_count(&section.heading, splitting) + split_count(&body, splitting)
        })
        .sum()
}

/// Estimated reading time in whole minutes, rounded up.
pub fn estimate(sections: &[Section], options: &ReadingOptions) -> u32 {
    let words = count_words(sections, options.splitting);
    let per_minute = options.words_per_minute.max(1) as usize;
    u32::try_from(words.div_ceil(per_minute)).unwrap_or(u32::MAX)
}

fn split_count(text: &str, splitting: WordSplitting) -> usize {
    match splitting {
        WordSplitting::Whitespace => text.split_whitespace().count(),
        WordSplitting::Literal => text.split(' ').count(),
    }
}

/// Replace every run of one or more `\n` with a single space.
fn collapse_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_run = false;
    for c in text.chars() {
        if c == '\n' {
            if !in_run {
                out.push(' ');
                in_run = true;
            }
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

/// SHA-256 over the serialized sections, used to detect content changes.
fn fingerprint(sections: &[Section]) -> String {
    let mut hasher = Sha256::new();
    for section in sections {
        hasher.update(section.heading.as_bytes());
        hasher.update(b"\0");
        let body = serde_json::to_vec(&section.body).unwrap_or_default();
        hasher.update(&body);
        hasher.update(b"\0");
    }
    format!("{:x}", hasher.finalize())
}

/// Reading time owned by a single page view.
///
/// Reset value is `0`. [`sync`](Self::sync) is the only recomputation
/// trigger and only recomputes when the observed sections differ from the
/// previous observation.
#[derive(Debug, Clone)]
pub struct ReadingTimeState {
    options: ReadingOptions,
    minutes: u32,
    observed: Option<String>,
}

impl ReadingTimeState {
    pub fn new(options: ReadingOptions) -> Self {
        Self {
            options,
            minutes: 0,
            observed: None,
        }
    }

    pub fn value(&self) -> u32 {
        self.minutes
    }

    /// Observe the current sections. Returns `true` if the estimate was
    /// recomputed.
    pub fn sync(&mut self, sections: &[Section]) -> bool {
        let print = fingerprint(sections);
        if self.observed.as_deref() == Some(print.as_str()) {
            return false;
        }
        self.minutes = estimate(sections, &self.options);
        self.observed = Some(print);
        true
    }

    pub fn reset(&mut self) {
        self.minutes = 0;
        self.observed = None;
    }
}
