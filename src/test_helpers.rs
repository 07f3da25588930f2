//! Shared test utilities: raw document builders and word generators.
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let raw = sample_document("como-utilizar-hooks");
//! let sections = vec![section("Intro", &[words(199).as_str()])];
//! ```

use crate::post::{RawDocument, RawImage, RawPostData, RawSection, Section};
use crate::richtext::{RichText, RichTextNode};

/// `n` space-separated words (`w0 w1 ...`).
pub fn words(n: usize) -> String {
    (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
}

/// A section whose body has one paragraph per entry in `paragraphs`.
pub fn section(heading: &str, paragraphs: &[&str]) -> Section {
    Section {
        heading: heading.to_string(),
        body: RichText(
            paragraphs
                .iter()
                .map(|p| RichTextNode::paragraph(*p))
                .collect(),
        ),
    }
}

/// A complete, well-formed raw post document with two sections.
pub fn sample_document(uid: &str) -> RawDocument {
    RawDocument {
        id: Some(format!("id-{uid}")),
        uid: Some(uid.to_string()),
        kind: Some("post".to_string()),
        first_publication_date: Some("2021-03-05T12:00:00Z".to_string()),
        data: RawPostData {
            title: Some(format!("Post {uid}")),
            banner: Some(RawImage {
                url: Some(format!("https://images.example.com/{uid}.png")),
            }),
            author: Some("Joseph Oliveira".to_string()),
            content: Some(vec![
                RawSection {
                    heading: Some("Proin et varius".to_string()),
                    body: Some(RichText(vec![RichTextNode::paragraph(words(120))])),
                },
                RawSection {
                    heading: Some("Cras laoreet".to_string()),
                    body: Some(RichText(vec![
                        RichTextNode::paragraph(words(60)),
                        RichTextNode::paragraph(words(40)),
                    ])),
                },
            ]),
        },
    }
}
