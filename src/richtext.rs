//! Rich-text fields as delivered by the content service.
//!
//! A rich-text field is an ordered list of block nodes (paragraphs, headings,
//! list items, images, embeds). Each text-bearing node carries its raw `text`
//! plus a list of formatting spans addressed by offsets into that text.
//!
//! Two renderings are supported:
//!
//! - [`RichText::as_text`]: markup stripped, node texts joined in document
//!   order. This is what word counting operates on.
//! - [`RichText::as_html`]: block-level HTML with nested inline formatting.
//!   Consecutive list items are grouped into a single `<ul>`/`<ol>`.
//!
//! ## Span Offsets
//!
//! The backend computes span offsets as JavaScript string indices, i.e. UTF-16
//! code units. They are translated to byte offsets before slicing, and any
//! offset past the end of the text is clamped.

use maud::{PreEscaped, html};
use serde::{Deserialize, Serialize};

/// An ordered rich-text field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RichText(pub Vec<RichTextNode>);

/// A single block node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichTextNode {
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub spans: Vec<Span>,
    /// Image source (image nodes only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Image alternative text (image nodes only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    /// Embed payload (embed nodes only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oembed: Option<Embed>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    #[serde(rename = "paragraph")]
    Paragraph,
    #[serde(rename = "preformatted")]
    Preformatted,
    #[serde(rename = "heading1")]
    Heading1,
    #[serde(rename = "heading2")]
    Heading2,
    #[serde(rename = "heading3")]
    Heading3,
    #[serde(rename = "heading4")]
    Heading4,
    #[serde(rename = "heading5")]
    Heading5,
    #[serde(rename = "heading6")]
    Heading6,
    #[serde(rename = "list-item")]
    ListItem,
    #[serde(rename = "o-list-item")]
    OrderedListItem,
    #[serde(rename = "image")]
    Image,
    #[serde(rename = "embed")]
    Embed,
    #[serde(other)]
    Unknown,
}

impl NodeKind {
    fn heading_level(self) -> Option<u8> {
        match self {
            NodeKind::Heading1 => Some(1),
            NodeKind::Heading2 => Some(2),
            NodeKind::Heading3 => Some(3),
            NodeKind::Heading4 => Some(4),
            NodeKind::Heading5 => Some(5),
            NodeKind::Heading6 => Some(6),
            _ => None,
        }
    }
}

/// Inline formatting over `[start, end)` of the node text (UTF-16 offsets).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "type")]
    pub kind: SpanKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<SpanData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    Strong,
    Em,
    Hyperlink,
    Label,
    #[serde(other)]
    Unknown,
}

/// Extra span payload: link target for hyperlinks, class name for labels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpanData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default)]
    pub embed_url: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub provider_name: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
}

impl RichTextNode {
    /// Convenience constructor for a plain paragraph.
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Paragraph,
            text: text.into(),
            spans: Vec::new(),
            url: None,
            alt: None,
            oembed: None,
        }
    }
}

impl RichText {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Plain text: every node's text, in order, joined by `separator`.
    pub fn as_text(&self, separator: &str) -> String {
        self.0
            .iter()
            .map(|node| node.text.as_str())
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// Block HTML for the whole field.
    pub fn as_html(&self) -> String {
        let mut out = String::new();
        let mut open_list: Option<NodeKind> = None;

        for node in &self.0 {
            let list = match node.kind {
                NodeKind::ListItem | NodeKind::OrderedListItem => Some(node.kind),
                _ => None,
            };
            if open_list != list {
                if let Some(kind) = open_list {
                    out.push_str(list_close(kind));
                }
                if let Some(kind) = list {
                    out.push_str(list_open(kind));
                }
                open_list = list;
            }
            out.push_str(&render_node(node));
        }
        if let Some(kind) = open_list {
            out.push_str(list_close(kind));
        }
        out
    }
}

fn list_open(kind: NodeKind) -> &'static str {
    if kind == NodeKind::OrderedListItem {
        "<ol>"
    } else {
        "<ul>"
    }
}

fn list_close(kind: NodeKind) -> &'static str {
    if kind == NodeKind::OrderedListItem {
        "</ol>"
    } else {
        "</ul>"
    }
}

fn render_node(node: &RichTextNode) -> String {
    if let Some(level) = node.kind.heading_level() {
        return format!(
            "<h{level}>{}</h{level}>",
            render_spans(&node.text, &node.spans)
        );
    }
    match node.kind {
        NodeKind::Paragraph => format!("<p>{}</p>", render_spans(&node.text, &node.spans)),
        NodeKind::Preformatted => format!("<pre>{}</pre>", render_spans(&node.text, &node.spans)),
        NodeKind::ListItem | NodeKind::OrderedListItem => {
            format!("<li>{}</li>", render_spans(&node.text, &node.spans))
        }
        NodeKind::Image => html! {
            p.block-img {
                img src=(node.url.as_deref().unwrap_or_default()) alt=(node.alt.as_deref().unwrap_or_default());
            }
        }
        .into_string(),
        NodeKind::Embed => match &node.oembed {
            Some(embed) => html! {
                div data-oembed=(embed.embed_url)
                    data-oembed-type=(embed.kind)
                    data-oembed-provider=[embed.provider_name.as_deref()] {
                    (PreEscaped(embed.html.as_deref().unwrap_or_default()))
                }
            }
            .into_string(),
            None => String::new(),
        },
        _ => String::new(),
    }
}

/// Render node text with its spans as properly nested inline elements.
///
/// The text is cut at every span boundary. For each segment the set of
/// covering spans is computed (outermost first); elements already open that
/// remain a prefix of that set stay open, everything else is closed and
/// reopened, so the output is always well-nested.
fn render_spans(text: &str, spans: &[Span]) -> String {
    let len = text.encode_utf16().count();
    let spans: Vec<(usize, usize, &Span)> = spans
        .iter()
        .filter_map(|span| {
            let start = span.start.min(len);
            let end = span.end.min(len);
            (start < end).then_some((start, end, span))
        })
        .collect();

    let mut bounds: Vec<usize> = vec![0, len];
    for (start, end, _) in &spans {
        bounds.push(*start);
        bounds.push(*end);
    }
    bounds.sort_unstable();
    bounds.dedup();

    let mut out = String::new();
    let mut open: Vec<usize> = Vec::new();

    for window in bounds.windows(2) {
        let (from, to) = (window[0], window[1]);
        let mut active: Vec<usize> = (0..spans.len())
            .filter(|&i| spans[i].0 <= from && spans[i].1 >= to)
            .collect();
        active.sort_by(|&a, &b| {
            spans[a]
                .0
                .cmp(&spans[b].0)
                .then(spans[b].1.cmp(&spans[a].1))
                .then(a.cmp(&b))
        });

        let keep = open
            .iter()
            .zip(&active)
            .take_while(|(opened, wanted)| opened == wanted)
            .count();
        for &i in open[keep..].iter().rev() {
            out.push_str(close_tag(spans[i].2));
        }
        open.truncate(keep);
        for &i in &active[keep..] {
            out.push_str(&open_tag(spans[i].2));
            open.push(i);
        }

        let segment = &text[byte_offset(text, from)..byte_offset(text, to)];
        out.push_str(&escape_text(segment));
    }
    for &i in open.iter().rev() {
        out.push_str(close_tag(spans[i].2));
    }
    out
}

fn open_tag(span: &Span) -> String {
    let data = span.data.clone().unwrap_or_default();
    match span.kind {
        SpanKind::Strong => "<strong>".to_string(),
        SpanKind::Em => "<em>".to_string(),
        SpanKind::Label => match data.label {
            Some(label) => format!(r#"<span class="{}">"#, escape_attr(&label)),
            None => "<span>".to_string(),
        },
        SpanKind::Hyperlink => {
            let href = escape_attr(data.url.as_deref().unwrap_or_default());
            match data.target {
                Some(target) => format!(
                    r#"<a href="{href}" target="{}" rel="noopener noreferrer">"#,
                    escape_attr(&target)
                ),
                None => format!(r#"<a href="{href}">"#),
            }
        }
        SpanKind::Unknown => "<span>".to_string(),
    }
}

fn close_tag(span: &Span) -> &'static str {
    match span.kind {
        SpanKind::Strong => "</strong>",
        SpanKind::Em => "</em>",
        SpanKind::Hyperlink => "</a>",
        SpanKind::Label | SpanKind::Unknown => "</span>",
    }
}

/// Byte index of a UTF-16 offset, rounded up to the next char boundary.
fn byte_offset(text: &str, utf16_pos: usize) -> usize {
    let mut units = 0;
    for (idx, ch) in text.char_indices() {
        if units >= utf16_pos {
            return idx;
        }
        units += ch.len_utf16();
    }
    text.len()
}

fn escape_attr(value: &str) -> String {
    html! { (value) }.into_string()
}

fn escape_text(value: &str) -> String {
    escape_attr(value).replace('\n', "<br />")
}
