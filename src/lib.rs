//! # Post Render
//!
//! Renders blog post pages from a headless CMS. Each page shows the post's
//! banner, title, publication date, author, an estimated reading time and
//! its content sections.
//!
//! # Architecture: Fetch, Normalize, Render
//!
//! ```text
//! ContentSource ──► RawDocument ──► normalize ──► Post ──► PostView ──► HTML
//!  (cms)              (post)          (post)              (render)
//!                                                      │
//!                                           reading_time::ReadingTimeState
//! ```
//!
//! [`pages::PageStore`] drives that pipeline per slug: it pre-generates the
//! enumerated posts, generates unknown ones on demand behind a placeholder,
//! and regenerates pages older than the revalidation window. The same store
//! backs both the static export ([`generate`]) and the HTTP server
//! ([`server`]).
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`cms`] | Content sources: HTTP client with retries, JSON directory, in-memory |
//! | [`post`] | Raw document shape, normalization into [`post::Post`], date formatting |
//! | [`richtext`] | Rich-text nodes: plain-text and HTML serialization |
//! | [`reading_time`] | Word counting, the minutes estimate, per-view reading-time state |
//! | [`render`] | Maud page templates and the per-page view session |
//! | [`pages`] | On-demand generation, revalidation, in-flight dedup |
//! | [`generate`] | Static export to a directory, plus the content check |
//! | [`cache`] | Build manifest for incremental exports |
//! | [`server`] | axum routes with cache headers |
//! | [`config`] | `config.toml` loading, validation, merging, and CSS generation |
//! | [`output`] | CLI output formatting |
//! | [`telemetry`] | tracing subscriber setup |
//!
//! # Design Decisions
//!
//! ## Server-side reading time
//!
//! The reading time is computed when a page is generated, not in the browser.
//! Pages carry no JavaScript; the number in the HTML is final. Each page keeps
//! its [`reading_time::ReadingTimeState`] across regenerations and only
//! recomputes when the sections actually changed.
//!
//! ## Sections keyed by position
//!
//! Section anchors are `section-1`, `section-2`, ... rather than derived from
//! headings, so two sections with the same heading never collide. Strict
//! normalization rejects duplicate headings outright.
//!
//! ## Lenient by default
//!
//! Absent fields normalize to empty values and an unparseable date is
//! omitted, so one incomplete document never takes a page down. `strictness =
//! "strict"` turns those into errors, and `check` reports them without
//! building.

pub mod cache;
pub mod cms;
pub mod config;
pub mod generate;
pub mod output;
pub mod pages;
pub mod post;
pub mod reading_time;
pub mod render;
pub mod richtext;
pub mod server;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod test_helpers;
