//! HTML rendering of post pages.
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating.
//! All plain-text fields (title, author, headings, date) are auto-escaped;
//! section bodies are rich-text HTML produced by [`RichText::as_html`] and
//! inserted as-is.
//!
//! ## Page Structure
//!
//! ```text
//! main.container
//! ├── img.banner
//! └── article.post
//!     ├── h1                      title
//!     ├── ul.info                 date · author · "N min"
//!     └── section#section-N       one per content section
//!         ├── h2                  heading
//!         └── div.post-content    body HTML
//! ```
//!
//! Sections are keyed by position, so repeated headings never collide.
//!
//! [`RichText::as_html`]: crate::richtext::RichText::as_html

use maud::{DOCTYPE, Markup, PreEscaped, html};

use crate::config::{self, ConfigError, SiteConfig};
use crate::post::{self, NormalizeError, NormalizeOptions, Post, RawDocument};
use crate::reading_time::{ReadingOptions, ReadingTimeState};

const CSS_STATIC: &str = include_str!("../static/post.css");

const ICON_CALENDAR: &str = r#"<svg viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" aria-hidden="true"><rect x="3" y="4" width="18" height="18" rx="2" ry="2"/><line x1="16" y1="2" x2="16" y2="6"/><line x1="8" y1="2" x2="8" y2="6"/><line x1="3" y1="10" x2="21" y2="10"/></svg>"#;
const ICON_USER: &str = r#"<svg viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" aria-hidden="true"><path d="M20 21v-2a4 4 0 0 0-4-4H8a4 4 0 0 0-4 4v2"/><circle cx="12" cy="7" r="4"/></svg>"#;
const ICON_CLOCK: &str = r#"<svg viewBox="0 0 24 24" fill="none" stroke="currentColor" stroke-width="2" aria-hidden="true"><circle cx="12" cy="12" r="10"/><polyline points="12 6 12 12 16 14"/></svg>"#;

/// Everything needed to turn raw documents into page markup.
#[derive(Debug, Clone)]
pub struct PageRenderer {
    css: String,
    fallback_text: String,
    normalize: NormalizeOptions,
    reading: ReadingOptions,
}

impl PageRenderer {
    pub fn new(config: &SiteConfig) -> Result<Self, ConfigError> {
        let color_css = config::generate_color_css(&config.colors);
        Ok(Self {
            css: format!("{}\n\n{}", color_css, CSS_STATIC),
            fallback_text: config.generation.fallback_text.clone(),
            normalize: config.normalize_options()?,
            reading: config.reading_options(),
        })
    }

    pub fn normalize(&self, raw: &RawDocument) -> Result<Post, NormalizeError> {
        post::normalize(raw, &self.normalize)
    }

    /// Start a view session for `post`.
    pub fn mount(&self, post: Post) -> PostView {
        PostView::mount(post, self.reading)
    }

    pub fn render_post(&self, post: &Post, reading_time: u32) -> Markup {
        let content = html! {
            main.container {
                img.banner src=(post.banner_url) alt="banner";
                article.post {
                    h1 { (post.title) }
                    ul.info {
                        li {
                            (PreEscaped(ICON_CALENDAR))
                            time { @if let Some(date) = &post.publication_date { (date) } }
                        }
                        li {
                            (PreEscaped(ICON_USER))
                            span { (post.author) }
                        }
                        li {
                            (PreEscaped(ICON_CLOCK))
                            span { (reading_time) " min" }
                        }
                    }
                    @for (idx, section) in post.sections.iter().enumerate() {
                        section.post-section id={ "section-" (idx + 1) } {
                            h2 { (section.heading) }
                            div.post-content {
                                (PreEscaped(section.body.as_html()))
                            }
                        }
                    }
                }
            }
        };

        base_document(&post.title, &self.css, content)
    }

    /// Placeholder served while an on-demand page is being generated.
    pub fn render_fallback(&self) -> Markup {
        let content = html! {
            div.loading { (self.fallback_text) }
        };
        base_document(&self.fallback_text, &self.css, content)
    }

    /// Not-found page, naming the requested slug when there is one.
    pub fn render_not_found(&self, slug: Option<&str>) -> Markup {
        let content = html! {
            main.not-found {
                h1 { "404" }
                @if let Some(slug) = slug {
                    p { "Post não encontrado: " code { (slug) } }
                } @else {
                    p { "Post não encontrado." }
                }
            }
        };
        base_document("404", &self.css, content)
    }

    /// Page served when the last attempt to generate `slug` failed.
    pub fn render_error(&self, slug: &str) -> Markup {
        let content = html! {
            main.not-found {
                h1 { "500" }
                p { "Não foi possível carregar o post: " code { (slug) } }
            }
        };
        base_document("500", &self.css, content)
    }
}

/// One page view: the post plus the reading time the view owns.
///
/// Mounting computes the estimate once; [`update`](Self::update) swaps in a
/// new post and lets the reading-time state decide whether to recompute.
#[derive(Debug, Clone)]
pub struct PostView {
    post: Post,
    reading_time: ReadingTimeState,
}

impl PostView {
    pub fn mount(post: Post, options: ReadingOptions) -> Self {
        let mut reading_time = ReadingTimeState::new(options);
        reading_time.sync(&post.sections);
        Self { post, reading_time }
    }

    pub fn post(&self) -> &Post {
        &self.post
    }

    pub fn reading_time(&self) -> u32 {
        self.reading_time.value()
    }

    /// Replace the post. Returns `true` if the reading time was recomputed.
    pub fn update(&mut self, post: Post) -> bool {
        self.post = post;
        self.reading_time.sync(&self.post.sections)
    }

    pub fn render(&self, renderer: &PageRenderer) -> Markup {
        renderer.render_post(&self.post, self.reading_time())
    }
}

/// Renders the base HTML document structure
fn base_document(title: &str, css: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="pt-BR" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                style { (PreEscaped(css)) }
            }
            body {
                (content)
            }
        }
    }
}
