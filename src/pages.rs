//! Page generation with on-demand fallback and periodic revalidation.
//!
//! [`PageStore`] owns every generated page. Pages enumerated by
//! [`static_paths`](PageStore::static_paths) are generated up front by
//! [`prerender`](PageStore::prerender); anything else is generated the first
//! time it is requested, with a placeholder served meanwhile.
//!
//! ## Request lifecycle
//!
//! ```text
//! request(slug)
//! ├── Ready, age <  revalidate  →  Rendered { stale: false }
//! ├── Ready, age >= revalidate  →  Rendered { stale: true }  + regenerate in background
//! ├── Missing                   →  NotFound                  (+ recheck once stale)
//! ├── Failed                    →  Failed                    (+ retry once stale)
//! └── unknown                   →  Fallback                  + generate in background
//! ```
//!
//! At most one generation per slug is in flight. A failed regeneration keeps
//! the page that was already there. A failed first generation is remembered
//! as `Missing` or `Failed` so later requests get an answer instead of the
//! placeholder.
//!
//! `Missing` and `Failed` entries are negative entries: they expire after the
//! revalidation window ([`evict_expired`](PageStore::evict_expired)) and at
//! most `generation.max_negative_pages` of them are kept, oldest dropped
//! first.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cms::{CmsError, ContentSource};
use crate::config::{ConfigError, SiteConfig};
use crate::post::NormalizeError;
use crate::render::{PageRenderer, PostView};

#[derive(Error, Debug)]
pub enum PageError {
    #[error("content fetch failed: {0}")]
    Cms(#[from] CmsError),
    #[error("invalid document: {0}")]
    Normalize(#[from] NormalizeError),
}

impl PageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PageError::Cms(err) if err.is_not_found())
    }
}

/// What a request for a slug resolves to.
#[derive(Debug, Clone)]
pub enum PageResponse {
    Rendered { html: Arc<str>, stale: bool },
    Fallback(Arc<str>),
    NotFound,
    /// The last generation attempt failed with this error.
    Failed(Arc<str>),
}

#[derive(Debug)]
enum PageEntry {
    Ready {
        html: Arc<str>,
        view: PostView,
        generated_at: Instant,
    },
    Missing {
        checked_at: Instant,
    },
    Failed {
        checked_at: Instant,
        error: Arc<str>,
    },
}

impl PageEntry {
    fn age(&self) -> Duration {
        self.stamp().elapsed()
    }

    fn stamp(&self) -> Instant {
        match self {
            PageEntry::Ready { generated_at, .. } => *generated_at,
            PageEntry::Missing { checked_at } | PageEntry::Failed { checked_at, .. } => {
                *checked_at
            }
        }
    }

    fn is_negative(&self) -> bool {
        !matches!(self, PageEntry::Ready { .. })
    }
}

// ============================================================================
// In-flight tracking
// ============================================================================

/// Slugs with a generation currently running. Each holds a receiver that
/// flips to `true` once the generation finished.
#[derive(Default, Clone)]
struct InFlightPages {
    slugs: Arc<DashMap<String, watch::Receiver<bool>>>,
}

impl InFlightPages {
    /// Claim `slug`. Returns `None` if a generation is already running.
    fn acquire(&self, slug: &str) -> Option<GenerationGuard> {
        match self.slugs.entry(slug.to_string()) {
            Entry::Vacant(vacant) => {
                let (done, rx) = watch::channel(false);
                vacant.insert(rx);
                Some(GenerationGuard {
                    slug: slug.to_string(),
                    slugs: Arc::clone(&self.slugs),
                    done,
                })
            }
            Entry::Occupied(_) => None,
        }
    }

    fn watch(&self, slug: &str) -> Option<watch::Receiver<bool>> {
        self.slugs.get(slug).map(|rx| rx.value().clone())
    }

    fn contains(&self, slug: &str) -> bool {
        self.slugs.contains_key(slug)
    }
}

struct GenerationGuard {
    slug: String,
    slugs: Arc<DashMap<String, watch::Receiver<bool>>>,
    done: watch::Sender<bool>,
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        self.slugs.remove(&self.slug);
        self.done.send_replace(true);
    }
}

// ============================================================================
// Page store
// ============================================================================

pub struct PageStore {
    source: Arc<dyn ContentSource>,
    renderer: PageRenderer,
    document_type: String,
    page_size: u32,
    revalidate: Duration,
    max_negative: usize,
    fallback: Arc<str>,
    pages: DashMap<String, PageEntry>,
    inflight: InFlightPages,
}

impl PageStore {
    pub fn new(source: Arc<dyn ContentSource>, config: &SiteConfig) -> Result<Self, ConfigError> {
        let renderer = PageRenderer::new(config)?;
        let fallback = Arc::from(renderer.render_fallback().into_string());
        Ok(Self {
            source,
            renderer,
            document_type: config.cms.document_type.clone(),
            page_size: config.cms.paths_page_size,
            revalidate: config.revalidate(),
            max_negative: config.generation.max_negative_pages,
            fallback,
            pages: DashMap::new(),
            inflight: InFlightPages::default(),
        })
    }

    pub fn renderer(&self) -> &PageRenderer {
        &self.renderer
    }

    pub fn revalidate(&self) -> Duration {
        self.revalidate
    }

    /// Number of slugs with a stored entry, negative entries included.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Slugs to generate ahead of any request.
    pub async fn static_paths(&self) -> Result<Vec<String>, PageError> {
        let docs = self
            .source
            .get_by_type(&self.document_type, self.page_size)
            .await?;
        Ok(docs.into_iter().map(|doc| doc.uid).collect())
    }

    /// Generate every static path. The first failure aborts.
    pub async fn prerender(&self) -> Result<Vec<String>, PageError> {
        let slugs = self.static_paths().await?;
        for slug in &slugs {
            self.generate(slug).await?;
        }
        info!(pages = slugs.len(), "prerendered static paths");
        Ok(slugs)
    }

    pub fn request(self: &Arc<Self>, slug: &str) -> PageResponse {
        let current = self.pages.get(slug).map(|entry| {
            let stale = entry.age() >= self.revalidate;
            let response = match entry.value() {
                PageEntry::Ready { html, .. } => PageResponse::Rendered {
                    html: Arc::clone(html),
                    stale,
                },
                PageEntry::Missing { .. } => PageResponse::NotFound,
                PageEntry::Failed { error, .. } => PageResponse::Failed(Arc::clone(error)),
            };
            (response, stale)
        });

        match current {
            Some((response, stale)) => {
                if stale {
                    debug!(slug, "entry is stale, regenerating");
                    self.schedule(slug);
                }
                response
            }
            None => {
                debug!(slug, "serving fallback");
                self.schedule(slug);
                PageResponse::Fallback(Arc::clone(&self.fallback))
            }
        }
    }

    /// Start a background generation for `slug` unless one is running.
    /// Returns `true` if a new generation was started.
    pub fn schedule(self: &Arc<Self>, slug: &str) -> bool {
        let Some(guard) = self.inflight.acquire(slug) else {
            return false;
        };
        let store = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = store.generate(&guard.slug).await {
                warn!(slug = %guard.slug, error = %err, "page generation failed");
            }
            drop(guard);
        });
        true
    }

    pub fn is_generating(&self, slug: &str) -> bool {
        self.inflight.contains(slug)
    }

    /// Wait for the in-flight generation of `slug`, if there is one.
    pub async fn settled(&self, slug: &str) {
        if let Some(mut rx) = self.inflight.watch(slug) {
            let _ = rx.wait_for(|done| *done).await;
        }
    }

    /// Fetch, normalize and render `slug`, replacing whatever was stored.
    ///
    /// On failure a generated page stays as it was; otherwise the slug is
    /// remembered as missing or failed.
    pub async fn generate(&self, slug: &str) -> Result<Arc<str>, PageError> {
        match self.build(slug).await {
            Ok(html) => Ok(html),
            Err(err) => {
                self.record_failure(slug, &err);
                Err(err)
            }
        }
    }

    async fn build(&self, slug: &str) -> Result<Arc<str>, PageError> {
        let raw = self.source.get_by_uid(&self.document_type, slug).await?;
        let post = self.renderer.normalize(&raw)?;
        let now = Instant::now();

        let mut entry = self
            .pages
            .entry(slug.to_string())
            .or_insert(PageEntry::Missing { checked_at: now });
        let html = if let PageEntry::Ready {
            html,
            view,
            generated_at,
        } = entry.value_mut()
        {
            if view.update(post) {
                debug!(slug, minutes = view.reading_time(), "reading time recomputed");
            }
            *html = Arc::from(view.render(&self.renderer).into_string());
            *generated_at = now;
            Arc::clone(html)
        } else {
            let view = self.renderer.mount(post);
            let html: Arc<str> = Arc::from(view.render(&self.renderer).into_string());
            *entry = PageEntry::Ready {
                html: Arc::clone(&html),
                view,
                generated_at: now,
            };
            html
        };

        info!(slug, bytes = html.len(), "generated page");
        Ok(html)
    }

    /// Remember a failed generation unless a page was already generated.
    fn record_failure(&self, slug: &str, err: &PageError) {
        let now = Instant::now();
        let negative = if err.is_not_found() {
            PageEntry::Missing { checked_at: now }
        } else {
            PageEntry::Failed {
                checked_at: now,
                error: Arc::from(err.to_string()),
            }
        };

        let inserted = match self.pages.entry(slug.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(negative);
                true
            }
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_negative() {
                    occupied.insert(negative);
                }
                false
            }
        };
        if inserted {
            self.trim_negative();
        }
    }

    /// Drop missing and failed entries older than the revalidation window.
    /// Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let mut removed = 0;
        self.pages.retain(|_, entry| {
            let expired = entry.is_negative() && entry.age() >= self.revalidate;
            if expired {
                removed += 1;
            }
            !expired
        });
        if removed > 0 {
            debug!(removed, "evicted expired negative entries");
        }
        removed
    }

    /// Keep at most `max_negative` negative entries, dropping the oldest.
    fn trim_negative(&self) {
        self.evict_expired();
        let mut negative: Vec<(String, Instant)> = self
            .pages
            .iter()
            .filter(|entry| entry.value().is_negative())
            .map(|entry| (entry.key().clone(), entry.value().stamp()))
            .collect();
        if negative.len() <= self.max_negative {
            return;
        }
        negative.sort_by_key(|(_, stamp)| *stamp);
        let excess = negative.len() - self.max_negative;
        for (slug, _) in negative.into_iter().take(excess) {
            self.pages.remove_if(&slug, |_, entry| entry.is_negative());
        }
    }
}
