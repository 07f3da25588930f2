//! Static export of post pages.
//!
//! Writes every statically enumerated post to the output directory, plus
//! the fallback placeholder and a generic not-found page:
//!
//! ```text
//! dist/
//! ├── .build-manifest.json      # incremental build state
//! ├── 404.html
//! ├── fallback.html
//! └── post/
//!     ├── como-utilizar-hooks/
//!     │   └── index.html
//!     └── criando-um-app-cra-do-zero/
//!         └── index.html
//! ```
//!
//! Pages generated within the revalidation window are kept without fetching
//! (see [`cache`](crate::cache)). Regenerated pages whose HTML did not change
//! are not rewritten.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::cache::{self, BuildManifest, BuildStats};
use crate::cms::{self, CmsError, ContentSource};
use crate::config::{ConfigError, SiteConfig};
use crate::pages::{PageError, PageStore};
use crate::post::{self, NormalizeError, NormalizeOptions, Strictness};
use crate::reading_time;

pub const FALLBACK_FILE: &str = "fallback.html";
pub const NOT_FOUND_FILE: &str = "404.html";

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Page(#[from] PageError),
    #[error(transparent)]
    Cms(#[from] CmsError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    /// Generated recently enough to keep without fetching.
    Fresh,
    /// Regenerated, identical to the file on disk.
    Unchanged,
    Written,
}

impl PageStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PageStatus::Fresh => "fresh",
            PageStatus::Unchanged => "unchanged",
            PageStatus::Written => "written",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportedPage {
    pub slug: String,
    /// Relative to the output directory.
    pub path: String,
    pub status: PageStatus,
}

#[derive(Debug, Clone, Default)]
pub struct GenerateReport {
    pub pages: Vec<ExportedPage>,
    /// Slugs skipped because they can't be used as a directory name.
    pub skipped: Vec<String>,
    pub stats: BuildStats,
}

/// Relative output path of a post page.
pub fn page_path(slug: &str) -> String {
    format!("post/{}/index.html", slug)
}

/// Hash of every setting that changes rendered output.
fn settings_hash(config: &SiteConfig) -> String {
    cache::hash_settings(&(
        &config.cms.document_type,
        &config.generation,
        &config.content,
        &config.colors,
    ))
}

fn unix_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

pub async fn generate(
    source: Arc<dyn ContentSource>,
    config: &SiteConfig,
    output_dir: &Path,
    use_cache: bool,
) -> Result<GenerateReport, GenerateError> {
    generate_at(source, config, output_dir, use_cache, unix_now()).await
}

/// [`generate`] with an explicit clock, in unix seconds.
pub async fn generate_at(
    source: Arc<dyn ContentSource>,
    config: &SiteConfig,
    output_dir: &Path,
    use_cache: bool,
    now: u64,
) -> Result<GenerateReport, GenerateError> {
    let settings = settings_hash(config);
    let mut manifest = if use_cache {
        BuildManifest::load(output_dir, &settings).await
    } else {
        BuildManifest::empty(&settings)
    };
    let store = PageStore::new(source, config)?;
    let revalidate_secs = config.generation.revalidate_secs;

    fs::create_dir_all(output_dir).await?;

    let slugs = store.static_paths().await?;
    let mut report = GenerateReport::default();

    for slug in &slugs {
        if !cms::is_safe_uid(slug) {
            warn!(slug = %slug, "skipping slug that is not a valid path component");
            report.skipped.push(slug.clone());
            continue;
        }
        let rel = page_path(slug);

        let status = if manifest.is_fresh(slug, now, revalidate_secs, output_dir).await {
            debug!(slug = %slug, "page is fresh");
            report.stats.fresh += 1;
            PageStatus::Fresh
        } else {
            let html = store.generate(slug).await?;
            let hash = cache::hash_html(&html);
            let status = if manifest.is_unchanged(slug, &hash, output_dir).await {
                report.stats.unchanged += 1;
                PageStatus::Unchanged
            } else {
                let path = output_dir.join(&rel);
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).await?;
                }
                fs::write(&path, html.as_bytes()).await?;
                report.stats.written += 1;
                PageStatus::Written
            };
            manifest.record(slug, rel.clone(), hash, now);
            status
        };

        report.pages.push(ExportedPage {
            slug: slug.clone(),
            path: rel,
            status,
        });
    }

    let renderer = store.renderer();
    fs::write(
        output_dir.join(FALLBACK_FILE),
        renderer.render_fallback().into_string(),
    )
    .await?;
    fs::write(
        output_dir.join(NOT_FOUND_FILE),
        renderer.render_not_found(None).into_string(),
    )
    .await?;

    manifest.retain_slugs(&slugs);
    manifest.save(output_dir).await?;

    info!(stats = %report.stats, output = %output_dir.display(), "export finished");
    Ok(report)
}

// ============================================================================
// Content check
// ============================================================================

#[derive(Debug, Clone)]
pub struct CheckedPost {
    pub slug: String,
    pub title: String,
    pub reading_time: u32,
    pub problems: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub posts: Vec<CheckedPost>,
}

impl CheckReport {
    pub fn problem_count(&self) -> usize {
        self.posts.iter().map(|p| p.problems.len()).sum()
    }
}

/// Fetch every static path and report what strict normalization would
/// reject, without writing anything.
pub async fn check(
    source: &dyn ContentSource,
    config: &SiteConfig,
) -> Result<CheckReport, GenerateError> {
    let configured = config.normalize_options()?;
    let strict = NormalizeOptions {
        strictness: Strictness::Strict,
        ..configured
    };
    let lenient = NormalizeOptions {
        strictness: Strictness::Lenient,
        ..configured
    };
    let reading = config.reading_options();
    let kind = &config.cms.document_type;

    let mut report = CheckReport::default();
    for summary in source.get_by_type(kind, config.cms.paths_page_size).await? {
        let slug = summary.uid;
        let mut problems = Vec::new();
        if !cms::is_safe_uid(&slug) {
            problems.push("slug is not a valid path component".to_string());
        }

        let raw = match source.get_by_uid(kind, &slug).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(slug = %slug, error = %err, "could not fetch document");
                problems.push(format!("fetch failed: {err}"));
                report.posts.push(CheckedPost {
                    slug,
                    title: String::new(),
                    reading_time: 0,
                    problems,
                });
                continue;
            }
        };
        if let Err(err) = post::normalize(&raw, &strict) {
            problems.push(err.to_string());
        }

        let (title, minutes) = match post::normalize(&raw, &lenient) {
            Ok(normalized) => {
                for heading in post::duplicate_headings(&normalized) {
                    let problem = NormalizeError::DuplicateHeading(heading.to_string()).to_string();
                    if !problems.contains(&problem) {
                        problems.push(problem);
                    }
                }
                (
                    normalized.title.clone(),
                    reading_time::estimate(&normalized.sections, &reading),
                )
            }
            Err(err) => {
                problems.push(err.to_string());
                (String::new(), 0)
            }
        };

        report.posts.push(CheckedPost {
            slug,
            title,
            reading_time: minutes,
            problems,
        });
    }
    Ok(report)
}
