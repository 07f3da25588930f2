//! Build manifest for incremental static exports.
//!
//! Every export fetches each post from the content service, which is the
//! slow part of a build. This module lets the export skip pages that were
//! generated recently, and avoid rewriting pages whose HTML came out
//! byte-identical.
//!
//! # Design
//!
//! The manifest records, per slug, the SHA-256 of the rendered HTML and the
//! unix time it was generated. A page is **fresh** when:
//! 1. it was generated less than `revalidate` seconds ago, and
//! 2. the previously written file is still on disk.
//!
//! Fresh pages are not fetched at all. Regenerated pages are compared by
//! hash and only written when the content changed.
//!
//! ## Settings hash
//!
//! The manifest also stores `settings_hash`, a SHA-256 of the serialized
//! site config. Changing anything that affects rendering (colors, fallback
//! text, time zone) produces a new hash and the whole manifest is discarded.
//!
//! ## Storage
//!
//! The manifest is a JSON file at `<output_dir>/.build-manifest.json`, so
//! it travels with the output directory when that is cached between runs.
//!
//! ## Bypassing the cache
//!
//! Pass `--no-cache` to `build` to regenerate and rewrite every page. This
//! starts from an empty manifest.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the build manifest file within the output directory.
const MANIFEST_FILENAME: &str = ".build-manifest.json";

/// Version of the manifest format. Bump this to invalidate all existing
/// manifests when the format or hashing changes.
const MANIFEST_VERSION: u32 = 1;

/// Last known state of one generated page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageRecord {
    /// Output path relative to the output directory.
    pub path: String,
    pub content_hash: String,
    /// Unix seconds.
    pub generated_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildManifest {
    pub version: u32,
    pub settings_hash: String,
    pub pages: HashMap<String, PageRecord>,
}

impl BuildManifest {
    /// Create an empty manifest (used for `--no-cache` or first build).
    pub fn empty(settings_hash: &str) -> Self {
        Self {
            version: MANIFEST_VERSION,
            settings_hash: settings_hash.to_string(),
            pages: HashMap::new(),
        }
    }

    /// Load from the output directory. Returns an empty manifest if the file
    /// doesn't exist, can't be parsed, or was written with other settings.
    pub async fn load(output_dir: &Path, settings_hash: &str) -> Self {
        let content = match tokio::fs::read_to_string(manifest_path(output_dir)).await {
            Ok(c) => c,
            Err(_) => return Self::empty(settings_hash),
        };
        let manifest: Self = match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(_) => return Self::empty(settings_hash),
        };
        if manifest.version != MANIFEST_VERSION || manifest.settings_hash != settings_hash {
            return Self::empty(settings_hash);
        }
        manifest
    }

    pub async fn save(&self, output_dir: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(manifest_path(output_dir), json).await
    }

    pub fn get(&self, slug: &str) -> Option<&PageRecord> {
        self.pages.get(slug)
    }

    /// Whether `slug` was generated within `revalidate_secs` of `now` and
    /// its output file still exists.
    pub async fn is_fresh(
        &self,
        slug: &str,
        now: u64,
        revalidate_secs: u64,
        output_dir: &Path,
    ) -> bool {
        match self.pages.get(slug) {
            Some(record) if now.saturating_sub(record.generated_at) < revalidate_secs => {
                output_exists(output_dir, record).await
            }
            _ => false,
        }
    }

    /// Whether the stored hash for `slug` equals `content_hash` and the file
    /// is still on disk.
    pub async fn is_unchanged(&self, slug: &str, content_hash: &str, output_dir: &Path) -> bool {
        match self.pages.get(slug) {
            Some(record) if record.content_hash == content_hash => {
                output_exists(output_dir, record).await
            }
            _ => false,
        }
    }

    pub fn record(&mut self, slug: &str, path: String, content_hash: String, generated_at: u64) {
        self.pages.insert(
            slug.to_string(),
            PageRecord {
                path,
                content_hash,
                generated_at,
            },
        );
    }

    /// Drop records for slugs no longer enumerated.
    pub fn retain_slugs(&mut self, slugs: &[String]) {
        self.pages.retain(|slug, _| slugs.contains(slug));
    }
}

async fn output_exists(output_dir: &Path, record: &PageRecord) -> bool {
    tokio::fs::try_exists(output_dir.join(&record.path))
        .await
        .unwrap_or(false)
}

/// SHA-256 of rendered HTML, returned as a hex string.
pub fn hash_html(html: &str) -> String {
    format!("{:x}", Sha256::digest(html.as_bytes()))
}

/// SHA-256 of any serializable settings value.
pub fn hash_settings<T: Serialize>(settings: &T) -> String {
    let bytes = serde_json::to_vec(settings).unwrap_or_default();
    format!("{:x}", Sha256::digest(&bytes))
}

/// Summary of cache performance for a build run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildStats {
    pub fresh: u32,
    pub unchanged: u32,
    pub written: u32,
}

impl BuildStats {
    pub fn total(&self) -> u32 {
        self.fresh + self.unchanged + self.written
    }
}

impl fmt::Display for BuildStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fresh > 0 || self.unchanged > 0 {
            write!(
                f,
                "{} fresh, {} unchanged, {} written ({} total)",
                self.fresh,
                self.unchanged,
                self.written,
                self.total()
            )
        } else {
            write!(f, "{} written", self.written)
        }
    }
}

/// Resolve the build manifest path for an output directory.
pub fn manifest_path(output_dir: &Path) -> PathBuf {
    output_dir.join(MANIFEST_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_page(dir: &Path, rel: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "<html></html>").unwrap();
    }

    // =========================================================================
    // Freshness
    // =========================================================================

    #[test]
    fn empty_manifest_has_no_pages() {
        let m = BuildManifest::empty("s");
        assert_eq!(m.version, MANIFEST_VERSION);
        assert!(m.pages.is_empty());
    }

    #[tokio::test]
    async fn fresh_within_revalidate_window() {
        let tmp = TempDir::new().unwrap();
        write_page(tmp.path(), "post/a/index.html");
        let mut m = BuildManifest::empty("s");
        m.record("a", "post/a/index.html".into(), "h".into(), 1_000);

        assert!(m.is_fresh("a", 1_000, 1800, tmp.path()).await);
        assert!(m.is_fresh("a", 2_799, 1800, tmp.path()).await);
        assert!(!m.is_fresh("a", 2_800, 1800, tmp.path()).await);
    }

    #[tokio::test]
    async fn not_fresh_when_file_deleted() {
        let tmp = TempDir::new().unwrap();
        let mut m = BuildManifest::empty("s");
        m.record("a", "post/a/index.html".into(), "h".into(), 1_000);
        assert!(!m.is_fresh("a", 1_000, 1800, tmp.path()).await);
    }

    #[tokio::test]
    async fn not_fresh_when_unknown() {
        let tmp = TempDir::new().unwrap();
        assert!(!BuildManifest::empty("s").is_fresh("a", 0, 1800, tmp.path()).await);
    }

    #[tokio::test]
    async fn clock_going_backwards_counts_as_fresh() {
        let tmp = TempDir::new().unwrap();
        write_page(tmp.path(), "post/a/index.html");
        let mut m = BuildManifest::empty("s");
        m.record("a", "post/a/index.html".into(), "h".into(), 5_000);
        assert!(m.is_fresh("a", 4_000, 1800, tmp.path()).await);
    }

    #[tokio::test]
    async fn unchanged_compares_hash() {
        let tmp = TempDir::new().unwrap();
        write_page(tmp.path(), "post/a/index.html");
        let mut m = BuildManifest::empty("s");
        m.record("a", "post/a/index.html".into(), hash_html("x"), 0);

        assert!(m.is_unchanged("a", &hash_html("x"), tmp.path()).await);
        assert!(!m.is_unchanged("a", &hash_html("y"), tmp.path()).await);
        assert!(!m.is_unchanged("b", &hash_html("x"), tmp.path()).await);
    }

    #[test]
    fn retain_drops_removed_slugs() {
        let mut m = BuildManifest::empty("s");
        m.record("a", "post/a/index.html".into(), "h".into(), 0);
        m.record("b", "post/b/index.html".into(), "h".into(), 0);
        m.retain_slugs(&["b".to_string()]);
        assert!(m.get("a").is_none());
        assert!(m.get("b").is_some());
    }

    // =========================================================================
    // Save / Load
    // =========================================================================

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let mut m = BuildManifest::empty("settings");
        m.record("a", "post/a/index.html".into(), "h1".into(), 42);
        m.save(tmp.path()).await.unwrap();

        let loaded = BuildManifest::load(tmp.path(), "settings").await;
        assert_eq!(loaded.get("a"), m.get("a"));
    }

    #[tokio::test]
    async fn load_missing_file_returns_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(BuildManifest::load(tmp.path(), "s").await.pages.is_empty());
    }

    #[tokio::test]
    async fn load_corrupt_json_returns_empty() {
        let tmp = TempDir::new().unwrap();
        fs::write(manifest_path(tmp.path()), "not json {{{").unwrap();
        assert!(BuildManifest::load(tmp.path(), "s").await.pages.is_empty());
    }

    #[tokio::test]
    async fn load_wrong_version_returns_empty() {
        let tmp = TempDir::new().unwrap();
        let mut m = BuildManifest::empty("s");
        m.version = 999;
        m.record("a", "p".into(), "h".into(), 0);
        m.save(tmp.path()).await.unwrap();
        assert!(BuildManifest::load(tmp.path(), "s").await.pages.is_empty());
    }

    #[tokio::test]
    async fn load_with_changed_settings_returns_empty() {
        let tmp = TempDir::new().unwrap();
        let mut m = BuildManifest::empty("old");
        m.record("a", "p".into(), "h".into(), 0);
        m.save(tmp.path()).await.unwrap();

        let loaded = BuildManifest::load(tmp.path(), "new").await;
        assert!(loaded.pages.is_empty());
        assert_eq!(loaded.settings_hash, "new");
    }

    // =========================================================================
    // Hashing and stats
    // =========================================================================

    #[test]
    fn hash_html_is_hex_sha256() {
        let h = hash_html("hello");
        assert_eq!(h.len(), 64);
        assert_eq!(h, hash_html("hello"));
        assert_ne!(h, hash_html("hello!"));
    }

    #[test]
    fn settings_hash_tracks_values() {
        assert_eq!(hash_settings(&("a", 1)), hash_settings(&("a", 1)));
        assert_ne!(hash_settings(&("a", 1)), hash_settings(&("a", 2)));
    }

    #[test]
    fn stats_display_all_written() {
        let stats = BuildStats {
            written: 3,
            ..BuildStats::default()
        };
        assert_eq!(stats.to_string(), "3 written");
    }

    #[test]
    fn stats_display_mixed() {
        let stats = BuildStats {
            fresh: 1,
            unchanged: 2,
            written: 3,
        };
        assert_eq!(stats.to_string(), "1 fresh, 2 unchanged, 3 written (6 total)");
    }
}
