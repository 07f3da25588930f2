//! Content service clients.
//!
//! Everything downstream depends only on [`ContentSource`]: enumerate the
//! documents of a type, and fetch one document by its `uid`.
//!
//! | Source | Backing store |
//! |--------|---------------|
//! | [`PrismicClient`] | Prismic-style REST API (`/api/v2`) over HTTP |
//! | [`FileSource`] | Directory of `<uid>.json` documents |
//! | [`MemorySource`] | In-process map, optional simulated latency |
//!
//! ## HTTP Protocol
//!
//! Queries must name a content version ("ref"). The client first reads the
//! API root to find the master ref, then issues predicate searches:
//!
//! ```text
//! GET {endpoint}                     → { "refs": [{ "ref": "...", "isMasterRef": true }] }
//! GET {endpoint}/documents/search?ref=..&q=[[at(document.type,"post")]]&pageSize=2
//! GET {endpoint}/documents/search?ref=..&q=[[at(my.post.uid,"slug")]]
//! ```
//!
//! Transient failures (connect errors, 5xx, 429) are retried with
//! exponential backoff via `reqwest-retry`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::config::CmsConfig;
use crate::post::RawDocument;

#[derive(Error, Debug)]
pub enum CmsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP middleware error: {0}")]
    Middleware(#[from] reqwest_middleware::Error),
    #[error("{url} returned status {status}")]
    Status { status: u16, url: String },
    #[error("{kind} document '{uid}' not found")]
    NotFound { kind: String, uid: String },
    #[error("content repository has no master ref")]
    NoMasterRef,
    #[error("invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no content source configured (set cms.endpoint or pass --documents)")]
    NotConfigured,
}

impl CmsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CmsError::NotFound { .. })
    }
}

/// Identifier of an enumerated document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub uid: String,
}

/// Response envelope of a document search.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse<T> {
    pub results: Vec<T>,
}

#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Enumerate up to `page_size` documents of type `kind`.
    async fn get_by_type(&self, kind: &str, page_size: u32)
    -> Result<Vec<DocumentSummary>, CmsError>;

    /// Fetch a single document of type `kind` by `uid`.
    async fn get_by_uid(&self, kind: &str, uid: &str) -> Result<RawDocument, CmsError>;
}

// ============================================================================
// HTTP client
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
struct ApiRoot {
    refs: Vec<ApiRef>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiRef {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(default)]
    is_master_ref: bool,
}

/// Client for a Prismic-style content API.
#[derive(Debug, Clone)]
pub struct PrismicClient {
    client: ClientWithMiddleware,
    endpoint: Url,
    access_token: Option<String>,
}

impl PrismicClient {
    pub fn new(config: &CmsConfig) -> Result<Self, CmsError> {
        if config.endpoint.trim().is_empty() {
            return Err(CmsError::NotConfigured);
        }
        let endpoint = Url::parse(config.endpoint.trim_end_matches('/'))?;
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(config.max_retries);
        let client = ClientBuilder::new(Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        Ok(Self {
            client,
            endpoint,
            access_token: config.access_token.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, mut url: Url) -> Result<T, CmsError> {
        if let Some(token) = &self.access_token {
            url.query_pairs_mut().append_pair("access_token", token);
        }
        debug!(url = %redact(&url), "content request");
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CmsError::Status {
                status: status.as_u16(),
                url: redact(&url),
            });
        }
        Ok(response.json::<T>().await?)
    }

    async fn master_ref(&self) -> Result<String, CmsError> {
        let root: ApiRoot = self.get_json(self.endpoint.clone()).await?;
        root.refs
            .into_iter()
            .find(|r| r.is_master_ref)
            .map(|r| r.reference)
            .ok_or(CmsError::NoMasterRef)
    }

    fn search_url(&self, reference: &str, predicate: &str, page_size: Option<u32>) -> Url {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map(|mut segments| {
                segments.push("documents").push("search");
            })
            .ok();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("ref", reference);
            query.append_pair("q", &format!("[{predicate}]"));
            if let Some(size) = page_size {
                query.append_pair("pageSize", &size.to_string());
            }
        }
        url
    }
}

/// Strip the access token from a URL before it is logged or reported.
fn redact(url: &Url) -> String {
    let mut clean = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "access_token")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    clean.set_query(None);
    if !pairs.is_empty() {
        clean.query_pairs_mut().extend_pairs(pairs);
    }
    clean.to_string()
}

/// `[at(path,"value")]`, with the value JSON-quoted.
fn at_predicate(path: &str, value: &str) -> String {
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    format!("[at({path},{quoted})]")
}

#[async_trait]
impl ContentSource for PrismicClient {
    async fn get_by_type(
        &self,
        kind: &str,
        page_size: u32,
    ) -> Result<Vec<DocumentSummary>, CmsError> {
        let reference = self.master_ref().await?;
        let url = self.search_url(
            &reference,
            &at_predicate("document.type", kind),
            Some(page_size),
        );
        let response: SearchResponse<RawDocument> = self.get_json(url).await?;
        Ok(response
            .results
            .into_iter()
            .filter_map(|doc| doc.uid.map(|uid| DocumentSummary { uid }))
            .collect())
    }

    async fn get_by_uid(&self, kind: &str, uid: &str) -> Result<RawDocument, CmsError> {
        let reference = self.master_ref().await?;
        let url = self.search_url(
            &reference,
            &at_predicate(&format!("my.{kind}.uid"), uid),
            Some(1),
        );
        let response: SearchResponse<RawDocument> = self.get_json(url).await?;
        response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| CmsError::NotFound {
                kind: kind.to_string(),
                uid: uid.to_string(),
            })
    }
}

// ============================================================================
// Directory source
// ============================================================================

/// Reads documents from `<dir>/<uid>.json`.
///
/// Each file holds one document in the same JSON shape the API returns. The
/// file stem is the uid for both listing and lookup; a `uid` field inside the
/// file that disagrees with it is ignored with a warning.
/// Documents whose `type` is absent are treated as matching any type.
#[derive(Debug, Clone)]
pub struct FileSource {
    dir: PathBuf,
}

impl FileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read(path: &Path) -> Result<RawDocument, CmsError> {
        let bytes = tokio::fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Whether `uid` can be used as a single path component.
pub(crate) fn is_safe_uid(uid: &str) -> bool {
    !uid.is_empty()
        && !uid.contains(['/', '\\'])
        && uid != "."
        && uid != ".."
}

fn matches_kind(doc: &RawDocument, kind: &str) -> bool {
    doc.kind.as_deref().is_none_or(|k| k == kind)
}

#[async_trait]
impl ContentSource for FileSource {
    async fn get_by_type(
        &self,
        kind: &str,
        page_size: u32,
    ) -> Result<Vec<DocumentSummary>, CmsError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut uids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|e| e != "json") {
                continue;
            }
            let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            let doc = Self::read(&path).await?;
            if !matches_kind(&doc, kind) {
                continue;
            }
            if let Some(uid) = doc.uid.as_deref().filter(|uid| *uid != stem) {
                warn!(
                    file = %path.display(),
                    uid,
                    "document uid differs from file name, using file name"
                );
            }
            uids.push(stem);
        }
        uids.sort();
        Ok(uids
            .into_iter()
            .take(page_size as usize)
            .map(|uid| DocumentSummary { uid })
            .collect())
    }

    async fn get_by_uid(&self, kind: &str, uid: &str) -> Result<RawDocument, CmsError> {
        let not_found = || CmsError::NotFound {
            kind: kind.to_string(),
            uid: uid.to_string(),
        };
        if !is_safe_uid(uid) {
            return Err(not_found());
        }
        let path = self.dir.join(format!("{uid}.json"));
        if !tokio::fs::try_exists(&path).await? {
            return Err(not_found());
        }
        let doc = Self::read(&path).await?;
        if !matches_kind(&doc, kind) {
            return Err(not_found());
        }
        Ok(doc)
    }
}

// ============================================================================
// In-memory source
// ============================================================================

/// Documents held in memory, keyed by uid.
///
/// `latency` delays every call, which makes on-demand generation observable.
/// Documents can be replaced while the source is in use.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    documents: Arc<DashMap<String, RawDocument>>,
    latency: Option<Duration>,
}

impl MemorySource {
    pub fn new(documents: impl IntoIterator<Item = RawDocument>) -> Self {
        let source = Self::default();
        for doc in documents {
            source.insert(doc);
        }
        source
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Insert or replace a document. Documents without a uid are ignored.
    pub fn insert(&self, doc: RawDocument) {
        if let Some(uid) = doc.uid.clone() {
            self.documents.insert(uid, doc);
        }
    }

    pub fn remove(&self, uid: &str) {
        self.documents.remove(uid);
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ContentSource for MemorySource {
    async fn get_by_type(
        &self,
        kind: &str,
        page_size: u32,
    ) -> Result<Vec<DocumentSummary>, CmsError> {
        self.delay().await;
        let mut uids: Vec<String> = self
            .documents
            .iter()
            .filter(|entry| matches_kind(entry.value(), kind))
            .map(|entry| entry.key().clone())
            .collect();
        uids.sort();
        Ok(uids
            .into_iter()
            .take(page_size as usize)
            .map(|uid| DocumentSummary { uid })
            .collect())
    }

    async fn get_by_uid(&self, kind: &str, uid: &str) -> Result<RawDocument, CmsError> {
        self.delay().await;
        self.documents
            .get(uid)
            .map(|entry| entry.value().clone())
            .filter(|doc| matches_kind(doc, kind))
            .ok_or_else(|| CmsError::NotFound {
                kind: kind.to_string(),
                uid: uid.to_string(),
            })
    }
}

/// Pick the content source for this run: a document directory if given,
/// otherwise the configured HTTP endpoint.
pub fn open_source(
    config: &CmsConfig,
    documents: Option<&Path>,
) -> Result<Arc<dyn ContentSource>, CmsError> {
    match documents {
        Some(dir) => Ok(Arc::new(FileSource::new(dir))),
        None => Ok(Arc::new(PrismicClient::new(config)?)),
    }
}
