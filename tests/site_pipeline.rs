//! End-to-end tests against the JSON documents under `fixtures/documents`.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode, header::CACHE_CONTROL};
use http_body_util::BodyExt;
use post_render::cms::{ContentSource, FileSource};
use post_render::config::{self, SiteConfig};
use post_render::generate::{self, PageStatus};
use post_render::pages::PageStore;
use post_render::server;
use tempfile::TempDir;
use tower::ServiceExt;

fn fixture_source() -> Arc<dyn ContentSource> {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures/documents");
    Arc::new(FileSource::new(dir))
}

async fn fetch(store: &Arc<PageStore>, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = server::router(Arc::clone(store))
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let cache = response
        .headers()
        .get(CACHE_CONTROL)
        .map(|v| v.to_str().unwrap().to_string());
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, cache, String::from_utf8(body.to_vec()).unwrap())
}

// =========================================================================
// Static export
// =========================================================================

#[tokio::test]
async fn build_exports_first_page_of_posts() {
    let out = TempDir::new().unwrap();
    let report = generate::generate(fixture_source(), &SiteConfig::default(), out.path(), true)
        .await
        .unwrap();

    let slugs: Vec<&str> = report.pages.iter().map(|p| p.slug.as_str()).collect();
    assert_eq!(slugs, vec!["como-utilizar-hooks", "criando-um-app-cra-do-zero"]);
    assert!(report.pages.iter().all(|p| p.status == PageStatus::Written));

    let html =
        std::fs::read_to_string(out.path().join("post/como-utilizar-hooks/index.html")).unwrap();
    assert!(html.contains("<h1>Como utilizar Hooks</h1>"));
    assert!(html.contains("<time>15 mar 2021</time>"));
    assert!(html.contains("<span>Joseph Oliveira</span>"));
    assert!(html.contains("<span>1 min</span>"));
    assert!(html.contains("<strong>Nullam dolor</strong>"));
    assert!(html.contains(r#"<a href="https://reactjs.org/docs/hooks-intro.html">"#));
    assert!(html.contains("<ul><li>useState</li><li>useEffect</li><li>useCallback</li></ul>"));

    assert!(out.path().join("fallback.html").exists());
    assert!(out.path().join("404.html").exists());
    assert!(!out.path().join("post/typescript-por-tras-do-superset").exists());
}

#[tokio::test]
async fn rebuild_keeps_fresh_pages() {
    let out = TempDir::new().unwrap();
    let config = SiteConfig::default();
    generate::generate(fixture_source(), &config, out.path(), true)
        .await
        .unwrap();

    let report = generate::generate(fixture_source(), &config, out.path(), true)
        .await
        .unwrap();
    assert!(report.pages.iter().all(|p| p.status == PageStatus::Fresh));
    assert_eq!(report.stats.fresh, 2);
}

#[tokio::test]
async fn larger_page_size_exports_more_posts() {
    let out = TempDir::new().unwrap();
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("config.toml");
    std::fs::write(&config_path, "[cms]\npaths_page_size = 10\n").unwrap();
    let config = config::load_config(&config_path).unwrap();

    let report = generate::generate(fixture_source(), &config, out.path(), true)
        .await
        .unwrap();
    assert_eq!(report.pages.len(), 3);

    let html = std::fs::read_to_string(
        out.path()
            .join("post/typescript-por-tras-do-superset/index.html"),
    )
    .unwrap();
    assert!(html.contains("<time></time>"));
}

#[tokio::test]
async fn check_finds_no_problems_in_fixtures() {
    let source = fixture_source();
    let report = generate::check(source.as_ref(), &SiteConfig::default())
        .await
        .unwrap();
    assert_eq!(report.posts.len(), 2);
    assert_eq!(report.problem_count(), 0);
    assert_eq!(report.posts[0].title, "Como utilizar Hooks");
}

// =========================================================================
// Server
// =========================================================================

#[tokio::test]
async fn server_generates_unlisted_post_on_demand() {
    let store = Arc::new(PageStore::new(fixture_source(), &SiteConfig::default()).unwrap());
    store.prerender().await.unwrap();

    let (status, cache, body) = fetch(&store, "/post/como-utilizar-hooks").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache.as_deref(), Some("s-maxage=1800, stale-while-revalidate"));
    assert!(body.contains("Como utilizar Hooks"));

    let (status, cache, body) = fetch(&store, "/post/typescript-por-tras-do-superset").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache.as_deref(), Some("no-store"));
    assert!(body.contains("Carregando..."));

    store.settled("typescript-por-tras-do-superset").await;
    let (status, _, body) = fetch(&store, "/post/typescript-por-tras-do-superset").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("TypeScript: por trás do superset"));
    assert!(body.contains("<span>1 min</span>"));
}

#[tokio::test]
async fn server_returns_404_for_other_document_types() {
    let store = Arc::new(PageStore::new(fixture_source(), &SiteConfig::default()).unwrap());

    fetch(&store, "/post/sobre").await;
    store.settled("sobre").await;

    let (status, _, body) = fetch(&store, "/post/sobre").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("<code>sobre</code>"));
}
