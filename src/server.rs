//! HTTP front for [`PageStore`].
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /post/{slug}` | generated page, fallback placeholder, 404, or 500 |
//! | `GET /health` | `ok` |
//!
//! Generated pages carry `Cache-Control: s-maxage=<revalidate>,
//! stale-while-revalidate` so a CDN in front can share them; the fallback
//! placeholder and the 500 page are `no-store` so they are never cached in
//! place of the page.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header::CACHE_CONTROL},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

use crate::pages::{PageResponse, PageStore};

/// Response header telling whether a generated page was served stale.
pub const PAGE_STATE_HEADER: &str = "x-page-state";

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn router(store: Arc<PageStore>) -> Router {
    Router::new()
        .route("/post/{slug}", get(post_page))
        .route("/health", get(health))
        .fallback(not_found)
        .with_state(store)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(store: Arc<PageStore>, addr: &str) -> Result<(), ServeError> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    let sweeper = spawn_sweeper(Arc::clone(&store));
    let served = axum::serve(listener, router(store))
        .with_graceful_shutdown(shutdown_signal())
        .await;
    sweeper.abort();
    served?;
    Ok(())
}

/// Evict expired missing/failed entries once per revalidation window.
fn spawn_sweeper(store: Arc<PageStore>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(store.revalidate());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            store.evict_expired();
        }
    })
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}

async fn post_page(State(store): State<Arc<PageStore>>, Path(slug): Path<String>) -> Response {
    match store.request(&slug) {
        PageResponse::Rendered { html, stale } => {
            let mut response = Html(html.to_string()).into_response();
            let cache = format!(
                "s-maxage={}, stale-while-revalidate",
                store.revalidate().as_secs()
            );
            let headers = response.headers_mut();
            if let Ok(value) = HeaderValue::from_str(&cache) {
                headers.insert(CACHE_CONTROL, value);
            }
            headers.insert(
                PAGE_STATE_HEADER,
                HeaderValue::from_static(if stale { "stale" } else { "fresh" }),
            );
            response
        }
        PageResponse::Fallback(html) => {
            let mut response = Html(html.to_string()).into_response();
            set_no_store(&mut response);
            response.headers_mut().insert(
                PAGE_STATE_HEADER,
                HeaderValue::from_static("fallback"),
            );
            response
        }
        PageResponse::NotFound => {
            let page = store.renderer().render_not_found(Some(&slug));
            (StatusCode::NOT_FOUND, Html(page.into_string())).into_response()
        }
        PageResponse::Failed(_) => {
            let page = store.renderer().render_error(&slug);
            let mut response =
                (StatusCode::INTERNAL_SERVER_ERROR, Html(page.into_string())).into_response();
            set_no_store(&mut response);
            response
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn not_found(State(store): State<Arc<PageStore>>) -> Response {
    let page = store.renderer().render_not_found(None);
    (StatusCode::NOT_FOUND, Html(page.into_string())).into_response()
}

fn set_no_store(response: &mut Response) {
    let value = HeaderValue::from_static("no-store");
    response.headers_mut().insert(CACHE_CONTROL, value);
}
