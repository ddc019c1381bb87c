pub mod core;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::warn;

use crate::core::activity::render_projects_fragment;
use crate::core::config::{FeedConfig, SiteConfig};
use crate::core::feed::fetcher::{fetch_with_retry, FetchError, FetchOutcome, Validators};
use crate::core::feed::parser::{parse_feed_bytes, FeedParseError};
use crate::core::layout::{self, Pointer, Viewport};
use crate::core::render::{render_feed, RenderError};
use crate::core::scrobble::{fetch_now_playing, now_playing_fragment};
use crate::core::AppServices;

#[derive(Debug, Clone)]
struct CachedFragment {
    html: String,
    validators: Validators,
}

pub struct AppState {
    services: AppServices,
    config: SiteConfig,
    client: reqwest::Client,
    cache: RwLock<HashMap<String, CachedFragment>>,
}

pub fn build_state(config: SiteConfig) -> Result<AppState, reqwest::Error> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.server.request_timeout_secs))
        .build()?;
    Ok(AppState {
        services: AppServices::default(),
        config,
        client,
        cache: RwLock::new(HashMap::new()),
    })
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/fragments", get(all_fragments))
        .route("/fragments/feeds/{name}", get(feed_fragment))
        .route("/fragments/nowplaying", get(nowplaying_fragment))
        .route("/fragments/projects", get(projects_fragment))
        .route("/layout/parallax", get(parallax_offsets))
        .with_state(state)
}

#[derive(Debug, thiserror::Error)]
enum FragmentError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] FeedParseError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("upstream unchanged but no cached fragment is available")]
    NotModifiedWithoutCache,
}

/// Refresh one feed fragment: revalidate against the upstream with the cached
/// validators, re-render on new content, and fall back to the cached HTML when
/// the upstream reports no change.
async fn refresh_feed_fragment(
    state: &AppState,
    feed: &FeedConfig,
) -> Result<String, FragmentError> {
    let validators = {
        let cache = state.cache.read().await;
        cache
            .get(&feed.name)
            .map(|cached| cached.validators.clone())
            .unwrap_or_default()
    };

    match fetch_with_retry(
        &state.client,
        &feed.fetch_url(),
        &validators,
        feed.max_retries,
    )
    .await?
    {
        FetchOutcome::Updated(payload) => {
            let parsed = parse_feed_bytes(&payload.body)?;
            let html = render_feed(feed, &parsed)?;
            let mut cache = state.cache.write().await;
            cache.insert(
                feed.name.clone(),
                CachedFragment {
                    html: html.clone(),
                    validators: payload.validators,
                },
            );
            Ok(html)
        }
        FetchOutcome::NotModified => {
            let cache = state.cache.read().await;
            cache
                .get(&feed.name)
                .map(|cached| cached.html.clone())
                .ok_or(FragmentError::NotModifiedWithoutCache)
        }
    }
}

/// A stale fragment beats an empty panel, so refresh failures serve whatever
/// was rendered last.
async fn feed_fragment_html(state: &AppState, feed: &FeedConfig) -> Result<String, FragmentError> {
    match refresh_feed_fragment(state, feed).await {
        Ok(html) => Ok(html),
        Err(error) => {
            let cache = state.cache.read().await;
            match cache.get(&feed.name) {
                Some(cached) => {
                    warn!(feed = %feed.name, %error, "serving cached fragment after refresh failure");
                    Ok(cached.html.clone())
                }
                None => Err(error),
            }
        }
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, String>> {
    Json(state.services.health_report())
}

async fn feed_fragment(State(state): State<Arc<AppState>>, Path(name): Path<String>) -> Response {
    let Some(feed) = state.config.feeds.iter().find(|feed| feed.name == name) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match feed_fragment_html(&state, feed).await {
        Ok(html) => html_response(html),
        Err(error) => {
            warn!(feed = %name, %error, "feed fragment unavailable");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

/// Render every configured feed concurrently. A feed that cannot be refreshed
/// and has no cached fragment comes back as an empty string so the page can
/// still assemble the rest of its panels.
async fn all_fragments(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, String>> {
    let mut join_set = JoinSet::new();
    for feed in state.config.feeds.clone() {
        let state = Arc::clone(&state);
        join_set.spawn(async move {
            let html = match feed_fragment_html(&state, &feed).await {
                Ok(html) => html,
                Err(error) => {
                    warn!(feed = %feed.name, %error, "feed fragment unavailable");
                    String::new()
                }
            };
            (feed.name, html)
        });
    }

    let mut fragments = BTreeMap::new();
    while let Some(joined) = join_set.join_next().await {
        if let Ok((name, html)) = joined {
            fragments.insert(name, html);
        }
    }
    Json(fragments)
}

async fn nowplaying_fragment(State(state): State<Arc<AppState>>) -> Response {
    let Some(scrobble) = state.config.scrobble.as_ref() else {
        return StatusCode::NO_CONTENT.into_response();
    };
    match fetch_now_playing(&state.client, scrobble).await {
        Ok(Some(track)) => html_response(now_playing_fragment(&track)),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => {
            warn!(%error, "now playing lookup failed");
            StatusCode::NO_CONTENT.into_response()
        }
    }
}

async fn projects_fragment(State(state): State<Arc<AppState>>) -> Response {
    let fragment = render_projects_fragment(
        &state.client,
        &state.config.activity,
        &state.config.projects,
    )
    .await;
    html_response(fragment)
}

#[derive(Debug, Deserialize)]
struct ParallaxQuery {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

async fn parallax_offsets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ParallaxQuery>,
) -> Response {
    if query.width <= 0.0 || query.height <= 0.0 {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let offsets = layout::offsets(
        &state.config.layout,
        Viewport {
            width: query.width,
            height: query.height,
        },
        Pointer {
            x: query.x,
            y: query.y,
        },
    );
    Json(offsets).into_response()
}

fn html_response(html: String) -> Response {
    (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use reqwest::header::{ETAG, IF_NONE_MATCH};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const FEED_ETAG: &str = "\"fragments-test-v1\"";

    async fn spawn_feed_stub(fail_always: bool) -> (String, Arc<AtomicUsize>) {
        let request_count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&request_count);
        let handler = move |headers: HeaderMap| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if fail_always {
                    let mut response = Response::new(axum::body::Body::from("broken"));
                    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                    return response;
                }
                if headers
                    .get(IF_NONE_MATCH)
                    .and_then(|value| value.to_str().ok())
                    == Some(FEED_ETAG)
                {
                    let mut response = Response::new(axum::body::Body::empty());
                    *response.status_mut() = StatusCode::NOT_MODIFIED;
                    return response;
                }
                let mut response = Response::new(axum::body::Body::from(include_str!(
                    "../fixtures/sample.rss.xml"
                )));
                response
                    .headers_mut()
                    .insert(ETAG, FEED_ETAG.parse().expect("header must parse"));
                response
            }
        };
        let app = Router::new().route("/feed.xml", get(handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let address = listener.local_addr().expect("local addr should exist");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("server should run");
        });
        (format!("http://{address}/feed.xml"), request_count)
    }

    async fn spawn_app(config: SiteConfig) -> String {
        let state = Arc::new(build_state(config).expect("state should build"));
        let app = build_router(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let address = listener.local_addr().expect("local addr should exist");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("server should run");
        });
        format!("http://{address}")
    }

    fn feed_config(name: &str, url: &str) -> FeedConfig {
        FeedConfig {
            name: name.to_string(),
            url: url.to_string(),
            limit: 2,
            force_https: false,
            date_format: "%d.%m.%y".to_string(),
            layout_template: "<span>{entries}</span>".to_string(),
            entry_template: "{date}<a href=\"{url}\"> {title}</a>".to_string(),
            category_base_url: None,
            max_retries: 0,
        }
    }

    fn site_config(feeds: Vec<FeedConfig>) -> SiteConfig {
        SiteConfig {
            server: Default::default(),
            feeds,
            scrobble: None,
            layout: Default::default(),
            activity: Default::default(),
            projects: Vec::new(),
        }
    }

    #[tokio::test]
    async fn health_reports_every_service() {
        let base_url = spawn_app(site_config(Vec::new())).await;
        let report: BTreeMap<String, String> = reqwest::get(format!("{base_url}/health"))
            .await
            .expect("request should succeed")
            .json()
            .await
            .expect("body should be json");
        assert_eq!(report.get("feed").map(String::as_str), Some("ready"));
        assert_eq!(report.len(), 6);
    }

    #[tokio::test]
    async fn unknown_feed_is_not_found() {
        let base_url = spawn_app(site_config(Vec::new())).await;
        let response = reqwest::get(format!("{base_url}/fragments/feeds/nope"))
            .await
            .expect("request should succeed");
        assert_eq!(response.status().as_u16(), 404);
    }

    #[tokio::test]
    async fn feed_fragment_renders_and_serves_cache_on_revalidation() {
        let (feed_url, request_count) = spawn_feed_stub(false).await;
        let base_url = spawn_app(site_config(vec![feed_config("blog", &feed_url)])).await;
        let fragment_url = format!("{base_url}/fragments/feeds/blog");

        let first = reqwest::get(&fragment_url)
            .await
            .expect("request should succeed");
        assert_eq!(first.status().as_u16(), 200);
        assert_eq!(
            first
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some("text/html; charset=utf-8")
        );
        let first_body = first.text().await.expect("body should read");
        assert!(first_body.starts_with("<span>"));
        assert!(first_body.contains("Assembling a reproducible pipeline"));
        assert!(first_body.contains("01.08.26"));
        // limit 2 cuts the third item
        assert!(!first_body.contains("Release notes roundup"));

        let second_body = reqwest::get(&fragment_url)
            .await
            .expect("request should succeed")
            .text()
            .await
            .expect("body should read");
        assert_eq!(first_body, second_body);
        assert_eq!(request_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failing_feed_without_cache_is_bad_gateway() {
        let (feed_url, _) = spawn_feed_stub(true).await;
        let base_url = spawn_app(site_config(vec![feed_config("blog", &feed_url)])).await;
        let response = reqwest::get(format!("{base_url}/fragments/feeds/blog"))
            .await
            .expect("request should succeed");
        assert_eq!(response.status().as_u16(), 502);
    }

    #[tokio::test]
    async fn all_fragments_degrade_per_feed() {
        let (good_url, _) = spawn_feed_stub(false).await;
        let (bad_url, _) = spawn_feed_stub(true).await;
        let base_url = spawn_app(site_config(vec![
            feed_config("blog", &good_url),
            feed_config("commits", &bad_url),
        ]))
        .await;

        let fragments: BTreeMap<String, String> = reqwest::get(format!("{base_url}/fragments"))
            .await
            .expect("request should succeed")
            .json()
            .await
            .expect("body should be json");
        assert_eq!(fragments.len(), 2);
        assert!(fragments["blog"].contains("Assembling a reproducible pipeline"));
        assert_eq!(fragments["commits"], "");
    }

    #[tokio::test]
    async fn missing_scrobble_config_is_no_content() {
        let base_url = spawn_app(site_config(Vec::new())).await;
        let response = reqwest::get(format!("{base_url}/fragments/nowplaying"))
            .await
            .expect("request should succeed");
        assert_eq!(response.status().as_u16(), 204);
    }

    #[tokio::test]
    async fn parallax_endpoint_computes_offsets() {
        let base_url = spawn_app(site_config(Vec::new())).await;
        let body: serde_json::Value = reqwest::get(format!(
            "{base_url}/layout/parallax?x=400&y=300&width=800&height=600"
        ))
        .await
        .expect("request should succeed")
        .json()
        .await
        .expect("body should be json");
        assert_eq!(body["left_percent"], 50);
        assert_eq!(body["padding_left"], 16.67);
        assert_eq!(body["margin_top"], 6.25);
    }

    #[tokio::test]
    async fn parallax_rejects_degenerate_viewports() {
        let base_url = spawn_app(site_config(Vec::new())).await;
        let response = reqwest::get(format!(
            "{base_url}/layout/parallax?x=10&y=10&width=0&height=600"
        ))
        .await
        .expect("request should succeed");
        assert_eq!(response.status().as_u16(), 400);
    }
}
