use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use rp_core::{PlatformConfig, SyncContent};

use crate::{AppState, SERVICE_NAME};

#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    pub platform: Option<String>,
    pub content: Option<SyncContent>,
}

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    pub platform: Option<String>,
}

fn bad_request(error: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "success": false, "error": error.into() })),
    )
        .into_response()
}

pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn sync(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SyncRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    let (Some(platform), Some(content)) = (request.platform, request.content) else {
        return bad_request("Missing platform or content");
    };
    let Some(platform) = PlatformConfig::find(&platform) else {
        return bad_request(format!("Unsupported platform: {}", platform));
    };

    info!("📨 Sync request for {}: \"{}\"", platform.id, content.title);
    let runner = state.runner.clone();
    tokio::spawn(async move {
        let report = runner.run(platform.id, content).await;
        if report.success {
            info!("✅ Sync to {} finished: {}", platform.id, report.message);
        } else {
            error!("❌ Sync to {} failed: {}", platform.id, report.message);
        }
    });

    Json(json!({
        "success": true,
        "message": "浏览器已启动，请在打开的窗口中完成操作",
        "async": true,
    }))
    .into_response()
}

pub async fn extract(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> Response {
    let url = match payload {
        Ok(Json(ExtractRequest { url: Some(url) })) if !url.trim().is_empty() => url,
        Ok(_) => return bad_request("Missing url"),
        Err(rejection) => return bad_request(rejection.body_text()),
    };

    match state.extractor.extract(url.trim()).await {
        Ok(article) => Json(json!({ "success": true, "article": article })).into_response(),
        Err(e) => {
            warn!("Extraction of {} failed: {}", url, e);
            Json(json!({ "success": false, "error": e.to_string() })).into_response()
        }
    }
}

/// The fresh pending record for a composer tab, if any.
pub async fn pending(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PendingQuery>,
) -> Response {
    let current = match state.pending.get().await {
        Ok(current) => current,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": e.to_string() })),
            )
                .into_response()
        }
    };
    let pending = current.filter(|p| {
        p.is_fresh()
            && query
                .platform
                .as_deref()
                .map_or(true, |id| p.platform.eq_ignore_ascii_case(id))
    });
    Json(json!({ "success": true, "pending": pending })).into_response()
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_app;
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
        Router,
    };
    use rp_core::{Article, Error, PendingContent, Result, SyncReport};
    use rp_extract::ArticleSource;
    use rp_sync::SyncRunner;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    struct FakeRunner(mpsc::UnboundedSender<(String, SyncContent)>);

    #[async_trait]
    impl SyncRunner for FakeRunner {
        async fn run(&self, platform: &str, content: SyncContent) -> SyncReport {
            let _ = self.0.send((platform.to_string(), content));
            SyncReport {
                success: true,
                message: "done".to_string(),
                ..Default::default()
            }
        }
    }

    struct FakeExtractor;

    #[async_trait]
    impl ArticleSource for FakeExtractor {
        async fn extract(&self, url: &str) -> Result<Article> {
            if url.contains("broken") {
                return Err(Error::Extraction("page did not load".to_string()));
            }
            Ok(Article {
                title: "标题".to_string(),
                url: url.to_string(),
                ..Default::default()
            })
        }
    }

    async fn app() -> (Router, mpsc::UnboundedReceiver<(String, SyncContent)>, AppState) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = AppState::new(Arc::new(FakeRunner(tx)), Arc::new(FakeExtractor));
        let shared = AppState {
            runner: state.runner.clone(),
            extractor: state.extractor.clone(),
            pending: state.pending.clone(),
        };
        (create_app(state).await, rx, shared)
    }

    async fn send(app: Router, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _, _) = app().await;
        let (status, body) = send(app, "GET", "/health", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "repost-sync");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert!(body["timestamp"].as_str().unwrap().contains('T'));
    }

    #[tokio::test]
    async fn test_sync_spawns_run() {
        let (app, mut rx, _) = app().await;
        let (status, body) = send(
            app,
            "POST",
            "/sync",
            r#"{"platform":"xiaohongshu","content":{"title":"你好","publishMode":"longArticle"}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["async"], true);

        let (platform, content) = rx.recv().await.unwrap();
        assert_eq!(platform, "xiaohongshu");
        assert_eq!(content.title, "你好");
    }

    #[tokio::test]
    async fn test_sync_rejects_bad_requests() {
        let (app, _, _) = app().await;
        let (status, body) = send(app.clone(), "POST", "/sync", r#"{"platform":"zhihu"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Missing platform or content");

        let (status, body) = send(
            app.clone(),
            "POST",
            "/sync",
            r#"{"platform":"weibo","content":{"title":"x"}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Unsupported platform: weibo");

        let (status, body) = send(app, "POST", "/sync", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_extract() {
        let (app, _, _) = app().await;
        let (status, body) = send(
            app.clone(),
            "POST",
            "/extract",
            r#"{"url":"https://mp.weixin.qq.com/s/abc"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["article"]["title"], "标题");

        let (_, body) = send(
            app.clone(),
            "POST",
            "/extract",
            r#"{"url":"https://example.com/broken"}"#,
        )
        .await;
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("page did not load"));

        let (status, _) = send(app, "POST", "/extract", "{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_pending_filters_platform() {
        let (app, _, state) = app().await;
        state
            .pending
            .put(PendingContent::new("zhihu", SyncContent::default()))
            .await
            .unwrap();

        let (_, body) = send(app.clone(), "GET", "/pending?platform=zhihu", "").await;
        assert_eq!(body["pending"]["platform"], "zhihu");

        let (_, body) = send(app, "GET", "/pending?platform=jianshu", "").await;
        assert!(body["pending"].is_null());
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (app, _, _) = app().await;
        let (status, body) = send(app, "GET", "/nope", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not found");
    }

    #[tokio::test]
    async fn test_preflight_is_answered() {
        let (app, _, _) = app().await;
        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/sync")
                    .header("origin", "chrome-extension://abc")
                    .header("access-control-request-method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_success());
        assert!(response
            .headers()
            .contains_key("access-control-allow-origin"));
    }
}
