//! Defines routes for score and edition storage.
//!
//! ## Structure
//! - `GET    /healthz`, `GET /readyz`: liveness and readiness
//! - `PUT    /{kind}/{*key}`: upload a PDF (`?filename=` optional)
//! - `GET    /{kind}/{*key}`: download the reassembled PDF
//! - `HEAD   /{kind}/{*key}`: metadata headers only
//! - `DELETE /{kind}/{*key}`: delete the object and its chunks
//!
//! `kind` is `scores` or `editions`. The wildcard `*key` allows keys with
//! slashes such as `2025/op1.pdf`.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        object_handlers::{delete_object, get_object, head_object, upload_object},
    },
    services::Stores,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, put},
};

/// Build the router, carrying `Stores` as shared state.
///
/// The body limit sits one byte above the largest accepted object so that an
/// oversize upload reaches the store's own size check.
pub fn routes(max_object_size: usize) -> Router<Stores> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(
            "/{kind}/{*key}",
            put(upload_object)
                .get(get_object)
                .head(head_object)
                .delete(delete_object),
        )
        .layer(DefaultBodyLimit::max(max_object_size + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{chunk_codec::ChunkPolicy, object_store::tests::memory_pool};
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    async fn app() -> Router {
        let policy = ChunkPolicy::new(4, 8, 5).unwrap();
        let stores = Stores::open(memory_pool().await, policy).unwrap();
        stores.migrate().await.unwrap();
        routes(stores.max_object_size()).with_state(stores)
    }

    fn upload(uri: &str, content_type: &str, body: &'static [u8]) -> Request<Body> {
        Request::put(uri)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap()
    }

    fn bare(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn upload_download_delete() {
        let app = app().await;
        let payload: &'static [u8] = b"%PDF-1.7 body!!";

        let resp = app
            .clone()
            .oneshot(upload(
                "/scores/s1?filename=sonata.pdf",
                "application/pdf",
                payload,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value =
            serde_json::from_slice(&to_bytes(resp.into_body(), usize::MAX).await.unwrap())
                .unwrap();
        assert_eq!(body["key"], "s1");
        assert_eq!(body["isChunked"], true);
        assert_eq!(body["chunkCount"], 4);
        assert_eq!(body["filename"], "sonata.pdf");

        let resp = app.clone().oneshot(bare("GET", "/scores/s1")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/pdf");
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], payload);

        let resp = app.clone().oneshot(bare("HEAD", "/scores/s1")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CONTENT_LENGTH],
            payload.len().to_string().as_str()
        );

        let resp = app.clone().oneshot(bare("GET", "/editions/s1")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = app.clone().oneshot(bare("DELETE", "/scores/s1")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let resp = app.clone().oneshot(bare("DELETE", "/scores/s1")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let resp = app.oneshot(bare("GET", "/scores/s1")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn keys_may_contain_slashes() {
        let app = app().await;
        let resp = app
            .clone()
            .oneshot(upload("/editions/2025/op1.pdf", "application/pdf", b"nested"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value =
            serde_json::from_slice(&to_bytes(resp.into_body(), usize::MAX).await.unwrap())
                .unwrap();
        assert_eq!(body["key"], "2025/op1.pdf");

        let resp = app
            .clone()
            .oneshot(bare("GET", "/editions/2025/op1.pdf"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            &to_bytes(resp.into_body(), usize::MAX).await.unwrap()[..],
            b"nested"
        );

        let resp = app
            .clone()
            .oneshot(bare("DELETE", "/editions/2025/op1.pdf"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let resp = app.oneshot(bare("GET", "/editions/2025")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn rejects_wrong_type_and_oversize() {
        let app = app().await;

        let resp = app
            .clone()
            .oneshot(upload("/editions/e1", "image/png", b"png"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let resp = app
            .clone()
            .oneshot(upload(
                "/editions/e1",
                "application/pdf",
                b"012345678901234567890",
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let resp = app
            .oneshot(upload("/editions/e1", "application/pdf; charset=binary", b"ok"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn duplicate_upload_conflicts() {
        let app = app().await;
        let first = app
            .clone()
            .oneshot(upload("/scores/d", "application/pdf", b"one"))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);
        let second = app
            .oneshot(upload("/scores/d", "application/pdf", b"two"))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unknown_kind_is_rejected() {
        let app = app().await;
        let resp = app.oneshot(bare("GET", "/buckets/x")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_endpoints() {
        let app = app().await;
        let resp = app.clone().oneshot(bare("GET", "/healthz")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let resp = app.oneshot(bare("GET", "/readyz")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
