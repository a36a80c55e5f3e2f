#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use serde_json::Value;
use sqlx::SqlitePool;
use stamp_catalog::{
    config::Secret,
    db,
    routes::routes,
    services::{
        image_store::{ImageStore, LocalImageStore},
        stamp_service::StampService,
    },
    state::AppState,
};
use tempfile::TempDir;
use tower::ServiceExt;

pub const BOUNDARY: &str = "stamp-catalog-test-boundary";
pub const TEST_BODY_LIMIT: usize = 64 * 1024;

pub struct TestApp {
    pub app: Router,
    pub db: Arc<SqlitePool>,
    pub upload_dir: TempDir,
}

impl TestApp {
    /// App backed by an in-memory database and a temp upload directory.
    pub async fn local(admin_token: Option<&str>) -> Self {
        let upload_dir = tempfile::tempdir().expect("tempdir");
        let images = LocalImageStore::init(upload_dir.path())
            .await
            .expect("init local image store");
        Self::with_images(Arc::new(images), admin_token, upload_dir).await
    }

    pub async fn with_images(
        images: Arc<dyn ImageStore>,
        admin_token: Option<&str>,
        upload_dir: TempDir,
    ) -> Self {
        let db = Arc::new(db::connect_in_memory().await.expect("in-memory db"));
        let state = AppState {
            stamps: StampService::new(db.clone(), images),
            admin_token: admin_token.map(Secret::new),
        };
        let app = routes::app(state, upload_dir.path(), TEST_BODY_LIMIT);
        Self {
            app,
            db,
            upload_dir,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(req).await.expect("call app")
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .uri(uri)
                .body(Body::empty())
                .expect("build request"),
        )
        .await
    }

    pub async fn delete(&self, uri: &str) -> Response<Body> {
        self.send(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .body(Body::empty())
                .expect("build request"),
        )
        .await
    }

    pub async fn put_json(&self, uri: &str, body: Value) -> Response<Body> {
        self.send(
            Request::builder()
                .method("PUT")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .expect("build request"),
        )
        .await
    }

    pub async fn post_form(
        &self,
        fields: &[(&str, &str)],
        image: Option<(&str, &[u8])>,
    ) -> Response<Body> {
        self.send(
            Request::builder()
                .method("POST")
                .uri("/api/stamps/add")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(multipart_body(fields, image)))
                .expect("build request"),
        )
        .await
    }

    /// Create a stamp and return the `stamp` object from the response.
    pub async fn create(&self, fields: &[(&str, &str)]) -> Value {
        let resp = self.post_form(fields, None).await;
        assert_eq!(resp.status(), 201);
        json_body(resp).await["stamp"].clone()
    }

    pub async fn list(&self, category: Option<&str>) -> Vec<Value> {
        let uri = match category {
            Some(c) => format!("/api/stamps?category={}", c),
            None => "/api/stamps".to_string(),
        };
        let resp = self.get(&uri).await;
        assert_eq!(resp.status(), 200);
        json_body(resp)
            .await
            .as_array()
            .expect("array body")
            .clone()
    }
}

/// Hand-rolled `multipart/form-data` body using [`BOUNDARY`].
pub fn multipart_body(fields: &[(&str, &str)], image: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
        );
        body.extend_from_slice(value.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    if let Some((file_name, bytes)) = image {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\n",
                file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub async fn body_bytes(resp: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body")
        .to_vec()
}

pub async fn json_body(resp: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).expect("json body")
}
