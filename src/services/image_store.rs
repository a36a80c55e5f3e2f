//! src/services/image_store.rs
//!
//! Image stores persist an uploaded image and hand back a reference the
//! catalog records on the stamp: a `/uploads/...` path for the local disk
//! store, or an absolute URL for the remote image host.

use crate::{
    config::{AppConfig, CloudinaryConfig, ImageStoreKind},
    errors::{CatalogError, CatalogResult},
};
use anyhow::Context as _;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use serde::Deserialize;
use sha1::{Digest, Sha1};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::{
    fs::{self, OpenOptions},
    io::AsyncWriteExt,
};
use tracing::{debug, info};
use uuid::Uuid;

/// URL prefix under which the local store's files are served.
pub const UPLOADS_PREFIX: &str = "/uploads";

const FALLBACK_FILE_NAME: &str = "image";
const MAX_NAME_ATTEMPTS: usize = 5;
/// Longest file name most filesystems accept, in bytes.
const MAX_FILE_NAME_BYTES: usize = 255;
/// `-` plus the 8 hex characters added on a name collision.
const COLLISION_SUFFIX_BYTES: usize = 9;
const REMOTE_UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait ImageStore: Send + Sync + 'static {
    fn backend_tag(&self) -> &'static str;

    /// Persist `bytes` and return the reference to record on the stamp.
    async fn put(&self, bytes: Bytes, original_name: &str) -> CatalogResult<String>;

    /// Best-effort probe used by `/readyz`.
    async fn readiness(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Build the image store selected by configuration.
///
/// The local upload directory is created here, once, before the server
/// accepts requests.
pub async fn from_config(cfg: &AppConfig) -> anyhow::Result<Arc<dyn ImageStore>> {
    match cfg.image_store {
        ImageStoreKind::Local => {
            let store = LocalImageStore::init(&cfg.upload_dir)
                .await
                .with_context(|| format!("creating upload directory {}", cfg.upload_dir.display()))?;
            Ok(Arc::new(store))
        }
        ImageStoreKind::Cloudinary => {
            let remote = cfg
                .cloudinary
                .clone()
                .context("cloudinary image store selected without cloudinary settings")?;
            Ok(Arc::new(CloudinaryImageStore::new(remote)?))
        }
    }
}

/// Stores images as files under a single directory.
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    root: PathBuf,
}

impl LocalImageStore {
    /// Use `root` as the upload directory, creating it if it does not exist.
    pub async fn init(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        if fs::metadata(&root).await.is_err() {
            fs::create_dir_all(&root).await?;
            info!("Created upload directory at {}", root.display());
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh file for `name`, adding a random suffix if a file of
    /// that name already exists.
    async fn create_unique(&self, name: &str) -> CatalogResult<(String, PathBuf, fs::File)> {
        let mut candidate = name.to_string();
        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = self.root.join(&candidate);
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((candidate, path, file)),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    debug!("upload name {} taken, retrying with suffix", candidate);
                    candidate = with_suffix(name, &Uuid::new_v4().simple().to_string()[..8]);
                }
                Err(err) => return Err(CatalogError::Io(err)),
            }
        }
        Err(CatalogError::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("could not find a free upload name for {}", name),
        )))
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    fn backend_tag(&self) -> &'static str {
        "local"
    }

    async fn put(&self, bytes: Bytes, original_name: &str) -> CatalogResult<String> {
        let name = stored_file_name(original_name, Utc::now().timestamp_millis());
        let (name, path, mut file) = self.create_unique(&name).await?;

        let written = async {
            file.write_all(&bytes).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        if let Err(err) = written {
            let _ = fs::remove_file(&path).await;
            return Err(CatalogError::Io(err));
        }

        debug!("stored {} bytes at {}", bytes.len(), path.display());
        Ok(format!("{}/{}", UPLOADS_PREFIX, name))
    }

    async fn readiness(&self) -> Result<(), String> {
        let probe = self.root.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&probe, b"readyz")
            .await
            .map_err(|e| format!("could not write probe file: {}", e))?;
        let read = fs::read(&probe).await;
        let _ = fs::remove_file(&probe).await;
        match read {
            Ok(bytes) if bytes == b"readyz" => Ok(()),
            Ok(_) => Err("probe file content mismatch".to_string()),
            Err(e) => Err(format!("could not read probe file: {}", e)),
        }
    }
}

/// Uploads images to a Cloudinary-compatible host, resized to fit within
/// the configured bounds.
pub struct CloudinaryImageStore {
    client: reqwest::Client,
    cfg: CloudinaryConfig,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
}

impl CloudinaryImageStore {
    pub fn new(cfg: CloudinaryConfig) -> CatalogResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REMOTE_UPLOAD_TIMEOUT)
            .build()
            .map_err(|e| CatalogError::Upload(format!("building HTTP client: {}", e)))?;
        Ok(Self { client, cfg })
    }

    fn upload_url(&self) -> String {
        format!("{}/{}/image/upload", self.cfg.base_url, self.cfg.cloud_name)
    }

    fn transformation(&self) -> String {
        format!("c_limit,h_{},w_{}", self.cfg.max_height, self.cfg.max_width)
    }
}

#[async_trait]
impl ImageStore for CloudinaryImageStore {
    fn backend_tag(&self) -> &'static str {
        "cloudinary"
    }

    async fn put(&self, bytes: Bytes, original_name: &str) -> CatalogResult<String> {
        let timestamp = Utc::now().timestamp().to_string();
        let transformation = self.transformation();
        let signature = sign(
            &[
                ("folder", self.cfg.folder.as_str()),
                ("timestamp", timestamp.as_str()),
                ("transformation", transformation.as_str()),
            ],
            self.cfg.api_secret.expose(),
        );

        let file = reqwest::multipart::Part::bytes(bytes.to_vec())
            .file_name(sanitize_file_name(original_name));
        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("api_key", self.cfg.api_key.clone())
            .text("timestamp", timestamp)
            .text("folder", self.cfg.folder.clone())
            .text("transformation", transformation)
            .text("signature", signature);

        let url = self.upload_url();
        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| CatalogError::Upload(format!("request to {} failed: {}", url, e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CatalogError::Upload(format!(
                "image host returned status {}",
                status
            )));
        }

        let body: UploadResponse = resp
            .json()
            .await
            .map_err(|e| CatalogError::Upload(format!("unreadable image host response: {}", e)))?;
        match body.secure_url {
            Some(url) if !url.is_empty() => Ok(url),
            _ => Err(CatalogError::Upload(
                "image host response missing secure_url".to_string(),
            )),
        }
    }
}

/// Reduce a client-supplied file name to a safe single path component.
///
/// Directory parts are dropped, whitespace runs become `-`, control
/// characters are removed and anything outside `[A-Za-z0-9._-]` becomes `_`.
/// Names longer than the filesystem limit are shortened, keeping the
/// extension.
pub fn sanitize_file_name(original: &str) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();

    let mut out = String::with_capacity(base.len());
    let mut in_whitespace = false;
    for c in base.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push('-');
                in_whitespace = true;
            }
            continue;
        }
        in_whitespace = false;
        if c.is_control() {
            continue;
        }
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            out.push(c);
        } else {
            out.push('_');
        }
    }

    if out.chars().all(|c| c == '.') {
        FALLBACK_FILE_NAME.to_string()
    } else {
        truncate_keeping_extension(&out, MAX_FILE_NAME_BYTES)
    }
}

/// `<millis>-<sanitized name>`, short enough that a collision suffix still
/// fits within the filesystem limit.
pub fn stored_file_name(original: &str, millis: i64) -> String {
    let prefix = format!("{}-", millis);
    let budget = MAX_FILE_NAME_BYTES.saturating_sub(prefix.len() + COLLISION_SUFFIX_BYTES);
    format!(
        "{}{}",
        prefix,
        truncate_keeping_extension(&sanitize_file_name(original), budget)
    )
}

/// Cut `name` to at most `max` bytes, shortening the stem first so the
/// extension survives.
fn truncate_keeping_extension(name: &str, max: usize) -> String {
    if name.len() <= max {
        return name.to_string();
    }
    if let Some((stem, ext)) = name.rsplit_once('.') {
        if !stem.is_empty() && ext.len() + 1 < max {
            let stem = floor_char_boundary(stem, max - ext.len() - 1);
            return format!("{}.{}", stem, ext);
        }
    }
    floor_char_boundary(name, max).to_string()
}

fn floor_char_boundary(s: &str, max: usize) -> &str {
    let mut end = max.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn with_suffix(name: &str, suffix: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}-{}.{}", stem, suffix, ext),
        _ => format!("{}-{}", name, suffix),
    }
}

/// Parameters sorted by key, joined as `k=v&k=v`, with the secret appended.
fn string_to_sign(params: &[(&str, &str)], secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}{}", joined, secret)
}

pub fn sign(params: &[(&str, &str)], secret: &str) -> String {
    hex::encode(Sha1::digest(string_to_sign(params, secret).as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_whitespace_runs_with_hyphen() {
        assert_eq!(sanitize_file_name("Penny Black.png"), "Penny-Black.png");
        assert_eq!(sanitize_file_name("a  b\tc.jpg"), "a-b-c.jpg");
    }

    #[test]
    fn sanitize_drops_directories_and_odd_characters() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\photos\\my stamp.jpg"), "my-stamp.jpg");
        assert_eq!(sanitize_file_name("what?#.png"), "what__.png");
        assert_eq!(sanitize_file_name("bad\u{0007}name.gif"), "badname.gif");
    }

    #[test]
    fn sanitize_falls_back_for_empty_or_dot_names() {
        assert_eq!(sanitize_file_name(""), "image");
        assert_eq!(sanitize_file_name(".."), "image");
        assert_eq!(sanitize_file_name("uploads/"), "image");
    }

    #[test]
    fn stored_name_is_timestamp_prefixed() {
        assert_eq!(
            stored_file_name("Penny Black.png", 1_700_000_000_000),
            "1700000000000-Penny-Black.png"
        );
    }

    #[test]
    fn sanitize_truncates_long_names() {
        let long = format!("{}.png", "a".repeat(300));
        let name = sanitize_file_name(&long);
        assert_eq!(name.len(), MAX_FILE_NAME_BYTES);
        assert!(name.ends_with("a.png"));

        let short = "penny.png";
        assert_eq!(sanitize_file_name(short), short);
    }

    #[test]
    fn truncation_keeps_extension_and_char_boundaries() {
        assert_eq!(truncate_keeping_extension("abcdef.png", 8), "abcd.png");
        assert_eq!(truncate_keeping_extension("abcdefgh", 5), "abcde");
        assert_eq!(truncate_keeping_extension("a.verylongextension", 6), "a.very");
        assert_eq!(truncate_keeping_extension("ééé", 3), "é");
    }

    #[test]
    fn stored_name_leaves_room_for_collision_suffix() {
        let long = format!("{}.png", "a".repeat(250));
        let stored = stored_file_name(&long, 1_700_000_000_000);
        assert!(stored.starts_with("1700000000000-aaa"));
        assert!(stored.ends_with(".png"));
        assert_eq!(stored.len(), MAX_FILE_NAME_BYTES - COLLISION_SUFFIX_BYTES);
        assert!(with_suffix(&stored, "abcd1234").len() <= MAX_FILE_NAME_BYTES);
    }

    #[tokio::test]
    async fn local_store_accepts_names_near_the_filesystem_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::init(dir.path()).await.unwrap();
        let long = format!("{}.png", "b".repeat(254));

        let first = store.put(Bytes::from_static(b"one"), &long).await.unwrap();
        let second = store.put(Bytes::from_static(b"two"), &long).await.unwrap();
        assert_ne!(first, second);
        assert!(first.ends_with(".png"));
        assert!(second.ends_with(".png"));
    }

    #[test]
    fn suffix_goes_before_extension() {
        assert_eq!(with_suffix("1-a.png", "abcd1234"), "1-a-abcd1234.png");
        assert_eq!(with_suffix("noext", "abcd1234"), "noext-abcd1234");
    }

    #[test]
    fn signature_sorts_parameters_and_appends_secret() {
        let payload = string_to_sign(
            &[("timestamp", "1315060510"), ("folder", "stamps")],
            "s3cr3t",
        );
        assert_eq!(payload, "folder=stamps&timestamp=1315060510s3cr3t");
        assert_eq!(
            sign(&[], "abc"),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[tokio::test]
    async fn local_store_writes_file_and_returns_upload_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::init(dir.path().join("uploads")).await.unwrap();

        let reference = store
            .put(Bytes::from_static(b"\x89PNG fake"), "Penny Black.png")
            .await
            .unwrap();

        assert!(reference.starts_with("/uploads/"));
        assert!(reference.ends_with("-Penny-Black.png"));
        let name = reference.trim_start_matches("/uploads/");
        let stored = std::fs::read(store.root().join(name)).unwrap();
        assert_eq!(stored, b"\x89PNG fake");
    }

    #[tokio::test]
    async fn local_store_never_overwrites_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::init(dir.path()).await.unwrap();

        let first = store.put(Bytes::from_static(b"one"), "same.png").await.unwrap();
        let second = store.put(Bytes::from_static(b"two"), "same.png").await.unwrap();
        assert_ne!(first, second);

        let read = |r: &str| std::fs::read(dir.path().join(r.trim_start_matches("/uploads/"))).unwrap();
        assert_eq!(read(&first), b"one");
        assert_eq!(read(&second), b"two");
    }

    #[tokio::test]
    async fn local_store_readiness_leaves_no_probe_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::init(dir.path()).await.unwrap();
        store.readiness().await.unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
