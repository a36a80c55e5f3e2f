use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use std::{env, fmt, path::PathBuf};

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_CLOUDINARY_BASE_URL: &str = "https://api.cloudinary.com/v1_1";

/// A credential loaded from the environment. `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// Which image store backs uploads.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStoreKind {
    Local,
    Cloudinary,
}

/// Remote image host settings.
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub base_url: String,
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: Secret,
    pub folder: String,
    pub max_width: u32,
    pub max_height: u32,
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub upload_dir: PathBuf,
    pub image_store: ImageStoreKind,
    pub max_upload_bytes: usize,
    pub admin_token: Option<Secret>,
    pub cloudinary: Option<CloudinaryConfig>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Stamp catalog API")]
pub struct Args {
    /// Host to bind to (overrides STAMP_CATALOG_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides STAMP_CATALOG_PORT / PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides STAMP_CATALOG_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Directory for locally stored images (overrides STAMP_CATALOG_UPLOAD_DIR)
    #[arg(long)]
    pub upload_dir: Option<PathBuf>,

    /// Image store backend (overrides STAMP_CATALOG_IMAGE_STORE)
    #[arg(long, value_enum)]
    pub image_store: Option<ImageStoreKind>,

    /// Request body limit in bytes (overrides STAMP_CATALOG_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::resolve(args, |key| env::var(key).ok())?;
        Ok((cfg, migrate))
    }

    /// Merge CLI args over values read through `lookup`, then defaults.
    pub fn resolve(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // --- Environment fallback ---
        let env_host = lookup("STAMP_CATALOG_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let env_port = match lookup("STAMP_CATALOG_PORT").or_else(|| lookup("PORT")) {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .with_context(|| format!("parsing port value `{}`", value))?,
            None => DEFAULT_PORT,
        };
        let env_db = lookup("STAMP_CATALOG_DATABASE_URL")
            .unwrap_or_else(|| "sqlite://./data/stamps.db".into());
        let env_upload_dir = lookup("STAMP_CATALOG_UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./uploads"));
        let env_store = match lookup("STAMP_CATALOG_IMAGE_STORE") {
            Some(value) => ImageStoreKind::from_str(value.trim(), true)
                .map_err(|e| anyhow!("parsing STAMP_CATALOG_IMAGE_STORE: {}", e))?,
            None => ImageStoreKind::Local,
        };
        let env_max_upload = match lookup("STAMP_CATALOG_MAX_UPLOAD_BYTES") {
            Some(value) => value
                .trim()
                .parse::<usize>()
                .with_context(|| format!("parsing STAMP_CATALOG_MAX_UPLOAD_BYTES value `{}`", value))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let image_store = args.image_store.unwrap_or(env_store);
        let cloudinary = match image_store {
            ImageStoreKind::Cloudinary => Some(cloudinary_from(&lookup)?),
            ImageStoreKind::Local => None,
        };

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            upload_dir: args.upload_dir.unwrap_or(env_upload_dir),
            image_store,
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
            admin_token: lookup("STAMP_CATALOG_ADMIN_TOKEN").map(Secret::new),
            cloudinary,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn cloudinary_from(lookup: &impl Fn(&str) -> Option<String>) -> Result<CloudinaryConfig> {
    let required = |key: &str| {
        lookup(key).with_context(|| format!("{} is required when the cloudinary image store is selected", key))
    };

    Ok(CloudinaryConfig {
        base_url: lookup("CLOUDINARY_BASE_URL")
            .unwrap_or_else(|| DEFAULT_CLOUDINARY_BASE_URL.into())
            .trim_end_matches('/')
            .to_string(),
        cloud_name: required("CLOUDINARY_CLOUD_NAME")?,
        api_key: required("CLOUDINARY_API_KEY")?,
        api_secret: Secret::new(required("CLOUDINARY_API_SECRET")?),
        folder: lookup("CLOUDINARY_FOLDER").unwrap_or_else(|| "stamps".into()),
        max_width: 500,
        max_height: 500,
    })
}
