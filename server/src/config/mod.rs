use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::apply_security_headers;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/events";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3001;
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_CLOUDINARY_FOLDER: &str = "events";
const DEFAULT_CLOUDINARY_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:5173,http://localhost:3000";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStoreKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub folder: String,
    /// Upper bound on each upload or destroy call, connect through body.
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageStorageConfig {
    Local { dir: PathBuf },
    Cloudinary(CloudinaryConfig),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub event_store: EventStoreKind,
    pub db_max_connections: u32,
    pub host: IpAddr,
    pub port: u16,
    /// Overrides the base URL derived from request headers when set.
    pub public_base_url: Option<String>,
    pub image_storage: ImageStorageConfig,
    pub max_upload_bytes: usize,
    pub cors_allowed_origins: Vec<String>,
    pub production: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let event_store = match get("EVENT_STORE").as_deref() {
            None | Some("postgres") => EventStoreKind::Postgres,
            Some("memory") => EventStoreKind::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "EVENT_STORE",
                    value: other.to_string(),
                })
            }
        };

        let image_storage = match get("IMAGE_STORAGE").as_deref() {
            None | Some("local") => ImageStorageConfig::Local {
                dir: PathBuf::from(
                    get("UPLOAD_DIR").unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string()),
                ),
            },
            Some("cloudinary") => ImageStorageConfig::Cloudinary(CloudinaryConfig {
                cloud_name: get("CLOUDINARY_CLOUD_NAME")
                    .ok_or(ConfigError::Missing("CLOUDINARY_CLOUD_NAME"))?,
                api_key: get("CLOUDINARY_API_KEY").ok_or(ConfigError::Missing("CLOUDINARY_API_KEY"))?,
                api_secret: get("CLOUDINARY_API_SECRET")
                    .ok_or(ConfigError::Missing("CLOUDINARY_API_SECRET"))?,
                folder: get("CLOUDINARY_FOLDER")
                    .unwrap_or_else(|| DEFAULT_CLOUDINARY_FOLDER.to_string()),
                timeout: Duration::from_secs(parse_or(
                    "CLOUDINARY_TIMEOUT_SECS",
                    get("CLOUDINARY_TIMEOUT_SECS"),
                    Some(DEFAULT_CLOUDINARY_TIMEOUT_SECS),
                )?),
            }),
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "IMAGE_STORAGE",
                    value: other.to_string(),
                })
            }
        };

        let host: IpAddr = parse_or("HOST", get("HOST"), DEFAULT_HOST.parse().ok())?;
        let port = parse_or("PORT", get("PORT"), Some(DEFAULT_PORT))?;
        let max_upload_bytes =
            parse_or("MAX_UPLOAD_BYTES", get("MAX_UPLOAD_BYTES"), Some(DEFAULT_MAX_UPLOAD_BYTES))?;
        let db_max_connections = parse_or(
            "DB_MAX_CONNECTIONS",
            get("DB_MAX_CONNECTIONS"),
            Some(DEFAULT_DB_MAX_CONNECTIONS),
        )?;

        let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string())
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            event_store,
            db_max_connections,
            host,
            port,
            public_base_url: get("PUBLIC_BASE_URL").map(|url| url.trim_end_matches('/').to_string()),
            image_storage,
            max_upload_bytes,
            cors_allowed_origins,
            production: get("RUST_ENV")
                .map(|v| v.eq_ignore_ascii_case("production"))
                .unwrap_or(false),
        })
    }

    /// Directory to serve under `/uploads`, only when images live on local disk.
    pub fn local_upload_dir(&self) -> Option<&PathBuf> {
        match &self.image_storage {
            ImageStorageConfig::Local { dir } => Some(dir),
            ImageStorageConfig::Cloudinary(_) => None,
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: Option<T>,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => default.ok_or(ConfigError::Missing(key)),
    }
}
