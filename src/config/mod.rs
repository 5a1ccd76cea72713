//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

mod cli;

pub use cli::ConfigArgs;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "catalog";
const ENV_PREFIX: &str = "CATALOG";
const DEFAULT_BASE_URL: &str = "https://api.bitechx.com";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CACHE_MAX_ENTRIES: u64 = 256;
const DEFAULT_PAGE_SIZE: u32 = 20;
const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 400;
const DEFAULT_CATEGORY_LIMIT: u32 = 100;
const DEFAULT_CREDENTIALS_FILE: &str = "credentials.json";
const CREDENTIALS_DIR: &str = ".config/catalog-sync";

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api: ApiSettings,
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub listing: ListingSettings,
    pub credentials: CredentialSettings,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: Url,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub max_entries: NonZeroUsize,
    pub stale_after: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct ListingSettings {
    pub page_size: NonZeroU32,
    pub search_debounce: Duration,
    pub category_limit: NonZeroU32,
    /// Known page count; `None` infers it from page fill.
    pub total_pages: Option<NonZeroU32>,
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self {
            page_size: NonZeroU32::new(DEFAULT_PAGE_SIZE).unwrap_or(NonZeroU32::MIN),
            search_debounce: Duration::from_millis(DEFAULT_SEARCH_DEBOUNCE_MS),
            category_limit: NonZeroU32::new(DEFAULT_CATEGORY_LIMIT).unwrap_or(NonZeroU32::MIN),
            total_pages: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CredentialSettings {
    pub path: PathBuf,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(args: &ConfigArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = args.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(args);

    Settings::from_raw(raw)
}

impl Settings {
    /// Settings with every value at its default.
    pub fn defaults() -> Result<Self, LoadError> {
        Self::from_raw(RawSettings::default())
    }

    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            api,
            logging,
            cache,
            listing,
            credentials,
        } = raw;

        Ok(Self {
            api: build_api_settings(api)?,
            logging: build_logging_settings(logging)?,
            cache: build_cache_settings(cache)?,
            listing: build_listing_settings(listing)?,
            credentials: build_credential_settings(credentials)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    api: RawApiSettings,
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    listing: RawListingSettings,
    credentials: RawCredentialSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, args: &ConfigArgs) {
        if let Some(url) = args.api_base_url.as_ref() {
            self.api.base_url = Some(url.clone());
        }
        if let Some(seconds) = args.api_timeout_seconds {
            self.api.timeout_seconds = Some(seconds);
        }
        if let Some(level) = args.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = args.log_json {
            self.logging.json = Some(json);
        }
        if let Some(path) = args.credentials_path.as_ref() {
            self.credentials.path = Some(path.clone());
        }
        if let Some(size) = args.page_size {
            self.listing.page_size = Some(size);
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawApiSettings {
    base_url: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    max_entries: Option<u64>,
    stale_after_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawListingSettings {
    page_size: Option<u32>,
    search_debounce_ms: Option<u64>,
    category_limit: Option<u32>,
    total_pages: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCredentialSettings {
    path: Option<PathBuf>,
}

fn build_api_settings(api: RawApiSettings) -> Result<ApiSettings, LoadError> {
    let raw_url = api
        .base_url
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let base_url = Url::parse(&raw_url)
        .map_err(|err| LoadError::invalid("api.base_url", format!("`{raw_url}`: {err}")))?;
    if !matches!(base_url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "api.base_url",
            "scheme must be http or https",
        ));
    }

    let timeout_secs = api.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "api.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ApiSettings {
        base_url,
        timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::WARN,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let max_entries_value = cache.max_entries.unwrap_or(DEFAULT_CACHE_MAX_ENTRIES);
    let max_entries = usize::try_from(max_entries_value)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| {
            LoadError::invalid(
                "cache.max_entries",
                "must be greater than zero and fit in usize",
            )
        })?;

    let stale_after = match cache.stale_after_seconds {
        Some(0) => {
            return Err(LoadError::invalid(
                "cache.stale_after_seconds",
                "must be greater than zero when set",
            ));
        }
        Some(seconds) => Some(Duration::from_secs(seconds)),
        None => None,
    };

    Ok(CacheSettings {
        max_entries,
        stale_after,
    })
}

fn build_listing_settings(listing: RawListingSettings) -> Result<ListingSettings, LoadError> {
    let page_size = non_zero_u32(
        listing.page_size.unwrap_or(DEFAULT_PAGE_SIZE).into(),
        "listing.page_size",
    )?;
    let category_limit = non_zero_u32(
        listing.category_limit.unwrap_or(DEFAULT_CATEGORY_LIMIT).into(),
        "listing.category_limit",
    )?;
    let total_pages = listing
        .total_pages
        .map(|pages| non_zero_u32(pages.into(), "listing.total_pages"))
        .transpose()?;
    let debounce_ms = listing
        .search_debounce_ms
        .unwrap_or(DEFAULT_SEARCH_DEBOUNCE_MS);

    Ok(ListingSettings {
        page_size,
        search_debounce: Duration::from_millis(debounce_ms),
        category_limit,
        total_pages,
    })
}

fn build_credential_settings(
    credentials: RawCredentialSettings,
) -> Result<CredentialSettings, LoadError> {
    let path = credentials.path.unwrap_or_else(default_credentials_path);
    if path.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "credentials.path",
            "path must not be empty",
        ));
    }
    Ok(CredentialSettings { path })
}

fn default_credentials_path() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home)
            .join(CREDENTIALS_DIR)
            .join(DEFAULT_CREDENTIALS_FILE),
        None => PathBuf::from(DEFAULT_CREDENTIALS_FILE),
    }
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
