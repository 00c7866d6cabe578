//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. If `SALESFORCE_AUTH_URL` is set, the whole configuration comes from the
//!    environment
//! 2. Otherwise a config file is loaded, probing multiple paths
//! 3. Supports JSON and TOML formats
//! 4. The result is validated either way
//!
//! ## Environment Variables
//! - `SALESFORCE_AUTH_URL`, `SALESFORCE_CLIENT_ID`,
//!   `SALESFORCE_CLIENT_SECRET`: client credentials (required)
//! - `SYNC_INTERVAL_SECONDS`: time between runs (default 86400)
//! - `SYNC_RUN_ON_START`: run immediately on start (true/false)
//! - `SYNC_RUN_TIMEOUT_SECONDS`: upper bound for one run (default 1800)
//! - `FETCH_PAGE_SIZE`: page size of the asset query (default 50)
//! - `FETCH_MAX_CONCURRENT_PAGES`: cap on concurrent page requests
//! - `FETCH_MAX_FAILED_PAGE_RATIO`: fail runs above this failed-page ratio
//! - `HTTP_TIMEOUT_SECONDS`: per-request timeout (default 10)
//! - `CACHE_REFRESH_MARGIN_SECONDS`: token refresh margin (default 120)
//! - `STORAGE_BACKEND`: `local` (default) or `s3`
//! - `LOCAL_STORAGE_DIR`: output directory for the local sink
//! - `S3_BUCKET`, `S3_PATH_PREFIX`, `S3_REGION`, `S3_CUSTOM_ENDPOINT`,
//!   `S3_USE_PATH_STYLE`: S3 sink settings
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.{json,toml}` or `./contentsync.{json,toml}`
//! 2. `../config.{json,toml}` and `../../config.{json,toml}`
//! 3. The same names relative to the executable location

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use contentsync_domain::constants::{
    DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_LOCAL_STORAGE_DIR, DEFAULT_PAGE_SIZE,
    DEFAULT_RUN_TIMEOUT_SECS, DEFAULT_SYNC_INTERVAL_SECS, TOKEN_REFRESH_MARGIN_SECS,
};
use contentsync_domain::{
    CacheSettings, Config, ContentSyncError, FetchSettings, Result, S3Config, SalesforceConfig,
    SchedulerSettings, StorageBackend, StorageConfig,
};

const AUTH_URL_VAR: &str = "SALESFORCE_AUTH_URL";

/// Load configuration from the environment or, failing that, a file.
///
/// # Errors
/// Returns `ContentSyncError::Config` if:
/// - A variable is present but invalid
/// - No config file can be found when the environment is not used
/// - The resulting configuration fails [`validate`]
pub fn load() -> Result<Config> {
    let config = if std::env::var_os(AUTH_URL_VAR).is_some() {
        let config = load_from_env()?;
        tracing::info!("Configuration loaded from environment variables");
        config
    } else {
        tracing::debug!("{AUTH_URL_VAR} not set, loading configuration from file");
        load_from_file(None)?
    };

    validate(&config)?;
    Ok(config)
}

/// Load configuration from environment variables
///
/// The three `SALESFORCE_*` variables are required; everything else falls
/// back to its default.
///
/// # Errors
/// Returns `ContentSyncError::Config` if required variables are missing
/// or have invalid values.
pub fn load_from_env() -> Result<Config> {
    let salesforce = SalesforceConfig {
        auth_url: env_var(AUTH_URL_VAR)?,
        client_id: env_var("SALESFORCE_CLIENT_ID")?,
        client_secret: env_var("SALESFORCE_CLIENT_SECRET")?,
    };

    let scheduler = SchedulerSettings {
        interval_seconds: env_parse("SYNC_INTERVAL_SECONDS", DEFAULT_SYNC_INTERVAL_SECS)?,
        run_on_start: env_bool("SYNC_RUN_ON_START", false),
        run_timeout_seconds: env_parse("SYNC_RUN_TIMEOUT_SECONDS", DEFAULT_RUN_TIMEOUT_SECS)?,
    };

    let fetch = FetchSettings {
        page_size: env_parse("FETCH_PAGE_SIZE", DEFAULT_PAGE_SIZE)?,
        max_concurrent_pages: env_parse_opt("FETCH_MAX_CONCURRENT_PAGES")?,
        max_failed_page_ratio: env_parse_opt("FETCH_MAX_FAILED_PAGE_RATIO")?,
        http_timeout_seconds: env_parse("HTTP_TIMEOUT_SECONDS", DEFAULT_HTTP_TIMEOUT_SECS)?,
    };

    let cache = CacheSettings {
        refresh_margin_seconds: env_parse(
            "CACHE_REFRESH_MARGIN_SECONDS",
            TOKEN_REFRESH_MARGIN_SECS,
        )?,
    };

    let backend = env_parse("STORAGE_BACKEND", StorageBackend::Local)?;
    let storage = match backend {
        StorageBackend::Local => StorageConfig::Local {
            directory: env_opt("LOCAL_STORAGE_DIR")
                .unwrap_or_else(|| DEFAULT_LOCAL_STORAGE_DIR.to_string()),
        },
        StorageBackend::S3 => StorageConfig::S3(S3Config {
            bucket: env_var("S3_BUCKET")?,
            path_prefix: env_opt("S3_PATH_PREFIX").unwrap_or_default(),
            region: env_opt("S3_REGION"),
            custom_endpoint: env_opt("S3_CUSTOM_ENDPOINT"),
            use_path_style: env_bool("S3_USE_PATH_STYLE", false),
        }),
    };

    Ok(Config { salesforce, scheduler, fetch, cache, storage })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `ContentSyncError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Required fields are missing
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ContentSyncError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            ContentSyncError::Config(
                "No config file found and SALESFORCE_AUTH_URL is not set".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| ContentSyncError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Reject configurations the sync engine cannot run with.
///
/// # Errors
/// Returns `ContentSyncError::Config` naming the first offending field.
pub fn validate(config: &Config) -> Result<()> {
    let invalid = |message: &str| Err(ContentSyncError::Config(message.to_string()));

    let salesforce = &config.salesforce;
    if salesforce.auth_url.trim().is_empty() {
        return invalid("salesforce.auth_url must not be empty");
    }
    if salesforce.client_id.trim().is_empty() || salesforce.client_secret.trim().is_empty() {
        return invalid("salesforce client id and secret must not be empty");
    }
    if config.scheduler.interval_seconds == 0 {
        return invalid("scheduler.interval_seconds must be positive");
    }
    if config.scheduler.run_timeout_seconds == 0 {
        return invalid("scheduler.run_timeout_seconds must be positive");
    }
    if config.fetch.page_size == 0 {
        return invalid("fetch.page_size must be positive");
    }
    if config.fetch.max_concurrent_pages == Some(0) {
        return invalid("fetch.max_concurrent_pages must be positive when set");
    }
    if let Some(ratio) = config.fetch.max_failed_page_ratio {
        if !(0.0..=1.0).contains(&ratio) {
            return invalid("fetch.max_failed_page_ratio must be between 0 and 1");
        }
    }
    if config.fetch.http_timeout_seconds == 0 {
        return invalid("fetch.http_timeout_seconds must be positive");
    }
    if let StorageConfig::S3(s3) = &config.storage {
        if s3.bucket.trim_matches('/').is_empty() {
            return invalid("storage.bucket must not be empty for the s3 backend");
        }
    }
    Ok(())
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
///
/// # Errors
/// Returns `ContentSyncError::Config` if format is invalid or parsing fails.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ContentSyncError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ContentSyncError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(ContentSyncError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    fn candidates_in(dir: &Path) -> Vec<PathBuf> {
        vec![
            dir.join("config.json"),
            dir.join("config.toml"),
            dir.join("contentsync.json"),
            dir.join("contentsync.toml"),
            dir.join("../config.json"),
            dir.join("../config.toml"),
            dir.join("../../config.json"),
            dir.join("../../config.toml"),
        ]
    }

    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidates_in(&cwd));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidates_in(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

/// Get required, non-empty environment variable
fn env_var(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| {
        ContentSyncError::Config(format!("Missing required environment variable: {}", key))
    })
}

/// Get optional environment variable, treating an empty value as unset
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Parse environment variable, falling back to `default` when unset
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    Ok(env_parse_opt(key)?.unwrap_or(default))
}

fn env_parse_opt<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    env_opt(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ContentSyncError::Config(format!("Invalid value for {key}: {e}")))
        })
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ALL_VARS: &[&str] = &[
        "SALESFORCE_AUTH_URL",
        "SALESFORCE_CLIENT_ID",
        "SALESFORCE_CLIENT_SECRET",
        "SYNC_INTERVAL_SECONDS",
        "SYNC_RUN_ON_START",
        "SYNC_RUN_TIMEOUT_SECONDS",
        "FETCH_PAGE_SIZE",
        "FETCH_MAX_CONCURRENT_PAGES",
        "FETCH_MAX_FAILED_PAGE_RATIO",
        "HTTP_TIMEOUT_SECONDS",
        "CACHE_REFRESH_MARGIN_SECONDS",
        "STORAGE_BACKEND",
        "LOCAL_STORAGE_DIR",
        "S3_BUCKET",
        "S3_PATH_PREFIX",
        "S3_REGION",
        "S3_CUSTOM_ENDPOINT",
        "S3_USE_PATH_STYLE",
    ];

    /// Run `f` with exactly `vars` set among the loader's variables.
    fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let saved: Vec<_> = ALL_VARS.iter().map(|key| (*key, std::env::var(key).ok())).collect();

        for key in ALL_VARS {
            std::env::remove_var(key);
        }
        for (key, value) in vars {
            std::env::set_var(key, value);
        }

        let result = f();

        for (key, value) in saved {
            match value {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
        }
        result
    }

    const CREDENTIALS: [(&str, &str); 3] = [
        ("SALESFORCE_AUTH_URL", "https://auth.example"),
        ("SALESFORCE_CLIENT_ID", "client"),
        ("SALESFORCE_CLIENT_SECRET", "secret"),
    ];

    fn write_temp(contents: &str, extension: &str) -> PathBuf {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        let path = temp_file.path().with_extension(extension);
        std::fs::copy(temp_file.path(), &path).unwrap();
        path
    }

    #[test]
    fn test_env_bool_parsing() {
        with_env(&[("SYNC_RUN_ON_START", "YES"), ("S3_USE_PATH_STYLE", "off")], || {
            assert!(env_bool("SYNC_RUN_ON_START", false));
            assert!(!env_bool("S3_USE_PATH_STYLE", true));
            assert!(env_bool("SYNC_RUN_TIMEOUT_SECONDS", true));
        });
    }

    #[test]
    fn test_load_from_env_defaults() {
        let config = with_env(&CREDENTIALS, load_from_env).unwrap();

        assert_eq!(config.salesforce.auth_url, "https://auth.example");
        assert_eq!(config.scheduler, SchedulerSettings::default());
        assert_eq!(config.fetch, FetchSettings::default());
        assert_eq!(config.cache.refresh_margin_seconds, 120);
        assert_eq!(config.storage, StorageConfig::Local { directory: "./data".into() });
    }

    #[test]
    fn test_load_from_env_all_vars_set() {
        let mut vars = CREDENTIALS.to_vec();
        vars.extend([
            ("SYNC_INTERVAL_SECONDS", "3600"),
            ("SYNC_RUN_ON_START", "true"),
            ("SYNC_RUN_TIMEOUT_SECONDS", "120"),
            ("FETCH_PAGE_SIZE", "25"),
            ("FETCH_MAX_CONCURRENT_PAGES", "4"),
            ("FETCH_MAX_FAILED_PAGE_RATIO", "0.25"),
            ("HTTP_TIMEOUT_SECONDS", "5"),
            ("CACHE_REFRESH_MARGIN_SECONDS", "60"),
            ("STORAGE_BACKEND", "S3"),
            ("S3_BUCKET", "blocks"),
            ("S3_PATH_PREFIX", "sync"),
            ("S3_CUSTOM_ENDPOINT", "http://localhost:9000"),
            ("S3_USE_PATH_STYLE", "1"),
        ]);

        let config = with_env(&vars, load_from_env).unwrap();

        assert_eq!(config.scheduler.interval_seconds, 3600);
        assert!(config.scheduler.run_on_start);
        assert_eq!(config.fetch.page_size, 25);
        assert_eq!(config.fetch.max_concurrent_pages, Some(4));
        assert_eq!(config.fetch.max_failed_page_ratio, Some(0.25));
        assert_eq!(config.cache.refresh_margin_seconds, 60);
        match config.storage {
            StorageConfig::S3(s3) => {
                assert_eq!(s3.bucket, "blocks");
                assert_eq!(s3.path_prefix, "sync");
                assert_eq!(s3.region, None);
                assert_eq!(s3.custom_endpoint.as_deref(), Some("http://localhost:9000"));
                assert!(s3.use_path_style);
            }
            other => panic!("expected s3 storage, got {other:?}"),
        }
    }

    #[test]
    fn test_load_from_env_missing_secret() {
        let err = with_env(&CREDENTIALS[..2], load_from_env).unwrap_err();
        assert!(err.to_string().contains("SALESFORCE_CLIENT_SECRET"));
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let mut vars = CREDENTIALS.to_vec();
        vars.push(("FETCH_PAGE_SIZE", "fifty"));

        let err = with_env(&vars, load_from_env).unwrap_err();

        assert!(matches!(err, ContentSyncError::Config(_)));
        assert!(err.to_string().contains("FETCH_PAGE_SIZE"));
    }

    #[test]
    fn test_s3_backend_requires_bucket() {
        let mut vars = CREDENTIALS.to_vec();
        vars.push(("STORAGE_BACKEND", "s3"));

        let err = with_env(&vars, load_from_env).unwrap_err();
        assert!(err.to_string().contains("S3_BUCKET"));
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let mut vars = CREDENTIALS.to_vec();
        vars.push(("STORAGE_BACKEND", "gcs"));

        let err = with_env(&vars, load_from_env).unwrap_err();
        assert!(err.to_string().contains("Invalid StorageBackend"));
    }

    #[test]
    fn test_load_validates_env_config() {
        let mut vars = CREDENTIALS.to_vec();
        vars.push(("SYNC_INTERVAL_SECONDS", "0"));

        let err = with_env(&vars, load).unwrap_err();
        assert!(err.to_string().contains("interval_seconds"));
    }

    #[test]
    fn test_load_from_file_json() {
        let path = write_temp(
            r#"{
                "salesforce": {
                    "auth_url": "https://auth.example",
                    "client_id": "client",
                    "client_secret": "secret"
                },
                "fetch": { "page_size": 20, "max_concurrent_pages": 2 }
            }"#,
            "json",
        );

        let config = load_from_file(Some(path.clone())).unwrap();
        assert_eq!(config.fetch.page_size, 20);
        assert_eq!(config.fetch.max_concurrent_pages, Some(2));
        assert_eq!(config.scheduler, SchedulerSettings::default());

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_toml() {
        let path = write_temp(
            r#"
[salesforce]
auth_url = "https://auth.example"
client_id = "client"
client_secret = "secret"

[scheduler]
interval_seconds = 600
run_on_start = true

[storage]
backend = "s3"
bucket = "blocks"
path_prefix = "nightly"
use_path_style = true
"#,
            "toml",
        );

        let config = load_from_file(Some(path.clone())).unwrap();
        assert_eq!(config.scheduler.interval_seconds, 600);
        assert!(config.scheduler.run_on_start);
        assert_eq!(config.storage.backend(), StorageBackend::S3);
        validate(&config).unwrap();

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_not_found() {
        let err = load_from_file(Some(PathBuf::from("/nonexistent/config.json"))).unwrap_err();
        assert!(matches!(err, ContentSyncError::Config(_)), "Should be a Config error");
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        let path = write_temp(r#"{ "this is": "not valid json" "#, "json");

        let err = load_from_file(Some(path.clone())).unwrap_err();
        assert!(err.to_string().contains("Invalid JSON format"));

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_parse_config_unsupported_extension() {
        let err = parse_config("", Path::new("config.yaml")).unwrap_err();
        assert!(err.to_string().contains("Unsupported config format"));
    }

    #[test]
    fn test_validate_rejects_bad_ratio_and_zero_concurrency() {
        let mut config = with_env(&CREDENTIALS, load_from_env).unwrap();
        validate(&config).unwrap();

        config.fetch.max_failed_page_ratio = Some(1.5);
        assert!(validate(&config).is_err());

        config.fetch.max_failed_page_ratio = None;
        config.fetch.max_concurrent_pages = Some(0);
        assert!(validate(&config).is_err());
    }
}
