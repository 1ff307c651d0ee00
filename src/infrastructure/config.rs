use crate::domain::lockout::{DEFAULT_LOCKOUT_SECONDS, MAX_LOGIN_ATTEMPTS};
use crate::domain::routes::Route;
use crate::infrastructure::error::InfraError;
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

const APP_JSON: &str = "app.json";
const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_REDIRECT_DELAY_MS: u64 = 1500;
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_PROBE_ATTEMPTS: u8 = 3;
const DEFAULT_PROBE_BASE_DELAY_MS: u64 = 200;

const API_BASE_URL_KEYS: &[&str] = &["TASKDESK_API_BASE_URL", "API_BASE_URL"];
const REDIRECT_DELAY_KEYS: &[&str] = &["TASKDESK_REDIRECT_DELAY_MS"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u8,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_PROBE_ATTEMPTS,
            base_delay_ms: DEFAULT_PROBE_BASE_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt + 1`.
    pub fn delay_for(&self, attempt: u8) -> Duration {
        Duration::from_millis(
            self.base_delay_ms
                .saturating_mul(2u64.saturating_pow(u32::from(attempt))),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_base_url: Url,
    pub main_route: Route,
    pub redirect_delay: Duration,
    pub request_timeout: Duration,
    pub probe_retry: RetryPolicy,
    pub max_login_attempts: u8,
    pub default_lockout_seconds: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: Url::parse(DEFAULT_API_BASE_URL).expect("valid default base url"),
            main_route: Route::Tasks,
            redirect_delay: Duration::from_millis(DEFAULT_REDIRECT_DELAY_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
            probe_retry: RetryPolicy::default(),
            max_login_attempts: MAX_LOGIN_ATTEMPTS,
            default_lockout_seconds: DEFAULT_LOCKOUT_SECONDS,
        }
    }
}

fn default_app_config() -> serde_json::Value {
    serde_json::json!({
        "schema": 1,
        "apiBaseUrl": DEFAULT_API_BASE_URL,
        "mainRoute": "/tasks",
        "redirectDelayMs": DEFAULT_REDIRECT_DELAY_MS,
        "requestTimeoutSeconds": DEFAULT_REQUEST_TIMEOUT_SECONDS,
        "probe": {
            "maxAttempts": DEFAULT_PROBE_ATTEMPTS,
            "baseDelayMs": DEFAULT_PROBE_BASE_DELAY_MS
        },
        "lockout": {
            "maxAttempts": MAX_LOGIN_ATTEMPTS,
            "defaultLockoutSeconds": DEFAULT_LOCKOUT_SECONDS
        }
    })
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&default_app_config())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_client_config(config_dir: &Path) -> Result<ClientConfig, InfraError> {
    load_client_config_with_lookup(config_dir, |key| std::env::var(key).ok())
}

pub fn load_client_config_with_lookup<F>(
    config_dir: &Path,
    lookup: F,
) -> Result<ClientConfig, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    let app = read_config(&config_dir.join(APP_JSON))?;
    let mut config = client_config_from_value(&app)?;

    if let Some(raw) = optional_lookup_value(&lookup, API_BASE_URL_KEYS) {
        config.api_base_url = parse_base_url(&raw)?;
    }
    if let Some(raw) = optional_lookup_value(&lookup, REDIRECT_DELAY_KEYS) {
        let millis = raw.parse::<u64>().map_err(|error| {
            InfraError::InvalidConfig(format!(
                "{} must be a number of milliseconds: {error}",
                REDIRECT_DELAY_KEYS.join(", ")
            ))
        })?;
        config.redirect_delay = Duration::from_millis(millis);
    }

    Ok(config)
}

fn client_config_from_value(app: &serde_json::Value) -> Result<ClientConfig, InfraError> {
    let mut config = ClientConfig::default();

    if let Some(raw) = non_empty_str(app, "apiBaseUrl") {
        config.api_base_url = parse_base_url(raw)?;
    }
    if let Some(raw) = non_empty_str(app, "mainRoute") {
        let route = Route::parse(raw);
        if route.is_auth_route() {
            return Err(InfraError::InvalidConfig(format!(
                "mainRoute must be a signed-in view, got {raw}"
            )));
        }
        config.main_route = route.resolve();
    }
    if let Some(millis) = app.get("redirectDelayMs").and_then(serde_json::Value::as_u64) {
        config.redirect_delay = Duration::from_millis(millis);
    }
    if let Some(seconds) = app
        .get("requestTimeoutSeconds")
        .and_then(serde_json::Value::as_u64)
        .filter(|value| *value > 0)
    {
        config.request_timeout = Duration::from_secs(seconds);
    }
    if let Some(probe) = app.get("probe") {
        if let Some(attempts) = probe
            .get("maxAttempts")
            .and_then(serde_json::Value::as_u64)
        {
            config.probe_retry.max_attempts = u8::try_from(attempts.clamp(1, 10)).unwrap_or(1);
        }
        if let Some(delay) = probe.get("baseDelayMs").and_then(serde_json::Value::as_u64) {
            config.probe_retry.base_delay_ms = delay;
        }
    }
    if let Some(lockout) = app.get("lockout") {
        if let Some(attempts) = lockout
            .get("maxAttempts")
            .and_then(serde_json::Value::as_u64)
        {
            config.max_login_attempts =
                u8::try_from(attempts.clamp(1, u64::from(u8::MAX))).unwrap_or(MAX_LOGIN_ATTEMPTS);
        }
        if let Some(seconds) = lockout
            .get("defaultLockoutSeconds")
            .and_then(serde_json::Value::as_u64)
            .filter(|value| *value > 0)
        {
            config.default_lockout_seconds = seconds;
        }
    }

    Ok(config)
}

fn non_empty_str<'a>(value: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub fn parse_base_url(raw: &str) -> Result<Url, InfraError> {
    let url = Url::parse(raw.trim())
        .map_err(|error| InfraError::InvalidConfig(format!("invalid apiBaseUrl '{raw}': {error}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(InfraError::InvalidConfig(format!(
            "apiBaseUrl must use http or https, got {}",
            url.scheme()
        )));
    }
    if url.cannot_be_a_base() {
        return Err(InfraError::InvalidConfig(format!(
            "apiBaseUrl cannot be a base: {raw}"
        )));
    }
    Ok(url)
}

fn optional_lookup_value<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    for key in keys {
        if let Some(value) = lookup(key) {
            let normalized = value.trim();
            if !normalized.is_empty() {
                return Some(normalized.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_DIR: AtomicUsize = AtomicUsize::new(0);

    struct TempConfigDir {
        path: PathBuf,
    }

    impl TempConfigDir {
        fn new() -> Self {
            let sequence = NEXT_TEMP_DIR.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "taskdesk-config-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp config dir");
            Self { path }
        }

        fn write_app(&self, value: serde_json::Value) {
            fs::write(self.path.join(APP_JSON), value.to_string()).expect("write app.json");
        }
    }

    impl Drop for TempConfigDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn defaults_are_written_and_loaded() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");
        let config = load_client_config_with_lookup(&dir.path, |_| None).expect("load config");
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn existing_config_is_not_overwritten() {
        let dir = TempConfigDir::new();
        dir.write_app(serde_json::json!({"schema": 1, "redirectDelayMs": 10}));
        ensure_default_configs(&dir.path).expect("ensure defaults");
        let config = load_client_config_with_lookup(&dir.path, |_| None).expect("load config");
        assert_eq!(config.redirect_delay, Duration::from_millis(10));
    }

    #[test]
    fn environment_overrides_base_url_and_delay() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");
        let config = load_client_config_with_lookup(&dir.path, |key| match key {
            "API_BASE_URL" => Some(" https://api.example.com/v1 ".to_string()),
            "TASKDESK_REDIRECT_DELAY_MS" => Some("0".to_string()),
            _ => None,
        })
        .expect("load config");
        assert_eq!(config.api_base_url.as_str(), "https://api.example.com/v1");
        assert_eq!(config.redirect_delay, Duration::ZERO);
    }

    #[test]
    fn unsupported_schema_is_rejected() {
        let dir = TempConfigDir::new();
        dir.write_app(serde_json::json!({"schema": 2}));
        match load_client_config_with_lookup(&dir.path, |_| None) {
            Err(InfraError::InvalidConfig(message)) => assert!(message.contains("schema 2")),
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn non_http_base_url_is_rejected() {
        assert!(parse_base_url("ftp://example.com").is_err());
        assert!(parse_base_url("not a url").is_err());
        assert!(parse_base_url("http://localhost:8000").is_ok());
    }

    #[test]
    fn main_route_must_not_be_an_auth_route() {
        let dir = TempConfigDir::new();
        dir.write_app(serde_json::json!({"schema": 1, "mainRoute": "/login"}));
        assert!(load_client_config_with_lookup(&dir.path, |_| None).is_err());

        dir.write_app(serde_json::json!({"schema": 1, "mainRoute": "/events"}));
        let config = load_client_config_with_lookup(&dir.path, |_| None).expect("load config");
        assert_eq!(config.main_route, Route::Events);
    }

    #[test]
    fn retry_delay_doubles_per_attempt() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 200,
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(800));
    }
}
