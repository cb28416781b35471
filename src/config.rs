use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

const SHEETS_BASE: &str = "https://script.google.com/macros/s";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub endpoints: Endpoints,
    pub http: HttpConfig,
    pub cache: CacheConfig,
    pub reader: ReaderConfig,
}

/// Spreadsheet web-app endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Book catalog and book data (`action=getBooks` / `action=getBookData`).
    pub books: String,
    /// Devotee list; initiation form submissions post here too.
    pub devotees: String,
    pub kirtans: String,
    pub bhajans: String,
    pub kathas: String,
    /// Book store listing and order submission.
    pub store: String,
    /// Guru Purnima kids event registration.
    pub event: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            books: format!(
                "{SHEETS_BASE}/AKfycbwMawnNDDWztlYEZnkW9Y5azBV3KHNKNXICVa1lnp9RtKsgo7Ht90Qtcq0PDmbma1ZnWw/exec"
            ),
            devotees: format!(
                "{SHEETS_BASE}/AKfycbw98AgJ3g0vImhIUbLom7O2O_e7emOp4P4S5gjygw41OvuudC5LMF2j41cZB74FjWzHsw/exec"
            ),
            kirtans: format!(
                "{SHEETS_BASE}/AKfycbz1Zxpd6OgNQwVZRkjOAh1YY7KtdbNWvXGjBf6-myeUkiGOhJaLC44Roh8gan_FBf4YKg/exec"
            ),
            bhajans: format!(
                "{SHEETS_BASE}/AKfycbzV2GA_nvQjGTAXRt-hjqZZOq7MkbaoIQaCHVr2Ut89HgxNRuAT4FklJNiT1RLLN8a4uw/exec"
            ),
            kathas: format!(
                "{SHEETS_BASE}/AKfycbzewZ_kCtIFbmkA5N2-_X2B1uyCgs_f7cn0f1VNLoS0c7f5e9gDnIgzrJ9rl3I_039LFw/exec"
            ),
            store: format!(
                "{SHEETS_BASE}/AKfycbwtHBiRYZoD3Oj1yFvMYM1Apqd1Rlngrjjj4idHbXuolo856_UQwbscRwmsdNIMlE3X/exec"
            ),
            event: format!(
                "{SHEETS_BASE}/AKfycbxLf6tNFsfp9a7r-M2ZHfYdvlzu8mZ2rM1RiPMKO5dyWkJFHJJUCFYFMOdel-DtriSq/exec"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: "kripadham/0.1".to_owned(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Upper bound on staged book payloads kept at once.
    pub max_book_entries: usize,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_book_entries: 32,
            ttl_secs: 86_400,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub stage_wait_ms: u64,
    pub stage_concurrency: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            stage_wait_ms: 3000,
            stage_concurrency: 4,
        }
    }
}

impl ReaderConfig {
    pub fn stage_wait(&self) -> Duration {
        Duration::from_millis(self.stage_wait_ms)
    }
}

impl AppConfig {
    /// Defaults, then the optional YAML file, then `KRIPADHAM_*` overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config
            .apply_env(|key| std::env::var(key).ok())
            .context("apply environment overrides")?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> anyhow::Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        serde_yaml::from_str(&yaml).with_context(|| format!("parse config: {}", path.display()))
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        let lookup = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        let urls = [
            ("KRIPADHAM_BOOKS_URL", &mut self.endpoints.books),
            ("KRIPADHAM_DEVOTEES_URL", &mut self.endpoints.devotees),
            ("KRIPADHAM_KIRTANS_URL", &mut self.endpoints.kirtans),
            ("KRIPADHAM_BHAJANS_URL", &mut self.endpoints.bhajans),
            ("KRIPADHAM_KATHAS_URL", &mut self.endpoints.kathas),
            ("KRIPADHAM_STORE_URL", &mut self.endpoints.store),
            ("KRIPADHAM_EVENT_URL", &mut self.endpoints.event),
        ];
        for (key, slot) in urls {
            if let Some(value) = lookup(key) {
                url::Url::parse(&value).with_context(|| format!("invalid {key}={value:?}"))?;
                *slot = value;
            }
        }

        if let Some(raw) = lookup("KRIPADHAM_HTTP_TIMEOUT_SECS") {
            self.http.timeout_secs = parse_env("KRIPADHAM_HTTP_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("KRIPADHAM_STAGE_WAIT_MS") {
            self.reader.stage_wait_ms = parse_env("KRIPADHAM_STAGE_WAIT_MS", &raw)?;
        }
        if let Some(raw) = lookup("KRIPADHAM_CACHE_MAX_BOOKS") {
            self.cache.max_book_entries = parse_env("KRIPADHAM_CACHE_MAX_BOOKS", &raw)?;
        }
        if let Some(raw) = lookup("KRIPADHAM_CACHE_TTL_SECS") {
            self.cache.ttl_secs = parse_env("KRIPADHAM_CACHE_TTL_SECS", &raw)?;
        }

        Ok(())
    }
}

fn parse_env<T>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|err| anyhow::anyhow!("invalid {key}={raw:?}: {err}"))
}
