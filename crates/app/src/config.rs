use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use quill_core::domain::guard::GuardPolicy;
use thiserror::Error;

const DEFAULT_HASH_SALT: &str = "Eech7co8Ohloopo9Ol6baimi";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: SocketAddr,
    pub database_url: String,
    pub db_timeout: Duration,
    pub request_timeout: Duration,
    /// Origin used to fetch page titles; falls back to the request origin.
    pub public_host: Option<String>,
    pub cors_allow_origins: Vec<String>,
    pub admin_token: Option<String>,
    pub moderation: ModerationConfig,
    pub purge_interval: Duration,
    pub guard: GuardPolicy,
    pub edit_max_age: Duration,
    pub hash_algorithm: String,
    pub hash_salt: String,
    pub notify_log: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModerationConfig {
    pub enabled: bool,
    pub approve_acquaintance: bool,
    pub purge_after: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid socket address: {0}")]
    InvalidSocket(String),
    #[error("invalid integer for {0}: {1}")]
    InvalidNumber(&'static str, String),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };
        let http_addr_raw = env.string("QUILL_HTTP_ADDR", "127.0.0.1:8080");
        let http_addr = http_addr_raw
            .parse()
            .map_err(|_| ConfigError::InvalidSocket(http_addr_raw.clone()))?;
        let database_url = env.string("QUILL_DATABASE_URL", "sqlite://./data/comments.db");
        if database_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue("QUILL_DATABASE_URL", database_url));
        }
        let db_timeout_secs = env.u64("QUILL_DB_TIMEOUT_SECS", 5)?;
        let request_timeout_secs = env.u64("QUILL_REQUEST_TIMEOUT_SECS", 5)?;
        let public_host = env
            .optional("QUILL_PUBLIC_HOST")
            .map(|host| host.trim_end_matches('/').to_string());
        let cors_allow_origins = env
            .optional("QUILL_CORS_ALLOW_ORIGINS")
            .map(|raw| split_list(&raw))
            .unwrap_or_default();
        let admin_token = env.optional("QUILL_ADMIN_TOKEN");

        let moderation = ModerationConfig {
            enabled: env.bool("QUILL_MODERATION_ENABLED", false)?,
            approve_acquaintance: env.bool("QUILL_MODERATION_APPROVE_ACQUAINTANCE", false)?,
            purge_after: Duration::from_secs(env.u64("QUILL_MODERATION_PURGE_AFTER_SECS", 2_592_000)?),
        };
        let purge_interval_secs = env.u64("QUILL_PURGE_INTERVAL_SECS", 3600)?;
        if purge_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "QUILL_PURGE_INTERVAL_SECS",
                purge_interval_secs.to_string(),
            ));
        }

        let edit_max_age = Duration::from_secs(env.u64("QUILL_EDIT_MAX_AGE_SECS", 900)?);
        let guard = GuardPolicy {
            enabled: env.bool("QUILL_GUARD_ENABLED", true)?,
            rate_limit: env.i64("QUILL_GUARD_RATELIMIT", 2)?,
            direct_reply: env.i64("QUILL_GUARD_DIRECT_REPLY", 3)?,
            reply_to_self: env.bool("QUILL_GUARD_REPLY_TO_SELF", false)?,
            require_author: env.bool("QUILL_GUARD_REQUIRE_AUTHOR", false)?,
            require_email: env.bool("QUILL_GUARD_REQUIRE_EMAIL", false)?,
            max_age: edit_max_age.as_secs_f64(),
        };

        let hash_algorithm = env.string("QUILL_HASH_ALGORITHM", "pbkdf2:1000:6:sha1");
        let hash_salt = env.string("QUILL_HASH_SALT", DEFAULT_HASH_SALT);
        let notify_log = env.bool("QUILL_NOTIFY_LOG", true)?;

        Ok(Self {
            http_addr,
            database_url,
            db_timeout: Duration::from_secs(db_timeout_secs),
            request_timeout: Duration::from_secs(request_timeout_secs),
            public_host,
            cors_allow_origins,
            admin_token,
            moderation,
            purge_interval: Duration::from_secs(purge_interval_secs),
            guard,
            edit_max_age,
            hash_algorithm,
            hash_salt,
            notify_log,
        })
    }
}

pub fn load_dotenv() -> Result<(), std::io::Error> {
    let path = Path::new(".env");
    if !path.exists() {
        return Ok(());
    }
    let contents = std::fs::read_to_string(path)?;
    for (key, value) in parse_dotenv(&contents) {
        if std::env::var_os(&key).is_none() {
            // Safety: invoked during startup before any threads are spawned.
            unsafe {
                std::env::set_var(key, value);
            }
        }
    }
    Ok(())
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &'static str, default: &'static str) -> String {
        (self.lookup)(key).unwrap_or_else(|| default.to_string())
    }

    fn optional(&self, key: &'static str) -> Option<String> {
        let value = (self.lookup)(key)?;
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    fn u64(&self, key: &'static str, default: u64) -> Result<u64, ConfigError> {
        let raw = self.string_or(key, default.to_string());
        raw.trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber(key, raw))
    }

    fn i64(&self, key: &'static str, default: i64) -> Result<i64, ConfigError> {
        let raw = self.string_or(key, default.to_string());
        raw.trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber(key, raw))
    }

    fn bool(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        let Some(raw) = self.optional(key) else {
            return Ok(default);
        };
        parse_bool(&raw).ok_or(ConfigError::InvalidValue(key, raw))
    }

    fn string_or(&self, key: &'static str, default: String) -> String {
        (self.lookup)(key).unwrap_or(default)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .filter_map(parse_dotenv_line)
        .collect()
}

fn parse_dotenv_line(line: &str) -> Option<(String, String)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
    let (key, value) = trimmed.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let value = parse_dotenv_value(value.trim());
    Some((key.to_string(), value))
}

fn parse_dotenv_value(value: &str) -> String {
    if let Some(stripped) = value.strip_prefix('"').and_then(|inner| inner.strip_suffix('"')) {
        return unescape_double_quoted(stripped);
    }
    if let Some(stripped) = value.strip_prefix('\'').and_then(|inner| inner.strip_suffix('\'')) {
        return stripped.to_string();
    }
    value.to_string()
}

fn unescape_double_quoted(value: &str) -> String {
    let mut output = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => output.push('\n'),
                Some('r') => output.push('\r'),
                Some('t') => output.push('\t'),
                Some('\\') => output.push('\\'),
                Some('"') => output.push('"'),
                Some(other) => {
                    output.push('\\');
                    output.push(other);
                }
                None => output.push('\\'),
            }
        } else {
            output.push(ch);
        }
    }
    output
}
