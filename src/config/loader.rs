//! Configuration loading and layered resolution.
//!
//! Each option resolves as: environment variable (uppercased key), then the
//! config file, then the built-in default.

use std::fmt::Display;
use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::config::schema::{Config, LogFormat, MAX_READ_LIMIT};

/// Every option the resolver understands.
pub const KEYS: &[&str] = &[
    "port",
    "interface",
    "reply",
    "cooldown",
    "handlers",
    "handler_exec",
    "handlers_dir",
    "read_limit",
    "webhook_timeout",
    "log_format",
    "metrics_address",
];

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse JSON config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse TOML config {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for '{key}' ({value:?}): {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Options as written in the config file.
///
/// Every field is optional and unknown keys are ignored. Scalars may be
/// written as strings or as bare numbers.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    #[serde(deserialize_with = "lenient::parsed")]
    pub port: Option<u16>,

    #[serde(deserialize_with = "lenient::text")]
    pub interface: Option<String>,

    #[serde(deserialize_with = "lenient::text")]
    pub reply: Option<String>,

    /// Seconds. Older config files call this `timeout`.
    #[serde(alias = "timeout", deserialize_with = "lenient::parsed")]
    pub cooldown: Option<u64>,

    /// A comma-separated string or a list of names.
    #[serde(deserialize_with = "lenient::handler_list")]
    pub handlers: Option<Vec<String>>,

    #[serde(deserialize_with = "lenient::text")]
    pub handler_exec: Option<String>,

    #[serde(deserialize_with = "lenient::text")]
    pub handlers_dir: Option<String>,

    #[serde(deserialize_with = "lenient::parsed")]
    pub read_limit: Option<usize>,

    #[serde(deserialize_with = "lenient::parsed")]
    pub webhook_timeout: Option<u64>,

    #[serde(deserialize_with = "lenient::parsed")]
    pub log_format: Option<LogFormat>,

    #[serde(deserialize_with = "lenient::text")]
    pub metrics_address: Option<String>,
}

impl FileConfig {
    /// Load the config file at `path`.
    ///
    /// A missing file yields an empty config. A file that exists but cannot
    /// be read or parsed is an error. Paths ending in `.toml` are parsed as
    /// TOML, everything else as JSON.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        if is_toml {
            Self::from_toml(path, &content)
        } else {
            Self::from_json(path, &content)
        }
    }

    /// Parse JSON config content. `path` is only used for error reporting.
    pub fn from_json(path: &Path, content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse TOML config content. `path` is only used for error reporting.
    pub fn from_toml(path: &Path, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Load the config file at `path` and resolve it against the process
/// environment.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let file = FileConfig::load(path)?;
    resolve(|name| std::env::var(name).ok(), &file)
}

/// Resolve every option from `env`, then `file`, then the defaults.
///
/// `env` is handed the uppercased key and returns the variable's value if it
/// is set. A set-but-empty variable still wins over the file.
pub fn resolve<E>(env: E, file: &FileConfig) -> Result<Config, ConfigError>
where
    E: Fn(&str) -> Option<String>,
{
    let env = Env(env);
    let defaults = Config::default();

    let port = env.parsed("port")?.or(file.port).unwrap_or(defaults.port);
    let interface = env
        .text("interface")
        .or_else(|| file.interface.clone())
        .unwrap_or(defaults.interface);
    let reply = env
        .text("reply")
        .or_else(|| file.reply.clone())
        .unwrap_or(defaults.reply);
    let cooldown = env
        .parsed("cooldown")?
        .or(file.cooldown)
        .map(Duration::from_secs)
        .unwrap_or(defaults.cooldown);
    let handlers = env
        .text("handlers")
        .map(|raw| split_handlers(&raw))
        .or_else(|| file.handlers.clone())
        .unwrap_or(defaults.handlers);
    let handler_exec = env
        .text("handler_exec")
        .or_else(|| file.handler_exec.clone())
        .map(PathBuf::from)
        .unwrap_or(defaults.handler_exec);
    let handlers_dir = env
        .text("handlers_dir")
        .or_else(|| file.handlers_dir.clone())
        .map(PathBuf::from)
        .unwrap_or(defaults.handlers_dir);
    let read_limit = env
        .parsed("read_limit")?
        .or(file.read_limit)
        .unwrap_or(defaults.read_limit);
    let webhook_timeout = env
        .parsed("webhook_timeout")?
        .or(file.webhook_timeout)
        .map(Duration::from_secs)
        .unwrap_or(defaults.webhook_timeout);
    let log_format = env
        .parsed("log_format")?
        .or(file.log_format)
        .unwrap_or(defaults.log_format);
    let metrics_address = match env
        .text("metrics_address")
        .or_else(|| file.metrics_address.clone())
    {
        Some(addr) if addr.trim().is_empty() => None,
        Some(addr) => Some(parse_value::<SocketAddr>("metrics_address", addr.trim())?),
        None => defaults.metrics_address,
    };

    if handler_exec.as_os_str().is_empty() {
        return Err(invalid("handler_exec", "", "must not be empty"));
    }
    if read_limit > MAX_READ_LIMIT {
        return Err(invalid(
            "read_limit",
            read_limit.to_string(),
            format!("must be at most {} bytes", MAX_READ_LIMIT),
        ));
    }

    Ok(Config {
        port,
        interface,
        reply,
        cooldown,
        handlers,
        handler_exec,
        handlers_dir,
        read_limit,
        webhook_timeout,
        log_format,
        metrics_address,
    })
}

/// Split a comma-separated handler list, trimming entries and dropping empty
/// ones.
pub fn split_handlers(raw: &str) -> Vec<String> {
    clean_handlers(raw.split(','))
}

fn clean_handlers<I, S>(entries: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    entries
        .into_iter()
        .filter_map(|entry| {
            let entry = entry.as_ref().trim();
            (!entry.is_empty()).then(|| entry.to_string())
        })
        .collect()
}

struct Env<E>(E);

impl<E> Env<E>
where
    E: Fn(&str) -> Option<String>,
{
    fn text(&self, key: &str) -> Option<String> {
        (self.0)(&key.to_ascii_uppercase())
    }

    fn parsed<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.text(key)
            .map(|raw| parse_value(key, raw.trim()))
            .transpose()
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|e: T::Err| invalid(key, value, e.to_string()))
}

fn invalid(key: &str, value: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.into(),
        reason: reason.into(),
    }
}

/// Field deserializers that accept both `"8888"` and `8888`.
mod lenient {
    use std::fmt::Display;
    use std::str::FromStr;

    use serde::de::{self, Deserializer};
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Int(i64),
        UInt(u64),
        Float(f64),
        Bool(bool),
    }

    impl Scalar {
        fn into_text(self) -> String {
            match self {
                Scalar::Text(s) => s,
                Scalar::Int(n) => n.to_string(),
                Scalar::UInt(n) => n.to_string(),
                Scalar::Float(f) => f.to_string(),
                Scalar::Bool(b) => b.to_string(),
            }
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HandlerList {
        Joined(String),
        Entries(Vec<Scalar>),
    }

    pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Scalar>::deserialize(deserializer)?.map(Scalar::into_text))
    }

    pub fn parsed<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: FromStr,
        T::Err: Display,
    {
        text(deserializer)?
            .map(|raw| {
                raw.trim()
                    .parse()
                    .map_err(|e: T::Err| de::Error::custom(format!("invalid value {:?}: {}", raw, e)))
            })
            .transpose()
    }

    pub fn handler_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(
            Option::<HandlerList>::deserialize(deserializer)?.map(|list| match list {
                HandlerList::Joined(raw) => super::split_handlers(&raw),
                HandlerList::Entries(entries) => {
                    super::clean_handlers(entries.into_iter().map(Scalar::into_text))
                }
            }),
        )
    }
}
