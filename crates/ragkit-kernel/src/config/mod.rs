//! Configuration file loading
//!
//! Files are decoded by extension, with `${VAR}` and `$VAR` environment
//! references expanded first. Callers deserialize into their own structs and
//! hand those to constructors; no defaults are kept here.

use config::{Config as Cfg, Environment, File};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::LazyLock;

pub use config::FileFormat;

static BRACED_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("braced env pattern"));
static SIMPLE_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)\b").expect("simple env pattern"));

/// Failure to read or decode a configuration source.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    /// The source is not valid for its format
    #[error("malformed config: {0}")]
    Parse(String),

    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// The source parsed but does not fit the target type
    #[error("config does not match the expected shape: {0}")]
    Serialization(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Map a file extension to its format.
///
/// Recognized: `yaml`/`yml`, `toml`, `json`, `ini`, `ron`, `json5`.
pub fn detect_format(path: impl AsRef<Path>) -> ConfigResult<FileFormat> {
    let path = path.as_ref();
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return Err(ConfigError::UnsupportedFormat(format!(
            "{} has no file extension",
            path.display()
        )));
    };

    let format = match ext.to_ascii_lowercase().as_str() {
        "yaml" | "yml" => FileFormat::Yaml,
        "toml" => FileFormat::Toml,
        "json" => FileFormat::Json,
        "ini" => FileFormat::Ini,
        "ron" => FileFormat::Ron,
        "json5" => FileFormat::Json5,
        other => return Err(ConfigError::UnsupportedFormat(format!(".{other}"))),
    };
    Ok(format)
}

/// Replace `${NAME}` and then `$NAME` with the value of the environment
/// variable `NAME`. Unset variables are left as written.
pub fn substitute_env_vars(content: &str) -> String {
    let lookup = |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    };
    let braced = BRACED_VAR.replace_all(content, lookup);
    SIMPLE_VAR.replace_all(&braced, lookup).into_owned()
}

/// Read `path` and decode it into `T`, choosing the format by extension.
///
/// ```rust,ignore
/// use ragkit_kernel::config::load_config;
///
/// #[derive(serde::Deserialize)]
/// struct Paths {
///     data_dir: String,
/// }
///
/// let paths: Paths = load_config("ragkit.toml")?;
/// ```
pub fn load_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> ConfigResult<T> {
    let format = detect_format(&path)?;
    let content = std::fs::read_to_string(path)?;
    decode(&content, format, None)
}

/// Decode `content` of a known format into `T`.
pub fn from_str<T: DeserializeOwned>(content: &str, format: FileFormat) -> ConfigResult<T> {
    decode(content, format, None)
}

/// Like [`load_config`], with environment variables layered on top.
///
/// Variables carry `env_prefix` and use `__` between nested keys, so with the
/// prefix `RAGKIT`, `RAGKIT_OLLAMA__BASE_URL` overrides `ollama.base_url`.
pub fn load_with_env<T: DeserializeOwned>(
    path: impl AsRef<Path>,
    env_prefix: &str,
) -> ConfigResult<T> {
    let format = detect_format(&path)?;
    let content = std::fs::read_to_string(path)?;
    decode(&content, format, Some(env_prefix))
}

fn decode<T: DeserializeOwned>(
    content: &str,
    format: FileFormat,
    env_prefix: Option<&str>,
) -> ConfigResult<T> {
    let substituted = substitute_env_vars(content);
    let mut builder = Cfg::builder().add_source(File::from_str(&substituted, format));
    if let Some(prefix) = env_prefix {
        builder = builder.add_source(Environment::with_prefix(prefix).separator("__"));
    }

    builder
        .build()
        .map_err(|e| ConfigError::Parse(e.to_string()))?
        .try_deserialize()
        .map_err(|e| ConfigError::Serialization(e.to_string()))
}
