//! Configuration file management for siteplan.
//!
//! Provides a TOML-based config file at `~/.config/siteplan/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use siteplan_core::{OpenAiConfig, RateModel};

/// Default bind address for `siteplan serve`.
pub const DEFAULT_BIND: &str = "0.0.0.0";
/// Default port for `siteplan serve`.
pub const DEFAULT_PORT: u16 = 8000;
/// Default per-request timeout for plan generation, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
/// Default request body limit for document uploads, in MiB.
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 50;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub estimation: EstimationSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct LlmSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_upload_mb: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EstimationSection {
    /// Replacement rate table; the embedded table is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rates_path: Option<PathBuf>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the siteplan config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/siteplan` or `~/.config/siteplan`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("siteplan");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("siteplan")
}

/// Return the path to the siteplan config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("failed to parse {}", path.display()))
}

/// Load the config file if one exists. A file that exists but does not
/// parse is an error.
pub fn load_config_if_present() -> Result<Option<ConfigFile>> {
    if config_path().exists() {
        load_config().map(Some)
    } else {
        Ok(None)
    }
}

fn parse_config(contents: &str) -> Result<ConfigFile> {
    toml::from_str(contents).context("invalid config TOML")
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    // The file may hold an API key.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

/// A config file populated with the defaults, for `siteplan init`.
pub fn default_config_file(api_key: Option<String>) -> ConfigFile {
    ConfigFile {
        llm: LlmSection {
            api_key,
            model: Some(OpenAiConfig::DEFAULT_MODEL.to_string()),
            base_url: Some(OpenAiConfig::DEFAULT_BASE_URL.to_string()),
        },
        server: ServerSection {
            bind: Some(DEFAULT_BIND.to_string()),
            port: Some(DEFAULT_PORT),
            request_timeout_secs: Some(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_upload_mb: Some(DEFAULT_MAX_UPLOAD_MB),
        },
        estimation: EstimationSection::default(),
    }
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values supplied on the command line, each overriding env and file.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub model: Option<String>,
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub rates: Option<PathBuf>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct SiteplanConfig {
    pub llm: OpenAiConfig,
    pub bind: String,
    pub port: u16,
    pub request_timeout: Duration,
    /// Request body limit for `/ingest/document`.
    pub max_upload_bytes: usize,
    pub rates: RateModel,
}

impl SiteplanConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - API key: `OPENAI_API_KEY` env > `llm.api_key` > error
    /// - Model: `--model` > `OPENAI_MODEL` env > `llm.model` > `gpt-4o`
    /// - Base URL: `OPENAI_BASE_URL` env > `llm.base_url` > OpenAI
    /// - Port: `--port` > `API_PORT` env > `server.port` > `8000`
    /// - Bind: `--bind` > `server.bind` > `0.0.0.0`
    /// - Upload limit: `server.max_upload_mb` > `50`
    /// - Rates: see [`resolve_rates`]
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        let file = load_config_if_present()?.unwrap_or_default();

        let api_key = match env_var("OPENAI_API_KEY") {
            Some(key) => key,
            None => match file.llm.api_key.clone().filter(|k| !k.trim().is_empty()) {
                Some(key) => key,
                None => bail!(
                    "OpenAI API key not found; set OPENAI_API_KEY or run `siteplan init --api-key <KEY>`"
                ),
            },
        };

        let model = cli
            .model
            .clone()
            .or_else(|| env_var("OPENAI_MODEL"))
            .or_else(|| file.llm.model.clone())
            .unwrap_or_else(|| OpenAiConfig::DEFAULT_MODEL.to_string());

        let base_url = env_var("OPENAI_BASE_URL")
            .or_else(|| file.llm.base_url.clone())
            .unwrap_or_else(|| OpenAiConfig::DEFAULT_BASE_URL.to_string());

        let port = match (cli.port, env_var("API_PORT")) {
            (Some(port), _) => port,
            (None, Some(raw)) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("API_PORT env var is not a valid port: {raw:?}"))?,
            (None, None) => file.server.port.unwrap_or(DEFAULT_PORT),
        };

        let bind = cli
            .bind
            .clone()
            .or_else(|| file.server.bind.clone())
            .unwrap_or_else(|| DEFAULT_BIND.to_string());

        let timeout_secs = file
            .server
            .request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if timeout_secs == 0 {
            bail!("server.request_timeout_secs must be greater than zero");
        }

        let max_upload_bytes = upload_limit_bytes(
            file.server.max_upload_mb.unwrap_or(DEFAULT_MAX_UPLOAD_MB),
        )?;

        let rates = load_rate_model(rates_path(cli, &file).as_deref())?;

        Ok(Self {
            llm: OpenAiConfig {
                api_key,
                model,
                base_url,
            },
            bind,
            port,
            request_timeout: Duration::from_secs(timeout_secs),
            max_upload_bytes,
            rates,
        })
    }
}

/// Convert `server.max_upload_mb` to bytes, rejecting zero and overflow.
fn upload_limit_bytes(mb: u64) -> Result<usize> {
    if mb == 0 {
        bail!("server.max_upload_mb must be greater than zero");
    }
    mb.checked_mul(1024 * 1024)
        .and_then(|bytes| usize::try_from(bytes).ok())
        .with_context(|| format!("server.max_upload_mb is too large: {mb}"))
}

/// Resolve only the rate table: `--rates` > `SITEPLAN_RATES` env >
/// `estimation.rates_path` > embedded table. Needs no API key.
pub fn resolve_rates(cli_rates: Option<&Path>) -> Result<RateModel> {
    let file = load_config_if_present()?.unwrap_or_default();
    let cli = CliOverrides {
        rates: cli_rates.map(Path::to_path_buf),
        ..CliOverrides::default()
    };
    load_rate_model(rates_path(&cli, &file).as_deref())
}

fn rates_path(cli: &CliOverrides, file: &ConfigFile) -> Option<PathBuf> {
    cli.rates
        .clone()
        .or_else(|| env_var("SITEPLAN_RATES").map(PathBuf::from))
        .or_else(|| file.estimation.rates_path.clone())
}

/// Load a rate table from `path`, or the embedded table when `None`.
pub fn load_rate_model(path: Option<&Path>) -> Result<RateModel> {
    match path {
        Some(path) => RateModel::load(path)
            .with_context(|| format!("invalid rate table {}", path.display())),
        None => Ok(RateModel::builtin()),
    }
}

/// A set, non-blank environment variable.
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
