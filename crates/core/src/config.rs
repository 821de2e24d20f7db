use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub server: ServerConfig,
    pub bot: BotConfig,
    pub webhook: WebhookConfig,
    pub keepalive: KeepAliveConfig,
    pub polling: PollingConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub public_url: String,
    pub api_base_url: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct BotConfig {
    pub name: String,
    pub hosting_label: String,
}

#[derive(Clone, Debug)]
pub struct WebhookConfig {
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct KeepAliveConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PollingConfig {
    pub timeout_secs: u64,
    pub retry_delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub bot_token: Option<String>,
    pub public_url: Option<String>,
    pub api_base_url: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub keepalive_enabled: Option<bool>,
    pub webhook_retry_delay_ms: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig {
                bot_token: String::new().into(),
                public_url: String::new(),
                api_base_url: "https://api.telegram.org".to_string(),
            },
            server: ServerConfig { bind_address: "0.0.0.0".to_string(), port: 3000 },
            bot: BotConfig {
                name: "telegram_bot_24_7".to_string(),
                hosting_label: "Railway".to_string(),
            },
            webhook: WebhookConfig { max_attempts: 3, retry_delay_ms: 5_000 },
            keepalive: KeepAliveConfig { enabled: true, interval_secs: 25 * 60, timeout_secs: 10 },
            polling: PollingConfig { timeout_secs: 30, retry_delay_ms: 1_000 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("vigil.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Callback URL registered with the platform: `{public_url}/bot{token}`.
    pub fn webhook_url(&self) -> String {
        format!(
            "{}/bot{}",
            self.telegram.public_url.trim_end_matches('/'),
            self.telegram.bot_token.expose_secret()
        )
    }

    /// Same as [`AppConfig::webhook_url`] with the token masked, for logs.
    pub fn redacted_webhook_url(&self) -> String {
        format!("{}/bot<redacted>", self.telegram.public_url.trim_end_matches('/'))
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(telegram) = patch.telegram {
            if let Some(bot_token_value) = telegram.bot_token {
                self.telegram.bot_token = secret_value(bot_token_value);
            }
            if let Some(public_url) = telegram.public_url {
                self.telegram.public_url = public_url;
            }
            if let Some(api_base_url) = telegram.api_base_url {
                self.telegram.api_base_url = api_base_url;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
        }

        if let Some(bot) = patch.bot {
            if let Some(name) = bot.name {
                self.bot.name = name;
            }
            if let Some(hosting_label) = bot.hosting_label {
                self.bot.hosting_label = hosting_label;
            }
        }

        if let Some(webhook) = patch.webhook {
            if let Some(max_attempts) = webhook.max_attempts {
                self.webhook.max_attempts = max_attempts;
            }
            if let Some(retry_delay_ms) = webhook.retry_delay_ms {
                self.webhook.retry_delay_ms = retry_delay_ms;
            }
        }

        if let Some(keepalive) = patch.keepalive {
            if let Some(enabled) = keepalive.enabled {
                self.keepalive.enabled = enabled;
            }
            if let Some(interval_secs) = keepalive.interval_secs {
                self.keepalive.interval_secs = interval_secs;
            }
            if let Some(timeout_secs) = keepalive.timeout_secs {
                self.keepalive.timeout_secs = timeout_secs;
            }
        }

        if let Some(polling) = patch.polling {
            if let Some(timeout_secs) = polling.timeout_secs {
                self.polling.timeout_secs = timeout_secs;
            }
            if let Some(retry_delay_ms) = polling.retry_delay_ms {
                self.polling.retry_delay_ms = retry_delay_ms;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        // Host platforms (Railway, Heroku, Render) inject the bare names.
        if let Some(value) = read_env("VIGIL_TELEGRAM_BOT_TOKEN").or_else(|| read_env("BOT_TOKEN"))
        {
            self.telegram.bot_token = secret_value(value);
        }
        if let Some(value) =
            read_env("VIGIL_TELEGRAM_PUBLIC_URL").or_else(|| read_env("WEBHOOK_URL"))
        {
            self.telegram.public_url = value;
        }
        if let Some(value) = read_env("VIGIL_TELEGRAM_API_BASE_URL") {
            self.telegram.api_base_url = value;
        }

        if let Some(value) = read_env("VIGIL_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        let port_key =
            if read_env("VIGIL_SERVER_PORT").is_some() { "VIGIL_SERVER_PORT" } else { "PORT" };
        if let Some(value) = read_env(port_key) {
            self.server.port = parse_u16(port_key, &value)?;
        }

        if let Some(value) = read_env("VIGIL_BOT_NAME") {
            self.bot.name = value;
        }
        if let Some(value) = read_env("VIGIL_BOT_HOSTING_LABEL") {
            self.bot.hosting_label = value;
        }

        if let Some(value) = read_env("VIGIL_WEBHOOK_MAX_ATTEMPTS") {
            self.webhook.max_attempts = parse_u32("VIGIL_WEBHOOK_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("VIGIL_WEBHOOK_RETRY_DELAY_MS") {
            self.webhook.retry_delay_ms = parse_u64("VIGIL_WEBHOOK_RETRY_DELAY_MS", &value)?;
        }

        if let Some(value) = read_env("VIGIL_KEEPALIVE_ENABLED") {
            self.keepalive.enabled = parse_bool("VIGIL_KEEPALIVE_ENABLED", &value)?;
        }
        if let Some(value) = read_env("VIGIL_KEEPALIVE_INTERVAL_SECS") {
            self.keepalive.interval_secs = parse_u64("VIGIL_KEEPALIVE_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("VIGIL_KEEPALIVE_TIMEOUT_SECS") {
            self.keepalive.timeout_secs = parse_u64("VIGIL_KEEPALIVE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("VIGIL_POLLING_TIMEOUT_SECS") {
            self.polling.timeout_secs = parse_u64("VIGIL_POLLING_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("VIGIL_POLLING_RETRY_DELAY_MS") {
            self.polling.retry_delay_ms = parse_u64("VIGIL_POLLING_RETRY_DELAY_MS", &value)?;
        }

        let log_level = read_env("VIGIL_LOGGING_LEVEL").or_else(|| read_env("VIGIL_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("VIGIL_LOGGING_FORMAT").or_else(|| read_env("VIGIL_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(bot_token) = overrides.bot_token {
            self.telegram.bot_token = secret_value(bot_token);
        }
        if let Some(public_url) = overrides.public_url {
            self.telegram.public_url = public_url;
        }
        if let Some(api_base_url) = overrides.api_base_url {
            self.telegram.api_base_url = api_base_url;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(enabled) = overrides.keepalive_enabled {
            self.keepalive.enabled = enabled;
        }
        if let Some(retry_delay_ms) = overrides.webhook_retry_delay_ms {
            self.webhook.retry_delay_ms = retry_delay_ms;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_telegram(&self.telegram)?;
        validate_server(&self.server)?;
        validate_webhook(&self.webhook)?;
        validate_keepalive(&self.keepalive)?;
        validate_polling(&self.polling)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("vigil.toml"), PathBuf::from("config/vigil.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_telegram(telegram: &TelegramConfig) -> Result<(), ConfigError> {
    let token = telegram.bot_token.expose_secret();
    if token.is_empty() {
        return Err(ConfigError::Validation(
            "telegram.bot_token is required. Get it from @BotFather (set BOT_TOKEN or VIGIL_TELEGRAM_BOT_TOKEN)".to_string(),
        ));
    }
    if !looks_like_bot_token(token) {
        return Err(ConfigError::Validation(
            "telegram.bot_token must look like `<bot id>:<secret>` as issued by @BotFather"
                .to_string(),
        ));
    }

    let public_url = telegram.public_url.trim();
    if public_url.is_empty() {
        return Err(ConfigError::Validation(
            "telegram.public_url is required (set WEBHOOK_URL or VIGIL_TELEGRAM_PUBLIC_URL to the service's public address)"
                .to_string(),
        ));
    }
    if !is_http_url(public_url) {
        return Err(ConfigError::Validation(
            "telegram.public_url must start with http:// or https://".to_string(),
        ));
    }
    if !is_http_url(telegram.api_base_url.trim()) {
        return Err(ConfigError::Validation(
            "telegram.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn looks_like_bot_token(token: &str) -> bool {
    let Some((bot_id, secret)) = token.split_once(':') else {
        return false;
    };
    !bot_id.is_empty()
        && bot_id.bytes().all(|byte| byte.is_ascii_digit())
        && !secret.is_empty()
        && secret.bytes().all(|byte| byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-')
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    Ok(())
}

fn validate_webhook(webhook: &WebhookConfig) -> Result<(), ConfigError> {
    if webhook.max_attempts == 0 {
        return Err(ConfigError::Validation(
            "webhook.max_attempts must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_keepalive(keepalive: &KeepAliveConfig) -> Result<(), ConfigError> {
    if keepalive.interval_secs == 0 {
        return Err(ConfigError::Validation(
            "keepalive.interval_secs must be greater than zero".to_string(),
        ));
    }

    if keepalive.timeout_secs == 0 || keepalive.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "keepalive.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_polling(polling: &PollingConfig) -> Result<(), ConfigError> {
    if polling.timeout_secs > 50 {
        return Err(ConfigError::Validation(
            "polling.timeout_secs must be in range 0..=50".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    telegram: Option<TelegramPatch>,
    server: Option<ServerPatch>,
    bot: Option<BotPatch>,
    webhook: Option<WebhookPatch>,
    keepalive: Option<KeepAlivePatch>,
    polling: Option<PollingPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramPatch {
    bot_token: Option<String>,
    public_url: Option<String>,
    api_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct BotPatch {
    name: Option<String>,
    hosting_label: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookPatch {
    max_attempts: Option<u32>,
    retry_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct KeepAlivePatch {
    enabled: Option<bool>,
    interval_secs: Option<u64>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PollingPatch {
    timeout_secs: Option<u64>,
    retry_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
