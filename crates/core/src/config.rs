use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub sheets: SheetsConfig,
    pub view: ViewConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub api_base: String,
    pub poll_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SheetsConfig {
    pub api_token: Option<SecretString>,
    pub spreadsheet_id: String,
    pub worksheet: Option<String>,
    pub api_base: String,
}

#[derive(Clone, Debug)]
pub struct ViewConfig {
    pub entries_per_page: usize,
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
    pub telegram_bot_token: Option<String>,
    pub sheets_spreadsheet_id: Option<String>,
    pub log_level: Option<String>,
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
                api_base: "https://api.telegram.org".to_string(),
                poll_timeout_secs: 30,
            },
            sheets: SheetsConfig {
                api_token: None,
                spreadsheet_id: String::new(),
                worksheet: None,
                api_base: "https://sheets.googleapis.com".to_string(),
            },
            view: ViewConfig { entries_per_page: 5 },
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("pricelog.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(telegram) = patch.telegram {
            if let Some(bot_token_value) = telegram.bot_token {
                self.telegram.bot_token = secret_value(bot_token_value);
            }
            if let Some(api_base) = telegram.api_base {
                self.telegram.api_base = api_base;
            }
            if let Some(poll_timeout_secs) = telegram.poll_timeout_secs {
                self.telegram.poll_timeout_secs = poll_timeout_secs;
            }
        }

        if let Some(sheets) = patch.sheets {
            if let Some(api_token_value) = sheets.api_token {
                self.sheets.api_token = Some(secret_value(api_token_value));
            }
            if let Some(spreadsheet_id) = sheets.spreadsheet_id {
                self.sheets.spreadsheet_id = spreadsheet_id;
            }
            if let Some(worksheet) = sheets.worksheet {
                self.sheets.worksheet = Some(worksheet);
            }
            if let Some(api_base) = sheets.api_base {
                self.sheets.api_base = api_base;
            }
        }

        if let Some(view) = patch.view {
            if let Some(entries_per_page) = view.entries_per_page {
                self.view.entries_per_page = entries_per_page;
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
        if let Some(value) = read_env("PRICELOG_TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("PRICELOG_TELEGRAM_API_BASE") {
            self.telegram.api_base = value;
        }
        if let Some(value) = read_env("PRICELOG_TELEGRAM_POLL_TIMEOUT_SECS") {
            self.telegram.poll_timeout_secs =
                parse_u64("PRICELOG_TELEGRAM_POLL_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("PRICELOG_SHEETS_API_TOKEN") {
            self.sheets.api_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("PRICELOG_SHEETS_SPREADSHEET_ID") {
            self.sheets.spreadsheet_id = value;
        }
        if let Some(value) = read_env("PRICELOG_SHEETS_WORKSHEET") {
            self.sheets.worksheet = Some(value);
        }
        if let Some(value) = read_env("PRICELOG_SHEETS_API_BASE") {
            self.sheets.api_base = value;
        }

        if let Some(value) = read_env("PRICELOG_VIEW_ENTRIES_PER_PAGE") {
            self.view.entries_per_page = parse_usize("PRICELOG_VIEW_ENTRIES_PER_PAGE", &value)?;
        }

        let log_level =
            read_env("PRICELOG_LOGGING_LEVEL").or_else(|| read_env("PRICELOG_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("PRICELOG_LOGGING_FORMAT").or_else(|| read_env("PRICELOG_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(telegram_bot_token) = overrides.telegram_bot_token {
            self.telegram.bot_token = secret_value(telegram_bot_token);
        }
        if let Some(sheets_spreadsheet_id) = overrides.sheets_spreadsheet_id {
            self.sheets.spreadsheet_id = sheets_spreadsheet_id;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_telegram(&self.telegram)?;
        validate_sheets(&self.sheets)?;
        validate_view(&self.view)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("pricelog.toml"), PathBuf::from("config/pricelog.toml")]
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
    let bot_token = telegram.bot_token.expose_secret();
    if bot_token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "telegram.bot_token is required. Get it from @BotFather".to_string(),
        ));
    }
    if !bot_token.contains(':') {
        return Err(ConfigError::Validation(
            "telegram.bot_token does not look like a bot token (expected `<id>:<secret>`)"
                .to_string(),
        ));
    }

    if !telegram.api_base.starts_with("http://") && !telegram.api_base.starts_with("https://") {
        return Err(ConfigError::Validation(
            "telegram.api_base must start with http:// or https://".to_string(),
        ));
    }

    if telegram.poll_timeout_secs == 0 || telegram.poll_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "telegram.poll_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_sheets(sheets: &SheetsConfig) -> Result<(), ConfigError> {
    if sheets.spreadsheet_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "sheets.spreadsheet_id is required (the id segment of the spreadsheet URL)"
                .to_string(),
        ));
    }

    if !sheets.api_base.starts_with("http://") && !sheets.api_base.starts_with("https://") {
        return Err(ConfigError::Validation(
            "sheets.api_base must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_view(view: &ViewConfig) -> Result<(), ConfigError> {
    if view.entries_per_page == 0 || view.entries_per_page > 25 {
        return Err(ConfigError::Validation(
            "view.entries_per_page must be in range 1..=25".to_string(),
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

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    telegram: Option<TelegramPatch>,
    sheets: Option<SheetsPatch>,
    view: Option<ViewPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramPatch {
    bot_token: Option<String>,
    api_base: Option<String>,
    poll_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SheetsPatch {
    api_token: Option<String>,
    spreadsheet_id: Option<String>,
    worksheet: Option<String>,
    api_base: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ViewPatch {
    entries_per_page: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_PRICELOG_BOT_TOKEN", "12345:from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("pricelog.toml");
            fs::write(
                &path,
                r#"
[telegram]
bot_token = "${TEST_PRICELOG_BOT_TOKEN}"

[sheets]
spreadsheet_id = "sheet-1"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.telegram.bot_token.expose_secret() == "12345:from-env",
                "bot token should be loaded from environment",
            )?;
            ensure(config.sheets.spreadsheet_id == "sheet-1", "spreadsheet id should be set")?;
            Ok(())
        })();

        clear_vars(&["TEST_PRICELOG_BOT_TOKEN"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PRICELOG_TELEGRAM_BOT_TOKEN", "12345:test");
        env::set_var("PRICELOG_SHEETS_SPREADSHEET_ID", "sheet-1");
        env::set_var("PRICELOG_LOG_LEVEL", "warn");
        env::set_var("PRICELOG_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&[
            "PRICELOG_TELEGRAM_BOT_TOKEN",
            "PRICELOG_SHEETS_SPREADSHEET_ID",
            "PRICELOG_LOG_LEVEL",
            "PRICELOG_LOG_FORMAT",
        ]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PRICELOG_TELEGRAM_BOT_TOKEN", "12345:from-env");
        env::set_var("PRICELOG_SHEETS_SPREADSHEET_ID", "sheet-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("pricelog.toml");
            fs::write(
                &path,
                r#"
[telegram]
bot_token = "12345:from-file"

[sheets]
spreadsheet_id = "sheet-from-file"

[view]
entries_per_page = 10

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    sheets_spreadsheet_id: Some("sheet-from-override".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.sheets.spreadsheet_id == "sheet-from-override",
                "override spreadsheet id should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.telegram.bot_token.expose_secret() == "12345:from-env",
                "env bot token should win over file and defaults",
            )?;
            ensure(config.view.entries_per_page == 10, "file page size should apply")?;
            Ok(())
        })();

        clear_vars(&["PRICELOG_TELEGRAM_BOT_TOKEN", "PRICELOG_SHEETS_SPREADSHEET_ID"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PRICELOG_TELEGRAM_BOT_TOKEN", "not-a-token");
        env::set_var("PRICELOG_SHEETS_SPREADSHEET_ID", "sheet-1");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("telegram.bot_token")
            );
            ensure(has_message, "validation failure should mention telegram.bot_token")
        })();

        clear_vars(&["PRICELOG_TELEGRAM_BOT_TOKEN", "PRICELOG_SHEETS_SPREADSHEET_ID"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("PRICELOG_TELEGRAM_BOT_TOKEN", "12345:secret-value");
        env::set_var("PRICELOG_SHEETS_SPREADSHEET_ID", "sheet-1");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("secret-value"), "debug output should not contain bot token")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["PRICELOG_TELEGRAM_BOT_TOKEN", "PRICELOG_SHEETS_SPREADSHEET_ID"]);
        result
    }
}
