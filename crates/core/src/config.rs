use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::parameter::PricingParameter;
use crate::pricing::{PricingCoefficients, PARAMETER_CODES};

pub const DEFAULT_CONFIG_FILE: &str = "tarif.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub pricing: PricingConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct UpstreamConfig {
    pub demande_base_url: String,
    pub itinerary_base_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PricingConfig {
    pub coefficients: PricingCoefficients,
    pub parameters: Vec<PricingParameter>,
}

impl PricingConfig {
    /// Scalar coefficients with active parameters applied on top.
    pub fn effective_coefficients(&self) -> PricingCoefficients {
        self.coefficients.clone().with_parameters(&self.parameters)
    }
}

#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub sweep_enabled: bool,
    pub sweep_interval_secs: u64,
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
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub server_port: Option<u16>,
    pub demande_base_url: Option<String>,
    pub itinerary_base_url: Option<String>,
    pub sweep_enabled: Option<bool>,
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
            database: DatabaseConfig {
                url: "sqlite://tarif.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            upstream: UpstreamConfig {
                demande_base_url: "http://localhost:8081/api/demandes".to_string(),
                itinerary_base_url: "http://localhost:8082/api/routes".to_string(),
                timeout_secs: 10,
            },
            pricing: PricingConfig {
                coefficients: PricingCoefficients::default(),
                parameters: Vec::new(),
            },
            scheduler: SchedulerConfig { sweep_enabled: true, sweep_interval_secs: 3600 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
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
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(upstream) = patch.upstream {
            if let Some(url) = upstream.demande_base_url {
                self.upstream.demande_base_url = url;
            }
            if let Some(url) = upstream.itinerary_base_url {
                self.upstream.itinerary_base_url = url;
            }
            if let Some(timeout_secs) = upstream.timeout_secs {
                self.upstream.timeout_secs = timeout_secs;
            }
        }

        if let Some(pricing) = patch.pricing {
            for (code, value) in pricing.scalars() {
                if let Some(slot) = self.pricing.coefficients.slot_mut(code) {
                    *slot = value;
                }
            }
            if let Some(currency) = pricing.currency {
                self.pricing.coefficients.currency = currency;
            }
            if let Some(parameters) = pricing.parameters {
                self.pricing.parameters = parameters;
            }
        }

        if let Some(scheduler) = patch.scheduler {
            if let Some(sweep_enabled) = scheduler.sweep_enabled {
                self.scheduler.sweep_enabled = sweep_enabled;
            }
            if let Some(sweep_interval_secs) = scheduler.sweep_interval_secs {
                self.scheduler.sweep_interval_secs = sweep_interval_secs;
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
        if let Some(value) = read_env("TARIF_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("TARIF_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("TARIF_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("TARIF_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("TARIF_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TARIF_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("TARIF_SERVER_PORT") {
            self.server.port = parse_u16("TARIF_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("TARIF_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("TARIF_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("TARIF_UPSTREAM_DEMANDE_BASE_URL") {
            self.upstream.demande_base_url = value;
        }
        if let Some(value) = read_env("TARIF_UPSTREAM_ITINERARY_BASE_URL") {
            self.upstream.itinerary_base_url = value;
        }
        if let Some(value) = read_env("TARIF_UPSTREAM_TIMEOUT_SECS") {
            self.upstream.timeout_secs = parse_u64("TARIF_UPSTREAM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TARIF_PRICING_CURRENCY") {
            self.pricing.coefficients.currency = value;
        }
        for code in PARAMETER_CODES {
            let key = format!("TARIF_PRICING_{}", code.to_ascii_uppercase());
            if let Some(value) = read_env(&key) {
                let parsed = parse_decimal(&key, &value)?;
                if let Some(slot) = self.pricing.coefficients.slot_mut(code) {
                    *slot = parsed;
                }
            }
        }

        if let Some(value) = read_env("TARIF_SCHEDULER_SWEEP_ENABLED") {
            self.scheduler.sweep_enabled = parse_bool("TARIF_SCHEDULER_SWEEP_ENABLED", &value)?;
        }
        if let Some(value) = read_env("TARIF_SCHEDULER_SWEEP_INTERVAL_SECS") {
            self.scheduler.sweep_interval_secs =
                parse_u64("TARIF_SCHEDULER_SWEEP_INTERVAL_SECS", &value)?;
        }

        let log_level = read_env("TARIF_LOGGING_LEVEL").or_else(|| read_env("TARIF_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format = read_env("TARIF_LOGGING_FORMAT").or_else(|| read_env("TARIF_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(url) = overrides.demande_base_url {
            self.upstream.demande_base_url = url;
        }
        if let Some(url) = overrides.itinerary_base_url {
            self.upstream.itinerary_base_url = url;
        }
        if let Some(sweep_enabled) = overrides.sweep_enabled {
            self.scheduler.sweep_enabled = sweep_enabled;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_upstream(&self.upstream)?;
        validate_pricing(&self.pricing)?;
        validate_scheduler(&self.scheduler)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from("config").join(DEFAULT_CONFIG_FILE)]
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

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_upstream(upstream: &UpstreamConfig) -> Result<(), ConfigError> {
    for (key, url) in [
        ("upstream.demande_base_url", &upstream.demande_base_url),
        ("upstream.itinerary_base_url", &upstream.itinerary_base_url),
    ] {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "{key} must start with http:// or https:// (got `{url}`)"
            )));
        }
    }

    if upstream.timeout_secs == 0 || upstream.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "upstream.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    Ok(())
}

fn validate_pricing(pricing: &PricingConfig) -> Result<(), ConfigError> {
    if pricing.coefficients.currency.trim().is_empty() {
        return Err(ConfigError::Validation("pricing.currency must not be empty".to_string()));
    }

    for parameter in &pricing.parameters {
        if !PARAMETER_CODES.contains(&parameter.code.as_str()) {
            return Err(ConfigError::Validation(format!(
                "pricing.parameters code `{}` is unknown (expected one of {})",
                parameter.code,
                PARAMETER_CODES.join("|")
            )));
        }
    }

    let effective = pricing.effective_coefficients();
    let mut scalars = effective.clone();
    for code in PARAMETER_CODES {
        let Some(value) = scalars.slot_mut(code) else { continue };
        if value.is_sign_negative() && !value.is_zero() {
            return Err(ConfigError::Validation(format!(
                "pricing.{code} must not be negative (got {value})"
            )));
        }
    }

    if effective.provider_margin_fraction > Decimal::ONE {
        return Err(ConfigError::Validation(
            "pricing.provider_margin_fraction must be within 0..=1".to_string(),
        ));
    }

    Ok(())
}

fn validate_scheduler(scheduler: &SchedulerConfig) -> Result<(), ConfigError> {
    if scheduler.sweep_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "scheduler.sweep_interval_secs must be greater than zero".to_string(),
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

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| invalid_override(key, value))
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    value.trim().parse::<Decimal>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    upstream: Option<UpstreamPatch>,
    pricing: Option<PricingPatch>,
    scheduler: Option<SchedulerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct UpstreamPatch {
    demande_base_url: Option<String>,
    itinerary_base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PricingPatch {
    currency: Option<String>,
    base: Option<Decimal>,
    per_km: Option<Decimal>,
    per_kg: Option<Decimal>,
    per_m3: Option<Decimal>,
    fragile_multiplier: Option<Decimal>,
    national_road_multiplier: Option<Decimal>,
    highway_multiplier: Option<Decimal>,
    urban_multiplier: Option<Decimal>,
    mixed_multiplier: Option<Decimal>,
    provider_margin_fraction: Option<Decimal>,
    parameters: Option<Vec<PricingParameter>>,
}

impl PricingPatch {
    fn scalars(&self) -> Vec<(&'static str, Decimal)> {
        [
            ("base", self.base),
            ("per_km", self.per_km),
            ("per_kg", self.per_kg),
            ("per_m3", self.per_m3),
            ("fragile_multiplier", self.fragile_multiplier),
            ("national_road_multiplier", self.national_road_multiplier),
            ("highway_multiplier", self.highway_multiplier),
            ("urban_multiplier", self.urban_multiplier),
            ("mixed_multiplier", self.mixed_multiplier),
            ("provider_margin_fraction", self.provider_margin_fraction),
        ]
        .into_iter()
        .filter_map(|(code, value)| value.map(|value| (code, value)))
        .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
struct SchedulerPatch {
    sweep_enabled: Option<bool>,
    sweep_interval_secs: Option<u64>,
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

    use rust_decimal::Decimal;
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

    fn write_config(dir: &TempDir, body: &str) -> Result<std::path::PathBuf, String> {
        let path = dir.path().join("tarif.toml");
        fs::write(&path, body).map_err(|err| err.to_string())?;
        Ok(path)
    }

    #[test]
    fn defaults_match_reference_coefficients() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;
        let pricing = config.pricing.effective_coefficients();

        ensure(pricing.base == Decimal::from(500), "base defaults to 500")?;
        ensure(pricing.fragile_multiplier == Decimal::new(13, 1), "fragile defaults to 1.3")?;
        ensure(pricing.currency == "MAD", "currency defaults to MAD")?;
        ensure(config.upstream.timeout_secs == 10, "upstream timeout defaults to 10s")?;
        ensure(config.scheduler.sweep_interval_secs == 3600, "sweep runs hourly")?;
        ensure(matches!(config.logging.format, LogFormat::Compact), "compact logging by default")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_TARIF_DEMANDE_HOST", "demandes.internal");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = write_config(
                &dir,
                r#"
[upstream]
demande_base_url = "https://${TEST_TARIF_DEMANDE_HOST}/api/demandes"
"#,
            )?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.upstream.demande_base_url == "https://demandes.internal/api/demandes",
                "demande url should be interpolated from environment",
            )
        })();

        clear_vars(&["TEST_TARIF_DEMANDE_HOST"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TARIF_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("TARIF_PRICING_PER_KM", "12.5");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = write_config(
                &dir,
                r#"
[database]
url = "sqlite://from-file.db"

[pricing]
per_km = 11
per_kg = 6

[logging]
level = "warn"
"#,
            )?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.pricing.coefficients.per_km == Decimal::new(125, 1),
                "env per_km should win over file",
            )?;
            ensure(
                config.pricing.coefficients.per_kg == Decimal::from(6),
                "file per_kg should win over default",
            )
        })();

        clear_vars(&["TARIF_DATABASE_URL", "TARIF_PRICING_PER_KM"]);
        result
    }

    #[test]
    fn pricing_section_applies_currency_with_scalars() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = write_config(
            &dir,
            r#"
[pricing]
currency = "EUR"
per_km = 9
provider_margin_fraction = "0.3"

[[pricing.parameters]]
code = "per_kg"
label = "Weight rate"
kind = "per_kilogram"
value = "4"
active = true
"#,
        )?;

        let config =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                .map_err(|err| format!("config load failed: {err}"))?;
        let effective = config.pricing.effective_coefficients();

        ensure(effective.currency == "EUR", "currency comes from the file")?;
        ensure(effective.per_km == Decimal::from(9), "per_km comes from the file")?;
        ensure(
            effective.provider_margin_fraction == Decimal::new(3, 1),
            "margin fraction comes from the file",
        )?;
        ensure(effective.per_kg == Decimal::from(4), "active parameter applies alongside")
    }

    #[test]
    fn active_parameters_override_scalar_coefficients() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = write_config(
            &dir,
            r#"
[pricing]
base = 450

[[pricing.parameters]]
code = "base"
label = "Base fare"
kind = "flat"
value = "520"
active = true

[[pricing.parameters]]
code = "highway_multiplier"
label = "Highway surcharge"
kind = "multiplier"
value = "1.15"
active = false
"#,
        )?;

        let config =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                .map_err(|err| format!("config load failed: {err}"))?;
        let effective = config.pricing.effective_coefficients();

        ensure(effective.base == Decimal::from(520), "active parameter should replace base")?;
        ensure(effective.highway_multiplier == Decimal::ONE, "inactive parameter is ignored")
    }

    #[test]
    fn validation_rejects_margin_above_one() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TARIF_PRICING_PROVIDER_MARGIN_FRACTION", "1.5");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::Validation(ref message) if message.contains("provider_margin_fraction")
                ),
                "validation failure should name provider_margin_fraction",
            )
        })();

        clear_vars(&["TARIF_PRICING_PROVIDER_MARGIN_FRACTION"]);
        result
    }

    #[test]
    fn validation_rejects_negative_coefficient_and_unbounded_timeout() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TARIF_PRICING_PER_KG", "-1");
        let negative = AppConfig::load(LoadOptions::default());
        clear_vars(&["TARIF_PRICING_PER_KG"]);
        ensure(
            matches!(negative, Err(ConfigError::Validation(ref message)) if message.contains("per_kg")),
            "negative per_kg should be rejected",
        )?;

        env::set_var("TARIF_UPSTREAM_TIMEOUT_SECS", "0");
        let timeout = AppConfig::load(LoadOptions::default());
        clear_vars(&["TARIF_UPSTREAM_TIMEOUT_SECS"]);
        ensure(
            matches!(timeout, Err(ConfigError::Validation(ref message)) if message.contains("timeout_secs")),
            "zero upstream timeout should be rejected",
        )
    }

    #[test]
    fn unknown_parameter_code_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = write_config(
            &dir,
            r#"
[[pricing.parameters]]
code = "fuel_surcharge"
label = "Fuel"
kind = "flat"
value = "10"
active = true
"#,
        )?;

        let result = AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() });
        ensure(
            matches!(result, Err(ConfigError::Validation(ref message)) if message.contains("fuel_surcharge")),
            "unknown parameter code should be reported",
        )
    }

    #[test]
    fn invalid_env_override_is_reported_with_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TARIF_SCHEDULER_SWEEP_ENABLED", "sometimes");
        let result = AppConfig::load(LoadOptions::default());
        clear_vars(&["TARIF_SCHEDULER_SWEEP_ENABLED"]);

        ensure(
            matches!(
                result,
                Err(ConfigError::InvalidEnvOverride { ref key, .. }) if key == "TARIF_SCHEDULER_SWEEP_ENABLED"
            ),
            "invalid boolean should name the variable",
        )
    }

    #[test]
    fn missing_required_file_fails() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let result = AppConfig::load(LoadOptions {
            config_path: Some(dir.path().join("absent.toml")),
            require_file: true,
            ..LoadOptions::default()
        });
        ensure(matches!(result, Err(ConfigError::MissingConfigFile(_))), "missing file is an error")
    }
}
