//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    num::{NonZeroU64, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::domain::policy::PolicyAction;
use crate::domain::types::Role;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "inkpost";
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_CACHE_TAG_TTL_SECS: u64 = 3600;
const DEFAULT_CACHE_CAPACITY: u64 = 10_000;
const DEFAULT_VIEW_WINDOW_SECS: u64 = 3 * 60 * 60;
const DEFAULT_VIEW_CAPACITY: u64 = 100_000;

/// Command-line arguments for the inkpost binary.
#[derive(Debug, Parser)]
#[command(
    name = "inkpost",
    version,
    about = "Content authorization and reaction engine"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "INKPOST_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Evaluate one policy decision and print it as JSON.
    Authorize(AuthorizeArgs),
    /// Print the resolved settings.
    Settings(SettingsArgs),
}

#[derive(Debug, Args, Clone)]
pub struct AuthorizeArgs {
    #[command(flatten)]
    pub overrides: RuntimeOverrides,

    /// Action to evaluate (view|view-draft|update|delete|react|moderate-comment).
    #[arg(long, value_parser = parse_action)]
    pub action: PolicyAction,

    /// Role of the requester; omit for an anonymous request.
    #[arg(long = "actor-role", value_parser = parse_role)]
    pub actor_role: Option<Role>,

    /// The requester owns the target.
    #[arg(long = "actor-owns", action = clap::ArgAction::SetTrue)]
    pub actor_owns: bool,

    /// Role of the target's owner.
    #[arg(long = "owner-role", value_parser = parse_role)]
    pub owner_role: Option<Role>,

    /// Treat the target (or its article) as a draft.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub unpublished: bool,

    /// Evaluate against a comment instead of an article.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub comment: bool,

    /// Role of the article's owner when `--comment` is set.
    #[arg(long = "article-owner-role", value_parser = parse_role, requires = "comment")]
    pub article_owner_role: Option<Role>,

    /// The requester owns the comment's article.
    #[arg(long = "actor-owns-article", action = clap::ArgAction::SetTrue, requires = "comment")]
    pub actor_owns_article: bool,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SettingsArgs {
    #[command(flatten)]
    pub overrides: RuntimeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RuntimeOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Toggle the cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the default cache entry TTL.
    #[arg(long = "cache-default-ttl-seconds", value_name = "SECONDS")]
    pub cache_default_ttl_seconds: Option<u64>,

    /// Override the cache tag bookkeeping TTL.
    #[arg(long = "cache-tag-ttl-seconds", value_name = "SECONDS")]
    pub cache_tag_ttl_seconds: Option<u64>,

    /// Override the in-memory cache capacity.
    #[arg(long = "cache-capacity", value_name = "COUNT")]
    pub cache_capacity: Option<u64>,

    /// Override the view deduplication window.
    #[arg(long = "views-dedup-window-seconds", value_name = "SECONDS")]
    pub views_dedup_window_seconds: Option<u64>,

    /// Override the number of tracked viewer entries.
    #[arg(long = "views-capacity", value_name = "COUNT")]
    pub views_capacity: Option<u64>,
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub views: ViewSettings,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggingSettings {
    #[serde(serialize_with = "serialize_level")]
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheSettings {
    pub enabled: bool,
    pub default_ttl: Duration,
    pub tag_ttl: Duration,
    pub capacity: NonZeroUsize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewSettings {
    pub dedup_window: Duration,
    pub capacity: NonZeroUsize,
    #[serde(skip_serializing)]
    pub fingerprint_salt: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("INKPOST").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(cli.command.overrides());

    Settings::from_raw(raw)
}

impl Command {
    fn overrides(&self) -> &RuntimeOverrides {
        match self {
            Command::Authorize(args) => &args.overrides,
            Command::Settings(args) => &args.overrides,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    views: RawViewSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &RuntimeOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(seconds) = overrides.cache_default_ttl_seconds {
            self.cache.default_ttl_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.cache_tag_ttl_seconds {
            self.cache.tag_ttl_seconds = Some(seconds);
        }
        if let Some(capacity) = overrides.cache_capacity {
            self.cache.capacity = Some(capacity);
        }
        if let Some(seconds) = overrides.views_dedup_window_seconds {
            self.views.dedup_window_seconds = Some(seconds);
        }
        if let Some(capacity) = overrides.views_capacity {
            self.views.capacity = Some(capacity);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            cache,
            views,
        } = raw;

        let logging = build_logging_settings(logging)?;
        let cache = build_cache_settings(cache)?;
        let views = build_view_settings(views)?;

        Ok(Self {
            logging,
            cache,
            views,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let default_ttl = non_zero_u64(
        cache.default_ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS),
        "cache.default_ttl_seconds",
    )?;
    let tag_ttl = non_zero_u64(
        cache.tag_ttl_seconds.unwrap_or(DEFAULT_CACHE_TAG_TTL_SECS),
        "cache.tag_ttl_seconds",
    )?;
    let capacity = non_zero_usize(
        cache.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY),
        "cache.capacity",
    )?;

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        default_ttl: Duration::from_secs(default_ttl.get()),
        tag_ttl: Duration::from_secs(tag_ttl.get()),
        capacity,
    })
}

fn build_view_settings(views: RawViewSettings) -> Result<ViewSettings, LoadError> {
    let window = non_zero_u64(
        views.dedup_window_seconds.unwrap_or(DEFAULT_VIEW_WINDOW_SECS),
        "views.dedup_window_seconds",
    )?;
    let capacity = non_zero_usize(
        views.capacity.unwrap_or(DEFAULT_VIEW_CAPACITY),
        "views.capacity",
    )?;

    Ok(ViewSettings {
        dedup_window: Duration::from_secs(window.get()),
        capacity,
        fingerprint_salt: views.fingerprint_salt.unwrap_or_default(),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    default_ttl_seconds: Option<u64>,
    tag_ttl_seconds: Option<u64>,
    capacity: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawViewSettings {
    dedup_window_seconds: Option<u64>,
    capacity: Option<u64>,
    fingerprint_salt: Option<String>,
}

fn non_zero_u64(value: u64, key: &'static str) -> Result<NonZeroU64, LoadError> {
    NonZeroU64::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn parse_role(value: &str) -> Result<Role, String> {
    Role::from_str(value).map_err(|_| {
        format!("unknown role `{value}` (primary-admin|secondary-admin|member|simple-user)")
    })
}

fn parse_action(value: &str) -> Result<PolicyAction, String> {
    PolicyAction::from_str(value).map_err(|_| format!("unknown action `{value}`"))
}

fn serialize_level<S: serde::Serializer>(
    level: &LevelFilter,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(level)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
