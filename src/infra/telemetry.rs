use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Environment variable holding a filter directive that overrides the
/// configured level, e.g. `INKPOST_LOG=inkpost::cache=debug`.
pub const LOG_FILTER_ENV: &str = "INKPOST_LOG";

/// Installs the engine's tracing subscriber and describes its metrics.
///
/// Events always go to stderr; stdout carries the CLI's JSON output.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .with_env_var(LOG_FILTER_ENV)
        .from_env_lossy();

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);
    let fmt_layer = match logging.format {
        LogFormat::Json => fmt_layer
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Compact => fmt_layer.compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install inkpost tracing subscriber: {err}"))
        })
}

/// Register descriptions for every counter the engine emits. Idempotent.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "inkpost_policy_denied_total",
            Unit::Count,
            "Policy denials, labelled by action and reason."
        );
        describe_counter!(
            "inkpost_reaction_toggle_total",
            Unit::Count,
            "Reaction toggles, labelled by input kind and resulting state."
        );
        describe_counter!(
            "inkpost_view_counted_total",
            Unit::Count,
            "Views that passed deduplication and were counted."
        );
        describe_counter!(
            "inkpost_view_suppressed_total",
            Unit::Count,
            "Views suppressed inside the dedup window."
        );
        describe_counter!(
            "inkpost_cache_hit_total",
            Unit::Count,
            "Cache reads served from a stored value."
        );
        describe_counter!(
            "inkpost_cache_miss_total",
            Unit::Count,
            "Cache reads that found nothing."
        );
        describe_counter!(
            "inkpost_cache_bypass_total",
            Unit::Count,
            "Cache operations skipped because the backend failed."
        );
        describe_counter!(
            "inkpost_cache_invalidated_keys_total",
            Unit::Count,
            "Cached values removed by tag invalidation."
        );
        describe_counter!(
            "inkpost_cache_evict_total",
            Unit::Count,
            "Cached values evicted due to capacity."
        );
    });
}
