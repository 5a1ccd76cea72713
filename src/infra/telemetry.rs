use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "catalog_cache_hit_total",
            Unit::Count,
            "Total number of resource cache reads that found an entry."
        );
        describe_counter!(
            "catalog_cache_miss_total",
            Unit::Count,
            "Total number of resource cache reads that found no entry."
        );
        describe_counter!(
            "catalog_cache_coalesced_total",
            Unit::Count,
            "Total number of fetches attached to an in-flight request for an equal key."
        );
        describe_counter!(
            "catalog_cache_evict_total",
            Unit::Count,
            "Total number of idle cache entries evicted due to capacity."
        );
        describe_counter!(
            "catalog_cache_invalidated_total",
            Unit::Count,
            "Total number of cache entries marked stale by tag invalidation."
        );
        describe_counter!(
            "catalog_fetch_total",
            Unit::Count,
            "Total number of catalog API fetches issued by the query executor."
        );
        describe_counter!(
            "catalog_fetch_error_total",
            Unit::Count,
            "Total number of catalog API fetches that settled with an error."
        );
        describe_histogram!(
            "catalog_fetch_ms",
            Unit::Milliseconds,
            "Catalog API fetch latency in milliseconds."
        );
        describe_counter!(
            "catalog_mutation_total",
            Unit::Count,
            "Total number of product writes dispatched, labelled by operation and outcome."
        );
    });
}
