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

pub const METRIC_LAYER_UPDATES_TOTAL: &str = "psdtext_layer_updates_total";
pub const METRIC_PROCESS_MS: &str = "psdtext_process_ms";
pub const METRIC_UPLOADS_TOTAL: &str = "psdtext_uploads_total";
pub const METRIC_UPLOAD_BYTES: &str = "psdtext_upload_bytes";

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
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
            METRIC_LAYER_UPDATES_TOTAL,
            Unit::Count,
            "Text layer updates by result (updated, failed)."
        );
        describe_histogram!(
            METRIC_PROCESS_MS,
            Unit::Milliseconds,
            "Editor session latency per request in milliseconds."
        );
        describe_counter!(
            METRIC_UPLOADS_TOTAL,
            Unit::Count,
            "Render uploads by result (ok, error)."
        );
        describe_histogram!(
            METRIC_UPLOAD_BYTES,
            Unit::Bytes,
            "Size of uploaded renders in bytes."
        );
    });
}
