use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::{
    application::convert::{METRIC_CONVERSIONS_TOTAL, METRIC_RENDER_MS, METRIC_SESSIONS_ACTIVE},
    config::{LogFormat, LoggingSettings},
    infra::http::METRIC_UPLOAD_REJECTED_TOTAL,
};

use super::error::InfraError;

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
            METRIC_CONVERSIONS_TOTAL,
            Unit::Count,
            "Total number of HTML to PDF conversions, labelled by outcome."
        );
        describe_histogram!(
            METRIC_RENDER_MS,
            Unit::Milliseconds,
            "Render session latency in milliseconds, launch to teardown."
        );
        describe_gauge!(
            METRIC_SESSIONS_ACTIVE,
            Unit::Count,
            "Browser sessions currently rendering."
        );
        describe_counter!(
            METRIC_UPLOAD_REJECTED_TOTAL,
            Unit::Count,
            "Total number of upload requests rejected before rendering, labelled by reason."
        );
    });
}
