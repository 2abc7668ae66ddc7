use std::path::Path;
use std::sync::OnceLock;

use anyhow::Context;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{MetricExporter, SpanExporter};
use opentelemetry_sdk::{metrics::SdkMeterProvider, trace::SdkTracerProvider, Resource};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_opentelemetry::MetricsLayer;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::Layer;
use tracing_subscriber::{fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _, EnvFilter};

const SERVICE_NAME: &str = "vectoria";
const OTLP_ENDPOINT_VAR: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

fn get_resource() -> Resource {
    static RESOURCE: OnceLock<Resource> = OnceLock::new();
    RESOURCE
        .get_or_init(|| Resource::builder().with_service_name(SERVICE_NAME).build())
        .clone()
}

fn init_traces() -> anyhow::Result<SdkTracerProvider> {
    let exporter = SpanExporter::builder()
        .with_http()
        .build()
        .context("Failed to create trace exporter")?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(get_resource())
        .build())
}

fn init_metrics() -> anyhow::Result<SdkMeterProvider> {
    let exporter = MetricExporter::builder()
        .with_http()
        .build()
        .context("Failed to create metric exporter")?;

    Ok(SdkMeterProvider::builder()
        .with_periodic_exporter(exporter)
        .with_resource(get_resource())
        .build())
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

// Events from the exporter's own HTTP stack must not be fed back into OTel
fn otel_filter() -> anyhow::Result<EnvFilter> {
    let mut filter = default_filter();
    for directive in ["hyper=off", "opentelemetry=off", "h2=off", "reqwest=off"] {
        filter = filter.add_directive(directive.parse()?);
    }
    Ok(filter)
}

struct OtelProviders {
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
}

/// Install the global subscriber
///
/// Console output always goes to stderr. A daily rotated file is added
/// when `log_dir` is given, and OTLP trace and metric export when
/// `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
pub fn init_tracing_subscriber(log_dir: Option<&Path>) -> anyhow::Result<OtelGuard> {
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(default_filter());

    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create log directory {}", dir.display()))?;
            let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, "vectoria.log");
            Some(
                fmt::layer()
                    .with_writer(file_appender)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_filter(default_filter()),
            )
        }
        None => None,
    };

    let providers = if std::env::var_os(OTLP_ENDPOINT_VAR).is_some() {
        Some(OtelProviders {
            tracer_provider: init_traces()?,
            meter_provider: init_metrics()?,
        })
    } else {
        None
    };

    let (metrics_layer, trace_layer) = match &providers {
        Some(p) => (
            Some(MetricsLayer::new(p.meter_provider.clone()).with_filter(otel_filter()?)),
            Some(
                OpenTelemetryLayer::new(p.tracer_provider.tracer(SERVICE_NAME))
                    .with_filter(otel_filter()?),
            ),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .with(metrics_layer)
        .with(trace_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(OtelGuard { providers })
}

/// Flushes and shuts down the exporters when dropped
pub struct OtelGuard {
    providers: Option<OtelProviders>,
}

impl Drop for OtelGuard {
    fn drop(&mut self) {
        if let Some(providers) = self.providers.take() {
            if let Err(err) = providers.tracer_provider.shutdown() {
                eprintln!("{err:?}");
            }
            if let Err(err) = providers.meter_provider.shutdown() {
                eprintln!("{err:?}");
            }
        }
    }
}
