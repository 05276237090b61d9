//! Logging setup and span helpers.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    #[default]
    Pretty,
}

/// Installs the global subscriber. `RUST_LOG` controls levels, `info` when unset.
/// Later calls are no-ops.
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let result = match format {
            LogFormat::Json => tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .try_init(),
            LogFormat::Pretty => tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .try_init(),
        };
        if let Err(e) = result {
            eprintln!("tallydex: a global subscriber is already installed: {}", e);
        }
    });
}

pub fn ingest_span(run_id: &str, user_id: u64, family: &str) -> Span {
    tracing::info_span!("ingest", run_id = run_id, user_id = user_id, family = family)
}

pub fn partition_span(run_id: &str, partition: &str) -> Span {
    tracing::info_span!("partition", run_id = run_id, partition = partition)
}

pub fn migration_span(index: &str, template: &str, from: u32, to: u32) -> Span {
    tracing::info_span!("migration", index = index, template = template, from = from, to = to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_twice_is_harmless() {
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Json);
    }

    #[test]
    fn spans_can_be_entered() {
        let span = migration_span("000042-ec2-reports", "ec2-reports", 3, 5);
        let _guard = span.enter();
        tracing::info!("inside migration span");
    }
}
