//! Default `MetricsSink` implementation: emits `tracing` events instead of
//! talking to a concrete metrics backend (none is in scope).

use std::time::Instant;

use fleet_migrate_types::{Counter, Gauge, MetricsSink, Timer};
use tracing::info;

fn tags_string(tags: &[(&str, &str)]) -> String {
    tags.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(",")
}

struct TracingCounter {
    name: String,
    tags: String,
}

impl Counter for TracingCounter {
    fn count(&self) {
        info!(metric = %self.name, tags = %self.tags, "counter incremented");
    }
}

struct TracingTimer {
    name: String,
    tags: String,
    started_at: Option<Instant>,
}

impl Timer for TracingTimer {
    fn start(&mut self) {
        self.started_at = Some(Instant::now());
    }

    fn stop(&mut self) {
        match self.started_at.take() {
            Some(started_at) => {
                let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
                info!(metric = %self.name, tags = %self.tags, elapsed_ms, "timer stopped");
            }
            None => info!(metric = %self.name, tags = %self.tags, "timer stopped without a matching start"),
        }
    }
}

struct TracingGauge {
    name: String,
    tags: String,
}

impl Gauge for TracingGauge {
    fn set(&self, value: f64) {
        info!(metric = %self.name, tags = %self.tags, value, "gauge set");
    }
}

/// Logs every metric event through `tracing` rather than shipping it
/// anywhere; suitable as the default sink when no monitoring backend is
/// wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetricsSink;

impl MetricsSink for TracingMetricsSink {
    fn create_counter(&self, name: &str, tags: &[(&str, &str)]) -> Box<dyn Counter> {
        Box::new(TracingCounter { name: name.to_string(), tags: tags_string(tags) })
    }

    fn create_timer(&self, name: &str, tags: &[(&str, &str)]) -> Box<dyn Timer> {
        Box::new(TracingTimer { name: name.to_string(), tags: tags_string(tags), started_at: None })
    }

    fn create_gauge(&self, name: &str, tags: &[(&str, &str)]) -> Box<dyn Gauge> {
        Box::new(TracingGauge { name: name.to_string(), tags: tags_string(tags) })
    }
}
