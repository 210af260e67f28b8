//! Prometheus Metrics Definitions
//!
//! One plain `Gauge` per UPS reading, all under the `ups_` namespace:
//!
//! - `ups_device_status_up` - 1 when the device reports "On Line"
//! - `ups_load_percent`, `ups_load_power_percent_va`, `ups_load_current_amps`
//! - `ups_runtime_remaining_minutes`, `ups_internal_temperature_celsius`
//! - `ups_input_voltage_vac`, `ups_output_voltage_vac`
//! - `ups_input_frequency_hz`, `ups_output_frequency_hz`
//! - `ups_battery_charge_percent`, `ups_battery_voltage_vdc`
//! - `ups_outlet_status` - 1 when outlet group 0 is on
//!
//! The gauge set is fixed at startup. A failed scrape writes zeros instead of
//! removing series, so the exposition never changes shape.

use crate::ups::{MetricMeta, Readings};
use anyhow::Context;
use prometheus::{Encoder, Gauge, Opts, Registry, TextEncoder};
use std::sync::{Arc, Mutex};

const NAMESPACE: &str = "ups";

/// Metrics collector for the UPS readings
#[derive(Clone)]
pub struct MetricsCollector {
    registry: Arc<Registry>,
    gauges: Arc<Vec<(&'static str, Gauge)>>,
    // Held while gauges are written and encoded so one response never mixes cycles
    render_lock: Arc<Mutex<()>>,
}

impl MetricsCollector {
    pub fn new(metas: &[MetricMeta]) -> anyhow::Result<Self> {
        let registry = Registry::new();
        let mut gauges = Vec::with_capacity(metas.len());

        for meta in metas {
            let gauge = Gauge::with_opts(Opts::new(meta.metric, meta.help).namespace(NAMESPACE))?;
            registry.register(Box::new(gauge.clone()))?;
            gauges.push((meta.name, gauge));
        }

        Ok(Self {
            registry: Arc::new(registry),
            gauges: Arc::new(gauges),
            render_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Write one cycle's readings into the gauges and render them in
    /// Prometheus text format
    pub fn render(&self, readings: &Readings) -> anyhow::Result<String> {
        let _guard = self
            .render_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("metrics render lock poisoned"))?;

        for reading in readings {
            let (_, gauge) = self
                .gauges
                .iter()
                .find(|(name, _)| *name == reading.name)
                .with_context(|| format!("Unknown reading {}", reading.name))?;
            gauge.set(reading.value);
        }

        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Current value of the gauge backing `name`
    pub fn get(&self, name: &str) -> Option<f64> {
        self.gauges
            .iter()
            .find(|(gauge_name, _)| *gauge_name == name)
            .map(|(_, gauge)| gauge.get())
    }
}
