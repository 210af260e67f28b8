//! Status Page Field Extraction
//!
//! The UPS status page renders every reading as text inside an element with a
//! well-known id. This module holds the fixed catalog of those elements and the
//! rules that turn their text into numbers.
//!
//! # Extraction Rules
//!
//! 1. Missing element: the field's `false_value`
//! 2. Temperature fields (`"23.4°C / 74.1°F"`): first `/` segment, `°C` removed
//! 3. Otherwise the configured suffix is stripped
//! 4. Numeric text is returned as-is
//! 5. Status words fall back to `true_value` when the raw text contains `On`

use scraper::{Html, Selector};
use tracing::debug;

/// Number of readings exposed per collection cycle
pub const FIELD_COUNT: usize = 13;

const CELSIUS_SUFFIX: &str = "°C";
const ON_LINE: &str = "On Line";
const ON: &str = "On";

/// How to locate and interpret one reading on the status page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    /// Exported gauge name without the `ups_` namespace
    pub metric: &'static str,
    pub help: &'static str,
    pub selector: &'static str,
    pub strip_suffix: &'static str,
    pub true_value: f64,
    pub false_value: f64,
    pub is_temperature: bool,
}

impl FieldSpec {
    const fn numeric(name: &'static str, help: &'static str, selector: &'static str) -> Self {
        Self {
            name,
            metric: name,
            help,
            selector,
            strip_suffix: "",
            true_value: 0.0,
            false_value: 0.0,
            is_temperature: false,
        }
    }

    const fn status(
        name: &'static str,
        help: &'static str,
        selector: &'static str,
        strip_suffix: &'static str,
    ) -> Self {
        Self {
            name,
            metric: name,
            help,
            selector,
            strip_suffix,
            true_value: 1.0,
            false_value: 0.0,
            is_temperature: false,
        }
    }

    const fn temperature(name: &'static str, help: &'static str, selector: &'static str) -> Self {
        Self {
            is_temperature: true,
            ..Self::numeric(name, help, selector)
        }
    }

    const fn exported_as(self, metric: &'static str) -> Self {
        Self { metric, ..self }
    }
}

/// Every reading the exporter publishes, in exposition order
pub static FIELDS: [FieldSpec; FIELD_COUNT] = [
    FieldSpec::status(
        "device_status",
        "Device status (1=Online, 0=Other).",
        "#value_DeviceStatus",
        "",
    )
    .exported_as("device_status_up"),
    FieldSpec::numeric(
        "load_percent",
        "Current UPS load in percent.",
        "#value_RealPowerPct",
    ),
    FieldSpec::numeric(
        "runtime_remaining_minutes",
        "Estimated runtime remaining in minutes.",
        "#value_RuntimeRemaining",
    ),
    FieldSpec::temperature(
        "internal_temperature_celsius",
        "Internal temperature in Celsius.",
        "#value_InternalTemp",
    ),
    FieldSpec::numeric(
        "load_power_percent_va",
        "Load power in VA percent.",
        "#value_ApparentPowerPct",
    ),
    FieldSpec::numeric(
        "load_current_amps",
        "Load current in Amps.",
        "#value_LoadCurrent",
    ),
    FieldSpec::numeric(
        "input_voltage_vac",
        "Input voltage in VAC.",
        "#value_InputVoltage",
    ),
    FieldSpec::numeric(
        "output_voltage_vac",
        "Output voltage in VAC.",
        "#value_OutputVoltage",
    ),
    FieldSpec::numeric(
        "input_frequency_hz",
        "Input frequency in Hz.",
        "#value_InputFrequency",
    ),
    FieldSpec::numeric(
        "output_frequency_hz",
        "Output frequency in Hz.",
        "#value_OutputFrequency",
    ),
    FieldSpec::numeric(
        "battery_charge_percent",
        "Battery charge in percent.",
        "#value_BatteryCharge",
    ),
    FieldSpec::numeric(
        "battery_voltage_vdc",
        "Battery voltage in VDC.",
        "#value_VoltageDC",
    ),
    FieldSpec::status(
        "outlet_status",
        "UPS outlet status (1=On, 0=Off).",
        "#status0",
        "On",
    ),
];

/// Reading name, exported gauge name and help text of an exposed reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricMeta {
    pub name: &'static str,
    pub metric: &'static str,
    pub help: &'static str,
}

/// A single named value produced by one collection cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub name: &'static str,
    pub value: f64,
}

/// The complete reading set of one cycle; never partial
pub type Readings = [Reading; FIELD_COUNT];

/// Descriptors for every reading in [`FIELDS`]
pub fn metric_metas() -> Vec<MetricMeta> {
    FIELDS
        .iter()
        .map(|field| MetricMeta {
            name: field.name,
            metric: field.metric,
            help: field.help,
        })
        .collect()
}

/// The degraded-mode reading set: every name present, every value zero.
pub fn zero_readings() -> Readings {
    std::array::from_fn(|i| Reading {
        name: FIELDS[i].name,
        value: 0.0,
    })
}

/// Extract all readings from a parsed status page.
pub fn extract_all(document: &Html) -> Readings {
    std::array::from_fn(|i| Reading {
        name: FIELDS[i].name,
        value: extract(document, &FIELDS[i]),
    })
}

/// Extract a single reading. Never fails: anything unreadable maps to
/// `spec.false_value` (or `spec.true_value` for "On" status words).
pub fn extract(document: &Html, spec: &FieldSpec) -> f64 {
    let selector = match Selector::parse(spec.selector) {
        Ok(selector) => selector,
        Err(e) => {
            debug!("Invalid selector {} for {}: {}", spec.selector, spec.name, e);
            return spec.false_value;
        }
    };

    let Some(element) = document.select(&selector).next() else {
        debug!("Element {} not found for {}", spec.selector, spec.name);
        return spec.false_value;
    };

    let raw: String = element.text().collect();
    interpret(&raw, spec)
}

/// Apply the text rules of [`extract`] to an element's raw text content.
pub fn interpret(raw: &str, spec: &FieldSpec) -> f64 {
    let text = raw.trim();

    let text = if spec.is_temperature {
        // "23.4°C / 74.1°F": only the first measurement is exposed
        let first = text.split('/').next().unwrap_or_default().trim();
        first
            .strip_suffix(CELSIUS_SUFFIX)
            .unwrap_or(first)
            .trim()
    } else if !spec.strip_suffix.is_empty() {
        text.strip_suffix(spec.strip_suffix).unwrap_or(text).trim()
    } else {
        text
    };

    if let Ok(value) = text.parse::<f64>() {
        return value;
    }

    // Status words are matched against the untouched text
    if raw.contains(ON_LINE) || raw.contains(ON) {
        spec.true_value
    } else {
        spec.false_value
    }
}
