//! Mapping from gateway snapshot fields to Prometheus series.

use crate::device::Snapshot;

/// Prometheus metric type of an exported series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

impl MetricKind {
    /// Get the TYPE comment string for Prometheus exposition format.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
        }
    }
}

/// A value reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterField {
    HeatEnergy,
    Temp1,
    Temp2,
    TempDiff,
    Flow,
    Volume,
}

impl MeterField {
    /// The JSON key of this field in the gateway response.
    pub fn key(&self) -> &'static str {
        match self {
            MeterField::HeatEnergy => "heat_energy",
            MeterField::Temp1 => "temp1",
            MeterField::Temp2 => "temp2",
            MeterField::TempDiff => "tempdiff",
            MeterField::Flow => "flow",
            MeterField::Volume => "volume",
        }
    }

    /// Read the raw string value of this field.
    pub fn read<'a>(&self, snapshot: &'a Snapshot) -> &'a str {
        match self {
            MeterField::HeatEnergy => &snapshot.heat_energy,
            MeterField::Temp1 => &snapshot.temp1,
            MeterField::Temp2 => &snapshot.temp2,
            MeterField::TempDiff => &snapshot.tempdiff,
            MeterField::Flow => &snapshot.flow,
            MeterField::Volume => &snapshot.volume,
        }
    }
}

/// Static metadata for one exported series.
#[derive(Debug, PartialEq, Eq)]
pub struct MetricDescriptor {
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
    pub field: MeterField,
}

/// Every series the exporter publishes, in exposition order.
pub static DESCRIPTORS: [MetricDescriptor; 6] = [
    MetricDescriptor {
        name: "kamstir_gj_total",
        help: "Total GJ consumed.",
        kind: MetricKind::Counter,
        field: MeterField::HeatEnergy,
    },
    MetricDescriptor {
        name: "kamstir_temp1_c_current",
        help: "Water temperature going in.",
        kind: MetricKind::Gauge,
        field: MeterField::Temp1,
    },
    MetricDescriptor {
        name: "kamstir_temp2_c_current",
        help: "Water temperature going out.",
        kind: MetricKind::Gauge,
        field: MeterField::Temp2,
    },
    MetricDescriptor {
        name: "kamstir_tempdiff_c_current",
        help: "Difference in temperature.",
        kind: MetricKind::Gauge,
        field: MeterField::TempDiff,
    },
    MetricDescriptor {
        name: "kamstir_flow_m3h_current",
        help: "Current water flow in m3.",
        kind: MetricKind::Gauge,
        field: MeterField::Flow,
    },
    MetricDescriptor {
        name: "kamstir_volume_m3_total",
        help: "Total water consumed in m3.",
        kind: MetricKind::Counter,
        field: MeterField::Volume,
    },
];

/// Scan a floating point number from the start of `value`.
///
/// Leading whitespace is skipped and anything after the numeric token is
/// ignored, so `"12.5 GJ"` scans as `12.5`. The token is read greedily
/// (sign, digits and `_`, fraction, exponent marker with optional sign and
/// digits) and must then parse as a whole: `"7e"`, `"1_000"` and values
/// overflowing to infinity yield `None`, as does input with no number.
pub fn scan_float(value: &str) -> Option<f64> {
    let value = value.trim_start();
    let bytes = value.as_bytes();
    let mut end = 0;

    let signed = matches!(bytes.first(), Some(b'+' | b'-'));
    if signed {
        end += 1;
    }

    // nan is only accepted unsigned, inf with or without a sign
    let rest = &bytes[end..];
    if starts_with_ignore_case(rest, "nan") {
        return if signed { None } else { Some(f64::NAN) };
    }
    if starts_with_ignore_case(rest, "inf") {
        return value[..end + 3].parse().ok();
    }

    let digits = |from: usize| {
        bytes[from..]
            .iter()
            .take_while(|b| b.is_ascii_digit() || **b == b'_')
            .count()
    };

    end += digits(end);
    if bytes.get(end) == Some(&b'.') {
        end += 1 + digits(end + 1);
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        end += 1;
        if matches!(bytes.get(end), Some(b'+' | b'-')) {
            end += 1;
        }
        end += digits(end);
    }

    let parsed: f64 = value[..end].parse().ok()?;
    if parsed.is_infinite() {
        return None;
    }
    Some(parsed)
}

fn starts_with_ignore_case(bytes: &[u8], word: &str) -> bool {
    bytes.len() >= word.len() && bytes[..word.len()].eq_ignore_ascii_case(word.as_bytes())
}
