//! Metric collector that turns gateway snapshots into Prometheus samples.

use std::io::Write;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::device::SnapshotSource;
use crate::mapping::{DESCRIPTORS, MetricDescriptor, scan_float};

/// One value emitted during a scrape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub descriptor: &'static MetricDescriptor,
    pub value: f64,
}

/// Collector for a single gateway.
///
/// Holds no state between scrapes: every [`collect`](Self::collect) polls
/// the device again.
pub struct MeterCollector<S> {
    source: S,
}

impl<S: SnapshotSource> MeterCollector<S> {
    /// Create a new collector reading from `source`.
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// The snapshot source backing this collector.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Metadata of every series this collector emits.
    pub fn describe(&self) -> &'static [MetricDescriptor] {
        &DESCRIPTORS
    }

    /// Poll the device once and convert the reading into samples.
    ///
    /// Always yields one sample per descriptor; values that cannot be read
    /// are reported as `0.0`.
    pub async fn collect(&self) -> Vec<Sample> {
        let snapshot = self.source.fetch().await;

        DESCRIPTORS
            .iter()
            .map(|descriptor| {
                let raw = descriptor.field.read(&snapshot);
                let value = match scan_float(raw) {
                    Some(v) => v,
                    None => {
                        if !raw.is_empty() {
                            debug!(
                                field = descriptor.field.key(),
                                raw,
                                "Unparsable value, reporting 0"
                            );
                        }
                        0.0
                    }
                };
                Sample { descriptor, value }
            })
            .collect()
    }

    /// Poll the device and render the result in Prometheus exposition format.
    pub async fn render(&self) -> String {
        let samples = self.collect().await;
        trace!(samples = samples.len(), "Collected samples");
        encode_samples(&samples)
    }
}

/// Create a shareable collector handle.
pub type SharedCollector<S> = Arc<MeterCollector<S>>;

/// Encode samples in Prometheus text exposition format.
pub fn encode_samples(samples: &[Sample]) -> String {
    let mut output = Vec::with_capacity(samples.len() * 100);

    for sample in samples {
        let descriptor = sample.descriptor;
        writeln!(
            output,
            "# HELP {} {}",
            descriptor.name,
            escape_help(descriptor.help)
        )
        .ok();
        writeln!(output, "# TYPE {} {}", descriptor.name, descriptor.kind.as_str()).ok();
        writeln!(output, "{} {}", descriptor.name, format_value(sample.value)).ok();
    }

    String::from_utf8(output).unwrap_or_default()
}

/// Escape special characters in HELP text.
fn escape_help(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Format a floating point value for Prometheus.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Snapshot;
    use crate::mapping::MetricKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Source returning a fixed snapshot and counting polls.
    struct StaticSource {
        snapshot: Snapshot,
        polls: AtomicUsize,
    }

    impl StaticSource {
        fn new(snapshot: Snapshot) -> Self {
            Self {
                snapshot,
                polls: AtomicUsize::new(0),
            }
        }
    }

    impl SnapshotSource for StaticSource {
        async fn fetch(&self) -> Snapshot {
            self.polls.fetch_add(1, Ordering::SeqCst);
            self.snapshot.clone()
        }
    }

    fn reference_snapshot() -> Snapshot {
        Snapshot {
            heat_energy: "12.5".into(),
            temp1: "45.0".into(),
            temp2: "30.0".into(),
            tempdiff: "15.0".into(),
            flow: "2.3".into(),
            volume: "987.6".into(),
        }
    }

    fn values(samples: &[Sample]) -> Vec<(&'static str, MetricKind, f64)> {
        samples
            .iter()
            .map(|s| (s.descriptor.name, s.descriptor.kind, s.value))
            .collect()
    }

    #[tokio::test]
    async fn test_collect_reference_snapshot() {
        let collector = MeterCollector::new(StaticSource::new(reference_snapshot()));
        let samples = collector.collect().await;

        assert_eq!(
            values(&samples),
            vec![
                ("kamstir_gj_total", MetricKind::Counter, 12.5),
                ("kamstir_temp1_c_current", MetricKind::Gauge, 45.0),
                ("kamstir_temp2_c_current", MetricKind::Gauge, 30.0),
                ("kamstir_tempdiff_c_current", MetricKind::Gauge, 15.0),
                ("kamstir_flow_m3h_current", MetricKind::Gauge, 2.3),
                ("kamstir_volume_m3_total", MetricKind::Counter, 987.6),
            ]
        );
    }

    #[tokio::test]
    async fn test_collect_empty_snapshot_reports_zeros() {
        let collector = MeterCollector::new(StaticSource::new(Snapshot::default()));
        let samples = collector.collect().await;

        assert_eq!(samples.len(), 6);
        assert!(samples.iter().all(|s| s.value == 0.0));
    }

    #[tokio::test]
    async fn test_collect_unparsable_field() {
        let snapshot = Snapshot {
            temp1: "n/a".into(),
            ..reference_snapshot()
        };
        let collector = MeterCollector::new(StaticSource::new(snapshot));
        let samples = collector.collect().await;

        assert_eq!(samples.len(), 6);
        assert_eq!(samples[1].descriptor.name, "kamstir_temp1_c_current");
        assert_eq!(samples[1].value, 0.0);
        assert_eq!(samples[0].value, 12.5);
    }

    #[tokio::test]
    async fn test_collect_polls_every_time() {
        let collector = MeterCollector::new(StaticSource::new(reference_snapshot()));

        collector.collect().await;
        collector.collect().await;
        collector.render().await;

        assert_eq!(collector.source().polls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_describe_matches_collect_order() {
        let collector = MeterCollector::new(StaticSource::new(Snapshot::default()));
        let names: Vec<_> = collector.describe().iter().map(|d| d.name).collect();

        assert_eq!(names.len(), 6);
        assert_eq!(names[0], "kamstir_gj_total");
        assert_eq!(names[5], "kamstir_volume_m3_total");
    }

    #[tokio::test]
    async fn test_render() {
        let collector = MeterCollector::new(StaticSource::new(reference_snapshot()));
        let output = collector.render().await;

        assert!(output.contains("# HELP kamstir_gj_total Total GJ consumed.\n"));
        assert!(output.contains("# TYPE kamstir_gj_total counter\n"));
        assert!(output.contains("kamstir_gj_total 12.5\n"));
        assert!(output.contains("# TYPE kamstir_flow_m3h_current gauge\n"));
        assert!(output.contains("kamstir_temp1_c_current 45\n"));
        assert!(output.contains("kamstir_volume_m3_total 987.6\n"));

        let value_lines = output.lines().filter(|l| !l.starts_with('#')).count();
        assert_eq!(value_lines, 6);
    }

    #[test]
    fn test_escape_help() {
        assert_eq!(escape_help("simple"), "simple");
        assert_eq!(escape_help("with\\backslash"), "with\\\\backslash");
        assert_eq!(escape_help("with\nnewline"), "with\\nnewline");
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(42.0), "42");
        assert_eq!(format_value(0.0), "0");
        assert_eq!(format_value(3.14), "3.14");
        assert_eq!(format_value(f64::NAN), "NaN");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
    }
}
