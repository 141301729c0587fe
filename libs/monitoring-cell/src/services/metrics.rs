use std::collections::BTreeMap;
use std::fmt::Write;
use std::time::Instant;

use tokio::sync::RwLock;
use tracing::debug;

use crate::models::RequestLabels;

pub const REQUEST_DURATION_METRIC: &str = "http_request_duration_seconds";

const BUCKET_COUNT: usize = 6;

/// Upper bounds, in seconds, of the request duration histogram.
pub const DURATION_BUCKETS: [f64; BUCKET_COUNT] = [0.1, 0.3, 0.5, 1.0, 1.5, 2.0];

#[derive(Debug, Clone, Default, PartialEq)]
struct DurationSeries {
    /// Cumulative: entry `i` counts observations `<= DURATION_BUCKETS[i]`.
    buckets: [u64; BUCKET_COUNT],
    sum: f64,
    count: u64,
}

impl DurationSeries {
    fn observe(&mut self, seconds: f64) {
        for (bound, bucket) in DURATION_BUCKETS.iter().zip(self.buckets.iter_mut()) {
            if seconds <= *bound {
                *bucket += 1;
            }
        }
        self.sum += seconds;
        self.count += 1;
    }
}

/// Per-route request duration histogram, rendered in the Prometheus text
/// exposition format.
#[derive(Debug)]
pub struct RequestMetricsService {
    series: RwLock<BTreeMap<RequestLabels, DurationSeries>>,
    start_time: Instant,
}

impl Default for RequestMetricsService {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestMetricsService {
    pub fn new() -> Self {
        Self {
            series: RwLock::new(BTreeMap::new()),
            start_time: Instant::now(),
        }
    }

    pub async fn record_request(&self, labels: RequestLabels, seconds: f64) {
        // a NaN would poison the sum
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        debug!("{} {} -> {} in {:.3}s", labels.method, labels.route, labels.status_code, seconds);

        let mut series = self.series.write().await;
        series.entry(labels).or_default().observe(seconds);
    }

    /// Number of requests recorded under `labels`.
    pub async fn request_count(&self, labels: &RequestLabels) -> u64 {
        self.series.read().await.get(labels).map(|s| s.count).unwrap_or(0)
    }

    pub async fn render_prometheus(&self) -> String {
        let series = self.series.read().await;
        let mut out = String::new();

        // writing into a String cannot fail
        let _ = writeln!(out, "# HELP process_uptime_seconds Seconds since the process started");
        let _ = writeln!(out, "# TYPE process_uptime_seconds gauge");
        let _ = writeln!(out, "process_uptime_seconds {}", self.start_time.elapsed().as_secs());

        let _ = writeln!(out, "# HELP {} Duration of HTTP requests in seconds", REQUEST_DURATION_METRIC);
        let _ = writeln!(out, "# TYPE {} histogram", REQUEST_DURATION_METRIC);

        for (labels, data) in series.iter() {
            let label_text = format!(
                "method=\"{}\",route=\"{}\",statusCode=\"{}\"",
                escape_label(&labels.method),
                escape_label(&labels.route),
                labels.status_code
            );

            for (bound, count) in DURATION_BUCKETS.iter().zip(data.buckets.iter()) {
                let _ = writeln!(
                    out,
                    "{}_bucket{{le=\"{}\",{}}} {}",
                    REQUEST_DURATION_METRIC, bound, label_text, count
                );
            }
            let _ = writeln!(
                out,
                "{}_bucket{{le=\"+Inf\",{}}} {}",
                REQUEST_DURATION_METRIC, label_text, data.count
            );
            let _ = writeln!(out, "{}_sum{{{}}} {}", REQUEST_DURATION_METRIC, label_text, data.sum);
            let _ = writeln!(out, "{}_count{{{}}} {}", REQUEST_DURATION_METRIC, label_text, data.count);
        }

        out
    }
}

fn escape_label(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}
