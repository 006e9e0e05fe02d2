use metrics::{counter, histogram, Counter, Histogram};
use once_cell::sync::Lazy;

pub struct TrafficMetrics {
    pub exchanges_total: Counter,
    pub request_bytes_total: Counter,
    pub response_bytes_total: Counter,
    pub skipped_copies_total: Counter,
    pub failures_total: Counter,
    pub downstream_seconds: Histogram,
}

pub static TRAFFIC_METRICS: Lazy<TrafficMetrics> = Lazy::new(|| TrafficMetrics {
    exchanges_total: counter!("traffic_exchanges_total"),
    request_bytes_total: counter!("traffic_request_bytes_total"),
    response_bytes_total: counter!("traffic_response_bytes_total"),
    skipped_copies_total: counter!("traffic_skipped_copies_total"),
    failures_total: counter!("traffic_failures_total"),
    downstream_seconds: histogram!("traffic_downstream_seconds"),
});

pub fn record_exchange(request_bytes: usize, response_bytes: usize, downstream_seconds: f64) {
    TRAFFIC_METRICS.exchanges_total.increment(1);
    TRAFFIC_METRICS.request_bytes_total.increment(request_bytes as u64);
    TRAFFIC_METRICS.downstream_seconds.record(downstream_seconds);

    // Empty responses are passed through without a copy
    if response_bytes == 0 {
        TRAFFIC_METRICS.skipped_copies_total.increment(1);
    } else {
        TRAFFIC_METRICS.response_bytes_total.increment(response_bytes as u64);
    }
}
