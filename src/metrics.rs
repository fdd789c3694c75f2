use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Histogram, IntGauge, register_counter, register_counter_vec,
    register_histogram, register_int_gauge,
};


lazy_static! {
    pub static ref SUBMISSIONS_TOTAL: Counter =
        register_counter!("booking_submissions_total", "Total booking submissions received").unwrap();
    pub static ref THROTTLED_TOTAL: CounterVec = register_counter_vec!(
        "booking_throttled_total",
        "Submissions rejected by a rate limit rule",
        &["rule"]
    )
    .unwrap();
    pub static ref FORWARDED_TOTAL: CounterVec = register_counter_vec!(
        "booking_forwarded_total",
        "Submissions accepted by the webhook",
        &["outcome"]
    )
    .unwrap();
    pub static ref FORWARD_FAILURES_TOTAL: Counter =
        register_counter!("booking_forward_failures_total", "Submissions the webhook did not accept").unwrap();
    pub static ref FORWARD_LATENCY: Histogram = register_histogram!(
        "booking_forward_latency_seconds",
        "Webhook call latency in seconds"
    )
    .unwrap();
    pub static ref LEDGER_KEYS: IntGauge =
        register_int_gauge!("booking_ledger_keys", "Keys tracked by the rate limit ledger").unwrap();
}
