//! Thin wrappers over the `metrics` facade. Without an installed recorder the
//! calls are no-ops, which is what tests and the default binary rely on.

pub type Labels = Vec<(&'static str, String)>;

pub fn record_counter(name: &'static str, value: u64, labels: &Labels) {
    ::metrics::counter!(name, labels).increment(value);
}

pub fn record_histogram(name: &'static str, value: f64, labels: &Labels) {
    ::metrics::histogram!(name, labels).record(value);
}
