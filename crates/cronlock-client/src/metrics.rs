// Lock lifecycle metrics
// Published through the `metrics` facade; a recorder must be installed by
// the host application for values to be exported.

use metrics::{counter, describe_counter, describe_gauge, gauge};

/// Describe all lock metrics. Call once at startup, after installing a recorder.
pub fn init_metrics() {
    describe_counter!("cronlock_acquire_total", "Total number of locks acquired");
    describe_counter!(
        "cronlock_acquire_failed_total",
        "Total number of lock acquisitions that failed"
    );
    describe_counter!(
        "cronlock_extend_total",
        "Total number of successful lock extensions"
    );
    describe_counter!(
        "cronlock_extend_failed_total",
        "Total number of lock extensions that failed and stopped renewal"
    );
    describe_counter!("cronlock_release_total", "Total number of locks released");
    describe_counter!(
        "cronlock_release_failed_total",
        "Total number of releases that failed or found the lock lost"
    );
    describe_gauge!("cronlock_locks_held", "Number of lock handles currently held");

    tracing::info!("Lock metrics initialized");
}

pub(crate) fn record_acquire(key: &str, success: bool) {
    if success {
        counter!("cronlock_acquire_total", "key" => key.to_string()).increment(1);
        gauge!("cronlock_locks_held").increment(1.0);
    } else {
        counter!("cronlock_acquire_failed_total", "key" => key.to_string()).increment(1);
    }
}

pub(crate) fn record_extend(key: &str, success: bool) {
    if success {
        counter!("cronlock_extend_total", "key" => key.to_string()).increment(1);
    } else {
        counter!("cronlock_extend_failed_total", "key" => key.to_string()).increment(1);
    }
}

pub(crate) fn record_release(key: &str, success: bool) {
    if success {
        counter!("cronlock_release_total", "key" => key.to_string()).increment(1);
    } else {
        counter!("cronlock_release_failed_total", "key" => key.to_string()).increment(1);
    }
}

/// A held handle went away, through release or drop.
pub(crate) fn record_handle_closed() {
    gauge!("cronlock_locks_held").decrement(1.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder() {
        init_metrics();
        record_acquire("job", true);
        record_acquire("job", false);
        record_extend("job", true);
        record_release("job", false);
        record_handle_closed();
    }
}
