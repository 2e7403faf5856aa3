/// Downstream statistics sink. Receives every recorded use.
pub trait IUsageRecorder: Send + Sync {
    fn record(&self, text: &str, test_type: &str, success: bool, difficulty: f64);
}

/// Notified after every cache lookup, outside the cache lock.
pub trait IAccessObserver: Send + Sync {
    fn on_lookup(&self, text: &str, hit: bool);
}
