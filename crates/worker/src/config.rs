use std::time::Duration;

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    /// Time between claim cycles (default: 1000 ms).
    pub poll_interval: Duration,
    /// Maximum tasks claimed per cycle (default: 10).
    pub batch_size: usize,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env var                   | Default |
    /// |---------------------------|---------|
    /// | `DATABASE_URL`            | required |
    /// | `WORKER_POLL_INTERVAL_MS` | `1000`  |
    /// | `WORKER_BATCH_SIZE`       | `10`    |
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let poll_interval_ms: u64 = std::env::var("WORKER_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .expect("WORKER_POLL_INTERVAL_MS must be a valid u64");

        let batch_size: usize = std::env::var("WORKER_BATCH_SIZE")
            .unwrap_or_else(|_| "10".into())
            .parse()
            .expect("WORKER_BATCH_SIZE must be a valid usize");
        assert!(batch_size > 0, "WORKER_BATCH_SIZE must be at least 1");

        Self {
            database_url,
            poll_interval: Duration::from_millis(poll_interval_ms),
            batch_size,
        }
    }
}
