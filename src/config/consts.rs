/// Default capacity of the ingestion-to-extraction queue
pub const DEFAULT_INGEST_QUEUE_CAPACITY: usize = 1000;
/// Default capacity of the commit queue
pub const DEFAULT_COMMIT_QUEUE_CAPACITY: usize = 1000;
/// Default capacity of the extraction-to-transformation queue
pub const DEFAULT_EXTRACT_QUEUE_CAPACITY: usize = 1000;
/// Default capacity of the transformation-to-output queue
pub const DEFAULT_OUTPUT_QUEUE_CAPACITY: usize = 1000;
/// Default number of extraction/transformation/output workers allowed in flight
pub const DEFAULT_MAX_CONCURRENT_WORKERS: usize = 10_000;
/// Default back-off after a poll that produced no record (milliseconds)
pub const DEFAULT_IDLE_POLL_INTERVAL_MS: u64 = 10;
/// Default number of idle records and envelopes each pool retains
pub const DEFAULT_POOL_CAPACITY: usize = 1024;
