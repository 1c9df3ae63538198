/// Decimal precision used when persisting snapshot values
pub const DECIMAL_PRECISION: u32 = 6;

/// Decimal precision for published updates
pub const PUBLISH_DECIMAL_PRECISION: u32 = 2;

pub const MILLIS_PER_MINUTE: i64 = 60_000;

pub const MINUTES_PER_DAY: i64 = 1_440;

/// Width of the epoch-aligned windows compaction reads history in
pub const SCAN_WINDOW_MINUTES: i64 = MINUTES_PER_DAY;

/// Default per-account valuation timeout
pub const DEFAULT_VALUATION_TIMEOUT_MS: u64 = 5_000;

/// Default number of accounts captured in parallel within one run
pub const DEFAULT_CAPTURE_CONCURRENCY: usize = 16;

/// Default number of accounts compacted in parallel within one run
pub const DEFAULT_COMPACTION_CONCURRENCY: usize = 4;

/// Prefix of the per-account private channel that receives snapshot updates
pub const PRIVATE_CHANNEL_PREFIX: &str = "private-portfolio";
