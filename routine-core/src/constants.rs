/// Operations sent per bundled request
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Retries of a failed chunk after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 5;

pub const DEFAULT_TIMEZONE: &str = "Europe/London";

/// Google's alias for the user's main calendar
pub const DEFAULT_CALENDAR_ID: &str = "primary";

/// Span given to an entry whose end can't be inferred from the next row
pub const DEFAULT_SPAN_MINUTES: i64 = 30;

/// First backoff interval; doubles on every retry
pub const BACKOFF_BASE_MILLIS: u64 = 1500;

/// HTTP statuses treated as rate limiting or temporary server trouble
pub const TRANSIENT_STATUSES: [u16; 4] = [403, 429, 500, 503];

/// Quiet period after a file notification before re-syncing
pub const WATCH_DEBOUNCE_MS: u64 = 500;
