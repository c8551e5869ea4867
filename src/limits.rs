/// Earliest year accepted for an appointment instant.
pub const MIN_VALID_YEAR: i32 = 1900;
/// Latest year accepted; keeps day-window arithmetic far from chrono's range.
pub const MAX_VALID_YEAR: i32 = 9999;

/// Longest single appointment.
pub const MAX_SPAN_DURATION_DAYS: i64 = 7;

/// Widest `[start, end)` accepted by range listings.
pub const MAX_QUERY_RANGE_DAYS: i64 = 366;

pub const MAX_PAGE_SIZE: usize = 1000;

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_DESCRIPTION_LEN: usize = 4096;
