/// Clock of the fragment generator and of caption/metadata timestamps.
pub const MPEG_CLOCK_HZ: u32 = 90_000;

/// Container timestamps are milliseconds.
pub const CONTAINER_CLOCK_HZ: u32 = 1_000;

/// Scale a container (millisecond) timestamp into an output clock
pub fn scale_timestamp(ms: i64, timescale: u32) -> i64 {
    ms * i64::from(timescale / CONTAINER_CLOCK_HZ)
}

/// Seconds between a timestamp and a reference point, both in `timescale`
pub fn rebase_to_seconds(pts: i64, reference: i64, timescale: u32) -> f64 {
    (pts - reference) as f64 / f64::from(timescale)
}

/// Calculate time delta in milliseconds
pub fn time_delta_ms(start: i64, end: i64) -> i64 {
    end - start
}
