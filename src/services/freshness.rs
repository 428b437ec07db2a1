use time::{Duration, OffsetDateTime};

/// Whether a cached server list must be downloaded again.
///
/// Missing data is always stale. Otherwise the list is stale once it is
/// strictly older than `expiration_days`. A window reaching past the
/// representable date range never expires.
pub fn is_stale(
    last_updated: Option<OffsetDateTime>,
    now: OffsetDateTime,
    expiration_days: i64,
) -> bool {
    let Some(updated) = last_updated else {
        return true;
    };

    let cutoff = expiration_days
        .checked_mul(SECONDS_PER_DAY)
        .and_then(|secs| now.checked_sub(Duration::seconds(secs)));

    match cutoff {
        Some(cutoff) => cutoff > updated,
        None => false,
    }
}

const SECONDS_PER_DAY: i64 = 86_400;
