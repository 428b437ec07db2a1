use crate::models::{Coordinates, ServerRecord};

/// Find the first server whose service area, grown by `tolerance_meters`,
/// contains `location`.
///
/// Candidates are scanned in order and the first hit wins, so overlapping
/// areas resolve to the earlier entry. Servers without bounds never match.
pub fn find_server<'a>(
    location: Option<&Coordinates>,
    candidates: &'a [ServerRecord],
    tolerance_meters: f64,
) -> Option<&'a ServerRecord> {
    let location = location?;

    candidates.iter().find(|server| {
        server
            .bounds
            .map(|bounds| bounds.expanded_by_meters(tolerance_meters).contains(location))
            .unwrap_or(false)
    })
}
