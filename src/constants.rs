//! Stable application-wide constants.
//!
//! Values here are structural invariants of the server list format, geometry
//! coefficients, and default fallbacks for env-var-based configuration.
//! Deployment-specific knobs live in [`Config`](crate::config::Config).

// --- Configuration defaults (used when env vars are absent) ---

/// Default SQLite database holding the cached server list and preferences.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:servers.db";
/// Days a downloaded server list stays usable. Overridden by
/// `SERVER_LIST_EXPIRATION_DAYS`.
pub const DEFAULT_EXPIRATION_DAYS: i64 = 5;
/// Timeout for downloading the server list. Overridden by
/// `SERVER_LIST_FETCH_TIMEOUT_SECS`.
pub const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 30;
/// Timeout for the custom server reachability check. Overridden by
/// `SERVER_CHECK_TIMEOUT_SECS`.
pub const DEFAULT_REACHABILITY_TIMEOUT_SECONDS: u64 = 10;

// --- Geographic matching ---

/// Margin (meters) by which a server's bounding box is grown before testing
/// whether the device location falls inside it.
pub const GEO_MATCH_TOLERANCE_METERS: f64 = 1000.0;
/// Approximate length of one degree of latitude, in meters.
pub const METERS_PER_DEGREE_LAT: f64 = 111_000.0;
/// Above this latitude the cos() longitude correction blows up; the latitude
/// margin is reused for longitude instead.
pub const POLAR_LATITUDE_CUTOFF: f64 = 85.0;

// --- Server list format ---

/// Literal in column 0 that marks a header row.
pub const SERVER_LIST_HEADER: &str = "Region";
/// Number of columns in every data row of the server list.
pub const SERVER_LIST_COLUMNS: usize = 8;

// --- Manual selection ---

/// Option shown first in the manual choice list; picking it asks for a URL.
pub const CUSTOM_SERVER_OPTION: &str = "Custom server";
