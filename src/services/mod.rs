pub mod fetcher;
pub mod freshness;
pub mod geo_matcher;
pub mod reachability;
pub mod selector;
