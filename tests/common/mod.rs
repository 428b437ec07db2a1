use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use time::OffsetDateTime;
use transit_selector::config::SelectorConfig;
use transit_selector::db::SqliteServerStore;
use transit_selector::error::{AppError, Result};
use transit_selector::models::{BoundingBox, Coordinates, ServerRecord};
use transit_selector::services::fetcher::ServerListFetcher;
use transit_selector::services::reachability::ReachabilityChecker;
use transit_selector::ServerSelector;

pub const LIST_URL: &str = "http://lists.example.org/servers.csv";

/// In-memory SQLite store with the schema in place
#[allow(dead_code)]
pub async fn setup_test_store() -> Arc<SqliteServerStore> {
    transit_selector::telemetry::init_tracing("transit_selector=debug");

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory SQLite pool");
    SqliteServerStore::create_schema(&pool)
        .await
        .expect("Failed to create schema");
    Arc::new(SqliteServerStore::new(pool))
}

/// Create a test server record with corners `a` and `b`
#[allow(dead_code)]
pub fn create_test_server(
    region: &str,
    a: (f64, f64),
    b: (f64, f64),
    updated_at: OffsetDateTime,
) -> ServerRecord {
    let a = Coordinates::new(a.0, a.1).unwrap();
    let b = Coordinates::new(b.0, b.1).unwrap();
    let bounds = BoundingBox::from_corners(&a, &b);
    ServerRecord {
        id: None,
        region: region.to_string(),
        updated_at,
        center: Some(
            Coordinates::new(
                (bounds.min_lat + bounds.max_lat) / 2.0,
                (bounds.min_lng + bounds.max_lng) / 2.0,
            )
            .unwrap(),
        ),
        bounds: Some(bounds),
        base_url: format!("http://{}.example.org/otp", region.to_lowercase()),
    }
}

/// Tampa, Atlanta, Portland in that order
#[allow(dead_code)]
pub fn three_servers(updated_at: OffsetDateTime) -> Vec<ServerRecord> {
    vec![
        create_test_server("Tampa", (27.5, -82.9), (28.3, -82.1), updated_at),
        create_test_server("Atlanta", (33.4, -84.8), (34.2, -84.0), updated_at),
        create_test_server("Portland", (45.2, -123.2), (45.7, -122.3), updated_at),
    ]
}

#[allow(dead_code)]
pub fn inside_atlanta() -> Coordinates {
    Coordinates::new(33.75, -84.39).unwrap()
}

#[allow(dead_code)]
pub fn in_the_ocean() -> Coordinates {
    Coordinates::new(30.0, -40.0).unwrap()
}

#[allow(dead_code)]
pub fn now_millis() -> OffsetDateTime {
    transit_selector::services::fetcher::fetch_timestamp()
}

/// Fetcher returning a canned list (or failure) after an optional delay
pub struct FakeFetcher {
    response: std::result::Result<Vec<ServerRecord>, String>,
    delay: Duration,
    calls: AtomicUsize,
}

#[allow(dead_code)]
impl FakeFetcher {
    pub fn returning(servers: Vec<ServerRecord>) -> Self {
        FakeFetcher {
            response: Ok(servers),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        FakeFetcher {
            response: Err(message.to_string()),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServerListFetcher for FakeFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<ServerRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        // Stamp like a real download so the snapshot counts as fresh
        let fetched_at = now_millis();
        self.response
            .clone()
            .map(|servers| {
                servers
                    .into_iter()
                    .map(|s| ServerRecord {
                        updated_at: fetched_at,
                        ..s
                    })
                    .collect()
            })
            .map_err(AppError::FetchFailure)
    }
}

/// Reachability checker with a fixed answer
pub struct FakeChecker {
    reachable: bool,
    delay: Duration,
    checked: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl FakeChecker {
    pub fn new(reachable: bool) -> Self {
        FakeChecker {
            reachable,
            delay: Duration::ZERO,
            checked: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn checked(&self) -> Vec<String> {
        self.checked.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReachabilityChecker for FakeChecker {
    async fn check(&self, url: &str) -> bool {
        self.checked.lock().unwrap().push(url.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.reachable
    }
}

/// Selector wired to the given fakes
#[allow(dead_code)]
pub fn build_selector(
    store: Arc<SqliteServerStore>,
    fetcher: Arc<FakeFetcher>,
    checker: Arc<FakeChecker>,
) -> ServerSelector {
    ServerSelector::new(
        SelectorConfig::new(LIST_URL),
        store.clone(),
        store,
        fetcher,
        checker,
    )
}
