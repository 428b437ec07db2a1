//! Server selection sessions.
//!
//! A [`ServerSelector`] owns the known-server snapshot and the collaborators
//! (store, preferences, fetcher, reachability checker). Each call to
//! [`ServerSelector::select`] starts a [`SelectionSession`] that either picks a
//! server from the device location right away or waits for the user to pick a
//! region or enter a custom server URL.
//!
//! Every session takes a generation number. Results that arrive after a newer
//! session has started (slow downloads, slow reachability checks) are dropped
//! instead of overwriting the newer session's snapshot or preferences.

use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::task::JoinHandle;

use crate::config::{Config, SelectorConfig};
use crate::constants::{CUSTOM_SERVER_OPTION, GEO_MATCH_TOLERANCE_METERS};
use crate::db::{self, PreferenceStore, ServerStore, SqliteServerStore};
use crate::error::{AppError, Result};
use crate::models::{Coordinates, SelectionSource, SelectionState, ServerRecord};
use crate::services::fetcher::{HttpServerListFetcher, ServerListFetcher};
use crate::services::freshness::is_stale;
use crate::services::geo_matcher::find_server;
use crate::services::reachability::{HttpReachabilityChecker, ReachabilityChecker};

/// Inputs for one selection session.
#[derive(Debug, Clone, Default)]
pub struct SelectionRequest {
    pub location: Option<Coordinates>,
    /// Download the list even if the cached copy is fresh
    pub force_refresh: bool,
    /// Overrides the persisted auto-detect preference when set
    pub auto_detect: Option<bool>,
}

impl SelectionRequest {
    pub fn at(location: Coordinates) -> Self {
        SelectionRequest {
            location: Some(location),
            ..Default::default()
        }
    }

    pub fn force_refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }

    pub fn auto_detect(mut self, enabled: bool) -> Self {
        self.auto_detect = Some(enabled);
        self
    }
}

/// A server the session settled on.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedServer {
    pub server: ServerRecord,
    pub source: SelectionSource,
    /// Differs from the previously persisted selection
    pub changed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChoiceOutcome {
    Selected(SelectedServer),
    /// The user asked for a custom server; `prefill` is the last URL entered.
    CustomUrlRequested { prefill: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CustomUrlOutcome {
    Accepted(SelectedServer),
    /// The server did not answer; the session is back to manual choice.
    Rejected { url: String },
}

struct SelectorInner {
    config: SelectorConfig,
    servers: Arc<dyn ServerStore>,
    preferences: Arc<dyn PreferenceStore>,
    fetcher: Arc<dyn ServerListFetcher>,
    checker: Arc<dyn ReachabilityChecker>,
    known_servers: ArcSwap<Vec<ServerRecord>>,
    generation: AtomicU64,
}

#[derive(Clone)]
pub struct ServerSelector {
    inner: Arc<SelectorInner>,
}

impl ServerSelector {
    pub fn new(
        config: SelectorConfig,
        servers: Arc<dyn ServerStore>,
        preferences: Arc<dyn PreferenceStore>,
        fetcher: Arc<dyn ServerListFetcher>,
        checker: Arc<dyn ReachabilityChecker>,
    ) -> Self {
        ServerSelector {
            inner: Arc::new(SelectorInner {
                config,
                servers,
                preferences,
                fetcher,
                checker,
                known_servers: ArcSwap::from_pointee(Vec::new()),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Wire a selector to an SQLite store and the HTTP collaborators.
    pub fn with_sqlite(config: SelectorConfig, store: SqliteServerStore) -> Self {
        let store = Arc::new(store);
        let fetcher = HttpServerListFetcher::new(config.fetch_timeout_secs);
        let checker = HttpReachabilityChecker::new(config.reachability_timeout_secs);
        Self::new(
            config,
            store.clone(),
            store,
            Arc::new(fetcher),
            Arc::new(checker),
        )
    }

    /// Open (and if needed create) the database named in `config`.
    pub async fn connect(config: &Config) -> Result<Self> {
        tracing::info!("Opening server database {}", config.database_url);
        let pool = db::create_pool(&config.database_url).await?;
        SqliteServerStore::create_schema(&pool).await?;
        Ok(Self::with_sqlite(
            config.selector.clone(),
            SqliteServerStore::new(pool),
        ))
    }

    /// The servers the latest successful session loaded.
    pub fn known_servers(&self) -> Arc<Vec<ServerRecord>> {
        self.inner.known_servers.load_full()
    }

    /// The server the persisted preferences point at, if any.
    pub async fn active_server(&self) -> Result<Option<ServerRecord>> {
        let prefs = self.inner.preferences.load().await?;

        if prefs.custom_server_selected && prefs.custom_server_url_valid {
            if let Some(url) = prefs.custom_server_url {
                return Ok(Some(ServerRecord::custom(url)));
            }
        }

        match prefs.selected_server_id {
            Some(id) => self.inner.servers.get_server(id).await,
            None => Ok(None),
        }
    }

    /// Start a selection session.
    ///
    /// Fails with [`AppError::FetchFailure`] when no usable server list can be
    /// obtained. Otherwise the returned session is either already settled
    /// (`AutoSelected`) or waiting for [`SelectionSession::choose`].
    pub async fn select(&self, request: SelectionRequest) -> Result<SelectionSession> {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(generation, "Starting server selection");

        let prefs = self.inner.preferences.load().await?;
        let auto_detect = request.auto_detect.unwrap_or(prefs.auto_detect);

        let servers = self.load_servers(request.force_refresh, generation).await?;

        self.ensure_current(generation)?;
        self.inner.known_servers.store(servers.clone());

        let mut session = SelectionSession {
            selector: self.clone(),
            generation,
            snapshot: servers,
            state: SelectionState::Unselected,
            history: vec![SelectionState::Unselected],
            selected: None,
            pending: None,
        };

        if auto_detect {
            let found = find_server(
                request.location.as_ref(),
                &session.snapshot,
                GEO_MATCH_TOLERANCE_METERS,
            )
            .cloned();

            if let Some(server) = found {
                session.transition(SelectionState::AutoSelected)?;
                self.ensure_current(generation)?;
                let selected = self.persist_selection(server, SelectionSource::Auto).await?;
                session.selected = Some(selected);
                return Ok(session);
            }
        }

        tracing::debug!("No server automatically selected. User will need to choose the server.");
        session.transition(SelectionState::AwaitingManualChoice)?;
        Ok(session)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.generation.load(Ordering::SeqCst) == generation
    }

    fn ensure_current(&self, generation: u64) -> Result<()> {
        if self.is_current(generation) {
            Ok(())
        } else {
            tracing::warn!(generation, "Discarding result of superseded selection session");
            Err(AppError::Superseded)
        }
    }

    /// Cached list if fresh, otherwise a download that is stored and reloaded.
    async fn load_servers(
        &self,
        force_refresh: bool,
        generation: u64,
    ) -> Result<Arc<Vec<ServerRecord>>> {
        let inner = &self.inner;

        if !force_refresh {
            let cached = inner.servers.get_most_recent_servers().await?;
            let last_updated = inner.servers.get_most_recent_date().await?;

            if is_stale(
                last_updated,
                OffsetDateTime::now_utc(),
                inner.config.expiration_days,
            ) {
                tracing::debug!(
                    "Cached server list is stale or missing (last updated: {:?})",
                    last_updated
                );
            } else if !cached.is_empty() {
                tracing::debug!("Using {} cached servers", cached.len());
                return Ok(Arc::new(cached));
            }
        }

        tracing::info!(
            "Downloading server list from {}",
            inner.config.server_list_url
        );
        let fetched = inner.fetcher.fetch(&inner.config.server_list_url).await?;
        if fetched.is_empty() {
            return Err(AppError::FetchFailure(
                "Server list contains no servers".to_string(),
            ));
        }

        self.ensure_current(generation)?;
        inner.servers.insert_snapshot(&fetched).await?;

        let stored = inner.servers.get_most_recent_servers().await?;
        if stored.is_empty() {
            tracing::error!("Stored server list could not be read back");
            return Err(AppError::Internal(
                "server list missing after insert".to_string(),
            ));
        }

        tracing::info!("Refreshed server list: {} servers", stored.len());
        Ok(Arc::new(stored))
    }

    async fn persist_selection(
        &self,
        server: ServerRecord,
        source: SelectionSource,
    ) -> Result<SelectedServer> {
        let inner = &self.inner;
        let mut prefs = inner.preferences.load().await?;

        let changed = match prefs.selected_server_id {
            Some(id) if !prefs.custom_server_selected => match inner.servers.get_server(id).await? {
                Some(previous) => previous.region != server.region,
                None => true,
            },
            _ => true,
        };

        prefs.selected_server_id = server.id;
        prefs.custom_server_selected = false;
        inner.preferences.save(&prefs).await?;

        tracing::info!(
            region = %server.region,
            source = ?source,
            changed,
            "Selected server {}",
            server.region
        );

        Ok(SelectedServer {
            server,
            source,
            changed,
        })
    }
}

/// Check that `input` is an absolute http(s) URL with a host.
pub fn validate_custom_url(input: &str) -> Result<url::Url> {
    let parsed = url::Url::parse(input)
        .map_err(|e| AppError::InvalidCustomUrl(format!("{}: {}", input, e)))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::InvalidCustomUrl(format!(
            "{}: unsupported scheme '{}'",
            input,
            parsed.scheme()
        )));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(AppError::InvalidCustomUrl(format!("{}: missing host", input)));
    }

    Ok(parsed)
}

/// A reachability check that has been started but whose answer has not
/// been applied yet.
struct PendingCheck {
    url: String,
    /// The URL was already the accepted custom server before this check
    was_active: bool,
    handle: JoinHandle<bool>,
}

/// One run of the selection state machine.
pub struct SelectionSession {
    selector: ServerSelector,
    generation: u64,
    snapshot: Arc<Vec<ServerRecord>>,
    state: SelectionState,
    history: Vec<SelectionState>,
    selected: Option<SelectedServer>,
    pending: Option<PendingCheck>,
}

impl SelectionSession {
    pub fn state(&self) -> SelectionState {
        self.state
    }

    /// Every state this session has been in, oldest first.
    pub fn history(&self) -> &[SelectionState] {
        &self.history
    }

    pub fn selected(&self) -> Option<&SelectedServer> {
        self.selected.as_ref()
    }

    /// The server list this session works from.
    pub fn servers(&self) -> &[ServerRecord] {
        &self.snapshot
    }

    /// Choices to offer: the custom server entry, then region names A-Z.
    pub fn options(&self) -> Vec<String> {
        let mut names: Vec<String> = self.snapshot.iter().map(|s| s.region.clone()).collect();
        names.sort();
        names.insert(0, CUSTOM_SERVER_OPTION.to_string());
        names
    }

    /// No newer session has been started on the same selector.
    pub fn is_current(&self) -> bool {
        self.selector.is_current(self.generation)
    }

    /// Apply the user's pick from [`options`](Self::options).
    pub async fn choose(&mut self, option: &str) -> Result<ChoiceOutcome> {
        self.expect_state(SelectionState::AwaitingManualChoice)?;
        tracing::debug!("Chosen: {}", option);

        if option == CUSTOM_SERVER_OPTION {
            self.transition(SelectionState::AwaitingCustomUrl)?;
            let prefs = self.selector.inner.preferences.load().await?;
            return Ok(ChoiceOutcome::CustomUrlRequested {
                prefill: prefs.custom_server_url,
            });
        }

        let server = self
            .snapshot
            .iter()
            .find(|s| s.region == option)
            .cloned()
            .ok_or_else(|| AppError::UnknownRegion(option.to_string()))?;

        self.transition(SelectionState::ManualSelected)?;
        let selected = self
            .selector
            .persist_selection(server, SelectionSource::Manual)
            .await?;
        self.selected = Some(selected.clone());
        Ok(ChoiceOutcome::Selected(selected))
    }

    /// Leave custom URL entry and go back to the region list.
    ///
    /// A check still in flight is abandoned; it runs to completion but its
    /// answer is ignored.
    pub fn cancel_custom_url(&mut self) -> Result<()> {
        if self.state == SelectionState::CustomUrlVerifying {
            self.abandon_check()?;
        }
        self.expect_state(SelectionState::AwaitingCustomUrl)?;
        self.transition(SelectionState::AwaitingManualChoice)
    }

    /// Validate a custom server URL and check that the server answers.
    ///
    /// A malformed URL fails with [`AppError::InvalidCustomUrl`] and leaves the
    /// session waiting for another URL. The entered URL is saved for the next
    /// prefill as soon as verification starts. The reachability check runs as
    /// its own task and always runs to completion.
    ///
    /// Cancel safe: if this future is dropped while the check is running,
    /// submitting the same URL again picks up the running check, and a
    /// different URL replaces it.
    pub async fn submit_custom_url(&mut self, input: &str) -> Result<CustomUrlOutcome> {
        let url = input.trim();

        let resuming = self.state == SelectionState::CustomUrlVerifying
            && self.pending.as_ref().is_some_and(|p| p.url == url);

        if resuming {
            tracing::debug!("Resuming reachability check for {}", url);
        } else {
            if self.state != SelectionState::CustomUrlVerifying {
                self.expect_state(SelectionState::AwaitingCustomUrl)?;
            }
            validate_custom_url(url)?;
            if self.state == SelectionState::CustomUrlVerifying {
                self.abandon_check()?;
            }
            self.start_check(url.to_string()).await?;
        }

        self.finish_check().await
    }

    async fn start_check(&mut self, url: String) -> Result<()> {
        self.transition(SelectionState::CustomUrlVerifying)?;

        let preferences = self.selector.inner.preferences.clone();
        let mut prefs = preferences.load().await?;
        let previous_url = prefs.custom_server_url.as_deref();
        let was_active = prefs.custom_server_selected
            && prefs.custom_server_url_valid
            && previous_url == Some(url.as_str());
        if previous_url != Some(url.as_str()) {
            // The stored flag described the old URL
            prefs.custom_server_url_valid = false;
            prefs.custom_server_url = Some(url.clone());
            preferences.save(&prefs).await?;
        }

        let checker = self.selector.inner.checker.clone();
        let target = url.clone();
        let handle = tokio::spawn(async move { checker.check(&target).await });

        self.pending = Some(PendingCheck {
            url,
            was_active,
            handle,
        });
        Ok(())
    }

    async fn finish_check(&mut self) -> Result<CustomUrlOutcome> {
        let pending = self.pending.as_mut().ok_or_else(|| {
            AppError::InvalidState("no reachability check in flight".to_string())
        })?;
        let joined = (&mut pending.handle).await;
        let url = pending.url.clone();
        let was_active = pending.was_active;
        self.pending = None;

        let reachable =
            joined.map_err(|e| AppError::Internal(format!("reachability check failed: {}", e)))?;

        if !self.is_current() {
            tracing::warn!(
                generation = self.generation,
                "Dropping reachability result for {} from superseded session",
                url
            );
            self.transition(SelectionState::AwaitingManualChoice)?;
            return Err(AppError::Superseded);
        }

        let preferences = self.selector.inner.preferences.clone();

        if reachable {
            self.transition(SelectionState::CustomUrlAccepted)?;

            let mut prefs = preferences.load().await?;
            prefs.custom_server_url = Some(url.clone());
            prefs.auto_detect = false;
            prefs.custom_server_selected = true;
            prefs.custom_server_url_valid = true;
            preferences.save(&prefs).await?;

            tracing::info!("Custom server {} accepted", url);
            let selected = SelectedServer {
                server: ServerRecord::custom(url),
                source: SelectionSource::Custom,
                changed: !was_active,
            };
            self.selected = Some(selected.clone());
            Ok(CustomUrlOutcome::Accepted(selected))
        } else {
            self.transition(SelectionState::CustomUrlRejected)?;

            let mut prefs = preferences.load().await?;
            prefs.custom_server_url_valid = false;
            prefs.custom_server_selected = false;
            preferences.save(&prefs).await?;

            tracing::warn!("Custom server {} did not respond; not set", url);
            self.transition(SelectionState::AwaitingManualChoice)?;
            Ok(CustomUrlOutcome::Rejected { url })
        }
    }

    fn abandon_check(&mut self) -> Result<()> {
        if let Some(pending) = self.pending.take() {
            tracing::debug!("Abandoning reachability check for {}", pending.url);
        }
        self.transition(SelectionState::AwaitingCustomUrl)
    }

    fn expect_state(&self, expected: SelectionState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(AppError::InvalidState(format!(
                "expected {}, session is {}",
                expected, self.state
            )))
        }
    }

    fn transition(&mut self, next: SelectionState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(AppError::InvalidState(format!(
                "cannot move from {} to {}",
                self.state, next
            )));
        }
        tracing::info!(
            generation = self.generation,
            "Selection state {} -> {}",
            self.state,
            next
        );
        self.state = next;
        self.history.push(next);
        Ok(())
    }
}
