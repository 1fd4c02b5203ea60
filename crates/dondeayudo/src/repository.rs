//! Data repository: cache first, then network, then the fallback bundle.
//!
//! [`DataRepository::initialize`] publishes whatever the cache holds, then
//! tries the network. A non-empty download replaces the snapshot and the
//! cache. When the download fails or comes back empty the current points
//! stay; if there are none, the fallback bundle is tried.
//!
//! Every network cycle takes a ticket. A result is applied only if no later
//! ticket has been applied already, so an old response arriving late never
//! overwrites a newer one.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{CacheStatus, CacheStore};
use crate::error::StorageError;
use crate::fallback::FallbackBundle;
use crate::fetch::PointSource;
use crate::normalize::ColorMap;
use crate::point::{Category, Point, PublicationState};

/// Filter values meaning "every type".
const ALL_TYPES: [&str; 3] = ["", "todos", "all"];

/// Window for [`RepositoryStats::recent`].
const RECENT_DAYS: i64 = 7;

/// Where the current points came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryState {
    /// Nothing loaded yet.
    Uninitialized,
    /// Serving the local snapshot, possibly empty.
    Cached,
    /// Serving a successful download.
    Fresh,
    /// Serving the static fallback bundle.
    Fallback,
    /// No data anywhere.
    Empty,
}

impl fmt::Display for RepositoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Cached => "cached",
            Self::Fresh => "fresh",
            Self::Fallback => "fallback",
            Self::Empty => "empty",
        };
        f.write_str(name)
    }
}

/// Counts over the current points.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepositoryStats {
    /// Number of points.
    pub total: usize,
    /// Points per publication state.
    pub by_state: BTreeMap<PublicationState, usize>,
    /// Points per category.
    pub by_category: BTreeMap<Category, usize>,
    /// Points created in the last seven days.
    pub recent: usize,
}

impl RepositoryStats {
    fn compute(points: &[Point], now: DateTime<Utc>) -> Self {
        let since = now - Duration::days(RECENT_DAYS);
        let mut stats = Self {
            total: points.len(),
            ..Self::default()
        };
        for point in points {
            *stats.by_state.entry(point.state).or_default() += 1;
            *stats.by_category.entry(point.category).or_default() += 1;
            if point.created_at.is_some_and(|created| created >= since) {
                stats.recent += 1;
            }
        }
        stats
    }
}

#[derive(Debug)]
struct Snapshot {
    state: RepositoryState,
    points: Arc<[Point]>,
    last_updated: Option<DateTime<Utc>>,
    by_type: HashMap<String, Arc<[Point]>>,
    applied_ticket: u64,
}

impl Snapshot {
    fn replace(&mut self, state: RepositoryState, points: Arc<[Point]>) {
        self.state = state;
        self.points = points;
        self.by_type.clear();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cache-then-network access to the current points.
#[derive(Debug)]
pub struct DataRepository<S> {
    source: S,
    cache: Mutex<CacheStore>,
    fallback: FallbackBundle,
    include_unverified: bool,
    snapshot: Mutex<Snapshot>,
    next_ticket: AtomicU64,
}

impl<S: PointSource> DataRepository<S> {
    /// Create a repository over a point source and a cache.
    pub fn new(source: S, cache: CacheStore, fallback: FallbackBundle) -> Self {
        Self {
            source,
            cache: Mutex::new(cache),
            fallback,
            include_unverified: false,
            snapshot: Mutex::new(Snapshot {
                state: RepositoryState::Uninitialized,
                points: Arc::from(Vec::new()),
                last_updated: None,
                by_type: HashMap::new(),
                applied_ticket: 0,
            }),
            next_ticket: AtomicU64::new(0),
        }
    }

    /// Keep points that are not publicly visible.
    #[must_use]
    pub fn include_unverified(mut self, include: bool) -> Self {
        self.include_unverified = include;
        self
    }

    /// Load the cache, then refresh from the network.
    ///
    /// Never fails; the worst outcome is an empty list.
    pub async fn initialize(&self) -> Arc<[Point]> {
        self.load_cache();
        self.refresh().await
    }

    fn load_cache(&self) {
        let cached = lock(&self.cache).load();

        let mut snapshot = lock(&self.snapshot);
        match cached {
            Some(cached) => {
                info!("Serving {} cached points", cached.data.len());
                snapshot.last_updated = Some(cached.timestamp);
                snapshot.replace(RepositoryState::Cached, cached.data.into());
            }
            None => {
                debug!("No cached snapshot");
                snapshot.replace(RepositoryState::Cached, Arc::from(Vec::new()));
            }
        }
    }

    /// Fetch from the network and apply the result.
    ///
    /// Returns the points current after this call, which may come from a
    /// newer concurrent refresh.
    pub async fn refresh(&self) -> Arc<[Point]> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        let result = self.source.fetch(self.include_unverified).await;

        // A newer refresh already landed; this answer is stale.
        let mut snapshot = lock(&self.snapshot);
        if ticket < snapshot.applied_ticket {
            debug!(
                "Discarding refresh {} superseded by {}",
                ticket, snapshot.applied_ticket
            );
            return Arc::clone(&snapshot.points);
        }

        match result {
            Ok(points) if !points.is_empty() => {
                // Persist first so the snapshot carries the cache timestamp
                let timestamp = match lock(&self.cache).try_save(&points) {
                    Ok(timestamp) => timestamp,
                    Err(err) => {
                        warn!("Cache write skipped: {}", err);
                        Utc::now()
                    }
                };
                info!("Refreshed {} points", points.len());
                snapshot.applied_ticket = ticket;
                snapshot.last_updated = Some(timestamp);
                snapshot.replace(RepositoryState::Fresh, points.into());
            }
            Ok(_) => {
                info!("Backend returned no points, keeping {} data", snapshot.state);
                self.fall_back_if_empty(&mut snapshot);
            }
            Err(err) => {
                warn!("Refresh failed, keeping {} data: {}", snapshot.state, err);
                self.fall_back_if_empty(&mut snapshot);
            }
        }

        Arc::clone(&snapshot.points)
    }

    fn fall_back_if_empty(&self, snapshot: &mut Snapshot) {
        if !snapshot.points.is_empty() {
            return;
        }
        let points = self.fallback.load();
        if points.is_empty() {
            snapshot.replace(RepositoryState::Empty, Arc::from(Vec::new()));
        } else {
            snapshot.replace(RepositoryState::Fallback, points.into());
        }
    }

    /// All current points.
    pub fn get_all_points(&self) -> Arc<[Point]> {
        Arc::clone(&lock(&self.snapshot).points)
    }

    /// Points whose display type, subtype or category equals `filter`.
    ///
    /// `""`, `"todos"` and `"all"` return everything. Results are memoized
    /// until the points change.
    pub fn get_points_by_type(&self, filter: &str) -> Arc<[Point]> {
        let mut snapshot = lock(&self.snapshot);
        if ALL_TYPES.contains(&filter) {
            return Arc::clone(&snapshot.points);
        }
        if let Some(hit) = snapshot.by_type.get(filter) {
            return Arc::clone(hit);
        }
        let matched: Arc<[Point]> = snapshot
            .points
            .iter()
            .filter(|p| p.matches_type(filter))
            .cloned()
            .collect();
        snapshot
            .by_type
            .insert(filter.to_string(), Arc::clone(&matched));
        matched
    }

    /// Points of one category.
    pub fn get_points_by_category(&self, category: Category) -> Vec<Point> {
        lock(&self.snapshot)
            .points
            .iter()
            .filter(|p| p.category == category)
            .cloned()
            .collect()
    }

    /// Where the current points came from.
    pub fn state(&self) -> RepositoryState {
        lock(&self.snapshot).state
    }

    /// Timestamp of the current cached or downloaded data.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        lock(&self.snapshot).last_updated
    }

    /// Counts over the current points.
    pub fn stats(&self) -> RepositoryStats {
        RepositoryStats::compute(&self.get_all_points(), Utc::now())
    }

    /// Marker colors for the types present in the current points.
    pub fn color_map(&self) -> ColorMap {
        let points = self.get_all_points();
        ColorMap::from_types(points.iter().map(|p| p.point_type.as_str()))
    }

    /// Describe the local snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache database cannot be read.
    pub fn cache_status(&self) -> Result<CacheStatus, StorageError> {
        lock(&self.cache).status()
    }
}
