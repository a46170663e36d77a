//! The account-store contract.
//!
//! The runtime never talks to the relational store directly; it goes through
//! [`AccountStore`], which covers exactly three concerns: credential checks at
//! login, loading the gameplay configuration at startup, and incrementing a
//! user's progress counters. The in-memory implementation below backs tests
//! and single-process deployments; production deployments substitute one
//! backed by the relational store.

use async_trait::async_trait;
use mitos_protocol::GameplayConfig;
use mitos_utils::locks::SyncRwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error raised by the backing store.
#[derive(Debug, Error)]
pub enum AccountError {
    /// The storage layer failed. Callers decide whether to retry, drop, or
    /// surface the failure; the store has already done its own single retry.
    #[error("account storage failure: {0}")]
    Storage(String),
}

/// A user as known to the account store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Stable numeric id from the store.
    pub id: i64,
    /// Login name, unique across the store.
    pub username: String,
    /// Banned users stay in the store but are inactive.
    pub is_active: bool,
}

/// A user's cumulative progress counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    /// Opposing cells absorbed.
    pub cells_eaten: u64,
    /// Food pellets consumed.
    pub food_eaten: u64,
    /// Distinct world joins.
    pub worlds_explored: u64,
    /// Game sessions started.
    pub sessions_played: u64,
}

/// Aggregate counters summed across every user in the store.
pub type StatsTotals = UserStats;

/// A progress increment. Fields at zero are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsDelta {
    /// Opposing cells absorbed since the last report.
    pub cells_eaten: u64,
    /// Food pellets consumed since the last report.
    pub food_eaten: u64,
    /// Distinct world joins since the last report.
    pub worlds_explored: u64,
    /// Game sessions started since the last report.
    pub sessions_played: u64,
}

impl StatsDelta {
    /// True when applying this delta would change nothing.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.cells_eaten == 0
            && self.food_eaten == 0
            && self.worlds_explored == 0
            && self.sessions_played == 0
    }
}

impl UserStats {
    fn apply(&mut self, delta: StatsDelta) {
        self.cells_eaten += delta.cells_eaten;
        self.food_eaten += delta.food_eaten;
        self.worlds_explored += delta.worlds_explored;
        self.sessions_played += delta.sessions_played;
    }

    fn accumulate(&mut self, other: &UserStats) {
        self.cells_eaten += other.cells_eaten;
        self.food_eaten += other.food_eaten;
        self.worlds_explored += other.worlds_explored;
        self.sessions_played += other.sessions_played;
    }
}

/// The three operations the runtime needs from the account system.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Checks `password` against the stored credentials for `username`.
    ///
    /// Returns `None` for unknown users, wrong passwords, and banned users
    /// alike; the caller only learns pass/fail.
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserRecord>, AccountError>;

    /// Loads the current gameplay configuration row.
    async fn load_gameplay_config(&self) -> Result<GameplayConfig, AccountError>;

    /// Atomically increments `username`'s counters by `delta` and returns the
    /// user's new stats together with the aggregate totals across all users.
    ///
    /// For an unknown or inactive user nothing is written and the first
    /// element is `None`; the totals are still current.
    async fn increment_user_counters(
        &self,
        username: &str,
        delta: StatsDelta,
    ) -> Result<(Option<UserStats>, StatsTotals), AccountError>;
}

struct MemoryUser {
    id: i64,
    password: String,
    is_active: bool,
    stats: UserStats,
}

struct MemoryInner {
    users: FxHashMap<String, MemoryUser>,
    config: GameplayConfig,
    next_id: i64,
}

/// An in-memory [`AccountStore`].
///
/// Passwords are compared in the clear; this implementation exists for tests
/// and development servers where the registration flow is out of the picture.
pub struct MemoryAccountStore {
    inner: SyncRwLock<MemoryInner>,
}

impl MemoryAccountStore {
    /// Creates an empty store serving `config` as the gameplay configuration.
    #[must_use]
    pub fn new(config: GameplayConfig) -> Self {
        Self {
            inner: SyncRwLock::new(MemoryInner {
                users: FxHashMap::default(),
                config,
                next_id: 1,
            }),
        }
    }

    /// Adds an active user and returns its id.
    pub fn add_user(&self, username: &str, password: &str) -> i64 {
        let mut inner = self.inner.write();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.users.insert(
            username.to_owned(),
            MemoryUser {
                id,
                password: password.to_owned(),
                is_active: true,
                stats: UserStats::default(),
            },
        );
        id
    }

    /// Bans or unbans a user. Unknown users are ignored.
    pub fn set_active(&self, username: &str, active: bool) {
        if let Some(user) = self.inner.write().users.get_mut(username) {
            user.is_active = active;
        }
    }

    /// Replaces the stored gameplay configuration.
    pub fn set_gameplay_config(&self, config: GameplayConfig) {
        self.inner.write().config = config;
    }

    fn totals(inner: &MemoryInner) -> StatsTotals {
        let mut totals = StatsTotals::default();
        for user in inner.users.values() {
            totals.accumulate(&user.stats);
        }
        totals
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserRecord>, AccountError> {
        let inner = self.inner.read();
        Ok(inner.users.get(username).and_then(|user| {
            (user.is_active && user.password == password).then(|| UserRecord {
                id: user.id,
                username: username.to_owned(),
                is_active: user.is_active,
            })
        }))
    }

    async fn load_gameplay_config(&self) -> Result<GameplayConfig, AccountError> {
        Ok(self.inner.read().config.clone())
    }

    async fn increment_user_counters(
        &self,
        username: &str,
        delta: StatsDelta,
    ) -> Result<(Option<UserStats>, StatsTotals), AccountError> {
        let mut inner = self.inner.write();
        let stats = match inner.users.get_mut(username) {
            Some(user) if user.is_active => {
                user.stats.apply(delta);
                Some(user.stats)
            }
            _ => None,
        };
        let totals = Self::totals(&inner);
        Ok((stats, totals))
    }
}
