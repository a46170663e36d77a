//! Lock aliases.
//!
//! All synchronous locking in the server goes through these aliases so the
//! underlying implementation can be swapped in one place.

/// Non-async mutex. Must never be held across an `.await` point.
pub type SyncMutex<T> = parking_lot::Mutex<T>;

/// Non-async reader/writer lock. Must never be held across an `.await` point.
pub type SyncRwLock<T> = parking_lot::RwLock<T>;
