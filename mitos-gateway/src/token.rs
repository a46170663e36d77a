//! The session token store.
//!
//! Tokens are opaque 128-bit values issued after a successful credential
//! check and presented on every subsequent request. The store is in-memory
//! and process-lifetime: restarting the server invalidates all sessions.

use mitos_utils::locks::SyncRwLock;
use rustc_hash::FxHashMap;

/// The identity a token resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenIdentity {
    /// Account username.
    pub username: String,
    /// Account store id.
    pub user_id: i64,
}

/// Thread-safe token → identity map.
#[derive(Default)]
pub struct TokenStore {
    tokens: SyncRwLock<FxHashMap<String, TokenIdentity>>,
}

impl TokenStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a fresh token bound to the given identity.
    pub fn issue(&self, username: &str, user_id: i64) -> String {
        let raw: [u8; 16] = rand::random();
        let token = hex::encode(raw);
        self.tokens.write().insert(
            token.clone(),
            TokenIdentity {
                username: username.to_owned(),
                user_id,
            },
        );
        token
    }

    /// Resolves a token, or `None` for anything the store never issued.
    #[must_use]
    pub fn validate(&self, token: &str) -> Option<TokenIdentity> {
        self.tokens.read().get(token).cloned()
    }
}
