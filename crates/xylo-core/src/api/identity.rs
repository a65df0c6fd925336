//! Which identity a request carries.

use anyhow::Result;

use crate::config::{IdentityMode, paths};
use crate::session::SessionStore;
use crate::store::TokenStore;

/// Header the backend reads the client session id from.
pub const SESSION_HEADER: &str = "X-Session-ID";

/// Identity attached to one outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Bearer(String),
    Session(String),
}

impl Identity {
    /// Header name and value carrying this identity.
    pub fn header(&self) -> (&'static str, String) {
        match self {
            Identity::Bearer(token) => ("Authorization", format!("Bearer {token}")),
            Identity::Session(id) => (SESSION_HEADER, id.clone()),
        }
    }
}

/// Client session plus an optional stored access token.
#[derive(Debug)]
pub struct Credentials {
    session: SessionStore,
    tokens: Option<TokenStore>,
    mode: IdentityMode,
}

impl Credentials {
    pub fn new(session: SessionStore, tokens: Option<TokenStore>, mode: IdentityMode) -> Self {
        Self {
            session,
            tokens,
            mode,
        }
    }

    /// Credentials persisted under `$XYLO_HOME`.
    pub fn open_default(mode: IdentityMode) -> Self {
        Self::new(
            SessionStore::open(paths::session_path()),
            Some(TokenStore::open(paths::token_path())),
            mode,
        )
    }

    /// Session-only credentials (no token store).
    pub fn session_only(session: SessionStore) -> Self {
        Self::new(session, None, IdentityMode::Session)
    }

    pub fn mode(&self) -> IdentityMode {
        self.mode
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn token(&self) -> Option<String> {
        self.tokens.as_ref().and_then(TokenStore::get)
    }

    pub fn store_token(&self, token: &str) -> Result<()> {
        match &self.tokens {
            Some(tokens) => tokens.set(token),
            None => anyhow::bail!("No token store configured"),
        }
    }

    pub fn clear_token(&self) -> Result<()> {
        match &self.tokens {
            Some(tokens) => tokens.clear(),
            None => Ok(()),
        }
    }

    /// Resolves the identity for the next request.
    pub fn identity(&self) -> Identity {
        match self.mode {
            IdentityMode::Session => Identity::Session(self.session.get_id()),
            IdentityMode::Auto => match self.token() {
                Some(token) => Identity::Bearer(token),
                None => Identity::Session(self.session.get_id()),
            },
            IdentityMode::Bearer => match self.token() {
                Some(token) => Identity::Bearer(token),
                None => {
                    tracing::warn!("bearer identity configured but no access token stored");
                    Identity::Session(self.session.get_id())
                }
            },
        }
    }
}
