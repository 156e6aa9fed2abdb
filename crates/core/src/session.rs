//! Client-side session state
//!
//! A [`Session`] holds the short-lived access token returned by login or
//! refresh together with the identity of the signed-in user. The refresh
//! credential is never part of it; that lives with the HTTP transport.
//!
//! Stores are synchronous and cheap: reads happen before every authenticated
//! request, so implementations keep the current session in memory and only
//! touch the backing medium on writes.

use crate::error::CoreResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// The signed-in user's access token and identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Session {
    /// Session with a token and no known identity
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            user_id: None,
            email: None,
            name: None,
        }
    }

    /// Attach the user identity returned by login
    #[must_use]
    pub fn with_user(
        mut self,
        user_id: i64,
        email: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        self.user_id = Some(user_id);
        self.email = Some(email.into());
        self.name = Some(name.into());
        self
    }
}

/// Storage for the current session
///
/// Writes replace the session wholesale, except [`SessionStore::set_access_token`]
/// which swaps the token after a refresh and keeps the identity.
pub trait SessionStore: Send + Sync {
    /// Current session, if any
    fn get(&self) -> Option<Session>;

    /// Replace the session
    fn set(&self, session: Session) -> CoreResult<()>;

    /// Delete the session
    fn clear(&self) -> CoreResult<()>;

    /// Replace only the access token, creating a bare session if none exists
    fn set_access_token(&self, access_token: &str) -> CoreResult<()> {
        let session = match self.get() {
            Some(mut session) => {
                session.access_token = access_token.to_string();
                session
            }
            None => Session::new(access_token),
        };
        self.set(session)
    }

    /// Current access token, if any
    fn access_token(&self) -> Option<String> {
        self.get().map(|session| session.access_token)
    }

    /// Whether a session with a token is present
    fn is_authenticated(&self) -> bool {
        self.get().is_some_and(|session| !session.access_token.is_empty())
    }
}

/// In-process session store
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    inner: Arc<RwLock<Option<Session>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a session
    pub fn with_session(session: Session) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(session))),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self) -> Option<Session> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, session: Session) -> CoreResult<()> {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
        Ok(())
    }

    fn clear(&self) -> CoreResult<()> {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// Session store backed by a JSON file
///
/// A missing file means "no session". The file is loaded once on open and
/// rewritten on every change.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    cached: RwLock<Option<Session>>,
}

impl FileSessionStore {
    /// Open the store at `path`, loading any session already saved there
    pub fn open(path: impl Into<PathBuf>) -> CoreResult<Self> {
        let path = path.into();
        let cached = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                None
            } else {
                Some(serde_json::from_str(&content)?)
            }
        } else {
            None
        };

        Ok(Self {
            path,
            cached: RwLock::new(cached),
        })
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self) -> Option<Session> {
        self.cached
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, session: Session) -> CoreResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&session)?;
        std::fs::write(&self.path, content)?;

        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
        Ok(())
    }

    fn clear(&self) -> CoreResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
