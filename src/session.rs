mod errors;
mod flow;

pub mod store;

pub use errors::SessionError;
pub use flow::{BrowserSession, FlowSessions};
pub use store::{ExpiredDeletion, MemoryStore, RedisStore, SessionStore, SessionStoreError};

use std::{result, sync::Arc};

use bincode::config::standard;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use time::{Duration, OffsetDateTime};

pub(crate) const DEFAULT_DURATION: Duration = Duration::minutes(15);
pub(crate) const DEFAULT_MAX_SESSIONS: usize = 100_000;

type Result<T> = result::Result<T, SessionError>;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SessionEntry {
    pub data: Vec<u8>,
    pub expiry_date: OffsetDateTime,
}

/// A session manager
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    expiry: Duration,
    max_sessions: usize,
}

impl SessionManager {
    /// Creates a new session manager with the provided store.
    ///
    /// By default sessions expire after 15 minutes with a maximum of 100,000 allowed active sessions.
    /// These values can be overridden using the [with_expiry][we] and [with_max_sessions][wms] chainable methods.
    ///
    /// [we]: Self::with_expiry
    /// [wms]: Self::with_max_sessions
    ///
    /// # Examples
    ///
    /// ```
    /// # use std::sync::Arc;
    /// # use mid_demo::session::{MemoryStore, SessionManager};
    /// use time::Duration;
    ///
    /// let manager = SessionManager::new(Arc::new(MemoryStore::new()))
    ///     .with_expiry(Duration::minutes(30))
    ///     .with_max_sessions(50_000);
    /// ```
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            expiry: DEFAULT_DURATION,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }

    /// Configures the default expiry duration for all sessions.
    pub fn with_expiry(mut self, duration: Duration) -> Self {
        self.expiry = duration;
        self
    }

    /// Configures the maximum allowed number of sessions to handle at the same time.
    ///
    /// When this limit is reached, the session manager will reject new sessions
    /// until some sessions are deleted. Existing sessions can still be replaced.
    /// Every stored key counts, so a browser with both flows pending holds two.
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    /// Inserts a session value into the store, replacing any previous value.
    pub async fn insert(&self, key: impl Into<Id>, value: impl Serialize) -> Result<()> {
        let key = key.into();
        if !self.store.exists(key.as_ref()).await?
            && self.store.count().await? >= self.max_sessions
        {
            return Err(SessionError::MaxSessions);
        }

        let expiry_date = OffsetDateTime::now_utc().saturating_add(self.expiry);
        let session = SessionEntry {
            data: bincode::serde::encode_to_vec(value, standard())?,
            expiry_date,
        };
        self.save(&key, &session, self.expiry).await
    }

    /// Gets a session value from the store.
    pub async fn get<T: DeserializeOwned>(&self, key: impl Into<Id>) -> Result<Option<T>> {
        let Some(session) = self.load_entry(&key.into()).await? else {
            return Ok(None);
        };

        let (data, _): (T, _) = bincode::serde::decode_from_slice(&session.data, standard())?;
        Ok(Some(data))
    }

    /// Removes a session from the store.
    pub async fn remove(&self, key: impl Into<Id>) -> Result<()> {
        self.store.delete(key.into().as_ref()).await?;
        Ok(())
    }

    /// Removes a session from the store and returns its value.
    ///
    /// Concurrent calls for the same key hand the value to at most one caller.
    pub async fn take<T: DeserializeOwned>(&self, key: impl Into<Id>) -> Result<Option<T>> {
        let Some(session_data) = self.store.take(key.into().as_ref()).await? else {
            return Ok(None);
        };

        let Some(session) = Self::decode_entry(&session_data)? else {
            return Ok(None);
        };
        let (data, _): (T, _) = bincode::serde::decode_from_slice(&session.data, standard())?;
        Ok(Some(data))
    }

    async fn load_entry(&self, key: &Id) -> Result<Option<SessionEntry>> {
        let Some(session_data) = self.store.load(key.as_ref()).await? else {
            return Ok(None);
        };
        Self::decode_entry(&session_data)
    }

    /// Decodes a stored entry, treating one past its expiry date as absent.
    fn decode_entry(session_data: &[u8]) -> Result<Option<SessionEntry>> {
        let (session, _): (SessionEntry, _) =
            bincode::serde::decode_from_slice(session_data, standard())?;
        Ok((session.expiry_date > OffsetDateTime::now_utc()).then_some(session))
    }

    async fn save(&self, key: &Id, session: &SessionEntry, ttl: Duration) -> Result<()> {
        let ttl = ttl.whole_seconds().max(0) as u64;
        let session_bytes = bincode::serde::encode_to_vec(session, standard())?;
        self.store
            .save(key.as_ref(), &session_bytes, Some(ttl))
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("expiry", &self.expiry)
            .field("max_sessions", &self.max_sessions)
            .finish()
    }
}

/// Key of a stored session value
#[derive(Clone, Debug, Deserialize, Serialize, Eq, Hash, PartialEq)]
pub struct Id(Vec<u8>);

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Self(value.into_bytes())
    }
}

impl AsRef<[u8]> for Id {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
