use std::fmt;

use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use super::{Id, SessionError, SessionManager};
use crate::models::{AuthenticationSessionInfo, SigningSessionInfo};

/// Identifier of a browser session, carried by the session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BrowserSession(String);

impl BrowserSession {
    /// Starts a new browser session with a random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accepts a cookie value only if it is a well-formed UUID.
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value)
            .ok()
            .map(|uuid| Self(uuid.to_string()))
    }

    pub fn id(&self) -> &str {
        &self.0
    }

    fn slot(&self, slot: Slot) -> Id {
        Id::from(format!("{}:{}", self.0, slot.as_str()))
    }
}

impl fmt::Display for BrowserSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Authentication,
    Signing,
}

impl Slot {
    fn as_str(self) -> &'static str {
        match self {
            Slot::Authentication => "authentication",
            Slot::Signing => "signing",
        }
    }
}

/// Holds at most one in-progress authentication and one in-progress signing
/// per browser session. Starting a new operation replaces the previous one.
#[derive(Clone, Debug)]
pub struct FlowSessions {
    manager: SessionManager,
}

impl FlowSessions {
    pub fn new(manager: SessionManager) -> Self {
        Self { manager }
    }

    pub async fn set_authentication(
        &self,
        session: &BrowserSession,
        info: &AuthenticationSessionInfo,
    ) -> Result<(), SessionError> {
        self.set(session, Slot::Authentication, info).await
    }

    pub async fn get_authentication(
        &self,
        session: &BrowserSession,
    ) -> Result<Option<AuthenticationSessionInfo>, SessionError> {
        self.get(session, Slot::Authentication).await
    }

    pub async fn clear_authentication(&self, session: &BrowserSession) -> Result<(), SessionError> {
        self.manager
            .remove(session.slot(Slot::Authentication))
            .await
    }

    /// Removes the authentication slot and returns what it held.
    pub async fn take_authentication(
        &self,
        session: &BrowserSession,
    ) -> Result<Option<AuthenticationSessionInfo>, SessionError> {
        self.take(session, Slot::Authentication).await
    }

    pub async fn set_signing(
        &self,
        session: &BrowserSession,
        info: &SigningSessionInfo,
    ) -> Result<(), SessionError> {
        self.set(session, Slot::Signing, info).await
    }

    pub async fn get_signing(
        &self,
        session: &BrowserSession,
    ) -> Result<Option<SigningSessionInfo>, SessionError> {
        self.get(session, Slot::Signing).await
    }

    pub async fn clear_signing(&self, session: &BrowserSession) -> Result<(), SessionError> {
        self.manager.remove(session.slot(Slot::Signing)).await
    }

    /// Removes the signing slot and returns what it held.
    pub async fn take_signing(
        &self,
        session: &BrowserSession,
    ) -> Result<Option<SigningSessionInfo>, SessionError> {
        self.take(session, Slot::Signing).await
    }

    async fn set<T: Serialize>(
        &self,
        session: &BrowserSession,
        slot: Slot,
        value: &T,
    ) -> Result<(), SessionError> {
        self.manager.insert(session.slot(slot), value).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        session: &BrowserSession,
        slot: Slot,
    ) -> Result<Option<T>, SessionError> {
        self.manager.get(session.slot(slot)).await
    }

    async fn take<T: DeserializeOwned>(
        &self,
        session: &BrowserSession,
        slot: Slot,
    ) -> Result<Option<T>, SessionError> {
        self.manager.take(session.slot(slot)).await
    }
}
