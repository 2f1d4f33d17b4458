//! Mobile-ID provider boundary.
//!
//! The application only needs a handful of provider operations: submitting an
//! authentication or signature request, querying the signer certificate and
//! polling a session until it reaches a final state. They are expressed by the
//! [`MidConnector`] trait so that services can run against the REST API or a
//! scripted connector in tests.

mod error;
mod hash;
mod models;
mod poller;
mod rest;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
mod validator;

pub use error::MidError;
pub use hash::{HashToSign, HashType};
pub use models::{
    AuthenticationRequest, CertificateRequest, DisplayTextFormat, Language, MidAuthentication,
    MidSignature, SessionKind, SessionResult, SessionSignature, SessionState, SessionStatus,
    SignatureRequest,
};
pub use poller::SessionStatusPoller;
pub use rest::MidRestConnector;
pub use validator::ResponseValidator;

use std::time::Duration;

use async_trait::async_trait;

/// Public Mobile-ID demo environment.
pub const DEMO_HOST_URL: &str = "https://tsp.demo.sk.ee/mid-api";
pub const DEMO_RELYING_PARTY_UUID: &str = "00000000-0000-0000-0000-000000000000";
pub const DEMO_RELYING_PARTY_NAME: &str = "DEMO";

/// Operations consumed from the Mobile-ID service.
#[async_trait]
pub trait MidConnector: Send + Sync + 'static {
    /// Starts an authentication session and returns its identifier.
    async fn authenticate(&self, request: AuthenticationRequest) -> Result<String, MidError>;

    /// Starts a signature session and returns its identifier.
    async fn sign(&self, request: SignatureRequest) -> Result<String, MidError>;

    /// Returns the DER encoded signing certificate of the user.
    async fn get_certificate(&self, request: CertificateRequest) -> Result<Vec<u8>, MidError>;

    /// Queries the current state of a session.
    ///
    /// The service may hold the request for up to `long_poll_timeout` while the
    /// session is still running.
    async fn get_session_status(
        &self,
        kind: SessionKind,
        session_id: &str,
        long_poll_timeout: Duration,
    ) -> Result<SessionStatus, MidError>;

    async fn get_authentication_session_status(
        &self,
        session_id: &str,
        long_poll_timeout: Duration,
    ) -> Result<SessionStatus, MidError> {
        self.get_session_status(SessionKind::Authentication, session_id, long_poll_timeout)
            .await
    }

    async fn get_signature_session_status(
        &self,
        session_id: &str,
        long_poll_timeout: Duration,
    ) -> Result<SessionStatus, MidError> {
        self.get_session_status(SessionKind::Signature, session_id, long_poll_timeout)
            .await
    }
}
