//! Authentication and signing flows on top of the Mobile-ID connector.

pub mod authentication;
pub mod errors;
pub mod signature;

pub use authentication::AuthenticationService;
pub use errors::{OperationError, ServiceError};
pub use signature::SignatureService;

use std::sync::Arc;

use crate::config::MidConfig;
use crate::mid::{MidConnector, ResponseValidator, SessionStatusPoller};

/// Collaborators shared by both services.
#[derive(Clone)]
struct MidContext {
    connector: Arc<dyn MidConnector>,
    poller: SessionStatusPoller,
    validator: Arc<ResponseValidator>,
}

impl MidContext {
    fn new(
        connector: Arc<dyn MidConnector>,
        validator: Arc<ResponseValidator>,
        config: &MidConfig,
    ) -> Self {
        let poller = SessionStatusPoller::new(config.poll_timeout(), config.session_timeout())
            .with_poll_interval(config.poll_interval());
        Self {
            connector,
            poller,
            validator,
        }
    }
}
