use thiserror::Error;
use tracing::{info, warn};

use crate::mid::MidError;

/// Terminal failures of an authentication or signing flow.
///
/// Every variant carries the message shown to the user, telling them what to
/// do next.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    #[error("User cancelled operation.")]
    UserCancelled,
    #[error("User is not a MID client or user's certificates are revoked.")]
    NotMidClient,
    #[error("User didn't type in PIN in time.")]
    SessionTimeout,
    #[error("Communication error. Unable to reach phone.")]
    PhoneNotAvailable,
    #[error("MID internal error.")]
    MidInternalError,
    #[error(
        "Mobile-ID configuration on user's SIM card differs from what is configured \
        on service provider's side."
    )]
    InvalidUserConfiguration,
    #[error("Validation failed: {}", .0.join(", "))]
    ValidationFailed(Vec<String>),
    #[error("No operation in progress. Please start again.")]
    NoSessionInProgress,
}

/// Error returned by the services.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Operation(#[from] OperationError),
    /// A failure the user cannot act upon, such as a transport error or a
    /// rejected relying party.
    #[error("Mobile-ID request failed")]
    Unexpected(#[source] MidError),
    #[error("Please select a file to upload")]
    MissingDocument,
}

impl From<MidError> for ServiceError {
    fn from(error: MidError) -> Self {
        let operation_error = match error {
            MidError::UserCancelled => {
                info!("User cancelled operation");
                OperationError::UserCancelled
            }
            MidError::NotMidClient => {
                info!("User is not a MID client or user's certificates are revoked");
                OperationError::NotMidClient
            }
            MidError::SessionTimeout => {
                info!("User did not type in PIN in time");
                OperationError::SessionTimeout
            }
            MidError::PhoneNotAvailable | MidError::DeliveryError | MidError::SimError => {
                info!(reason = %error, "Unable to reach phone/SIM card");
                OperationError::PhoneNotAvailable
            }
            MidError::SignatureHashMismatch => {
                info!("User's Mobile-ID configuration does not match the request");
                OperationError::InvalidUserConfiguration
            }
            MidError::Internal(ref detail) => {
                warn!(%detail, "MID service returned internal error that cannot be handled locally");
                OperationError::MidInternalError
            }
            other => return ServiceError::Unexpected(other),
        };
        ServiceError::Operation(operation_error)
    }
}
