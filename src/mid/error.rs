use thiserror::Error;

/// Errors reported by the Mobile-ID service or its transport.
#[derive(Error, Debug)]
pub enum MidError {
    #[error("User cancelled the operation")]
    UserCancelled,
    #[error("User is not a Mobile-ID client or the certificates are revoked")]
    NotMidClient,
    #[error("Session timed out before the user entered the PIN")]
    SessionTimeout,
    #[error("Phone is not reachable")]
    PhoneNotAvailable,
    #[error("SMS delivery to the phone failed")]
    DeliveryError,
    #[error("SIM application error")]
    SimError,
    #[error("Hash algorithm on the SIM does not match the request")]
    SignatureHashMismatch,
    #[error("Mobile-ID internal error: {0}")]
    Internal(String),
    #[error("Relying party is not authorized to use the service")]
    Unauthorized,
    #[error("Request rejected by the service: {0}")]
    InvalidParameter(String),
    #[error("Session {0} not found")]
    SessionNotFound(String),
    #[error("Unexpected response from the service: {0}")]
    UnexpectedResponse(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl From<base64::DecodeError> for MidError {
    fn from(error: base64::DecodeError) -> Self {
        MidError::UnexpectedResponse(format!("invalid base64 payload: {error}"))
    }
}
