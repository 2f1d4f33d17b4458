use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use super::{HashToSign, HashType, MidError};

/// Language of the dialog shown on the phone.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Language {
    #[default]
    Eng,
    Est,
    Rus,
    Lit,
}

/// Encoding of the display text on the phone.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisplayTextFormat {
    #[default]
    #[serde(rename = "GSM-7")]
    Gsm7,
    #[serde(rename = "UCS-2")]
    Ucs2,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationRequest {
    pub phone_number: String,
    pub national_identity_number: String,
    pub hash: String,
    pub hash_type: HashType,
    pub language: Language,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_text: Option<String>,
    pub display_text_format: DisplayTextFormat,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRequest {
    pub phone_number: String,
    pub national_identity_number: String,
    pub hash: String,
    pub hash_type: HashType,
    pub language: Language,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_text: Option<String>,
    pub display_text_format: DisplayTextFormat,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRequest {
    pub phone_number: String,
    pub national_identity_number: String,
}

/// Which kind of session a status query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Authentication,
    Signature,
}

impl SessionKind {
    pub(crate) fn path_segment(self) -> &'static str {
        match self {
            SessionKind::Authentication => "authentication",
            SessionKind::Signature => "signature",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Running,
    Complete,
}

/// Final result code of a completed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionResult {
    Ok,
    Timeout,
    NotMidClient,
    UserCancelled,
    SignatureHashMismatch,
    PhoneAbsent,
    DeliveryError,
    SimError,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSignature {
    pub value: String,
    pub algorithm: String,
}

/// Session status as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub state: SessionState,
    #[serde(default)]
    pub result: Option<SessionResult>,
    #[serde(default)]
    pub signature: Option<SessionSignature>,
    #[serde(default)]
    pub cert: Option<String>,
}

impl SessionStatus {
    pub fn running() -> Self {
        Self {
            state: SessionState::Running,
            result: None,
            signature: None,
            cert: None,
        }
    }

    pub fn complete(result: SessionResult) -> Self {
        Self {
            state: SessionState::Complete,
            result: Some(result),
            signature: None,
            cert: None,
        }
    }

    /// Maps a completed session to success or to the matching error.
    pub fn into_final_result(self) -> Result<Self, MidError> {
        match self.result {
            Some(SessionResult::Ok) => Ok(self),
            Some(SessionResult::Timeout) => Err(MidError::SessionTimeout),
            Some(SessionResult::NotMidClient) => Err(MidError::NotMidClient),
            Some(SessionResult::UserCancelled) => Err(MidError::UserCancelled),
            Some(SessionResult::SignatureHashMismatch) => Err(MidError::SignatureHashMismatch),
            Some(SessionResult::PhoneAbsent) => Err(MidError::PhoneNotAvailable),
            Some(SessionResult::DeliveryError) => Err(MidError::DeliveryError),
            Some(SessionResult::SimError) => Err(MidError::SimError),
            Some(SessionResult::Unknown) => Err(MidError::UnexpectedResponse(
                "unknown session result".into(),
            )),
            None => Err(MidError::UnexpectedResponse(
                "completed session without result".into(),
            )),
        }
    }
}

/// Signature returned by a completed session.
#[derive(Debug, Clone)]
pub struct MidSignature {
    pub value: Vec<u8>,
    pub algorithm: String,
}

impl MidSignature {
    pub fn from_session_status(status: &SessionStatus) -> Result<Self, MidError> {
        let signature = status.signature.as_ref().ok_or_else(|| {
            MidError::UnexpectedResponse("completed session without signature".into())
        })?;
        Ok(Self {
            value: STANDARD.decode(&signature.value)?,
            algorithm: signature.algorithm.clone(),
        })
    }
}

/// Everything needed to validate an authentication response.
#[derive(Debug, Clone)]
pub struct MidAuthentication {
    pub result: SessionResult,
    pub signature: MidSignature,
    pub certificate: Vec<u8>,
    pub hash: HashToSign,
}

impl MidAuthentication {
    pub fn from_session_status(status: SessionStatus, hash: HashToSign) -> Result<Self, MidError> {
        let signature = MidSignature::from_session_status(&status)?;
        let certificate = status.cert.as_deref().ok_or_else(|| {
            MidError::UnexpectedResponse("completed session without certificate".into())
        })?;
        Ok(Self {
            result: status.result.unwrap_or(SessionResult::Unknown),
            signature,
            certificate: STANDARD.decode(certificate)?,
            hash,
        })
    }
}
