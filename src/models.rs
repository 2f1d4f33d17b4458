//! Data exchanged between the forms, the services and the views.

use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::mid::{HashToSign, HashType};

static NATIONAL_IDENTITY_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(PNO[A-Z]{2}-)?[0-9]{11}$").unwrap());
static PHONE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+[0-9]{7,15}$").unwrap());

/// Fields submitted through the start form.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct UserRequest {
    #[validate(
        length(min = 1, message = "National identity number is required"),
        regex(
            path = *NATIONAL_IDENTITY_NUMBER,
            message = "National identity number must consist of 11 digits, optionally prefixed like PNOEE-"
        )
    )]
    pub national_identity_number: String,
    #[validate(
        length(min = 1, message = "Phone number is required"),
        regex(
            path = *PHONE_NUMBER,
            message = "Phone number must start with + and country code, e.g. +37200000766"
        )
    )]
    pub phone_number: String,
    #[serde(skip)]
    pub file: Option<UploadedFile>,
}

impl UserRequest {
    pub fn new(national_identity_number: impl Into<String>, phone_number: impl Into<String>) -> Self {
        Self {
            national_identity_number: national_identity_number.into(),
            phone_number: phone_number.into(),
            file: None,
        }
    }

    pub fn with_file(mut self, file: UploadedFile) -> Self {
        self.file = Some(file);
        self
    }

    /// The bare identity code sent to Mobile-ID.
    pub fn identity_code(&self) -> &str {
        strip_semantics_prefix(&self.national_identity_number)
    }
}

/// Removes an ETSI semantics identifier prefix such as `PNOEE-`.
pub(crate) fn strip_semantics_prefix(identifier: &str) -> &str {
    match identifier.split_once('-') {
        Some((prefix, code))
            if prefix.len() == 5
                && prefix.starts_with("PNO")
                && prefix[3..].chars().all(|c| c.is_ascii_uppercase()) =>
        {
            code
        }
        _ => identifier,
    }
}

/// A document uploaded with the signature form.
#[derive(Clone, Default)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub content: Vec<u8>,
}

impl UploadedFile {
    /// A file counts as uploaded only with a name and some content.
    pub fn is_present(&self) -> bool {
        !self.file_name.is_empty() && !self.content.is_empty()
    }
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size", &self.content.len())
            .finish()
    }
}

/// An authentication waiting for the user to confirm it on the phone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationSessionInfo {
    pub user_request: UserRequest,
    pub authentication_hash: HashToSign,
    pub verification_code: String,
}

/// A signature waiting for the user to confirm it on the phone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningSessionInfo {
    pub user_request: UserRequest,
    pub document_name: String,
    pub hash_to_sign: HashToSign,
    pub verification_code: String,
}

/// Person identified by a successful authentication or signature.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationIdentity {
    pub given_name: String,
    pub surname: String,
    pub identity_code: String,
    pub country: String,
}

/// Confirmation of a created signature.
#[derive(Debug, Clone, Serialize)]
pub struct SigningResult {
    pub result: String,
    pub valid: bool,
    pub timestamp: DateTime<Utc>,
    pub document_name: String,
    pub hash_type: HashType,
    pub signature_value: String,
    pub signer: AuthenticationIdentity,
}
