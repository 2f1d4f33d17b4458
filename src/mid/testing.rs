//! Test doubles for the Mobile-ID boundary.
//!
//! Intended for development and testing purposes only.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use openssl::asn1::{Asn1Integer, Asn1Time};
use openssl::bn::{BigNum, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::ecdsa::EcdsaSig;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::{Padding, Rsa};
use openssl::x509::extension::BasicConstraints;
use openssl::x509::{X509, X509Builder, X509Name, X509NameBuilder};

use super::{
    AuthenticationRequest, CertificateRequest, HashToSign, HashType, MidConnector, MidError,
    SessionKind, SessionResult, SessionSignature, SessionState, SessionStatus, SignatureRequest,
};

pub const TEST_GIVEN_NAME: &str = "MARY ANN";
pub const TEST_SURNAME: &str = "O'CONNEZ-SUSLIK TESTNUMBER";
pub const TEST_IDENTITY_CODE: &str = "60001019906";
pub const TEST_COUNTRY: &str = "EE";
pub const TEST_PHONE_NUMBER: &str = "+37200000766";

/// Key algorithm of a test certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Ec,
    Rsa,
}

/// A self-signed certificate authority for trust tests.
pub struct TestCa {
    key: PKey<Private>,
    certificate: X509,
}

impl TestCa {
    pub fn generate() -> Self {
        let key = generate_key(KeyKind::Rsa);
        let name = x509_name(&[(Nid::COUNTRYNAME, "EE"), (Nid::COMMONNAME, "TEST of ESTEID")]);

        let mut builder = X509Builder::new().unwrap();
        builder.set_version(2).unwrap();
        builder.set_serial_number(&serial_number()).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder
            .set_not_before(&Asn1Time::days_from_now(0).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::days_from_now(365).unwrap())
            .unwrap();
        builder
            .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
            .unwrap();
        builder.sign(&key, MessageDigest::sha256()).unwrap();

        Self {
            key,
            certificate: builder.build(),
        }
    }

    pub fn certificate_pem(&self) -> Vec<u8> {
        self.certificate.to_pem().unwrap()
    }

    pub fn certificate(&self) -> X509 {
        self.certificate.clone()
    }
}

/// A user certificate with its private key, able to answer signature requests.
pub struct TestSigner {
    kind: KeyKind,
    key: PKey<Private>,
    certificate: X509,
}

impl TestSigner {
    /// Self-signed certificate valid for a year.
    pub fn new(kind: KeyKind) -> Self {
        Self::build(kind, valid_period(), None)
    }

    /// Certificate issued by the given authority.
    pub fn issued_by(ca: &TestCa, kind: KeyKind) -> Self {
        Self::build(kind, valid_period(), Some(ca))
    }

    /// Certificate whose validity period ended yesterday.
    pub fn expired(kind: KeyKind) -> Self {
        let now = chrono::Utc::now().timestamp();
        let not_before = Asn1Time::from_unix(now - 2 * 86_400).unwrap();
        let not_after = Asn1Time::from_unix(now - 86_400).unwrap();
        Self::build(kind, (not_before, not_after), None)
    }

    fn build(kind: KeyKind, (not_before, not_after): (Asn1Time, Asn1Time), ca: Option<&TestCa>) -> Self {
        let key = generate_key(kind);
        let serial = format!("PNO{TEST_COUNTRY}-{TEST_IDENTITY_CODE}");
        let common_name = format!("{TEST_SURNAME},{TEST_GIVEN_NAME},{TEST_IDENTITY_CODE}");
        let subject = x509_name(&[
            (Nid::COUNTRYNAME, TEST_COUNTRY),
            (Nid::COMMONNAME, common_name.as_str()),
            (Nid::SURNAME, TEST_SURNAME),
            (Nid::GIVENNAME, TEST_GIVEN_NAME),
            (Nid::SERIALNUMBER, serial.as_str()),
        ]);

        let mut builder = X509Builder::new().unwrap();
        builder.set_version(2).unwrap();
        builder.set_serial_number(&serial_number()).unwrap();
        builder.set_subject_name(&subject).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder.set_not_before(&not_before).unwrap();
        builder.set_not_after(&not_after).unwrap();
        match ca {
            Some(ca) => {
                builder
                    .set_issuer_name(ca.certificate.subject_name())
                    .unwrap();
                builder.sign(&ca.key, MessageDigest::sha256()).unwrap();
            }
            None => {
                builder.set_issuer_name(&subject).unwrap();
                builder.sign(&key, MessageDigest::sha256()).unwrap();
            }
        }

        Self {
            kind,
            key,
            certificate: builder.build(),
        }
    }

    pub fn certificate_der(&self) -> Vec<u8> {
        self.certificate.to_der().unwrap()
    }

    pub fn algorithm(&self, hash_type: HashType) -> String {
        match self.kind {
            KeyKind::Ec => format!("{hash_type}WithECEncryption"),
            KeyKind::Rsa => format!("{hash_type}WithRSAEncryption"),
        }
    }

    /// Signs a precomputed hash the way the SIM application does.
    ///
    /// ECDSA signatures are returned as the raw concatenation of `r` and `s`.
    pub fn sign(&self, hash: &HashToSign) -> Vec<u8> {
        match self.kind {
            KeyKind::Ec => {
                let ec_key = self.key.ec_key().unwrap();
                let size = ((ec_key.group().degree() + 7) / 8) as i32;
                let signature = EcdsaSig::sign(hash.as_bytes(), &ec_key).unwrap();
                let mut value = signature.r().to_vec_padded(size).unwrap();
                value.extend(signature.s().to_vec_padded(size).unwrap());
                value
            }
            KeyKind::Rsa => {
                let rsa = self.key.rsa().unwrap();
                let digest_info = [hash.hash_type().digest_info_prefix(), hash.as_bytes()].concat();
                let mut value = vec![0u8; rsa.size() as usize];
                let len = rsa
                    .private_encrypt(&digest_info, &mut value, Padding::PKCS1)
                    .unwrap();
                value.truncate(len);
                value
            }
        }
    }

    /// Builds a successful session status carrying a signature over `hash`.
    pub fn signed_status(&self, hash: &HashToSign) -> SessionStatus {
        SessionStatus {
            state: SessionState::Complete,
            result: Some(SessionResult::Ok),
            signature: Some(SessionSignature {
                value: STANDARD.encode(self.sign(hash)),
                algorithm: self.algorithm(hash.hash_type()),
            }),
            cert: Some(STANDARD.encode(self.certificate_der())),
        }
    }
}

fn generate_key(kind: KeyKind) -> PKey<Private> {
    match kind {
        KeyKind::Ec => {
            let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
            PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
        }
        KeyKind::Rsa => PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap(),
    }
}

fn valid_period() -> (Asn1Time, Asn1Time) {
    (
        Asn1Time::days_from_now(0).unwrap(),
        Asn1Time::days_from_now(365).unwrap(),
    )
}

fn x509_name(entries: &[(Nid, &str)]) -> X509Name {
    let mut builder = X509NameBuilder::new().unwrap();
    for (nid, value) in entries {
        builder.append_entry_by_nid(*nid, value).unwrap();
    }
    builder.build()
}

fn serial_number() -> Asn1Integer {
    let mut serial = BigNum::new().unwrap();
    serial.rand(159, MsbOption::MAYBE_ZERO, false).unwrap();
    serial.to_asn1_integer().unwrap()
}

/// A scripted connector.
///
/// Status queries return the queued statuses in order, repeating the last one.
/// A successful status without a signature is completed with a signature over
/// the hash of the last submitted request, produced by the configured signer.
pub struct StubConnector {
    signer: Option<TestSigner>,
    statuses: Mutex<VecDeque<SessionStatus>>,
    submit_error: Option<fn() -> MidError>,
    last_hash: Mutex<Option<HashToSign>>,
    authentication_requests: Mutex<Vec<AuthenticationRequest>>,
    signature_requests: Mutex<Vec<SignatureRequest>>,
    status_queries: AtomicUsize,
}

impl StubConnector {
    pub fn new() -> Self {
        Self {
            signer: None,
            statuses: Mutex::new(VecDeque::new()),
            submit_error: None,
            last_hash: Mutex::new(None),
            authentication_requests: Mutex::new(Vec::new()),
            signature_requests: Mutex::new(Vec::new()),
            status_queries: AtomicUsize::new(0),
        }
    }

    /// A connector whose sessions complete immediately with a valid signature.
    pub fn succeeding(signer: TestSigner) -> Self {
        Self::new()
            .with_signer(signer)
            .with_status(SessionStatus::complete(SessionResult::Ok))
    }

    /// A connector whose sessions complete immediately with the given result.
    pub fn completing_with(result: SessionResult) -> Self {
        Self::new().with_status(SessionStatus::complete(result))
    }

    pub fn with_signer(mut self, signer: TestSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_status(self, status: SessionStatus) -> Self {
        self.statuses.lock().unwrap().push_back(status);
        self
    }

    /// Fails every authentication, signature and certificate request.
    pub fn with_submit_error(mut self, error: fn() -> MidError) -> Self {
        self.submit_error = Some(error);
        self
    }

    pub fn authentication_requests(&self) -> Vec<AuthenticationRequest> {
        self.authentication_requests.lock().unwrap().clone()
    }

    pub fn signature_requests(&self) -> Vec<SignatureRequest> {
        self.signature_requests.lock().unwrap().clone()
    }

    pub fn status_queries(&self) -> usize {
        self.status_queries.load(Ordering::SeqCst)
    }

    fn check_submit(&self) -> Result<(), MidError> {
        match self.submit_error {
            Some(error) => Err(error()),
            None => Ok(()),
        }
    }

    fn remember_hash(&self, hash_type: HashType, hash: &str) -> Result<(), MidError> {
        let hash = HashToSign::from_hash(hash_type, STANDARD.decode(hash)?);
        *self.last_hash.lock().unwrap() = Some(hash);
        Ok(())
    }

    fn next_status(&self) -> Option<SessionStatus> {
        let mut statuses = self.statuses.lock().unwrap();
        if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().cloned()
        }
    }
}

impl Default for StubConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MidConnector for StubConnector {
    async fn authenticate(&self, request: AuthenticationRequest) -> Result<String, MidError> {
        self.check_submit()?;
        self.remember_hash(request.hash_type, &request.hash)?;
        self.authentication_requests.lock().unwrap().push(request);
        Ok("stub-authentication-session".to_string())
    }

    async fn sign(&self, request: SignatureRequest) -> Result<String, MidError> {
        self.check_submit()?;
        self.remember_hash(request.hash_type, &request.hash)?;
        self.signature_requests.lock().unwrap().push(request);
        Ok("stub-signature-session".to_string())
    }

    async fn get_certificate(&self, _request: CertificateRequest) -> Result<Vec<u8>, MidError> {
        self.check_submit()?;
        self.signer
            .as_ref()
            .map(TestSigner::certificate_der)
            .ok_or(MidError::NotMidClient)
    }

    async fn get_session_status(
        &self,
        _kind: SessionKind,
        _session_id: &str,
        _long_poll_timeout: Duration,
    ) -> Result<SessionStatus, MidError> {
        self.status_queries.fetch_add(1, Ordering::SeqCst);
        let status = self
            .next_status()
            .ok_or_else(|| MidError::UnexpectedResponse("no scripted status".into()))?;

        let needs_signature = status.result == Some(SessionResult::Ok) && status.signature.is_none();
        match (&self.signer, needs_signature) {
            (Some(signer), true) => {
                let hash = self.last_hash.lock().unwrap().clone().ok_or_else(|| {
                    MidError::UnexpectedResponse("no request submitted".into())
                })?;
                Ok(signer.signed_status(&hash))
            }
            _ => Ok(status),
        }
    }
}
