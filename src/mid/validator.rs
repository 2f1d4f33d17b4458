use std::path::Path;

use color_eyre::eyre::{Context, Result};
use openssl::bn::BigNum;
use openssl::ecdsa::EcdsaSig;
use openssl::pkey::{Id, PKey, Public};
use openssl::rsa::Padding;
use openssl::x509::X509;
use tracing::{debug, warn};
use x509_parser::der_parser::oid::Oid;
use x509_parser::oid_registry::{
    OID_X509_COUNTRY_NAME, OID_X509_GIVEN_NAME, OID_X509_SERIALNUMBER, OID_X509_SURNAME,
};
use x509_parser::prelude::{FromDer, X509Certificate, X509Name};

use super::{HashToSign, MidAuthentication, SessionResult};
use crate::models::{AuthenticationIdentity, strip_semantics_prefix};

const INVALID_RESULT: &str = "Response result verification failed";
const INVALID_SIGNATURE: &str = "Signature verification failed";
const CERTIFICATE_EXPIRED: &str = "Signer's certificate expired";
const CERTIFICATE_UNTRUSTED: &str = "Signer's certificate is not trusted";
const UNREADABLE_CERTIFICATE: &str = "Signer's certificate could not be parsed";

/// Validates signatures returned by Mobile-ID and extracts the signer identity.
#[derive(Clone, Default)]
pub struct ResponseValidator {
    trust_anchors: Vec<X509>,
}

impl ResponseValidator {
    /// Creates a validator trusting the given issuer certificates.
    ///
    /// An empty list disables the issuer check.
    pub fn new(trust_anchors: Vec<X509>) -> Self {
        if trust_anchors.is_empty() {
            warn!("No trusted certificates configured, certificate issuers will not be checked");
        }
        Self { trust_anchors }
    }

    /// Loads the trusted issuer certificates from PEM files.
    pub fn from_pem_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut trust_anchors = Vec::new();
        for path in paths {
            let path = path.as_ref();
            let pem = std::fs::read(path)
                .wrap_err_with(|| format!("Reading trusted certificate {}", path.display()))?;
            let certificates = X509::stack_from_pem(&pem)
                .wrap_err_with(|| format!("Parsing trusted certificate {}", path.display()))?;
            trust_anchors.extend(certificates);
        }
        Ok(Self::new(trust_anchors))
    }

    /// Validates an authentication response.
    ///
    /// All checks run; the returned errors list every failed one.
    pub fn validate(
        &self,
        authentication: &MidAuthentication,
    ) -> Result<AuthenticationIdentity, Vec<String>> {
        let mut errors = Vec::new();
        if authentication.result != SessionResult::Ok {
            errors.push(INVALID_RESULT.to_string());
        }

        match self.validate_signature(
            &authentication.certificate,
            &authentication.hash,
            &authentication.signature.value,
        ) {
            Ok(identity) if errors.is_empty() => Ok(identity),
            Ok(_) => Err(errors),
            Err(more) => {
                errors.extend(more);
                Err(errors)
            }
        }
    }

    /// Checks that `signature` is a valid signature of `hash` made with the key
    /// of `certificate_der`, and that the certificate is valid and trusted.
    pub fn validate_signature(
        &self,
        certificate_der: &[u8],
        hash: &HashToSign,
        signature: &[u8],
    ) -> Result<AuthenticationIdentity, Vec<String>> {
        let Ok((_, parsed)) = X509Certificate::from_der(certificate_der) else {
            return Err(vec![UNREADABLE_CERTIFICATE.to_string()]);
        };
        let Ok(certificate) = X509::from_der(certificate_der) else {
            return Err(vec![UNREADABLE_CERTIFICATE.to_string()]);
        };

        let mut errors = Vec::new();
        if !is_signature_valid(&certificate, hash, signature) {
            errors.push(INVALID_SIGNATURE.to_string());
        }
        if !parsed.validity().is_valid() {
            errors.push(CERTIFICATE_EXPIRED.to_string());
        }
        if !self.is_trusted(&certificate) {
            errors.push(CERTIFICATE_UNTRUSTED.to_string());
        }

        if errors.is_empty() {
            Ok(identity_from_subject(parsed.subject()))
        } else {
            debug!(?errors, "Response validation failed");
            Err(errors)
        }
    }

    fn is_trusted(&self, certificate: &X509) -> bool {
        if self.trust_anchors.is_empty() {
            return true;
        }
        self.trust_anchors.iter().any(|anchor| {
            anchor
                .public_key()
                .and_then(|key| certificate.verify(&key))
                .unwrap_or(false)
        })
    }
}

fn is_signature_valid(certificate: &X509, hash: &HashToSign, signature: &[u8]) -> bool {
    let Ok(key) = certificate.public_key() else {
        return false;
    };
    match key.id() {
        Id::EC => verify_ecdsa(&key, hash, signature),
        Id::RSA => verify_rsa(&key, hash, signature),
        other => {
            warn!(?other, "Unsupported signer key type");
            false
        }
    }
}

/// ECDSA signatures are the raw concatenation of `r` and `s`.
fn verify_ecdsa(key: &PKey<Public>, hash: &HashToSign, signature: &[u8]) -> bool {
    if signature.is_empty() || signature.len() % 2 != 0 {
        return false;
    }
    let (r, s) = signature.split_at(signature.len() / 2);
    let verified = (|| {
        let ec_key = key.ec_key()?;
        let signature =
            EcdsaSig::from_private_components(BigNum::from_slice(r)?, BigNum::from_slice(s)?)?;
        signature.verify(hash.as_bytes(), &ec_key)
    })();
    verified.unwrap_or(false)
}

/// RSA signatures carry a PKCS#1 v1.5 `DigestInfo` of the hash.
fn verify_rsa(key: &PKey<Public>, hash: &HashToSign, signature: &[u8]) -> bool {
    let Ok(rsa) = key.rsa() else {
        return false;
    };
    let mut decrypted = vec![0u8; rsa.size() as usize];
    let Ok(len) = rsa.public_decrypt(signature, &mut decrypted, Padding::PKCS1) else {
        return false;
    };
    decrypted.truncate(len);

    let prefix = hash.hash_type().digest_info_prefix();
    decrypted.len() == prefix.len() + hash.as_bytes().len()
        && decrypted.starts_with(prefix)
        && decrypted.ends_with(hash.as_bytes())
}

fn identity_from_subject(subject: &X509Name<'_>) -> AuthenticationIdentity {
    let serial_number = subject_attribute(subject, &OID_X509_SERIALNUMBER);
    AuthenticationIdentity {
        given_name: subject_attribute(subject, &OID_X509_GIVEN_NAME),
        surname: subject_attribute(subject, &OID_X509_SURNAME),
        identity_code: strip_semantics_prefix(&serial_number).to_string(),
        country: subject_attribute(subject, &OID_X509_COUNTRY_NAME),
    }
}

fn subject_attribute<'a>(subject: &X509Name<'a>, oid: &Oid<'a>) -> String {
    subject
        .iter_by_oid(oid)
        .next()
        .and_then(|value| value.as_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mid::testing::{
        KeyKind, TEST_COUNTRY, TEST_GIVEN_NAME, TEST_IDENTITY_CODE, TEST_SURNAME, TestCa,
        TestSigner,
    };
    use crate::mid::{HashType, MidSignature};

    fn authentication(signer: &TestSigner, hash: &HashToSign) -> MidAuthentication {
        MidAuthentication {
            result: SessionResult::Ok,
            signature: MidSignature {
                value: signer.sign(hash),
                algorithm: signer.algorithm(hash.hash_type()),
            },
            certificate: signer.certificate_der(),
            hash: hash.clone(),
        }
    }

    #[test]
    fn test_valid_ec_authentication() {
        let signer = TestSigner::new(KeyKind::Ec);
        let hash = HashToSign::random(HashType::Sha256);

        let identity = ResponseValidator::default()
            .validate(&authentication(&signer, &hash))
            .unwrap();

        assert_eq!(identity.given_name, TEST_GIVEN_NAME);
        assert_eq!(identity.surname, TEST_SURNAME);
        assert_eq!(identity.identity_code, TEST_IDENTITY_CODE);
        assert_eq!(identity.country, TEST_COUNTRY);
    }

    #[test]
    fn test_valid_rsa_signature() {
        let signer = TestSigner::new(KeyKind::Rsa);
        let hash = HashToSign::of_data(HashType::Sha512, b"document");

        let identity = ResponseValidator::default()
            .validate_signature(&signer.certificate_der(), &hash, &signer.sign(&hash))
            .unwrap();
        assert_eq!(identity.identity_code, TEST_IDENTITY_CODE);
    }

    #[test]
    fn test_signature_over_other_hash_is_rejected() {
        let signer = TestSigner::new(KeyKind::Ec);
        let signed = HashToSign::random(HashType::Sha256);
        let mut response = authentication(&signer, &signed);
        response.hash = HashToSign::random(HashType::Sha256);

        let errors = ResponseValidator::default().validate(&response).unwrap_err();
        assert_eq!(errors, vec![INVALID_SIGNATURE.to_string()]);
    }

    #[test]
    fn test_tampered_rsa_signature_is_rejected() {
        let signer = TestSigner::new(KeyKind::Rsa);
        let hash = HashToSign::random(HashType::Sha256);
        let mut response = authentication(&signer, &hash);
        response.signature.value[10] ^= 0xFF;

        let errors = ResponseValidator::default().validate(&response).unwrap_err();
        assert!(errors.contains(&INVALID_SIGNATURE.to_string()));
    }

    #[test]
    fn test_expired_certificate_is_rejected() {
        let signer = TestSigner::expired(KeyKind::Ec);
        let hash = HashToSign::random(HashType::Sha256);

        let errors = ResponseValidator::default()
            .validate(&authentication(&signer, &hash))
            .unwrap_err();
        assert_eq!(errors, vec![CERTIFICATE_EXPIRED.to_string()]);
    }

    #[test]
    fn test_non_ok_result_is_rejected() {
        let signer = TestSigner::new(KeyKind::Ec);
        let hash = HashToSign::random(HashType::Sha256);
        let mut response = authentication(&signer, &hash);
        response.result = SessionResult::Unknown;

        let errors = ResponseValidator::default().validate(&response).unwrap_err();
        assert_eq!(errors, vec![INVALID_RESULT.to_string()]);
    }

    #[test]
    fn test_trust_anchors() {
        let ca = TestCa::generate();
        let hash = HashToSign::random(HashType::Sha256);
        let validator = ResponseValidator::new(vec![ca.certificate()]);

        let trusted = TestSigner::issued_by(&ca, KeyKind::Ec);
        assert!(validator.validate(&authentication(&trusted, &hash)).is_ok());

        let untrusted = TestSigner::issued_by(&TestCa::generate(), KeyKind::Ec);
        let errors = validator
            .validate(&authentication(&untrusted, &hash))
            .unwrap_err();
        assert_eq!(errors, vec![CERTIFICATE_UNTRUSTED.to_string()]);
    }

    #[test]
    fn test_garbage_certificate() {
        let hash = HashToSign::random(HashType::Sha256);
        let errors = ResponseValidator::default()
            .validate_signature(b"not a certificate", &hash, &[1, 2, 3])
            .unwrap_err();
        assert_eq!(errors, vec![UNREADABLE_CERTIFICATE.to_string()]);
    }
}
