//! Envelope authenticity checks.
//!
//! Deliveries are signed by the publishing service with the private key of an
//! X.509 certificate it hosts under `SigningCertURL`. Verification is three
//! steps: the certificate URL must be served over https from a host matching
//! the signing-authority pattern, the certificate's RSA key is loaded (and
//! memoised per URL), and the PKCS#1 v1.5 signature is checked against the
//! canonical string-to-sign of the envelope.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use dashmap::DashMap;
use regex::Regex;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha1::{Digest, Sha1};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;
use url::Url;
use x509_cert::Certificate;
use x509_cert::der::{DecodePem, Encode};

use crate::envelope::{Envelope, EnvelopeType};

/// Hosts allowed to serve signing certificates unless configured otherwise.
pub const DEFAULT_SIGNING_HOST_PATTERN: &str = r"^sns\.[a-zA-Z0-9\-]{3,}\.amazonaws\.com(\.cn)?$";

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("envelope has no {0}")]
    Missing(&'static str),
    #[error("untrusted signing certificate url `{0}`")]
    UntrustedCertUrl(String),
    #[error("invalid signing host pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("unsupported signature version `{0}`")]
    UnsupportedVersion(String),
    #[error("signature is not valid base64")]
    Encoding,
    #[error("signing certificate unusable: {0}")]
    Certificate(String),
    #[error("signature does not match envelope")]
    Mismatch,
}

/// Decides whether an envelope really comes from the signing authority.
#[async_trait]
pub trait EnvelopeVerifier: Send + Sync {
    async fn verify(&self, envelope: &Envelope) -> Result<(), SignatureError>;
}

/// Where signing certificates come from.
#[async_trait]
pub trait CertificateSource: Send + Sync {
    async fn fetch_pem(&self, url: &Url) -> anyhow::Result<String>;
}

pub struct HttpCertificateSource {
    client: reqwest::Client,
}

impl HttpCertificateSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn with_timeout(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build certificate http client")?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl CertificateSource for HttpCertificateSource {
    async fn fetch_pem(&self, url: &Url) -> anyhow::Result<String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url}"))?;
        response.text().await.context("read certificate body")
    }
}

pub struct SnsSignatureVerifier {
    host_pattern: Regex,
    certificates: Arc<dyn CertificateSource>,
    keys: DashMap<String, RsaPublicKey>,
}

impl SnsSignatureVerifier {
    pub fn new(
        host_pattern: &str,
        certificates: Arc<dyn CertificateSource>,
    ) -> Result<Self, SignatureError> {
        Ok(Self {
            host_pattern: Regex::new(host_pattern)?,
            certificates,
            keys: DashMap::new(),
        })
    }

    pub fn check_cert_url(&self, raw: &str) -> Result<Url, SignatureError> {
        let url = Url::parse(raw).map_err(|_| SignatureError::UntrustedCertUrl(raw.to_string()))?;
        let trusted = url.scheme() == "https"
            && url
                .host_str()
                .is_some_and(|host| self.host_pattern.is_match(host));
        if trusted {
            Ok(url)
        } else {
            Err(SignatureError::UntrustedCertUrl(raw.to_string()))
        }
    }

    async fn public_key(&self, url: &Url) -> Result<RsaPublicKey, SignatureError> {
        if let Some(key) = self.keys.get(url.as_str()) {
            return Ok(key.clone());
        }
        let pem = self
            .certificates
            .fetch_pem(url)
            .await
            .map_err(|err| SignatureError::Certificate(format!("{err:#}")))?;
        let key = public_key_from_pem(&pem)?;
        debug!(%url, "cached signing certificate");
        self.keys.insert(url.as_str().to_string(), key.clone());
        Ok(key)
    }
}

#[async_trait]
impl EnvelopeVerifier for SnsSignatureVerifier {
    async fn verify(&self, envelope: &Envelope) -> Result<(), SignatureError> {
        let raw_url = envelope
            .signing_cert_url
            .as_deref()
            .ok_or(SignatureError::Missing("SigningCertURL"))?;
        let url = self.check_cert_url(raw_url)?;
        let key = self.public_key(&url).await?;
        verify_with_key(envelope, &key)
    }
}

/// Extracts the RSA public key of a PEM encoded X.509 certificate.
pub fn public_key_from_pem(pem: &str) -> Result<RsaPublicKey, SignatureError> {
    let cert = Certificate::from_pem(pem.as_bytes())
        .map_err(|err| SignatureError::Certificate(err.to_string()))?;
    let spki = cert
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|err| SignatureError::Certificate(err.to_string()))?;
    RsaPublicKey::from_public_key_der(&spki)
        .map_err(|err| SignatureError::Certificate(err.to_string()))
}

/// Checks the envelope signature against an already loaded key.
pub fn verify_with_key(envelope: &Envelope, key: &RsaPublicKey) -> Result<(), SignatureError> {
    let encoded = envelope
        .signature
        .as_deref()
        .ok_or(SignatureError::Missing("Signature"))?;
    let signature = B64
        .decode(encoded.trim())
        .map_err(|_| SignatureError::Encoding)?;
    let payload = string_to_sign(envelope);

    let outcome = match envelope.signature_version.as_deref().unwrap_or("1") {
        "1" => {
            let hashed = Sha1::digest(payload.as_bytes());
            key.verify(Pkcs1v15Sign::new::<Sha1>(), &hashed, &signature)
        }
        "2" => {
            let hashed = Sha256::digest(payload.as_bytes());
            key.verify(Pkcs1v15Sign::new::<Sha256>(), &hashed, &signature)
        }
        other => return Err(SignatureError::UnsupportedVersion(other.to_string())),
    };
    outcome.map_err(|_| SignatureError::Mismatch)
}

/// Canonical `key\nvalue\n` sequence the publisher signs.
///
/// Notifications sign `Subject` only when present; every other type signs the
/// subscription fields instead.
pub fn string_to_sign(envelope: &Envelope) -> String {
    let mut fields: Vec<(&str, &str)> = Vec::with_capacity(7);
    let message = envelope.message.as_deref().unwrap_or_default();
    fields.push(("Message", message));
    fields.push(("MessageId", envelope.message_id.as_str()));
    match envelope.kind {
        EnvelopeType::Notification => {
            if let Some(subject) = envelope.subject.as_deref() {
                fields.push(("Subject", subject));
            }
            fields.push(("Timestamp", envelope.timestamp.as_str()));
        }
        _ => {
            fields.push((
                "SubscribeURL",
                envelope.subscribe_url.as_deref().unwrap_or_default(),
            ));
            fields.push(("Timestamp", envelope.timestamp.as_str()));
            fields.push(("Token", envelope.token.as_deref().unwrap_or_default()));
        }
    }
    fields.push(("TopicArn", envelope.topic_arn.as_str()));
    fields.push(("Type", envelope.kind.as_str()));

    fields.iter().fold(String::new(), |mut out, (key, value)| {
        out.push_str(key);
        out.push('\n');
        out.push_str(value);
        out.push('\n');
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::RsaPrivateKey;

    struct NoCertificates;

    #[async_trait]
    impl CertificateSource for NoCertificates {
        async fn fetch_pem(&self, url: &Url) -> anyhow::Result<String> {
            anyhow::bail!("no certificate at {url}")
        }
    }

    fn verifier() -> SnsSignatureVerifier {
        SnsSignatureVerifier::new(DEFAULT_SIGNING_HOST_PATTERN, Arc::new(NoCertificates)).unwrap()
    }

    fn notification() -> Envelope {
        Envelope {
            kind: EnvelopeType::Notification,
            message_id: "m-1".into(),
            topic_arn: "arn:aws:sns:us-east-1:1:topic".into(),
            subject: Some("user_report:update".into()),
            message: Some(r#"{"user":{"id":"u1"}}"#.into()),
            timestamp: "2024-01-01T00:00:00.000Z".into(),
            signature_version: Some("1".into()),
            signature: None,
            signing_cert_url: Some("https://sns.us-east-1.amazonaws.com/cert.pem".into()),
            subscribe_url: None,
            token: None,
            unsubscribe_url: None,
        }
    }

    fn sign(envelope: &mut Envelope, key: &RsaPrivateKey) {
        let payload = string_to_sign(envelope);
        let signature = match envelope.signature_version.as_deref() {
            Some("2") => key
                .sign(
                    Pkcs1v15Sign::new::<Sha256>(),
                    &Sha256::digest(payload.as_bytes()),
                )
                .unwrap(),
            _ => key
                .sign(Pkcs1v15Sign::new::<Sha1>(), &Sha1::digest(payload.as_bytes()))
                .unwrap(),
        };
        envelope.signature = Some(B64.encode(signature));
    }

    fn keypair() -> (RsaPrivateKey, RsaPublicKey) {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let public = RsaPublicKey::from(&private);
        (private, public)
    }

    #[test]
    fn notification_string_includes_subject_when_present() {
        let env = notification();
        assert_eq!(
            string_to_sign(&env),
            "Message\n{\"user\":{\"id\":\"u1\"}}\nMessageId\nm-1\nSubject\nuser_report:update\n\
             Timestamp\n2024-01-01T00:00:00.000Z\nTopicArn\narn:aws:sns:us-east-1:1:topic\n\
             Type\nNotification\n"
        );

        let mut no_subject = notification();
        no_subject.subject = None;
        assert!(!string_to_sign(&no_subject).contains("Subject"));
    }

    #[test]
    fn confirmation_string_signs_subscription_fields() {
        let mut env = notification();
        env.kind = EnvelopeType::SubscriptionConfirmation;
        env.subject = None;
        env.subscribe_url = Some("https://sns.example/confirm".into());
        env.token = Some("tok".into());
        let payload = string_to_sign(&env);
        assert!(payload.contains("SubscribeURL\nhttps://sns.example/confirm\n"));
        assert!(payload.contains("Token\ntok\n"));
        assert!(payload.ends_with("Type\nSubscriptionConfirmation\n"));
    }

    #[test]
    fn cert_url_must_be_https_on_signing_host() {
        let verifier = verifier();
        assert!(verifier
            .check_cert_url("https://sns.eu-west-1.amazonaws.com/SimpleNotificationService.pem")
            .is_ok());
        assert!(verifier
            .check_cert_url("https://sns.cn-north-1.amazonaws.com.cn/cert.pem")
            .is_ok());
        for bad in [
            "http://sns.us-east-1.amazonaws.com/cert.pem",
            "https://sns.us-east-1.amazonaws.com.evil.io/cert.pem",
            "https://evil.io/sns.us-east-1.amazonaws.com/cert.pem",
            "not a url",
        ] {
            assert!(
                matches!(
                    verifier.check_cert_url(bad),
                    Err(SignatureError::UntrustedCertUrl(_))
                ),
                "{bad}"
            );
        }
    }

    #[test]
    fn invalid_host_pattern_is_reported() {
        let err = SnsSignatureVerifier::new("(unclosed", Arc::new(NoCertificates))
            .err()
            .unwrap();
        assert!(matches!(err, SignatureError::Pattern(_)));
    }

    #[test]
    fn verifies_v1_and_v2_signatures() {
        let (private, public) = keypair();
        let mut v1 = notification();
        sign(&mut v1, &private);
        assert!(verify_with_key(&v1, &public).is_ok());

        let mut v2 = notification();
        v2.signature_version = Some("2".into());
        sign(&mut v2, &private);
        assert!(verify_with_key(&v2, &public).is_ok());
    }

    #[test]
    fn tampered_envelope_fails() {
        let (private, public) = keypair();
        let mut env = notification();
        sign(&mut env, &private);
        env.subject = Some("ship:update".into());
        assert!(matches!(
            verify_with_key(&env, &public),
            Err(SignatureError::Mismatch)
        ));
    }

    #[test]
    fn rejects_unknown_versions_and_bad_encoding() {
        let (_, public) = keypair();
        let mut env = notification();
        env.signature = Some("%%%".into());
        assert!(matches!(
            verify_with_key(&env, &public),
            Err(SignatureError::Encoding)
        ));
        env.signature = Some(B64.encode(b"whatever"));
        env.signature_version = Some("3".into());
        assert!(matches!(
            verify_with_key(&env, &public),
            Err(SignatureError::UnsupportedVersion(v)) if v == "3"
        ));
    }

    #[tokio::test]
    async fn missing_certificate_url_is_invalid() {
        let mut env = notification();
        env.signing_cert_url = None;
        assert!(matches!(
            verifier().verify(&env).await,
            Err(SignatureError::Missing("SigningCertURL"))
        ));
    }

    #[tokio::test]
    async fn certificate_fetch_failure_is_invalid() {
        let mut env = notification();
        env.signature = Some(B64.encode(b"sig"));
        assert!(matches!(
            verifier().verify(&env).await,
            Err(SignatureError::Certificate(_))
        ));
    }
}
