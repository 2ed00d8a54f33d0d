#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use http::Request;
use serde_json::{Value, json};
use shiprelay_core::{
    ApiError, Envelope, EnvelopeType, EnvelopeVerifier, HandlerRegistry, RelayOptions,
    RelayPipeline, ShipApi, ShipClientFactory, SignatureError, SubscriptionConfirmer, TenantConfig,
};

pub const TENANT_QUERY: &str = "organization=acme.example.io&ship=ship-1&secret=s3cr3t";

pub struct AcceptAll;

#[async_trait]
impl EnvelopeVerifier for AcceptAll {
    async fn verify(&self, _envelope: &Envelope) -> Result<(), SignatureError> {
        Ok(())
    }
}

pub struct RejectAll;

#[async_trait]
impl EnvelopeVerifier for RejectAll {
    async fn verify(&self, _envelope: &Envelope) -> Result<(), SignatureError> {
        Err(SignatureError::Mismatch)
    }
}

#[derive(Default)]
pub struct RecordingConfirmer {
    pub urls: Mutex<Vec<String>>,
    pub fail: bool,
}

#[async_trait]
impl SubscriptionConfirmer for RecordingConfirmer {
    async fn confirm(&self, subscribe_url: &str) -> anyhow::Result<()> {
        self.urls.lock().unwrap().push(subscribe_url.to_string());
        if self.fail {
            anyhow::bail!("endpoint refused confirmation");
        }
        Ok(())
    }
}

/// Ship API double counting fetches; each fetch returns a bumped `version`.
pub struct CountingShips {
    pub fetches: AtomicUsize,
    pub tenants: Mutex<Vec<TenantConfig>>,
    pub delay: Duration,
    pub fail_next: AtomicUsize,
}

impl CountingShips {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            fetches: AtomicUsize::new(0),
            tenants: Mutex::new(Vec::new()),
            delay,
            fail_next: AtomicUsize::new(0),
        })
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ShipApi for CountingShips {
    async fn fetch_ship(&self, ship_id: &str) -> Result<Value, ApiError> {
        let version = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        let failing = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ApiError::Other(format!("ship {ship_id} unavailable")));
        }
        Ok(json!({ "id": ship_id, "version": version }))
    }
}

pub struct CountingShipFactory(pub Arc<CountingShips>);

impl ShipClientFactory for CountingShipFactory {
    fn client_for(&self, tenant: &TenantConfig) -> Arc<dyn ShipApi> {
        self.0.tenants.lock().unwrap().push(tenant.clone());
        self.0.clone()
    }
}

pub struct Harness {
    pub pipeline: RelayPipeline,
    pub ships: Arc<CountingShips>,
    pub confirmer: Arc<RecordingConfirmer>,
    pub registry: Arc<HandlerRegistry>,
}

pub fn harness(verifier: Arc<dyn EnvelopeVerifier>, options: RelayOptions) -> Harness {
    harness_with_confirmer(verifier, options, RecordingConfirmer::default())
}

pub fn harness_with_confirmer(
    verifier: Arc<dyn EnvelopeVerifier>,
    options: RelayOptions,
    confirmer: RecordingConfirmer,
) -> Harness {
    let ships = CountingShips::new(Duration::from_millis(30));
    let confirmer = Arc::new(confirmer);
    let registry = Arc::new(HandlerRegistry::new());
    let pipeline = RelayPipeline::builder()
        .options(options)
        .verifier(verifier)
        .confirmer(confirmer.clone())
        .ship_clients(Arc::new(CountingShipFactory(ships.clone())))
        .registry(registry.clone())
        .build()
        .unwrap();
    Harness {
        pipeline,
        ships,
        confirmer,
        registry,
    }
}

pub fn notification(subject: &str, message: Value) -> Envelope {
    Envelope {
        kind: EnvelopeType::Notification,
        message_id: "2f3c9a1e-0001".into(),
        topic_arn: "arn:aws:sns:us-east-1:123456789012:relay".into(),
        subject: Some(subject.into()),
        message: Some(message.to_string()),
        timestamp: "2024-05-01T12:30:00.000Z".into(),
        signature_version: Some("1".into()),
        signature: None,
        signing_cert_url: Some(
            "https://sns.us-east-1.amazonaws.com/SimpleNotificationService.pem".into(),
        ),
        subscribe_url: None,
        token: None,
        unsubscribe_url: None,
    }
}

pub fn confirmation(subscribe_url: Option<&str>) -> Envelope {
    Envelope {
        kind: EnvelopeType::SubscriptionConfirmation,
        subject: None,
        message: Some("You have chosen to subscribe to the topic.".into()),
        subscribe_url: subscribe_url.map(str::to_string),
        token: Some("2336412f37".into()),
        ..notification("", json!({}))
    }
}

pub fn delivery(query: &str, envelope: &Envelope) -> Request<Body> {
    raw_delivery(query, serde_json::to_vec(envelope).unwrap())
}

pub fn raw_delivery(query: &str, body: impl Into<Body>) -> Request<Body> {
    let uri = if query.is_empty() {
        "/notify".to_string()
    } else {
        format!("/notify?{query}")
    };
    Request::post(uri)
        .header("content-type", "text/plain; charset=UTF-8")
        .header("x-amz-sns-message-type", "Notification")
        .body(body.into())
        .unwrap()
}
