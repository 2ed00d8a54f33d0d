use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use axum::body::Body;
use futures::FutureExt;
use http::Request;
use shiprelay_telemetry::{record_counter, record_histogram};
use tracing::{Instrument, debug, error, warn};

use crate::body::read_envelope;
use crate::cache::ShipCache;
use crate::config::RelayOptions;
use crate::dispatch::{DispatchContext, dispatch};
use crate::envelope::{Envelope, EnvelopeType};
use crate::error::{RelayError, panic_message};
use crate::event_name::EventName;
use crate::notification::decode_notification;
use crate::registry::HandlerRegistry;
use crate::request::RequestMeta;
use crate::response::{ErrorObserver, RelayOutcome, RelayResponse, translate};
use crate::ship::{HttpShipClientFactory, ShipClientFactory};
use crate::signature::{
    EnvelopeVerifier, HttpCertificateSource, SignatureError, SnsSignatureVerifier,
};
use crate::subscription::{HttpSubscriptionConfirmer, SubscriptionConfirmer};
use crate::tenant::TenantResolver;
use crate::traits::{GroupTraits, TraitGrouping};

/// Called with the confirmation envelope once a subscription is confirmed.
pub type SubscribeObserver = Arc<dyn Fn(&Envelope) + Send + Sync>;

/// One pass per delivery: read, verify, branch on type, resolve the tenant,
/// dispatch, translate.
pub struct RelayPipeline {
    options: RelayOptions,
    verifier: Arc<dyn EnvelopeVerifier>,
    confirmer: Arc<dyn SubscriptionConfirmer>,
    resolver: TenantResolver,
    registry: Arc<HandlerRegistry>,
    grouping: Option<Arc<dyn TraitGrouping>>,
    on_subscribe: Option<SubscribeObserver>,
    on_error: Option<ErrorObserver>,
}

impl RelayPipeline {
    pub fn builder() -> RelayPipelineBuilder {
        RelayPipelineBuilder::default()
    }

    pub fn options(&self) -> &RelayOptions {
        &self.options
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn cache(&self) -> &ShipCache {
        self.resolver.cache()
    }

    pub async fn handle(&self, request: Request<Body>) -> RelayResponse {
        let (parts, body) = request.into_parts();
        let span = tracing::info_span!(
            "relay",
            method = %parts.method,
            path = %parts.uri.path(),
        );
        async move {
            let started = Instant::now();
            let meta = Arc::new(RequestMeta::from_parts(&parts));
            let result = AssertUnwindSafe(self.process(meta, body))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    let message = panic_message(payload.as_ref());
                    error!(panic = %message, "relay pipeline panicked");
                    Err(RelayError::InternalError(message))
                });
            let response = translate(result, self.on_error.as_ref());
            record_histogram(
                "shiprelay_request_seconds",
                started.elapsed().as_secs_f64(),
                &vec![("status", response.status.as_u16().to_string())],
            );
            response
        }
        .instrument(span)
        .await
    }

    async fn process(
        &self,
        request: Arc<RequestMeta>,
        body: Body,
    ) -> Result<RelayOutcome, RelayError> {
        let envelope = read_envelope(body, self.options.max_body_bytes).await?;
        self.check_signature(&envelope).await?;

        match &envelope.kind {
            EnvelopeType::SubscriptionConfirmation => self.subscribe(&envelope).await,
            EnvelopeType::Notification => self.notify(&envelope, request).await,
            EnvelopeType::Other(kind) => Err(RelayError::UnrecognizedType(kind.clone())),
        }
    }

    async fn check_signature(&self, envelope: &Envelope) -> Result<(), RelayError> {
        match self.verifier.verify(envelope).await {
            Ok(()) => Ok(()),
            Err(err) if self.options.enforce_signature => Err(RelayError::SignatureInvalid(err)),
            Err(err) => {
                warn!(
                    message_id = %envelope.message_id,
                    error = %err,
                    "signature check failed; continuing because enforcement is off"
                );
                Ok(())
            }
        }
    }

    async fn subscribe(&self, envelope: &Envelope) -> Result<RelayOutcome, RelayError> {
        let url = envelope
            .subscribe_url
            .as_deref()
            .ok_or_else(|| RelayError::SubscriptionFailed(anyhow!("envelope has no SubscribeURL")))?;
        self.confirmer
            .confirm(url)
            .await
            .map_err(RelayError::SubscriptionFailed)?;
        if let Some(observer) = &self.on_subscribe {
            observer(envelope);
        }
        Ok(RelayOutcome::Subscribed)
    }

    async fn notify(
        &self,
        envelope: &Envelope,
        request: Arc<RequestMeta>,
    ) -> Result<RelayOutcome, RelayError> {
        let notification = decode_notification(envelope, self.grouping.as_deref())?;
        let name = EventName::from_subject(&notification.subject);
        debug!(event = %name, subject = %notification.subject, "notification decoded");
        record_counter(
            "shiprelay_notifications_total",
            1,
            &vec![("event", name.to_string())],
        );

        let tenant = self
            .resolver
            .resolve(&request.query, Some(&notification))
            .await?;
        let ctx = DispatchContext::new(request, tenant);
        let report = dispatch(&self.registry, &name, Arc::new(notification), ctx).await?;
        Ok(RelayOutcome::Dispatched {
            invoked: report.invoked,
        })
    }
}

/// Collaborators left unset fall back to the HTTP implementations sharing
/// one `reqwest` client.
#[derive(Default)]
pub struct RelayPipelineBuilder {
    options: RelayOptions,
    http: Option<reqwest::Client>,
    verifier: Option<Arc<dyn EnvelopeVerifier>>,
    confirmer: Option<Arc<dyn SubscriptionConfirmer>>,
    ships: Option<Arc<dyn ShipClientFactory>>,
    cache: Option<ShipCache>,
    registry: Option<Arc<HandlerRegistry>>,
    grouping: Option<Arc<dyn TraitGrouping>>,
    on_subscribe: Option<SubscribeObserver>,
    on_error: Option<ErrorObserver>,
}

impl RelayPipelineBuilder {
    pub fn options(mut self, options: RelayOptions) -> Self {
        self.options = options;
        self
    }

    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http = Some(client);
        self
    }

    pub fn verifier(mut self, verifier: Arc<dyn EnvelopeVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn confirmer(mut self, confirmer: Arc<dyn SubscriptionConfirmer>) -> Self {
        self.confirmer = Some(confirmer);
        self
    }

    pub fn ship_clients(mut self, factory: Arc<dyn ShipClientFactory>) -> Self {
        self.ships = Some(factory);
        self
    }

    pub fn cache(mut self, cache: ShipCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn registry(mut self, registry: Arc<HandlerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Replaces [`GroupTraits`]; ignored when `group_traits` is off.
    pub fn trait_grouping(mut self, grouping: Arc<dyn TraitGrouping>) -> Self {
        self.grouping = Some(grouping);
        self
    }

    pub fn on_subscribe(mut self, observer: impl Fn(&Envelope) + Send + Sync + 'static) -> Self {
        self.on_subscribe = Some(Arc::new(observer));
        self
    }

    pub fn on_error(mut self, observer: impl Fn(&RelayError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(observer));
        self
    }

    pub fn build(self) -> Result<RelayPipeline, SignatureError> {
        let http = self.http.unwrap_or_default();
        let verifier = match self.verifier {
            Some(verifier) => verifier,
            None => Arc::new(SnsSignatureVerifier::new(
                &self.options.signing_host_pattern,
                Arc::new(HttpCertificateSource::new(http.clone())),
            )?),
        };
        let confirmer = self
            .confirmer
            .unwrap_or_else(|| Arc::new(HttpSubscriptionConfirmer::new(http.clone())));
        let ships = self
            .ships
            .unwrap_or_else(|| Arc::new(HttpShipClientFactory::new(http)));
        let grouping = self.options.group_traits.then(|| {
            self.grouping
                .unwrap_or_else(|| Arc::new(GroupTraits) as Arc<dyn TraitGrouping>)
        });

        Ok(RelayPipeline {
            verifier,
            confirmer,
            resolver: TenantResolver::new(ships, self.cache.unwrap_or_default()),
            registry: self.registry.unwrap_or_default(),
            grouping,
            on_subscribe: self.on_subscribe,
            on_error: self.on_error,
            options: self.options,
        })
    }
}
