//! Inbound notification relay.
//!
//! A delivery flows through [`RelayPipeline`]: the body is decoded into an
//! [`Envelope`], its signature checked, subscription confirmations are
//! answered, and notifications are resolved to a tenant and dispatched to the
//! handlers of a [`HandlerRegistry`].

pub mod body;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod event_name;
pub mod notification;
pub mod pipeline;
pub mod registry;
pub mod request;
pub mod response;
pub mod ship;
pub mod signature;
pub mod subscription;
pub mod tenant;
pub mod traits;

pub use body::{DEFAULT_MAX_BODY_BYTES, decode_envelope, read_envelope};
pub use cache::{ShipCache, ShipResult};
pub use config::RelayOptions;
pub use dispatch::{DispatchContext, DispatchReport, dispatch};
pub use envelope::{Envelope, EnvelopeType};
pub use error::{HandlerError, RelayError};
pub use event_name::{EventName, SHIP_UPDATE, USER_UPDATE};
pub use notification::{EVENT_SUBJECT, Notification, decode_notification};
pub use pipeline::{RelayPipeline, RelayPipelineBuilder, SubscribeObserver};
pub use registry::{HandlerRegistry, NotificationHandler, SharedHandler, handler_fn};
pub use request::{QueryParams, RequestMeta};
pub use response::{ErrorObserver, RelayOutcome, RelayResponse, translate};
pub use ship::{ApiError, HttpShipClient, HttpShipClientFactory, ShipApi, ShipClientFactory};
pub use signature::{
    CertificateSource, DEFAULT_SIGNING_HOST_PATTERN, EnvelopeVerifier, HttpCertificateSource,
    SignatureError, SnsSignatureVerifier,
};
pub use subscription::{HttpSubscriptionConfirmer, SubscriptionConfirmer};
pub use tenant::{TenantConfig, TenantContext, TenantResolver};
pub use traits::{GroupTraits, TraitGrouping};
