//! [`PushTransport`] over the Web Push protocol.

use async_trait::async_trait;
use duebell_core::config::VapidConfig;
use duebell_core::error::{DuebellError, Result};
use duebell_core::traits::{PushTransport, TransportError};
use duebell_core::types::PushEndpoint;
use web_push::{
    ContentEncoding, IsahcWebPushClient, SubscriptionInfo, VapidSignatureBuilder, WebPushClient,
    WebPushError, WebPushMessage, WebPushMessageBuilder,
};

/// Web Push transport. One HTTP client shared by every send of a run.
pub struct WebPushTransport {
    client: IsahcWebPushClient,
    vapid: VapidConfig,
    ttl_secs: u32,
}

impl WebPushTransport {
    pub fn new(vapid: &VapidConfig, ttl_secs: u32) -> Result<Self> {
        let client = IsahcWebPushClient::new().map_err(|e| {
            DuebellError::ConfigIncomplete(format!("Web Push client init failed: {e}"))
        })?;
        Ok(Self {
            client,
            vapid: vapid.clone(),
            ttl_secs,
        })
    }

    /// Sign and encrypt one message for `endpoint`.
    fn build_message(
        &self,
        endpoint: &PushEndpoint,
        payload: &[u8],
    ) -> std::result::Result<WebPushMessage, WebPushError> {
        let info = SubscriptionInfo::new(
            endpoint.endpoint.as_str(),
            endpoint.keys.p256dh.as_str(),
            endpoint.keys.auth.as_str(),
        );

        let mut signature = VapidSignatureBuilder::from_base64(
            &self.vapid.private_key,
            web_push::URL_SAFE_NO_PAD,
            &info,
        )?;
        signature.add_claim("sub", self.vapid.subject.as_str());
        let signature = signature.build()?;

        let mut builder = WebPushMessageBuilder::new(&info);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload);
        builder.set_vapid_signature(signature);
        builder.set_ttl(self.ttl_secs);
        builder.build()
    }
}

/// Map a `web-push` error onto the transport taxonomy.
fn classify(err: &WebPushError) -> TransportError {
    classify_kind(err.short_description(), err.to_string())
}

/// The push service answers 410 for an unsubscribed endpoint and 404 for an
/// unknown one; both mean the subscription is dead.
fn classify_kind(short_description: &str, message: String) -> TransportError {
    match short_description {
        "endpoint_not_valid" => TransportError::from_status(410, message),
        "endpoint_not_found" => TransportError::from_status(404, message),
        _ => TransportError::other(message),
    }
}

#[async_trait]
impl PushTransport for WebPushTransport {
    fn name(&self) -> &str {
        "web-push"
    }

    async fn send(
        &self,
        endpoint: &PushEndpoint,
        payload: &[u8],
    ) -> std::result::Result<(), TransportError> {
        let message = self.build_message(endpoint, payload).map_err(|e| {
            tracing::debug!("🔐 Could not build push message for {}: {e}", endpoint.endpoint);
            classify(&e)
        })?;
        self.client.send(message).await.map_err(|e| classify(&e))
    }
}
