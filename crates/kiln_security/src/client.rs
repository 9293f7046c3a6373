//! Signed JSON HTTP client used by every extension transport.

use kiln_protocol::defaults::SIGNATURE_KEY_ID;
use kiln_store::RequestContext;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::HttpError;
use crate::http_signature::{
    sign_request, SignedRequest, HEADER_CONTENT_DIGEST, HEADER_SIGNATURE, HEADER_SIGNATURE_INPUT,
    JSON_CONTENT_TYPE,
};
use crate::keys::SigningKeys;

/// Sends JSON requests signed with the server key.
///
/// Only the request is authenticated: responses are trusted as received.
#[derive(Clone)]
pub struct SignedClient {
    http: reqwest::Client,
    keys: Arc<SigningKeys>,
    key_id: String,
}

impl SignedClient {
    /// `timeout` bounds every call made by this client.
    pub fn new(keys: Arc<SigningKeys>, timeout: Duration) -> Result<Self, HttpError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(HttpError::Transport)?;
        Ok(Self {
            http,
            keys,
            key_id: SIGNATURE_KEY_ID.to_string(),
        })
    }

    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = key_id.into();
        self
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Send `body` (if any) as JSON and decode a `200` answer into `R`.
    ///
    /// Any other status yields [`HttpError::Status`] with the raw body text,
    /// so callers can treat specific codes (such as `204`) as non-errors.
    pub async fn send<B, R>(
        &self,
        ctx: &RequestContext,
        method: Method,
        url: &str,
        body: Option<&B>,
    ) -> Result<R, HttpError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let target = Url::parse(url).map_err(|e| HttpError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let payload = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(HttpError::Encode)?;

        let signed = SignedRequest {
            method: method.as_str(),
            target_uri: target.as_str(),
            content_type: payload.as_ref().map(|_| JSON_CONTENT_TYPE),
            body: payload.as_deref(),
        };
        let headers = sign_request(&self.keys, &self.key_id, &signed, chrono::Utc::now().timestamp());

        let mut request = self
            .http
            .request(method.clone(), target.clone())
            .header(HEADER_SIGNATURE_INPUT, headers.signature_input)
            .header(HEADER_SIGNATURE, headers.signature);
        if let Some(digest) = headers.content_digest {
            request = request.header(HEADER_CONTENT_DIGEST, digest);
        }
        if let Some(payload) = payload {
            request = request.header(CONTENT_TYPE, JSON_CONTENT_TYPE).body(payload);
        }
        if let Some(remaining) = ctx.remaining() {
            request = request.timeout(remaining);
        }

        let response = ctx
            .run(request.send())
            .await?
            .map_err(HttpError::from_reqwest)?;
        let status = response.status();
        debug!(method = %method, url = %target, status = status.as_u16(), "Extension responded");

        if status != StatusCode::OK {
            let body = ctx
                .run(response.text())
                .await?
                .unwrap_or_default();
            return Err(HttpError::Status {
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        let bytes = ctx
            .run(response.bytes())
            .await?
            .map_err(HttpError::from_reqwest)?;
        serde_json::from_slice(&bytes).map_err(HttpError::Decode)
    }
}
