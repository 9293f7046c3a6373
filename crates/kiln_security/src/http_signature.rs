//! HTTP message signatures for outbound extension requests.
//!
//! Requests carry three headers:
//!
//! ```text
//! Content-Digest: sha-256=:<base64>:
//! Signature-Input: sig1=("@method" "@target-uri" "content-digest" "content-type");created=1700000000;keyid="kiln-ci-extensions";alg="ed25519"
//! Signature: sig1=:<base64 ed25519 signature>:
//! ```
//!
//! The signature covers a canonical base built from the listed components,
//! one `"<name>": <value>` line each, terminated by the `@signature-params`
//! line. Body-less requests cover only `@method` and `@target-uri`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use crate::digest::content_digest;
use crate::error::SignatureVerifyError;
use crate::keys::SigningKeys;

pub const SIGNATURE_LABEL: &str = "sig1";
pub const SIGNATURE_ALGORITHM: &str = "ed25519";

pub const HEADER_SIGNATURE: &str = "Signature";
pub const HEADER_SIGNATURE_INPUT: &str = "Signature-Input";
pub const HEADER_CONTENT_DIGEST: &str = "Content-Digest";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Request fields a signature can cover.
#[derive(Debug, Clone, Copy)]
pub struct SignedRequest<'a> {
    pub method: &'a str,
    pub target_uri: &'a str,
    pub content_type: Option<&'a str>,
    pub body: Option<&'a [u8]>,
}

/// Header values produced by [`sign_request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeaders {
    pub signature_input: String,
    pub signature: String,
    pub content_digest: Option<String>,
}

fn covered_components(
    request: &SignedRequest<'_>,
    digest: Option<&str>,
) -> Vec<(&'static str, String)> {
    let mut components = vec![
        ("@method", request.method.to_uppercase()),
        ("@target-uri", request.target_uri.to_string()),
    ];
    if let Some(digest) = digest {
        components.push(("content-digest", digest.to_string()));
    }
    if let Some(content_type) = request.content_type {
        components.push(("content-type", content_type.to_string()));
    }
    components
}

/// `("@method" ...);created=..;keyid="..";alg="ed25519"`
pub fn signature_params(names: &[&str], created: i64, key_id: &str) -> String {
    let list = names
        .iter()
        .map(|name| format!("\"{}\"", name))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "({});created={};keyid=\"{}\";alg=\"{}\"",
        list, created, key_id, SIGNATURE_ALGORITHM
    )
}

/// Canonical string that gets signed.
pub fn signature_base(components: &[(&str, String)], params: &str) -> String {
    let mut base = String::new();
    for (name, value) in components {
        base.push_str(&format!("\"{}\": {}\n", name, value));
    }
    base.push_str(&format!("\"@signature-params\": {}", params));
    base
}

/// Sign `request` at unix time `created` under `key_id`.
pub fn sign_request(
    keys: &SigningKeys,
    key_id: &str,
    request: &SignedRequest<'_>,
    created: i64,
) -> SignatureHeaders {
    let digest = request.body.map(content_digest);
    let components = covered_components(request, digest.as_deref());
    let names: Vec<&str> = components.iter().map(|(name, _)| *name).collect();
    let params = signature_params(&names, created, key_id);
    let base = signature_base(&components, &params);
    let signature = keys.sign(base.as_bytes());

    SignatureHeaders {
        signature_input: format!("{}={}", SIGNATURE_LABEL, params),
        signature: format!("{}=:{}:", SIGNATURE_LABEL, STANDARD.encode(signature.to_bytes())),
        content_digest: digest,
    }
}

/// Receiver-side check of a signed request against the published key.
pub fn verify_request(
    key: &VerifyingKey,
    request: &SignedRequest<'_>,
    signature_input: Option<&str>,
    signature: Option<&str>,
    content_digest_header: Option<&str>,
) -> Result<(), SignatureVerifyError> {
    let input = signature_input.ok_or(SignatureVerifyError::MissingHeader(HEADER_SIGNATURE_INPUT))?;
    let signature = signature.ok_or(SignatureVerifyError::MissingHeader(HEADER_SIGNATURE))?;

    let label_prefix = format!("{}=", SIGNATURE_LABEL);
    let params = input
        .strip_prefix(&label_prefix)
        .ok_or_else(|| SignatureVerifyError::Malformed {
            header: HEADER_SIGNATURE_INPUT,
            reason: format!("expected label '{}'", SIGNATURE_LABEL),
        })?;
    let names = parse_component_names(params)?;

    let digest = match request.body {
        Some(body) => {
            let expected = content_digest(body);
            let received = content_digest_header
                .ok_or(SignatureVerifyError::MissingHeader(HEADER_CONTENT_DIGEST))?;
            if received != expected {
                return Err(SignatureVerifyError::DigestMismatch);
            }
            Some(expected)
        }
        None => None,
    };
    let components = covered_components(request, digest.as_deref());
    let component_names: Vec<&str> = components.iter().map(|(name, _)| *name).collect();
    if component_names != names {
        return Err(SignatureVerifyError::Malformed {
            header: HEADER_SIGNATURE_INPUT,
            reason: format!("covered components {:?} do not match request", names),
        });
    }
    let base = signature_base(&components, params);

    let encoded = signature
        .strip_prefix(&label_prefix)
        .and_then(|rest| rest.strip_prefix(':'))
        .and_then(|rest| rest.strip_suffix(':'))
        .ok_or_else(|| SignatureVerifyError::Malformed {
            header: HEADER_SIGNATURE,
            reason: "expected sig1=:<base64>:".to_string(),
        })?;
    let raw = STANDARD
        .decode(encoded)
        .map_err(|e| SignatureVerifyError::Malformed {
            header: HEADER_SIGNATURE,
            reason: e.to_string(),
        })?;
    let signature = Signature::from_slice(&raw).map_err(|e| SignatureVerifyError::Malformed {
        header: HEADER_SIGNATURE,
        reason: e.to_string(),
    })?;

    key.verify(base.as_bytes(), &signature)
        .map_err(|_| SignatureVerifyError::BadSignature)
}

fn parse_component_names(params: &str) -> Result<Vec<&str>, SignatureVerifyError> {
    let malformed = |reason: &str| SignatureVerifyError::Malformed {
        header: HEADER_SIGNATURE_INPUT,
        reason: reason.to_string(),
    };
    let inner = params
        .strip_prefix('(')
        .and_then(|rest| rest.split_once(')'))
        .map(|(inner, _)| inner)
        .ok_or_else(|| malformed("missing component list"))?;
    inner
        .split_whitespace()
        .map(|quoted| {
            quoted
                .strip_prefix('"')
                .and_then(|name| name.strip_suffix('"'))
                .ok_or_else(|| malformed("unquoted component name"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_ID: &str = "test-key";

    fn post<'a>(body: &'a [u8]) -> SignedRequest<'a> {
        SignedRequest {
            method: "POST",
            target_uri: "https://ext.example.com/secrets",
            content_type: Some(JSON_CONTENT_TYPE),
            body: Some(body),
        }
    }

    #[test]
    fn test_signature_base_layout() {
        let components = vec![
            ("@method", "POST".to_string()),
            ("@target-uri", "https://x/y".to_string()),
        ];
        let params = signature_params(&["@method", "@target-uri"], 1700000000, KEY_ID);
        assert_eq!(
            params,
            r#"("@method" "@target-uri");created=1700000000;keyid="test-key";alg="ed25519""#
        );
        assert_eq!(
            signature_base(&components, &params),
            format!(
                "\"@method\": POST\n\"@target-uri\": https://x/y\n\"@signature-params\": {}",
                params
            )
        );
    }

    #[test]
    fn test_sign_then_verify() {
        let keys = SigningKeys::generate();
        let body = br#"{"repo":{},"pipeline":{}}"#;
        let headers = sign_request(&keys, KEY_ID, &post(body), 1700000000);

        assert!(headers.signature_input.starts_with("sig1=(\"@method\" \"@target-uri\" \"content-digest\" \"content-type\")"));
        assert!(headers.signature_input.contains("keyid=\"test-key\""));
        assert!(headers.signature_input.contains("alg=\"ed25519\""));
        assert!(headers.content_digest.as_deref().unwrap().starts_with("sha-256=:"));

        verify_request(
            &keys.verifying_key(),
            &post(body),
            Some(&headers.signature_input),
            Some(&headers.signature),
            headers.content_digest.as_deref(),
        )
        .unwrap();
    }

    #[test]
    fn test_tampered_body_fails_digest() {
        let keys = SigningKeys::generate();
        let headers = sign_request(&keys, KEY_ID, &post(b"{\"a\":1}"), 1);
        let err = verify_request(
            &keys.verifying_key(),
            &post(b"{\"a\":2}"),
            Some(&headers.signature_input),
            Some(&headers.signature),
            headers.content_digest.as_deref(),
        )
        .unwrap_err();
        assert_eq!(err, SignatureVerifyError::DigestMismatch);
    }

    #[test]
    fn test_other_key_fails() {
        let keys = SigningKeys::generate();
        let other = SigningKeys::generate();
        let headers = sign_request(&keys, KEY_ID, &post(b"{}"), 1);
        let err = verify_request(
            &other.verifying_key(),
            &post(b"{}"),
            Some(&headers.signature_input),
            Some(&headers.signature),
            headers.content_digest.as_deref(),
        )
        .unwrap_err();
        assert_eq!(err, SignatureVerifyError::BadSignature);
    }

    #[test]
    fn test_bodyless_request_covers_method_and_target() {
        let keys = SigningKeys::generate();
        let request = SignedRequest {
            method: "get",
            target_uri: "https://ext.example.com/health",
            content_type: None,
            body: None,
        };
        let headers = sign_request(&keys, KEY_ID, &request, 5);
        assert!(headers.content_digest.is_none());
        assert!(headers
            .signature_input
            .starts_with("sig1=(\"@method\" \"@target-uri\");created=5"));
        verify_request(
            &keys.verifying_key(),
            &request,
            Some(&headers.signature_input),
            Some(&headers.signature),
            None,
        )
        .unwrap();
    }

    #[test]
    fn test_missing_headers_are_reported() {
        let keys = SigningKeys::generate();
        let err = verify_request(&keys.verifying_key(), &post(b"{}"), None, None, None).unwrap_err();
        assert_eq!(err, SignatureVerifyError::MissingHeader(HEADER_SIGNATURE_INPUT));
    }
}
