//! Extensions over signed HTTP, alone and layered on a Store catalog.

use kiln_credentials::{
    Catalog, CredentialExtension, CredentialService, ExtendedCatalog, ExtensionError, HttpExtension,
};
use kiln_protocol::{Origin, Registry, Scope, Secret};
use kiln_security::http_signature::{HEADER_CONTENT_DIGEST, HEADER_SIGNATURE, HEADER_SIGNATURE_INPUT};
use kiln_security::{verify_request, SignedClient, SignedRequest, SigningKeys};
use kiln_store::{MemoryStore, RequestContext};
use kiln_test_utils::{fixtures, unused_local_url, ScriptedResponse, ScriptedServer};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn signed_client(keys: &Arc<SigningKeys>, timeout: Duration) -> SignedClient {
    SignedClient::new(Arc::clone(keys), timeout).unwrap()
}

#[tokio::test]
async fn test_registries_are_decoded_and_tagged() {
    let server = ScriptedServer::always(ScriptedResponse::json(
        200,
        json!({"registries": [{"address": "ghcr.io", "username": "bot", "password": "pw"}]}),
    ))
    .await
    .unwrap();
    let keys = Arc::new(SigningKeys::generate());
    let extension: HttpExtension<Registry> = HttpExtension::new(
        server.url("/registries"),
        signed_client(&keys, Duration::from_secs(5)),
    );
    let repo = fixtures::repo();

    let entries = extension
        .list_for_pipeline(&RequestContext::background(), &repo, &fixtures::pipeline())
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].address, "ghcr.io");
    assert_eq!(entries[0].password, "pw");
    assert_eq!(entries[0].scope, Scope::Repository(repo.id));
    assert_eq!(entries[0].origin, Origin::Extension);
    assert!(entries[0].read_only);

    let requests = server.requests();
    let recorded = &requests[0];
    assert_eq!(recorded.method, "POST");
    let body = recorded.json().unwrap();
    assert_eq!(body["repo"]["full_name"], "acme/widgets");
    assert_eq!(body["pipeline"]["number"], 42);

    let url = server.url("/registries");
    let signed = SignedRequest {
        method: &recorded.method,
        target_uri: &url,
        content_type: recorded.header("content-type"),
        body: Some(&recorded.body),
    };
    verify_request(
        &keys.verifying_key(),
        &signed,
        recorded.header(HEADER_SIGNATURE_INPUT),
        recorded.header(HEADER_SIGNATURE),
        recorded.header(HEADER_CONTENT_DIGEST),
    )
    .unwrap();
}

#[tokio::test]
async fn test_no_content_is_an_empty_list() {
    let server = ScriptedServer::always(ScriptedResponse::no_content())
        .await
        .unwrap();
    let keys = Arc::new(SigningKeys::generate());
    let extension: HttpExtension<Secret> =
        HttpExtension::new(server.url("/secrets"), signed_client(&keys, Duration::from_secs(5)));

    let entries = extension
        .list_for_pipeline(
            &RequestContext::background(),
            &fixtures::repo(),
            &fixtures::pipeline(),
        )
        .await
        .unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_error_status_is_reported_once() {
    let server = ScriptedServer::always(ScriptedResponse::text(502, "upstream gone"))
        .await
        .unwrap();
    let keys = Arc::new(SigningKeys::generate());
    let extension: HttpExtension<Secret> =
        HttpExtension::new(server.url("/secrets"), signed_client(&keys, Duration::from_secs(5)));

    let err = extension
        .list_for_pipeline(
            &RequestContext::background(),
            &fixtures::repo(),
            &fixtures::pipeline(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ExtensionError::Call { .. }));
    assert_eq!(err.status(), Some(502));
    assert!(err.to_string().contains("upstream gone"));
    assert_eq!(server.request_count(), 1);
}

#[tokio::test]
async fn test_malformed_list_is_decode_error() {
    let server = ScriptedServer::always(ScriptedResponse::json(200, json!({"secrets": "nope"})))
        .await
        .unwrap();
    let keys = Arc::new(SigningKeys::generate());
    let extension: HttpExtension<Secret> =
        HttpExtension::new(server.url("/secrets"), signed_client(&keys, Duration::from_secs(5)));

    let err = extension
        .list_for_pipeline(
            &RequestContext::background(),
            &fixtures::repo(),
            &fixtures::pipeline(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ExtensionError::Decode { field: "secrets", .. }));
}

#[tokio::test]
async fn test_unconfigured_endpoint_makes_no_call() {
    let keys = Arc::new(SigningKeys::generate());
    let extension: HttpExtension<Secret> =
        HttpExtension::new("", signed_client(&keys, Duration::from_secs(5)));
    assert!(!extension.is_configured());

    let entries = extension
        .list_for_pipeline(
            &RequestContext::background(),
            &fixtures::repo(),
            &fixtures::pipeline(),
        )
        .await
        .unwrap();
    assert!(entries.is_empty());
}

async fn base_with_secrets() -> Arc<dyn CredentialService<Secret>> {
    let base = Catalog::<Secret>::new(Arc::new(MemoryStore::new()));
    let ctx = RequestContext::background();
    base.create(&ctx, Scope::Global, Secret::new(Scope::Global, "a", "y"))
        .await
        .unwrap();
    base.create(&ctx, Scope::Global, Secret::new(Scope::Global, "b", "z"))
        .await
        .unwrap();
    Arc::new(base)
}

fn pairs(list: &[Secret]) -> Vec<(&str, &str)> {
    list.iter()
        .map(|s| (s.name.as_str(), s.value.as_str()))
        .collect()
}

#[tokio::test]
async fn test_extension_outranks_store_end_to_end() {
    let server = ScriptedServer::always(ScriptedResponse::json(
        200,
        json!({"secrets": [{"name": "a", "value": "x"}]}),
    ))
    .await
    .unwrap();
    let keys = Arc::new(SigningKeys::generate());
    let extension = Arc::new(HttpExtension::<Secret>::new(
        server.url("/secrets"),
        signed_client(&keys, Duration::from_secs(5)),
    ));
    let catalog = ExtendedCatalog::new(base_with_secrets().await, extension);

    let list = catalog
        .list_for_pipeline(
            &RequestContext::background(),
            &fixtures::repo(),
            &fixtures::pipeline(),
        )
        .await
        .unwrap();
    assert_eq!(pairs(&list), vec![("a", "x"), ("b", "z")]);
}

#[tokio::test]
async fn test_unreachable_extension_yields_base_result() {
    let keys = Arc::new(SigningKeys::generate());
    let url = unused_local_url("/secrets").await.unwrap();
    let extension = Arc::new(HttpExtension::<Secret>::new(
        url,
        signed_client(&keys, Duration::from_secs(5)),
    ));
    let catalog = ExtendedCatalog::new(base_with_secrets().await, extension);

    let list = catalog
        .list_for_pipeline(
            &RequestContext::background(),
            &fixtures::repo(),
            &fixtures::pipeline(),
        )
        .await
        .unwrap();
    assert_eq!(pairs(&list), vec![("a", "y"), ("b", "z")]);
}

#[tokio::test]
async fn test_slow_extension_times_out_and_degrades() {
    let server = ScriptedServer::always(
        ScriptedResponse::json(200, json!({"secrets": [{"name": "a", "value": "x"}]}))
            .delayed(Duration::from_secs(5)),
    )
    .await
    .unwrap();
    let keys = Arc::new(SigningKeys::generate());
    let extension = Arc::new(HttpExtension::<Secret>::new(
        server.url("/secrets"),
        signed_client(&keys, Duration::from_millis(200)),
    ));
    let catalog = ExtendedCatalog::new(base_with_secrets().await, extension);

    let list = catalog
        .list_for_pipeline(
            &RequestContext::background(),
            &fixtures::repo(),
            &fixtures::pipeline(),
        )
        .await
        .unwrap();
    assert_eq!(pairs(&list), vec![("a", "y"), ("b", "z")]);
    assert_eq!(server.request_count(), 1);
}

#[tokio::test]
async fn test_caller_deadline_during_extension_call_degrades() {
    let server = ScriptedServer::always(
        ScriptedResponse::json(200, json!({"secrets": [{"name": "a", "value": "x"}]}))
            .delayed(Duration::from_secs(3)),
    )
    .await
    .unwrap();
    let keys = Arc::new(SigningKeys::generate());
    let extension = Arc::new(HttpExtension::<Secret>::new(
        server.url("/secrets"),
        signed_client(&keys, Duration::from_secs(10)),
    ));
    let catalog = ExtendedCatalog::new(base_with_secrets().await, extension);

    let ctx = RequestContext::background().with_timeout(Duration::from_millis(300));
    let list = catalog
        .list_for_pipeline(&ctx, &fixtures::repo(), &fixtures::pipeline())
        .await
        .unwrap();
    assert_eq!(pairs(&list), vec![("a", "y"), ("b", "z")]);
}

#[tokio::test]
async fn test_repeated_key_from_extension_appears_once() {
    let server = ScriptedServer::always(ScriptedResponse::json(
        200,
        json!({"secrets": [{"name": "a", "value": "x"}, {"name": "a", "value": "w"}]}),
    ))
    .await
    .unwrap();
    let keys = Arc::new(SigningKeys::generate());
    let extension = Arc::new(HttpExtension::<Secret>::new(
        server.url("/secrets"),
        signed_client(&keys, Duration::from_secs(5)),
    ));
    let catalog = ExtendedCatalog::new(base_with_secrets().await, extension);

    let list = catalog
        .list_for_pipeline(
            &RequestContext::background(),
            &fixtures::repo(),
            &fixtures::pipeline(),
        )
        .await
        .unwrap();
    assert_eq!(pairs(&list), vec![("a", "x"), ("b", "z")]);
}
