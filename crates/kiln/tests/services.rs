//! Composition root: stacks built from server config behave end to end.

use kiln::{CheckoutForge, Services, Stores};
use kiln_protocol::defaults::SIGNATURE_PRIVATE_KEY_RECORD;
use kiln_protocol::{ConfigFile, Origin, Registry, Scope, Secret, ServerConfig};
use kiln_security::http_signature::{HEADER_CONTENT_DIGEST, HEADER_SIGNATURE, HEADER_SIGNATURE_INPUT};
use kiln_security::{verify_request, SignedRequest};
use kiln_store::{FileConfigStore, MemoryStore, RequestContext, StoreSeed};
use kiln_test_utils::{fixtures, ScriptedResponse, ScriptedServer};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

fn seeded(seed: StoreSeed) -> Stores {
    Stores::memory(Arc::new(MemoryStore::from_seed(seed).unwrap()))
}

fn stored_secrets() -> Stores {
    seeded(StoreSeed {
        secrets: vec![
            Secret::new(Scope::Global, "a", "y"),
            Secret::new(Scope::Global, "b", "z"),
        ],
        ..StoreSeed::default()
    })
}

#[tokio::test]
async fn test_without_extensions_store_entries_are_returned() {
    let ctx = RequestContext::background();
    let services = Services::build(&ctx, &ServerConfig::default(), stored_secrets())
        .await
        .unwrap();

    let secrets = services
        .secrets()
        .list_for_pipeline(&ctx, &fixtures::repo(), &fixtures::pipeline())
        .await
        .unwrap();
    let names: Vec<_> = secrets.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);

    let registries = services
        .registries()
        .list_for_pipeline(&ctx, &fixtures::repo(), &fixtures::pipeline())
        .await
        .unwrap();
    assert!(registries.is_empty());
}

#[tokio::test]
async fn test_secret_extension_is_signed_and_outranks_store() {
    let server = ScriptedServer::always(ScriptedResponse::json(
        200,
        json!({"secrets": [{"name": "a", "value": "x"}]}),
    ))
    .await
    .unwrap();
    let config = ServerConfig {
        secret_extension_endpoint: server.url("/secrets"),
        ..ServerConfig::default()
    };
    let ctx = RequestContext::background();
    let services = Services::build(&ctx, &config, stored_secrets()).await.unwrap();

    let secrets = services
        .secrets()
        .list_for_pipeline(&ctx, &fixtures::repo(), &fixtures::pipeline())
        .await
        .unwrap();
    let pairs: Vec<_> = secrets
        .iter()
        .map(|s| (s.name.as_str(), s.value.as_str(), s.origin))
        .collect();
    assert_eq!(
        pairs,
        vec![("a", "x", Origin::Extension), ("b", "z", Origin::Store)]
    );

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let recorded = &requests[0];
    let url = server.url("/secrets");
    let signed = SignedRequest {
        method: &recorded.method,
        target_uri: &url,
        content_type: recorded.header("content-type"),
        body: Some(&recorded.body),
    };
    verify_request(
        &services.keys().verifying_key(),
        &signed,
        recorded.header(HEADER_SIGNATURE_INPUT),
        recorded.header(HEADER_SIGNATURE),
        recorded.header(HEADER_CONTENT_DIGEST),
    )
    .unwrap();
}

#[tokio::test]
async fn test_registry_priority_extension_then_store_then_docker_config() {
    let dir = tempfile::tempdir().unwrap();
    let docker_config = dir.path().join("config.json");
    std::fs::write(
        &docker_config,
        r#"{"auths": {
            "docker.io": {"auth": "ZmlsZTpmaWxlcGFzcw=="},
            "quay.io": {"auth": "ZmlsZTpmaWxlcGFzcw=="},
            "reg.example.com": {"auth": "ZmlsZTpmaWxlcGFzcw=="}
        }}"#,
    )
    .unwrap();

    let server = ScriptedServer::always(ScriptedResponse::json(
        200,
        json!({"registries": [{"address": "quay.io", "username": "ext", "password": "extpass"}]}),
    ))
    .await
    .unwrap();

    let config = ServerConfig {
        registry_extension_endpoint: server.url("/registries"),
        docker_config_path: Some(docker_config),
        ..ServerConfig::default()
    };
    let stores = seeded(StoreSeed {
        registries: vec![
            Registry::new(Scope::Global, "docker.io", "stored", "storedpass"),
            Registry::new(Scope::Global, "quay.io", "stored", "storedpass"),
        ],
        ..StoreSeed::default()
    });
    let ctx = RequestContext::background();
    let services = Services::build(&ctx, &config, stores).await.unwrap();

    let registries = services
        .registries()
        .list_for_pipeline(&ctx, &fixtures::repo(), &fixtures::pipeline())
        .await
        .unwrap();
    let by_address: BTreeMap<_, _> = registries
        .iter()
        .map(|r| (r.address.as_str(), (r.username.as_str(), r.origin)))
        .collect();

    assert_eq!(registries.len(), 3);
    assert_eq!(by_address["quay.io"], ("ext", Origin::Extension));
    assert_eq!(by_address["docker.io"], ("stored", Origin::Store));
    assert_eq!(by_address["reg.example.com"], ("file", Origin::Filesystem));
}

#[tokio::test]
async fn test_signing_key_survives_rebuild() {
    let home = tempfile::tempdir().unwrap();
    let ctx = RequestContext::background();
    let stores = || {
        Stores::memory(Arc::new(MemoryStore::new()))
            .with_server_config(Arc::new(FileConfigStore::new(home.path().join("server-config"))))
    };

    let first = Services::build(&ctx, &ServerConfig::default(), stores())
        .await
        .unwrap();
    let second = Services::build(&ctx, &ServerConfig::default(), stores())
        .await
        .unwrap();
    assert_eq!(first.keys().fingerprint(), second.keys().fingerprint());
}

#[tokio::test]
async fn test_corrupt_signing_key_fails_startup() {
    let mut server_config = BTreeMap::new();
    server_config.insert(SIGNATURE_PRIVATE_KEY_RECORD.to_string(), "not-a-key".to_string());
    let stores = seeded(StoreSeed {
        server_config,
        ..StoreSeed::default()
    });

    let result = Services::build(&RequestContext::background(), &ServerConfig::default(), stores).await;
    let err = result.err().unwrap();
    assert!(format!("{:#}", err).contains("signing key"));
}

#[tokio::test]
async fn test_config_fetcher_uses_configured_paths_and_extension() {
    let checkout = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(checkout.path().join("ci")).unwrap();
    std::fs::write(checkout.path().join("ci/pipeline.yml"), "steps: [build]").unwrap();

    let server = ScriptedServer::start(vec![
        ScriptedResponse::no_content(),
        ScriptedResponse::json(200, json!({"configs": [{"name": "generated.yml", "data": "steps: [gen]"}]})),
    ])
    .await
    .unwrap();
    let config = ServerConfig {
        config_extension_endpoint: server.url("/config"),
        config_paths: vec!["ci/pipeline.yml".to_string()],
        ..ServerConfig::default()
    };
    let ctx = RequestContext::background();
    let services = Services::build(&ctx, &config, seeded(StoreSeed::default()))
        .await
        .unwrap();
    let fetcher = services.config_fetcher(Arc::new(CheckoutForge::new(checkout.path())));

    let kept = fetcher
        .fetch(&ctx, &fixtures::repo(), &fixtures::pipeline())
        .await
        .unwrap();
    assert_eq!(kept, vec![ConfigFile::new("ci/pipeline.yml", "steps: [build]")]);

    let replaced = fetcher
        .fetch(&ctx, &fixtures::repo(), &fixtures::pipeline())
        .await
        .unwrap();
    assert_eq!(replaced, vec![ConfigFile::new("generated.yml", "steps: [gen]")]);

    let body = server.requests()[0].json().unwrap();
    assert_eq!(body["configs"][0]["name"], "ci/pipeline.yml");
}

#[tokio::test]
async fn test_slow_config_extension_under_caller_deadline_keeps_forge_configs() {
    let checkout = tempfile::tempdir().unwrap();
    std::fs::write(checkout.path().join(".kiln.yml"), "steps: [build]").unwrap();

    let server = ScriptedServer::always(
        ScriptedResponse::json(200, json!({"configs": []})).delayed(std::time::Duration::from_secs(3)),
    )
    .await
    .unwrap();
    let config = ServerConfig {
        config_extension_endpoint: server.url("/config"),
        ..ServerConfig::default()
    };
    let services = Services::build(&RequestContext::background(), &config, seeded(StoreSeed::default()))
        .await
        .unwrap();
    let fetcher = services.config_fetcher(Arc::new(CheckoutForge::new(checkout.path())));

    let ctx = RequestContext::background().with_timeout(std::time::Duration::from_millis(500));
    let files = fetcher
        .fetch(&ctx, &fixtures::repo(), &fixtures::pipeline())
        .await
        .unwrap();
    assert_eq!(files, vec![ConfigFile::new(".kiln.yml", "steps: [build]")]);
}
