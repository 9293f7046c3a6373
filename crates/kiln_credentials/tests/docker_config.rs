//! Registry stack: Store catalog combined with a Docker config file.

use kiln_credentials::{
    Catalog, CombinedCatalog, CredentialService, DockerConfigSource, ReadOnlySource,
};
use kiln_protocol::{ListOptions, Origin, Registry, Scope};
use kiln_store::{MemoryStore, RequestContext};
use kiln_test_utils::fixtures;
use std::collections::HashSet;
use std::sync::Arc;

const DOCKER_CONFIG: &str = r#"{
  "auths": {
    "docker.io": {"auth": "ZmlsZTpmaWxlcGFzcw=="},
    "reg.example.com": {"auth": "dXNlcjpwYXNz"}
  }
}"#;

async fn registry_stack(config: &str) -> (tempfile::TempDir, CombinedCatalog<Registry>) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, config).unwrap();

    let base = Catalog::<Registry>::new(Arc::new(MemoryStore::new()));
    base.create(
        &RequestContext::background(),
        Scope::Global,
        Registry::new(Scope::Global, "docker.io", "stored", "storedpass"),
    )
    .await
    .unwrap();

    let source: Arc<dyn ReadOnlySource<Registry>> = Arc::new(DockerConfigSource::new(path));
    let catalog = CombinedCatalog::<Registry>::new(Arc::new(base), vec![source]);
    (dir, catalog)
}

#[tokio::test]
async fn test_store_entry_wins_over_file_for_same_address() {
    let (_dir, catalog) = registry_stack(DOCKER_CONFIG).await;
    let list = catalog
        .list(&RequestContext::background(), Scope::Global, ListOptions::all())
        .await
        .unwrap();

    let addresses: HashSet<_> = list.iter().map(|r| r.address.as_str()).collect();
    assert_eq!(addresses.len(), list.len());

    let docker = list.iter().find(|r| r.address == "docker.io").unwrap();
    assert_eq!(docker.username, "stored");
    assert_eq!(docker.origin, Origin::Store);

    let example = list.iter().find(|r| r.address == "reg.example.com").unwrap();
    assert_eq!(example.username, "user");
    assert!(example.read_only);
}

#[tokio::test]
async fn test_file_entries_reach_pipelines() {
    let (_dir, catalog) = registry_stack(DOCKER_CONFIG).await;
    let list = catalog
        .list_for_pipeline(
            &RequestContext::background(),
            &fixtures::repo(),
            &fixtures::pipeline(),
        )
        .await
        .unwrap();

    let found: Vec<_> = list
        .iter()
        .map(|r| (r.address.as_str(), r.username.as_str()))
        .collect();
    assert_eq!(found, vec![("docker.io", "stored"), ("reg.example.com", "user")]);
}

#[tokio::test]
async fn test_global_find_falls_back_to_file() {
    let (_dir, catalog) = registry_stack(DOCKER_CONFIG).await;
    let found = catalog
        .find(&RequestContext::background(), Scope::Global, "reg.example.com")
        .await
        .unwrap();
    assert_eq!(found.password, "pass");
    assert_eq!(found.origin, Origin::Filesystem);
}

#[tokio::test]
async fn test_malformed_file_fails_resolution() {
    let (_dir, catalog) = registry_stack(r#"{"auths":{"x":{"auth":"bm9wYXNz"}}}"#).await;
    let err = catalog
        .list(&RequestContext::background(), Scope::Global, ListOptions::all())
        .await
        .unwrap_err();
    assert!(matches!(err, kiln_credentials::CatalogError::Validation(_)));
}
