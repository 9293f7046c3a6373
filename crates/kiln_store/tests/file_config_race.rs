//! Concurrent create-if-absent against a shared record directory.

use kiln_store::{FileConfigStore, RequestContext, ServerConfigStore};
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exactly_one_writer_wins() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().to_path_buf();

    let mut handles = Vec::new();
    for i in 0..16 {
        // Separate store instances model separate processes sharing the directory.
        let store = Arc::new(FileConfigStore::new(dir.clone()));
        handles.push(tokio::spawn(async move {
            let ctx = RequestContext::background();
            store.create(&ctx, "shared", &format!("value-{}", i)).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => winners += 1,
            Err(e) => assert!(e.is_already_exists(), "unexpected error: {e}"),
        }
    }
    assert_eq!(winners, 1);

    let store = FileConfigStore::new(dir);
    let value = store
        .get(&RequestContext::background(), "shared")
        .await
        .unwrap();
    assert!(value.starts_with("value-"));
}
