//! Hostile provider names never produce files outside the library roots.

mod common;

use common::*;
use sandboxed_output::SandboxedManager;
use strm_sync::models::{ContentDomain, SyncOutcome};

#[tokio::test]
async fn test_hostile_titles_stay_inside_the_library() {
    let harness = Harness::with_config(|config| config.library.write_nfo = true).await;
    let domain = ContentDomain::Movie;
    harness
        .provider
        .set_categories(domain, vec![category("1", "Action")]);
    harness.provider.set_items(
        domain,
        "1",
        vec![
            movie("1", "../../escape"),
            movie("2", "/etc/passwd"),
            movie("3", ".."),
            movie("4", "C:\\Windows\\System32"),
            movie("5", "EN - 4K Alpha / Beta"),
        ],
    );

    let report = harness.sync(domain).await;
    assert_eq!(report.outcome, SyncOutcome::Succeeded);
    assert_eq!(report.generation.unwrap().written, 10);

    // Every file of the temp dir lives below the movie root
    let everything = harness.files("");
    assert_eq!(everything.len(), 10);
    assert!(everything.iter().all(|path| path.starts_with("movies/")));

    for path in harness.files("movies") {
        let folder = path.split('/').next().unwrap();
        assert!(!folder.is_empty());
        assert!(!folder.contains(".."), "{path}");
        assert!(!folder.contains('\\'), "{path}");
        assert_eq!(path.matches('/').count(), 1, "{path}");
    }
    // A name with nothing usable left falls back to its remote id
    assert!(harness.path("movies/3/3.strm").exists());
    assert!(harness.path("movies/Alpha Beta/Alpha Beta.strm").exists());
}

#[tokio::test]
async fn test_sandbox_rejects_escaping_paths() {
    let temp = tempfile::TempDir::new().unwrap();
    let sandbox = SandboxedManager::builder()
        .base_directory(temp.path().join("library"))
        .build()
        .await
        .unwrap();

    assert!(sandbox.write_atomic("../outside.strm", "x").await.is_err());
    assert!(sandbox.write_atomic("/tmp/outside.strm", "x").await.is_err());
    assert!(sandbox.write_atomic("a/../../outside.strm", "x").await.is_err());
    assert!(sandbox.remove_file_and_prune("../library").await.is_err());
    assert!(!temp.path().join("outside.strm").exists());

    sandbox.write_atomic("Show/Season 01/ok.strm", "x").await.unwrap();
    assert_eq!(
        sandbox.list_files_recursive().await.unwrap(),
        vec!["Show/Season 01/ok.strm".to_string()]
    );
}
