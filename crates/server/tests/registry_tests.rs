//! Registry workflow tests: authorship, tags, unpublish and concurrency.

mod common;

use axum::http::StatusCode;
use common::{TestMetadata, principal, publish_request};
use lode_server::Registry;
use lode_server::hooks::HookQueue;
use proptest::prelude::*;
use serde_json::json;
use tokio::sync::mpsc;

async fn setup(users: &[&str]) -> (TestMetadata, Registry) {
    let db = TestMetadata::new().await.unwrap();
    for user in users {
        db.create_user(user).await;
    }
    let registry = Registry::new(db.store(), HookQueue::disabled());
    (db, registry)
}

async fn latest_of(db: &TestMetadata, package: &str) -> Option<String> {
    db.store
        .get_tag(package, "latest")
        .await
        .unwrap()
        .map(|t| t.version)
}

#[tokio::test]
async fn test_publish_creates_package_and_latest() {
    let (db, registry) = setup(&["alice"]).await;

    let outcome = registry
        .publish(publish_request("Foo", "1.0.0"), &principal("alice"))
        .await
        .unwrap();
    assert!(outcome.package_created);
    assert_eq!(outcome.version.package, "foo");

    let resolved = registry.resolve("foo", "latest").await.unwrap();
    assert_eq!(resolved.version, "1.0.0");
    assert_eq!(resolved.readme, lode_core::DEFAULT_README);
    assert!(db.store.is_author("foo", "alice").await.unwrap());
}

#[tokio::test]
async fn test_publish_validates_before_touching_store() {
    let (db, registry) = setup(&["alice"]).await;
    let alice = principal("alice");

    let mut request = publish_request("foo", "1.0.0");
    request.manifest = json!({ "version": "not-semver" });
    let err = registry.publish(request, &alice).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

    let mut request = publish_request("foo", "1.0.0");
    request.manifest = json!({ "name": "foo" });
    let err = registry.publish(request, &alice).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

    let mut request = publish_request("foo", "1.0.0");
    request.artifact = bytes::Bytes::new();
    let err = registry.publish(request, &alice).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

    let err = registry
        .publish(publish_request("bad name!", "1.0.0"), &alice)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

    assert_eq!(db.store.count_packages().await.unwrap(), 0);
}

#[tokio::test]
async fn test_duplicate_version_is_conflict() {
    let (db, registry) = setup(&["alice"]).await;
    let alice = principal("alice");

    let first = registry
        .publish(publish_request("foo", "1.0.0"), &alice)
        .await
        .unwrap();

    let mut again = publish_request("foo", "1.0.0");
    again.artifact = bytes::Bytes::from_static(b"something else");
    let err = registry.publish(again, &alice).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::CONFLICT);

    let stored = registry.fetch_artifact("foo", "1.0.0").await.unwrap();
    assert_eq!(stored.shasum, first.version.shasum);
    assert_eq!(db.store.list_versions("foo").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_non_author_cannot_mutate() {
    let (db, registry) = setup(&["alice", "mallory"]).await;
    let alice = principal("alice");
    let mallory = principal("mallory");

    registry
        .publish(publish_request("foo", "1.0.0"), &alice)
        .await
        .unwrap();
    registry
        .set_tag("foo", "beta", "1.0.0", &alice)
        .await
        .unwrap();

    let forbidden = [
        registry
            .publish(publish_request("foo", "1.1.0"), &mallory)
            .await
            .unwrap_err(),
        registry
            .unpublish("foo", "1.0.0", &mallory)
            .await
            .unwrap_err(),
        registry
            .set_tag("foo", "beta", "1.0.0", &mallory)
            .await
            .unwrap_err(),
        registry
            .remove_tag("foo", "beta", &mallory)
            .await
            .unwrap_err(),
        registry
            .remove_tag("foo", "latest", &mallory)
            .await
            .unwrap_err(),
        registry
            .add_author("foo", "mallory", &mallory)
            .await
            .unwrap_err(),
        registry
            .remove_author("foo", "alice", &mallory)
            .await
            .unwrap_err(),
        registry.delete_package("foo", &mallory).await.unwrap_err(),
    ];
    for err in forbidden {
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN, "{err}");
    }

    assert_eq!(db.store.list_versions("foo").await.unwrap().len(), 1);
    assert!(!db.store.is_author("foo", "mallory").await.unwrap());
    assert_eq!(
        db.store
            .get_tag("foo", "beta")
            .await
            .unwrap()
            .map(|t| t.version)
            .as_deref(),
        Some("1.0.0")
    );
    assert_eq!(latest_of(&db, "foo").await.as_deref(), Some("1.0.0"));
    let authors: Vec<String> = db
        .store
        .list_authors("foo")
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.username)
        .collect();
    assert_eq!(authors, vec!["alice"]);
}

#[tokio::test]
async fn test_mutations_on_missing_package_are_not_found() {
    let (_db, registry) = setup(&["alice"]).await;
    let alice = principal("alice");

    let errors = [
        registry.unpublish("ghost", "1.0.0", &alice).await.unwrap_err(),
        registry
            .set_tag("ghost", "beta", "1.0.0", &alice)
            .await
            .unwrap_err(),
        registry.remove_tag("ghost", "beta", &alice).await.unwrap_err(),
        registry.add_author("ghost", "alice", &alice).await.unwrap_err(),
        registry.delete_package("ghost", &alice).await.unwrap_err(),
        registry.resolve("ghost", "latest").await.unwrap_err(),
    ];
    for err in errors {
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND, "{err}");
    }
}

#[tokio::test]
async fn test_added_author_can_publish() {
    let (db, registry) = setup(&["alice", "bob"]).await;

    registry
        .publish(publish_request("foo", "1.0.0"), &principal("alice"))
        .await
        .unwrap();
    assert!(
        registry
            .add_author("foo", "bob", &principal("alice"))
            .await
            .unwrap()
    );
    // Idempotent.
    assert!(
        !registry
            .add_author("foo", "bob", &principal("alice"))
            .await
            .unwrap()
    );

    let outcome = registry
        .publish(publish_request("foo", "1.1.0"), &principal("bob"))
        .await
        .unwrap();
    assert!(!outcome.package_created);
    assert_eq!(latest_of(&db, "foo").await.as_deref(), Some("1.1.0"));
}

#[tokio::test]
async fn test_remove_author_rules() {
    let (db, registry) = setup(&["alice", "bob", "carol"]).await;
    let alice = principal("alice");

    registry
        .publish(publish_request("foo", "1.0.0"), &alice)
        .await
        .unwrap();

    let err = registry
        .remove_author("foo", "alice", &alice)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), StatusCode::CONFLICT);

    let err = registry
        .remove_author("foo", "carol", &alice)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

    let err = registry
        .remove_author("foo", "nobody", &alice)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

    let err = registry
        .add_author("foo", "nobody", &alice)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

    registry.add_author("foo", "bob", &alice).await.unwrap();
    // An author may remove themselves once someone else remains.
    registry.remove_author("foo", "alice", &alice).await.unwrap();

    let authors: Vec<String> = db
        .store
        .list_authors("foo")
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.username)
        .collect();
    assert_eq!(authors, vec!["bob"]);

    let err = registry
        .set_tag("foo", "beta", "1.0.0", &alice)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_tags() {
    let (_db, registry) = setup(&["alice"]).await;
    let alice = principal("alice");

    for v in ["1.0.0", "2.0.0-rc.1"] {
        registry
            .publish(publish_request("foo", v), &alice)
            .await
            .unwrap();
    }

    let row = registry
        .set_tag("foo", "Next", "2.0.0-rc.1", &alice)
        .await
        .unwrap();
    assert_eq!(row.name, "next");

    let resolved = registry.resolve("foo", "next").await.unwrap();
    assert_eq!(resolved.version, "2.0.0-rc.1");

    // Tags that look like versions would shadow real versions.
    let err = registry
        .set_tag("foo", "1.0.0", "1.0.0", &alice)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

    let err = registry
        .set_tag("foo", "beta", "3.0.0", &alice)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

    // latest can be repointed but never removed.
    registry
        .set_tag("foo", "latest", "1.0.0", &alice)
        .await
        .unwrap();
    assert_eq!(
        registry.resolve("foo", "latest").await.unwrap().version,
        "1.0.0"
    );
    let err = registry
        .remove_tag("foo", "latest", &alice)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

    registry.remove_tag("foo", "next", &alice).await.unwrap();
    let err = registry.resolve("foo", "next").await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    let err = registry.remove_tag("foo", "next", &alice).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unpublish_reelects_and_destroys() {
    let (db, registry) = setup(&["alice"]).await;
    let alice = principal("alice");

    for v in ["1.0.0", "2.0.0"] {
        registry
            .publish(publish_request("foo", v), &alice)
            .await
            .unwrap();
    }

    let outcome = registry.unpublish("foo", "2.0.0", &alice).await.unwrap();
    assert_eq!(outcome.latest_reelected.as_deref(), Some("1.0.0"));
    assert!(!outcome.package_destroyed);

    let err = registry
        .unpublish("foo", "2.0.0", &alice)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

    let outcome = registry.unpublish("foo", "1.0.0", &alice).await.unwrap();
    assert!(outcome.package_destroyed);
    assert!(db.store.get_package("foo").await.unwrap().is_none());

    // The name is free again, for anyone.
    db.create_user("bob").await;
    let outcome = registry
        .publish(publish_request("foo", "1.0.0"), &principal("bob"))
        .await
        .unwrap();
    assert!(outcome.package_created);
}

#[tokio::test]
async fn test_fetch_artifact_detects_tampering() {
    let (db, registry) = setup(&["alice"]).await;
    registry
        .publish(publish_request("foo", "1.0.0"), &principal("alice"))
        .await
        .unwrap();

    sqlx::query("UPDATE versions SET artifact = ? WHERE package = 'foo'")
        .bind(b"tampered".to_vec())
        .execute(db.pool())
        .await
        .unwrap();

    let err = registry.fetch_artifact("foo", "latest").await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_publish_emits_hook_event() {
    let db = TestMetadata::new().await.unwrap();
    db.create_user("alice").await;
    let (tx, mut rx) = mpsc::channel(4);
    let registry = Registry::new(db.store(), HookQueue::new(tx));

    let mut request = publish_request("foo", "1.0.0");
    request.manifest = json!({ "version": "1.0.0", "main": "dist/foo.css" });
    registry.publish(request, &principal("alice")).await.unwrap();

    let event = rx.recv().await.unwrap();
    assert_eq!(event.package, "foo");
    assert_eq!(event.version, "1.0.0");
    assert_eq!(event.main(), Some("dist/foo.css"));

    // Failed publishes emit nothing.
    let _ = registry
        .publish(publish_request("foo", "1.0.0"), &principal("alice"))
        .await
        .unwrap_err();
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_concurrent_publishes_of_distinct_versions() {
    let (db, registry) = setup(&["alice"]).await;
    let alice = principal("alice");

    let (a, b, c) = tokio::join!(
        registry.publish(publish_request("foo", "1.0.0"), &alice),
        registry.publish(publish_request("foo", "1.1.0"), &alice),
        registry.publish(publish_request("foo", "1.2.0"), &alice),
    );
    let outcomes = [a.unwrap(), b.unwrap(), c.unwrap()];

    // Exactly one of them created the package.
    assert_eq!(outcomes.iter().filter(|o| o.package_created).count(), 1);

    let mut seqs: Vec<i64> = outcomes.iter().map(|o| o.version.seq).collect();
    seqs.sort();
    assert_eq!(seqs, vec![1, 2, 3]);

    // latest is the last one committed.
    let newest = outcomes
        .iter()
        .max_by_key(|o| o.version.seq)
        .map(|o| o.version.version.clone());
    assert_eq!(latest_of(&db, "foo").await, newest);
}

#[tokio::test]
async fn test_concurrent_publishes_of_same_version() {
    let (db, registry) = setup(&["alice"]).await;
    let alice = principal("alice");

    let mut other = publish_request("foo", "1.0.0");
    other.artifact = bytes::Bytes::from_static(b"other bytes");
    let (a, b) = tokio::join!(
        registry.publish(publish_request("foo", "1.0.0"), &alice),
        registry.publish(other, &alice),
    );

    let results = [a, b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let err = results.into_iter().find_map(Result::err).unwrap();
    assert_eq!(err.status_code(), StatusCode::CONFLICT);
    assert_eq!(db.store.list_versions("foo").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_unpublish_and_publish() {
    let (db, registry) = setup(&["alice"]).await;
    let alice = principal("alice");

    registry
        .publish(publish_request("foo", "1.0.0"), &alice)
        .await
        .unwrap();

    let (unpublished, published) = tokio::join!(
        registry.unpublish("foo", "1.0.0", &alice),
        registry.publish(publish_request("foo", "2.0.0"), &alice),
    );
    unpublished.unwrap();
    published.unwrap();

    // Whichever ran first, 2.0.0 survives and is latest.
    let versions = db.store.list_versions("foo").await.unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(latest_of(&db, "foo").await.as_deref(), Some("2.0.0"));
}

#[derive(Debug, Clone)]
enum Op {
    Publish(usize),
    Unpublish(usize),
    SetTag(usize, usize),
    RemoveTag(usize),
}

const VERSIONS: [&str; 4] = ["1.0.0", "1.1.0", "2.0.0", "0.1.0"];
const TAGS: [&str; 2] = ["beta", "next"];

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..VERSIONS.len()).prop_map(Op::Publish),
        2 => (0..VERSIONS.len()).prop_map(Op::Unpublish),
        1 => (0..TAGS.len(), 0..VERSIONS.len()).prop_map(|(t, v)| Op::SetTag(t, v)),
        1 => (0..TAGS.len()).prop_map(Op::RemoveTag),
    ]
}

/// Expected state: live versions in publish order, plus the latest target.
#[derive(Default)]
struct Model {
    live: Vec<&'static str>,
    latest: Option<&'static str>,
}

impl Model {
    fn apply(&mut self, op: &Op) {
        match *op {
            Op::Publish(v) => {
                let version = VERSIONS[v];
                if !self.live.contains(&version) {
                    self.live.push(version);
                    self.latest = Some(version);
                }
            }
            Op::Unpublish(v) => {
                let version = VERSIONS[v];
                self.live.retain(|l| *l != version);
                if self.live.is_empty() {
                    self.latest = None;
                } else if self.latest == Some(version) {
                    self.latest = self.live.last().copied();
                }
            }
            Op::SetTag(..) | Op::RemoveTag(_) => {}
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_latest_always_resolves(ops in prop::collection::vec(op_strategy(), 1..24)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async {
            let (db, registry) = setup(&["alice"]).await;
            let alice = principal("alice");
            let mut model = Model::default();

            for op in &ops {
                // Individual operations may legitimately fail; the
                // invariants must hold either way.
                let _ = match *op {
                    Op::Publish(v) => registry
                        .publish(publish_request("foo", VERSIONS[v]), &alice)
                        .await
                        .map(|_| ()),
                    Op::Unpublish(v) => registry
                        .unpublish("foo", VERSIONS[v], &alice)
                        .await
                        .map(|_| ()),
                    Op::SetTag(t, v) => registry
                        .set_tag("foo", TAGS[t], VERSIONS[v], &alice)
                        .await
                        .map(|_| ()),
                    Op::RemoveTag(t) => registry.remove_tag("foo", TAGS[t], &alice).await,
                };
                model.apply(op);

                let package = db.store.get_package("foo").await.unwrap();
                let versions = db.store.list_versions("foo").await.unwrap();
                let tags = db.store.list_tags("foo").await.unwrap();

                assert_eq!(package.is_some(), !model.live.is_empty());
                assert_eq!(versions.len(), model.live.len());
                assert_eq!(latest_of(&db, "foo").await.as_deref(), model.latest);

                if package.is_some() {
                    let resolved = db.store.resolve("foo", "latest").await.unwrap();
                    assert!(resolved.is_some());
                } else {
                    assert!(tags.is_empty());
                }
                for tag in &tags {
                    assert!(
                        versions.iter().any(|v| v.version == tag.version),
                        "tag {} points at missing {}",
                        tag.name,
                        tag.version
                    );
                }
            }
        });
    }
}
