//! Feed caching integration tests.

mod common;

use common::TestHarness;
use serde_json::json;

async fn create_post(harness: &TestHarness, auth: &str, caption: &str) {
    harness
        .server
        .post("/v1/posts")
        .add_header("authorization", auth.to_string())
        .json(&json!({ "caption": caption }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn home_feed_misses_then_hits_the_cache() {
    let harness = TestHarness::new().await;
    let author = harness.seed_account("author", "author@example.com", 0).await;

    // Follow the author, then the author posts.
    harness
        .server
        .post(&format!("/v1/follows/{author}"))
        .add_header("authorization", harness.auth_header())
        .await
        .assert_status_ok();
    create_post(&harness, &TestHarness::auth_header_for(&author), "hello").await;

    // First read recomputes.
    let response = harness
        .server
        .get("/v1/feed/home")
        .add_header("authorization", harness.auth_header())
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["cached"], false);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    // Second read within the TTL is served from cache with the same items.
    let response = harness
        .server
        .get("/v1/feed/home")
        .add_header("authorization", harness.auth_header())
        .await;
    response.assert_status_ok();
    let cached: serde_json::Value = response.json();
    assert_eq!(cached["cached"], true);
    assert_eq!(cached["data"], body["data"]);
}

#[tokio::test]
async fn new_post_invalidates_explore_and_profile_feeds() {
    let harness = TestHarness::new().await;

    create_post(&harness, &harness.auth_header(), "first").await;

    // Warm both scopes.
    harness.server.get("/v1/feed/explore").await.assert_status_ok();
    harness
        .server
        .get(&format!("/v1/feed/user/{}", harness.account_id))
        .await
        .assert_status_ok();

    let warm: serde_json::Value = harness.server.get("/v1/feed/explore").await.json();
    assert_eq!(warm["cached"], true);

    // A new post invalidates both; the next reads recompute and include it.
    create_post(&harness, &harness.auth_header(), "second").await;

    let explore: serde_json::Value = harness.server.get("/v1/feed/explore").await.json();
    assert_eq!(explore["cached"], false);
    assert_eq!(explore["data"].as_array().unwrap().len(), 2);

    let profile: serde_json::Value = harness
        .server
        .get(&format!("/v1/feed/user/{}", harness.account_id))
        .await
        .json();
    assert_eq!(profile["cached"], false);
    assert_eq!(profile["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn only_the_first_page_is_cached() {
    let harness = TestHarness::new().await;
    create_post(&harness, &harness.auth_header(), "solo").await;

    // Warm page 1.
    harness.server.get("/v1/feed/explore").await.assert_status_ok();
    let warm: serde_json::Value = harness.server.get("/v1/feed/explore").await.json();
    assert_eq!(warm["cached"], true);

    // Page 2 always reads through.
    let page_two: serde_json::Value = harness
        .server
        .get("/v1/feed/explore?page=2")
        .await
        .json();
    assert_eq!(page_two["cached"], false);
    assert!(page_two["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn follow_invalidates_the_home_feed() {
    let harness = TestHarness::new().await;
    let author = harness.seed_account("author", "author@example.com", 0).await;
    create_post(&harness, &TestHarness::auth_header_for(&author), "hi").await;

    // Warm the (empty) home feed... an empty recompute is not cached, so
    // warm it with one followed author first.
    let first = harness.seed_account("first", "first@example.com", 0).await;
    harness
        .server
        .post(&format!("/v1/follows/{first}"))
        .add_header("authorization", harness.auth_header())
        .await
        .assert_status_ok();
    create_post(&harness, &TestHarness::auth_header_for(&first), "warm").await;
    harness
        .server
        .get("/v1/feed/home")
        .add_header("authorization", harness.auth_header())
        .await
        .assert_status_ok();

    // Following the second author invalidates; the next read sees both.
    harness
        .server
        .post(&format!("/v1/follows/{author}"))
        .add_header("authorization", harness.auth_header())
        .await
        .assert_status_ok();

    let home: serde_json::Value = harness
        .server
        .get("/v1/feed/home")
        .add_header("authorization", harness.auth_header())
        .await
        .json();
    assert_eq!(home["cached"], false);
    assert_eq!(home["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn home_feed_requires_auth_but_explore_does_not() {
    let harness = TestHarness::new().await;

    harness
        .server
        .get("/v1/feed/home")
        .await
        .assert_status_unauthorized();
    harness.server.get("/v1/feed/explore").await.assert_status_ok();
}
