//! Integration tests for the response cache.
//!
//! Verifies that identical normalized requests are served from cache
//! without touching any adapter, that entries expire by TTL, and that
//! cache hits are not re-billed.

mod common;

use common::*;
use std::time::Duration;

fn cached_config() -> switchboard::config::OrchestratorConfig {
    let mut config = test_config(vec![mock_provider("p1", vec![chat_model("m1")])]);
    config.cache.enabled = true;
    config.cache.ttl_secs = 60;
    config.cache.max_entries = 100;
    config
}

#[tokio::test]
async fn identical_request_is_served_from_cache() {
    let adapter = MockAdapter::new("p1");
    let service = make_service(cached_config(), vec![adapter.clone()]);

    let first = service
        .complete(chat_task(), chat_request("what is rust?"))
        .await
        .unwrap();
    let second = service
        .complete(chat_task(), chat_request("what is rust?"))
        .await
        .unwrap();

    assert_eq!(first.content, second.content);
    assert_eq!(adapter.calls(), 1, "second request never reaches an adapter");

    let stats = service.health_metrics().cache;
    assert_eq!(stats.hits, 1);
}

#[tokio::test]
async fn different_requests_do_not_share_entries() {
    let adapter = MockAdapter::new("p1");
    let service = make_service(cached_config(), vec![adapter.clone()]);

    service
        .complete(chat_task(), chat_request("question one"))
        .await
        .unwrap();
    service
        .complete(chat_task(), chat_request("question two"))
        .await
        .unwrap();
    assert_eq!(adapter.calls(), 2);
}

#[tokio::test]
async fn entries_expire_by_ttl_and_redispatch() {
    let adapter = MockAdapter::new("p1");
    let mut config = cached_config();
    // Scaled-down version of the 60s TTL scenario: hit at t+30%, miss at t+150%
    config.cache.ttl_secs = 1;
    let service = make_service(config, vec![adapter.clone()]);

    service
        .complete(chat_task(), chat_request("ephemeral"))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    service
        .complete(chat_task(), chat_request("ephemeral"))
        .await
        .unwrap();
    assert_eq!(adapter.calls(), 1, "within TTL the entry is served");

    tokio::time::sleep(Duration::from_millis(1200)).await;
    service
        .complete(chat_task(), chat_request("ephemeral"))
        .await
        .unwrap();
    assert_eq!(adapter.calls(), 2, "expired entry re-dispatches");
}

#[tokio::test]
async fn cache_hits_are_not_billed() {
    let adapter = MockAdapter::new("p1");
    let service = make_service(cached_config(), vec![adapter]);

    service
        .complete(chat_task(), chat_request("billed once"))
        .await
        .unwrap();
    let spend_after_miss = service
        .health_metrics()
        .ledgers
        .iter()
        .find(|l| l.window.starts_with("d:"))
        .map(|l| l.spent_usd)
        .unwrap();

    service
        .complete(chat_task(), chat_request("billed once"))
        .await
        .unwrap();
    let spend_after_hit = service
        .health_metrics()
        .ledgers
        .iter()
        .find(|l| l.window.starts_with("d:"))
        .map(|l| l.spent_usd)
        .unwrap();

    assert_eq!(spend_after_miss, spend_after_hit);
}

#[tokio::test]
async fn purge_cache_forces_redispatch() {
    let adapter = MockAdapter::new("p1");
    let service = make_service(cached_config(), vec![adapter.clone()]);

    service
        .complete(chat_task(), chat_request("purged"))
        .await
        .unwrap();
    service.purge_cache();
    service
        .complete(chat_task(), chat_request("purged"))
        .await
        .unwrap();
    assert_eq!(adapter.calls(), 2);
}
