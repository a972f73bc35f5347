//! Concurrent callers sharing one store.
//!
//! Every clone feeds the same worker, so concurrent operations are
//! serialized on the single connection.

mod common;

use common::TestFixture;
use futures::future::join_all;
use jsonkv::{Entry, SetMode, StoreConfig, StoreError};
use serde_json::{json, Value};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_inserts_from_many_tasks() {
    let fixture = TestFixture::new();
    let store = fixture.open_with_collection("items").await;

    let tasks = (0..50).map(|i| {
        let store = store.clone();
        tokio::spawn(async move {
            store
                .set_by_key("items", &format!("k{i:02}"), json!(i), SetMode::Insert)
                .await
        })
    });

    for result in join_all(tasks).await {
        result.expect("task panicked").expect("insert failed");
    }

    let all: Vec<Entry> = store.get_all("items").await.unwrap();
    assert_eq!(all.len(), 50);
    assert_eq!(store.count("items").await.unwrap(), 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_inserts_on_one_key_have_one_winner() {
    let fixture = TestFixture::new();
    let store = fixture.open_with_collection("items").await;

    let attempts = (0..10).map(|i| {
        let store = store.clone();
        tokio::spawn(async move {
            store
                .set_by_key("items", "contested", json!(i), SetMode::Insert)
                .await
        })
    });

    let results: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|r| r.expect("task panicked"))
        .collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(StoreError::is_constraint_violation));

    let stored: Option<Value> = store.get_by_key("items", "contested").await.unwrap();
    let winner = results
        .into_iter()
        .find_map(Result::ok)
        .expect("one insert should win");
    assert_eq!(stored, Some(winner));
}

#[tokio::test]
async fn test_small_channel_applies_backpressure_without_loss() {
    let fixture = TestFixture::new();
    let store = jsonkv::Store::open_with(&StoreConfig {
        channel_size: 1,
        ..StoreConfig::new(&fixture.db_path)
    })
    .unwrap();
    store.prepare_collection("items").await.unwrap();

    let writes = (0..20).map(|i| {
        let store = store.clone();
        async move {
            store
                .set_by_key("items", &format!("k{i}"), json!(i), SetMode::Upsert)
                .await
        }
    });
    for result in join_all(writes).await {
        result.unwrap();
    }

    assert_eq!(store.count("items").await.unwrap(), 20);
}

#[tokio::test]
async fn test_close_answers_queued_requests_first() {
    let fixture = TestFixture::new();
    let config = StoreConfig {
        channel_size: 1,
        ..StoreConfig::new(&fixture.db_path)
    };
    let store = jsonkv::Store::open_with(&config).unwrap();
    store.prepare_collection("items").await.unwrap();

    // With a one-slot channel the writes wait on the sender queue, and the
    // shutdown request lines up behind them.
    let writes = join_all((0..10).map(|i| {
        let store = store.clone();
        async move {
            store
                .set_by_key("items", &format!("k{i}"), json!(i), SetMode::Insert)
                .await
        }
    }));
    let (results, closed) = tokio::join!(writes, store.close());

    closed.unwrap();
    assert!(store.is_closed());
    for (i, result) in results.into_iter().enumerate() {
        assert_eq!(result.unwrap(), json!(i), "write k{i} should be answered");
    }

    let reopened = fixture.open();
    assert_eq!(reopened.count("items").await.unwrap(), 10);
    for i in 0..10 {
        let loaded: Option<Value> = reopened.get_by_key("items", &format!("k{i}")).await.unwrap();
        assert_eq!(loaded, Some(json!(i)));
    }
}
