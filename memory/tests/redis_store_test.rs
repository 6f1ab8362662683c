// Integration tests for the Redis store.
//
// # Setup
//
// 1. Start Redis:
//    ```sh
//    docker run -d -p 6379:6379 redis:7
//    ```
//
// 2. Export the connection string (defaults to localhost):
//    ```sh
//    export CHATFLOW_REDIS_URL="redis://127.0.0.1:6379"
//    ```
//
// 3. Run:
//    ```sh
//    cargo test -p memory --features redis --test redis_store_test -- --ignored
//    ```

#![cfg(feature = "redis")]

use cf_core::types::{ChatMessage, Role};
use memory::stores::{MemoryStore, RedisStore};
use serial_test::serial;
use uuid::Uuid;

fn redis_url() -> String {
    std::env::var("CHATFLOW_REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

fn unique_chat_id() -> String {
    format!("chatflow-test-{}", Uuid::new_v4())
}

#[tokio::test]
#[ignore = "requires a running Redis"]
#[serial]
async fn round_trips_in_conversation_order() {
    let chat_id = unique_chat_id();
    let store = RedisStore::new(&redis_url(), chat_id.clone()).await.unwrap();

    let m1 = ChatMessage::new("p", Role::User, "first");
    let m2 = ChatMessage::new("p", Role::Assistant, "second");
    let m3 = ChatMessage::new("p", Role::User, "third");
    store.append(&m1).await.unwrap();
    store.append(&m2).await.unwrap();
    store.append(&m3).await.unwrap();

    // A second store bound to the same chat id sees the same order.
    let reloaded = RedisStore::new(&redis_url(), chat_id).await.unwrap();
    assert_eq!(reloaded.load().await.unwrap(), vec![m1, m2, m3]);

    reloaded.clear().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running Redis"]
#[serial]
async fn batch_append_matches_single_appends() {
    let store_a = RedisStore::new(&redis_url(), unique_chat_id()).await.unwrap();
    let store_b = RedisStore::new(&redis_url(), unique_chat_id()).await.unwrap();

    let m1 = ChatMessage::new("p", Role::User, "one");
    let m2 = ChatMessage::new("p", Role::Assistant, "two");

    store_a.append(&m1).await.unwrap();
    store_a.append(&m2).await.unwrap();
    store_b.append_batch(&[m1.clone(), m2.clone()]).await.unwrap();

    assert_eq!(store_a.load().await.unwrap(), store_b.load().await.unwrap());

    store_a.clear().await.unwrap();
    store_b.clear().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running Redis"]
#[serial]
async fn remove_deletes_exactly_one_element() {
    let store = RedisStore::new(&redis_url(), unique_chat_id()).await.unwrap();

    let m1 = ChatMessage::new("p", Role::User, "keep");
    let m2 = ChatMessage::new("p", Role::User, "drop");
    store.append(&m1).await.unwrap();
    store.append(&m2).await.unwrap();

    store.remove(&m2).await.unwrap();
    assert_eq!(store.load().await.unwrap(), vec![m1]);

    store.clear().await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running Redis"]
#[serial]
async fn clear_twice_leaves_the_key_absent() {
    let store = RedisStore::new(&redis_url(), unique_chat_id()).await.unwrap();
    store
        .append(&ChatMessage::new("p", Role::User, "hello"))
        .await
        .unwrap();

    store.clear().await.unwrap();
    store.clear().await.unwrap();
    assert!(store.load().await.unwrap().is_empty());
}
