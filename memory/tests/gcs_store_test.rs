#![cfg(feature = "gcs")]

use cf_core::types::{ChatMessage, Role};
use memory::stores::{DocumentStore, GcsBlob, MemoryDocument, MemoryStore};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store_against(server: &MockServer) -> DocumentStore<GcsBlob> {
    let blob =
        GcsBlob::with_static_token("bkt", "memory.json", "test-token").with_base_url(server.uri());
    DocumentStore::new("chat-1", blob)
}

fn stored_document(messages: Vec<ChatMessage>) -> String {
    let mut doc = MemoryDocument::new("chat-1");
    doc.messages = messages;
    serde_json::to_string(&doc).unwrap()
}

#[tokio::test]
async fn first_load_initializes_the_object() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/bkt/o/memory.json"))
        .and(query_param("alt", "media"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload/storage/v1/b/bkt/o"))
        .and(query_param("uploadType", "media"))
        .and(query_param("name", "memory.json"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_string_contains("\"chat_id\":\"chat-1\""))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_against(&server);
    assert!(store.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn load_returns_the_stored_messages() {
    let server = MockServer::start().await;
    let msg = ChatMessage::new("chatgpt", Role::User, "hello");
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/bkt/o/memory.json"))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_string(stored_document(vec![msg.clone()])))
        .mount(&server)
        .await;

    let store = store_against(&server);
    assert_eq!(store.load().await.unwrap(), vec![msg]);
}

#[tokio::test]
async fn append_uploads_the_updated_document() {
    let server = MockServer::start().await;
    let existing = ChatMessage::new("chatgpt", Role::User, "hello");
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/bkt/o/memory.json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(stored_document(vec![existing.clone()])),
        )
        .mount(&server)
        .await;
    // The upload must carry both the existing message and the new one.
    Mock::given(method("POST"))
        .and(path("/upload/storage/v1/b/bkt/o"))
        .and(query_param("name", "memory.json"))
        .and(body_string_contains("hello"))
        .and(body_string_contains("hi there"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_against(&server);
    store
        .append(&ChatMessage::new("chatgpt", Role::Assistant, "hi there"))
        .await
        .unwrap();
}

#[tokio::test]
async fn clear_tolerates_a_missing_object() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/storage/v1/b/bkt/o/memory.json"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_against(&server);
    store.clear().await.unwrap();
}

#[tokio::test]
async fn backend_failures_surface_the_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/bkt/o/memory.json"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let store = store_against(&server);
    let err = store.load().await.unwrap_err();
    assert!(err.to_string().contains("403"), "got: {err}");
}
