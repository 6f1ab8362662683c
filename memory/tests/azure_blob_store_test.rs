#![cfg(feature = "azure-blob")]

use cf_core::types::{ChatMessage, Role};
use memory::stores::{AzureBlob, DocumentStore, MemoryDocument, MemoryStore};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SAS: &str = "sv=2024-01-01&sig=test-sig";

fn store_against(server: &MockServer) -> DocumentStore<AzureBlob> {
    let blob = AzureBlob::new("acct", "conversations", "memory.json", SAS)
        .with_endpoint(server.uri());
    DocumentStore::new("chat-1", blob)
}

fn stored_document(messages: Vec<ChatMessage>) -> String {
    let mut doc = MemoryDocument::new("chat-1");
    doc.messages = messages;
    serde_json::to_string(&doc).unwrap()
}

#[tokio::test]
async fn first_load_creates_a_block_blob() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/conversations/memory.json"))
        .and(query_param("sv", "2024-01-01"))
        .and(query_param("sig", "test-sig"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/conversations/memory.json"))
        .and(query_param("sig", "test-sig"))
        .and(header("x-ms-blob-type", "BlockBlob"))
        .and(body_string_contains("\"chat_id\":\"chat-1\""))
        .respond_with(ResponseTemplate::new(201))
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
        .and(path("/conversations/memory.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(stored_document(vec![msg.clone()])))
        .mount(&server)
        .await;

    let store = store_against(&server);
    assert_eq!(store.load().await.unwrap(), vec![msg]);
}

#[tokio::test]
async fn append_rewrites_the_whole_blob() {
    let server = MockServer::start().await;
    let existing = ChatMessage::new("chatgpt", Role::User, "hello");
    Mock::given(method("GET"))
        .and(path("/conversations/memory.json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(stored_document(vec![existing.clone()])),
        )
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/conversations/memory.json"))
        .and(header("x-ms-blob-type", "BlockBlob"))
        .and(body_string_contains("hello"))
        .and(body_string_contains("hi there"))
        .respond_with(ResponseTemplate::new(201))
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
async fn clear_tolerates_a_missing_blob() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/conversations/memory.json"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_against(&server);
    store.clear().await.unwrap();
}

#[tokio::test]
async fn leading_question_mark_in_the_sas_is_trimmed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/conversations/memory.json"))
        .and(query_param("sv", "2024-01-01"))
        .respond_with(ResponseTemplate::new(200).set_body_string(stored_document(vec![])))
        .expect(1)
        .mount(&server)
        .await;

    let blob = AzureBlob::new("acct", "conversations", "memory.json", format!("?{SAS}"))
        .with_endpoint(server.uri());
    let store = DocumentStore::new("chat-1", blob);
    assert!(store.load().await.unwrap().is_empty());
}
