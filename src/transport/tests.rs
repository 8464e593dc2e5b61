use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tungstenite::protocol::Message as WsMessage;

use super::{ClientEvent, ServerEvent, SessionLifecycle};
use crate::gateway::MemoryExchange;
use crate::registry::ConnectionRegistry;
use crate::relay::{Message, RelayController};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_server(exchange: &MemoryExchange) -> (String, Arc<ConnectionRegistry>) {
    let registry = Arc::new(ConnectionRegistry::new());
    let relay = Arc::new(RelayController::new(
        Arc::new(exchange.bind()),
        registry.clone(),
    ));
    let listener = super::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    tokio::spawn(super::serve(listener, relay));
    (url, registry)
}

async fn wait_for_sessions(registry: &ConnectionRegistry, expected: usize) {
    for _ in 0..100 {
        if registry.len() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("registry holds {} sessions, expected {expected}", registry.len());
}

async fn connect(url: &str) -> Client {
    let (ws, _) = connect_async(url).await.expect("client connect");
    ws
}

async fn say(client: &mut Client, text: &str) {
    let frame = json!({ "event": "message", "data": text }).to_string();
    client.send(WsMessage::Text(frame.into())).await.unwrap();
}

async fn hear(client: &mut Client) -> serde_json::Value {
    let frame = tokio::time::timeout(Duration::from_secs(2), client.next())
        .await
        .expect("no message relayed")
        .expect("stream ended")
        .expect("read failed");
    match frame {
        WsMessage::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("Expected a text frame, got {other:?}"),
    }
}

async fn hears_nothing(client: &mut Client) -> bool {
    tokio::time::timeout(Duration::from_millis(200), client.next())
        .await
        .is_err()
}

#[test]
fn test_client_event_shape() {
    let parsed: ClientEvent =
        serde_json::from_value(json!({ "event": "message", "data": "hi" })).unwrap();
    let ClientEvent::Message(text) = parsed;
    assert_eq!(text, "hi");

    assert!(serde_json::from_value::<ClientEvent>(json!({ "event": "typing" })).is_err());
}

#[test]
fn test_server_event_shape() {
    let date = "2024-05-01T12:30:00Z".parse().unwrap();
    let event = ServerEvent::Message(Message::new("hello", date).unwrap());
    let frame = event.to_frame().unwrap();
    let value: serde_json::Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
    assert_eq!(
        value,
        json!({ "event": "message", "data": { "text": "hello", "date": "2024-05-01T12:30:00Z" } })
    );
}

#[test]
fn test_lifecycle_open_and_close() {
    let registry = Arc::new(ConnectionRegistry::new());
    let lifecycle = SessionLifecycle::new(registry.clone());

    let (id, mut outbound) = lifecycle.open(None);
    assert!(registry.contains(&id));

    lifecycle.close(&id, "test");
    lifecycle.close(&id, "test");
    assert!(registry.is_empty());
    assert!(matches!(outbound.try_recv(), Ok(WsMessage::Close(None))));
}

#[tokio::test]
async fn test_hello_reaches_both_clients_once() {
    let exchange = MemoryExchange::new();
    let (url, registry) = start_server(&exchange).await;
    let mut alice = connect(&url).await;
    let mut bob = connect(&url).await;
    wait_for_sessions(&registry, 2).await;

    say(&mut alice, "hello").await;

    let at_alice = hear(&mut alice).await;
    let at_bob = hear(&mut bob).await;
    assert_eq!(at_alice["event"], "message");
    assert_eq!(at_alice["data"]["text"], "hello");
    assert_eq!(at_alice, at_bob);
    assert!(hears_nothing(&mut alice).await);
    assert!(hears_nothing(&mut bob).await);
}

#[tokio::test]
async fn test_blank_and_malformed_input_is_not_relayed() {
    let exchange = MemoryExchange::new();
    let (url, registry) = start_server(&exchange).await;
    let mut alice = connect(&url).await;
    wait_for_sessions(&registry, 1).await;

    say(&mut alice, "").await;
    say(&mut alice, "   ").await;
    alice
        .send(WsMessage::Text("not an event".to_string().into()))
        .await
        .unwrap();
    assert!(hears_nothing(&mut alice).await);

    // The session survives bad input.
    say(&mut alice, "still here").await;
    assert_eq!(hear(&mut alice).await["data"]["text"], "still here");
}

#[tokio::test]
async fn test_two_servers_share_one_exchange() {
    let exchange = MemoryExchange::new();
    let (url_one, registry_one) = start_server(&exchange).await;
    let (url_two, registry_two) = start_server(&exchange).await;
    let mut on_one = connect(&url_one).await;
    let mut on_two = connect(&url_two).await;
    wait_for_sessions(&registry_one, 1).await;
    wait_for_sessions(&registry_two, 1).await;

    say(&mut on_two, "from server two").await;

    assert_eq!(hear(&mut on_one).await["data"]["text"], "from server two");
    assert_eq!(hear(&mut on_two).await["data"]["text"], "from server two");
}

#[tokio::test]
async fn test_disconnected_client_leaves_registry() {
    let exchange = MemoryExchange::new();
    let (url, registry) = start_server(&exchange).await;
    let mut stays = connect(&url).await;
    let mut leaves = connect(&url).await;
    wait_for_sessions(&registry, 2).await;

    leaves.close(None).await.unwrap();
    drop(leaves);
    wait_for_sessions(&registry, 1).await;

    say(&mut stays, "after leave").await;
    assert_eq!(hear(&mut stays).await["data"]["text"], "after leave");
}
