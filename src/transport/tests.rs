use crate::client::{ClientError, PubSubClient};
use crate::service::{Code, PubSubService};
use crate::transport::message::{ClientMessage, ServerMessage};
use crate::broker::MAILBOX_CAPACITY;
use crate::transport::websocket::{Connection, OUTBOUND_CAPACITY, serve};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message as WsMessage;

fn connection(service: &PubSubService) -> (Connection, mpsc::Receiver<ServerMessage>) {
    let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
    (Connection::new("test_client".to_string(), service.clone(), tx), rx)
}

/// Starts a server on an ephemeral port; dropping the returned sender stops it.
async fn start_server(service: PubSubService) -> (String, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    tokio::spawn(serve(listener, service, async move {
        let _ = stop_rx.await;
    }));
    (addr, stop_tx)
}

async fn wait_for_subscribers(service: &PubSubService, key: &str, expected: usize) {
    for _ in 0..100 {
        if service.broker().subscriber_count(key) == expected {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {expected} subscriber(s) on {key}");
}

#[test]
fn test_client_message_wire_format() {
    let msg: ClientMessage =
        serde_json::from_value(json!({ "type": "publish", "key": "k", "data": "d" })).unwrap();
    assert_eq!(
        msg,
        ClientMessage::Publish {
            key: "k".to_string(),
            data: "d".to_string()
        }
    );

    let err = ServerMessage::Error {
        code: Code::InvalidArgument,
        message: "key is empty".to_string(),
    };
    assert_eq!(
        serde_json::to_value(&err).unwrap(),
        json!({ "type": "error", "code": "invalid_argument", "message": "key is empty" })
    );
}

#[tokio::test]
async fn test_handle_subscribe() {
    let service = PubSubService::default();
    let (mut conn, mut rx) = connection(&service);

    conn.handle_frame(&json!({ "type": "subscribe", "key": "test_topic" }).to_string()).await;

    assert_eq!(
        rx.try_recv().unwrap(),
        ServerMessage::Subscribed {
            key: "test_topic".to_string()
        }
    );
    assert_eq!(service.broker().subscriber_count("test_topic"), 1);

    // subscribing twice to the same key keeps a single subscription
    conn.handle_frame(&json!({ "type": "subscribe", "key": "test_topic" }).to_string()).await;
    assert!(matches!(rx.try_recv().unwrap(), ServerMessage::Subscribed { .. }));
    assert_eq!(service.broker().subscriber_count("test_topic"), 1);
}

#[tokio::test]
async fn test_handle_unsubscribe() {
    let service = PubSubService::default();
    let (mut conn, mut rx) = connection(&service);

    conn.handle_frame(&json!({ "type": "subscribe", "key": "test_topic" }).to_string()).await;
    rx.try_recv().unwrap();

    conn.handle_frame(&json!({ "type": "unsubscribe", "key": "test_topic" }).to_string()).await;
    assert_eq!(
        rx.try_recv().unwrap(),
        ServerMessage::Unsubscribed {
            key: "test_topic".to_string()
        }
    );
    assert_eq!(service.broker().subscriber_count("test_topic"), 0);

    conn.handle_frame(&json!({ "type": "unsubscribe", "key": "test_topic" }).to_string()).await;
    match rx.try_recv().unwrap() {
        ServerMessage::Error { code, .. } => assert_eq!(code, Code::NotFound),
        other => panic!("Expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_handle_publish() {
    let service = PubSubService::default();
    let (mut conn, mut rx) = connection(&service);

    conn.handle_frame(&json!({ "type": "subscribe", "key": "test_topic" }).to_string()).await;
    rx.try_recv().unwrap();

    conn.handle_frame(&json!({ "type": "publish", "key": "test_topic", "data": "hello" }).to_string()).await;
    assert_eq!(
        rx.recv().await.unwrap(),
        ServerMessage::Published {
            key: "test_topic".to_string()
        }
    );

    match timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap() {
        ServerMessage::Event { key, data, .. } => {
            assert_eq!(key, "test_topic");
            assert_eq!(data, "hello");
        }
        other => panic!("Expected Event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_handle_empty_key_and_garbage() {
    let service = PubSubService::default();
    let (mut conn, mut rx) = connection(&service);

    for frame in [
        json!({ "type": "subscribe", "key": "" }),
        json!({ "type": "publish", "key": "", "data": "x" }),
        json!({ "type": "unsubscribe", "key": "" }),
    ] {
        conn.handle_frame(&frame.to_string()).await;
        match rx.try_recv().unwrap() {
            ServerMessage::Error { code, message } => {
                assert_eq!(code, Code::InvalidArgument);
                assert_eq!(message, "key is empty");
            }
            other => panic!("Expected Error, got {other:?}"),
        }
    }

    conn.handle_frame("not json at all").await;
    match rx.try_recv().unwrap() {
        ServerMessage::Error { code, .. } => assert_eq!(code, Code::BadRequest),
        other => panic!("Expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_connection_close_releases_subscriptions() {
    let service = PubSubService::default();
    let (mut conn, _rx) = connection(&service);
    conn.handle_frame(&json!({ "type": "subscribe", "key": "a" }).to_string()).await;
    conn.handle_frame(&json!({ "type": "subscribe", "key": "b" }).to_string()).await;
    assert_eq!(service.broker().subscriber_count("a"), 1);

    drop(conn);
    assert_eq!(service.broker().subscriber_count("a"), 0);
    assert_eq!(service.broker().subscriber_count("b"), 0);
}

#[tokio::test]
async fn test_stalled_peer_backs_up_into_mailbox() {
    let service = PubSubService::default();
    let (mut conn, mut rx) = connection(&service);
    conn.handle_frame(&json!({ "type": "subscribe", "key": "firehose" }).to_string()).await;
    assert!(matches!(rx.try_recv().unwrap(), ServerMessage::Subscribed { .. }));

    // nobody reads `rx` while publishing
    let published = 5 * MAILBOX_CAPACITY;
    for n in 0..published {
        service.publish("firehose", &n.to_string()).unwrap();
        if n % 500 == 0 {
            sleep(Duration::from_millis(5)).await;
        }
    }
    assert_eq!(rx.len(), OUTBOUND_CAPACITY);

    let mut forwarded = 0;
    while let Ok(Some(msg)) = timeout(Duration::from_millis(200), rx.recv()).await {
        assert!(matches!(msg, ServerMessage::Event { .. }));
        forwarded += 1;
    }
    // outbound queue + one event held by the blocked handler + a full mailbox
    assert!(forwarded <= OUTBOUND_CAPACITY + 1 + MAILBOX_CAPACITY, "forwarded {forwarded}");
    assert!(forwarded < published);
}

#[tokio::test]
async fn integration_pubsub_end_to_end() {
    let service = PubSubService::default();
    let (addr, _stop) = start_server(service.clone()).await;

    let mut subscriber = PubSubClient::connect(&addr).await.expect("client B connect");
    let mut publisher = PubSubClient::connect(&addr).await.expect("client A connect");

    subscriber.subscribe("test").await.unwrap();
    publisher.publish("test", "hello world").await.unwrap();

    let event = timeout(Duration::from_secs(1), subscriber.next_event())
        .await
        .expect("Client B did not receive the published message")
        .unwrap()
        .unwrap();
    assert_eq!(event.key, "test");
    assert_eq!(event.data, "hello world");

    subscriber.unsubscribe("test").await.unwrap();
    assert_eq!(service.broker().subscriber_count("test"), 0);
}

#[tokio::test]
async fn integration_same_connection_sub_and_pub() {
    let service = PubSubService::default();
    let (addr, _stop) = start_server(service).await;

    let mut client = PubSubClient::connect(&addr).await.unwrap();
    client.subscribe("both").await.unwrap();
    client.publish("both", "echo").await.unwrap();

    let event = timeout(Duration::from_secs(1), client.next_event())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(event.data, "echo");
    client.close().await.unwrap();
}

#[tokio::test]
async fn integration_empty_key_is_rejected() {
    let service = PubSubService::default();
    let (addr, _stop) = start_server(service).await;

    let mut client = PubSubClient::connect(&addr).await.unwrap();
    match client.publish("", "data").await {
        Err(ClientError::Rejected(status)) => assert_eq!(status.code, Code::InvalidArgument),
        other => panic!("Expected rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn integration_disconnect_unsubscribes() {
    let service = PubSubService::default();
    let (addr, _stop) = start_server(service.clone()).await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .unwrap();
    ws.send(WsMessage::text(
        json!({ "type": "subscribe", "key": "gone" }).to_string(),
    ))
    .await
    .unwrap();
    ws.next().await.unwrap().unwrap();
    assert_eq!(service.broker().subscriber_count("gone"), 1);

    drop(ws);
    wait_for_subscribers(&service, "gone", 0).await;
}

#[tokio::test]
async fn integration_shutdown_stops_accepting() {
    let service = PubSubService::default();
    let (addr, stop) = start_server(service).await;

    stop.send(()).unwrap();
    sleep(Duration::from_millis(50)).await;

    assert!(PubSubClient::connect(&addr).await.is_err());
}
