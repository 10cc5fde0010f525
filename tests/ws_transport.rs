use futures::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use staredown_lib::orchestrator::Event;
use staredown_lib::signaling::messages::{ClientMessage, ServerMessage, UsersConnected};
use staredown_lib::signaling::{SignalingTransport, TransportEvent, WsSignaling};
use staredown_lib::ParticipantId;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message};

async fn next_event(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event queue closed")
}

#[tokio::test]
async fn delivers_messages_and_reconnects() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (received_tx, mut received_rx) = mpsc::unbounded_channel::<String>();

    let server = tokio::spawn(async move {
        // первое соединение: шлём счётчик, читаем одно сообщение и рвём связь
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text(
            r#"{"event":"users-connected","data":{"count":3}}"#.into(),
        ))
        .await
        .unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                received_tx.send(text).unwrap();
                break;
            }
        }
        drop(ws);

        // второе соединение держим открытым
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                received_tx.send(text).unwrap();
            }
        }
    });

    let mut transport = WsSignaling::new(format!("ws://{addr}"), Duration::from_millis(50));
    let (tx, mut rx) = mpsc::unbounded_channel();
    transport.open(tx).await.unwrap();

    assert_eq!(next_event(&mut rx).await, Event::Transport(TransportEvent::Connected));
    assert!(transport.is_open());
    assert_eq!(
        next_event(&mut rx).await,
        Event::Server(ServerMessage::UsersConnected(UsersConnected { count: 3 }))
    );

    transport
        .send(ClientMessage::Register {
            uuid: ParticipantId::new("me-1"),
        })
        .await
        .unwrap();
    let text = timeout(Duration::from_secs(5), received_rx.recv())
        .await
        .unwrap()
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["event"], "register");
    assert_eq!(json["data"]["uuid"], "me-1");

    assert_eq!(
        next_event(&mut rx).await,
        Event::Transport(TransportEvent::Disconnected)
    );
    assert_eq!(
        next_event(&mut rx).await,
        Event::Transport(TransportEvent::Reconnected)
    );

    // после переподключения отправка снова доходит до сервера
    transport
        .send(ClientMessage::RequestRole {
            uuid: ParticipantId::new("me-1"),
        })
        .await
        .unwrap();
    let text = timeout(Duration::from_secs(5), received_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(text.contains("request-role"));

    drop(transport);
    server.abort();
}

#[tokio::test]
async fn keeps_retrying_until_server_appears() {
    // занимаем порт и сразу освобождаем, чтобы первая попытка не удалась
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut transport = WsSignaling::new(format!("ws://{addr}"), Duration::from_millis(100));
    let (tx, mut rx) = mpsc::unbounded_channel();
    transport.open(tx).await.unwrap();
    assert!(!transport.is_open());

    let listener = TcpListener::bind(addr).await.unwrap();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while ws.next().await.is_some() {}
    });

    assert_eq!(next_event(&mut rx).await, Event::Transport(TransportEvent::Connected));
    server.abort();
}
