//! WebSocket транспорт до сигнального сервера

use super::messages::{ClientMessage, ServerMessage};
use super::{SignalingTransport, TransportEvent};
use crate::error::{Error, Result};
use crate::orchestrator::{Event, EventSender};
use async_trait::async_trait;
use futures::{Sink, SinkExt, StreamExt};
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Сигнальный клиент с автоматическим переподключением.
///
/// Исходящие сообщения, отправленные во время обрыва, ждут в очереди и уходят
/// после переподключения.
pub struct WsSignaling {
    url: String,
    reconnect_delay: Duration,
    outbound: Option<mpsc::UnboundedSender<Message>>,
    open: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl WsSignaling {
    pub fn new(url: impl Into<String>, reconnect_delay: Duration) -> Self {
        Self {
            url: url.into(),
            reconnect_delay,
            outbound: None,
            open: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    async fn connection_loop(
        url: String,
        reconnect_delay: Duration,
        mut outbound: mpsc::UnboundedReceiver<Message>,
        events: EventSender,
        open: Arc<AtomicBool>,
    ) {
        let mut connected_before = false;
        // сообщение, которое не удалось записать в оборванное соединение
        let mut unsent: Option<Message> = None;
        loop {
            match connect_async(url.as_str()).await {
                Ok((ws, _)) => {
                    info!(%url, reconnect = connected_before, "connected to signaling server");
                    open.store(true, Ordering::SeqCst);
                    let event = if connected_before {
                        TransportEvent::Reconnected
                    } else {
                        TransportEvent::Connected
                    };
                    connected_before = true;
                    if events.send(Event::Transport(event)).is_err() {
                        return;
                    }

                    let finished = Self::pump(ws, &mut outbound, &mut unsent, &events).await;
                    open.store(false, Ordering::SeqCst);
                    if finished || events.send(Event::Transport(TransportEvent::Disconnected)).is_err() {
                        debug!("signaling loop finished");
                        return;
                    }
                }
                Err(e) => {
                    warn!(%url, "failed to connect to signaling server: {}", e);
                }
            }
            if events.is_closed() {
                return;
            }
            sleep(reconnect_delay).await;
        }
    }

    /// Гоняет сообщения в обе стороны, пока соединение живо.
    /// Возвращает `true`, если дальше работать незачем.
    async fn pump(
        ws: WsStream,
        outbound: &mut mpsc::UnboundedReceiver<Message>,
        unsent: &mut Option<Message>,
        events: &EventSender,
    ) -> bool {
        let (mut write, mut read) = ws.split();
        if let Some(msg) = unsent.take() {
            debug!("resending message from the previous connection");
            if !Self::deliver(&mut write, msg, unsent).await {
                return false;
            }
        }
        loop {
            tokio::select! {
                msg = outbound.recv() => match msg {
                    Some(msg) => {
                        if !Self::deliver(&mut write, msg, unsent).await {
                            return false;
                        }
                    }
                    // все отправители закрыты
                    None => {
                        let _ = write.send(Message::Close(None)).await;
                        return true;
                    }
                },
                incoming = read.next() => match incoming {
                    Some(Ok(Message::Text(text))) => match ServerMessage::from_json(&text) {
                        Ok(message) => {
                            debug!(kind = ?message.kind(), "signaling message received");
                            if events.send(Event::Server(message)).is_err() {
                                return true;
                            }
                        }
                        Err(e) => warn!("dropping unparseable signaling message: {}", e),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        info!("signaling connection closed");
                        return false;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        return false;
                    }
                },
            }
        }
    }
}

impl WsSignaling {
    /// Пишет сообщение в сокет. При ошибке оставляет его в `unsent`
    /// для следующего соединения и возвращает `false`.
    async fn deliver<W>(write: &mut W, msg: Message, unsent: &mut Option<Message>) -> bool
    where
        W: Sink<Message> + Unpin,
        W::Error: Display,
    {
        match write.send(msg.clone()).await {
            Ok(()) => true,
            Err(e) => {
                error!("failed to send WebSocket message: {}", e);
                *unsent = Some(msg);
                false
            }
        }
    }
}

#[async_trait]
impl SignalingTransport for WsSignaling {
    async fn open(&mut self, events: EventSender) -> Result<()> {
        if self.task.is_some() {
            debug!("signaling transport already started");
            return Ok(());
        }
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(Error::WebSocket(format!("unsupported signaling url '{}'", self.url)));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.outbound = Some(tx);
        self.task = Some(tokio::spawn(Self::connection_loop(
            self.url.clone(),
            self.reconnect_delay,
            rx,
            events,
            self.open.clone(),
        )));
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn send(&self, message: ClientMessage) -> Result<()> {
        let outbound = self.outbound.as_ref().ok_or(Error::TransportClosed)?;
        let json = message.to_json()?;
        debug!(event = message.event_name(), "sending signaling message");
        outbound
            .send(Message::Text(json))
            .map_err(|_| Error::TransportClosed)
    }
}

impl Drop for WsSignaling {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
