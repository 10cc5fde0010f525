pub mod gate;
pub mod messages;
pub mod ws;

use crate::error::Result;
use crate::orchestrator::EventSender;
use async_trait::async_trait;

pub use gate::{admit, Admission};
pub use messages::{
    ClientMessage, InboundKind, Role, RoleAssignment, ServerMessage, SignalBody, SignalEnvelope,
    SignalKind,
};
pub use ws::WsSignaling;

/// Жизненный цикл сигнального соединения
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Reconnected,
    Disconnected,
}

/// Канал до сигнального сервера. Входящие сообщения и события соединения
/// приходят в очередь оркестратора.
#[async_trait]
pub trait SignalingTransport: Send + Sync {
    async fn open(&mut self, events: EventSender) -> Result<()>;

    fn is_open(&self) -> bool;

    async fn send(&self, message: ClientMessage) -> Result<()>;
}
