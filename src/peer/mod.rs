pub mod connection;
pub mod ice;
pub mod types;

use crate::error::Result;
use crate::orchestrator::EventSender;
use async_trait::async_trait;

pub use connection::{RtcPeer, RtcPeerFactory};
pub use types::{IceCandidate, IceConfig, PeerEvent, PeerState, SdpPayload, ServerConfig};

/// Одно peer connection с собеседником.
///
/// События соединения (состояние, локальные кандидаты, входящие дорожки)
/// уходят в очередь оркестратора с эпохой, под которой peer был создан.
#[async_trait]
pub trait PeerLink: Send + Sync {
    /// Добавляет локальную видеодорожку; без камеры: `Error::NoWebcam`
    async fn attach_local_track(&self) -> Result<()>;

    async fn create_offer(&self) -> Result<SdpPayload>;

    /// Применяет offer собеседника и возвращает наш answer
    async fn accept_offer(&self, offer: SdpPayload) -> Result<SdpPayload>;

    async fn accept_answer(&self, answer: SdpPayload) -> Result<()>;

    /// Кандидаты до установки remote description откладываются
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    /// Останавливает все отправители и получатели, потом закрывает соединение
    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait PeerFactory: Send + Sync {
    async fn create(
        &self,
        ice: &IceConfig,
        epoch: u64,
        events: EventSender,
    ) -> Result<Box<dyn PeerLink>>;
}
