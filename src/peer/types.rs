use serde::{Deserialize, Serialize};

/// Тип описания сессии
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

/// SDP в том виде, в каком его пересылает сигнальный сервер
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SdpPayload {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SdpPayload {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// ICE кандидат (формат RTCIceCandidateInit браузера)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default, rename = "sdpMLineIndex")]
    pub sdp_mline_index: Option<u16>,
    #[serde(default)]
    pub username_fragment: Option<String>,
}

/// Один URL или список URL, как в RTCIceServer
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Urls {
    One(String),
    Many(Vec<String>),
}

impl Urls {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Urls::One(url) => vec![url.clone()],
            Urls::Many(urls) => urls.clone(),
        }
    }
}

/// Конфигурация ICE сервера
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub urls: Urls,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
}

/// ICE конфигурация, которую матчмейкер присылает вместе с ролью
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IceConfig {
    #[serde(default)]
    pub ice_servers: Vec<ServerConfig>,
}

/// Состояние peer connection, которое интересует оркестратор
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl PeerState {
    /// Соединение потеряно и восстанавливать его мы не будем
    pub fn is_lost(self) -> bool {
        matches!(
            self,
            PeerState::Disconnected | PeerState::Failed | PeerState::Closed
        )
    }
}

/// События жизненного цикла peer connection
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    StateChanged(PeerState),
    LocalCandidate(IceCandidate),
    RemoteTrack { id: String, kind: String },
}
