use crate::error::Result;
use crate::identity::ParticipantId;
use crate::peer::types::{IceCandidate, IceConfig, SdpPayload};
use crate::termination::{Actor, TerminationReason};
use serde::{Deserialize, Serialize};

/// Роль, которую матчмейкер выдал участнику
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Делает offer
    Caller,
    /// Ждёт offer
    Waiter,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignment {
    pub role: Role,
    #[serde(default)]
    pub ice_config: IceConfig,
    /// Абсолютное время в мс от эпохи, после которого ожидание звонка прекращается
    #[serde(default)]
    pub refresh_time_ms: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterAck {
    #[serde(default)]
    pub already_active: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrangerExited {
    pub reason: TerminationReason,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsersConnected {
    pub count: u32,
}

/// Содержимое сигнального сообщения между участниками
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum SignalBody {
    IceCandidate(IceCandidate),
    Offer(SdpPayload),
    Answer(SdpPayload),
}

impl SignalBody {
    pub fn kind(&self) -> SignalKind {
        match self {
            SignalBody::IceCandidate(_) => SignalKind::IceCandidate,
            SignalBody::Offer(_) => SignalKind::Offer,
            SignalBody::Answer(_) => SignalKind::Answer,
        }
    }
}

/// Сигнал с идентификатором отправителя: `{"uuid": ..., "offer": {...}}`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SignalEnvelope {
    pub uuid: ParticipantId,
    #[serde(flatten)]
    pub body: SignalBody,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    IceCandidate,
    Offer,
    Answer,
}

/// Вид входящего сообщения; по нему работает фильтр состояний
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InboundKind {
    RoleAssignment,
    Signal(SignalKind),
    PeerExited,
    PresenceCount,
    RegisterAck,
}

/// Сообщения сервера
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    Role(RoleAssignment),
    AckRegister(RegisterAck),
    Signal(SignalEnvelope),
    StrangerExited(StrangerExited),
    UsersConnected(UsersConnected),
}

impl ServerMessage {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn kind(&self) -> InboundKind {
        match self {
            ServerMessage::Role(_) => InboundKind::RoleAssignment,
            ServerMessage::AckRegister(_) => InboundKind::RegisterAck,
            ServerMessage::Signal(envelope) => InboundKind::Signal(envelope.body.kind()),
            ServerMessage::StrangerExited(_) => InboundKind::PeerExited,
            ServerMessage::UsersConnected(_) => InboundKind::PresenceCount,
        }
    }
}

/// Сообщения клиента; каждое несёт идентификатор участника
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    Register {
        uuid: ParticipantId,
    },
    RequestRole {
        uuid: ParticipantId,
    },
    Signal(SignalEnvelope),
    GameFinished {
        uuid: ParticipantId,
        who: Actor,
        reason: TerminationReason,
    },
}

impl ClientMessage {
    pub fn signal(uuid: &ParticipantId, body: SignalBody) -> Self {
        ClientMessage::Signal(SignalEnvelope {
            uuid: uuid.clone(),
            body,
        })
    }

    pub fn participant_id(&self) -> &ParticipantId {
        match self {
            ClientMessage::Register { uuid }
            | ClientMessage::RequestRole { uuid }
            | ClientMessage::GameFinished { uuid, .. } => uuid,
            ClientMessage::Signal(envelope) => &envelope.uuid,
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            ClientMessage::Register { .. } => "register",
            ClientMessage::RequestRole { .. } => "request-role",
            ClientMessage::Signal(_) => "signal",
            ClientMessage::GameFinished { .. } => "game-finished",
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
