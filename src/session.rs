use crate::identity::ParticipantId;
use crate::peer::PeerLink;
use crate::termination::Termination;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Состояния сессии
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    Initializing,
    PreQueue,
    ConnectingToServer,
    JoiningQueue,
    Calling,
    WaitingForCall,
    CountingDown,
    Playing,
    // Здесь проигрывается короткая анимация
    CallEnded,
    RejoinQueue,
}

impl SessionState {
    pub const ALL: [SessionState; 10] = [
        SessionState::Initializing,
        SessionState::PreQueue,
        SessionState::ConnectingToServer,
        SessionState::JoiningQueue,
        SessionState::Calling,
        SessionState::WaitingForCall,
        SessionState::CountingDown,
        SessionState::Playing,
        SessionState::CallEnded,
        SessionState::RejoinQueue,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Initializing => "initializing",
            SessionState::PreQueue => "pre-queue",
            SessionState::ConnectingToServer => "connecting-to-server",
            SessionState::JoiningQueue => "joining-queue",
            SessionState::Calling => "calling",
            SessionState::WaitingForCall => "waiting-for-call",
            SessionState::CountingDown => "counting-down",
            SessionState::Playing => "playing",
            SessionState::CallEnded => "call-ended",
            SessionState::RejoinQueue => "rejoin-queue",
        }
    }

    /// Состояния, в которых сессия владеет peer connection
    pub fn holds_peer(self) -> bool {
        matches!(
            self,
            SessionState::Calling
                | SessionState::WaitingForCall
                | SessionState::CountingDown
                | SessionState::Playing
        )
    }

    /// Состояния с анимацией "подключаемся к незнакомцу"
    pub fn shows_connecting(self) -> bool {
        matches!(
            self,
            SessionState::JoiningQueue | SessionState::Calling | SessionState::WaitingForCall
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Сессия: единственный владелец состояния и peer connection
pub struct Session {
    pub state: SessionState,
    pub participant_id: ParticipantId,
    pub termination: Option<Termination>,
    peer: Option<Box<dyn PeerLink>>,
    // растёт при каждом новом peer; события старых peer отбрасываются
    peer_epoch: u64,
}

impl Session {
    pub fn new(participant_id: ParticipantId) -> Self {
        Self {
            state: SessionState::Initializing,
            participant_id,
            termination: None,
            peer: None,
            peer_epoch: 0,
        }
    }

    pub fn restore(snapshot: SessionSnapshot) -> Self {
        Self {
            state: snapshot.state,
            participant_id: snapshot.participant_id,
            termination: snapshot.termination,
            peer: None,
            peer_epoch: 0,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            participant_id: self.participant_id.clone(),
            termination: self.termination,
        }
    }

    /// Эпоха, которую получит следующий peer
    pub fn next_peer_epoch(&mut self) -> u64 {
        self.peer_epoch += 1;
        self.peer_epoch
    }

    pub fn is_current_peer(&self, epoch: u64) -> bool {
        self.peer.is_some() && self.peer_epoch == epoch
    }

    pub fn install_peer(&mut self, peer: Box<dyn PeerLink>) {
        self.peer = Some(peer);
    }

    pub fn peer(&self) -> Option<&dyn PeerLink> {
        self.peer.as_deref()
    }

    pub fn take_peer(&mut self) -> Option<Box<dyn PeerLink>> {
        self.peer.take()
    }

    pub fn has_peer(&self) -> bool {
        self.peer.is_some()
    }
}

/// Сериализуемый снимок сессии (без peer connection)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub participant_id: ParticipantId,
    pub termination: Option<Termination>,
}
