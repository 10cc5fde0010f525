use super::messages::{InboundKind, SignalKind};
use crate::session::SessionState;

/// Решение фильтра по входящему сообщению
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accept,
    /// Обработать, но отметить в логе как необычное
    AcceptUnusual,
    Drop,
}

impl Admission {
    pub fn is_accepted(self) -> bool {
        !matches!(self, Admission::Drop)
    }
}

/// Чистая функция: допустимо ли сообщение вида `kind` в состоянии `state`
pub fn admit(state: SessionState, kind: InboundKind) -> Admission {
    use SessionState::*;

    match kind {
        InboundKind::RoleAssignment if state == JoiningQueue => Admission::Accept,
        InboundKind::Signal(SignalKind::IceCandidate) => match state {
            Calling | WaitingForCall => Admission::Accept,
            // кандидаты после установления соединения
            CountingDown | Playing => Admission::AcceptUnusual,
            _ => Admission::Drop,
        },
        InboundKind::Signal(SignalKind::Offer) if state == WaitingForCall => Admission::Accept,
        InboundKind::Signal(SignalKind::Answer) if state == Calling => Admission::Accept,
        InboundKind::PeerExited if state == Playing => Admission::Accept,
        InboundKind::PresenceCount => Admission::Accept,
        InboundKind::RegisterAck if state == ConnectingToServer => Admission::Accept,
        // повторная регистрация после reconnect
        InboundKind::RegisterAck => Admission::AcceptUnusual,
        _ => Admission::Drop,
    }
}
