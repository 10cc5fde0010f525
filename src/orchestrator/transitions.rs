use crate::session::SessionState;
use crate::signaling::messages::{Role, RoleAssignment};
use crate::termination::Termination;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Запрос на переход с данными для действий входа
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    /// Модели загружены
    Start,
    /// Пользователь прошёл проверку "закрой глаза"
    GatePassed,
    /// Сервер подтвердил регистрацию
    Registered,
    Role(RoleAssignment),
    PeerConnected,
    CountdownFinished,
    Terminate(Termination),
    EndAnimationElapsed,
}

/// Ключ таблицы переходов
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    Start,
    GatePassed,
    Registered,
    RoleCaller,
    RoleWaiter,
    PeerConnected,
    CountdownFinished,
    Terminate,
    EndAnimationElapsed,
}

impl Trigger {
    pub fn kind(&self) -> TriggerKind {
        match self {
            Trigger::Start => TriggerKind::Start,
            Trigger::GatePassed => TriggerKind::GatePassed,
            Trigger::Registered => TriggerKind::Registered,
            Trigger::Role(assignment) => match assignment.role {
                Role::Caller => TriggerKind::RoleCaller,
                Role::Waiter => TriggerKind::RoleWaiter,
            },
            Trigger::PeerConnected => TriggerKind::PeerConnected,
            Trigger::CountdownFinished => TriggerKind::CountdownFinished,
            Trigger::Terminate(_) => TriggerKind::Terminate,
            Trigger::EndAnimationElapsed => TriggerKind::EndAnimationElapsed,
        }
    }
}

/// Единственный источник правды о допустимых переходах
static TRANSITIONS: Lazy<HashMap<(SessionState, TriggerKind), SessionState>> = Lazy::new(|| {
    use SessionState::*;
    use TriggerKind as T;

    let mut table = HashMap::from([
        ((Initializing, T::Start), PreQueue),
        ((PreQueue, T::GatePassed), ConnectingToServer),
        ((ConnectingToServer, T::Registered), JoiningQueue),
        ((JoiningQueue, T::RoleCaller), Calling),
        ((JoiningQueue, T::RoleWaiter), WaitingForCall),
        ((Calling, T::PeerConnected), CountingDown),
        ((WaitingForCall, T::PeerConnected), CountingDown),
        ((CountingDown, T::CountdownFinished), Playing),
        ((CallEnded, T::EndAnimationElapsed), RejoinQueue),
        ((RejoinQueue, T::GatePassed), JoiningQueue),
    ]);
    for from in [Calling, WaitingForCall, CountingDown, Playing] {
        table.insert((from, T::Terminate), CallEnded);
    }
    table
});

/// Целевое состояние или `None`, если переход недопустим
pub fn next_state(from: SessionState, trigger: TriggerKind) -> Option<SessionState> {
    TRANSITIONS.get(&(from, trigger)).copied()
}
