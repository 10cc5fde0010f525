use crate::session::SessionState;
use std::collections::HashMap;
use tokio::time::Instant;
use tracing::debug;

/// Именованные дедлайны сессии
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeadlineKind {
    /// Лимит длительности звонка
    CallCutoff,
    /// Сервер просит переспросить очередь, если звонок так и не пришёл
    MatchRefresh,
    /// Очередной шаг обратного отсчёта
    CountdownTick,
    /// Конец анимации завершения звонка
    EndAnimation,
}

/// Непрозрачный токен взведённого дедлайна
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineHandle {
    kind: DeadlineKind,
    generation: u64,
}

impl DeadlineHandle {
    pub fn kind(&self) -> DeadlineKind {
        self.kind
    }
}

#[derive(Debug, Clone, Copy)]
struct Armed {
    at: Instant,
    owner: SessionState,
    generation: u64,
}

/// Очередь отложенных задач. Один дедлайн каждого вида: повторный `arm`
/// заменяет предыдущий, `cancel` уже сработавшего: no-op.
#[derive(Debug, Default)]
pub struct DeadlineManager {
    armed: HashMap<DeadlineKind, Armed>,
    generation: u64,
}

impl DeadlineManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Взводит дедлайн `kind` на момент `at`; `owner`: состояние, при выходе
    /// из которого дедлайн будет снят
    pub fn arm(&mut self, kind: DeadlineKind, at: Instant, owner: SessionState) -> DeadlineHandle {
        self.generation += 1;
        let generation = self.generation;
        if self
            .armed
            .insert(kind, Armed { at, owner, generation })
            .is_some()
        {
            debug!(?kind, "re-armed deadline, previous one replaced");
        }
        DeadlineHandle { kind, generation }
    }

    pub fn cancel(&mut self, kind: DeadlineKind) -> bool {
        self.armed.remove(&kind).is_some()
    }

    /// Снимает дедлайн, только если токен ещё актуален
    pub fn cancel_handle(&mut self, handle: DeadlineHandle) -> bool {
        match self.armed.get(&handle.kind) {
            Some(armed) if armed.generation == handle.generation => {
                self.armed.remove(&handle.kind);
                true
            }
            _ => false,
        }
    }

    pub fn cancel_owned_by(&mut self, owner: SessionState) -> Vec<DeadlineKind> {
        let kinds: Vec<_> = self
            .armed
            .iter()
            .filter(|(_, armed)| armed.owner == owner)
            .map(|(kind, _)| *kind)
            .collect();
        for kind in &kinds {
            self.armed.remove(kind);
        }
        kinds
    }

    pub fn cancel_all(&mut self) -> Vec<DeadlineKind> {
        self.armed.drain().map(|(kind, _)| kind).collect()
    }

    pub fn is_armed(&self, kind: DeadlineKind) -> bool {
        self.armed.contains_key(&kind)
    }

    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }

    /// Ближайший момент срабатывания
    pub fn next_due(&self) -> Option<Instant> {
        self.armed.values().map(|armed| armed.at).min()
    }

    /// Забирает все дедлайны, которые наступили к `now`, в порядке срабатывания
    pub fn take_due(&mut self, now: Instant) -> Vec<DeadlineKind> {
        let mut due: Vec<_> = self
            .armed
            .iter()
            .filter(|(_, armed)| armed.at <= now)
            .map(|(kind, armed)| (armed.at, armed.generation, *kind))
            .collect();
        due.sort();
        due.into_iter()
            .map(|(_, _, kind)| {
                self.armed.remove(&kind);
                kind
            })
            .collect()
    }
}
