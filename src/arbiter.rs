use crate::config::Timings;
use crate::termination::{Termination, TerminationReason};
use crate::vision::SampleStatus;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Что показать/сделать по итогам кадра в режиме входа в очередь
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateVerdict {
    /// Кадр не изменился или видео нет: удержание не трогаем
    Idle,
    /// Лица нет
    NoFace { hold_reset: bool },
    /// Глаза открыты раньше времени: просим закрыть
    CloseEyes { hold_reset: bool },
    /// Глаза закрыты, ждём порога
    Holding { started: bool, remaining: Duration },
    /// Порог пройден; `first_cue`: сигнал "готово" ещё не звучал
    Ready { first_cue: bool },
    /// Пользователь открыл глаза после готовности: переходим дальше
    Advance,
}

/// Решение по кадру во время звонка
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallVerdict {
    /// Играем дальше; `dont_blink`: есть свежий кадр собеседника
    Continue { dont_blink: bool },
    Terminate(Termination),
}

/// Накопитель таймингов кадров для одного цикла очередь/звонок
#[derive(Debug, Clone)]
pub struct ArbitrationWindow {
    eyes_closed_since: Option<Instant>,
    gate_satisfied: bool,
    ready_cue_emitted: bool,
    first_local_frame: Option<Instant>,
    first_remote_frame: Option<Instant>,
    last_remote_frame: Option<Instant>,
    connection_start: Instant,
}

impl ArbitrationWindow {
    pub fn new(now: Instant) -> Self {
        Self {
            eyes_closed_since: None,
            gate_satisfied: false,
            ready_cue_emitted: false,
            first_local_frame: None,
            first_remote_frame: None,
            last_remote_frame: None,
            connection_start: now,
        }
    }

    pub fn reset(&mut self, now: Instant) {
        *self = Self::new(now);
    }

    pub fn gate_satisfied(&self) -> bool {
        self.gate_satisfied
    }

    fn reset_hold(&mut self) -> bool {
        self.eyes_closed_since.take().is_some()
    }

    /// Режим входа в очередь: смотрим только на локальный кадр
    pub fn gate(&mut self, local: SampleStatus, now: Instant, timings: &Timings) -> GateVerdict {
        match local {
            SampleStatus::NoNewFrame | SampleStatus::NoVideo => GateVerdict::Idle,
            SampleStatus::NoFace => GateVerdict::NoFace {
                hold_reset: self.reset_hold(),
            },
            SampleStatus::EyesOpen if self.gate_satisfied => {
                self.reset(now);
                GateVerdict::Advance
            }
            SampleStatus::EyesOpen => GateVerdict::CloseEyes {
                hold_reset: self.reset_hold(),
            },
            SampleStatus::EyesClosed => {
                let started = self.eyes_closed_since.is_none();
                let since = *self.eyes_closed_since.get_or_insert(now);
                let held = now.saturating_duration_since(since);
                let hold = timings.queue_join_hold();
                if held >= hold {
                    self.gate_satisfied = true;
                    let first_cue = !self.ready_cue_emitted;
                    self.ready_cue_emitted = true;
                    GateVerdict::Ready { first_cue }
                } else {
                    GateVerdict::Holding {
                        started,
                        remaining: hold - held,
                    }
                }
            }
        }
    }

    fn stranger_video_lost(&self, now: Instant, timings: &Timings) -> bool {
        match self.last_remote_frame {
            None => {
                now.saturating_duration_since(self.connection_start)
                    >= timings.stranger_connection_timeout()
            }
            Some(last) => {
                now.saturating_duration_since(last) >= timings.stranger_no_video_timeout()
            }
        }
    }

    fn past_grace(first: Option<Instant>, now: Instant, timings: &Timings) -> bool {
        first.is_some_and(|first| now.saturating_duration_since(first) >= timings.blink_grace())
    }

    /// Режим звонка: приоритет правил важен, первое совпадение выигрывает
    pub fn judge(
        &mut self,
        local: SampleStatus,
        remote: SampleStatus,
        now: Instant,
        timings: &Timings,
    ) -> CallVerdict {
        if local.is_valid_face() && self.first_local_frame.is_none() {
            self.first_local_frame = Some(now);
        }

        match local {
            SampleStatus::NoVideo => {
                return CallVerdict::Terminate(Termination::me(TerminationReason::LostVideo))
            }
            SampleStatus::NoFace => {
                return CallVerdict::Terminate(Termination::me(TerminationReason::LostFace))
            }
            SampleStatus::EyesClosed if Self::past_grace(self.first_local_frame, now, timings) => {
                return CallVerdict::Terminate(Termination::me(TerminationReason::Blinked))
            }
            _ => {}
        }

        let lost = CallVerdict::Terminate(Termination::counterpart(TerminationReason::LostVideo));
        match remote {
            SampleStatus::NoVideo => {
                debug!("the stranger has no video");
                if self.stranger_video_lost(now, timings) {
                    lost
                } else {
                    CallVerdict::Continue { dont_blink: false }
                }
            }
            SampleStatus::NoFace => {
                CallVerdict::Terminate(Termination::counterpart(TerminationReason::LostFace))
            }
            SampleStatus::NoNewFrame => {
                if let Some(last) = self.last_remote_frame {
                    if now.saturating_duration_since(last) >= timings.stranger_lag_warning() {
                        debug!("the stranger's video is lagging or cut");
                    }
                }
                if self.stranger_video_lost(now, timings) {
                    lost
                } else {
                    CallVerdict::Continue { dont_blink: false }
                }
            }
            SampleStatus::EyesOpen | SampleStatus::EyesClosed => {
                self.last_remote_frame = Some(now);
                self.first_remote_frame.get_or_insert(now);
                if remote == SampleStatus::EyesClosed
                    && Self::past_grace(self.first_remote_frame, now, timings)
                {
                    CallVerdict::Terminate(Termination::counterpart(TerminationReason::Blinked))
                } else {
                    CallVerdict::Continue { dont_blink: true }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::termination::Actor;
    use SampleStatus::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn gate_is_satisfied_only_after_hold() {
        let timings = Timings::default();
        let t0 = Instant::now();
        let mut window = ArbitrationWindow::new(t0);

        assert_eq!(
            window.gate(EyesClosed, t0, &timings),
            GateVerdict::Holding { started: true, remaining: ms(1500) }
        );
        assert_eq!(
            window.gate(EyesClosed, t0 + ms(1499), &timings),
            GateVerdict::Holding { started: false, remaining: ms(1) }
        );
        assert!(!window.gate_satisfied());

        let mut cues = 0;
        for step in 0..20 {
            match window.gate(EyesClosed, t0 + ms(1500 + step * 16), &timings) {
                GateVerdict::Ready { first_cue: true } => cues += 1,
                GateVerdict::Ready { first_cue: false } => {}
                other => panic!("unexpected verdict {other:?}"),
            }
        }
        assert_eq!(cues, 1);
        assert!(window.gate_satisfied());

        assert_eq!(window.gate(EyesOpen, t0 + ms(2000), &timings), GateVerdict::Advance);
        assert!(!window.gate_satisfied());
    }

    #[test]
    fn opening_eyes_early_restarts_hold() {
        let timings = Timings::default();
        let t0 = Instant::now();
        let mut window = ArbitrationWindow::new(t0);

        window.gate(EyesClosed, t0, &timings);
        assert_eq!(
            window.gate(EyesOpen, t0 + ms(1000), &timings),
            GateVerdict::CloseEyes { hold_reset: true }
        );
        assert_eq!(
            window.gate(EyesClosed, t0 + ms(1200), &timings),
            GateVerdict::Holding { started: true, remaining: ms(1500) }
        );
        assert_eq!(window.gate(NoNewFrame, t0 + ms(1300), &timings), GateVerdict::Idle);
        assert_eq!(
            window.gate(NoFace, t0 + ms(1400), &timings),
            GateVerdict::NoFace { hold_reset: true }
        );
        assert_eq!(window.gate(NoVideo, t0 + ms(1500), &timings), GateVerdict::Idle);
    }

    #[test]
    fn missing_video_keeps_the_hold() {
        let timings = Timings::default();
        let t0 = Instant::now();
        let mut window = ArbitrationWindow::new(t0);

        window.gate(EyesClosed, t0, &timings);
        assert_eq!(window.gate(NoVideo, t0 + ms(1000), &timings), GateVerdict::Idle);
        assert_eq!(
            window.gate(EyesClosed, t0 + ms(1500), &timings),
            GateVerdict::Ready { first_cue: true }
        );
    }

    #[test]
    fn local_no_video_beats_remote_blink() {
        let timings = Timings::default();
        let t0 = Instant::now();
        let mut window = ArbitrationWindow::new(t0);
        window.judge(EyesOpen, EyesOpen, t0, &timings);

        let verdict = window.judge(NoVideo, EyesClosed, t0 + ms(2000), &timings);
        assert_eq!(
            verdict,
            CallVerdict::Terminate(Termination::new(Actor::Me, TerminationReason::LostVideo))
        );
    }

    #[test]
    fn local_face_loss_ends_the_call() {
        let timings = Timings::default();
        let t0 = Instant::now();
        let mut window = ArbitrationWindow::new(t0);

        assert_eq!(
            window.judge(NoFace, EyesOpen, t0 + ms(100), &timings),
            CallVerdict::Terminate(Termination::me(TerminationReason::LostFace))
        );
    }

    #[test]
    fn local_blink_needs_grace_period() {
        let timings = Timings::default();
        let t0 = Instant::now();
        let mut window = ArbitrationWindow::new(t0);

        let mut t = t0;
        let verdict = loop {
            match window.judge(EyesClosed, EyesOpen, t, &timings) {
                CallVerdict::Continue { .. } => {
                    assert!(t - t0 < ms(750));
                    t += ms(16);
                }
                terminate => break terminate,
            }
        };
        assert!(t - t0 >= ms(750));
        assert!(t - t0 < ms(750 + 16));
        assert_eq!(
            verdict,
            CallVerdict::Terminate(Termination::me(TerminationReason::Blinked))
        );
    }

    #[test]
    fn stranger_that_never_connects_times_out() {
        let timings = Timings::default();
        let t0 = Instant::now();
        let mut window = ArbitrationWindow::new(t0);

        assert_eq!(
            window.judge(EyesOpen, NoVideo, t0 + ms(9_999), &timings),
            CallVerdict::Continue { dont_blink: false }
        );
        assert_eq!(
            window.judge(EyesOpen, NoNewFrame, t0 + ms(9_999), &timings),
            CallVerdict::Continue { dont_blink: false }
        );
        assert_eq!(
            window.judge(EyesOpen, NoVideo, t0 + ms(10_000), &timings),
            CallVerdict::Terminate(Termination::counterpart(TerminationReason::LostVideo))
        );
    }

    #[test]
    fn stranger_lost_after_first_frame_uses_short_timeout() {
        let timings = Timings::default();
        let t0 = Instant::now();
        let mut window = ArbitrationWindow::new(t0);

        window.judge(EyesOpen, EyesOpen, t0 + ms(100), &timings);
        assert_eq!(
            window.judge(EyesOpen, NoNewFrame, t0 + ms(5_099), &timings),
            CallVerdict::Continue { dont_blink: false }
        );
        assert_eq!(
            window.judge(EyesOpen, NoNewFrame, t0 + ms(5_100), &timings),
            CallVerdict::Terminate(Termination::counterpart(TerminationReason::LostVideo))
        );
    }

    #[test]
    fn stranger_video_gone_after_first_frame_uses_short_timeout() {
        let timings = Timings::default();
        let t0 = Instant::now();
        let mut window = ArbitrationWindow::new(t0);

        window.judge(EyesOpen, EyesOpen, t0, &timings);
        assert_eq!(
            window.judge(EyesOpen, NoVideo, t0 + ms(4_999), &timings),
            CallVerdict::Continue { dont_blink: false }
        );
        assert_eq!(
            window.judge(EyesOpen, NoVideo, t0 + ms(5_000), &timings),
            CallVerdict::Terminate(Termination::counterpart(TerminationReason::LostVideo))
        );
    }

    #[test]
    fn remote_blink_and_hidden_face() {
        let timings = Timings::default();
        let t0 = Instant::now();
        let mut window = ArbitrationWindow::new(t0);

        // первый кадр собеседника с закрытыми глазами ещё в разогреве
        assert_eq!(
            window.judge(EyesOpen, EyesClosed, t0, &timings),
            CallVerdict::Continue { dont_blink: true }
        );
        assert_eq!(
            window.judge(EyesOpen, EyesClosed, t0 + ms(750), &timings),
            CallVerdict::Terminate(Termination::counterpart(TerminationReason::Blinked))
        );

        let mut window = ArbitrationWindow::new(t0);
        assert_eq!(
            window.judge(EyesOpen, NoFace, t0, &timings),
            CallVerdict::Terminate(Termination::counterpart(TerminationReason::LostFace))
        );
    }
}
