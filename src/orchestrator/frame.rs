use super::{Orchestrator, Trigger};
use crate::arbiter::{CallVerdict, GateVerdict};
use crate::config::LOADING_UNWIND_MS;
use crate::session::SessionState;
use crate::view::Instruction;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

impl Orchestrator {
    /// Один тик отрисовки
    pub(super) async fn on_frame(&mut self, now: Instant) {
        match self.session.state {
            SessionState::Initializing => {}
            SessionState::PreQueue | SessionState::RejoinQueue => self.queue_gate_frame(now).await,
            SessionState::Playing => self.in_call_frame(now).await,
            SessionState::CallEnded => {
                // даём экрану завершения погасить видео
                if now >= self.entered_at + self.config.timings.end_screen_video_delay() {
                    self.local_only_frame(now);
                }
            }
            SessionState::ConnectingToServer
            | SessionState::JoiningQueue
            | SessionState::Calling
            | SessionState::WaitingForCall
            | SessionState::CountingDown => self.local_only_frame(now),
        }
    }

    /// Только обрезка локального видео, чтобы в дорожку шёл свежий кадр
    fn local_only_frame(&mut self, now: Instant) {
        let sample = self.sampler.sample_local(self.vision.as_mut(), now);
        self.display_local(sample.status);
    }

    fn unwind_loading(&mut self) {
        self.view
            .loading_bar(false, Duration::from_millis(LOADING_UNWIND_MS));
    }

    async fn queue_gate_frame(&mut self, now: Instant) {
        let sample = self.sampler.sample_local(self.vision.as_mut(), now);
        self.display_local(sample.status);

        match self.window.gate(sample.status, now, &self.config.timings) {
            GateVerdict::Idle => {}
            GateVerdict::NoFace { hold_reset } => {
                if hold_reset {
                    self.unwind_loading();
                }
                self.view.instructions(Some(Instruction::PutFaceOnVideo));
            }
            GateVerdict::CloseEyes { hold_reset } => {
                if hold_reset {
                    self.unwind_loading();
                }
                self.view.instructions(Some(Instruction::CloseYourEyes));
            }
            GateVerdict::Holding { started, remaining } => {
                if started {
                    self.view
                        .loading_bar(true, self.config.timings.queue_join_hold());
                }
                debug!(remaining_ms = remaining.as_millis() as u64, "holding eyes closed");
                self.view.instructions(Some(Instruction::CloseYourEyes));
            }
            GateVerdict::Ready { first_cue } => self.ready(first_cue),
            GateVerdict::Advance => {
                self.unwind_loading();
                self.apply(Trigger::GatePassed).await;
            }
        }
    }

    async fn in_call_frame(&mut self, now: Instant) {
        let local = self.sampler.sample_local(self.vision.as_mut(), now);
        let remote = self.sampler.sample_remote(self.vision.as_mut(), now);
        self.display_remote();

        match self
            .window
            .judge(local.status, remote.status, now, &self.config.timings)
        {
            CallVerdict::Continue { dont_blink } => {
                if dont_blink {
                    self.view.instructions(Some(Instruction::DontBlink));
                }
            }
            CallVerdict::Terminate(termination) => {
                self.apply(Trigger::Terminate(termination)).await;
            }
        }
    }
}
