use crate::session::SessionState;
use crate::vision::Party;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::trace;

/// Подсказки под заголовком
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    PutFaceOnVideo,
    CloseYourEyes,
    OpenYourEyes,
    ConnectingToStranger,
    DontBlink,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Instruction::PutFaceOnVideo => "put your face on video",
            Instruction::CloseYourEyes => "close your eyes until you hear a chime",
            Instruction::OpenYourEyes => "open your eyes (how are you reading this?)",
            Instruction::ConnectingToStranger => "connecting to stranger...",
            Instruction::DontBlink => "don't blink",
        })
    }
}

/// Звуки, которые проигрывает хост
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Ready,
    ChimeC,
    ChimeG,
}

/// Уведомления для слоя отрисовки. Вся анимация на стороне хоста.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    StateChanged { from: SessionState, to: SessionState },
    Title(String),
    Instructions(Option<Instruction>),
    Cue(Cue),
    /// Заголовок с числом обратного отсчёта
    CountdownBeat(u8),
    /// Полоса загрузки: к `full` или обратно за `over`
    LoadingBar { full: bool, over: Duration },
    EndScreen { over: Duration },
    ConnectingAnimation(bool),
    /// Какое видео показывать
    ShowVideo(Party),
    LocalVideoFaded(bool),
    PresenceCount(u32),
    /// Сигнальный транспорт не открылся; сессия ждёт в connecting-to-server,
    /// перезапуск остаётся за хостом
    TransportFailed(String),
}

/// Явное состояние представления вместо CSS-классов
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewModel {
    pub title: String,
    pub instructions: Option<Instruction>,
    pub connecting_animation: bool,
    pub local_video_faded: bool,
    pub showing_remote: bool,
    pub presence: Option<u32>,
}

/// Держит модель и рассылает изменения хосту
#[derive(Debug)]
pub struct ViewSink {
    model: ViewModel,
    tx: mpsc::UnboundedSender<ViewEvent>,
}

impl ViewSink {
    pub fn new(tx: mpsc::UnboundedSender<ViewEvent>) -> Self {
        Self {
            model: ViewModel::default(),
            tx,
        }
    }

    pub fn model(&self) -> &ViewModel {
        &self.model
    }

    fn send(&self, event: ViewEvent) {
        trace!(?event, "view event");
        // хост мог отписаться; ядру это не мешает
        let _ = self.tx.send(event);
    }

    pub fn state_changed(&self, from: SessionState, to: SessionState) {
        self.send(ViewEvent::StateChanged { from, to });
    }

    pub fn title(&mut self, text: &str) {
        if self.model.title != text {
            self.model.title = text.to_string();
            self.send(ViewEvent::Title(self.model.title.clone()));
        }
    }

    pub fn instructions(&mut self, instruction: Option<Instruction>) {
        if self.model.instructions != instruction {
            self.model.instructions = instruction;
            self.send(ViewEvent::Instructions(instruction));
        }
    }

    pub fn cue(&self, cue: Cue) {
        self.send(ViewEvent::Cue(cue));
    }

    pub fn countdown_beat(&mut self, n: u8) {
        self.model.title = n.to_string();
        self.send(ViewEvent::CountdownBeat(n));
    }

    pub fn loading_bar(&self, full: bool, over: Duration) {
        self.send(ViewEvent::LoadingBar { full, over });
    }

    pub fn end_screen(&self, over: Duration) {
        self.send(ViewEvent::EndScreen { over });
    }

    pub fn connecting_animation(&mut self, on: bool) {
        if self.model.connecting_animation != on {
            self.model.connecting_animation = on;
            self.send(ViewEvent::ConnectingAnimation(on));
        }
    }

    pub fn show_video(&mut self, party: Party) {
        let remote = party == Party::Remote;
        if self.model.showing_remote != remote {
            self.model.showing_remote = remote;
            self.send(ViewEvent::ShowVideo(party));
        }
    }

    pub fn local_video_faded(&mut self, faded: bool) {
        if self.model.local_video_faded != faded {
            self.model.local_video_faded = faded;
            self.send(ViewEvent::LocalVideoFaded(faded));
        }
    }

    pub fn presence(&mut self, count: u32) {
        if self.model.presence != Some(count) {
            self.model.presence = Some(count);
            self.send(ViewEvent::PresenceCount(count));
        }
    }

    pub fn transport_failed(&self, reason: String) {
        self.send(ViewEvent::TransportFailed(reason));
    }
}
