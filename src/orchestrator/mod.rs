//! Конечный автомат сессии.
//!
//! Все источники событий (кадры, сигнальный сервер, peer connection) пишут в
//! одну очередь; единственный потребитель обрабатывает их по одному, так что
//! ни один обработчик не видит промежуточных состояний. Дедлайны срабатывают
//! из того же цикла.

mod frame;
mod signals;
pub mod transitions;

use crate::arbiter::ArbitrationWindow;
use crate::config::{Config, END_SCREEN_ANIMATION_MS};
use crate::deadline::{DeadlineKind, DeadlineManager};
use crate::error::{Error, Result};
use crate::identity::ParticipantId;
use crate::peer::types::{IceConfig, PeerEvent};
use crate::peer::PeerFactory;
use crate::session::{Session, SessionState};
use crate::signaling::messages::{ClientMessage, RoleAssignment, ServerMessage, SignalBody};
use crate::signaling::{SignalingTransport, TransportEvent};
use crate::termination::{Termination, TerminationReason};
use crate::view::{Cue, Instruction, ViewEvent, ViewModel, ViewSink};
use crate::vision::{FrameSampler, Party, SampleStatus, VisionProvider};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

pub use transitions::{next_state, Trigger, TriggerKind};

/// События очереди оркестратора
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Тик отрисовки: пора снять сэмплы с видео
    Frame,
    Transport(TransportEvent),
    Server(ServerMessage),
    /// Событие peer connection с эпохой, под которой peer был создан
    Peer { epoch: u64, event: PeerEvent },
    Shutdown,
}

pub type EventSender = mpsc::UnboundedSender<Event>;

const TITLE_READY: &str = "ready?";
const TITLE_PLAYING: &str = "look at this stranger";

enum Wake {
    Event(Option<Event>),
    Deadline,
}

/// Что сделать с ошибкой согласования: без камеры: no-webcam, иначе lost-video
fn failure_termination(err: &Error) -> Termination {
    match err {
        Error::NoWebcam => Termination::me(TerminationReason::NoWebcam),
        _ => Termination::me(TerminationReason::LostVideo),
    }
}

/// Сколько ждать до абсолютного серверного времени `refresh_ms`
pub fn refresh_delay(refresh_ms: i64, now_ms: i64) -> Duration {
    Duration::from_millis(refresh_ms.saturating_sub(now_ms).max(0) as u64)
}

pub struct Orchestrator {
    config: Config,
    session: Session,
    deadlines: DeadlineManager,
    window: ArbitrationWindow,
    sampler: FrameSampler,
    vision: Box<dyn VisionProvider>,
    transport: Box<dyn SignalingTransport>,
    peers: Box<dyn PeerFactory>,
    view: ViewSink,
    events_tx: EventSender,
    events_rx: mpsc::UnboundedReceiver<Event>,
    // текущий шаг обратного отсчёта
    countdown: u8,
    entered_at: Instant,
    // на последней секунде отсчёта локальное видео гаснет и не возвращается
    fade_locked: bool,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        participant_id: ParticipantId,
        vision: Box<dyn VisionProvider>,
        transport: Box<dyn SignalingTransport>,
        peers: Box<dyn PeerFactory>,
    ) -> (Self, mpsc::UnboundedReceiver<ViewEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = mpsc::unbounded_channel();
        let now = Instant::now();
        let sampler = FrameSampler::new(config.blink_threshold, config.force_eyes_closed);
        let orchestrator = Self {
            countdown: config.timings.countdown_from,
            config,
            session: Session::new(participant_id),
            deadlines: DeadlineManager::new(),
            window: ArbitrationWindow::new(now),
            sampler,
            vision,
            transport,
            peers,
            view: ViewSink::new(view_tx),
            events_tx,
            events_rx,
            entered_at: now,
            fade_locked: false,
        };
        (orchestrator, view_rx)
    }

    /// Отправитель для внешних источников событий
    pub fn sender(&self) -> EventSender {
        self.events_tx.clone()
    }

    pub fn state(&self) -> SessionState {
        self.session.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn deadlines(&self) -> &DeadlineManager {
        &self.deadlines
    }

    pub fn view_model(&self) -> &ViewModel {
        self.view.model()
    }

    /// Модели загружены: initializing → pre-queue
    pub async fn start(&mut self) -> bool {
        self.apply(Trigger::Start).await
    }

    /// Главный цикл: события и дедлайны по очереди, до `Event::Shutdown`
    pub async fn run(mut self) -> Result<()> {
        if self.state() == SessionState::Initializing {
            self.start().await;
        }
        loop {
            let next_due = self.deadlines.next_due();
            let wake = tokio::select! {
                biased;
                event = self.events_rx.recv() => Wake::Event(event),
                _ = async {
                    match next_due {
                        Some(at) => sleep_until(at).await,
                        None => std::future::pending().await,
                    }
                } => Wake::Deadline,
            };
            match wake {
                Wake::Event(Some(event)) => {
                    if !self.handle_event(event).await {
                        break;
                    }
                }
                Wake::Event(None) => break,
                Wake::Deadline => self.fire_due_deadlines(Instant::now()).await,
            }
        }
        self.release_peer().await;
        info!("orchestrator stopped");
        Ok(())
    }

    /// Обрабатывает одно событие до конца. `false`: пора остановиться.
    pub async fn handle_event(&mut self, event: Event) -> bool {
        let now = Instant::now();
        // дедлайны, которые наступили раньше события, срабатывают первыми
        self.fire_due_deadlines(now).await;
        match event {
            Event::Frame => self.on_frame(now).await,
            Event::Transport(event) => self.on_transport(event).await,
            Event::Server(message) => self.on_server_message(message).await,
            Event::Peer { epoch, event } => self.on_peer_event(epoch, event).await,
            Event::Shutdown => return false,
        }
        true
    }

    /// Обрабатывает всё, что уже лежит в очереди, не дожидаясь новых событий.
    /// Для хостов со своим циклом. `false`, если среди событий была остановка.
    pub async fn poll_events(&mut self) -> bool {
        while let Ok(event) = self.events_rx.try_recv() {
            if !self.handle_event(event).await {
                return false;
            }
        }
        true
    }

    pub async fn fire_due_deadlines(&mut self, now: Instant) {
        for kind in self.deadlines.take_due(now) {
            self.on_deadline(kind, now).await;
        }
    }

    async fn on_deadline(&mut self, kind: DeadlineKind, now: Instant) {
        debug!(?kind, state = %self.session.state, "deadline fired");
        let trigger = match kind {
            DeadlineKind::CallCutoff => {
                info!("video at cutoff, ending");
                Some(Trigger::Terminate(Termination::me(
                    TerminationReason::DidNotBlinkBeforeCutoff,
                )))
            }
            DeadlineKind::MatchRefresh if self.session.state == SessionState::WaitingForCall => {
                info!("no stranger arrived before refresh time");
                Some(Trigger::Terminate(Termination::me(
                    TerminationReason::NoStrangerAvailable,
                )))
            }
            DeadlineKind::MatchRefresh => None,
            DeadlineKind::CountdownTick if self.session.state == SessionState::CountingDown => {
                self.countdown_beat(self.countdown.saturating_sub(1), now)
            }
            DeadlineKind::CountdownTick => None,
            DeadlineKind::EndAnimation => Some(Trigger::EndAnimationElapsed),
        };
        if let Some(trigger) = trigger {
            self.apply(trigger).await;
        }
    }

    /// Единственная точка смены состояния. Действия входа могут запросить
    /// следующий переход (например, завершение при ошибке согласования),
    /// он применяется здесь же по очереди. `false`, если первый переход отклонён.
    pub async fn apply(&mut self, trigger: Trigger) -> bool {
        let mut pending = Some(trigger);
        let mut first = true;
        let mut applied = false;

        while let Some(trigger) = pending.take() {
            let from = self.session.state;
            let Some(to) = next_state(from, trigger.kind()) else {
                warn!(state = %from, trigger = ?trigger.kind(), "rejected transition");
                if first {
                    return false;
                }
                break;
            };
            first = false;
            applied = true;

            let now = Instant::now();
            let canceled = self.deadlines.cancel_owned_by(from);
            if !canceled.is_empty() {
                debug!(state = %from, ?canceled, "canceled deadlines on exit");
            }
            self.on_exit(from, to);

            self.session.state = to;
            self.entered_at = now;
            info!(%from, %to, "state transition");
            self.view.state_changed(from, to);

            pending = self.on_enter(from, to, trigger, now).await;
        }
        applied
    }

    fn on_exit(&mut self, from: SessionState, to: SessionState) {
        match from {
            SessionState::CountingDown => self.fade_locked = false,
            SessionState::CallEnded => self.session.termination = None,
            _ => {}
        }
        if from.shows_connecting() && !to.shows_connecting() {
            self.view.connecting_animation(false);
        }
    }

    async fn on_enter(
        &mut self,
        from: SessionState,
        to: SessionState,
        trigger: Trigger,
        now: Instant,
    ) -> Option<Trigger> {
        if to.shows_connecting() {
            self.view.connecting_animation(true);
            self.view.instructions(Some(Instruction::ConnectingToStranger));
        }

        match (to, trigger) {
            (SessionState::PreQueue, _) | (SessionState::RejoinQueue, _) => {
                self.window.reset(now);
                None
            }
            (SessionState::ConnectingToServer, _) => {
                if let Err(e) = self.transport.open(self.events_tx.clone()).await {
                    error!(state = %to, "failed to open signaling transport: {}", e);
                    self.view.transport_failed(e.to_string());
                }
                None
            }
            (SessionState::JoiningQueue, _) => {
                self.send(ClientMessage::RequestRole {
                    uuid: self.session.participant_id.clone(),
                })
                .await;
                None
            }
            (SessionState::Calling, Trigger::Role(assignment)) => self.start_call(&assignment).await,
            (SessionState::WaitingForCall, Trigger::Role(assignment)) => {
                self.wait_for_call(&assignment, now).await
            }
            (SessionState::CountingDown, _) => {
                self.countdown_beat(self.config.timings.countdown_from, now)
            }
            (SessionState::Playing, _) => {
                self.view.title(TITLE_PLAYING);
                self.deadlines.arm(
                    DeadlineKind::CallCutoff,
                    now + self.config.timings.call_cutoff(),
                    SessionState::Playing,
                );
                self.window.reset(now);
                None
            }
            (SessionState::CallEnded, Trigger::Terminate(termination)) => {
                self.end_call(from, termination, now).await;
                None
            }
            (to, trigger) => {
                warn!(state = %to, trigger = ?trigger.kind(), "no entry action for this trigger");
                None
            }
        }
    }

    async fn send(&self, message: ClientMessage) {
        if let Err(e) = self.transport.send(message).await {
            warn!("failed to send signaling message: {}", e);
        }
    }

    async fn send_signal(&self, body: SignalBody) {
        self.send(ClientMessage::signal(&self.session.participant_id, body))
            .await;
    }

    /// Создаёт peer и добавляет локальную дорожку. Peer сохраняется в сессии
    /// даже при ошибке, чтобы при завершении его закрыть.
    async fn install_peer(&mut self, ice: &IceConfig) -> Result<()> {
        let epoch = self.session.next_peer_epoch();
        let peer = self.peers.create(ice, epoch, self.events_tx.clone()).await?;
        let attached = peer.attach_local_track().await;
        self.session.install_peer(peer);
        attached
    }

    async fn start_call(&mut self, assignment: &RoleAssignment) -> Option<Trigger> {
        if let Err(e) = self.install_peer(&assignment.ice_config).await {
            warn!("failed to set up peer connection: {}", e);
            return Some(Trigger::Terminate(failure_termination(&e)));
        }
        let offer = match self.session.peer() {
            Some(peer) => peer.create_offer().await,
            None => Err(Error::Negotiation("peer connection missing".into())),
        };
        match offer {
            Ok(offer) => {
                self.send_signal(SignalBody::Offer(offer)).await;
                None
            }
            Err(e) => {
                error!("error starting the call: {}", e);
                Some(Trigger::Terminate(failure_termination(&e)))
            }
        }
    }

    async fn wait_for_call(&mut self, assignment: &RoleAssignment, now: Instant) -> Option<Trigger> {
        if let Some(refresh_ms) = assignment.refresh_time_ms {
            let delay = refresh_delay(refresh_ms, chrono::Utc::now().timestamp_millis());
            info!(refresh_ms, delay_ms = delay.as_millis() as u64, "will refresh queue");
            self.deadlines.arm(
                DeadlineKind::MatchRefresh,
                now + delay,
                SessionState::WaitingForCall,
            );
        }
        if let Err(e) = self.install_peer(&assignment.ice_config).await {
            warn!("failed to set up peer connection: {}", e);
            return Some(Trigger::Terminate(failure_termination(&e)));
        }
        debug!("waiting for call");
        None
    }

    /// Шаг обратного отсчёта; первый шаг молчит, чтобы успел доиграть сигнал готовности
    fn countdown_beat(&mut self, n: u8, now: Instant) -> Option<Trigger> {
        if n == 0 {
            self.view.cue(Cue::ChimeC);
            return Some(Trigger::CountdownFinished);
        }
        self.view.instructions(None);
        if n != self.config.timings.countdown_from {
            self.view.cue(if n % 2 == 1 { Cue::ChimeG } else { Cue::ChimeC });
            if n == 1 {
                self.fade_locked = true;
                self.view.local_video_faded(true);
            }
            self.view.countdown_beat(n);
        }
        self.countdown = n;
        self.deadlines.arm(
            DeadlineKind::CountdownTick,
            now + self.config.timings.countdown_beat(),
            SessionState::CountingDown,
        );
        None
    }

    async fn end_call(&mut self, from: SessionState, termination: Termination, now: Instant) {
        let canceled = self.deadlines.cancel_all();
        if !canceled.is_empty() {
            debug!(?canceled, "canceled deadlines on call end");
        }
        if from == SessionState::WaitingForCall {
            // ушли из очереди, не дождавшись звонка
            self.window.reset(now);
        }

        info!(%termination, "call ended");
        self.session.termination = Some(termination);
        self.view.title(termination.title());
        self.view
            .end_screen(Duration::from_millis(END_SCREEN_ANIMATION_MS));
        self.deadlines.arm(
            DeadlineKind::EndAnimation,
            now + self.config.timings.end_animation(),
            SessionState::CallEnded,
        );
        self.view.show_video(Party::Local);
        self.view.local_video_faded(true);

        self.send(ClientMessage::GameFinished {
            uuid: self.session.participant_id.clone(),
            who: termination.actor,
            reason: termination.reason,
        })
        .await;
        self.release_peer().await;
    }

    async fn release_peer(&mut self) {
        if let Some(peer) = self.session.take_peer() {
            if let Err(e) = peer.close().await {
                warn!("failed to close peer connection: {}", e);
            }
        }
    }

    /// Локальное видео на экране; возвращается из затемнения, только когда есть лицо
    fn display_local(&mut self, status: SampleStatus) {
        self.view.show_video(Party::Local);
        if self.view.model().local_video_faded && !self.fade_locked && status.is_valid_face() {
            self.view.local_video_faded(false);
        }
    }

    fn display_remote(&mut self) {
        if !self.view.model().showing_remote {
            self.view.show_video(Party::Remote);
            self.view.local_video_faded(true);
        }
    }

    fn ready(&mut self, first_cue: bool) {
        self.view.instructions(Some(Instruction::OpenYourEyes));
        if first_cue {
            self.view.cue(Cue::Ready);
        }
        self.view.title(TITLE_READY);
    }
}
