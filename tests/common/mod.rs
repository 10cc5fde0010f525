#![allow(dead_code)]

use async_trait::async_trait;
use staredown_lib::error::{Error, Result};
use staredown_lib::orchestrator::{Event, EventSender, Orchestrator};
use staredown_lib::peer::types::{IceCandidate, IceConfig, PeerEvent, PeerState, SdpPayload};
use staredown_lib::peer::{PeerFactory, PeerLink};
use staredown_lib::signaling::messages::{
    ClientMessage, RegisterAck, Role, RoleAssignment, ServerMessage,
};
use staredown_lib::signaling::{SignalingTransport, TransportEvent};
use staredown_lib::vision::{BlinkScores, BoundingBox, FrameInfo, Party, VisionProvider};
use staredown_lib::{Config, ParticipantId, SessionState, ViewEvent};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Что видно в источнике
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Look {
    NoVideo,
    NoFace,
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy)]
struct Feed {
    look: Look,
    media_time: f64,
}

/// Сцена перед камерами, общая для теста и оркестратора
#[derive(Clone)]
pub struct FakeVision {
    feeds: Arc<Mutex<[Feed; 2]>>,
}

fn slot(party: Party) -> usize {
    match party {
        Party::Local => 0,
        Party::Remote => 1,
    }
}

impl FakeVision {
    pub fn new() -> Self {
        let feed = Feed {
            look: Look::NoVideo,
            media_time: 0.0,
        };
        Self {
            feeds: Arc::new(Mutex::new([feed, feed])),
        }
    }

    /// Новый кадр источника
    pub fn show(&self, party: Party, look: Look) {
        let mut feeds = self.feeds.lock().unwrap();
        let feed = &mut feeds[slot(party)];
        feed.look = look;
        feed.media_time += 1.0;
    }
}

impl VisionProvider for FakeVision {
    fn frame(&self, source: Party) -> Option<FrameInfo> {
        let feed = self.feeds.lock().unwrap()[slot(source)];
        (feed.look != Look::NoVideo).then_some(FrameInfo {
            media_time: feed.media_time,
            width: 640.0,
            height: 480.0,
        })
    }

    fn locate_face(&mut self, _at: Instant) -> Option<BoundingBox> {
        let feed = self.feeds.lock().unwrap()[slot(Party::Local)];
        (feed.look != Look::NoFace).then_some(BoundingBox {
            origin_x: 200.0,
            origin_y: 100.0,
            width: 200.0,
            height: 240.0,
        })
    }

    fn present_local_crop(&mut self, _crop: Option<staredown_lib::CropRect>) {}

    fn blink_scores(&mut self, source: Party, _at: Instant) -> Option<BlinkScores> {
        match self.feeds.lock().unwrap()[slot(source)].look {
            Look::NoVideo | Look::NoFace => None,
            Look::Open => Some(BlinkScores { left: 0.05, right: 0.1 }),
            Look::Closed => Some(BlinkScores { left: 0.9, right: 0.8 }),
        }
    }
}

/// Всё, что клиент отправил серверу
#[derive(Clone, Default)]
pub struct Wire {
    sent: Arc<Mutex<Vec<ClientMessage>>>,
    opened: Arc<AtomicUsize>,
    refuse: Arc<AtomicBool>,
}

impl Wire {
    pub fn sent(&self) -> Vec<ClientMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.sent().iter().filter(|m| m.event_name() == event).count()
    }

    pub fn last(&self) -> Option<ClientMessage> {
        self.sent().last().cloned()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Следующие попытки открыть транспорт завершатся ошибкой
    pub fn refuse_connections(&self) {
        self.refuse.store(true, Ordering::SeqCst);
    }
}

/// Транспорт, который сразу "подключается"
pub struct FakeTransport {
    wire: Wire,
}

impl FakeTransport {
    pub fn new(wire: Wire) -> Self {
        Self { wire }
    }
}

#[async_trait]
impl SignalingTransport for FakeTransport {
    async fn open(&mut self, events: EventSender) -> Result<()> {
        if self.wire.refuse.load(Ordering::SeqCst) {
            return Err(Error::WebSocket("connection refused".into()));
        }
        self.wire.opened.fetch_add(1, Ordering::SeqCst);
        events
            .send(Event::Transport(TransportEvent::Connected))
            .map_err(|_| Error::QueueClosed)
    }

    fn is_open(&self) -> bool {
        self.wire.opened() > 0
    }

    async fn send(&self, message: ClientMessage) -> Result<()> {
        self.wire.sent.lock().unwrap().push(message);
        Ok(())
    }
}

/// Журнал вызовов фейковых peer
#[derive(Debug, Default)]
pub struct PeerJournal {
    pub created: Vec<u64>,
    pub attached: usize,
    pub offers: usize,
    pub accepted_offers: usize,
    pub accepted_answers: usize,
    pub candidates: Vec<IceCandidate>,
    pub closed: Vec<u64>,
}

#[derive(Clone, Default)]
pub struct FakePeers {
    pub journal: Arc<Mutex<PeerJournal>>,
    pub no_webcam: bool,
    pub fail_offer: bool,
}

impl FakePeers {
    pub fn journal(&self) -> std::sync::MutexGuard<'_, PeerJournal> {
        self.journal.lock().unwrap()
    }
}

struct FakePeer {
    epoch: u64,
    journal: Arc<Mutex<PeerJournal>>,
    no_webcam: bool,
    fail_offer: bool,
}

#[async_trait]
impl PeerFactory for FakePeers {
    async fn create(
        &self,
        _ice: &IceConfig,
        epoch: u64,
        _events: EventSender,
    ) -> Result<Box<dyn PeerLink>> {
        self.journal.lock().unwrap().created.push(epoch);
        Ok(Box::new(FakePeer {
            epoch,
            journal: self.journal.clone(),
            no_webcam: self.no_webcam,
            fail_offer: self.fail_offer,
        }))
    }
}

#[async_trait]
impl PeerLink for FakePeer {
    async fn attach_local_track(&self) -> Result<()> {
        if self.no_webcam {
            return Err(Error::NoWebcam);
        }
        self.journal.lock().unwrap().attached += 1;
        Ok(())
    }

    async fn create_offer(&self) -> Result<SdpPayload> {
        if self.fail_offer {
            return Err(Error::Negotiation("offer rejected".into()));
        }
        self.journal.lock().unwrap().offers += 1;
        Ok(SdpPayload::offer(format!("v=0 offer-{}", self.epoch)))
    }

    async fn accept_offer(&self, _offer: SdpPayload) -> Result<SdpPayload> {
        self.journal.lock().unwrap().accepted_offers += 1;
        Ok(SdpPayload::answer(format!("v=0 answer-{}", self.epoch)))
    }

    async fn accept_answer(&self, _answer: SdpPayload) -> Result<()> {
        self.journal.lock().unwrap().accepted_answers += 1;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.journal.lock().unwrap().candidates.push(candidate);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.journal.lock().unwrap().closed.push(self.epoch);
        Ok(())
    }
}

/// Оркестратор с фейками и доступом к ним
pub struct Rig {
    pub orch: Orchestrator,
    pub view: mpsc::UnboundedReceiver<ViewEvent>,
    pub vision: FakeVision,
    pub wire: Wire,
    pub peers: FakePeers,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_peers(FakePeers::default())
    }

    pub fn with_peers(peers: FakePeers) -> Self {
        let vision = FakeVision::new();
        let wire = Wire::default();
        let (orch, view) = Orchestrator::new(
            Config::default(),
            ParticipantId::new("me-123"),
            Box::new(vision.clone()),
            Box::new(FakeTransport::new(wire.clone())),
            Box::new(peers.clone()),
        );
        Self {
            orch,
            view,
            vision,
            wire,
            peers,
        }
    }

    pub fn drain_view(&mut self) -> Vec<ViewEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.view.try_recv() {
            events.push(event);
        }
        events
    }

    pub async fn frame(&mut self) {
        assert!(self.orch.handle_event(Event::Frame).await);
    }

    /// Новый локальный кадр и тик
    pub async fn local(&mut self, look: Look) {
        self.vision.show(Party::Local, look);
        self.frame().await;
    }

    pub async fn server(&mut self, message: ServerMessage) {
        assert!(self.orch.handle_event(Event::Server(message)).await);
    }

    pub async fn peer(&mut self, epoch: u64, event: PeerEvent) {
        assert!(self.orch.handle_event(Event::Peer { epoch, event }).await);
    }

    pub async fn advance_ms(&mut self, ms: u64) {
        tokio::time::advance(std::time::Duration::from_millis(ms)).await;
        self.orch.fire_due_deadlines(Instant::now()).await;
    }

    /// Закрыть глаза на 1.5 с и открыть: проходим проверку очереди
    pub async fn pass_gate(&mut self) {
        self.local(Look::Closed).await;
        self.advance_ms(1_500).await;
        self.local(Look::Closed).await;
        self.local(Look::Open).await;
    }

    /// initializing → joining-queue
    pub async fn join_queue(&mut self) {
        assert!(self.orch.start().await);
        self.pass_gate().await;
        assert_eq!(self.orch.state(), SessionState::ConnectingToServer);
        assert!(self.orch.poll_events().await);
        self.server(ServerMessage::AckRegister(RegisterAck {
            already_active: false,
        }))
        .await;
        assert_eq!(self.orch.state(), SessionState::JoiningQueue);
    }

    pub async fn assign(&mut self, role: Role, refresh_time_ms: Option<i64>) {
        self.server(ServerMessage::Role(RoleAssignment {
            role,
            ice_config: IceConfig::default(),
            refresh_time_ms,
        }))
        .await;
    }

    /// joining-queue → playing через обратный отсчёт
    pub async fn connect_and_count_down(&mut self, epoch: u64) {
        self.peer(epoch, PeerEvent::StateChanged(PeerState::Connected))
            .await;
        assert_eq!(self.orch.state(), SessionState::CountingDown);
        for _ in 0..4 {
            self.advance_ms(1_000).await;
        }
        assert_eq!(self.orch.state(), SessionState::Playing);
    }
}
