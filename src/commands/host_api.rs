use crate::config::Config;
use crate::error::{Error, Result};
use crate::identity::ParticipantId;
use crate::logger;
use crate::orchestrator::{Event, EventSender, Orchestrator};
use crate::peer::RtcPeerFactory;
use crate::signaling::WsSignaling;
use crate::view::ViewEvent;
use crate::vision::VisionProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

/// Ручка хоста: через неё идут кадры и остановка
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    tx: EventSender,
}

impl OrchestratorHandle {
    pub fn new(tx: EventSender) -> Self {
        Self { tx }
    }

    /// Тик отрисовки
    pub fn frame(&self) -> Result<()> {
        self.tx.send(Event::Frame).map_err(|_| Error::QueueClosed)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.tx.send(Event::Shutdown).map_err(|_| Error::QueueClosed)
    }

    pub fn sender(&self) -> EventSender {
        self.tx.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Шлёт `Event::Frame` с заданным периодом, пока оркестратор жив.
/// Для хостов без собственного цикла отрисовки.
pub fn spawn_frame_driver(handle: OrchestratorHandle, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if handle.frame().is_err() {
                debug!("frame driver stopped, orchestrator is gone");
                break;
            }
        }
    })
}

/// Запущенная сессия
pub struct Launched {
    pub handle: OrchestratorHandle,
    pub view: mpsc::UnboundedReceiver<ViewEvent>,
    pub remote_tracks: mpsc::UnboundedReceiver<Arc<TrackRemote>>,
    pub task: JoinHandle<Result<()>>,
}

/// Собирает оркестратор с WebSocket сигналингом и webrtc-rs соединениями
/// и запускает его в текущем рантайме tokio. `local_track`: обрезанное локальное видео; `None`,
/// если камеры нет.
pub fn launch(
    config: Config,
    vision: Box<dyn VisionProvider>,
    local_track: Option<Arc<TrackLocalStaticSample>>,
) -> Result<Launched> {
    logger::init();
    config.validate()?;

    let participant_id = match &config.identity_path {
        Some(path) => ParticipantId::load_or_create(path)?,
        None => ParticipantId::ephemeral(),
    };
    info!(participant = %participant_id, url = %config.signaling_url, "launching session");

    let transport = WsSignaling::new(config.signaling_url.clone(), config.reconnect_delay());
    let (track_tx, remote_tracks) = mpsc::unbounded_channel();
    let peers = RtcPeerFactory::new(local_track).with_remote_tracks(track_tx);

    let (orchestrator, view) = Orchestrator::new(
        config,
        participant_id,
        vision,
        Box::new(transport),
        Box::new(peers),
    );
    let handle = OrchestratorHandle::new(orchestrator.sender());
    let task = tokio::spawn(orchestrator.run());

    Ok(Launched {
        handle,
        view,
        remote_tracks,
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn driver_ticks_until_receiver_is_gone() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let driver = spawn_frame_driver(OrchestratorHandle::new(tx), Duration::from_millis(16));

        for _ in 0..3 {
            assert_eq!(rx.recv().await, Some(Event::Frame));
        }
        drop(rx);
        driver.await.unwrap();
    }

    #[test]
    fn closed_queue_is_an_error() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let handle = OrchestratorHandle::new(tx);
        assert!(handle.is_closed());
        assert!(matches!(handle.frame(), Err(Error::QueueClosed)));
        assert!(matches!(handle.shutdown(), Err(Error::QueueClosed)));
    }
}
